//! Endpoint configuration.
//!
//! Loaded once at startup and passed explicitly into session construction —
//! there is no global settings lookup anywhere in the crate.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One remote service: a WebSocket URI plus the static credential headers
/// attached during the handshake.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Endpoint {
    pub url: String,
    /// Header name -> credential string, e.g. "Authorization" -> "Api-Key …".
    #[serde(default)]
    pub auth_header: HashMap<String, String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_header: HashMap::new(),
        }
    }

    pub fn with_auth(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_header.insert(name.into(), value.into());
        self
    }
}

/// Process-wide settings: one endpoint per service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    pub evaluation: Endpoint,
    pub synthesis: Endpoint,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            evaluation: Endpoint::new("wss://speech-eval.aimarketplace.co/api/speech-evaluation/"),
            synthesis: Endpoint::new("wss://speech-eval.aimarketplace.co/api/text-to-speech/"),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {}", path.display()))?;
        let settings = serde_json::from_str(&data)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        Ok(settings)
    }
}

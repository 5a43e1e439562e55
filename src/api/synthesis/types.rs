//! Request and event types for the synthesis pipeline.

use serde::{Deserialize, Serialize};

use crate::api::PipelineError;

/// Voice accent, serialized to the service's wire strings.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Accent {
    Us,
    Uk,
    Au,
}

/// Voice gender, serialized to the service's wire strings.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

/// One synthesis submission. Serializes directly to the single request
/// frame: `{"text": …, "accent": "US", "gender": "MALE"}`.
#[derive(Serialize, Clone, Debug)]
pub struct SynthesisRequest {
    pub text: String,
    pub accent: Accent,
    pub gender: Gender,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            accent: Accent::Us,
            gender: Gender::Male,
        }
    }
}

/// Decoded PCM for one synthesized word. Ephemeral: owned by the playback
/// step that consumes it and discarded afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioSegment {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSegment {
    /// Duration in milliseconds, for display.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// One unit of pipeline output, ready for display or playback.
#[derive(Debug)]
pub enum PlaybackEvent {
    /// A synthesized word; its segment has already been handed to the sink.
    WordAudio { word: String, segment: AudioSegment },
    /// JSON frame missing the word/audio fields; kept raw for display.
    Incomplete { raw: String },
    /// Server-reported synthesis failure. Terminal by protocol and distinct
    /// from transport faults.
    ServiceError { message: String },
    /// Transport or decode fault. Terminal only when it is a connect fault.
    Error(PipelineError),
}

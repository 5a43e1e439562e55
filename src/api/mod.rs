//! Call-throughs to the two remote speech services.
//!
//! Each pipeline owns its session for the duration of one run and reduces
//! the incoming message stream into a lazy sequence of display/playback
//! items. Every failure is caught at the pipeline boundary and converted
//! into an item — nothing propagates past a pipeline as a panic or an
//! unhandled error.

pub mod evaluation;
pub mod synthesis;

use thiserror::Error;

use crate::session::SessionError;

/// A fault observed while a pipeline was running.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Transport fault (connect, send or receive).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Audio payload could not be decoded.
    #[error("audio decode failed: {0}")]
    Decode(String),

    /// Server frame was not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl PipelineError {
    /// True when the run failed before anything was sent.
    pub fn is_connect(&self) -> bool {
        matches!(self, PipelineError::Session(SessionError::Connect(_)))
    }
}

//! Streaming client for two remote speech services: pronunciation
//! evaluation (send a reference sentence plus recorded audio, read back the
//! streamed score) and text-to-speech (send text, play back the synthesized
//! words as they arrive).
//!
//! Both features ride on the same WebSocket session lifecycle in
//! [`session`]. The pipelines in [`api`] are plain lazy iterators; [`jobs`]
//! is the thin layer that runs one pipeline per worker thread so a UI can
//! stay responsive while playback blocks.

pub mod api;
pub mod config;
pub mod jobs;
pub mod session;

pub use api::evaluation::{EvaluationRequest, Notification};
pub use api::synthesis::{
    Accent, AudioSegment, Gender, PlaybackEvent, PlaybackSink, SynthesisRequest,
};
pub use api::PipelineError;
pub use config::{Endpoint, Settings};
pub use session::{Frame, SessionError, StreamingSession};

//! Text-to-speech call-through: request framing, response decoding and
//! playback-event production.

pub mod decode;
pub mod pipeline;
pub mod player;
pub mod types;

pub use decode::decode_segment;
pub use pipeline::{run, SynthesisRun};
pub use player::{CpalPlayer, PlaybackSink, SharedPlayer, PLAYBACK_SAMPLE_RATE};
pub use types::{Accent, AudioSegment, Gender, PlaybackEvent, SynthesisRequest};

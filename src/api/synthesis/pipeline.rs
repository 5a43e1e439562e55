//! Text-to-speech pipeline.
//!
//! One run sends a single JSON request frame, then reduces the server's
//! stream into [`PlaybackEvent`]s. Each decoded segment is handed to the
//! playback sink before its event is emitted, so playback order matches
//! arrival order. Unlike the evaluation path, malformed frames and receive
//! faults are recoverable here: the loop reports them and keeps reading.

use crate::api::synthesis::decode::decode_segment;
use crate::api::synthesis::player::PlaybackSink;
use crate::api::synthesis::types::{PlaybackEvent, SynthesisRequest};
use crate::api::PipelineError;
use crate::config::Endpoint;
use crate::session::{Frame, StreamingSession};

/// Start one synthesis run against `endpoint`, rendering through `sink`.
/// The returned sequence is lazy, finite and not restartable.
pub fn run<S: PlaybackSink>(
    request: SynthesisRequest,
    endpoint: Endpoint,
    sink: S,
) -> SynthesisRun<S> {
    SynthesisRun {
        sink,
        state: RunState::Pending { request, endpoint },
    }
}

enum RunState {
    Pending {
        request: SynthesisRequest,
        endpoint: Endpoint,
    },
    Receiving {
        session: StreamingSession,
    },
    Finished,
}

/// Lazy playback-event sequence for one synthesis run.
pub struct SynthesisRun<S: PlaybackSink> {
    sink: S,
    state: RunState,
}

impl<S: PlaybackSink> Iterator for SynthesisRun<S> {
    type Item = PlaybackEvent;

    fn next(&mut self) -> Option<PlaybackEvent> {
        loop {
            match std::mem::replace(&mut self.state, RunState::Finished) {
                RunState::Pending { request, endpoint } => {
                    let mut session = match StreamingSession::open(&endpoint) {
                        Ok(session) => session,
                        Err(e) => {
                            log::warn!("synthesis connect failed: {e}");
                            return Some(PlaybackEvent::Error(e.into()));
                        }
                    };
                    let frame = match serde_json::to_string(&request) {
                        Ok(frame) => frame,
                        Err(e) => {
                            session.close();
                            return Some(PlaybackEvent::Error(PipelineError::Malformed(
                                e.to_string(),
                            )));
                        }
                    };
                    if let Err(e) = session.send_text(frame) {
                        log::warn!("synthesis send failed: {e}");
                        session.close();
                        return Some(PlaybackEvent::Error(e.into()));
                    }
                    log::info!("sent synthesis request ({} chars)", request.text.len());
                    self.state = RunState::Receiving { session };
                }
                RunState::Receiving { mut session } => match session.receive() {
                    Ok(Frame::Closed) => {
                        session.close();
                        return None;
                    }
                    Ok(frame) => {
                        let text = match frame {
                            Frame::Text(text) => text,
                            Frame::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
                            Frame::Closed => unreachable!("handled above"),
                        };
                        match process_payload(&text, &mut self.sink) {
                            Step::Emit(event) => {
                                self.state = RunState::Receiving { session };
                                return Some(event);
                            }
                            // Terminal by protocol; stop consuming.
                            Step::Terminal(event) => {
                                session.close();
                                return Some(event);
                            }
                        }
                    }
                    // Receive faults are recoverable on this path.
                    Err(e) => {
                        log::warn!("synthesis receive failed: {e}");
                        self.state = RunState::Receiving { session };
                        return Some(PlaybackEvent::Error(e.into()));
                    }
                },
                RunState::Finished => return None,
            }
        }
    }
}

enum Step {
    Emit(PlaybackEvent),
    Terminal(PlaybackEvent),
}

/// Classify one server payload and, for word audio, render it through the
/// sink before the event is handed back.
fn process_payload<S: PlaybackSink>(text: &str, sink: &mut S) -> Step {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Step::Emit(PlaybackEvent::Error(PipelineError::Malformed(format!(
                "{e}: {text}"
            ))))
        }
    };

    if value.get("status").and_then(|s| s.as_str()) == Some("error") {
        let message = value
            .get("error")
            .and_then(|m| m.as_str())
            .unwrap_or("synthesis failed")
            .to_string();
        return Step::Terminal(PlaybackEvent::ServiceError { message });
    }

    let word = value.get("word").and_then(|w| w.as_str());
    let audio = value.get("audio").and_then(|a| a.as_str());
    match (word, audio) {
        (Some(word), Some(audio)) => match decode_segment(audio) {
            Ok(segment) => {
                sink.play(&segment);
                Step::Emit(PlaybackEvent::WordAudio {
                    word: word.to_string(),
                    segment,
                })
            }
            Err(e) => Step::Emit(PlaybackEvent::Error(e)),
        },
        _ => Step::Emit(PlaybackEvent::Incomplete {
            raw: text.to_string(),
        }),
    }
}

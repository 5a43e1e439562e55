//! Speech evaluation pipeline.
//!
//! One run sends the reference sentence as a JSON frame, the recorded audio
//! as fixed-size binary chunks, and a `STOP` sentinel, then reduces the
//! server's response stream into [`Notification`]s until the peer closes.

use serde_json::json;

use crate::api::PipelineError;
use crate::config::Endpoint;
use crate::session::{Frame, SessionError, StreamingSession};

/// Upper bound for one audio frame, matching the service contract.
pub const CHUNK_SIZE: usize = 1024;

/// Distinguished final frame marking end-of-audio. Not a chunk.
pub const STOP_SENTINEL: &[u8] = b"STOP";

/// One user submission: the sentence the speaker was asked to read plus the
/// recorded `.wav` bytes. Consumed by a single run.
#[derive(Clone, Debug)]
pub struct EvaluationRequest {
    pub reference_text: String,
    pub audio: Vec<u8>,
}

/// One unit of pipeline output, ready for display.
#[derive(Debug)]
pub enum Notification {
    /// Free-form server acknowledgment (anything that is not JSON).
    Ack(String),
    /// Server-defined JSON scoring payload.
    Score(serde_json::Value),
    /// Terminal fault; the session has already been closed.
    Error(PipelineError),
}

/// Start one evaluation run. The returned sequence is lazy, finite and not
/// restartable: nothing touches the network until the first item is pulled.
pub fn run(request: EvaluationRequest, endpoint: Endpoint) -> EvaluationRun {
    EvaluationRun {
        state: RunState::Pending { request, endpoint },
    }
}

enum RunState {
    Pending {
        request: EvaluationRequest,
        endpoint: Endpoint,
    },
    Receiving {
        session: StreamingSession,
    },
    Finished,
}

/// Lazy notification sequence for one evaluation run.
pub struct EvaluationRun {
    state: RunState,
}

impl Iterator for EvaluationRun {
    type Item = Notification;

    fn next(&mut self) -> Option<Notification> {
        loop {
            // Any path that does not restore a state below terminates the
            // sequence, so an error item is always the last one.
            match std::mem::replace(&mut self.state, RunState::Finished) {
                RunState::Pending { request, endpoint } => {
                    let mut session = match StreamingSession::open(&endpoint) {
                        Ok(session) => session,
                        Err(e) => {
                            log::warn!("evaluation connect failed: {e}");
                            return Some(Notification::Error(e.into()));
                        }
                    };
                    if let Err(e) = send_request(&mut session, &request) {
                        log::warn!("evaluation send failed: {e}");
                        session.close();
                        return Some(Notification::Error(e.into()));
                    }
                    self.state = RunState::Receiving { session };
                }
                RunState::Receiving { mut session } => match session.receive() {
                    Ok(Frame::Closed) => {
                        session.close();
                        return None;
                    }
                    Ok(frame) => {
                        let item = classify(frame);
                        self.state = RunState::Receiving { session };
                        return Some(item);
                    }
                    // Receive faults are fatal on this path.
                    Err(e) => {
                        log::warn!("evaluation receive failed: {e}");
                        session.close();
                        return Some(Notification::Error(e.into()));
                    }
                },
                RunState::Finished => return None,
            }
        }
    }
}

/// Send phase: reference text, chunked audio in offset order, stop sentinel.
/// Empty audio sends zero chunks; the sentinel is sent regardless.
fn send_request(
    session: &mut StreamingSession,
    request: &EvaluationRequest,
) -> Result<(), SessionError> {
    session.send_text(json!({ "reference_text": request.reference_text }).to_string())?;
    for chunk in request.audio.chunks(CHUNK_SIZE) {
        session.send_binary(chunk.to_vec())?;
    }
    session.send_binary(STOP_SENTINEL.to_vec())?;
    log::info!(
        "sent reference text and {} audio bytes in {} chunks",
        request.audio.len(),
        request.audio.len().div_ceil(CHUNK_SIZE)
    );
    Ok(())
}

fn classify(frame: Frame) -> Notification {
    let text = match frame {
        Frame::Text(text) => text,
        Frame::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
        Frame::Closed => unreachable!("closed frames are handled by the receive loop"),
    };
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => Notification::Score(value),
        Err(_) => Notification::Ack(text),
    }
}

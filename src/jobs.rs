//! One worker of execution per user-initiated run.
//!
//! The pipelines themselves are plain blocking iterators; this layer spawns
//! them on their own threads and forwards their items through channels so an
//! interactive caller stays responsive while a run blocks on the network or
//! on playback. The only state shared between concurrent runs is the player.

use std::sync::mpsc;
use std::thread;

use crate::api::evaluation::{self, EvaluationRequest, Notification};
use crate::api::synthesis::{self, PlaybackEvent, SharedPlayer, SynthesisRequest};
use crate::config::Settings;

/// Spawns and feeds pipeline runs. Cheap to clone; clones share the player.
#[derive(Clone)]
pub struct SpeechJobs {
    settings: Settings,
    player: SharedPlayer,
}

impl SpeechJobs {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            player: SharedPlayer::new(),
        }
    }

    /// Like [`SpeechJobs::new`] but reusing an existing player, e.g. one
    /// shared with other parts of the application.
    pub fn with_player(settings: Settings, player: SharedPlayer) -> Self {
        Self { settings, player }
    }

    /// Start one evaluation run on its own worker thread. Notifications
    /// arrive on the returned channel in server order; the channel closes
    /// when the run ends. Dropping the receiver abandons the run and the
    /// session is still torn down by the pipeline.
    pub fn start_evaluation(&self, request: EvaluationRequest) -> mpsc::Receiver<Notification> {
        let endpoint = self.settings.evaluation.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            log::info!("evaluation run started");
            for notification in evaluation::run(request, endpoint) {
                if tx.send(notification).is_err() {
                    log::info!("evaluation receiver dropped, abandoning run");
                    return;
                }
            }
            log::info!("evaluation run finished");
        });
        rx
    }

    /// Start one synthesis run on its own worker thread. Playback happens on
    /// the worker through the shared player, one segment at a time.
    pub fn start_synthesis(&self, request: SynthesisRequest) -> mpsc::Receiver<PlaybackEvent> {
        let endpoint = self.settings.synthesis.clone();
        let player = self.player.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            log::info!("synthesis run started");
            for event in synthesis::run(request, endpoint, player) {
                if tx.send(event).is_err() {
                    log::info!("synthesis receiver dropped, abandoning run");
                    return;
                }
            }
            log::info!("synthesis run finished");
        });
        rx
    }
}

//! Playback sink: the audio-output end of the synthesis pipeline.
//!
//! [`CpalPlayer`] spawns one dedicated thread that owns the cpal output
//! stream (the stream handle cannot leave its thread) and feeds it from a
//! shared sample queue. `play` blocks the producer until the segment has
//! been consumed, so the device only ever handles one segment at a time.
//! [`SharedPlayer`] adds the mutex that serializes concurrent runs on the
//! physical output.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::api::synthesis::types::AudioSegment;

/// Rate the output stream is opened at; most devices support this.
pub const PLAYBACK_SAMPLE_RATE: u32 = 48000;

/// Anything that can render one decoded segment. The pipeline calls this
/// synchronously between receives, so playback order matches arrival order.
pub trait PlaybackSink {
    fn play(&mut self, segment: &AudioSegment);
}

impl<S: PlaybackSink + ?Sized> PlaybackSink for &mut S {
    fn play(&mut self, segment: &AudioSegment) {
        (**self).play(segment);
    }
}

/// Audio player on the default output device.
pub struct CpalPlayer {
    sample_rate: u32,
    // Samples waiting to be pulled by the output callback.
    shared_buffer: Arc<Mutex<VecDeque<i16>>>,
    has_device: bool,
    shutdown: Arc<AtomicBool>,
    _thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalPlayer {
    pub fn new() -> Self {
        Self::with_sample_rate(PLAYBACK_SAMPLE_RATE)
    }

    fn with_sample_rate(sample_rate: u32) -> Self {
        let shared_buffer: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let buffer_clone = shared_buffer.clone();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let (ready_tx, ready_rx) = mpsc::channel();

        // The stream handle stays on this thread for its whole life.
        let thread = std::thread::spawn(move || {
            let stream = build_output_stream(sample_rate, buffer_clone);
            let _ = ready_tx.send(stream.is_some());
            let Some(stream) = stream else { return };
            if let Err(e) = stream.play() {
                log::warn!("cannot start output stream: {e}");
                return;
            }
            while !shutdown_clone.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(50));
            }
        });

        let has_device = ready_rx
            .recv_timeout(Duration::from_secs(2))
            .unwrap_or(false);
        if !has_device {
            log::warn!("no usable audio output device; synthesized audio will be dropped");
        }

        Self {
            sample_rate,
            shared_buffer,
            has_device,
            shutdown,
            _thread: Some(thread),
        }
    }

    /// Block until the queued samples have been pulled by the device.
    fn drain(&self) {
        loop {
            let len = self.shared_buffer.lock().map(|b| b.len()).unwrap_or(0);
            if len == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        // Let the tail of the device buffer play out.
        std::thread::sleep(Duration::from_millis(100));
    }

    /// Discard anything still queued.
    pub fn stop(&self) {
        if let Ok(mut buf) = self.shared_buffer.lock() {
            buf.clear();
        }
    }
}

impl Default for CpalPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CpalPlayer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

impl PlaybackSink for CpalPlayer {
    fn play(&mut self, segment: &AudioSegment) {
        // Without a device there is no consumer for the queue; dropping the
        // segment beats blocking the pipeline forever.
        if !self.has_device {
            return;
        }

        let mono = downmix(&segment.samples, segment.channels);
        let resampled = resample_linear(&mono, segment.sample_rate, self.sample_rate);
        if resampled.is_empty() {
            return;
        }

        if let Ok(mut buf) = self.shared_buffer.lock() {
            buf.extend(resampled);
        }
        self.drain();
    }
}

/// Build the output stream on the calling thread. Stereo, f32 first and i16
/// as the fallback; some drivers only take one of the two.
fn build_output_stream(
    sample_rate: u32,
    buffer: Arc<Mutex<VecDeque<i16>>>,
) -> Option<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let buffer_f32 = buffer.clone();
    match device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut buf = buffer_f32.lock().unwrap();
            for frame in data.chunks_mut(2) {
                let sample = buf.pop_front().unwrap_or(0) as f32 / 32768.0;
                for out in frame {
                    *out = sample;
                }
            }
        },
        |err| log::warn!("audio output error: {err}"),
        None,
    ) {
        Ok(stream) => Some(stream),
        Err(e) => {
            log::warn!("f32 output stream failed ({e}), trying i16");
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        let mut buf = buffer.lock().unwrap();
                        for frame in data.chunks_mut(2) {
                            let sample = buf.pop_front().unwrap_or(0);
                            for out in frame {
                                *out = sample;
                            }
                        }
                    },
                    |err| log::warn!("audio output error: {err}"),
                    None,
                )
                .map_err(|e| log::warn!("i16 output stream failed: {e}"))
                .ok()
        }
    }
}

/// Mutex-wrapped player shared between concurrent runs; each segment locks
/// the device for the duration of its playback.
#[derive(Clone)]
pub struct SharedPlayer {
    inner: Arc<Mutex<CpalPlayer>>,
}

impl SharedPlayer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CpalPlayer::new())),
        }
    }
}

impl Default for SharedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for SharedPlayer {
    fn play(&mut self, segment: &AudioSegment) {
        if let Ok(mut player) = self.inner.lock() {
            player.play(segment);
        }
    }
}

fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let n = channels as usize;
    samples
        .chunks(n)
        .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / n as i32) as i16)
        .collect()
}

/// Simple linear resampling, good enough for speech playback.
fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        let s1 = samples.get(src_idx).copied().unwrap_or(0);
        let s2 = samples.get(src_idx + 1).copied().unwrap_or(s1);

        let interpolated = s1 as f64 * (1.0 - frac) + s2 as f64 * frac;
        output.push(interpolated as i16);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_pairs() {
        let stereo = vec![100, 300, -200, 200];
        assert_eq!(downmix(&stereo, 2), vec![200, 0]);
        assert_eq!(downmix(&stereo, 1), stereo);
    }

    #[test]
    fn resample_doubles_len_for_half_rate() {
        let samples = vec![0i16, 1000, 2000, 3000];
        let out = resample_linear(&samples, 24000, 48000);
        assert_eq!(out.len(), 8);
        // Interpolated midpoints sit between neighbours.
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 500);
    }

    #[test]
    fn resample_is_identity_at_same_rate() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(resample_linear(&samples, 16000, 16000), samples);
    }
}

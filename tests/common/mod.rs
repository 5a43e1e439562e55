//! Scripted WebSocket servers for driving the pipelines over a real socket.

#![allow(dead_code)]

use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

use talkgauge::{AudioSegment, PlaybackSink};
use tungstenite::handshake::server::{Request, Response};
use tungstenite::{Message, WebSocket};

pub type ServerSocket = WebSocket<TcpStream>;

/// Run `script` against the first connection on an ephemeral port. Returns
/// the `ws://` URL and the handle carrying whatever the script collected.
pub fn spawn_server<T, F>(script: F) -> (String, JoinHandle<T>)
where
    F: FnOnce(&mut ServerSocket) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut socket = tungstenite::accept(stream).unwrap();
        script(&mut socket)
    });
    (format!("ws://{addr}"), handle)
}

/// Like [`spawn_server`] but also captures the Authorization header the
/// client presented during the handshake.
pub fn spawn_server_capture_auth<T, F>(script: F) -> (String, JoinHandle<(Option<String>, T)>)
where
    F: FnOnce(&mut ServerSocket) -> T + Send + 'static,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut auth = None;
        let mut socket = tungstenite::accept_hdr(stream, |req: &Request, resp: Response| {
            auth = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            Ok(resp)
        })
        .unwrap();
        let out = script(&mut socket);
        (auth, out)
    });
    (format!("ws://{addr}"), handle)
}

/// Initiate a server-side close and drive the socket until the close
/// handshake completes.
pub fn finish(socket: &mut ServerSocket) {
    let _ = socket.close(None);
    loop {
        match socket.read() {
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}

/// Read data frames until the given binary sentinel arrives, returning the
/// frames seen before it (the sentinel itself is excluded).
pub fn read_until_sentinel(socket: &mut ServerSocket, sentinel: &[u8]) -> Vec<Message> {
    let mut frames = Vec::new();
    loop {
        match socket.read().unwrap() {
            Message::Binary(data) if data.as_ref() == sentinel => return frames,
            msg @ (Message::Text(_) | Message::Binary(_)) => frames.push(msg),
            _ => continue,
        }
    }
}

/// Sink that records what was played instead of touching an audio device.
#[derive(Default)]
pub struct RecordingSink {
    pub played: Vec<AudioSegment>,
}

impl PlaybackSink for RecordingSink {
    fn play(&mut self, segment: &AudioSegment) {
        self.played.push(segment.clone());
    }
}

/// A one-channel 16 kHz WAV buffer, base64-encoded the way the service
/// ships audio.
pub fn wav_base64(samples: &[i16]) -> String {
    use base64::{engine::general_purpose, Engine as _};
    use std::io::Cursor;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    general_purpose::STANDARD.encode(buffer.into_inner())
}

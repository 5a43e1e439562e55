//! Wire-level tests for the synthesis pipeline against a scripted server.

mod common;

use common::{finish, spawn_server, wav_base64, RecordingSink};
use talkgauge::api::synthesis::{self, PlaybackEvent, SynthesisRequest};
use talkgauge::{Endpoint, PipelineError};
use tungstenite::Message;

/// Read the single request frame and return its parsed JSON.
fn read_request(socket: &mut common::ServerSocket) -> serde_json::Value {
    loop {
        match socket.read().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Binary(_) => panic!("request frame must be text"),
            _ => continue,
        }
    }
}

#[test]
fn word_audio_is_played_once_and_emitted_in_order() {
    let (url, server) = spawn_server(|socket| {
        let request = read_request(socket);
        let frame = format!(
            r#"{{"word":"hi","audio":"{}","status":"ok"}}"#,
            wav_base64(&[5, 6, 7, 8])
        );
        socket.send(Message::text(frame)).unwrap();
        finish(socket);
        request
    });

    let mut sink = RecordingSink::default();
    let events: Vec<_> =
        synthesis::run(SynthesisRequest::new("hi"), Endpoint::new(url), &mut sink).collect();

    assert_eq!(events.len(), 1);
    match &events[0] {
        PlaybackEvent::WordAudio { word, segment } => {
            assert_eq!(word, "hi");
            assert_eq!(segment.samples, vec![5, 6, 7, 8]);
            assert_eq!(segment.sample_rate, 16000);
        }
        other => panic!("expected WordAudio, got {other:?}"),
    }
    // Forwarded to the sink exactly once.
    assert_eq!(sink.played.len(), 1);

    let request = server.join().unwrap();
    assert_eq!(request["text"], "hi");
    assert_eq!(request["accent"], "US");
    assert_eq!(request["gender"], "MALE");
}

#[test]
fn service_error_is_terminal_and_stops_consumption() {
    let (url, server) = spawn_server(|socket| {
        read_request(socket);
        socket
            .send(Message::text(r#"{"status":"error","error":"bad voice"}"#))
            .unwrap();
        // Anything after the error must never reach the consumer.
        let late = format!(
            r#"{{"word":"ghost","audio":"{}","status":"ok"}}"#,
            wav_base64(&[1])
        );
        let _ = socket.send(Message::text(late));
        let _ = socket.close(None);
    });

    let mut sink = RecordingSink::default();
    let events: Vec<_> =
        synthesis::run(SynthesisRequest::new("hello"), Endpoint::new(url), &mut sink).collect();

    assert_eq!(events.len(), 1);
    match &events[0] {
        PlaybackEvent::ServiceError { message } => assert_eq!(message, "bad voice"),
        other => panic!("expected ServiceError, got {other:?}"),
    }
    assert!(sink.played.is_empty());
    server.join().unwrap();
}

#[test]
fn malformed_and_incomplete_frames_are_recoverable() {
    let (url, server) = spawn_server(|socket| {
        read_request(socket);
        socket.send(Message::text("<not json>")).unwrap();
        socket
            .send(Message::text(r#"{"status":"queued"}"#))
            .unwrap();
        let frame = format!(
            r#"{{"word":"still","audio":"{}","status":"ok"}}"#,
            wav_base64(&[9, 9])
        );
        socket.send(Message::text(frame)).unwrap();
        finish(socket);
    });

    let mut sink = RecordingSink::default();
    let events: Vec<_> =
        synthesis::run(SynthesisRequest::new("hello"), Endpoint::new(url), &mut sink).collect();

    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0],
        PlaybackEvent::Error(PipelineError::Malformed(_))
    ));
    assert!(matches!(events[1], PlaybackEvent::Incomplete { .. }));
    match &events[2] {
        PlaybackEvent::WordAudio { word, .. } => assert_eq!(word, "still"),
        other => panic!("expected WordAudio, got {other:?}"),
    }
    assert_eq!(sink.played.len(), 1);
    server.join().unwrap();
}

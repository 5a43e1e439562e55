//! Decoding of the `audio` field: base64, then WAV or MP3 into raw PCM.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};

use crate::api::synthesis::types::AudioSegment;
use crate::api::PipelineError;

/// Decode one base64 `audio` field into a PCM segment.
pub fn decode_segment(audio_base64: &str) -> Result<AudioSegment, PipelineError> {
    let bytes = general_purpose::STANDARD
        .decode(audio_base64)
        .map_err(|e| PipelineError::Decode(format!("base64: {e}")))?;
    decode_container(&bytes)
}

/// Sniff the container and decode. RIFF means WAV; anything else is tried
/// as MP3.
pub fn decode_container(bytes: &[u8]) -> Result<AudioSegment, PipelineError> {
    if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)
    } else {
        decode_mp3(bytes)
    }
}

fn decode_wav(bytes: &[u8]) -> Result<AudioSegment, PipelineError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| PipelineError::Decode(format!("wav: {e}")))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| PipelineError::Decode(format!("wav samples: {e}")))?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<_, _>>()
            .map_err(|e| PipelineError::Decode(format!("wav samples: {e}")))?,
    };

    Ok(AudioSegment {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

fn decode_mp3(bytes: &[u8]) -> Result<AudioSegment, PipelineError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes.to_vec()));
    let mut samples: Vec<i16> = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(minimp3::Frame {
                data,
                sample_rate: rate,
                channels,
                ..
            }) => {
                sample_rate = rate as u32;
                // Downmix stereo so playback only ever sees mono MP3 output.
                if channels == 2 {
                    samples.extend(
                        data.chunks(2)
                            .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16),
                    );
                } else {
                    samples.extend(data);
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(PipelineError::Decode(format!("mp3: {e:?}"))),
        }
    }

    if samples.is_empty() {
        return Err(PipelineError::Decode("no audio frames in payload".to_string()));
    }
    Ok(AudioSegment {
        samples,
        sample_rate,
        channels: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut buffer, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        buffer.into_inner()
    }

    #[test]
    fn base64_wav_round_trip() {
        let pcm: Vec<i16> = (0..480).map(|i| (i * 13 % 7000) as i16).collect();
        let encoded = general_purpose::STANDARD.encode(wav_bytes(&pcm, 16000));

        let segment = decode_segment(&encoded).unwrap();
        assert_eq!(segment.samples, pcm);
        assert_eq!(segment.sample_rate, 16000);
        assert_eq!(segment.channels, 1);
    }

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let err = decode_segment("not base64 !!!").unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let encoded = general_purpose::STANDARD.encode(b"definitely not audio");
        let err = decode_segment(&encoded).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }
}

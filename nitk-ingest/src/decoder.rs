//! Waveform decoding
//!
//! Decodes a WAV arrival (or a normalized TDMS artifact) into a
//! [`CanonicalWaveform`] using symphonia. Multi-channel sources are averaged
//! to mono; the source channel count is kept for reporting.

use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::waveform::CanonicalWaveform;

fn decode_err(path: &Path, what: &str, err: impl std::fmt::Display) -> IngestError {
    IngestError::Decode(format!("{} {}: {}", what, path.display(), err))
}

/// Decode an audio file to a mono canonical waveform
///
/// Blocking; callers on the async runtime go through `spawn_blocking`.
pub fn decode_file(path: &Path) -> Result<CanonicalWaveform, IngestError> {
    debug!(path = %path.display(), "Decoding waveform");

    let file = std::fs::File::open(path).map_err(|e| decode_err(path, "failed to open", e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_err(path, "unrecognized audio in", e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| IngestError::Decode(format!("no audio track in {}", path.display())))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or_else(|| {
        IngestError::Decode(format!("sample rate unknown for {}", path.display()))
    })?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err(path, "no decoder for", e))?;

    let mut mono: Vec<f64> = Vec::new();
    let mut buffer: Option<SampleBuffer<f64>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_err(path, "failed reading packet from", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = %path.display(), "Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(decode_err(path, "failed decoding", e)),
        };

        let spec = *decoded.spec();
        let needed = decoded.capacity() * spec.channels.count();
        if buffer.as_ref().map_or(true, |b| b.capacity() < needed) {
            buffer = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = buffer.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        let width = spec.channels.count().max(1);
        mono.extend(
            buf.samples()
                .chunks_exact(width)
                .map(|frame| frame.iter().sum::<f64>() / width as f64),
        );
    }

    debug!(
        path = %path.display(),
        samples = mono.len(),
        sample_rate,
        channels,
        "Waveform decoded"
    );

    CanonicalWaveform::new(mono, sample_rate, channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    #[test]
    fn test_decode_stereo_int16_mixes_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..1_000 {
            writer.write_sample(16_384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let wf = decode_file(&path).unwrap();
        assert_eq!(wf.sample_rate(), 22_050);
        assert_eq!(wf.channels(), 2);
        assert_eq!(wf.len(), 1_000);
        assert!(wf.samples().iter().all(|&s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_decode_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..800 {
            writer.write_sample(if i % 2 == 0 { 0.5f32 } else { -0.5 }).unwrap();
        }
        writer.finalize().unwrap();

        let wf = decode_file(&path).unwrap();
        assert_eq!(wf.len(), 800);
        assert_eq!(wf.channels(), 1);
        assert!((wf.duration_seconds() - 0.1).abs() < 1e-9);
        assert!((wf.samples()[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_rejects_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.wav");
        std::fs::write(&path, b"definitely not RIFF data").unwrap();
        assert!(matches!(decode_file(&path), Err(IngestError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_file(Path::new("/nonexistent/nitk/x.wav")).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn test_decode_empty_wav_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        WavWriter::create(&path, spec).unwrap().finalize().unwrap();
        assert!(matches!(decode_file(&path), Err(IngestError::Decode(_))));
    }
}

//! Container normalization
//!
//! Converts the first channel of the first group of a TDMS recording into a
//! mono 32-bit float WAV artifact that the decoder can read like any other
//! arrival.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::IngestError;
use crate::tdms::{RawSamples, TdmsChannel, TdmsFile};

/// File name prefix marking intermediate artifacts
pub const TEMP_PREFIX: &str = "temp_";

/// Channel property names consulted for the sample rate, in priority order
const SAMPLE_RATE_PROPERTIES: [&str; 2] = ["SampleRate", "sample_rate"];

/// True when `path` names an intermediate artifact that must never be processed
pub fn is_intermediate_artifact(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with(TEMP_PREFIX))
        .unwrap_or(false)
}

/// `<dir>/temp_<stem>.wav` for a container at `<dir>/<stem>.tdms`
pub fn artifact_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}{}.wav", TEMP_PREFIX, stem))
}

/// Sample rate from channel properties, falling back to `default` when
/// neither property holds a positive number
pub fn resolve_sample_rate(channel: &TdmsChannel, default: u32) -> u32 {
    SAMPLE_RATE_PROPERTIES
        .iter()
        .filter_map(|name| channel.property(name).and_then(|v| v.as_f64()))
        .find(|rate| rate.is_finite() && *rate >= 1.0)
        .map(|rate| rate.round().min(u32::MAX as f64) as u32)
        .unwrap_or(default)
}

/// Map samples into [-1.0, 1.0]
///
/// Signed integers divide by 2^(bits-1), unsigned by 2^bits - 1, floats by
/// their own peak magnitude. An all-zero float signal is left untouched.
pub fn rescale(samples: &RawSamples) -> Vec<f32> {
    let values = samples.to_f64();
    let divisor = match samples.integer_full_scale() {
        Some(full_scale) => full_scale,
        None => {
            let peak = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            if peak > 0.0 && peak.is_finite() {
                peak
            } else {
                1.0
            }
        }
    };
    values
        .into_iter()
        .map(|v| (v / divisor).clamp(-1.0, 1.0) as f32)
        .collect()
}

/// TDMS to WAV converter
#[derive(Debug, Clone)]
pub struct FormatNormalizer {
    default_sample_rate: u32,
}

impl FormatNormalizer {
    pub fn new(default_sample_rate: u32) -> Self {
        Self {
            default_sample_rate,
        }
    }

    pub fn default_sample_rate(&self) -> u32 {
        self.default_sample_rate
    }

    /// Convert `input` and write the artifact to `output`, or next to the
    /// input as `temp_<stem>.wav` when `output` is `None`
    ///
    /// Returns the artifact path. Blocking; run it off the async runtime.
    pub fn convert(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf, IngestError> {
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| artifact_path_for(input));

        let file = TdmsFile::read(input)?;
        let group = file.groups.first().ok_or_else(|| {
            IngestError::Decode(format!("{} contains no groups", input.display()))
        })?;
        let channel = group.channels.first().ok_or_else(|| {
            IngestError::Decode(format!(
                "group '{}' in {} contains no channels",
                group.name,
                input.display()
            ))
        })?;
        let data = channel
            .data()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                IngestError::Decode(format!(
                    "channel '{}' in {} has no samples",
                    channel.name,
                    input.display()
                ))
            })?;

        let sample_rate = resolve_sample_rate(channel, self.default_sample_rate);
        let samples = rescale(data);

        debug!(
            "Converting {} ('{}'/'{}', {} samples @ {} Hz)",
            input.display(),
            group.name,
            channel.name,
            samples.len(),
            sample_rate
        );

        write_float_wav(&output, &samples, sample_rate)?;
        Ok(output)
    }

    /// Convert every `*.tdms` file directly inside `dir`
    ///
    /// Outputs land in `out_dir` (default `dir`) as `temp_<stem>.wav`, so a
    /// batch run inside a watched directory is never reprocessed. A file
    /// that fails to convert is logged and skipped.
    pub fn batch_convert(&self, dir: &Path, out_dir: Option<&Path>) -> Result<Vec<PathBuf>, IngestError> {
        if !dir.is_dir() {
            return Err(IngestError::Configuration(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        let out_dir = out_dir.unwrap_or(dir);
        std::fs::create_dir_all(out_dir)?;

        let mut inputs: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| has_extension(p, "tdms"))
            .collect();
        inputs.sort();

        let mut converted = Vec::with_capacity(inputs.len());
        for input in inputs {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let output = out_dir.join(format!("{}{}.wav", TEMP_PREFIX, stem));
            match self.convert(&input, Some(&output)) {
                Ok(path) => converted.push(path),
                Err(e) => warn!("Skipping {}: {}", input.display(), e),
            }
        }

        info!(
            "Batch converted {} TDMS file(s) from {}",
            converted.len(),
            dir.display()
        );
        Ok(converted)
    }
}

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn write_float_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), IngestError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tdms::PropertyValue;

    // Channels are only built by the reader, so go through a parsed file
    fn channel_with(properties: Vec<(&str, PropertyValue)>) -> TdmsChannel {
        let bytes = tdms_bytes(&properties);
        TdmsFile::parse(&bytes).unwrap().groups.remove(0).channels.remove(0)
    }

    /// Minimal one-channel file carrying the given f64/string properties and two i16 samples
    fn tdms_bytes(properties: &[(&str, PropertyValue)]) -> Vec<u8> {
        fn string(out: &mut Vec<u8>, s: &str) {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        let mut meta = Vec::new();
        meta.extend_from_slice(&1u32.to_le_bytes());
        string(&mut meta, "/'g'/'c'");
        meta.extend_from_slice(&20u32.to_le_bytes());
        meta.extend_from_slice(&2u32.to_le_bytes());
        meta.extend_from_slice(&1u32.to_le_bytes());
        meta.extend_from_slice(&2u64.to_le_bytes());
        meta.extend_from_slice(&(properties.len() as u32).to_le_bytes());
        for (name, value) in properties {
            string(&mut meta, name);
            match value {
                PropertyValue::Float(f) => {
                    meta.extend_from_slice(&0x0Au32.to_le_bytes());
                    meta.extend_from_slice(&f.to_le_bytes());
                }
                PropertyValue::String(s) => {
                    meta.extend_from_slice(&0x20u32.to_le_bytes());
                    string(&mut meta, s);
                }
                other => panic!("unsupported test property {:?}", other),
            }
        }
        let raw: Vec<u8> = [100i16, -100].iter().flat_map(|v| v.to_le_bytes()).collect();

        let mut out = Vec::new();
        out.extend_from_slice(b"TDSm");
        out.extend_from_slice(&0x0Eu32.to_le_bytes());
        out.extend_from_slice(&4713u32.to_le_bytes());
        out.extend_from_slice(&((meta.len() + raw.len()) as u64).to_le_bytes());
        out.extend_from_slice(&(meta.len() as u64).to_le_bytes());
        out.extend(meta);
        out.extend(raw);
        out
    }

    #[test]
    fn test_artifact_naming() {
        let artifact = artifact_path_for(Path::new("/data/site1/ch1_0001.tdms"));
        assert_eq!(artifact, PathBuf::from("/data/site1/temp_ch1_0001.wav"));
        assert!(is_intermediate_artifact(&artifact));
        assert!(!is_intermediate_artifact(Path::new("/data/site1/ch1_0001.tdms")));
    }

    #[test]
    fn test_sample_rate_priority() {
        let both = channel_with(vec![
            ("sample_rate", PropertyValue::Float(22_050.0)),
            ("SampleRate", PropertyValue::Float(48_000.0)),
        ]);
        assert_eq!(resolve_sample_rate(&both, 44_100), 48_000);

        let fallback = channel_with(vec![("sample_rate", PropertyValue::Float(22_050.0))]);
        assert_eq!(resolve_sample_rate(&fallback, 44_100), 22_050);

        let textual = channel_with(vec![("SampleRate", PropertyValue::String("16000".into()))]);
        assert_eq!(resolve_sample_rate(&textual, 44_100), 16_000);
    }

    #[test]
    fn test_non_positive_rate_uses_default() {
        let zero = channel_with(vec![("SampleRate", PropertyValue::Float(0.0))]);
        assert_eq!(resolve_sample_rate(&zero, 44_100), 44_100);
        let none = channel_with(vec![]);
        assert_eq!(resolve_sample_rate(&none, 8_000), 8_000);
    }

    #[test]
    fn test_rescale_integers_stay_in_range() {
        let scaled = rescale(&RawSamples::I16(vec![i16::MIN, 0, i16::MAX]));
        assert_eq!(scaled[0], -1.0);
        assert_eq!(scaled[1], 0.0);
        assert!(scaled[2] < 1.0 && scaled[2] > 0.999);

        let unsigned = rescale(&RawSamples::U8(vec![0, 255]));
        assert_eq!(unsigned, vec![0.0, 1.0]);

        let wide = rescale(&RawSamples::I64(vec![i64::MIN, i64::MAX]));
        assert!(wide.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_rescale_float_by_peak() {
        let scaled = rescale(&RawSamples::F64(vec![0.5, -2.0, 1.0]));
        assert_eq!(scaled, vec![0.25, -1.0, 0.5]);
    }

    #[test]
    fn test_rescale_all_zero_float_untouched() {
        let scaled = rescale(&RawSamples::F32(vec![0.0; 16]));
        assert!(scaled.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_convert_writes_mono_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ch3_0001.tdms");
        std::fs::write(
            &input,
            tdms_bytes(&[("SampleRate", PropertyValue::Float(8_000.0))]),
        )
        .unwrap();

        let output = FormatNormalizer::new(44_100).convert(&input, None).unwrap();
        assert_eq!(output, dir.path().join("temp_ch3_0001.wav"));

        let reader = hound::WavReader::open(&output).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 8_000);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, SampleFormat::Float);
        let samples: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 100.0 / 32_768.0).abs() < 1e-7);
    }

    #[test]
    fn test_convert_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.tdms");
        std::fs::write(&input, b"not a tdms file at all, just text padding").unwrap();
        let err = FormatNormalizer::new(44_100).convert(&input, None).unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)));
    }

    #[test]
    fn test_batch_convert_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.tdms"), tdms_bytes(&[])).unwrap();
        std::fs::write(dir.path().join("b.TDMS"), tdms_bytes(&[])).unwrap();
        std::fs::write(dir.path().join("broken.tdms"), b"TDSm").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        let out = dir.path().join("wav");

        let converted = FormatNormalizer::new(44_100)
            .batch_convert(dir.path(), Some(&out))
            .unwrap();
        assert_eq!(
            converted,
            vec![out.join("temp_a.wav"), out.join("temp_b.wav")]
        );
    }

    #[test]
    fn test_batch_outputs_in_place_are_intermediate_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ch1_0001.tdms"), tdms_bytes(&[])).unwrap();

        let converted = FormatNormalizer::new(44_100)
            .batch_convert(dir.path(), None)
            .unwrap();
        assert_eq!(converted, vec![dir.path().join("temp_ch1_0001.wav")]);
        assert!(converted.iter().all(|p| is_intermediate_artifact(p)));
    }
}

//! Test signal generation

use std::f64::consts::PI;
use std::path::Path;

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Sine of `freq` Hz at `amplitude` plus uniform noise, reproducible per `seed`
pub fn sine_with_noise(
    freq: f64,
    amplitude: f64,
    noise: f64,
    sample_rate: u32,
    seconds: f64,
    seed: u64,
) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = (seconds * sample_rate as f64).round() as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            amplitude * (2.0 * PI * freq * t).sin() + noise * rng.gen_range(-1.0..1.0)
        })
        .collect()
}

/// Mono 16-bit WAV from samples in [-1, 1]
pub fn write_wav_i16(path: &Path, samples: &[f64], sample_rate: u32) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f64) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

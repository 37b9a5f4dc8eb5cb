//! Narrowband power spectrum level

use std::f64::consts::PI;

use num_complex::Complex64;
use rustfft::FftPlanner;

/// Hann-windowed one-sided power spectrum level in dB re `reference`
///
/// The window spans the whole signal; the first `nfft` windowed samples are
/// transformed (zero-padded when shorter). Returns bin frequencies and levels.
pub fn power_spectrum_level(
    signal: &[f64],
    fs: f64,
    nfft: usize,
    reference: f64,
) -> (Vec<f64>, Vec<f64>) {
    if nfft == 0 || signal.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let len = signal.len();
    let mut buffer: Vec<Complex64> = signal
        .iter()
        .take(nfft)
        .enumerate()
        .map(|(n, &x)| {
            let w = if len > 1 {
                0.5 - 0.5 * (2.0 * PI * n as f64 / (len - 1) as f64).cos()
            } else {
                1.0
            };
            Complex64::new(x * w, 0.0)
        })
        .collect();
    buffer.resize(nfft, Complex64::new(0.0, 0.0));

    FftPlanner::<f64>::new().plan_fft_forward(nfft).process(&mut buffer);

    let bins = nfft / 2 + 1;
    let scale = (nfft * nfft) as f64;
    let ref2 = reference * reference;
    let levels = buffer[..bins]
        .iter()
        .enumerate()
        .map(|(k, c)| {
            let mut power = c.norm_sqr() / scale;
            // Fold negative frequencies except DC and Nyquist
            if k != 0 && !(nfft % 2 == 0 && k == nfft / 2) {
                power *= 2.0;
            }
            10.0 * (power / ref2).log10()
        })
        .collect();
    let freqs = (0..bins).map(|k| k as f64 * fs / nfft as f64).collect();
    (freqs, levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_at_tone_frequency() {
        let fs = 8_000.0;
        let tone: Vec<f64> = (0..8_000)
            .map(|n| (2.0 * PI * 1_000.0 * n as f64 / fs).sin())
            .collect();
        let (freqs, levels) = power_spectrum_level(&tone, fs, 8_000, 20e-6);
        assert_eq!(freqs.len(), 4_001);
        let (peak_bin, _) = levels
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((freqs[peak_bin] - 1_000.0).abs() < 1.0);
    }

    #[test]
    fn test_empty_input() {
        let (f, l) = power_spectrum_level(&[], 8_000.0, 256, 20e-6);
        assert!(f.is_empty() && l.is_empty());
    }
}

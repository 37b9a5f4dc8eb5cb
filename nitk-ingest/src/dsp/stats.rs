//! Level and distribution statistics over sound pressure signals

/// Mean of squared values; 0.0 for an empty signal
pub fn mean_square(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|v| v * v).sum::<f64>() / signal.len() as f64
}

/// Equivalent continuous level, 10 log10(mean(p^2) / pref^2)
pub fn equivalent_level(signal: &[f64], reference: f64) -> f64 {
    10.0 * (mean_square(signal) / (reference * reference)).log10()
}

/// Peak level, 10 log10(max(p^2) / pref^2)
pub fn peak_level(signal: &[f64], reference: f64) -> f64 {
    let peak = signal.iter().fold(0.0f64, |acc, v| acc.max(v * v));
    10.0 * (peak / (reference * reference)).log10()
}

/// Pearson kurtosis m4 / m2^2 with biased central moments
///
/// A normal distribution gives 3.0. NaN when the signal is empty or has no
/// variance.
pub fn kurtosis(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return f64::NAN;
    }
    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    let (m2, m4) = signal.iter().fold((0.0, 0.0), |(m2, m4), v| {
        let d = v - mean;
        let d2 = d * d;
        (m2 + d2, m4 + d2 * d2)
    });
    let (m2, m4) = (m2 / n, m4 / n);
    if m2 == 0.0 {
        return f64::NAN;
    }
    m4 / (m2 * m2)
}

/// Means over consecutive blocks of floor(`seconds` * `fs`) samples
///
/// Samples past the last whole block are dropped.
pub fn block_means(signal: &[f64], fs: f64, seconds: f64) -> Vec<f64> {
    let width = (seconds * fs).floor() as usize;
    if width == 0 {
        return Vec::new();
    }
    signal
        .chunks_exact(width)
        .map(|block| block.iter().sum::<f64>() / width as f64)
        .collect()
}

/// Time-averaged level series over blocks of `seconds`
///
/// Returns block start times and levels.
pub fn time_averaged_level(
    signal: &[f64],
    fs: f64,
    seconds: f64,
    reference: f64,
) -> (Vec<f64>, Vec<f64>) {
    let squared: Vec<f64> = signal.iter().map(|v| v * v).collect();
    let levels: Vec<f64> = block_means(&squared, fs, seconds)
        .into_iter()
        .map(|ms| 10.0 * (ms / (reference * reference)).log10())
        .collect();
    let times = (0..levels.len()).map(|i| i as f64 * seconds).collect();
    (times, levels)
}

/// Round to `places` decimals; non-finite values pass through
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const PREF: f64 = 20e-6;

    #[test]
    fn test_one_pascal_rms_is_94_db() {
        let amplitude = 2f64.sqrt();
        let sine: Vec<f64> = (0..48_000)
            .map(|n| amplitude * (2.0 * std::f64::consts::PI * 1_000.0 * n as f64 / 48_000.0).sin())
            .collect();
        assert_relative_eq!(equivalent_level(&sine, PREF), 93.979, epsilon = 0.01);
        assert_relative_eq!(peak_level(&sine, PREF), 96.99, epsilon = 0.01);
    }

    #[test]
    fn test_silence_levels_are_negative_infinity() {
        assert_eq!(equivalent_level(&[0.0; 8], PREF), f64::NEG_INFINITY);
        assert_eq!(peak_level(&[0.0; 8], PREF), f64::NEG_INFINITY);
    }

    #[test]
    fn test_kurtosis_values() {
        // Symmetric two-level signal has kurtosis exactly 1
        assert_relative_eq!(kurtosis(&[1.0, -1.0, 1.0, -1.0]), 1.0);
        // Uniform on five points: m2 = 2, m4 = 6.8
        assert_relative_eq!(kurtosis(&[-2.0, -1.0, 0.0, 1.0, 2.0]), 1.7, epsilon = 1e-12);
        assert!(kurtosis(&[3.0; 10]).is_nan());
        assert!(kurtosis(&[]).is_nan());
    }

    #[test]
    fn test_block_means_drop_tail() {
        let means = block_means(&[1.0, 3.0, 5.0, 7.0, 100.0], 4.0, 0.5);
        assert_eq!(means, vec![2.0, 6.0]);
        assert!(block_means(&[1.0; 10], 4.0, 0.1).is_empty());
    }

    #[test]
    fn test_time_averaged_level_blocks() {
        let signal = vec![1.0; 10];
        let (times, levels) = time_averaged_level(&signal, 4.0, 1.0, 1.0);
        assert_eq!(times, vec![0.0, 1.0]);
        assert_eq!(levels, vec![0.0, 0.0]);

        let (_, short) = time_averaged_level(&signal[..3], 4.0, 1.0, 1.0);
        assert!(short.is_empty());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3.14159, 2), 3.14);
        assert!(round_to(f64::NAN, 2).is_nan());
    }
}

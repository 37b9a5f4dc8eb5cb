//! A and C frequency weighting (IEC 61672-1)

use std::f64::consts::PI;

use num_complex::Complex64;

use super::filter::{SosFilter, Zpk};

/// Pole frequencies of the weighting networks in Hz
const F1: f64 = 20.598_997;
const F2: f64 = 107.652_65;
const F3: f64 = 737.862_23;
const F4: f64 = 12_194.217;

/// Gain corrections that put each curve at 0 dB at 1 kHz
const A1000_DB: f64 = 2.0;
const C1000_DB: f64 = 0.062;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    A,
    C,
}

impl Weighting {
    /// Analog prototype
    pub fn analog(&self) -> Zpk {
        let pole = |f: f64| Complex64::new(-2.0 * PI * f, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        let w4 = 2.0 * PI * F4;

        match self {
            Weighting::A => Zpk {
                zeros: vec![zero; 4],
                poles: vec![pole(F1), pole(F1), pole(F2), pole(F3), pole(F4), pole(F4)],
                gain: w4 * w4 * 10f64.powf(A1000_DB / 20.0),
            },
            Weighting::C => Zpk {
                zeros: vec![zero; 2],
                poles: vec![pole(F1), pole(F1), pole(F4), pole(F4)],
                gain: w4 * w4 * 10f64.powf(C1000_DB / 20.0),
            },
        }
    }

    /// Digital filter for sample rate `fs`
    pub fn design(&self, fs: f64) -> SosFilter {
        self.analog().bilinear(fs).to_sos()
    }

    pub fn apply(&self, signal: &[f64], fs: f64) -> Vec<f64> {
        self.design(fs).filter(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_a_weighting_reference_points() {
        let filter = Weighting::A.design(48_000.0);
        assert!(filter.is_stable());
        assert_abs_diff_eq!(filter.gain_db(1_000.0, 48_000.0), 0.0, epsilon = 0.1);
        assert_abs_diff_eq!(filter.gain_db(100.0, 48_000.0), -19.1, epsilon = 0.3);
        assert_abs_diff_eq!(filter.gain_db(31.5, 48_000.0), -39.4, epsilon = 0.5);
    }

    #[test]
    fn test_c_weighting_reference_points() {
        let filter = Weighting::C.design(48_000.0);
        assert!(filter.is_stable());
        assert_abs_diff_eq!(filter.gain_db(1_000.0, 48_000.0), 0.0, epsilon = 0.1);
        assert_abs_diff_eq!(filter.gain_db(31.5, 48_000.0), -3.0, epsilon = 0.3);
        assert_abs_diff_eq!(filter.gain_db(100.0, 48_000.0), -0.3, epsilon = 0.2);
    }

    #[test]
    fn test_apply_preserves_length() {
        let signal: Vec<f64> = (0..4_410).map(|n| (n as f64 * 0.1).sin()).collect();
        let out = Weighting::A.apply(&signal, 44_100.0);
        assert_eq!(out.len(), signal.len());
        assert!(out.iter().all(|v| v.is_finite()));
    }
}

//! IIR filter design and application
//!
//! Filters are designed in zero/pole/gain form, mapped to the z-plane with
//! the bilinear transform and run as cascaded second-order sections so that
//! narrow low-frequency bands stay numerically stable.

use num_complex::Complex64;

/// Zero/pole/gain description of a transfer function
#[derive(Debug, Clone)]
pub struct Zpk {
    pub zeros: Vec<Complex64>,
    pub poles: Vec<Complex64>,
    pub gain: f64,
}

impl Zpk {
    /// Analog Butterworth lowpass prototype with cutoff 1 rad/s
    pub fn butterworth(order: usize) -> Self {
        let n = order as i32;
        let poles = (-(n - 1)..=(n - 1))
            .step_by(2)
            .map(|m| {
                -Complex64::from_polar(1.0, std::f64::consts::PI * m as f64 / (2.0 * order as f64))
            })
            .collect();
        Self {
            zeros: Vec::new(),
            poles,
            gain: 1.0,
        }
    }

    /// Lowpass prototype to bandpass centred on `wo` with bandwidth `bw` (rad/s)
    pub fn lowpass_to_bandpass(&self, wo: f64, bw: f64) -> Self {
        let half = bw / 2.0;
        let wo2 = Complex64::new(wo * wo, 0.0);
        let split = |roots: &[Complex64]| -> Vec<Complex64> {
            let scaled: Vec<Complex64> = roots.iter().map(|&r| r * half).collect();
            let mut out: Vec<Complex64> = scaled.iter().map(|&r| r + (r * r - wo2).sqrt()).collect();
            out.extend(scaled.iter().map(|&r| r - (r * r - wo2).sqrt()));
            out
        };

        let degree = self.relative_degree();
        let mut zeros = split(&self.zeros);
        zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(degree));

        Self {
            zeros,
            poles: split(&self.poles),
            gain: self.gain * bw.powi(degree as i32),
        }
    }

    /// Bilinear transform at sample rate `fs`, without pre-warping
    pub fn bilinear(&self, fs: f64) -> Self {
        let fs2 = Complex64::new(2.0 * fs, 0.0);
        let map = |&r: &Complex64| (fs2 + r) / (fs2 - r);

        let mut zeros: Vec<Complex64> = self.zeros.iter().map(map).collect();
        zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(self.relative_degree()));

        let num: Complex64 = self.zeros.iter().map(|&z| fs2 - z).product();
        let den: Complex64 = self.poles.iter().map(|&p| fs2 - p).product();

        Self {
            zeros,
            poles: self.poles.iter().map(map).collect(),
            gain: self.gain * (num / den).re,
        }
    }

    fn relative_degree(&self) -> usize {
        self.poles.len().saturating_sub(self.zeros.len())
    }

    /// Factor a digital zpk into second-order sections
    ///
    /// Conjugate pairs share a section; real roots are paired lowest with
    /// highest so a bandpass section gets one zero at +1 and one at -1.
    pub fn to_sos(&self) -> SosFilter {
        let pole_pairs = pair_roots(&self.poles);
        let zero_pairs = pair_roots(&self.zeros);
        let count = pole_pairs.len().max(zero_pairs.len()).max(1);

        let per_section = self.gain.abs().powf(1.0 / count as f64);
        let sections = (0..count)
            .map(|i| {
                let mut b = quadratic(zero_pairs.get(i).copied().unwrap_or([None, None]));
                let a = quadratic(pole_pairs.get(i).copied().unwrap_or([None, None]));
                let scale = if i == 0 {
                    per_section.copysign(self.gain)
                } else {
                    per_section
                };
                b.iter_mut().for_each(|c| *c *= scale);
                Biquad { b, a }
            })
            .collect();

        SosFilter { sections }
    }
}

type RootPair = [Option<Complex64>; 2];

fn pair_roots(roots: &[Complex64]) -> Vec<RootPair> {
    const IMAG_TOL: f64 = 1e-10;
    let is_real = |r: &Complex64| r.im.abs() <= IMAG_TOL * r.norm().max(1.0);

    let mut pairs: Vec<RootPair> = roots
        .iter()
        .filter(|r| !is_real(r) && r.im > 0.0)
        .map(|r| [Some(*r), Some(r.conj())])
        .collect();

    let mut reals: Vec<f64> = roots.iter().filter(|r| is_real(r)).map(|r| r.re).collect();
    reals.sort_by(|a, b| a.total_cmp(b));
    let (mut lo, mut hi) = (0, reals.len());
    while hi - lo >= 2 {
        pairs.push([
            Some(Complex64::new(reals[lo], 0.0)),
            Some(Complex64::new(reals[hi - 1], 0.0)),
        ]);
        lo += 1;
        hi -= 1;
    }
    if hi - lo == 1 {
        pairs.push([Some(Complex64::new(reals[lo], 0.0)), None]);
    }
    pairs
}

/// Coefficients of (1 - r1 z^-1)(1 - r2 z^-1)
fn quadratic(pair: RootPair) -> [f64; 3] {
    match pair {
        [Some(r1), Some(r2)] => [1.0, -(r1 + r2).re, (r1 * r2).re],
        [Some(r), None] | [None, Some(r)] => [1.0, -r.re, 0.0],
        [None, None] => [1.0, 0.0, 0.0],
    }
}

/// One second-order section, `a[0]` normalized to 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    fn run(&self, signal: &mut [f64]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let (mut z1, mut z2) = (0.0, 0.0);
        for x in signal.iter_mut() {
            let input = *x;
            let y = b0 * input + z1;
            z1 = b1 * input - a1 * y + z2;
            z2 = b2 * input - a2 * y;
            *x = y;
        }
    }

    fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = Complex64::new(self.b[0], 0.0) + z1 * self.b[1] + z2 * self.b[2];
        let den = Complex64::new(self.a[0], 0.0) + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Causal filtering from a zero initial state
    pub fn filter(&self, input: &[f64]) -> Vec<f64> {
        let mut out = input.to_vec();
        for section in &self.sections {
            section.run(&mut out);
        }
        out
    }

    /// Complex response at `freq` Hz for sample rate `fs`
    pub fn response(&self, freq: f64, fs: f64) -> Complex64 {
        let w = 2.0 * std::f64::consts::PI * freq / fs;
        self.sections.iter().map(|s| s.response(w)).product()
    }

    /// Magnitude response in dB
    pub fn gain_db(&self, freq: f64, fs: f64) -> f64 {
        20.0 * self.response(freq, fs).norm().log10()
    }

    /// True when every pole lies strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(|s| {
            let [_, a1, a2] = s.a;
            a2.abs() < 1.0 && a1.abs() < 1.0 + a2
        })
    }
}

/// Digital Butterworth bandpass between `low` and `high` Hz
///
/// `order` is the prototype order; the bandpass has twice as many poles.
/// Returns `None` unless `0 < low < high < fs / 2`.
pub fn butter_bandpass(order: usize, low: f64, high: f64, fs: f64) -> Option<SosFilter> {
    let nyquist = fs / 2.0;
    if !(low > 0.0 && low < high && high < nyquist) {
        return None;
    }
    // Design on a normalized fs of 2 with pre-warped edges
    let warp = |f: f64| 4.0 * (std::f64::consts::PI * (f / nyquist) / 2.0).tan();
    let (lo, hi) = (warp(low), warp(high));
    let zpk = Zpk::butterworth(order)
        .lowpass_to_bandpass((lo * hi).sqrt(), hi - lo)
        .bilinear(2.0);
    Some(zpk.to_sos())
}

//! Third-octave filter bank (base-2, IEC 61260 style)
//!
//! Band `k` is centred on 1000 * 2^((k - 20) / 3) Hz, so index 0 is the
//! nominal 10 Hz band and index 33 the nominal 20 kHz band.

use super::filter::{butter_bandpass, SosFilter};

pub const BAND_COUNT: usize = 34;

/// Index of the 1 kHz reference band
const REFERENCE_BAND: i32 = 20;

/// Butterworth prototype order; each bandpass has twice as many poles
const PROTOTYPE_ORDER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub index: usize,
    pub center: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Band {
    pub fn new(index: usize) -> Self {
        let center = 1000.0 * 2f64.powf((index as i32 - REFERENCE_BAND) as f64 / 3.0);
        let edge = 2f64.powf(1.0 / 6.0);
        Self {
            index,
            center,
            lower: center / edge,
            upper: center * edge,
        }
    }
}

/// Bandpass filters for every band at one sample rate
///
/// Bands whose upper edge reaches Nyquist have no filter.
#[derive(Debug, Clone)]
pub struct ThirdOctaveBank {
    bands: Vec<(Band, Option<SosFilter>)>,
}

impl ThirdOctaveBank {
    pub fn new(fs: f64) -> Self {
        let bands = (0..BAND_COUNT)
            .map(Band::new)
            .map(|band| {
                let filter = butter_bandpass(PROTOTYPE_ORDER, band.lower, band.upper, fs);
                (band, filter)
            })
            .collect();
        Self { bands }
    }

    pub fn band(&self, index: usize) -> Option<&Band> {
        self.bands.get(index).map(|(b, _)| b)
    }

    /// Filter `signal` into band `index`; `None` when the band is unavailable
    pub fn filter(&self, index: usize, signal: &[f64]) -> Option<Vec<f64>> {
        let (_, filter) = self.bands.get(index)?;
        filter.as_ref().map(|f| f.filter(signal))
    }
}

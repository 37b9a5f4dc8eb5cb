//! Acoustic metrics engine
//!
//! Turns a [`CanonicalWaveform`] into the fixed metric bundle: broadband,
//! A- and C-weighted equivalent and peak levels, kurtosis of each, plus
//! per-band level and kurtosis over nine octave-spaced third-octave bands
//! from 63 Hz to 16 kHz.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::decoder::decode_file;
use crate::dsp::spectrum::power_spectrum_level;
use crate::dsp::stats::{
    block_means, equivalent_level, kurtosis, peak_level, round_to, time_averaged_level,
};
use crate::dsp::{ThirdOctaveBank, Weighting, BAND_COUNT};
use crate::error::IngestError;
use crate::models::{finite, scalar_from_series, LivePayload, Metric, Spectrum, SpectrumPoint};
use crate::waveform::CanonicalWaveform;

/// Reference sound pressure, 20 µPa
pub const REFERENCE_PRESSURE: f64 = 2.0e-5;

/// First reported third-octave band (63 Hz) and the stride between reported bands
pub const BAND_OFFSET: usize = 8;
pub const BAND_STRIDE: usize = 3;

/// Labels of the reported bands, in band order
pub const BAND_LABELS: [&str; 9] = [
    "63 Hz", "125 Hz", "250 Hz", "500 Hz", "1000 Hz", "2000 Hz", "4000 Hz", "8000 Hz", "16000 Hz",
];

/// Block length for per-band kurtosis
const KURTOSIS_BLOCK_SECONDS: f64 = 0.125;
/// Block length for per-band level series
const LEVEL_BLOCK_SECONDS: f64 = 1.0;

/// Indices of the reported bands
pub fn reported_bands() -> impl Iterator<Item = usize> {
    (BAND_OFFSET..BAND_COUNT).step_by(BAND_STRIDE)
}

/// Per-band results; `None` when the band lies above Nyquist
#[derive(Debug, Clone, PartialEq)]
pub struct BandMetrics {
    pub label: &'static str,
    pub center_hz: f64,
    pub kurtosis: Option<f64>,
    pub levels: Option<Vec<f64>>,
}

/// Full metric bundle for one recording
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticMetrics {
    pub sampling_rate: u32,
    pub duration: f64,
    pub channels: usize,
    pub leq: f64,
    pub laeq: f64,
    pub lceq: f64,
    pub peak_spl: f64,
    pub peak_aspl: f64,
    pub peak_cspl: f64,
    pub total_kurtosis: f64,
    pub a_weighted_kurtosis: f64,
    pub c_weighted_kurtosis: f64,
    pub bands: Vec<BandMetrics>,
}

impl AcousticMetrics {
    /// Band levels collapsed to one scalar each (first 1 s block, 0.0 if shorter)
    pub fn frequency_spl(&self) -> Spectrum {
        Spectrum(
            self.bands
                .iter()
                .map(|b| {
                    SpectrumPoint::new(b.label, b.levels.as_deref().map(scalar_from_series))
                })
                .collect(),
        )
    }

    pub fn frequency_kurtosis(&self) -> Spectrum {
        Spectrum(
            self.bands
                .iter()
                .map(|b| SpectrumPoint::new(b.label, b.kurtosis))
                .collect(),
        )
    }

    /// Metrics in persistence order
    pub fn to_metrics(&self) -> Vec<Metric> {
        vec![
            Metric::numeric("leq", self.leq),
            Metric::numeric("laeq", self.laeq),
            Metric::numeric("lceq", self.lceq),
            Metric::numeric("peak_spl", self.peak_spl),
            Metric::numeric("peak_aspl", self.peak_aspl),
            Metric::numeric("peak_cspl", self.peak_cspl),
            Metric::numeric("total_kurtosis", self.total_kurtosis),
            Metric::numeric("a_weighted_kurtosis", self.a_weighted_kurtosis),
            Metric::numeric("c_weighted_kurtosis", self.c_weighted_kurtosis),
            Metric::numeric("sampling_rate", self.sampling_rate as f64),
            Metric::numeric("duration", self.duration),
            Metric::numeric("channels", self.channels as f64),
            Metric::spectrum("frequency_spl", self.frequency_spl().0),
            Metric::spectrum("frequency_kurtosis", self.frequency_kurtosis().0),
        ]
    }

    pub fn live_payload(&self, file_path: &str) -> LivePayload {
        LivePayload {
            file_path: file_path.to_string(),
            sampling_rate: self.sampling_rate as f64,
            duration: self.duration,
            channels: self.channels as f64,
            leq: finite(self.leq),
            laeq: finite(self.laeq),
            lceq: finite(self.lceq),
            peak_spl: finite(self.peak_spl),
            peak_aspl: finite(self.peak_aspl),
            peak_cspl: finite(self.peak_cspl),
            total_kurtosis: finite(self.total_kurtosis),
            a_weighted_kurtosis: finite(self.a_weighted_kurtosis),
            c_weighted_kurtosis: finite(self.c_weighted_kurtosis),
            frequency_spl: self.frequency_spl(),
            frequency_kurtosis: self.frequency_kurtosis(),
        }
    }
}

/// Narrowband level spectrum of one recording; `None` marks empty bins
#[derive(Debug, Clone, Serialize)]
pub struct PowerSpectrum {
    pub sample_rate: u32,
    pub nfft: usize,
    pub frequencies: Vec<f64>,
    pub levels: Vec<Option<f64>>,
}

/// Stateless metrics calculator
#[derive(Debug, Clone, Copy)]
pub struct MetricsEngine {
    reference_pressure: f64,
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self {
            reference_pressure: REFERENCE_PRESSURE,
        }
    }
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `path` and compute its metrics. Blocking.
    pub fn compute_file(&self, path: &Path) -> Result<AcousticMetrics, IngestError> {
        let waveform = decode_file(path)?;
        self.compute(&waveform)
    }

    pub fn compute(&self, waveform: &CanonicalWaveform) -> Result<AcousticMetrics, IngestError> {
        let samples = waveform.samples();
        if let Some(index) = samples.iter().position(|v| !v.is_finite()) {
            return Err(IngestError::Compute(format!(
                "non-finite sample at index {}",
                index
            )));
        }

        let fs = waveform.sample_rate() as f64;
        let pref = self.reference_pressure;
        let a_weighted = Weighting::A.apply(samples, fs);
        let c_weighted = Weighting::C.apply(samples, fs);

        let bank = ThirdOctaveBank::new(fs);
        let bands = BAND_LABELS
            .iter()
            .zip(reported_bands())
            .map(|(&label, index)| {
                let center_hz = bank.band(index).map(|b| b.center).unwrap_or(0.0);
                match bank.filter(index, samples) {
                    Some(band) => BandMetrics {
                        label,
                        center_hz,
                        kurtosis: finite(round_to(
                            kurtosis(&block_means(&band, fs, KURTOSIS_BLOCK_SECONDS)),
                            2,
                        )),
                        levels: Some(time_averaged_level(&band, fs, LEVEL_BLOCK_SECONDS, pref).1),
                    },
                    None => {
                        debug!("Band {} unavailable at {} Hz sampling", label, fs);
                        BandMetrics {
                            label,
                            center_hz,
                            kurtosis: None,
                            levels: None,
                        }
                    }
                }
            })
            .collect();

        Ok(AcousticMetrics {
            sampling_rate: waveform.sample_rate(),
            duration: waveform.duration_seconds(),
            channels: waveform.channels(),
            leq: equivalent_level(samples, pref),
            laeq: equivalent_level(&a_weighted, pref),
            lceq: equivalent_level(&c_weighted, pref),
            peak_spl: peak_level(samples, pref),
            peak_aspl: peak_level(&a_weighted, pref),
            peak_cspl: peak_level(&c_weighted, pref),
            total_kurtosis: kurtosis(samples),
            a_weighted_kurtosis: kurtosis(&a_weighted),
            c_weighted_kurtosis: kurtosis(&c_weighted),
            bands,
        })
    }

    /// Hann-windowed power spectrum level over the first `nfft` samples
    pub fn power_spectrum(&self, waveform: &CanonicalWaveform, nfft: usize) -> PowerSpectrum {
        let fs = waveform.sample_rate();
        let (frequencies, levels) =
            power_spectrum_level(waveform.samples(), fs as f64, nfft, self.reference_pressure);
        PowerSpectrum {
            sample_rate: fs,
            nfft,
            frequencies,
            levels: levels.into_iter().map(finite).collect(),
        }
    }
}

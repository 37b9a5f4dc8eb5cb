//! Signal processing primitives behind the acoustic metrics
//!
//! - `filter`: zpk design, bilinear transform, second-order sections
//! - `weighting`: A and C frequency weighting
//! - `bands`: third-octave filter bank
//! - `stats`: levels, kurtosis, block averaging
//! - `spectrum`: narrowband power spectrum level

pub mod bands;
pub mod filter;
pub mod spectrum;
pub mod stats;
pub mod weighting;

pub use bands::{Band, ThirdOctaveBank, BAND_COUNT};
pub use weighting::Weighting;

//! Test Helper Utilities
//!
//! Shared utilities for testing nitk-ingest

#![allow(dead_code)]

pub mod db_utils;
pub mod signal;
pub mod tdms_writer;

pub use db_utils::{create_test_pipeline, TestEnv};
pub use signal::{sine_with_noise, write_wav_i16};
pub use tdms_writer::write_tdms_f64;

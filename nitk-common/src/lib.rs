//! # NITK Common Library
//!
//! Shared code for the Noise Info Toolkit services:
//! - Error types
//! - Bootstrap configuration (TOML + environment)
//! - Event types (IngestEvent enum) and the EventBus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};

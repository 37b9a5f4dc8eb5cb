//! Shared error type for the NITK crates

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across `nitk-common`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading bootstrap configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Bootstrap configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML file could not be parsed
    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

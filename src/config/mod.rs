pub mod profile;
pub mod settings;

use std::path::PathBuf;

use thiserror::Error;

pub use profile::{ValidationProfile, ValidationThresholds};
pub use settings::Settings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid validation thresholds: {0}")]
    Thresholds(String),

    #[error("Cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

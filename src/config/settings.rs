use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::profile::{ValidationProfile, ValidationThresholds};
use crate::config::ConfigError;

pub const MODEL_PATH_KEY: &str         = "NEUROSCAN_MODEL_PATH";
pub const IMAGE_SIZE_KEY: &str         = "NEUROSCAN_IMAGE_SIZE";
pub const PROFILE_KEY: &str            = "NEUROSCAN_VALIDATION_PROFILE";
pub const THRESHOLDS_FILE_KEY: &str    = "NEUROSCAN_THRESHOLDS_FILE";
pub const CLASS_DIR_KEY: &str          = "NEUROSCAN_CLASS_DIR";
pub const UPLOAD_DIR_KEY: &str         = "NEUROSCAN_UPLOAD_DIR";
pub const MAX_UPLOAD_SIZE_KEY: &str    = "NEUROSCAN_MAX_UPLOAD_SIZE";
pub const BIND_ADDR_KEY: &str          = "NEUROSCAN_BIND_ADDR";
pub const LOW_CONFIDENCE_KEY: &str     = "NEUROSCAN_LOW_CONFIDENCE";
pub const LOG_KEY: &str                = "NEUROSCAN_LOG";

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// JSON model artifact consumed by the classifier adapter.
    pub model_path: PathBuf,
    /// Side length of the square classifier input.
    pub image_size: u32,
    pub profile: ValidationProfile,
    /// Effective thresholds: the profile's set, or the thresholds file if given.
    pub thresholds: ValidationThresholds,
    /// File the thresholds were loaded from, replacing the profile's set.
    pub thresholds_file: Option<PathBuf>,
    /// Directory whose sub-folders name the classes.
    pub class_dir: PathBuf,
    pub upload_dir: PathBuf,
    /// Upload limit in bytes.
    pub max_upload_size: usize,
    pub bind_addr: String,
    /// Top-prediction confidence below which an advisory note is attached.
    pub low_confidence_threshold: f64,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model_path: PathBuf::from("models/brain_tumor_model.json"),
            image_size: 150,
            profile: ValidationProfile::Strict,
            thresholds: ValidationThresholds::strict(),
            thresholds_file: None,
            class_dir: PathBuf::from("static/Brain Folders/Training"),
            upload_dir: PathBuf::from("static/uploads"),
            max_upload_size: 10 * 1024 * 1024,
            bind_addr: "127.0.0.1:8000".to_owned(),
            low_confidence_threshold: 0.6,
            log_filter: "info".to_owned(),
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and reads the process environment.
    pub fn from_env() -> Result<Settings, ConfigError> {
        dotenv::dotenv().ok();
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; unset keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let image_size: u32 = parse_or(&get, IMAGE_SIZE_KEY, defaults.image_size)?;
        if image_size == 0 {
            return Err(invalid(IMAGE_SIZE_KEY, "0", "must be at least 1"));
        }

        let profile: ValidationProfile = parse_or(&get, PROFILE_KEY, defaults.profile)?;
        let thresholds_file = get(THRESHOLDS_FILE_KEY).map(PathBuf::from);
        let thresholds = match &thresholds_file {
            Some(path) => ValidationThresholds::load_json(path)?,
            None => profile.thresholds(),
        };

        let low_confidence_threshold: f64 =
            parse_or(&get, LOW_CONFIDENCE_KEY, defaults.low_confidence_threshold)?;
        if !(low_confidence_threshold > 0.0 && low_confidence_threshold <= 1.0) {
            return Err(invalid(
                LOW_CONFIDENCE_KEY,
                &low_confidence_threshold.to_string(),
                "must lie within (0, 1]",
            ));
        }

        Ok(Settings {
            model_path: get(MODEL_PATH_KEY).map(PathBuf::from).unwrap_or(defaults.model_path),
            image_size,
            profile,
            thresholds,
            thresholds_file,
            class_dir: get(CLASS_DIR_KEY).map(PathBuf::from).unwrap_or(defaults.class_dir),
            upload_dir: get(UPLOAD_DIR_KEY).map(PathBuf::from).unwrap_or(defaults.upload_dir),
            max_upload_size: parse_or(&get, MAX_UPLOAD_SIZE_KEY, defaults.max_upload_size)?,
            bind_addr: get(BIND_ADDR_KEY).unwrap_or(defaults.bind_addr),
            low_confidence_threshold,
            log_filter: get(LOG_KEY).unwrap_or(defaults.log_filter),
        })
    }

    /// `"custom"` when a thresholds file replaced the profile's set,
    /// otherwise the profile name.
    pub fn validation_profile_name(&self) -> &'static str {
        match self.thresholds_file {
            Some(_) => "custom",
            None => self.profile.as_str(),
        }
    }

    /// File name of the model artifact, reported as the model version.
    pub fn model_name(&self) -> String {
        self.model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| invalid(key, &raw, &e.to_string())),
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_owned(), reason: reason.to_owned() }
}

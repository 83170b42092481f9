use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Named threshold sets for the brain-image validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationProfile {
    /// Full check ladder including the structure (edge-density) check.
    #[default]
    Strict,
    /// Smaller minimum size, wider bands, no structure check.
    Lenient,
}

impl ValidationProfile {
    pub fn thresholds(self) -> ValidationThresholds {
        match self {
            ValidationProfile::Strict  => ValidationThresholds::strict(),
            ValidationProfile::Lenient => ValidationThresholds::lenient(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationProfile::Strict  => "strict",
            ValidationProfile::Lenient => "lenient",
        }
    }
}

impl fmt::Display for ValidationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict"  => Ok(ValidationProfile::Strict),
            "lenient" | "relaxed" => Ok(ValidationProfile::Lenient),
            other => Err(format!("unknown validation profile '{other}' (expected strict or lenient)")),
        }
    }
}

/// Every tunable of the validation ladder.
///
/// Intensities are on the 0–255 scale; entropy is in bits; densities are
/// fractions of the pixel count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationThresholds {
    pub min_width:  u32,
    pub min_height: u32,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Largest mean pairwise channel difference still treated as grayscale.
    pub max_channel_difference: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
    /// Floor on the standard deviation of grayscale intensities.
    pub min_contrast: f64,
    pub min_entropy: f64,
    pub min_distinct_values: usize,
    /// `None` disables the structure check.
    pub min_edge_density: Option<f64>,
    /// Sobel magnitude a pixel must exceed to count as an edge.
    pub edge_magnitude_threshold: f64,
    /// Confidence reported when every check passes.
    pub accept_confidence: f64,
}

impl ValidationThresholds {
    pub fn strict() -> Self {
        ValidationThresholds {
            min_width:  150,
            min_height: 150,
            min_aspect_ratio: 0.8,
            max_aspect_ratio: 1.25,
            max_channel_difference: 12.0,
            min_brightness: 10.0,
            max_brightness: 245.0,
            min_contrast: 5.0,
            min_entropy: 2.0,
            min_distinct_values: 15,
            min_edge_density: Some(0.005),
            edge_magnitude_threshold: 0.1,
            accept_confidence: 0.95,
        }
    }

    pub fn lenient() -> Self {
        ValidationThresholds {
            min_width:  96,
            min_height: 96,
            min_aspect_ratio: 0.7,
            max_aspect_ratio: 1.4,
            max_channel_difference: 25.0,
            min_brightness: 3.0,
            max_brightness: 252.0,
            min_contrast: 5.0,
            min_entropy: 1.0,
            min_distinct_values: 10,
            min_edge_density: None,
            edge_magnitude_threshold: 0.1,
            accept_confidence: 0.92,
        }
    }

    /// Rejects inverted bands and values outside their domain.
    pub fn check(&self) -> Result<(), ConfigError> {
        let fail = |reason: String| -> Result<(), ConfigError> {
            Err(ConfigError::Thresholds(reason))
        };

        if self.min_width == 0 || self.min_height == 0 {
            return fail("minimum dimensions must be at least 1 pixel".into());
        }
        if !(self.min_aspect_ratio > 0.0 && self.min_aspect_ratio <= self.max_aspect_ratio) {
            return fail(format!(
                "aspect band [{}, {}] is empty or non-positive",
                self.min_aspect_ratio, self.max_aspect_ratio
            ));
        }
        if self.max_channel_difference < 0.0 {
            return fail("max_channel_difference must not be negative".into());
        }
        if !(0.0..=255.0).contains(&self.min_brightness)
            || !(0.0..=255.0).contains(&self.max_brightness)
            || self.min_brightness > self.max_brightness
        {
            return fail(format!(
                "brightness band [{}, {}] must lie within [0, 255]",
                self.min_brightness, self.max_brightness
            ));
        }
        if self.min_contrast < 0.0 || self.min_entropy < 0.0 || self.edge_magnitude_threshold < 0.0 {
            return fail("contrast, entropy and edge magnitude floors must not be negative".into());
        }
        if self.min_entropy > 8.0 {
            return fail(format!("entropy floor {} exceeds the 8-bit maximum", self.min_entropy));
        }
        if self.min_distinct_values > 256 {
            return fail(format!("distinct-value floor {} exceeds 256", self.min_distinct_values));
        }
        if let Some(d) = self.min_edge_density {
            if !(0.0..=1.0).contains(&d) {
                return fail(format!("edge-density floor {d} must lie within [0, 1]"));
            }
        }
        if !(0.0..=1.0).contains(&self.accept_confidence) {
            return fail(format!("accept_confidence {} must lie within [0, 1]", self.accept_confidence));
        }
        Ok(())
    }

    /// Loads a complete threshold set from a JSON file and checks it.
    pub fn load_json(path: &Path) -> Result<ValidationThresholds, ConfigError> {
        let file = std::fs::File::open(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let reader = std::io::BufReader::new(file);
        let thresholds: ValidationThresholds = serde_json::from_reader(reader)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
        thresholds.check()?;
        Ok(thresholds)
    }
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        ValidationThresholds::strict()
    }
}

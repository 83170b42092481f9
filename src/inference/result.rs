use serde::{Deserialize, Serialize};

use crate::classify::PredictionSource;
use crate::imaging::Bitmap;
use crate::inference::analysis::MedicalAnalysis;
use crate::validation::ValidationResult;

/// One class with its probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionItem {
    pub class_index: usize,
    pub label: String,
    /// Rounded to 4 decimal places.
    pub confidence: f64,
    /// `confidence * 100`, rounded to 2 decimal places.
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    InvalidImage,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success      => "success",
            Status::InvalidImage => "invalid_image",
            Status::Error        => "error",
        }
    }
}

/// Dimensions and format of the decoded upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width:  u32,
    pub height: u32,
    pub mode:   String,
    pub format: Option<String>,
}

impl ImageInfo {
    pub fn of(bitmap: &Bitmap) -> ImageInfo {
        ImageInfo {
            width: bitmap.width(),
            height: bitmap.height(),
            mode: bitmap.mode().as_str().to_owned(),
            format: bitmap.format().map(str::to_owned),
        }
    }
}

/// Everything one request produces, success or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Sorted by confidence, highest first. Empty unless `status` is `success`.
    pub predictions: Vec<PredictionItem>,
    pub top_prediction: Option<PredictionItem>,
    pub is_valid_brain_image: bool,
    pub image_validation_confidence: f64,
    pub validation_reason: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_analysis: Option<MedicalAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub image_path: Option<String>,
    pub model_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_source: Option<PredictionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_info: Option<ImageInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
}

impl PredictionResult {
    /// A terminal result with no predictions.
    pub fn failure(
        status: Status,
        image_path: Option<String>,
        model_version: impl Into<String>,
        reason: impl Into<String>,
    ) -> PredictionResult {
        let reason = reason.into();
        PredictionResult {
            predictions: Vec::new(),
            top_prediction: None,
            is_valid_brain_image: false,
            image_validation_confidence: 0.0,
            validation_reason: reason.clone(),
            status,
            medical_analysis: None,
            error: Some(reason),
            image_path,
            model_version: model_version.into(),
            prediction_source: None,
            image_info: None,
            disclaimer: None,
        }
    }

    /// Carries the validator's verdict onto a result for an image that
    /// passed the gate before a later stage failed.
    pub fn with_validation(mut self, validation: &ValidationResult, image_info: ImageInfo) -> Self {
        self.is_valid_brain_image = validation.is_valid;
        self.image_validation_confidence = validation.confidence;
        self.validation_reason = validation.reason.clone();
        self.image_info = Some(image_info);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

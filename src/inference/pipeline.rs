use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::classify::{
    check_probabilities, ClassLabels, Classifier, ClassifierAdapter, ClassifyError,
    FallbackPredictor, PredictionSource, Probabilities, Sample, NUM_CLASSES,
};
use crate::config::{Settings, ValidationThresholds};
use crate::imaging::{self, Bitmap, DecodeError, ImageLoader, ImagePreprocessor, PreprocessError};
use crate::inference::analysis::{MedicalAnalysis, DISCLAIMER, INVALID_IMAGE_NOTICE};
use crate::inference::result::{ImageInfo, PredictionItem, PredictionResult, Status};
use crate::validation::{BrainImageValidator, ValidationResult};

/// Tunables the orchestrator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Side length of the classifier input.
    pub target_size: u32,
    pub thresholds: ValidationThresholds,
    /// Top confidence below which the analysis carries a review note.
    pub low_confidence_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            target_size: 150,
            thresholds: ValidationThresholds::default(),
            low_confidence_threshold: 0.6,
        }
    }
}

impl From<&Settings> for PipelineConfig {
    fn from(settings: &Settings) -> Self {
        PipelineConfig {
            target_size: settings.image_size,
            thresholds: settings.thresholds.clone(),
            low_confidence_threshold: settings.low_confidence_threshold,
        }
    }
}

/// Stage failures after the request has been received.
#[derive(Debug, Error)]
enum InferenceError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Classification failed: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

/// Decode → validate → preprocess → classify (model or fallback) → rank.
///
/// Holds only read-only state after construction, so one pipeline can be
/// shared between threads behind an `Arc`.
pub struct InferencePipeline {
    config:        PipelineConfig,
    validator:     BrainImageValidator,
    preprocessor:  ImagePreprocessor,
    labels:        ClassLabels,
    model:         Box<dyn Classifier>,
    fallback:      FallbackPredictor,
    model_version: String,
}

impl InferencePipeline {
    /// Pipeline backed by the lazily loaded model artifact at `model_path`.
    pub fn new(config: PipelineConfig, labels: ClassLabels, model_path: &Path) -> Self {
        let adapter = ClassifierAdapter::new(model_path, config.target_size, NUM_CLASSES);
        let model_version = model_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        InferencePipeline::with_classifier(config, labels, Box::new(adapter), model_version)
    }

    /// Pipeline with an arbitrary primary classifier.
    pub fn with_classifier(
        config: PipelineConfig,
        labels: ClassLabels,
        model: Box<dyn Classifier>,
        model_version: impl Into<String>,
    ) -> Self {
        InferencePipeline {
            validator: BrainImageValidator::new(config.thresholds.clone()),
            preprocessor: ImagePreprocessor::new(config.target_size),
            fallback: FallbackPredictor::new(
                labels.clone(),
                config.thresholds.edge_magnitude_threshold,
            ),
            labels,
            model,
            model_version: model_version.into(),
            config,
        }
    }

    /// Builds everything from runtime settings, discovering class labels.
    pub fn from_settings(settings: &Settings) -> Self {
        let labels = ClassLabels::discover(&settings.class_dir);
        InferencePipeline::new(PipelineConfig::from(settings), labels, &settings.model_path)
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub fn labels(&self) -> &ClassLabels { &self.labels }

    pub fn model_version(&self) -> &str { &self.model_version }

    /// Triggers the model load if it has not happened yet.
    pub fn model_error(&self) -> Option<String> {
        self.model.unavailable_reason()
    }

    pub fn model_available(&self) -> bool {
        self.model_error().is_none()
    }

    /// Runs only the validation gate.
    pub fn validate(&self, bytes: &[u8]) -> Result<ValidationResult, DecodeError> {
        let bitmap = ImageLoader::load(bytes)?;
        Ok(self.validator.validate(&bitmap))
    }

    /// Full inference over raw image bytes. Never panics; every failure is
    /// reported through the result's `status`.
    pub fn predict(&self, bytes: &[u8], image_path: Option<&str>) -> PredictionResult {
        let mut gate: Option<(ValidationResult, ImageInfo)> = None;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(bytes, image_path, &mut gate)))
            .unwrap_or_else(|payload| Err(InferenceError::Unexpected(panic_message(payload.as_ref()))));

        match outcome {
            Ok(result) => result,
            Err(InferenceError::Decode(e)) => {
                warn!(error = %e, "upload could not be decoded");
                let mut result = self.failure(Status::InvalidImage, image_path, e.to_string());
                result.disclaimer = Some(INVALID_IMAGE_NOTICE.to_owned());
                result
            }
            Err(e @ (InferenceError::Preprocess(_)
                | InferenceError::Classify(_)
                | InferenceError::Unexpected(_))) => {
                error!(error = %e, "inference failed");
                let result = self.failure(Status::Error, image_path, e.to_string());
                match gate {
                    Some((validation, info)) => result.with_validation(&validation, info),
                    None => result,
                }
            }
        }
    }

    /// Reads `path` and runs `predict` on its contents.
    pub fn predict_file(&self, path: &Path) -> PredictionResult {
        let shown = path.to_string_lossy();
        match imaging::read_file(path) {
            Ok(bytes) => self.predict(&bytes, Some(&shown)),
            Err(e) => {
                error!(path = %shown, error = %e, "cannot read image file");
                self.failure(Status::Error, Some(&shown), e.to_string())
            }
        }
    }

    /// One result per path, in order; a bad file never aborts the batch.
    pub fn predict_batch<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<PredictionResult> {
        paths.iter().map(|p| self.predict_file(p.as_ref())).collect()
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// `gate` receives the verdict once the image has passed validation.
    fn run(
        &self,
        bytes: &[u8],
        image_path: Option<&str>,
        gate: &mut Option<(ValidationResult, ImageInfo)>,
    ) -> Result<PredictionResult, InferenceError> {
        let bitmap = ImageLoader::load(bytes)?;
        info!(
            width = bitmap.width(),
            height = bitmap.height(),
            mode = bitmap.mode().as_str(),
            "image loaded"
        );

        let validation = self.validator.validate(&bitmap);
        info!(
            valid = validation.is_valid,
            confidence = validation.confidence,
            reason = %validation.reason,
            "image validation"
        );
        if !validation.is_valid {
            return Ok(self.rejected(&bitmap, validation, image_path));
        }
        *gate = Some((validation.clone(), ImageInfo::of(&bitmap)));

        let tensor = self.preprocessor.preprocess(&bitmap)?;
        let sample = Sample { bitmap: &bitmap, tensor: &tensor };
        let (probs, source) = self.classify(&sample)?;

        let predictions = rank(&probs, &self.labels);
        for item in &predictions {
            debug!(label = %item.label, confidence = item.confidence, "class probability");
        }
        let top = predictions.first().cloned()
            .ok_or_else(|| InferenceError::Unexpected("classifier returned no classes".into()))?;
        info!(
            label = %top.label,
            percentage = top.percentage,
            source = source.as_str(),
            "inference completed"
        );

        Ok(PredictionResult {
            medical_analysis: Some(MedicalAnalysis::for_label(
                &top.label,
                top.confidence,
                self.config.low_confidence_threshold,
            )),
            top_prediction: Some(top),
            predictions,
            is_valid_brain_image: true,
            image_validation_confidence: validation.confidence,
            validation_reason: validation.reason,
            status: Status::Success,
            error: None,
            image_path: image_path.map(str::to_owned),
            model_version: self.model_version.clone(),
            prediction_source: Some(source),
            image_info: Some(ImageInfo::of(&bitmap)),
            disclaimer: Some(DISCLAIMER.to_owned()),
        })
    }

    /// Primary classifier first; an unavailable model falls through to the
    /// statistics-based predictor. Either way the vector must hold one
    /// probability per label.
    fn classify(&self, sample: &Sample<'_>) -> Result<(Probabilities, PredictionSource), ClassifyError> {
        let (probs, source) = match self.model.classify(sample) {
            Ok(probs) => (probs, self.model.source()),
            Err(ClassifyError::Unavailable(reason)) => {
                warn!(%reason, "model unavailable, using fallback prediction");
                (self.fallback.classify(sample)?, self.fallback.source())
            }
            Err(e) => return Err(e),
        };
        check_probabilities(&probs, self.labels.len())?;
        Ok((probs, source))
    }

    fn rejected(
        &self,
        bitmap: &Bitmap,
        validation: ValidationResult,
        image_path: Option<&str>,
    ) -> PredictionResult {
        warn!(reason = %validation.reason, "invalid brain image");
        PredictionResult {
            predictions: Vec::new(),
            top_prediction: None,
            is_valid_brain_image: false,
            image_validation_confidence: validation.confidence,
            error: Some(format!(
                "Uploaded image is not a valid brain MRI scan. {}",
                validation.reason
            )),
            validation_reason: validation.reason,
            status: Status::InvalidImage,
            medical_analysis: None,
            image_path: image_path.map(str::to_owned),
            model_version: self.model_version.clone(),
            prediction_source: None,
            image_info: Some(ImageInfo::of(bitmap)),
            disclaimer: Some(INVALID_IMAGE_NOTICE.to_owned()),
        }
    }

    fn failure(&self, status: Status, image_path: Option<&str>, reason: String) -> PredictionResult {
        PredictionResult::failure(
            status,
            image_path.map(str::to_owned),
            self.model_version.clone(),
            reason,
        )
    }
}

/// One item per class, confidences rounded to 4 places and percentages to 2,
/// sorted by rounded confidence, highest first. Equal confidences keep class
/// order.
pub fn rank(probs: &[f64], labels: &ClassLabels) -> Vec<PredictionItem> {
    let mut items: Vec<PredictionItem> = probs.iter()
        .enumerate()
        .map(|(i, &p)| PredictionItem {
            class_index: i,
            label: labels.get(i).to_owned(),
            confidence: round_to(p, 4),
            percentage: round_to(p * 100.0, 2),
        })
        .collect();
    items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    items
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

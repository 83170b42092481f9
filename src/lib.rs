pub mod classify;
pub mod config;
pub mod imaging;
pub mod inference;
pub mod logging;
pub mod validation;

// Convenience re-exports
pub use classify::{ClassLabels, Classifier, ClassifierAdapter, FallbackPredictor, PredictionSource, TumorKind};
pub use config::{Settings, ValidationProfile, ValidationThresholds};
pub use imaging::{Bitmap, ImageLoader, ImagePreprocessor, Tensor};
pub use inference::{InferencePipeline, PipelineConfig, PredictionItem, PredictionResult, Status};
pub use validation::{BrainImageValidator, Check, ValidationResult};

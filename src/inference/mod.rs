pub mod analysis;
pub mod pipeline;
pub mod result;

pub use analysis::MedicalAnalysis;
pub use pipeline::{rank, InferencePipeline, PipelineConfig};
pub use result::{ImageInfo, PredictionItem, PredictionResult, Status};

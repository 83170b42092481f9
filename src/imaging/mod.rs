pub mod bitmap;
pub mod preprocess;
pub mod stats;

pub use bitmap::{read_file, Bitmap, ColorMode, DecodeError, ImageLoader};
pub use preprocess::{ImagePreprocessor, PreprocessError, Tensor};
pub use stats::GrayStats;

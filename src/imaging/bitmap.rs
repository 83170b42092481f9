use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage, GenericImageView, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// Failure to turn raw input into a `Bitmap`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Cannot load image: input is empty")]
    Empty,

    #[error("Cannot load image: {0}")]
    Format(#[from] image::ImageError),

    #[error("Cannot read image file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Channel layout of a decoded image.
///
/// Palette images are expanded by the decoder, so they surface as `Rgb` or
/// `Rgba`. 16-bit and float variants map onto the layout they share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Grayscale,
    GrayscaleAlpha,
    Rgb,
    Rgba,
}

impl ColorMode {
    fn from_color_type(color: ColorType) -> ColorMode {
        match color {
            ColorType::L8 | ColorType::L16 => ColorMode::Grayscale,
            ColorType::La8 | ColorType::La16 => ColorMode::GrayscaleAlpha,
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => ColorMode::Rgb,
            ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => ColorMode::Rgba,
            // Future colour types: pick by channel count.
            other => match other.channel_count() {
                1 => ColorMode::Grayscale,
                2 => ColorMode::GrayscaleAlpha,
                3 => ColorMode::Rgb,
                _ => ColorMode::Rgba,
            },
        }
    }

    /// Number of stored channels, alpha included.
    pub fn channel_count(self) -> u8 {
        match self {
            ColorMode::Grayscale      => 1,
            ColorMode::GrayscaleAlpha => 2,
            ColorMode::Rgb            => 3,
            ColorMode::Rgba           => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColorMode::Grayscale      => "L",
            ColorMode::GrayscaleAlpha => "LA",
            ColorMode::Rgb            => "RGB",
            ColorMode::Rgba           => "RGBA",
        }
    }
}

/// A decoded raster image. Immutable once built; owned by the request that
/// decoded it.
#[derive(Debug, Clone)]
pub struct Bitmap {
    image:  DynamicImage,
    width:  u32,
    height: u32,
    mode:   ColorMode,
    format: Option<String>,
}

impl Bitmap {
    /// Wraps an already decoded image (used by callers that synthesise pixels).
    pub fn from_image(image: DynamicImage) -> Bitmap {
        let (width, height) = image.dimensions();
        let mode = ColorMode::from_color_type(image.color());
        Bitmap { image, width, height, mode, format: None }
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn mode(&self) -> ColorMode { self.mode }

    /// Container format the bytes were decoded from, if known (e.g. "png").
    pub fn format(&self) -> Option<&str> { self.format.as_deref() }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn image(&self) -> &DynamicImage { &self.image }

    /// 8-bit single-channel view; alpha is dropped.
    pub fn to_gray(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// 8-bit three-channel view; grayscale is replicated, alpha is dropped.
    pub fn to_rgb(&self) -> RgbImage {
        self.image.to_rgb8()
    }
}

/// Decodes image bytes into a `Bitmap`. The container format is sniffed from
/// the content, never assumed.
pub struct ImageLoader;

impl ImageLoader {
    pub fn load(bytes: &[u8]) -> Result<Bitmap, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let format = image::guess_format(bytes).ok();
        let decoded = image::load_from_memory(bytes).map_err(|e| {
            error!(error = %e, "error loading image");
            DecodeError::Format(e)
        })?;

        let mut bitmap = Bitmap::from_image(decoded);
        bitmap.format = format
            .and_then(|f| f.extensions_str().first().copied())
            .map(str::to_owned);

        debug!(
            width = bitmap.width,
            height = bitmap.height,
            mode = bitmap.mode.as_str(),
            "image decoded"
        );
        Ok(bitmap)
    }

    /// Reads and decodes a file from disk.
    pub fn load_path(path: &Path) -> Result<Bitmap, DecodeError> {
        let bytes = read_file(path)?;
        Self::load(&bytes)
    }
}

/// Reads a whole file, attaching the path to any I/O failure.
pub fn read_file(path: &Path) -> Result<Vec<u8>, DecodeError> {
    std::fs::read(path).map_err(|source| DecodeError::Io { path: path.to_path_buf(), source })
}

use image::imageops::FilterType;
use thiserror::Error;
use tracing::debug;

use crate::imaging::bitmap::Bitmap;

/// Number of colour channels the classifier consumes.
pub const TENSOR_CHANNELS: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum PreprocessError {
    #[error("Cannot preprocess image: target size must be at least 1 pixel")]
    ZeroTargetSize,

    #[error("Cannot preprocess image: bitmap has no pixels ({width}x{height})")]
    EmptyBitmap { width: u32, height: u32 },
}

/// Normalized classifier input with shape `[1, size, size, 3]`.
///
/// Values are stored row-major, channels interleaved (R, G, B per pixel),
/// each in [0.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    size: usize,
    data: Vec<f32>,
}

impl Tensor {
    /// `[batch, height, width, channels]`.
    pub fn shape(&self) -> [usize; 4] {
        [1, self.size, self.size, TENSOR_CHANNELS]
    }

    pub fn as_slice(&self) -> &[f32] { &self.data }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }
}

/// Converts a `Bitmap` into the tensor the classifier was trained on.
///
/// Steps: force RGB, Lanczos3 resize to `target_size × target_size`, scale
/// 0–255 to [0, 1], add the batch dimension. Deterministic for equal input.
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    target_size: u32,
}

impl ImagePreprocessor {
    pub fn new(target_size: u32) -> Self {
        ImagePreprocessor { target_size }
    }

    pub fn preprocess(&self, bitmap: &Bitmap) -> Result<Tensor, PreprocessError> {
        if self.target_size == 0 {
            return Err(PreprocessError::ZeroTargetSize);
        }
        if bitmap.pixel_count() == 0 {
            return Err(PreprocessError::EmptyBitmap {
                width:  bitmap.width(),
                height: bitmap.height(),
            });
        }

        let size = self.target_size;
        let rgb = image::DynamicImage::ImageRgb8(bitmap.to_rgb())
            .resize_exact(size, size, FilterType::Lanczos3)
            .to_rgb8();
        debug!(size, "image resized");

        let data: Vec<f32> = rgb.pixels()
            .flat_map(|p| p.0.into_iter().map(|c| c as f32 / 255.0))
            .collect();

        Ok(Tensor { size: size as usize, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> Bitmap {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) % 256) as u8])
        });
        Bitmap::from_image(DynamicImage::ImageRgb8(img))
    }

    #[test]
    fn output_has_batch_shape() {
        let tensor = ImagePreprocessor::new(150).preprocess(&gradient(300, 240)).unwrap();
        assert_eq!(tensor.shape(), [1, 150, 150, 3]);
        assert_eq!(tensor.len(), 150 * 150 * 3);
    }

    #[test]
    fn values_are_in_unit_range() {
        let tensor = ImagePreprocessor::new(32).preprocess(&gradient(97, 101)).unwrap();
        assert!(tensor.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let bitmap = gradient(180, 180);
        let pre = ImagePreprocessor::new(64);
        let a = pre.preprocess(&bitmap).unwrap();
        let b = pre.preprocess(&bitmap).unwrap();
        let bits_a: Vec<u32> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u32> = b.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn grayscale_is_replicated_into_three_channels() {
        let img = GrayImage::from_pixel(50, 50, Luma([51]));
        let bitmap = Bitmap::from_image(DynamicImage::ImageLuma8(img));
        let tensor = ImagePreprocessor::new(10).preprocess(&bitmap).unwrap();
        for px in tensor.as_slice().chunks(3) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
            assert!((px[0] - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_target_size_is_an_error() {
        let err = ImagePreprocessor::new(0).preprocess(&gradient(10, 10)).unwrap_err();
        assert_eq!(err, PreprocessError::ZeroTargetSize);
    }

    #[test]
    fn empty_bitmap_is_an_error() {
        let bitmap = Bitmap::from_image(DynamicImage::ImageRgb8(RgbImage::new(0, 0)));
        let err = ImagePreprocessor::new(8).preprocess(&bitmap).unwrap_err();
        assert_eq!(err, PreprocessError::EmptyBitmap { width: 0, height: 0 });
    }
}

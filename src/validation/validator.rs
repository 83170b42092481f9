use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ValidationThresholds;
use crate::imaging::stats::{self, GrayStats};
use crate::imaging::Bitmap;
use crate::validation::check::{Check, Rejection};

/// Verdict of the validation gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// In [0, 1]. Rejections carry the confidence of the failing check.
    pub confidence: f64,
    pub reason: String,
    /// The check that rejected the image; `None` when valid.
    pub failed_check: Option<Check>,
}

/// Heuristic gate deciding whether a bitmap plausibly is a brain MRI scan.
///
/// Checks run in `Check::ALL` order and the first failure short-circuits:
///
/// 1. minimum size
/// 2. aspect ratio band
/// 3. colorfulness (only for images with 3+ channels)
/// 4. mean brightness band
/// 5. contrast (intensity standard deviation)
/// 6. histogram entropy
/// 7. distinct intensity count
/// 8. Sobel edge density (only when `min_edge_density` is set)
///
/// Grayscale statistics are computed only once the dimension and colour
/// checks have passed; the Sobel pass only when the structure check is
/// reached.
#[derive(Debug, Clone)]
pub struct BrainImageValidator {
    thresholds: ValidationThresholds,
}

impl BrainImageValidator {
    pub fn new(thresholds: ValidationThresholds) -> Self {
        BrainImageValidator { thresholds }
    }

    pub fn thresholds(&self) -> &ValidationThresholds {
        &self.thresholds
    }

    pub fn validate(&self, bitmap: &Bitmap) -> ValidationResult {
        self.validate_with(bitmap, |_| {})
    }

    /// Like `validate`, but calls `on_check` as each check starts.
    pub fn validate_with<F>(&self, bitmap: &Bitmap, mut on_check: F) -> ValidationResult
    where
        F: FnMut(Check),
    {
        match self.run(bitmap, &mut on_check) {
            Ok(()) => ValidationResult {
                is_valid: true,
                confidence: self.thresholds.accept_confidence,
                reason: "Valid brain MRI scan detected".to_owned(),
                failed_check: None,
            },
            Err(rejection) => {
                debug!(check = %rejection.check, reason = %rejection.reason, "image rejected");
                ValidationResult {
                    is_valid: false,
                    confidence: rejection.check.rejection_confidence(),
                    reason: rejection.reason,
                    failed_check: Some(rejection.check),
                }
            }
        }
    }

    fn run(&self, bitmap: &Bitmap, on_check: &mut dyn FnMut(Check)) -> Result<(), Rejection> {
        let (width, height) = (bitmap.width(), bitmap.height());

        on_check(Check::Size);
        self.check_size(width, height)?;

        on_check(Check::AspectRatio);
        self.check_aspect_ratio(width, height)?;

        if bitmap.mode().channel_count() >= 3 {
            on_check(Check::Colorfulness);
            self.check_colorfulness(&bitmap.to_rgb())?;
        }

        let gray = bitmap.to_gray();
        let stats = GrayStats::compute(&gray);

        on_check(Check::Brightness);
        self.check_brightness(&stats)?;

        on_check(Check::Contrast);
        self.check_contrast(&stats)?;

        on_check(Check::Entropy);
        self.check_entropy(&stats)?;

        on_check(Check::DistinctValues);
        self.check_distinct_values(&stats)?;

        if let Some(floor) = self.thresholds.min_edge_density {
            on_check(Check::Structure);
            self.check_structure(&gray, floor)?;
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Individual checks
    // -----------------------------------------------------------------------

    pub(crate) fn check_size(&self, width: u32, height: u32) -> Result<(), Rejection> {
        let t = &self.thresholds;
        if width < t.min_width || height < t.min_height {
            return Err(Rejection::new(Check::Size, format!(
                "Image size too small ({width}x{height}). Brain MRI requires at least {}x{} px",
                t.min_width, t.min_height
            )));
        }
        Ok(())
    }

    pub(crate) fn check_aspect_ratio(&self, width: u32, height: u32) -> Result<(), Rejection> {
        let t = &self.thresholds;
        let ratio = if height > 0 { width as f64 / height as f64 } else { 0.0 };
        if ratio < t.min_aspect_ratio || ratio > t.max_aspect_ratio {
            return Err(Rejection::new(Check::AspectRatio, format!(
                "Invalid aspect ratio ({ratio:.2}). Brain MRI should be roughly square; got {width}x{height}"
            )));
        }
        Ok(())
    }

    pub(crate) fn check_colorfulness(&self, rgb: &RgbImage) -> Result<(), Rejection> {
        let diff = stats::max_channel_difference(rgb);
        if diff > self.thresholds.max_channel_difference {
            return Err(Rejection::new(Check::Colorfulness, format!(
                "Image appears to be colored (channel diff: {diff:.1}). Brain MRI must be grayscale"
            )));
        }
        Ok(())
    }

    pub(crate) fn check_brightness(&self, stats: &GrayStats) -> Result<(), Rejection> {
        let t = &self.thresholds;
        if stats.mean < t.min_brightness || stats.mean > t.max_brightness {
            let which = if stats.mean < t.min_brightness { "dark" } else { "bright" };
            return Err(Rejection::new(Check::Brightness, format!(
                "Image is too {which} (mean intensity {:.1}). Brain MRI should have varied intensity",
                stats.mean
            )));
        }
        Ok(())
    }

    pub(crate) fn check_contrast(&self, stats: &GrayStats) -> Result<(), Rejection> {
        if stats.std_dev < self.thresholds.min_contrast {
            return Err(Rejection::new(Check::Contrast, format!(
                "Image lacks contrast (std={:.1}). Too uniform to be a medical scan",
                stats.std_dev
            )));
        }
        Ok(())
    }

    pub(crate) fn check_entropy(&self, stats: &GrayStats) -> Result<(), Rejection> {
        if stats.entropy < self.thresholds.min_entropy {
            return Err(Rejection::new(Check::Entropy, format!(
                "Image entropy too low ({:.2} bits). Too simple to be a medical scan",
                stats.entropy
            )));
        }
        Ok(())
    }

    pub(crate) fn check_distinct_values(&self, stats: &GrayStats) -> Result<(), Rejection> {
        if stats.distinct_values < self.thresholds.min_distinct_values {
            return Err(Rejection::new(Check::DistinctValues, format!(
                "Too few distinct pixel values ({}). Insufficient detail for a medical scan",
                stats.distinct_values
            )));
        }
        Ok(())
    }

    pub(crate) fn check_structure(&self, gray: &GrayImage, floor: f64) -> Result<(), Rejection> {
        let density = stats::edge_density(gray, self.thresholds.edge_magnitude_threshold);
        if density < floor {
            return Err(Rejection::new(Check::Structure, format!(
                "No discernible anatomical structure found (edge density {density:.4})"
            )));
        }
        Ok(())
    }
}

impl Default for BrainImageValidator {
    fn default() -> Self {
        BrainImageValidator::new(ValidationThresholds::strict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Luma, Rgb};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn gray_bitmap(img: GrayImage) -> Bitmap {
        Bitmap::from_image(DynamicImage::ImageLuma8(img))
    }

    fn rgb_bitmap(img: RgbImage) -> Bitmap {
        Bitmap::from_image(DynamicImage::ImageRgb8(img))
    }

    fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        GrayImage::from_fn(width, height, |_, _| Luma([rng.gen::<u8>()]))
    }

    fn trace(validator: &BrainImageValidator, bitmap: &Bitmap) -> (ValidationResult, Vec<Check>) {
        let mut seen = Vec::new();
        let result = validator.validate_with(bitmap, |c| seen.push(c));
        (result, seen)
    }

    #[test]
    fn undersized_images_fail_on_size_first() {
        let v = BrainImageValidator::default();
        for (w, h) in [(149, 200), (200, 149), (50, 50), (10, 400)] {
            // Strongly coloured so later checks would also fail.
            let img = RgbImage::from_pixel(w, h, Rgb([255, 0, 0]));
            let (result, seen) = trace(&v, &rgb_bitmap(img));
            assert!(!result.is_valid);
            assert_eq!(result.failed_check, Some(Check::Size), "{w}x{h}");
            assert!(result.reason.contains("size"));
            assert_eq!(result.confidence, 0.05);
            assert_eq!(seen, vec![Check::Size]);
        }
    }

    #[test]
    fn aspect_ratio_is_checked_before_colour() {
        let v = BrainImageValidator::default();
        let img = RgbImage::from_pixel(400, 200, Rgb([200, 50, 50]));
        let (result, seen) = trace(&v, &rgb_bitmap(img));
        assert_eq!(result.failed_check, Some(Check::AspectRatio));
        assert_eq!(result.confidence, 0.08);
        assert_eq!(seen, vec![Check::Size, Check::AspectRatio]);
    }

    #[test]
    fn aspect_band_edges_are_inclusive() {
        let v = BrainImageValidator::default();
        assert!(v.check_aspect_ratio(200, 250).is_ok()); // 0.8
        assert!(v.check_aspect_ratio(250, 200).is_ok()); // 1.25
        assert!(v.check_aspect_ratio(199, 250).is_err());
        assert!(v.check_aspect_ratio(251, 200).is_err());
    }

    #[test]
    fn identical_channels_always_pass_colorfulness() {
        let v = BrainImageValidator::default();
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let img = RgbImage::from_fn(64, 64, |_, _| {
                let g = rng.gen::<u8>();
                Rgb([g, g, g])
            });
            assert!(v.check_colorfulness(&img).is_ok());
        }
    }

    #[test]
    fn replicated_grayscale_passes_colorfulness() {
        let v = BrainImageValidator::default();
        let bitmap = gray_bitmap(noise(80, 80, 3));
        assert!(v.check_colorfulness(&bitmap.to_rgb()).is_ok());
    }

    #[test]
    fn single_channel_images_skip_colorfulness() {
        let v = BrainImageValidator::default();
        let (result, seen) = trace(&v, &gray_bitmap(noise(200, 200, 11)));
        assert!(result.is_valid, "{}", result.reason);
        assert!(!seen.contains(&Check::Colorfulness));
    }

    #[test]
    fn coloured_photo_is_rejected() {
        let v = BrainImageValidator::default();
        let img = RgbImage::from_pixel(300, 300, Rgb([200, 50, 50]));
        let result = v.validate(&rgb_bitmap(img));
        assert_eq!(result.failed_check, Some(Check::Colorfulness));
        assert!(result.reason.contains("colored"));
        assert!(result.confidence <= 0.15);
    }

    #[test]
    fn uniform_images_always_fail_contrast() {
        let v = BrainImageValidator::default();
        for level in 0..=255u8 {
            let stats = GrayStats::compute(&GrayImage::from_pixel(8, 8, Luma([level])));
            let rejection = v.check_contrast(&stats).unwrap_err();
            assert_eq!(rejection.check, Check::Contrast);
        }
    }

    #[test]
    fn dark_and_bright_images_fail_brightness() {
        let v = BrainImageValidator::default();

        let dark = v.validate(&gray_bitmap(GrayImage::from_pixel(200, 200, Luma([3]))));
        assert_eq!(dark.failed_check, Some(Check::Brightness));
        assert!(dark.reason.contains("dark"));

        let bright = v.validate(&gray_bitmap(GrayImage::from_pixel(200, 200, Luma([250]))));
        assert_eq!(bright.failed_check, Some(Check::Brightness));
        assert!(bright.reason.contains("bright"));
        assert_eq!(bright.confidence, 0.12);
    }

    #[test]
    fn three_level_image_is_too_simple() {
        let v = BrainImageValidator::default();
        let img = GrayImage::from_fn(300, 300, |x, _| Luma([[0u8, 128, 255][(x / 100) as usize]]));
        let result = v.validate(&gray_bitmap(img));
        assert_eq!(result.failed_check, Some(Check::Entropy));
        assert_eq!(result.confidence, 0.18);
    }

    #[test]
    fn few_distinct_levels_lack_detail() {
        let v = BrainImageValidator::default();
        // Eight equally sized levels: 3 bits of entropy but only 8 values.
        let img = GrayImage::from_fn(256, 256, |x, _| Luma([(x / 32) as u8 * 32 + 10]));
        let result = v.validate(&gray_bitmap(img));
        assert_eq!(result.failed_check, Some(Check::DistinctValues));
        assert_eq!(result.confidence, 0.20);
    }

    #[test]
    fn flat_stripes_lack_structure_when_floor_is_high() {
        let mut t = ValidationThresholds::strict();
        t.min_distinct_values = 5;
        t.min_edge_density = Some(0.05);
        let v = BrainImageValidator::new(t);
        // Five wide stripes: enough entropy, edges only at four boundaries.
        let img = GrayImage::from_fn(300, 300, |x, _| Luma([(x / 60) as u8 * 50 + 20]));
        let result = v.validate(&gray_bitmap(img));
        assert_eq!(result.failed_check, Some(Check::Structure));
        assert_eq!(result.confidence, 0.22);
    }

    #[test]
    fn lenient_profile_skips_structure() {
        let v = BrainImageValidator::new(ValidationThresholds::lenient());
        let (result, seen) = trace(&v, &gray_bitmap(noise(120, 120, 5)));
        assert!(result.is_valid);
        assert!(!seen.contains(&Check::Structure));
        assert_eq!(result.confidence, 0.92);
    }

    #[test]
    fn noisy_grayscale_scan_is_accepted() {
        let v = BrainImageValidator::default();
        let (result, seen) = trace(&v, &gray_bitmap(noise(200, 200, 42)));
        assert!(result.is_valid);
        assert_eq!(result.confidence, 0.95);
        assert_eq!(result.failed_check, None);
        assert_eq!(seen.last(), Some(&Check::Structure));
    }
}

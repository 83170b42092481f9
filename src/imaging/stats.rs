//! Pixel statistics shared by the validator and the fallback predictor.
//!
//! All functions are pure; intensities are on the 0–255 scale.

use image::{GrayImage, RgbImage};

/// Epsilon added inside log2() so empty bins never produce -inf.
const ENTROPY_EPS: f64 = 1e-10;

/// First- and second-order statistics of an 8-bit grayscale image.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayStats {
    pub mean: f64,
    /// Population standard deviation (divides by N).
    pub std_dev: f64,
    /// Shannon entropy of the 256-bin histogram, in bits.
    pub entropy: f64,
    /// Number of distinct 8-bit intensities present.
    pub distinct_values: usize,
}

impl GrayStats {
    pub fn compute(gray: &GrayImage) -> GrayStats {
        let hist = histogram(gray);
        let n: u64 = hist.iter().sum();
        if n == 0 {
            return GrayStats { mean: 0.0, std_dev: 0.0, entropy: 0.0, distinct_values: 0 };
        }
        let n_f = n as f64;

        let mean = hist.iter().enumerate()
            .map(|(v, &c)| v as f64 * c as f64)
            .sum::<f64>() / n_f;
        let variance = hist.iter().enumerate()
            .map(|(v, &c)| {
                let d = v as f64 - mean;
                d * d * c as f64
            })
            .sum::<f64>() / n_f;

        GrayStats {
            mean,
            std_dev: variance.sqrt(),
            entropy: entropy(&hist),
            distinct_values: hist.iter().filter(|&&c| c > 0).count(),
        }
    }
}

/// 256-bin intensity histogram.
pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for p in gray.pixels() {
        hist[p.0[0] as usize] += 1;
    }
    hist
}

/// Shannon entropy (base 2) of a histogram, normalized to a distribution.
/// Empty bins contribute nothing.
pub fn entropy(hist: &[u64; 256]) -> f64 {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    -hist.iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            p * (p + ENTROPY_EPS).log2()
        })
        .sum::<f64>()
}

/// Mean absolute difference for each channel pair, returned as
/// `(|R-G|, |G-B|, |R-B|)`.
pub fn channel_differences(rgb: &RgbImage) -> (f64, f64, f64) {
    let n = rgb.width() as u64 * rgb.height() as u64;
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }
    let (mut rg, mut gb, mut rb) = (0u64, 0u64, 0u64);
    for p in rgb.pixels() {
        let [r, g, b] = p.0;
        rg += r.abs_diff(g) as u64;
        gb += g.abs_diff(b) as u64;
        rb += r.abs_diff(b) as u64;
    }
    let n = n as f64;
    (rg as f64 / n, gb as f64 / n, rb as f64 / n)
}

/// Largest of the three mean pairwise channel differences. Zero for any image
/// whose channels are pixel-wise identical.
pub fn max_channel_difference(rgb: &RgbImage) -> f64 {
    let (rg, gb, rb) = channel_differences(rgb);
    rg.max(gb).max(rb)
}

/// Fraction of pixels whose Sobel gradient magnitude exceeds `threshold`.
///
/// Borders are handled by replicating the edge row/column.
pub fn edge_density(gray: &GrayImage, threshold: f64) -> f64 {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let px = |x: i64, y: i64| -> f64 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        gray.get_pixel(cx, cy).0[0] as f64
    };

    let mut above = 0usize;
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let gx = (px(x + 1, y - 1) + 2.0 * px(x + 1, y) + px(x + 1, y + 1))
                   - (px(x - 1, y - 1) + 2.0 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2.0 * px(x, y + 1) + px(x + 1, y + 1))
                   - (px(x - 1, y - 1) + 2.0 * px(x, y - 1) + px(x + 1, y - 1));
            if (gx * gx + gy * gy).sqrt() > threshold {
                above += 1;
            }
        }
    }
    above as f64 / (w as f64 * h as f64)
}

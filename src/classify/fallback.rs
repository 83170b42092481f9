//! Statistics-derived stand-in used while the trained model is unavailable.
//!
//! The output is a deterministic placeholder, NOT a diagnosis: a random
//! distribution seeded from the image's own statistics, then nudged by a
//! small fixed table of heuristics. The nudges carry no clinical meaning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::classify::labels::{ClassLabels, TumorKind, NUM_CLASSES};
use crate::classify::{Classifier, ClassifyError, PredictionSource, Probabilities, Sample};
use crate::imaging::stats::{self, GrayStats};
use crate::imaging::Bitmap;

const SEED_MODULUS: i64 = 1 << 31;

/// Image features the fallback is keyed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub mean:         f64,
    pub std_dev:      f64,
    pub entropy:      f64,
    pub edge_density: f64,
}

impl Features {
    /// `edge_magnitude` is the Sobel magnitude above which a pixel counts as
    /// an edge, the same cut the validator's structure check uses.
    pub fn from_bitmap(bitmap: &Bitmap, edge_magnitude: f64) -> Features {
        let gray = bitmap.to_gray();
        let GrayStats { mean, std_dev, entropy, .. } = GrayStats::compute(&gray);
        Features {
            mean,
            std_dev,
            entropy,
            edge_density: stats::edge_density(&gray, edge_magnitude),
        }
    }

    /// `floor((mean + std + entropy) * 1000) mod 2^31`
    pub fn seed(&self) -> u64 {
        let raw = ((self.mean + self.std_dev + self.entropy) * 1000.0).floor();
        (raw as i64).rem_euclid(SEED_MODULUS) as u64
    }
}

struct Nudge {
    kind:    TumorKind,
    amount:  f64,
    applies: fn(&Features) -> bool,
}

const NUDGES: [Nudge; 4] = [
    Nudge { kind: TumorKind::NoTumor,    amount: 0.15, applies: |f| f.std_dev < 20.0 },
    Nudge { kind: TumorKind::Glioma,     amount: 0.10, applies: |f| f.entropy > 6.5 },
    Nudge { kind: TumorKind::Meningioma, amount: 0.10, applies: |f| f.mean < 50.0 },
    Nudge { kind: TumorKind::Pituitary,  amount: 0.10, applies: |f| f.edge_density > 0.1 },
];

/// Deterministic, non-ML probability source.
#[derive(Debug, Clone)]
pub struct FallbackPredictor {
    labels:         ClassLabels,
    edge_magnitude: f64,
}

impl FallbackPredictor {
    pub fn new(labels: ClassLabels, edge_magnitude: f64) -> Self {
        FallbackPredictor { labels, edge_magnitude }
    }

    pub fn predict(&self, bitmap: &Bitmap) -> Probabilities {
        let features = Features::from_bitmap(bitmap, self.edge_magnitude);
        let probs = self.predict_features(&features);
        debug!(?features, ?probs, "fallback prediction");
        probs
    }

    /// Same features, same output.
    pub fn predict_features(&self, features: &Features) -> Probabilities {
        let mut rng = StdRng::seed_from_u64(features.seed());
        let mut scores = dirichlet_uniform(&mut rng, NUM_CLASSES);

        for nudge in NUDGES.iter().filter(|n| (n.applies)(features)) {
            match self.labels.index_of(nudge.kind) {
                Some(i) if i < scores.len() => scores[i] += nudge.amount,
                _ => debug!(kind = ?nudge.kind, "no class for fallback nudge"),
            }
        }

        let total: f64 = scores.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            warn!("fallback scores degenerate, using uniform distribution");
            return vec![1.0 / NUM_CLASSES as f64; NUM_CLASSES];
        }
        scores.iter().map(|s| s / total).collect()
    }
}

impl Classifier for FallbackPredictor {
    fn source(&self) -> PredictionSource { PredictionSource::Fallback }

    fn classify(&self, sample: &Sample<'_>) -> Result<Probabilities, ClassifyError> {
        Ok(self.predict(sample.bitmap))
    }
}

/// Dirichlet(1, …, 1) draw: normalised Exp(1) samples.
fn dirichlet_uniform<R: Rng>(rng: &mut R, k: usize) -> Vec<f64> {
    // 1 - u lies in (0, 1], so ln never sees zero.
    let draws: Vec<f64> = (0..k).map(|_| -(1.0 - rng.gen::<f64>()).ln()).collect();
    let sum: f64 = draws.iter().sum();
    if sum > 0.0 {
        draws.iter().map(|d| d / sum).collect()
    } else {
        vec![1.0 / k as f64; k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    fn features(mean: f64, std_dev: f64, entropy: f64, edge_density: f64) -> Features {
        Features { mean, std_dev, entropy, edge_density }
    }

    fn noisy_bitmap(seed: u64) -> Bitmap {
        let mut rng = StdRng::seed_from_u64(seed);
        let gray = GrayImage::from_fn(64, 64, |_, _| Luma([rng.gen()]));
        Bitmap::from_image(DynamicImage::ImageLuma8(gray))
    }

    #[test]
    fn seed_matches_formula() {
        assert_eq!(features(100.0, 20.0, 5.5, 0.0).seed(), 125_500);
        let big = features(1e7, 0.0, 0.0, 0.0).seed();
        assert!(big < (1u64 << 31));
    }

    #[test]
    fn dirichlet_draw_is_a_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let d = dirichlet_uniform(&mut rng, 4);
            assert!((d.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(d.iter().all(|&p| p > 0.0 && p < 1.0));
        }
    }

    #[test]
    fn same_image_gives_identical_probabilities() {
        let fallback = FallbackPredictor::new(ClassLabels::default(), 0.1);
        let a = fallback.predict(&noisy_bitmap(3));
        let b = fallback.predict(&noisy_bitmap(3));
        assert_eq!(a, b);
    }

    #[test]
    fn output_is_normalised() {
        let fallback = FallbackPredictor::new(ClassLabels::default(), 0.1);
        for seed in 0..10 {
            let p = fallback.predict(&noisy_bitmap(seed));
            assert_eq!(p.len(), NUM_CLASSES);
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-6);
            assert!(p.iter().all(|&x| (0.0..=1.0).contains(&x)));
        }
    }

    #[test]
    fn nudges_shift_mass_toward_their_kind() {
        let fallback = FallbackPredictor::new(ClassLabels::default(), 0.1);
        // Identical seeds; only the low-contrast condition differs.
        let plain  = fallback.predict_features(&features(100.0, 25.0, 5.0, 0.0));
        let mut rng = StdRng::seed_from_u64(features(100.0, 25.0, 5.0, 0.0).seed());
        let base = dirichlet_uniform(&mut rng, NUM_CLASSES);
        for (p, b) in plain.iter().zip(&base) {
            assert!((p - b).abs() < 1e-12);
        }

        let nudged = fallback.predict_features(&features(100.0, 25.0, 5.0, 0.5));
        assert!(nudged[3] > plain[3]);
        assert!(nudged[0] < plain[0]);
    }

    #[test]
    fn edge_density_uses_the_given_magnitude() {
        let bitmap = noisy_bitmap(4);
        let gray = bitmap.to_gray();
        for cut in [0.1, 300.0, 2000.0] {
            let f = Features::from_bitmap(&bitmap, cut);
            assert_eq!(f.edge_density, stats::edge_density(&gray, cut));
        }
        // Sobel magnitudes on 0-255 input never reach 2000.
        assert!(Features::from_bitmap(&bitmap, 0.1).edge_density > 0.9);
        assert_eq!(Features::from_bitmap(&bitmap, 2000.0).edge_density, 0.0);
    }

    #[test]
    fn nudges_follow_label_meaning_not_index() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a_pituitary", "b_no_tumor", "c_glioma", "d_meningioma"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let labels = ClassLabels::try_discover(dir.path()).unwrap();
        let fallback = FallbackPredictor::new(labels, 0.1);

        let f = features(100.0, 25.0, 5.0, 0.5);
        let mut rng = StdRng::seed_from_u64(f.seed());
        let base = dirichlet_uniform(&mut rng, NUM_CLASSES);
        let nudged = fallback.predict_features(&f);
        // Pituitary sits at index 0 here.
        assert!(nudged[0] > base[0]);
    }
}

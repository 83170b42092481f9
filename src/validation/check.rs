use std::fmt;

use serde::{Deserialize, Serialize};

/// One rung of the validation ladder, in evaluation order.
///
/// Earlier (cheaper) checks reject with lower confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Size,
    AspectRatio,
    Colorfulness,
    Brightness,
    Contrast,
    Entropy,
    DistinctValues,
    Structure,
}

impl Check {
    pub const ALL: [Check; 8] = [
        Check::Size,
        Check::AspectRatio,
        Check::Colorfulness,
        Check::Brightness,
        Check::Contrast,
        Check::Entropy,
        Check::DistinctValues,
        Check::Structure,
    ];

    /// Confidence reported when this check rejects an image.
    pub fn rejection_confidence(self) -> f64 {
        match self {
            Check::Size           => 0.05,
            Check::AspectRatio    => 0.08,
            Check::Colorfulness   => 0.10,
            Check::Brightness     => 0.12,
            Check::Contrast       => 0.15,
            Check::Entropy        => 0.18,
            Check::DistinctValues => 0.20,
            Check::Structure      => 0.22,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Check::Size           => "size",
            Check::AspectRatio    => "aspect_ratio",
            Check::Colorfulness   => "colorfulness",
            Check::Brightness     => "brightness",
            Check::Contrast       => "contrast",
            Check::Entropy        => "entropy",
            Check::DistinctValues => "distinct_values",
            Check::Structure      => "structure",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed check together with its human-readable explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub check:  Check,
    pub reason: String,
}

impl Rejection {
    pub fn new(check: Check, reason: impl Into<String>) -> Self {
        Rejection { check, reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_rises_along_the_ladder() {
        let confidences: Vec<f64> = Check::ALL.iter().map(|c| c.rejection_confidence()).collect();
        assert!(confidences.windows(2).all(|w| w[0] < w[1]), "{confidences:?}");
        assert!(confidences.iter().all(|&c| c > 0.0 && c < 0.25 + 1e-9));
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// The classifier distinguishes exactly this many categories.
pub const NUM_CLASSES: usize = 4;

/// Label for indices outside the mapping.
pub const UNKNOWN_LABEL: &str = "Unknown";

const DEFAULT_LABELS: [&str; NUM_CLASSES] = [
    "Glioma Tumor",
    "Meningioma Tumor",
    "No Tumor",
    "Pituitary Tumor",
];

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Cannot list class directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Expected {NUM_CLASSES} class folders in '{path}', found {found}")]
    Count { path: PathBuf, found: usize },
}

/// Semantic category behind a label, independent of how the label is spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TumorKind {
    Glioma,
    Meningioma,
    NoTumor,
    Pituitary,
}

impl TumorKind {
    /// Resolves labels such as "Glioma Tumor", "notumor" or "no_tumor".
    pub fn from_label(label: &str) -> Option<TumorKind> {
        let key: String = label.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if key.contains("notumor") || key == "normal" || key == "healthy" {
            Some(TumorKind::NoTumor)
        } else if key.contains("glioma") {
            Some(TumorKind::Glioma)
        } else if key.contains("meningioma") {
            Some(TumorKind::Meningioma)
        } else if key.contains("pituitary") {
            Some(TumorKind::Pituitary)
        } else {
            None
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TumorKind::Glioma     => "Glioma",
            TumorKind::Meningioma => "Meningioma",
            TumorKind::NoTumor    => "No Tumor",
            TumorKind::Pituitary  => "Pituitary",
        }
    }
}

/// Index → label mapping, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl Default for ClassLabels {
    fn default() -> Self {
        ClassLabels { labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect() }
    }
}

impl ClassLabels {
    /// Reads labels from the class directory, falling back to the built-in
    /// mapping when the directory cannot provide exactly `NUM_CLASSES` names.
    pub fn discover(dir: &Path) -> ClassLabels {
        match ClassLabels::try_discover(dir) {
            Ok(labels) => {
                info!(labels = ?labels.labels, "loaded class labels from training folders");
                labels
            }
            Err(e) => {
                warn!(error = %e, "using default class labels");
                ClassLabels::default()
            }
        }
    }

    /// Sub-directory names, sorted, turned into readable labels
    /// (`no_tumor` → `No Tumor`).
    pub fn try_discover(dir: &Path) -> Result<ClassLabels, LabelError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|source| LabelError::Io { path: dir.to_path_buf(), source })?;

        let mut folders: Vec<String> = entries.flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_owned))
            .collect();
        folders.sort();

        if folders.len() != NUM_CLASSES {
            return Err(LabelError::Count { path: dir.to_path_buf(), found: folders.len() });
        }
        Ok(ClassLabels { labels: folders.iter().map(|f| pretty_label(f)).collect() })
    }

    pub fn len(&self) -> usize { self.labels.len() }

    pub fn is_empty(&self) -> bool { self.labels.is_empty() }

    pub fn as_slice(&self) -> &[String] { &self.labels }

    /// Label for `index`, or `"Unknown"`.
    pub fn get(&self, index: usize) -> &str {
        self.labels.get(index).map(String::as_str).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn kind_of(&self, index: usize) -> Option<TumorKind> {
        self.labels.get(index).and_then(|l| TumorKind::from_label(l))
    }

    /// First index whose label resolves to `kind`.
    pub fn index_of(&self, kind: TumorKind) -> Option<usize> {
        (0..self.labels.len()).find(|&i| self.kind_of(i) == Some(kind))
    }
}

/// Underscores become spaces; each word is capitalised, the rest lowercased.
fn pretty_label(folder: &str) -> String {
    let mut out = String::with_capacity(folder.len());
    let mut at_word_start = true;
    for c in folder.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

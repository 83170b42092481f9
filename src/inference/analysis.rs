use serde::{Deserialize, Serialize};

use crate::classify::TumorKind;

/// Attached to every successful prediction.
pub const DISCLAIMER: &str = "MEDICAL DISCLAIMER: This result is produced by an automated system \
for educational purposes only. It is NOT a diagnosis or medical advice and must not replace \
consultation with a qualified healthcare provider.";

/// Attached to every rejected upload.
pub const INVALID_IMAGE_NOTICE: &str = "INVALID IMAGE: The uploaded file does not appear to be a \
brain MRI scan. Please upload a grayscale brain MRI image.";

/// Descriptive record for the winning class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalAnalysis {
    pub tumor_type: String,
    pub description: String,
    pub advantages: Vec<String>,
    pub disadvantages: Vec<String>,
    pub key_characteristics: Vec<String>,
    pub recommended_next_steps: Vec<String>,
    pub severity_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_note: Option<String>,
}

impl MedicalAnalysis {
    /// Looks up the record for `label`. A note is added when `confidence`
    /// is below `low_confidence_threshold`.
    pub fn for_label(label: &str, confidence: f64, low_confidence_threshold: f64) -> MedicalAnalysis {
        let mut analysis = match TumorKind::from_label(label) {
            Some(kind) => entry(kind).to_analysis(kind.display_name()),
            None => MedicalAnalysis::unknown(label),
        };
        if confidence < low_confidence_threshold {
            analysis.severity_note = Some(low_confidence_note(confidence));
        }
        analysis
    }

    fn unknown(label: &str) -> MedicalAnalysis {
        MedicalAnalysis {
            tumor_type: label.to_owned(),
            description: format!("Unknown tumor type: {label}"),
            advantages: Vec::new(),
            disadvantages: Vec::new(),
            key_characteristics: Vec::new(),
            recommended_next_steps: vec!["Consult with a medical professional".to_owned()],
            severity_level: "Unknown".to_owned(),
            severity_note: None,
        }
    }
}

pub fn low_confidence_note(confidence: f64) -> String {
    format!("LOW CONFIDENCE PREDICTION ({:.1}%). Recommend specialist review.", confidence * 100.0)
}

// ---------------------------------------------------------------------------
// Static table
// ---------------------------------------------------------------------------

struct Entry {
    description:            &'static str,
    advantages:             &'static [&'static str],
    disadvantages:          &'static [&'static str],
    key_characteristics:    &'static [&'static str],
    recommended_next_steps: &'static [&'static str],
    severity_level:         &'static str,
}

impl Entry {
    fn to_analysis(&self, tumor_type: &str) -> MedicalAnalysis {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        MedicalAnalysis {
            tumor_type: tumor_type.to_owned(),
            description: self.description.to_owned(),
            advantages: owned(self.advantages),
            disadvantages: owned(self.disadvantages),
            key_characteristics: owned(self.key_characteristics),
            recommended_next_steps: owned(self.recommended_next_steps),
            severity_level: self.severity_level.to_owned(),
            severity_note: None,
        }
    }
}

fn entry(kind: TumorKind) -> &'static Entry {
    match kind {
        TumorKind::Glioma     => &GLIOMA,
        TumorKind::Meningioma => &MENINGIOMA,
        TumorKind::Pituitary  => &PITUITARY,
        TumorKind::NoTumor    => &NO_TUMOR,
    }
}

static GLIOMA: Entry = Entry {
    description: "A glioma is a tumor that originates from glial cells in the brain. \
                  It is one of the most common types of primary brain tumors.",
    advantages: &[
        "Early detection enables timely intervention",
        "Most gliomas are treatable with surgery and/or radiation",
        "Modern imaging allows precise tumor localization",
        "Multiple treatment options available (surgery, chemotherapy, radiation)",
    ],
    disadvantages: &[
        "Can be aggressive and fast-growing (especially glioblastoma)",
        "Difficult to remove completely due to infiltrative nature",
        "High recurrence rate even after treatment",
        "May require multiple treatment sessions",
        "Risk of neurological complications",
    ],
    key_characteristics: &[
        "Originates from glial cells supporting neurons",
        "Can vary in grade (I-IV), with IV being most aggressive",
        "May cause headaches, seizures, and focal neurological deficits",
        "Visible as irregular masses on MRI, often with surrounding edema",
    ],
    recommended_next_steps: &[
        "Consult with a neuro-oncologist immediately",
        "Get detailed MRI with contrast enhancement",
        "Consider biopsy for grade determination",
        "Discuss treatment options: surgery, radiation, chemotherapy",
        "Regular follow-up imaging to monitor progression",
    ],
    severity_level: "High",
};

static MENINGIOMA: Entry = Entry {
    description: "A meningioma is a tumor that arises from the meninges, the membranes \
                  surrounding the brain and spinal cord. Most are benign.",
    advantages: &[
        "Majority (80-90%) are benign (non-cancerous)",
        "Slow growth rate allows time for observation",
        "Excellent prognosis when surgically removed",
        "Rarely metastasize to other parts of body",
        "Regular imaging can monitor without immediate intervention",
    ],
    disadvantages: &[
        "May cause mass effect and increased intracranial pressure",
        "Surgical removal can be complex depending on location",
        "10-20% are atypical or malignant",
        "Can recur after surgical removal",
        "Large meningiomas may require urgent intervention",
    ],
    key_characteristics: &[
        "Arises from dura mater or arachnoid membrane",
        "Often has a dural tail sign on MRI",
        "Typically dural-based masses",
        "Can compress brain tissue and cause symptoms",
        "Growth rate usually slow and predictable",
    ],
    recommended_next_steps: &[
        "Schedule MRI with gadolinium contrast for better visualization",
        "Consult with a neurosurgeon for treatment planning",
        "If asymptomatic, consider 'watch and wait' approach",
        "If symptomatic, discuss surgical resection",
        "Arrange follow-up imaging every 6-12 months",
        "If grade II/III, consider adjuvant radiation therapy",
    ],
    severity_level: "Medium",
};

static PITUITARY: Entry = Entry {
    description: "A pituitary tumor is an abnormal growth in the pituitary gland, located at \
                  the base of the brain. Most are benign adenomas.",
    advantages: &[
        "Majority (90%+) are benign and slow-growing",
        "Often discovered incidentally on imaging",
        "Many remain stable without treatment for years",
        "Excellent response to medical therapy when hormonal",
        "Surgical success rates are high when intervention needed",
    ],
    disadvantages: &[
        "Can cause hormone imbalances affecting metabolism",
        "May compress optic chiasm causing vision problems",
        "Can lead to hormone deficiency requiring lifelong replacement",
        "Some require frequent monitoring or intervention",
        "Recurrence possible after treatment",
    ],
    key_characteristics: &[
        "Located at the base of brain in the sella turcica",
        "May be hormone-secreting (functional) or non-functional",
        "Often intra-sellar with potential suprasellar extension",
        "Can cause specific hormone-related symptoms",
        "Visible as sellar/suprasellar masses on MRI",
    ],
    recommended_next_steps: &[
        "Obtain detailed pituitary MRI protocol imaging",
        "Get comprehensive hormone level testing (prolactin, ACTH, GH, TSH)",
        "Visual field testing if tumor extends above sella",
        "If non-functional: may observe with serial imaging",
        "If functional: medical therapy (dopamine agonists, somatostatin analogs)",
        "Discuss surgery if symptomatic or vision affected",
        "Arrange endocrinology consultation",
    ],
    severity_level: "Low to Medium",
};

static NO_TUMOR: Entry = Entry {
    description: "No brain tumor detected. The MRI scan appears normal with no abnormal \
                  masses or lesions in the brain parenchyma.",
    advantages: &[
        "Indicates healthy brain tissue",
        "No immediate neurological threat",
        "No need for urgent neurosurgical intervention",
        "Allows continued normal lifestyle and activities",
    ],
    disadvantages: &[
        "If symptoms persist, requires investigation of other causes",
        "Small lesions may not be detected on standard imaging",
        "Does not rule out other neurological conditions",
        "Symptoms may be related to other medical conditions",
    ],
    key_characteristics: &[
        "Normal brain parenchyma without masses",
        "Intact ventricles without dilatation",
        "No midline shift or mass effect",
        "Normal gray-white matter differentiation",
        "No abnormal enhancement with contrast",
    ],
    recommended_next_steps: &[
        "No urgent intervention needed for brain pathology",
        "If symptoms persist, consult neurologist for other causes",
        "Consider follow-up imaging only if new symptoms develop",
        "Maintain regular health checkups",
    ],
    severity_level: "None",
};

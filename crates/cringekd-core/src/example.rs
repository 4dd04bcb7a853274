//! Per-example label and feature assembly.
//!
//! One raw JSONL record becomes an [`Example`]: the post text, the teacher's
//! soft probability vector, and the supervision target the loss trains
//! against. Records are allowed to be sparse; every missing field degrades to
//! a zero-signal default rather than an error.

use std::collections::HashMap;

use serde::Deserialize;

use crate::labels::{LABEL_KEYS, NUM_LABELS};

/// Raw record shape, one per JSONL line.
///
/// All fields below the top level are optional: an empty object is a valid
/// (if useless) record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub post: Post,
    #[serde(default)]
    pub teacher: TeacherOutput,
    /// Human-review labels, present only for reviewed examples.
    #[serde(default)]
    pub human_labels: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeacherOutput {
    /// Soft scores keyed by label name; missing labels default to 0.0.
    #[serde(default)]
    pub labels: HashMap<String, f64>,
}

/// One training/evaluation unit with all label vectors resolved against the
/// schema. Built once per record; stable across epochs.
#[derive(Debug, Clone)]
pub struct Example {
    pub text: String,
    /// Teacher soft probabilities, length [`NUM_LABELS`], entries in [0, 1].
    pub teacher_probs: Vec<f32>,
    /// BCE target: binary human labels when reviewed, else a copy of
    /// `teacher_probs`.
    pub supervision: Vec<f32>,
    human_positive: Vec<bool>,
    has_human_review: bool,
}

impl Example {
    /// Resolve a raw record against the label schema.
    ///
    /// Pure function of its input; never fails. A `human_labels` mapping that
    /// is present but empty counts as "no human review", matching the
    /// upstream data-collection convention.
    pub fn from_record(record: RawRecord) -> Self {
        let teacher_probs: Vec<f32> = LABEL_KEYS
            .iter()
            .map(|l| {
                // Teacher scores are probabilities; out-of-range upstream
                // values are clamped to keep the [0, 1] invariant.
                (record.teacher.labels.get(*l).copied().unwrap_or(0.0) as f32).clamp(0.0, 1.0)
            })
            .collect();

        let (human_positive, has_human_review) = match &record.human_labels {
            Some(m) if !m.is_empty() => (
                LABEL_KEYS
                    .iter()
                    .map(|l| m.get(*l).copied().unwrap_or(false))
                    .collect(),
                true,
            ),
            _ => (vec![false; NUM_LABELS], false),
        };

        let supervision: Vec<f32> = if has_human_review {
            human_positive
                .iter()
                .map(|&b| if b { 1.0 } else { 0.0 })
                .collect()
        } else {
            teacher_probs.clone()
        };

        Self {
            text: record.post.text,
            teacher_probs,
            supervision,
            human_positive,
            has_human_review,
        }
    }

    pub fn has_human_review(&self) -> bool {
        self.has_human_review
    }

    /// Discrete ground truth for metrics: label `i` is positive when a human
    /// marked it, otherwise when the teacher probability meets `threshold`.
    ///
    /// Unlike the supervision target this always thresholds the teacher
    /// score; the raw probability is never used as ground truth. The
    /// fallback is per label: a human review that marks a label false still
    /// lets the thresholded teacher probability decide for that label.
    pub fn ground_truth(&self, threshold: f32) -> Vec<bool> {
        (0..NUM_LABELS)
            .map(|i| self.human_positive[i] || self.teacher_probs[i] >= threshold)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::label_index;

    fn parse(json: &str) -> Example {
        Example::from_record(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn teacher_probs_default_to_zero() {
        let ex = parse(r#"{"post":{"text":"hi"}}"#);
        assert_eq!(ex.teacher_probs.len(), NUM_LABELS);
        assert!(ex.teacher_probs.iter().all(|&p| p == 0.0));
        assert_eq!(ex.text, "hi");
    }

    #[test]
    fn missing_text_defaults_to_empty() {
        let ex = parse(r#"{"teacher":{"labels":{"overall_cringe":0.5}}}"#);
        assert_eq!(ex.text, "");
        assert_eq!(ex.teacher_probs[NUM_LABELS - 1], 0.5);
    }

    #[test]
    fn teacher_probs_stay_in_unit_interval() {
        let ex = parse(r#"{"teacher":{"labels":{"humbleBragging":1.7,"engagementBait":-0.2}}}"#);
        assert!(ex.teacher_probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert_eq!(ex.teacher_probs[label_index("humbleBragging").unwrap()], 1.0);
        assert_eq!(ex.teacher_probs[label_index("engagementBait").unwrap()], 0.0);
    }

    #[test]
    fn without_human_labels_supervision_copies_teacher() {
        let ex = parse(
            r#"{"post":{"text":"Excited to announce my promotion!"},
                "teacher":{"labels":{"humbleBragging":0.9,"overall_cringe":0.8}}}"#,
        );
        assert!(!ex.has_human_review());
        assert_eq!(ex.supervision, ex.teacher_probs);
        assert_eq!(ex.teacher_probs[label_index("humbleBragging").unwrap()], 0.9);
        assert_eq!(ex.teacher_probs[label_index("overall_cringe").unwrap()], 0.8);
        let named = [
            label_index("humbleBragging").unwrap(),
            label_index("overall_cringe").unwrap(),
        ];
        for (i, &p) in ex.teacher_probs.iter().enumerate() {
            if !named.contains(&i) {
                assert_eq!(p, 0.0, "label {} should default to 0.0", LABEL_KEYS[i]);
            }
        }
    }

    #[test]
    fn with_human_labels_supervision_is_binary() {
        let ex = parse(
            r#"{"post":{"text":"Excited to announce my promotion!"},
                "teacher":{"labels":{"humbleBragging":0.9,"overall_cringe":0.8}},
                "human_labels":{"humbleBragging":true}}"#,
        );
        assert!(ex.has_human_review());
        let idx = label_index("humbleBragging").unwrap();
        for (i, &v) in ex.supervision.iter().enumerate() {
            if i == idx {
                assert_eq!(v, 1.0);
            } else {
                assert_eq!(v, 0.0);
            }
        }
        assert!(ex.supervision.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn empty_human_mapping_counts_as_unreviewed() {
        let ex = parse(
            r#"{"teacher":{"labels":{"humbleBragging":0.4}},"human_labels":{}}"#,
        );
        assert!(!ex.has_human_review());
        assert_eq!(ex.supervision, ex.teacher_probs);
    }

    #[test]
    fn ground_truth_prefers_human_then_thresholds_teacher() {
        let ex = parse(
            r#"{"teacher":{"labels":{"humbleBragging":0.9,"excessiveEmojis":0.2}},
                "human_labels":{"engagementBait":true,"humbleBragging":false}}"#,
        );
        let gt = ex.ground_truth(0.5);
        // Human true wins outright.
        assert!(gt[label_index("engagementBait").unwrap()]);
        // Human false still falls back to the thresholded teacher score.
        assert!(gt[label_index("humbleBragging").unwrap()]);
        // Below-threshold teacher score with no human mark stays negative.
        assert!(!gt[label_index("excessiveEmojis").unwrap()]);
    }

    #[test]
    fn ground_truth_thresholds_teacher_when_unreviewed() {
        let ex = parse(r#"{"teacher":{"labels":{"overall_cringe":0.5}}}"#);
        let gt = ex.ground_truth(0.5);
        assert!(gt[label_index("overall_cringe").unwrap()]);
        assert!(!ex.ground_truth(0.51)[label_index("overall_cringe").unwrap()]);
    }
}

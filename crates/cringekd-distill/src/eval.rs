//! Evaluation: continuous predictions to a label-level classification report.
//!
//! Inference runs over the whole dataset (predictions are materialized at
//! once, bounding evaluation-set size by memory), raw logits pass through a
//! sigmoid, and probabilities are thresholded into hard predictions. Ground
//! truth comes from [`Example::ground_truth`]: the human mark when present,
//! the thresholded teacher probability otherwise.
//!
//! All metrics are macro-averaged: each label counts equally regardless of
//! support. A label with zero positive ground-truth examples scores 0.0
//! rather than dividing by zero.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use cringekd_core::{tokenize_batch, Dataset, Example, Tokenizer, LABEL_KEYS};

use crate::batch::input_tensors;
use crate::student::StudentModel;

/// Precision/recall/F1/support for one label, serialized with the
/// conventional report keys.
#[derive(Debug, Clone, Serialize)]
pub struct LabelMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1: f64,
    pub support: u64,
}

/// The full metrics report written to `eval_metrics.json`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub macro_f1: f64,
    /// Macro-averaged precision.
    pub precision: f64,
    /// Macro-averaged recall.
    pub recall: f64,
    pub per_label: BTreeMap<String, LabelMetrics>,
}

impl MetricsReport {
    /// Compare hard predictions against ground truth, both `[examples][N]`.
    pub fn from_predictions(predictions: &[Vec<bool>], ground_truth: &[Vec<bool>]) -> Self {
        assert_eq!(predictions.len(), ground_truth.len());

        let mut per_label = BTreeMap::new();
        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut f1_sum = 0.0;

        for (i, name) in LABEL_KEYS.iter().enumerate() {
            let mut tp = 0u64;
            let mut fp = 0u64;
            let mut fnc = 0u64;
            for (pred, truth) in predictions.iter().zip(ground_truth) {
                match (pred[i], truth[i]) {
                    (true, true) => tp += 1,
                    (true, false) => fp += 1,
                    (false, true) => fnc += 1,
                    (false, false) => {}
                }
            }

            let precision = safe_ratio(tp, tp + fp);
            let recall = safe_ratio(tp, tp + fnc);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            precision_sum += precision;
            recall_sum += recall;
            f1_sum += f1;
            per_label.insert(
                (*name).to_string(),
                LabelMetrics {
                    precision,
                    recall,
                    f1,
                    support: tp + fnc,
                },
            );
        }

        let n = LABEL_KEYS.len() as f64;
        Self {
            macro_f1: f1_sum / n,
            precision: precision_sum / n,
            recall: recall_sum / n,
            per_label,
        }
    }
}

/// Division that reports 0.0 instead of failing when the denominator is 0.
fn safe_ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Runs a trained student over a held-out dataset and builds the report.
pub struct Evaluator {
    pub positive_threshold: f32,
    pub batch_size: usize,
    pub max_length: usize,
}

impl Evaluator {
    /// Full evaluation: inference, sigmoid, threshold, report.
    ///
    /// Deterministic given fixed weights, dataset order and threshold.
    pub fn run(
        &self,
        student: &StudentModel,
        dataset: &Dataset,
        tokenizer: &Tokenizer,
    ) -> Result<MetricsReport> {
        let probs = self.predict_probs(student, dataset, tokenizer)?;
        let predictions: Vec<Vec<bool>> = probs
            .iter()
            .map(|row| row.iter().map(|&p| p >= self.positive_threshold).collect())
            .collect();
        let ground_truth: Vec<Vec<bool>> = dataset
            .examples()
            .iter()
            .map(|ex| ex.ground_truth(self.positive_threshold))
            .collect();
        Ok(MetricsReport::from_predictions(&predictions, &ground_truth))
    }

    /// Per-label sigmoid probabilities for every example, in dataset order.
    pub fn predict_probs(
        &self,
        student: &StudentModel,
        dataset: &Dataset,
        tokenizer: &Tokenizer,
    ) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(dataset.len());
        for chunk in dataset.examples().chunks(self.batch_size) {
            let refs: Vec<&Example> = chunk.iter().collect();
            let batch = tokenize_batch(&refs, tokenizer, self.max_length)?;
            let (input_ids, token_type_ids, attention_mask) =
                input_tensors(&batch, &student.device)?;
            let logits = student.forward(&input_ids, &token_type_ids, &attention_mask)?;
            let probs = candle_nn::ops::sigmoid(&logits)?;
            all.extend(probs.to_vec2::<f32>()?);
        }
        Ok(all)
    }
}

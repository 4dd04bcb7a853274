//! `cringekd eval`: score an already-trained checkpoint.
//!
//! Loads a model directory written by `cringekd train` and reports per-label
//! and macro metrics against a labelled JSONL dataset, without touching the
//! weights.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use cringekd_core::{select_device, Dataset, Tokenizer, LABEL_KEYS};
use cringekd_distill::{export, Evaluator, StudentModel};

use crate::config::AppConfig;

#[allow(clippy::too_many_arguments)]
pub fn run(
    model_dir: &Path,
    data: &Path,
    output: Option<&Path>,
    max_length: Option<usize>,
    batch_size: Option<usize>,
    positive_threshold: Option<f32>,
    gpu: bool,
    cfg: &AppConfig,
) -> Result<()> {
    let t = &cfg.training;
    let max_length = max_length.unwrap_or(t.max_length);
    let batch_size = batch_size.unwrap_or(t.batch_size);
    let positive_threshold = positive_threshold.unwrap_or(t.positive_threshold);

    let device = select_device(gpu || cfg.device.prefer_gpu, cfg.device.cuda_device_id)?;

    let tokenizer = Tokenizer::from_file(&model_dir.join("tokenizer.json"))
        .context("Failed to load tokenizer")?;
    let dataset = Dataset::from_jsonl(data)
        .with_context(|| format!("Failed to load dataset from {}", data.display()))?;
    anyhow::ensure!(!dataset.is_empty(), "evaluation set is empty");

    let student = StudentModel::from_pretrained(model_dir, &device)
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;

    info!(
        examples = dataset.len(),
        positive_threshold,
        "Running evaluation"
    );

    let evaluator = Evaluator {
        positive_threshold,
        batch_size,
        max_length,
    };
    let report = evaluator.run(&student, &dataset, &tokenizer)?;

    println!("Macro F1: {:.4}", report.macro_f1);
    println!("Macro precision: {:.4}", report.precision);
    println!("Macro recall: {:.4}", report.recall);
    println!();
    println!("{:<26} {:>9} {:>9} {:>9} {:>9}", "label", "precision", "recall", "f1", "support");
    for name in LABEL_KEYS {
        let m = &report.per_label[name];
        println!(
            "{:<26} {:>9.3} {:>9.3} {:>9.3} {:>9}",
            name, m.precision, m.recall, m.f1, m.support
        );
    }

    let metrics_path = output.unwrap_or(model_dir).join("eval_metrics.json");
    export::write_metrics(&report, &metrics_path)?;
    println!();
    println!("Metrics written to {}", metrics_path.display());

    Ok(())
}

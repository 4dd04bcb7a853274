//! `cringekd train`: the full distillation pipeline.
//!
//! Load datasets and the base encoder, train with the KD objective, evaluate
//! the best checkpoint, and export a self-contained model directory with a
//! sibling `eval_metrics.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use cringekd_core::{select_device, Dataset, Tokenizer};
use cringekd_distill::{
    export, DistillLoss, Evaluator, StudentModel, TrainConfig, Trainer,
};

use crate::config::AppConfig;

pub struct TrainArgs {
    pub train: PathBuf,
    pub val: PathBuf,
    pub model: PathBuf,
    pub output: PathBuf,
    pub max_length: Option<usize>,
    pub batch_size: Option<usize>,
    pub epochs: Option<usize>,
    pub learning_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub alpha_kl: Option<f64>,
    pub alpha_ce: Option<f64>,
    pub positive_threshold: Option<f32>,
    pub seed: Option<u64>,
    pub gpu: bool,
}

pub fn run(args: TrainArgs, cfg: &AppConfig) -> Result<()> {
    let t = &cfg.training;
    let max_length = args.max_length.unwrap_or(t.max_length);
    let batch_size = args.batch_size.unwrap_or(t.batch_size);
    let epochs = args.epochs.unwrap_or(t.epochs);
    let learning_rate = args.learning_rate.unwrap_or(t.learning_rate);
    let temperature = args.temperature.unwrap_or(t.temperature);
    let alpha_kl = args.alpha_kl.unwrap_or(t.alpha_kl);
    let alpha_ce = args.alpha_ce.unwrap_or(t.alpha_ce);
    let positive_threshold = args.positive_threshold.unwrap_or(t.positive_threshold);
    let seed = args.seed.unwrap_or(t.seed);

    let device = select_device(args.gpu || cfg.device.prefer_gpu, cfg.device.cuda_device_id)?;
    if let Err(e) = device.set_seed(seed) {
        warn!(error = %e, "Device does not support explicit seeding");
    }

    // ── Load data and model ──────────────────────────────────────────────────
    let tokenizer = Tokenizer::from_file(&args.model.join("tokenizer.json"))
        .context("Failed to load tokenizer")?;

    let train_ds = Dataset::from_jsonl(&args.train)
        .with_context(|| format!("Failed to load train set from {}", args.train.display()))?;
    let val_ds = Dataset::from_jsonl(&args.val)
        .with_context(|| format!("Failed to load validation set from {}", args.val.display()))?;

    info!(
        train = train_ds.len(),
        val = val_ds.len(),
        max_length,
        batch_size,
        epochs,
        temperature,
        alpha_kl,
        alpha_ce,
        "Starting distillation"
    );

    let student = StudentModel::from_pretrained(&args.model, &device)
        .with_context(|| format!("Failed to load base encoder from {}", args.model.display()))?;

    // ── Train ────────────────────────────────────────────────────────────────
    let loss = DistillLoss::new(temperature, alpha_kl, alpha_ce);
    let mut trainer = Trainer::new(
        student,
        loss,
        TrainConfig {
            epochs,
            batch_size,
            learning_rate,
            max_length,
            seed,
        },
        args.output.clone(),
    );

    let stats = trainer.run(&train_ds, &val_ds, &tokenizer)?;

    info!(
        steps = stats.total_steps,
        best_epoch = stats.best_epoch,
        best_val_loss = stats.best_val_loss,
        elapsed = format!("{:.1}s", stats.elapsed_secs),
        "Training complete"
    );
    println!("Validation loss: {:.4}", stats.best_val_loss);

    // ── Evaluate the best checkpoint ─────────────────────────────────────────
    let student = trainer.into_student();
    let evaluator = Evaluator {
        positive_threshold,
        batch_size,
        max_length,
    };
    let report = evaluator.run(&student, &val_ds, &tokenizer)?;

    println!("Macro F1: {:.4}", report.macro_f1);
    println!("Macro precision: {:.4}", report.precision);
    println!("Macro recall: {:.4}", report.recall);

    // ── Export ───────────────────────────────────────────────────────────────
    export::export_model(&args.model, &args.output)?;
    let metrics_path = args.output.join("eval_metrics.json");
    export::write_metrics(&report, &metrics_path)?;

    println!("Model and tokenizer saved to {}", args.output.display());
    println!("Metrics written to {}", metrics_path.display());

    Ok(())
}

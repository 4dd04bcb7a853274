use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use config::load_config;

/// cringekd: knowledge-distillation trainer for the multi-label cringe
/// classifier
#[derive(Debug, Parser)]
#[command(name = "cringekd", version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Path to a custom configuration file (TOML).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log format: "pretty" (default) or "json".
    #[arg(long, global = true, default_value = "pretty", value_name = "FORMAT")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Distil the teacher's soft labels into a compact student classifier.
    ///
    /// Reads JSONL datasets where each line carries the post text, the
    /// teacher's per-label probabilities, and optional human-review labels.
    Train {
        /// Path to the train JSONL file.
        #[arg(long)]
        train: PathBuf,

        /// Path to the validation JSONL file.
        #[arg(long)]
        val: PathBuf,

        /// Directory with the base encoder (config.json, model.safetensors,
        /// tokenizer.json).
        #[arg(long, short = 'm')]
        model: PathBuf,

        /// Directory to save the trained model.
        #[arg(long, default_value = "./student_ckpt")]
        output: PathBuf,

        /// Maximum sequence length.
        #[arg(long)]
        max_length: Option<usize>,

        /// Examples per training batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Number of epochs.
        #[arg(long)]
        epochs: Option<usize>,

        /// AdamW learning rate.
        #[arg(long)]
        learning_rate: Option<f64>,

        /// KD temperature.
        #[arg(long)]
        temperature: Option<f64>,

        /// Weight for the KL component.
        #[arg(long)]
        alpha_kl: Option<f64>,

        /// Weight for the hard-label BCE component (used when human labels
        /// are available).
        #[arg(long)]
        alpha_ce: Option<f64>,

        /// Threshold for metrics reporting.
        #[arg(long)]
        positive_threshold: Option<f32>,

        /// Random seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Prefer GPU acceleration (CUDA/Metal).
        #[arg(long)]
        gpu: bool,
    },

    /// Evaluate a trained checkpoint on a labelled JSONL dataset.
    Eval {
        /// Directory with the trained model (as written by `train`).
        #[arg(long, short = 'm')]
        model: PathBuf,

        /// Path to the evaluation JSONL file.
        #[arg(long)]
        data: PathBuf,

        /// Where to write eval_metrics.json. Defaults to the model directory.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Maximum sequence length.
        #[arg(long)]
        max_length: Option<usize>,

        /// Examples per inference batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Threshold for metrics reporting.
        #[arg(long)]
        positive_threshold: Option<f32>,

        /// Prefer GPU acceleration (CUDA/Metal).
        #[arg(long)]
        gpu: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_format);

    let cfg = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Train {
            train,
            val,
            model,
            output,
            max_length,
            batch_size,
            epochs,
            learning_rate,
            temperature,
            alpha_kl,
            alpha_ce,
            positive_threshold,
            seed,
            gpu,
        } => {
            let args = commands::train::TrainArgs {
                train,
                val,
                model,
                output,
                max_length,
                batch_size,
                epochs,
                learning_rate,
                temperature,
                alpha_kl,
                alpha_ce,
                positive_threshold,
                seed,
                gpu,
            };
            commands::train::run(args, &cfg)?;
        }
        Commands::Eval {
            model,
            data,
            output,
            max_length,
            batch_size,
            positive_threshold,
            gpu,
        } => {
            commands::eval::run(
                &model,
                &data,
                output.as_deref(),
                max_length,
                batch_size,
                positive_threshold,
                gpu,
                &cfg,
            )?;
        }
    }

    Ok(())
}

fn init_tracing(log_format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }
}

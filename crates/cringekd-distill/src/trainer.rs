//! The training loop.
//!
//! Epochs of shuffled batches through the student, one distillation loss per
//! batch, AdamW steps. After every epoch the validation loss is measured;
//! the checkpoint with the lowest validation loss wins and is reloaded into
//! the student once training ends, so evaluation and export always see the
//! best weights. Model selection is by validation loss, not macro-F1; the
//! headline metric and the selection criterion are deliberately decoupled.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use candle_nn::optim::{AdamW, Optimizer, ParamsAdamW};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use cringekd_core::{tokenize_batch, Dataset, Example, Tokenizer};

use crate::batch::{input_tensors, target_tensors};
use crate::loss::DistillLoss;
use crate::student::StudentModel;

/// Hyper-parameters for one training run.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// AdamW learning rate.
    pub learning_rate: f64,
    /// Maximum token-sequence length per example.
    pub max_length: usize,
    /// Base seed for the per-epoch shuffles.
    pub seed: u64,
}

/// Summary returned after training completes.
#[derive(Debug, Clone)]
pub struct TrainingStats {
    pub total_steps: usize,
    /// 1-based epoch whose checkpoint was kept.
    pub best_epoch: usize,
    pub best_val_loss: f32,
    pub final_train_loss: f32,
    pub elapsed_secs: f64,
}

pub struct Trainer {
    student: StudentModel,
    loss: DistillLoss,
    config: TrainConfig,
    output_dir: PathBuf,
}

impl Trainer {
    pub fn new(
        student: StudentModel,
        loss: DistillLoss,
        config: TrainConfig,
        output_dir: PathBuf,
    ) -> Self {
        Self { student, loss, config, output_dir }
    }

    /// Consume the trainer and return the (best-checkpoint) student.
    pub fn into_student(self) -> StudentModel {
        self.student
    }

    /// Run the full loop and leave the best weights both on disk and in the
    /// live student.
    pub fn run(
        &mut self,
        train: &Dataset,
        val: &Dataset,
        tokenizer: &Tokenizer,
    ) -> Result<TrainingStats> {
        anyhow::ensure!(!train.is_empty(), "training set is empty");
        anyhow::ensure!(!val.is_empty(), "validation set is empty");
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Cannot create output dir: {}", self.output_dir.display()))?;

        let params = ParamsAdamW {
            lr: self.config.learning_rate,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(self.student.trainable_vars(), params)
            .context("Failed to create AdamW optimiser")?;

        let batches_per_epoch = train.len().div_ceil(self.config.batch_size);
        let total_steps = batches_per_epoch * self.config.epochs;
        let pb = progress_bar(total_steps as u64, "Student training");

        let checkpoint = self.output_dir.join("model.safetensors");
        let mut best_val_loss = f32::INFINITY;
        let mut best_epoch = 0usize;
        let mut last_loss = 0.0f32;
        let mut step = 0usize;
        let start = Instant::now();

        let mut indices: Vec<usize> = (0..train.len()).collect();

        for epoch in 0..self.config.epochs {
            // Same composition every run for a given seed; different order
            // every epoch.
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64));
            indices.shuffle(&mut rng);

            for batch_indices in indices.chunks(self.config.batch_size) {
                let refs: Vec<&Example> = batch_indices
                    .iter()
                    .map(|&i| &train.examples()[i])
                    .collect();
                let batch = tokenize_batch(&refs, tokenizer, self.config.max_length)?;

                let (input_ids, token_type_ids, attention_mask) =
                    input_tensors(&batch, &self.student.device)?;
                let (teacher_probs, targets) = target_tensors(&batch, &self.student.device)?;

                let logits =
                    self.student.forward(&input_ids, &token_type_ids, &attention_mask)?;
                let loss = self
                    .loss
                    .compute(&logits, &teacher_probs, &targets)
                    .context("Loss computation failed")?;
                last_loss = loss.to_scalar::<f32>().unwrap_or(f32::NAN);

                optimizer
                    .backward_step(&loss)
                    .context("Backward/optimizer step failed")?;

                step += 1;
                pb.set_message(format!(
                    "epoch {}/{} loss {:.4}",
                    epoch + 1,
                    self.config.epochs,
                    last_loss
                ));
                pb.inc(1);
            }

            let val_loss = self.validation_loss(val, tokenizer)?;
            info!(
                epoch = epoch + 1,
                train_loss = last_loss,
                val_loss,
                "Epoch complete"
            );

            if val_loss < best_val_loss {
                best_val_loss = val_loss;
                best_epoch = epoch + 1;
                self.student.save(&checkpoint)?;
                info!(
                    epoch = epoch + 1,
                    val_loss,
                    path = %checkpoint.display(),
                    "New best checkpoint"
                );
            }
        }

        pb.finish_with_message(format!("Training complete, best val loss {best_val_loss:.4}"));

        // Evaluation and export must see the best epoch's weights, not the
        // last epoch's.
        if checkpoint.exists() {
            self.student.load_weights(&checkpoint)?;
        } else {
            // Validation loss never improved on infinity (NaN losses); keep
            // the final weights so the output directory is still usable.
            self.student.save(&checkpoint)?;
        }

        Ok(TrainingStats {
            total_steps: step,
            best_epoch,
            best_val_loss,
            final_train_loss: last_loss,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Mean distillation loss over the validation set, forward-only.
    pub fn validation_loss(&self, val: &Dataset, tokenizer: &Tokenizer) -> Result<f32> {
        let mut total = 0.0f64;
        let mut batches = 0usize;
        for chunk in val.examples().chunks(self.config.batch_size) {
            let refs: Vec<&Example> = chunk.iter().collect();
            let batch = tokenize_batch(&refs, tokenizer, self.config.max_length)?;
            let (input_ids, token_type_ids, attention_mask) =
                input_tensors(&batch, &self.student.device)?;
            let (teacher_probs, targets) = target_tensors(&batch, &self.student.device)?;
            let logits = self.student.forward(&input_ids, &token_type_ids, &attention_mask)?;
            let loss = self.loss.compute(&logits, &teacher_probs, &targets)?;
            total += loss.to_scalar::<f32>()? as f64;
            batches += 1;
        }
        Ok(if batches == 0 {
            0.0
        } else {
            (total / batches as f64) as f32
        })
    }
}

fn progress_bar(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap()
        .progress_chars("█▓░"),
    );
    pb.set_message(label.to_string());
    pb
}

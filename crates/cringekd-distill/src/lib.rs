//! # cringekd-distill
//!
//! Knowledge-distillation training for the cringe classifier.
//!
//! A compact BERT-family *student* learns to imitate a larger teacher
//! model's soft probabilities over the fixed label schema, blending a
//! temperature-scaled KL divergence with multi-label binary cross-entropy:
//!
//! 1. [`StudentModel`]: pretrained encoder plus a fresh classification
//!    head, all parameters in a `VarMap` so they can be trained.
//! 2. [`DistillLoss`]: the KD objective; one scalar per batch.
//! 3. [`Trainer`]: shuffled epochs, AdamW steps, best checkpoint by lowest
//!    validation loss.
//! 4. [`Evaluator`]: sigmoid + threshold into a per-label and
//!    macro-averaged precision/recall/F1 report.
//! 5. [`export`]: config/tokenizer artifacts and `eval_metrics.json`.

pub mod batch;
pub mod eval;
pub mod export;
pub mod loss;
pub mod student;
pub mod trainer;

pub use eval::{Evaluator, LabelMetrics, MetricsReport};
pub use loss::{DistillLoss, DEFAULT_NORM_FLOOR};
pub use student::StudentModel;
pub use trainer::{TrainConfig, Trainer, TrainingStats};

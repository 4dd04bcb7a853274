//! # cringekd-core
//!
//! Data model for the cringe-classifier distillation trainer: the fixed
//! label schema, the example adapter that turns raw JSONL records into
//! training units, dataset loading and batch assembly, a thin tokenizer
//! wrapper, and device selection.
//!
//! Everything model- and optimisation-related lives in `cringekd-distill`;
//! this crate stays free of trainable state so the data path can be tested
//! without loading any weights.

pub mod dataset;
pub mod device;
pub mod error;
pub mod example;
pub mod labels;
pub mod tokenizer;

pub use dataset::{tokenize_batch, Dataset, TokenizedBatch};
pub use device::{device_name, select_device};
pub use error::{CoreError, CoreResult};
pub use example::{Example, RawRecord};
pub use labels::{label_index, LABEL_KEYS, NUM_LABELS};
pub use tokenizer::{EncodedText, Tokenizer};

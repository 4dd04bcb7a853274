//! JSONL dataset loading and batch assembly.
//!
//! Each line of the input file is one JSON object in the [`RawRecord`] shape:
//!
//! ```json
//! {"post": {"text": "..."}, "teacher": {"labels": {"humbleBragging": 0.9}},
//!  "human_labels": {"humbleBragging": true}}
//! ```
//!
//! Blank lines are skipped. A line that does not parse aborts the load with
//! the file and line number; missing fields inside a valid record are
//! defaulted by the adapter and never surfaced.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::example::{Example, RawRecord};
use crate::labels::NUM_LABELS;
use crate::tokenizer::Tokenizer;

/// An in-memory dataset of adapted examples, in file order.
#[derive(Debug)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    /// Load every record from a JSONL file.
    pub fn from_jsonl(path: &Path) -> CoreResult<Self> {
        let file = File::open(path)?;
        let mut examples = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: RawRecord =
                serde_json::from_str(trimmed).map_err(|source| CoreError::DataFormat {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    source,
                })?;
            examples.push(Example::from_record(record));
        }

        info!(path = %path.display(), count = examples.len(), "Dataset loaded");
        Ok(Self { examples })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }
}

/// One tokenized, padded batch ready to become tensors.
///
/// `input_ids`, `token_type_ids` and `attention_mask` have shape
/// `[batch, max_length]`; `teacher_probs` and `targets` have shape
/// `[batch, NUM_LABELS]`. Constructed per step and dropped after the step
/// that consumes it.
#[derive(Debug, Clone)]
pub struct TokenizedBatch {
    pub input_ids: Vec<Vec<u32>>,
    pub token_type_ids: Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u32>>,
    pub teacher_probs: Vec<Vec<f32>>,
    pub targets: Vec<Vec<f32>>,
}

impl TokenizedBatch {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Tokenize a batch of examples to a fixed `max_length` and gather their
/// label vectors.
pub fn tokenize_batch(
    examples: &[&Example],
    tokenizer: &Tokenizer,
    max_length: usize,
) -> CoreResult<TokenizedBatch> {
    let mut input_ids = Vec::with_capacity(examples.len());
    let mut token_type_ids = Vec::with_capacity(examples.len());
    let mut attention_mask = Vec::with_capacity(examples.len());
    let mut teacher_probs = Vec::with_capacity(examples.len());
    let mut targets = Vec::with_capacity(examples.len());

    for ex in examples {
        let enc = tokenizer.encode(&ex.text, max_length)?;
        input_ids.push(enc.ids);
        token_type_ids.push(enc.type_ids);
        attention_mask.push(enc.attention_mask);
        debug_assert_eq!(ex.teacher_probs.len(), NUM_LABELS);
        teacher_probs.push(ex.teacher_probs.clone());
        targets.push(ex.supervision.clone());
    }

    Ok(TokenizedBatch {
        input_ids,
        token_type_ids,
        attention_mask,
        teacher_probs,
        targets,
    })
}

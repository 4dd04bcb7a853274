//! Output artifacts for a finished training run.
//!
//! The trainer already wrote the best weights to `model.safetensors`; this
//! module completes the output directory so it is loadable on its own:
//!
//! ```text
//! <output_dir>/
//!   model.safetensors    : best-epoch weights (written by the trainer)
//!   config.json          : base encoder config, patched with the label map
//!   tokenizer.json       : copied from the base encoder directory
//!   tokenizer_config.json: (and friends, when present)
//!   eval_metrics.json    : the evaluation report
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use cringekd_core::{LABEL_KEYS, NUM_LABELS};

use crate::eval::MetricsReport;

/// Copy config and tokenizer artifacts from the base encoder directory into
/// `output_dir`, patching the config for multi-label classification.
pub fn export_model(base_model_dir: &Path, output_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Cannot create output dir: {}", output_dir.display()))?;

    write_patched_config(base_model_dir, output_dir)?;
    copy_tokenizer_files(base_model_dir, output_dir)?;

    info!(output_dir = %output_dir.display(), "Model directory export complete");
    Ok(())
}

/// Write the evaluation report as pretty-printed JSON.
pub fn write_metrics(report: &MetricsReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    info!(path = %path.display(), "Metrics written");
    Ok(())
}

/// Rewrite the base `config.json` with the classification surface: label
/// maps, label count, and the multi-label problem type.
fn write_patched_config(base_model_dir: &Path, output_dir: &Path) -> Result<()> {
    let src = base_model_dir.join("config.json");
    let raw = std::fs::read_to_string(&src)
        .with_context(|| format!("Cannot read {}", src.display()))?;
    let mut config: Value =
        serde_json::from_str(&raw).with_context(|| format!("Cannot parse {}", src.display()))?;
    let obj = config
        .as_object_mut()
        .context("config.json is not a JSON object")?;

    let id2label: serde_json::Map<String, Value> = LABEL_KEYS
        .iter()
        .enumerate()
        .map(|(i, l)| (i.to_string(), json!(l)))
        .collect();
    let label2id: serde_json::Map<String, Value> = LABEL_KEYS
        .iter()
        .enumerate()
        .map(|(i, l)| ((*l).to_string(), json!(i)))
        .collect();

    obj.insert("id2label".to_string(), Value::Object(id2label));
    obj.insert("label2id".to_string(), Value::Object(label2id));
    obj.insert("num_labels".to_string(), json!(NUM_LABELS));
    obj.insert(
        "problem_type".to_string(),
        json!("multi_label_classification"),
    );

    let dst = output_dir.join("config.json");
    std::fs::write(&dst, serde_json::to_string_pretty(&config)?)
        .with_context(|| format!("Cannot write {}", dst.display()))?;
    info!(path = %dst.display(), "config.json written");
    Ok(())
}

/// Copy tokenizer-related files from the base encoder directory so the
/// trained student loads without manual steps.
fn copy_tokenizer_files(src_dir: &Path, dst_dir: &Path) -> Result<()> {
    // The standard HuggingFace tokenizer artifacts.
    let candidates = [
        "tokenizer.json",
        "tokenizer_config.json",
        "special_tokens_map.json",
        "vocab.txt",
        "vocab.json",
        "merges.txt",
        "spm.model",
    ];

    for name in &candidates {
        let src = src_dir.join(name);
        if src.exists() {
            let dst = dst_dir.join(name);
            std::fs::copy(&src, &dst)
                .with_context(|| format!("Failed to copy {name}"))?;
            info!(file = name, "Tokenizer file copied");
        }
    }

    Ok(())
}

//! Trainable student model.
//!
//! A pretrained BERT-family encoder with a fresh linear classification head
//! of width [`NUM_LABELS`]. All parameters live in a [`candle_nn::VarMap`]
//! so they can receive gradients and be updated by the optimiser; the
//! encoder itself is consumed as an opaque text-to-hidden-states capability
//! from `candle_transformers`.
//!
//! ## Construction modes
//!
//! * **`from_pretrained`**: read `config.json` and overlay the weights from
//!   `model.safetensors` onto the freshly-registered variables. Checkpoints
//!   exported by `transformers` prefix encoder keys with `bert.`; the prefix
//!   is detected from the file so both layouts load. Head weights absent
//!   from the checkpoint keep their random initialisation.
//! * **`from_config`**: fully random weights; used by tests and smoke runs.
//!
//! ## Dtype strategy
//!
//! Weights are F32 on CPU and BF16 on CUDA (candle has no BF16 CPU kernels).
//! Logits are cast to F32 before any loss or sigmoid; softmax in BF16 is not
//! numerically trustworthy.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tracing::info;

use cringekd_core::NUM_LABELS;

pub struct StudentModel {
    encoder: BertModel,
    classifier: Linear,
    varmap: VarMap,
    pub device: Device,
}

impl StudentModel {
    /// Load a base encoder from a local directory containing `config.json`
    /// and `model.safetensors`, and attach a classification head.
    pub fn from_pretrained(model_dir: &Path, device: &Device) -> Result<Self> {
        let config = read_bert_config(model_dir)?;

        let weights_path = model_dir.join("model.safetensors");
        let tensors = candle_core::safetensors::load(&weights_path, device)
            .with_context(|| format!("Cannot read weights from {}", weights_path.display()))?;
        let bert_prefixed = tensors.keys().any(|k| k.starts_with("bert."));

        info!(
            model_dir = %model_dir.display(),
            hidden_size = config.hidden_size,
            tensors = tensors.len(),
            bert_prefixed,
            "Loading student base encoder"
        );

        Self::build(config, device, bert_prefixed, Some(&tensors))
    }

    /// Create a student with fully random weights from an explicit config.
    pub fn from_config(config: BertConfig, device: &Device) -> Result<Self> {
        Self::build(config, device, false, None)
    }

    /// Shared construction path: register all variables (random init), then
    /// overwrite the ones the checkpoint provides.
    fn build(
        config: BertConfig,
        device: &Device,
        bert_prefixed: bool,
        pretrained: Option<&HashMap<String, Tensor>>,
    ) -> Result<Self> {
        let dtype = match device {
            Device::Cuda(_) => DType::BF16,
            _ => DType::F32,
        };

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, dtype, device);

        let encoder_vb = if bert_prefixed { vb.pp("bert") } else { vb.clone() };
        let encoder = BertModel::load(encoder_vb, &config)
            .context("Failed to construct student encoder")?;
        let classifier = candle_nn::linear(config.hidden_size, NUM_LABELS, vb.pp("classifier"))
            .context("Failed to construct classification head")?;

        if let Some(tensors) = pretrained {
            let (loaded, total) = overlay_weights(&varmap, tensors)?;
            info!(loaded, total, "Pre-trained weights overlaid; the rest stay random");
        }

        Ok(Self {
            encoder,
            classifier,
            varmap,
            device: device.clone(),
        })
    }

    /// Forward pass: `[batch, seq]` token ids to `[batch, NUM_LABELS]` F32
    /// logits. The first position's hidden state summarises the sequence for
    /// classification.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor> {
        let hidden = self
            .encoder
            .forward(input_ids, token_type_ids, Some(attention_mask))
            .context("Student forward pass failed")?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let logits = self.classifier.forward(&cls)?;
        logits
            .to_dtype(DType::F32)
            .context("Logit dtype cast failed")
    }

    /// All trainable variables, for the optimiser.
    pub fn trainable_vars(&self) -> Vec<candle_core::Var> {
        self.varmap.all_vars()
    }

    /// Save every parameter (encoder and head) to a SafeTensors file.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.varmap
            .save(path)
            .with_context(|| format!("Failed to save student weights to {}", path.display()))
    }

    /// Reload parameters from a checkpoint written by [`StudentModel::save`].
    /// Every variable must be present in the file.
    pub fn load_weights(&mut self, path: &Path) -> Result<()> {
        self.varmap
            .load(path)
            .with_context(|| format!("Failed to load student weights from {}", path.display()))
    }
}

/// Copy every checkpoint tensor whose name matches a registered variable.
/// Returns `(overwritten, total)` variable counts.
fn overlay_weights(
    varmap: &VarMap,
    tensors: &HashMap<String, Tensor>,
) -> Result<(usize, usize)> {
    let data = varmap.data().lock().unwrap();
    let mut loaded = 0usize;
    for (name, var) in data.iter() {
        if let Some(t) = tensors.get(name) {
            var.set(&t.to_dtype(var.dtype())?)
                .with_context(|| format!("Shape mismatch for checkpoint tensor '{name}'"))?;
            loaded += 1;
        }
    }
    Ok((loaded, data.len()))
}

fn read_bert_config(model_dir: &Path) -> Result<BertConfig> {
    let path = model_dir.join("config.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Cannot parse {}", path.display()))
}

//! Tensor construction for tokenized batches.
//!
//! A [`TokenizedBatch`] is plain `Vec`s; these helpers flatten it onto a
//! device. Batch tensors live for exactly one training or inference step.

use candle_core::{Device, Tensor};
use cringekd_core::TokenizedBatch;

/// Build `(input_ids, token_type_ids, attention_mask)`, each
/// `[batch, max_length]` u32.
pub fn input_tensors(
    batch: &TokenizedBatch,
    device: &Device,
) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
    Ok((
        tensor_2d_u32(&batch.input_ids, device)?,
        tensor_2d_u32(&batch.token_type_ids, device)?,
        tensor_2d_u32(&batch.attention_mask, device)?,
    ))
}

/// Build `(teacher_probs, targets)`, each `[batch, num_labels]` f32.
pub fn target_tensors(
    batch: &TokenizedBatch,
    device: &Device,
) -> candle_core::Result<(Tensor, Tensor)> {
    Ok((
        tensor_2d_f32(&batch.teacher_probs, device)?,
        tensor_2d_f32(&batch.targets, device)?,
    ))
}

fn tensor_2d_u32(rows: &[Vec<u32>], device: &Device) -> candle_core::Result<Tensor> {
    let batch = rows.len();
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<u32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::from_vec(flat, (batch, width), device)
}

fn tensor_2d_f32(rows: &[Vec<f32>], device: &Device) -> candle_core::Result<Tensor> {
    let batch = rows.len();
    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::from_vec(flat, (batch, width), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cringekd_core::NUM_LABELS;

    #[test]
    fn tensors_have_expected_shapes() {
        let batch = TokenizedBatch {
            input_ids: vec![vec![1, 2, 0], vec![3, 0, 0]],
            token_type_ids: vec![vec![0; 3], vec![0; 3]],
            attention_mask: vec![vec![1, 1, 0], vec![1, 0, 0]],
            teacher_probs: vec![vec![0.0; NUM_LABELS], vec![0.5; NUM_LABELS]],
            targets: vec![vec![0.0; NUM_LABELS], vec![1.0; NUM_LABELS]],
        };
        let device = Device::Cpu;
        let (ids, types, mask) = input_tensors(&batch, &device).unwrap();
        assert_eq!(ids.dims(), &[2, 3]);
        assert_eq!(types.dims(), &[2, 3]);
        assert_eq!(mask.dims(), &[2, 3]);

        let (teacher, targets) = target_tensors(&batch, &device).unwrap();
        assert_eq!(teacher.dims(), &[2, NUM_LABELS]);
        assert_eq!(targets.dims(), &[2, NUM_LABELS]);
        assert_eq!(
            targets.to_vec2::<f32>().unwrap()[1],
            vec![1.0; NUM_LABELS]
        );
    }
}

//! The distillation objective.
//!
//! Blends two signals into one differentiable scalar:
//!
//! * **KL term**: the teacher's probability vector is raised to `1/T`
//!   elementwise, renormalized to sum to 1 (with a floor on the denominator
//!   so an all-zero row divides safely), and compared against the student's
//!   temperature-scaled log-softmax. The result is averaged over the batch
//!   and multiplied by `T²`, the standard compensation that keeps gradient
//!   magnitude roughly temperature-invariant.
//! * **CE term**: mean elementwise binary cross-entropy with logits against
//!   the supervision target (binary human labels when present, the raw
//!   teacher probabilities otherwise).
//!
//! Known modeling tension, preserved deliberately: the KL term runs a softmax
//! over the label dimension, treating the 15 labels as a single categorical
//! distribution, while the CE term treats them as independent binaries. The
//! teacher's soft scores act as a pseudo-distribution for distillation while
//! hard labels are supervised independently. Changing either side is a
//! product decision, not a cleanup.

use candle_core::{DType, Tensor, D};
use candle_nn::ops::log_softmax;

/// Floor applied to renormalization denominators and to probabilities before
/// `ln`, so degenerate teacher rows produce zeros instead of NaNs.
pub const DEFAULT_NORM_FLOOR: f64 = 1e-9;

/// Weighted KD objective. Construct once per run; `compute` is called once
/// per batch.
#[derive(Debug, Clone)]
pub struct DistillLoss {
    /// KD temperature; higher values flatten both distributions.
    pub temperature: f64,
    /// Weight of the KL component.
    pub alpha_kl: f64,
    /// Weight of the BCE component.
    pub alpha_ce: f64,
    /// Zero-division guard, see [`DEFAULT_NORM_FLOOR`].
    pub norm_floor: f64,
}

impl DistillLoss {
    pub fn new(temperature: f64, alpha_kl: f64, alpha_ce: f64) -> Self {
        Self {
            temperature,
            alpha_kl,
            alpha_ce,
            norm_floor: DEFAULT_NORM_FLOOR,
        }
    }

    /// Sharpen (`T < 1`) or soften (`T > 1`) the teacher distribution:
    /// elementwise power `1/T`, then renormalize each row to sum to 1.
    ///
    /// The denominator is floored so an all-zero teacher row stays an
    /// all-zero row rather than raising or going NaN.
    pub fn sharpen_teacher(&self, teacher_probs: &Tensor) -> candle_core::Result<Tensor> {
        let powered = teacher_probs.powf(1.0 / self.temperature)?;
        let denom = powered.sum_keepdim(D::Minus1)?.maximum(self.norm_floor)?;
        powered.broadcast_div(&denom)
    }

    /// One scalar loss for a batch: `alpha_kl * KL + alpha_ce * CE`.
    ///
    /// `student_logits`, `teacher_probs` and `targets` all have shape
    /// `[batch, num_labels]`. Logits are cast to F32 first; softmax and BCE
    /// over half-precision values are not numerically trustworthy.
    pub fn compute(
        &self,
        student_logits: &Tensor,
        teacher_probs: &Tensor,
        targets: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let t = self.temperature;
        let (batch, _labels) = student_logits.dims2()?;
        let logits = student_logits.to_dtype(DType::F32)?;

        let teacher_soft = self.sharpen_teacher(teacher_probs)?;
        let student_log_soft = log_softmax(&logits.affine(1.0 / t, 0.0)?, D::Minus1)?;

        // KL(P||Q) = sum(P * (ln P - log Q)), batch-mean, scaled by T^2.
        // P is floored before ln so zero entries contribute exactly 0.
        let teacher_ln = teacher_soft.maximum(self.norm_floor)?.log()?;
        let kl_sum = teacher_soft
            .mul(&teacher_ln.sub(&student_log_soft)?)?
            .sum_all()?;
        let kl = kl_sum.affine(t * t / batch as f64, 0.0)?;

        let ce = candle_nn::loss::binary_cross_entropy_with_logit(&logits, targets)?;

        kl.affine(self.alpha_kl, 0.0)?
            .add(&ce.affine(self.alpha_ce, 0.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn loss() -> DistillLoss {
        DistillLoss::new(2.0, 0.7, 0.3)
    }

    fn row(values: &[f32], device: &Device) -> Tensor {
        Tensor::from_vec(values.to_vec(), (1, values.len()), device).unwrap()
    }

    fn entropy(probs: &[f32]) -> f64 {
        probs
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -(p as f64) * (p as f64).ln())
            .sum()
    }

    #[test]
    fn loss_is_non_negative() {
        let device = Device::Cpu;
        let logits = row(&[1.5, -0.5, 0.25, 2.0], &device);
        let teacher = row(&[0.9, 0.1, 0.0, 0.4], &device);
        let targets = row(&[1.0, 0.0, 0.0, 1.0], &device);
        let value = loss()
            .compute(&logits, &teacher, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(value >= 0.0, "loss must be non-negative, got {value}");
        assert!(value.is_finite());
    }

    #[test]
    fn all_zero_teacher_row_is_finite() {
        let device = Device::Cpu;
        let logits = row(&[0.3, -1.2, 0.8], &device);
        let teacher = row(&[0.0, 0.0, 0.0], &device);
        let targets = row(&[0.0, 0.0, 0.0], &device);
        let value = loss()
            .compute(&logits, &teacher, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(value.is_finite(), "zero teacher vector must not NaN");
        assert!(value >= 0.0);
    }

    #[test]
    fn kl_term_invariant_to_uniform_teacher_rescaling() {
        let device = Device::Cpu;
        // alpha_ce = 0 isolates the KL term.
        let kl_only = DistillLoss {
            alpha_ce: 0.0,
            ..loss()
        };
        let logits = row(&[0.2, 1.1, -0.7], &device);
        let targets = row(&[0.0, 1.0, 0.0], &device);

        let teacher = row(&[0.8, 0.4, 0.2], &device);
        let scaled = row(&[0.4, 0.2, 0.1], &device);

        let a = kl_only
            .compute(&logits, &teacher, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        let b = kl_only
            .compute(&logits, &scaled, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((a - b).abs() < 1e-5, "renormalization must cancel scaling: {a} vs {b}");
    }

    #[test]
    fn matching_distributions_leave_only_bce() {
        let device = Device::Cpu;
        // Uniform teacher and zero logits give softmax == teacher_soft, so
        // the KL term vanishes and only alpha_ce * BCE remains. With targets
        // at 0.5 and sigmoid(0) = 0.5, BCE is exactly ln 2.
        let logits = row(&[0.0, 0.0], &device);
        let teacher = row(&[0.5, 0.5], &device);
        let targets = row(&[0.5, 0.5], &device);
        let value = loss()
            .compute(&logits, &teacher, &targets)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        let expected = 0.3 * std::f32::consts::LN_2;
        assert!(
            (value - expected).abs() < 1e-4,
            "expected {expected}, got {value}"
        );
    }

    #[test]
    fn temperature_softens_teacher_distribution() {
        let device = Device::Cpu;
        let teacher = row(&[0.9, 0.05, 0.05], &device);
        let mut previous = -1.0f64;
        for t in [0.5, 1.0, 2.0, 4.0, 8.0] {
            let l = DistillLoss::new(t, 0.7, 0.3);
            let soft = l.sharpen_teacher(&teacher).unwrap();
            let probs = soft.to_vec2::<f32>().unwrap().remove(0);
            let sum: f32 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "renormalized row must sum to 1");
            let h = entropy(&probs);
            assert!(
                h > previous,
                "entropy must increase with temperature: {h} after {previous}"
            );
            previous = h;
        }
    }

    #[test]
    fn sharpened_zero_row_stays_zero() {
        let device = Device::Cpu;
        let teacher = row(&[0.0, 0.0, 0.0], &device);
        let soft = loss().sharpen_teacher(&teacher).unwrap();
        let probs = soft.to_vec2::<f32>().unwrap().remove(0);
        assert!(probs.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn batch_of_two_averages_over_batch() {
        let device = Device::Cpu;
        let kl_only = DistillLoss {
            alpha_ce: 0.0,
            ..loss()
        };
        let logits1 = row(&[0.4, -0.3], &device);
        let teacher1 = row(&[0.7, 0.1], &device);
        let targets1 = row(&[0.0, 0.0], &device);
        let single = kl_only
            .compute(&logits1, &teacher1, &targets1)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();

        // Duplicating the example must not change the batch-mean KL.
        let logits2 = Tensor::cat(&[&logits1, &logits1], 0).unwrap();
        let teacher2 = Tensor::cat(&[&teacher1, &teacher1], 0).unwrap();
        let targets2 = Tensor::cat(&[&targets1, &targets1], 0).unwrap();
        let doubled = kl_only
            .compute(&logits2, &teacher2, &targets2)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!((single - doubled).abs() < 1e-5);
    }
}

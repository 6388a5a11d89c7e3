use crate::common::*;

/// Pixel-level confusion counts of a binarized prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionCounts {
    pub true_pos: u64,
    pub false_pos: u64,
    pub true_neg: u64,
    pub false_neg: u64,
}

impl ConfusionCounts {
    /// Binarizes `pred > threshold` and `gt > 0.5`, then counts the pixels.
    pub fn from_tensors(pred: &Tensor, gt: &Tensor, threshold: f64) -> Result<Self> {
        ensure!(
            pred.size() == gt.size(),
            "prediction and ground truth must have equal shape, but get {:?} and {:?}",
            pred.size(),
            gt.size()
        );

        let pred = pred.gt(threshold);
        let gt = gt.gt(0.5);
        let count = |mask: Tensor| i64::from(mask.sum(Kind::Int64)) as u64;

        let true_pos = count(pred.logical_and(&gt));
        let false_pos = count(pred.logical_and(&gt.logical_not()));
        let false_neg = count(pred.logical_not().logical_and(&gt));
        let true_neg = pred.numel() as u64 - true_pos - false_pos - false_neg;

        Ok(Self {
            true_pos,
            false_pos,
            true_neg,
            false_neg,
        })
    }

    pub fn dice(&self) -> f64 {
        let Self {
            true_pos,
            false_pos,
            false_neg,
            ..
        } = *self;
        safe_ratio(2 * true_pos, 2 * true_pos + false_pos + false_neg)
    }

    pub fn jaccard(&self) -> f64 {
        let Self {
            true_pos,
            false_pos,
            false_neg,
            ..
        } = *self;
        safe_ratio(true_pos, true_pos + false_pos + false_neg)
    }

    pub fn sensitivity(&self) -> f64 {
        safe_ratio(self.true_pos, self.true_pos + self.false_neg)
    }

    pub fn precision(&self) -> f64 {
        safe_ratio(self.true_pos, self.true_pos + self.false_pos)
    }

    pub fn specificity(&self) -> f64 {
        safe_ratio(self.true_neg, self.true_neg + self.false_pos)
    }
}

/// Returns `NaN` on a zero denominator.
fn safe_ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        f64::NAN
    } else {
        num as f64 / den as f64
    }
}

/// Mean absolute difference between two tensors of equal shape.
pub fn mean_absolute_error(pred: &Tensor, gt: &Tensor) -> Result<f64> {
    ensure!(
        pred.size() == gt.size(),
        "prediction and ground truth must have equal shape, but get {:?} and {:?}",
        pred.size(),
        gt.size()
    );
    ensure!(pred.numel() > 0, "cannot compute the error of empty tensors");
    let error = (pred.to_kind(Kind::Float) - gt.to_kind(Kind::Float))
        .abs()
        .mean(Kind::Float);
    Ok(f64::from(&error))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_counts_test() -> Result<()> {
        let pred = Tensor::of_slice(&[0.9f32, 0.8, 0.2, 0.1, 0.7, 0.3]);
        let gt = Tensor::of_slice(&[1f32, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let counts = ConfusionCounts::from_tensors(&pred, &gt, 0.5)?;
        assert_eq!(
            counts,
            ConfusionCounts {
                true_pos: 2,
                false_pos: 1,
                true_neg: 2,
                false_neg: 1,
            }
        );
        assert_abs_diff_eq!(counts.dice(), 4.0 / 6.0);
        assert_abs_diff_eq!(counts.jaccard(), 0.5);
        assert_abs_diff_eq!(counts.sensitivity(), 2.0 / 3.0);
        assert_abs_diff_eq!(counts.precision(), 2.0 / 3.0);
        assert_abs_diff_eq!(counts.specificity(), 2.0 / 3.0);
        Ok(())
    }

    #[test]
    fn empty_foreground_gives_nan() -> Result<()> {
        let zeros = Tensor::zeros(&[4, 4], (Kind::Float, Device::Cpu));
        let counts = ConfusionCounts::from_tensors(&zeros, &zeros, 0.5)?;
        assert!(counts.dice().is_nan());
        assert!(counts.precision().is_nan());
        assert_abs_diff_eq!(counts.specificity(), 1.0);
        Ok(())
    }

    #[test]
    fn shape_mismatch_is_error() {
        let pred = Tensor::zeros(&[4, 4], (Kind::Float, Device::Cpu));
        let gt = Tensor::zeros(&[4, 5], (Kind::Float, Device::Cpu));
        assert!(ConfusionCounts::from_tensors(&pred, &gt, 0.5).is_err());
        assert!(mean_absolute_error(&pred, &gt).is_err());
    }

    #[test]
    fn mean_absolute_error_test() -> Result<()> {
        let pred = Tensor::of_slice(&[1f32, 0.0, 0.5, 0.0]);
        let gt = Tensor::of_slice(&[1f32, 1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(mean_absolute_error(&pred, &gt)?, 0.375, epsilon = 1e-6);
        Ok(())
    }
}

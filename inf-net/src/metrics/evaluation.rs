use super::{
    segmentation::{mean_absolute_error, ConfusionCounts},
    statistics::{ClassReport, MetricAccumulator},
};
use crate::common::*;

pub const CLASS_NAMES: [&str; 3] = ["background", "ground glass opacities", "consolidation"];

/// Binarization thresholds of the multi-class evaluation.
///
/// The background class is binarized with the ground-glass opacity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub ggo: f64,
    pub consolidation: f64,
}

impl Default for ClassThresholds {
    fn default() -> Self {
        Self {
            ggo: 0.5,
            consolidation: 0.5,
        }
    }
}

impl ClassThresholds {
    pub fn get(&self, class_index: usize) -> f64 {
        match class_index {
            2 => self.consolidation,
            _ => self.ggo,
        }
    }
}

/// Accumulates per-class metrics of background, GGO and consolidation.
#[derive(Debug, Clone)]
pub struct MultiClassEvaluator {
    thresholds: ClassThresholds,
    accumulators: [MetricAccumulator; 3],
}

impl MultiClassEvaluator {
    pub fn new(thresholds: ClassThresholds) -> Self {
        Self {
            thresholds,
            accumulators: Default::default(),
        }
    }

    /// Adds one image given its class scores and one-hot mask, both `[3, H, W]`
    /// or `[1, 3, H, W]`.
    pub fn update(&mut self, scores: &Tensor, mask: &Tensor) -> Result<()> {
        let squeeze = |tensor: &Tensor| -> Result<Tensor> {
            match *tensor.size().as_slice() {
                [3, _h, _w] => Ok(tensor.shallow_clone()),
                [1, 3, _h, _w] => Ok(tensor.squeeze_dim(0)),
                _ => bail!(
                    "expect a [3, H, W] or [1, 3, H, W] tensor, but get {:?}",
                    tensor.size()
                ),
            }
        };
        let scores = squeeze(scores)?;
        let mask = squeeze(mask)?.to_kind(Kind::Float);
        let pred = scores.f_argmax_one_hot()?;
        ensure!(
            pred.size() == mask.size(),
            "prediction and mask must have equal shape, but get {:?} and {:?}",
            pred.size(),
            mask.size()
        );

        for (index, acc) in self.accumulators.iter_mut().enumerate() {
            let class_pred = pred.i(index as i64);
            let class_mask = mask.i(index as i64);
            let counts =
                ConfusionCounts::from_tensors(&class_pred, &class_mask, self.thresholds.get(index))?;
            let loss = mean_absolute_error(&class_pred, &class_mask)?;
            acc.record(&counts, loss);
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accumulators[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators[0].is_empty()
    }

    pub fn ggo_dice(&self) -> &[f64] {
        self.accumulators[1].dice_values()
    }

    pub fn consolidation_dice(&self) -> &[f64] {
        self.accumulators[2].dice_values()
    }

    pub fn report(&self) -> Result<MultiClassReport> {
        ensure!(!self.is_empty(), "no image was evaluated");
        let [background, ggo, consolidation] = [
            self.accumulators[0].summarize(),
            self.accumulators[1].summarize(),
            self.accumulators[2].summarize(),
        ];
        let overall = ClassReport::overall(&[background, ggo, consolidation])?;
        Ok(MultiClassReport {
            classes: [background, ggo, consolidation],
            overall,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiClassReport {
    pub classes: [ClassReport; 3],
    pub overall: ClassReport,
}

impl Display for MultiClassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = CLASS_NAMES
            .iter()
            .zip(&self.classes)
            .chain(iter::once((&"overall", &self.overall)));

        for (name, report) in sections {
            writeln!(f, "{}", name)?;
            writeln!(f, "==============================")?;
            writeln!(f, "{}", report.mean_row())?;
            writeln!(f, "============error=============")?;
            writeln!(f, "{}", report.error_row())?;
            writeln!(f, "==============================")?;
            writeln!(f, "==============================")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(classes: &[i64], height: i64, width: i64) -> Tensor {
        Tensor::of_slice(classes)
            .view([height, width])
            .one_hot(3)
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
    }

    #[test]
    fn perfect_prediction_test() -> Result<()> {
        let mask = one_hot(&[0, 1, 2, 1], 2, 2);
        let scores = &mask * 0.8 + 0.1;

        let mut evaluator = MultiClassEvaluator::new(ClassThresholds::default());
        evaluator.update(&scores, &mask)?;
        evaluator.update(&scores.unsqueeze(0), &mask.unsqueeze(0))?;

        let report = evaluator.report()?;
        for class in &report.classes {
            assert_abs_diff_eq!(class.dice.mean, 1.0);
            assert_abs_diff_eq!(class.dice.error, 0.0);
            assert_abs_diff_eq!(class.loss.mean, 0.0);
        }
        assert_eq!(evaluator.ggo_dice(), &[1.0, 1.0]);
        assert!(report.to_string().contains("overall\n"));
        Ok(())
    }

    #[test]
    fn missing_class_is_skipped() -> Result<()> {
        let mask = one_hot(&[0, 0, 1, 1], 2, 2);
        let scores = one_hot(&[0, 0, 1, 0], 2, 2);

        let mut evaluator = MultiClassEvaluator::new(ClassThresholds::default());
        evaluator.update(&scores, &mask)?;
        let report = evaluator.report()?;

        // consolidation is absent from both maps
        assert_eq!(report.classes[2].dice.count, 0);
        assert_abs_diff_eq!(report.classes[1].dice.mean, 2.0 / 3.0);
        assert!(evaluator.consolidation_dice().is_empty());
        Ok(())
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        let mut evaluator = MultiClassEvaluator::new(ClassThresholds::default());
        let mask = one_hot(&[0, 1, 2, 1], 2, 2);
        let scores = Tensor::zeros(&[2, 2, 2], (Kind::Float, Device::Cpu));
        assert!(evaluator.update(&scores, &mask).is_err());
        assert!(evaluator.report().is_err());
    }
}

use crate::common::*;

/// Precision, recall and F1 of single-label predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassificationReport {
    /// Micro-averaged scores. With one label per sample, every wrong
    /// prediction is both a false positive and a false negative.
    pub fn micro<T>(truth: &[T], pred: &[T]) -> Result<Self>
    where
        T: PartialEq,
    {
        ensure!(
            truth.len() == pred.len(),
            "the numbers of ground truth and predicted labels differ: {} != {}",
            truth.len(),
            pred.len()
        );

        let support = truth.len();
        let true_pos = izip!(truth, pred).filter(|(t, p)| t == p).count();
        let false_pos = support - true_pos;
        let false_neg = false_pos;

        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        let precision = ratio(true_pos, true_pos + false_pos);
        let recall = ratio(true_pos, true_pos + false_neg);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Ok(Self {
            precision,
            recall,
            f1,
            support,
        })
    }
}

impl Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "f1 score: {:.4}, precision: {:.4}, recall: {:.4} (n = {})",
            self.f1, self.precision, self.recall, self.support
        )
    }
}

use super::segmentation::ConfusionCounts;
use crate::common::*;

/// z-score of the two-sided 95% confidence interval.
pub const Z_95: f64 = 1.96;

/// Mean of a series with its 95% confidence half-width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// `1.96 · std / sqrt(n)` with the population standard deviation.
    pub error: f64,
    pub count: usize,
}

impl Summary {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self {
                mean: f64::NAN,
                error: f64::NAN,
                count,
            };
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
        let error = variance.sqrt() / n.sqrt() * Z_95;

        Self { mean, error, count }
    }
}

/// Per-image values of one class, summarized into a [ClassReport].
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    loss: Vec<f64>,
    dice: Vec<f64>,
    jaccard: Vec<f64>,
    sensitivity: Vec<f64>,
    precision: Vec<f64>,
    specificity: Vec<f64>,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one image. Undefined ratio metrics are skipped, the loss is always kept.
    pub fn record(&mut self, counts: &ConfusionCounts, loss: f64) {
        self.loss.push(loss);
        let pairs = [
            (&mut self.dice, counts.dice()),
            (&mut self.jaccard, counts.jaccard()),
            (&mut self.sensitivity, counts.sensitivity()),
            (&mut self.precision, counts.precision()),
            (&mut self.specificity, counts.specificity()),
        ];
        for (series, value) in pairs {
            if !value.is_nan() {
                series.push(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loss.is_empty()
    }

    pub fn dice_values(&self) -> &[f64] {
        &self.dice
    }

    pub fn summarize(&self) -> ClassReport {
        ClassReport {
            loss: Summary::from_values(&self.loss),
            dice: Summary::from_values(&self.dice),
            jaccard: Summary::from_values(&self.jaccard),
            sensitivity: Summary::from_values(&self.sensitivity),
            precision: Summary::from_values(&self.precision),
            specificity: Summary::from_values(&self.specificity),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    /// Mean absolute error between the prediction and the mask.
    pub loss: Summary,
    pub dice: Summary,
    pub jaccard: Summary,
    pub sensitivity: Summary,
    pub precision: Summary,
    pub specificity: Summary,
}

impl ClassReport {
    /// Averages the means and the errors of several class reports.
    pub fn overall(reports: &[ClassReport]) -> Result<ClassReport> {
        ensure!(!reports.is_empty(), "at least one class report is required");

        let average = |get: fn(&ClassReport) -> Summary| {
            let n = reports.len() as f64;
            Summary {
                mean: reports.iter().map(|r| get(r).mean).sum::<f64>() / n,
                error: reports.iter().map(|r| get(r).error).sum::<f64>() / n,
                count: reports.iter().map(|r| get(r).count).sum(),
            }
        };

        Ok(ClassReport {
            loss: average(|r| r.loss),
            dice: average(|r| r.dice),
            jaccard: average(|r| r.jaccard),
            sensitivity: average(|r| r.sensitivity),
            precision: average(|r| r.precision),
            specificity: average(|r| r.specificity),
        })
    }

    fn table_columns(&self) -> [Summary; 4] {
        [self.dice, self.jaccard, self.sensitivity, self.precision]
    }

    /// `dice & jaccard & sensitivity & precision`, rounded to 2 decimals.
    pub fn mean_row(&self) -> String {
        self.table_columns()
            .iter()
            .map(|summary| round_to(summary.mean, 2).to_string())
            .join(" & ")
    }

    /// The confidence half-widths as `$\pm$err` cells, rounded to 3 decimals.
    pub fn error_row(&self) -> String {
        self.table_columns()
            .iter()
            .map(|summary| format!("$\\pm${}", round_to(summary.error, 3)))
            .join(" & ")
    }
}

pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_test() {
        let summary = Summary::from_values(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(summary.count, 4);
        assert_abs_diff_eq!(summary.mean, 2.5);
        // population std of [1, 2, 3, 4] is sqrt(1.25)
        assert_abs_diff_eq!(summary.error, 1.25f64.sqrt() / 2.0 * 1.96, epsilon = 1e-12);

        let empty = Summary::from_values(&[]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan() && empty.error.is_nan());
    }

    #[test]
    fn accumulator_skips_undefined_values() {
        let mut acc = MetricAccumulator::new();
        acc.record(
            &ConfusionCounts {
                true_pos: 1,
                false_pos: 0,
                true_neg: 2,
                false_neg: 1,
            },
            0.25,
        );
        acc.record(
            &ConfusionCounts {
                true_neg: 4,
                ..Default::default()
            },
            0.0,
        );

        let report = acc.summarize();
        assert_eq!(acc.len(), 2);
        assert_eq!(report.loss.count, 2);
        assert_eq!(report.dice.count, 1);
        assert_abs_diff_eq!(report.dice.mean, 2.0 / 3.0);
        assert_eq!(report.specificity.count, 2);
        assert_eq!(acc.dice_values(), &[2.0 / 3.0]);
    }

    #[test]
    fn overall_and_rows() -> Result<()> {
        let constant = |mean: f64, error: f64| Summary {
            mean,
            error,
            count: 1,
        };
        let report = |mean: f64, error: f64| ClassReport {
            loss: constant(mean, error),
            dice: constant(mean, error),
            jaccard: constant(mean, error),
            sensitivity: constant(mean, error),
            precision: constant(mean, error),
            specificity: constant(mean, error),
        };

        let overall = ClassReport::overall(&[report(0.9, 0.01), report(0.5, 0.02), report(0.4, 0.03)])?;
        assert_abs_diff_eq!(overall.dice.mean, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(overall.dice.error, 0.02, epsilon = 1e-12);
        assert_eq!(overall.dice.count, 3);

        assert_eq!(report(0.8567, 0.01234).mean_row(), "0.86 & 0.86 & 0.86 & 0.86");
        assert_eq!(
            report(0.8567, 0.01234).error_row(),
            "$\\pm$0.012 & $\\pm$0.012 & $\\pm$0.012 & $\\pm$0.012"
        );
        assert!(ClassReport::overall(&[]).is_err());
        Ok(())
    }
}

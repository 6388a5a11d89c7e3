use crate::common::*;

/// Clinician-assigned severity labels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString, StrumDisplay,
)]
pub enum Severity {
    Regular,
    Control,
    Mild,
    Severe,
    #[serde(rename = "Critically ill")]
    #[strum(serialize = "Critically ill")]
    CriticallyIll,
}

impl Severity {
    pub fn score(&self) -> SeverityScore {
        match self {
            Self::Regular | Self::Control | Self::Mild => SeverityScore::Regular,
            Self::Severe => SeverityScore::Severe,
            Self::CriticallyIll => SeverityScore::CriticallyIll,
        }
    }
}

/// Ordinal severity score `0`, `1` or `2`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
)]
pub enum SeverityScore {
    Regular = 0,
    Severe = 1,
    #[strum(serialize = "Critically ill")]
    CriticallyIll = 2,
}

impl SeverityScore {
    pub fn to_index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum SeverityError {
    #[error("the parenchyma mask has zero area")]
    EmptyParenchyma,
    #[error("prediction shape {prediction:?} differs from parenchyma shape {parenchyma:?}")]
    ShapeMismatch {
        prediction: Vec<i64>,
        parenchyma: Vec<i64>,
    },
    #[error("infection ratio is not a number")]
    InvalidRatio,
}

/// Ratio cut points between the three severity scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub mild: R64,
    pub critical: R64,
}

// The cut points were tuned on a 352x352 prediction sum over the native
// parenchyma area; here both sides are taken at the parenchyma resolution.
impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            mild: r64(0.01),
            critical: r64(0.5),
        }
    }
}

impl SeverityThresholds {
    pub fn new(mild: f64, critical: f64) -> Result<Self> {
        let thresholds = Self {
            mild: R64::try_new(mild).ok_or_else(|| format_err!("mild threshold is not finite"))?,
            critical: R64::try_new(critical)
                .ok_or_else(|| format_err!("critical threshold is not finite"))?,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.mild.raw() >= 0.0 && self.mild < self.critical,
            "thresholds must satisfy 0 <= mild < critical, but get mild = {} and critical = {}",
            self.mild,
            self.critical
        );
        Ok(())
    }

    /// Buckets are half-open: `[0, mild)`, `[mild, critical)` and `[critical, ∞)`.
    pub fn score_ratio(&self, ratio: f64) -> Result<SeverityScore, SeverityError> {
        if ratio.is_nan() {
            return Err(SeverityError::InvalidRatio);
        }
        let score = if ratio < self.mild.raw() {
            SeverityScore::Regular
        } else if ratio < self.critical.raw() {
            SeverityScore::Severe
        } else {
            SeverityScore::CriticallyIll
        };
        Ok(score)
    }
}

/// Predicted infected area over parenchyma area.
///
/// `prediction` holds per-pixel infection probabilities; `parenchyma` is
/// binarized with `> 0`. Both tensors must have the same shape.
pub fn infection_ratio(prediction: &Tensor, parenchyma: &Tensor) -> Result<f64, SeverityError> {
    if prediction.size() != parenchyma.size() {
        return Err(SeverityError::ShapeMismatch {
            prediction: prediction.size(),
            parenchyma: parenchyma.size(),
        });
    }

    let area = f64::from(&parenchyma.gt(0.0).sum(Kind::Float));
    if area <= 0.0 {
        return Err(SeverityError::EmptyParenchyma);
    }
    let infected = f64::from(&prediction.sum(Kind::Float));
    let ratio = infected / area;
    if !ratio.is_finite() {
        return Err(SeverityError::InvalidRatio);
    }
    Ok(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_labels_test() {
        assert_eq!("Mild".parse::<Severity>().unwrap().score(), SeverityScore::Regular);
        assert_eq!("Control".parse::<Severity>().unwrap().score(), SeverityScore::Regular);
        assert_eq!("Severe".parse::<Severity>().unwrap().score(), SeverityScore::Severe);
        assert_eq!(
            "Critically ill".parse::<Severity>().unwrap().score(),
            SeverityScore::CriticallyIll
        );
        assert!("Unknown".parse::<Severity>().is_err());
        assert_eq!(SeverityScore::CriticallyIll.to_string(), "Critically ill");
        assert_eq!(SeverityScore::Severe.to_index(), 1);
    }

    #[test]
    fn score_ratio_boundaries() -> Result<()> {
        let thresholds = SeverityThresholds::default();
        assert_eq!(thresholds.score_ratio(0.0)?, SeverityScore::Regular);
        assert_eq!(thresholds.score_ratio(0.009)?, SeverityScore::Regular);
        assert_eq!(thresholds.score_ratio(0.01)?, SeverityScore::Severe);
        assert_eq!(thresholds.score_ratio(0.3)?, SeverityScore::Severe);
        assert_eq!(thresholds.score_ratio(0.5)?, SeverityScore::CriticallyIll);
        assert_eq!(thresholds.score_ratio(1.0)?, SeverityScore::CriticallyIll);
        assert_eq!(thresholds.score_ratio(1.7)?, SeverityScore::CriticallyIll);
        assert_eq!(
            thresholds.score_ratio(f64::NAN),
            Err(SeverityError::InvalidRatio)
        );
        Ok(())
    }

    #[test]
    fn thresholds_validation() {
        assert!(SeverityThresholds::new(0.01, 0.5).is_ok());
        assert!(SeverityThresholds::new(0.5, 0.5).is_err());
        assert!(SeverityThresholds::new(-0.1, 0.5).is_err());
        assert!(SeverityThresholds::new(f64::NAN, 0.5).is_err());
    }

    #[test]
    fn infection_ratio_test() {
        let prediction = Tensor::of_slice(&[1f32, 0.5, 0.0, 0.0]).view([2, 2]);
        let parenchyma = Tensor::of_slice(&[255u8, 255, 255, 0]).view([2, 2]);
        let ratio = infection_ratio(&prediction, &parenchyma).unwrap();
        assert_abs_diff_eq!(ratio, 0.5, epsilon = 1e-6);

        let empty = Tensor::zeros(&[2, 2], (Kind::Uint8, Device::Cpu));
        assert_eq!(
            infection_ratio(&prediction, &empty),
            Err(SeverityError::EmptyParenchyma)
        );
        let other = Tensor::ones(&[2, 3], (Kind::Uint8, Device::Cpu));
        assert!(matches!(
            infection_ratio(&prediction, &other),
            Err(SeverityError::ShapeMismatch { .. })
        ));
    }
}

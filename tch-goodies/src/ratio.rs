use crate::common::*;

/// A finite value within the closed interval `[0, 1]`.
///
/// Used for probabilities, smoothing factors and area fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Ratio(R64);

impl Ratio {
    pub fn zero() -> Self {
        Self(r64(0.0))
    }

    pub fn one() -> Self {
        Self(r64(1.0))
    }

    pub fn half() -> Self {
        Self(r64(0.5))
    }

    pub fn to_r64(&self) -> R64 {
        self.0
    }

    pub fn to_f64(&self) -> f64 {
        self.0.raw()
    }

}

impl Default for Ratio {
    fn default() -> Self {
        Self::zero()
    }
}

impl Serialize for Ratio {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Self::try_from(value).map_err(|err| D::Error::custom(format!("{:?}", err)))
    }
}

impl AbsDiffEq<f64> for Ratio {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &f64, epsilon: Self::Epsilon) -> bool {
        self.0.raw().abs_diff_eq(other, epsilon)
    }
}

impl TryFrom<R64> for Ratio {
    type Error = Error;

    fn try_from(value: R64) -> Result<Self, Self::Error> {
        ensure!(
            ((0.0 - f64::default_epsilon())..=(1.0 + f64::default_epsilon()))
                .contains(&value.raw()),
            "ratio value must be within range [0.0, 1.0], but get {}",
            value
        );
        let value = value.max(r64(0.0)).min(r64(1.0));
        Ok(Self(value))
    }
}

impl TryFrom<f64> for Ratio {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_from(R64::try_new(value).ok_or_else(|| format_err!("not a finite value"))?)
    }
}

impl From<Ratio> for f64 {
    fn from(ratio: Ratio) -> Self {
        ratio.0.raw()
    }
}

impl PartialEq<f64> for Ratio {
    fn eq(&self, rhs: &f64) -> bool {
        self.0.raw().eq(rhs)
    }
}

impl Display for Ratio {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.to_f64().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_range_test() {
        assert!(Ratio::try_from(0.3).is_ok());
        assert!(Ratio::try_from(1.5).is_err());
        assert!(Ratio::try_from(-0.1).is_err());
        assert!(Ratio::try_from(f64::NAN).is_err());
        assert_abs_diff_eq!(Ratio::try_from(0.25).unwrap(), 0.25);
    }

    #[test]
    fn ratio_serde_test() {
        let ratio: Ratio = serde_json::from_str("0.5").unwrap();
        assert_eq!(ratio, 0.5);
        assert!(serde_json::from_str::<Ratio>("2.0").is_err());
    }
}

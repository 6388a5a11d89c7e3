use crate::common::*;

pub use input::*;
pub use model::*;

pub static CONFIG_VERSION: Lazy<VersionReq> = Lazy::new(|| VersionReq::parse("0.1.0").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_version")]
    pub version: Version,
    pub model: InferModelConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        Self::from_json5(&text)
    }

    pub fn from_json5(text: &str) -> Result<Self> {
        let config: Self = json5::from_str(text)?;
        match (&config.model.kind, &config.input) {
            (ModelConfig::InfNet { .. }, InputConfig::LungInf { .. }) => (),
            (ModelConfig::UNet { .. }, InputConfig::MultiClass { .. }) => (),
            (ModelConfig::InfNet { .. }, _) => bail!("the InfNet model requires a LungInf input"),
            (ModelConfig::UNet { .. }, _) => bail!("the UNet model requires a MultiClass input"),
        }
        match config.model.kind {
            ModelConfig::InfNet { n_classes, .. } => ensure!(
                n_classes == 1,
                "the InfNet model writes single channel masks, but n_classes is {}",
                n_classes
            ),
            ModelConfig::UNet {
                input_channels,
                n_classes,
                ..
            } => ensure!(
                input_channels == 6 && n_classes == 3,
                "the UNet model requires 6 input channels and 3 classes, but get {} and {}",
                input_channels,
                n_classes
            ),
        }
        Ok(config)
    }
}

mod model {
    use super::*;

    /// Model configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct InferModelConfig {
        pub kind: ModelConfig,
        pub checkpoint: PathBuf,
        /// The device where the model runs on.
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
    }
}

mod input {
    use super::*;

    /// Variants of inputs.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum InputConfig {
        /// CT slices under `image_dir`. Predictions take the size of the
        /// matching mask in `gt_dir` if given, or the slice size otherwise.
        LungInf {
            image_dir: PathBuf,
            #[serde(default)]
            gt_dir: Option<PathBuf>,
            #[serde(default = "default_image_size")]
            image_size: NonZeroUsize,
        },
        /// CT slices under `image_dir` with priors of the same name under `prior_dir`.
        MultiClass {
            image_dir: PathBuf,
            prior_dir: PathBuf,
        },
    }

    fn default_image_size() -> NonZeroUsize {
        NonZeroUsize::new(352).unwrap()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

pub fn deserialize_version<'de, D>(deserializer: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let version = Version::parse(&text).map_err(|err| {
        D::Error::custom(format!(
            "failed to parse version number '{}': {:?}",
            text, err
        ))
    })?;

    if !CONFIG_VERSION.matches(&version) {
        return Err(D::Error::custom(format!(
            "incompatible version: get '{}', but it is incompatible with requirement '{}'",
            version, &*CONFIG_VERSION,
        )));
    }

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_test() -> Result<()> {
        let config = Config::from_json5(include_str!("../config/inf-net.json5"))?;
        assert!(matches!(config.model.kind, ModelConfig::InfNet { .. }));
        match config.input {
            InputConfig::LungInf {
                gt_dir, image_size, ..
            } => {
                assert!(gt_dir.is_some());
                assert_eq!(image_size.get(), 352);
            }
            _ => unreachable!(),
        }

        let config = Config::from_json5(include_str!("../config/multi-class.json5"))?;
        assert_eq!(config.model.kind.n_classes(), 3);
        assert!(matches!(config.input, InputConfig::MultiClass { .. }));
        Ok(())
    }

    #[test]
    fn mismatched_input_test() {
        let text = r#"{
            version: "0.1.0",
            model: { kind: { type: "UNet" }, checkpoint: "unet.ckpt", device: "cpu" },
            input: { type: "LungInf", image_dir: "Imgs" },
            output: { dir: "out" },
        }"#;
        assert!(Config::from_json5(text).is_err());

        let text = text.replace("0.1.0", "2.0.0");
        assert!(Config::from_json5(&text).is_err());
    }

    #[test]
    fn class_count_test() {
        let text = r#"{
            version: "0.1.0",
            model: {
                kind: { type: "InfNet", backbone: "ResNet50", n_classes: 3 },
                checkpoint: "Inf-Net-100.ckpt",
                device: "cpu",
            },
            input: { type: "LungInf", image_dir: "Imgs" },
            output: { dir: "out" },
        }"#;
        assert!(Config::from_json5(text).is_err());
        assert!(Config::from_json5(&text.replace("n_classes: 3", "n_classes: 1")).is_ok());

        let text = r#"{
            version: "0.1.0",
            model: { kind: { type: "UNet", n_classes: 2 }, checkpoint: "unet.ckpt", device: "cpu" },
            input: { type: "MultiClass", image_dir: "Imgs", prior_dir: "Prior" },
            output: { dir: "out" },
        }"#;
        assert!(Config::from_json5(text).is_err());
        assert!(Config::from_json5(&text.replace("n_classes: 2", "n_classes: 3")).is_ok());
    }
}

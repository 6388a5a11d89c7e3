//! Training program configuration format.

use crate::common::*;

pub use dataset::*;
pub use training::*;

pub static CONFIG_VERSION: Lazy<VersionReq> = Lazy::new(|| VersionReq::parse("0.1.0").unwrap());

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_version")]
    pub version: Version,
    pub model: ModelConfig,
    pub dataset: DatasetConfig,
    pub logging: LoggingConfig,
    pub training: TrainingConfig,
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
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match (&self.model, &self.dataset) {
            (ModelConfig::InfNet { n_classes, .. }, DatasetConfig::LungInf { .. }) => {
                ensure!(
                    *n_classes == 1,
                    "the LungInf dataset trains a single-class Inf-Net, but n_classes is {}",
                    n_classes
                );
            }
            (
                ModelConfig::UNet {
                    input_channels,
                    n_classes,
                    ..
                },
                DatasetConfig::MultiClass { .. },
            ) => {
                ensure!(
                    *input_channels == 6 && *n_classes == 3,
                    "the MultiClass dataset requires 6 input channels and 3 classes"
                );
            }
            (ModelConfig::InfNet { .. }, _) => bail!("the InfNet model requires a LungInf dataset"),
            (ModelConfig::UNet { .. }, _) => bail!("the UNet model requires a MultiClass dataset"),
        }

        let TrainingConfig {
            ref size_rates,
            epochs,
            ..
        } = self.training;
        ensure!(epochs > 0, "epochs must be positive");
        ensure!(
            size_rates.iter().all(|rate| rate.raw() > 0.0),
            "size rates must be positive"
        );
        Ok(())
    }
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

mod dataset {
    use super::*;

    /// Variants of dataset and options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum DatasetConfig {
        /// Single-class split with `Imgs/`, `GT/` and `Edge/` under `train_dir`.
        LungInf {
            train_dir: PathBuf,
            test_dir: PathBuf,
            #[serde(default = "default_image_size")]
            train_size: NonZeroUsize,
            #[serde(default = "default_image_size")]
            test_size: NonZeroUsize,
            #[serde(default)]
            augment: Option<FlipAugment>,
        },
        /// Multi-class split with `Imgs/`, `Prior/` and `GT/` directories.
        MultiClass {
            train_dir: PathBuf,
            val_dir: PathBuf,
            /// Overrides `<val_dir>/Prior`.
            #[serde(default)]
            val_prior_dir: Option<PathBuf>,
            #[serde(default)]
            augment: MultiClassAugment,
        },
    }

    fn default_image_size() -> NonZeroUsize {
        NonZeroUsize::new(352).unwrap()
    }
}

mod training {
    use super::*;

    /// The training options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TrainingConfig {
        pub epochs: usize,
        pub batch_size: NonZeroUsize,
        #[serde(default = "default_shuffle")]
        pub shuffle: bool,
        #[serde(default)]
        pub seed: u64,
        pub optimizer: OptimizerConfig,
        /// Learning rate scheduling strategy.
        pub lr_schedule: LearningRateSchedule,
        /// Clamp every gradient element into `[-clip, clip]`.
        pub clip: Option<R64>,
        /// Input scales of multi-scale training.
        #[serde(default = "default_size_rates")]
        pub size_rates: Vec<R64>,
        /// Print progress per this steps.
        #[serde(default = "default_interval")]
        pub log_steps: NonZeroUsize,
        /// Run the test split per this global iterations.
        #[serde(default = "default_interval")]
        pub test_iterations: NonZeroUsize,
        /// Save a checkpoint per this epochs.
        #[serde(default = "default_save_epochs")]
        pub save_epochs: NonZeroUsize,
        /// Checkpoint file loading method.
        pub load_checkpoint: LoadCheckpoint,
        #[serde(with = "tch_serde::serde_device")]
        pub device: Device,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum OptimizerConfig {
        Adam {
            #[serde(default = "default_weight_decay")]
            weight_decay: R64,
        },
        Sgd {
            momentum: R64,
            #[serde(default = "default_weight_decay")]
            weight_decay: R64,
        },
    }

    /// The learning rate scheduling strategy.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LearningRateSchedule {
        /// Use constant learning rate.
        Constant { lr: R64 },
        /// Multiply the learning rate by `decay_rate` per `decay_epochs` epochs.
        StepDecay {
            lr: R64,
            decay_rate: R64,
            decay_epochs: NonZeroUsize,
        },
        /// Use specific learning rate from specified epochs.
        StepWise { steps: Vec<(usize, R64)> },
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Disable checkpoint file loading.
        Disabled,
        /// Load the most recent checkpoint file.
        FromRecent,
        /// Load the checkpoint file at specified path.
        FromFile { file: PathBuf },
    }

    fn default_shuffle() -> bool {
        true
    }

    fn default_size_rates() -> Vec<R64> {
        vec![r64(0.75), r64(1.0), r64(1.25)]
    }

    fn default_interval() -> NonZeroUsize {
        NonZeroUsize::new(20).unwrap()
    }

    fn default_save_epochs() -> NonZeroUsize {
        NonZeroUsize::new(10).unwrap()
    }

    fn default_weight_decay() -> R64 {
        r64(0.0)
    }
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

    const INF_NET_CONFIG: &str = r#"{
        version: "0.1.0",
        model: { type: "InfNet", backbone: "ResNet50" },
        dataset: {
            type: "LungInf",
            train_dir: "Dataset/TrainingSet/LungInfection-Train/Doctor-label",
            test_dir: "Dataset/TestingSet/LungInfection-Test",
        },
        logging: { dir: "logs" },
        training: {
            epochs: 100,
            batch_size: 24,
            optimizer: { type: "Adam" },
            lr_schedule: { type: "StepDecay", lr: 1e-4, decay_rate: 0.1, decay_epochs: 50 },
            clip: 0.5,
            load_checkpoint: { type: "Disabled" },
            device: "cpu",
        },
    }"#;

    #[test]
    fn parse_config_test() -> Result<()> {
        let config = Config::from_json5(INF_NET_CONFIG)?;
        assert_eq!(config.training.size_rates.len(), 3);
        assert_eq!(config.training.save_epochs.get(), 10);
        match config.dataset {
            DatasetConfig::LungInf { train_size, .. } => assert_eq!(train_size.get(), 352),
            _ => panic!("expect a LungInf dataset"),
        }
        Ok(())
    }

    #[test]
    fn sample_config_files_test() -> Result<()> {
        let config = Config::from_json5(include_str!("../config/inf-net.json5"))?;
        assert_eq!(config.training.epochs, 100);

        let config = Config::from_json5(include_str!("../config/multi-class.json5"))?;
        assert_eq!(config.model.n_classes(), 3);
        match config.dataset {
            DatasetConfig::MultiClass { augment, .. } => {
                assert!(augment.flip.is_some());
                assert_eq!(augment.random_cutout, 0.5);
            }
            _ => panic!("expect a MultiClass dataset"),
        }
        Ok(())
    }

    #[test]
    fn reject_incompatible_config_test() {
        let wrong_version = INF_NET_CONFIG.replace("\"0.1.0\"", "\"0.2.0\"");
        assert!(Config::from_json5(&wrong_version).is_err());

        let wrong_model = INF_NET_CONFIG.replace("type: \"InfNet\", backbone: \"ResNet50\"", "type: \"UNet\"");
        assert!(Config::from_json5(&wrong_model).is_err());
    }
}

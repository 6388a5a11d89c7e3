use super::{
    backbone::BackboneKind,
    inf_net::{InfNet, InfNetInit},
    unet::{UNet, UNetInit},
};
use crate::common::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelConfig {
    InfNet {
        #[serde(default)]
        backbone: BackboneKind,
        #[serde(default = "default_channel")]
        channel: usize,
        #[serde(default = "default_inf_net_classes")]
        n_classes: usize,
    },
    UNet {
        #[serde(default = "default_unet_input_channels")]
        input_channels: usize,
        #[serde(default = "default_unet_classes")]
        n_classes: usize,
        #[serde(default = "default_base_channels")]
        base_channels: usize,
    },
}

impl ModelConfig {
    pub fn n_classes(&self) -> usize {
        match *self {
            Self::InfNet { n_classes, .. } => n_classes,
            Self::UNet { n_classes, .. } => n_classes,
        }
    }

    pub fn build<'p>(&self, path: impl Borrow<nn::Path<'p>>) -> Result<Model> {
        let model = match *self {
            Self::InfNet {
                backbone,
                channel,
                n_classes,
            } => Model::InfNet(
                InfNetInit {
                    backbone,
                    channel,
                    n_classes,
                }
                .build(path)?,
            ),
            Self::UNet {
                input_channels,
                n_classes,
                base_channels,
            } => Model::UNet(
                UNetInit {
                    input_channels,
                    n_classes,
                    base_channels,
                }
                .build(path)?,
            ),
        };
        Ok(model)
    }
}

#[derive(Debug)]
pub enum Model {
    InfNet(InfNet),
    UNet(UNet),
}

fn default_channel() -> usize {
    32
}

fn default_inf_net_classes() -> usize {
    1
}

fn default_unet_input_channels() -> usize {
    6
}

fn default_unet_classes() -> usize {
    3
}

fn default_base_channels() -> usize {
    64
}

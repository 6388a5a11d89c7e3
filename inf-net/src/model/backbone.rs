//! Feature extractors producing four feature levels at strides 4, 8, 16 and 32.

use crate::common::*;

const EXPANSION: usize = 4;
const LAYER_PLANES: [usize; 4] = [64, 128, 256, 512];
const RES50_BLOCKS: [usize; 4] = [3, 4, 6, 3];
const RES2NET_BASE_WIDTH: usize = 26;
const RES2NET_SCALE: usize = 4;
const VGG16_BLOCKS: [(usize, usize); 5] = [(64, 2), (128, 2), (256, 3), (512, 3), (512, 3)];

/// Backbone choices, ResNet-50 by default.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    StrumDisplay,
)]
pub enum BackboneKind {
    #[serde(rename = "Res2Net50")]
    #[strum(serialize = "Res2Net50")]
    Res2Net50,
    #[serde(rename = "ResNet50")]
    #[strum(serialize = "ResNet50")]
    ResNet50,
    #[serde(rename = "VGGNet16")]
    #[strum(serialize = "VGGNet16")]
    VggNet16,
}

impl Default for BackboneKind {
    fn default() -> Self {
        Self::ResNet50
    }
}

impl BackboneKind {
    /// Channel counts of the `x1`, `x2`, `x3` and `x4` feature maps.
    pub fn channels(&self) -> [usize; 4] {
        match self {
            Self::Res2Net50 | Self::ResNet50 => [256, 512, 1024, 2048],
            Self::VggNet16 => [128, 256, 512, 512],
        }
    }
}

#[derive(Debug, TensorLike)]
pub struct BackboneFeatures {
    /// Stride 4 features, used by the edge branch.
    pub x1: Tensor,
    pub x2: Tensor,
    pub x3: Tensor,
    pub x4: Tensor,
}

#[derive(Debug)]
pub enum Backbone {
    ResNet(ResNet),
    Res2Net(Res2Net),
    Vgg(Vgg16),
}

impl Backbone {
    pub fn new<'p>(path: impl Borrow<nn::Path<'p>>, kind: BackboneKind) -> Result<Self> {
        let path = path.borrow();
        let backbone = match kind {
            BackboneKind::ResNet50 => Self::ResNet(ResNet::new(path)?),
            BackboneKind::Res2Net50 => Self::Res2Net(Res2Net::new(path)?),
            BackboneKind::VggNet16 => Self::Vgg(Vgg16::new(path)?),
        };
        Ok(backbone)
    }

    pub fn kind(&self) -> BackboneKind {
        match self {
            Self::ResNet(_) => BackboneKind::ResNet50,
            Self::Res2Net(_) => BackboneKind::Res2Net50,
            Self::Vgg(_) => BackboneKind::VggNet16,
        }
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<BackboneFeatures> {
        match *xs.size().as_slice() {
            [_b, 3, h, w] => ensure!(
                h >= 32 && w >= 32,
                "input must be at least 32x32, but get {}x{}",
                h,
                w
            ),
            _ => bail!(
                "expect a [batch, 3, height, width] input, but get {:?}",
                xs.size()
            ),
        }

        let features = match self {
            Self::ResNet(model) => model.forward_t(xs, train),
            Self::Res2Net(model) => model.forward_t(xs, train),
            Self::Vgg(model) => model.forward_t(xs, train),
        };
        Ok(features)
    }
}

fn run_layer<B>(blocks: &[B], xs: &Tensor, train: bool) -> Tensor
where
    B: nn::ModuleT,
{
    blocks
        .iter()
        .fold(xs.shallow_clone(), |xs, block| xs.apply_t(block, train))
}

pub use resnet::*;
mod resnet {
    use super::*;

    #[derive(Debug)]
    pub struct Bottleneck {
        conv1: ConvBn2D,
        conv2: ConvBn2D,
        conv3: ConvBn2D,
        downsample: Option<ConvBn2D>,
    }

    impl Bottleneck {
        fn new(path: &nn::Path, in_c: usize, planes: usize, stride: usize) -> Result<Self> {
            let out_c = planes * EXPANSION;
            let conv1 = ConvBn2DInit {
                relu: true,
                ..ConvBn2DInit::new(in_c, planes, 1)
            }
            .build(path / "conv1")?;
            let conv2 = ConvBn2DInit {
                s: stride,
                relu: true,
                ..ConvBn2DInit::new(planes, planes, 3)
            }
            .build(path / "conv2")?;
            let conv3 = ConvBn2DInit::new(planes, out_c, 1).build(path / "conv3")?;
            let downsample = (stride != 1 || in_c != out_c)
                .then(|| {
                    ConvBn2DInit {
                        s: stride,
                        ..ConvBn2DInit::new(in_c, out_c, 1)
                    }
                    .build(path / "downsample")
                })
                .transpose()?;

            Ok(Self {
                conv1,
                conv2,
                conv3,
                downsample,
            })
        }
    }

    impl nn::ModuleT for Bottleneck {
        fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
            let residual = match &self.downsample {
                Some(downsample) => xs.apply_t(downsample, train),
                None => xs.shallow_clone(),
            };
            let out = xs
                .apply_t(&self.conv1, train)
                .apply_t(&self.conv2, train)
                .apply_t(&self.conv3, train);
            (out + residual).relu()
        }
    }

    /// ResNet-50.
    #[derive(Debug)]
    pub struct ResNet {
        stem: ConvBn2D,
        layers: Vec<Vec<Bottleneck>>,
    }

    impl ResNet {
        pub fn new(path: &nn::Path) -> Result<Self> {
            let stem = ConvBn2DInit {
                s: 2,
                relu: true,
                ..ConvBn2DInit::new(3, 64, 7)
            }
            .build(path / "stem")?;

            let mut in_c = 64;
            let layers: Vec<_> = izip!(LAYER_PLANES, RES50_BLOCKS)
                .enumerate()
                .map(|(index, (planes, n_blocks))| -> Result<_> {
                    let path = path / format!("layer{}", index + 1);
                    let stride = if index == 0 { 1 } else { 2 };
                    let blocks: Vec<_> = (0..n_blocks)
                        .map(|block_index| {
                            let stride = if block_index == 0 { stride } else { 1 };
                            let block = Bottleneck::new(
                                &(&path / block_index.to_string()),
                                in_c,
                                planes,
                                stride,
                            );
                            in_c = planes * EXPANSION;
                            block
                        })
                        .try_collect()?;
                    Ok(blocks)
                })
                .try_collect()?;

            Ok(Self { stem, layers })
        }

        pub fn forward_t(&self, xs: &Tensor, train: bool) -> BackboneFeatures {
            let xs = xs
                .apply_t(&self.stem, train)
                .max_pool2d(&[3, 3], &[2, 2], &[1, 1], &[1, 1], false);
            let x1 = run_layer(&self.layers[0], &xs, train);
            let x2 = run_layer(&self.layers[1], &x1, train);
            let x3 = run_layer(&self.layers[2], &x2, train);
            let x4 = run_layer(&self.layers[3], &x3, train);
            BackboneFeatures { x1, x2, x3, x4 }
        }
    }
}

pub use res2net::*;
mod res2net {
    use super::*;

    /// Shortcut with average pooling before the 1x1 projection.
    #[derive(Debug)]
    struct Downsample {
        stride: i64,
        conv: ConvBn2D,
    }

    impl nn::ModuleT for Downsample {
        fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
            let stride = self.stride;
            let xs = if stride > 1 {
                xs.avg_pool2d(
                    &[stride, stride],
                    &[stride, stride],
                    &[0, 0],
                    true,
                    false,
                    None::<i64>,
                )
            } else {
                xs.shallow_clone()
            };
            xs.apply_t(&self.conv, train)
        }
    }

    /// Res2Net bottleneck with hierarchical residual connections over `scale` splits.
    #[derive(Debug)]
    pub struct Bottle2neck {
        conv1: ConvBn2D,
        convs: Vec<ConvBn2D>,
        conv3: ConvBn2D,
        downsample: Option<Downsample>,
        width: i64,
        stride: i64,
        is_stage: bool,
    }

    impl Bottle2neck {
        fn new(
            path: &nn::Path,
            in_c: usize,
            planes: usize,
            stride: usize,
            is_stage: bool,
        ) -> Result<Self> {
            let width = planes * RES2NET_BASE_WIDTH / 64;
            let out_c = planes * EXPANSION;

            let conv1 = ConvBn2DInit {
                relu: true,
                ..ConvBn2DInit::new(in_c, width * RES2NET_SCALE, 1)
            }
            .build(path / "conv1")?;
            let convs: Vec<_> = (0..(RES2NET_SCALE - 1))
                .map(|index| {
                    ConvBn2DInit {
                        s: stride,
                        relu: true,
                        ..ConvBn2DInit::new(width, width, 3)
                    }
                    .build(path / format!("convs_{}", index))
                })
                .try_collect()?;
            let conv3 = ConvBn2DInit::new(width * RES2NET_SCALE, out_c, 1).build(path / "conv3")?;
            let downsample = (stride != 1 || in_c != out_c)
                .then(|| -> Result<_> {
                    Ok(Downsample {
                        stride: stride as i64,
                        conv: ConvBn2DInit::new(in_c, out_c, 1).build(path / "downsample")?,
                    })
                })
                .transpose()?;

            Ok(Self {
                conv1,
                convs,
                conv3,
                downsample,
                width: width as i64,
                stride: stride as i64,
                is_stage,
            })
        }
    }

    impl nn::ModuleT for Bottle2neck {
        fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
            let Self {
                ref conv1,
                ref convs,
                ref conv3,
                ref downsample,
                width,
                stride,
                is_stage,
            } = *self;

            let residual = match downsample {
                Some(downsample) => xs.apply_t(downsample, train),
                None => xs.shallow_clone(),
            };

            let splits = xs.apply_t(conv1, train).split(width, 1);
            let mut outputs: Vec<Tensor> = Vec::with_capacity(splits.len());

            for (split, conv) in splits.iter().zip(convs) {
                let input = match outputs.last() {
                    Some(prev) if !is_stage => prev + split,
                    _ => split.shallow_clone(),
                };
                outputs.push(input.apply_t(conv, train));
            }

            let last = &splits[convs.len()];
            let last = if is_stage {
                last.avg_pool2d(&[3, 3], &[stride, stride], &[1, 1], false, true, None::<i64>)
            } else {
                last.shallow_clone()
            };
            outputs.push(last);

            let out = Tensor::cat(&outputs, 1).apply_t(conv3, train);
            (out + residual).relu()
        }
    }

    /// Res2Net-50 v1b (26w x 4s) with a deep stem.
    #[derive(Debug)]
    pub struct Res2Net {
        stem: Vec<ConvBn2D>,
        layers: Vec<Vec<Bottle2neck>>,
    }

    impl Res2Net {
        pub fn new(path: &nn::Path) -> Result<Self> {
            let stem = {
                let path = path / "stem";
                vec![
                    ConvBn2DInit {
                        s: 2,
                        relu: true,
                        ..ConvBn2DInit::new(3, 32, 3)
                    }
                    .build(&path / "0")?,
                    ConvBn2DInit {
                        relu: true,
                        ..ConvBn2DInit::new(32, 32, 3)
                    }
                    .build(&path / "1")?,
                    ConvBn2DInit {
                        relu: true,
                        ..ConvBn2DInit::new(32, 64, 3)
                    }
                    .build(&path / "2")?,
                ]
            };

            let mut in_c = 64;
            let layers: Vec<_> = izip!(LAYER_PLANES, RES50_BLOCKS)
                .enumerate()
                .map(|(index, (planes, n_blocks))| -> Result<_> {
                    let path = path / format!("layer{}", index + 1);
                    let stride = if index == 0 { 1 } else { 2 };
                    let blocks: Vec<_> = (0..n_blocks)
                        .map(|block_index| {
                            let is_stage = block_index == 0;
                            let stride = if is_stage { stride } else { 1 };
                            let block = Bottle2neck::new(
                                &(&path / block_index.to_string()),
                                in_c,
                                planes,
                                stride,
                                is_stage,
                            );
                            in_c = planes * EXPANSION;
                            block
                        })
                        .try_collect()?;
                    Ok(blocks)
                })
                .try_collect()?;

            Ok(Self { stem, layers })
        }

        pub fn forward_t(&self, xs: &Tensor, train: bool) -> BackboneFeatures {
            let xs = run_layer(&self.stem, xs, train).max_pool2d(
                &[3, 3],
                &[2, 2],
                &[1, 1],
                &[1, 1],
                false,
            );
            let x1 = run_layer(&self.layers[0], &xs, train);
            let x2 = run_layer(&self.layers[1], &x1, train);
            let x3 = run_layer(&self.layers[2], &x2, train);
            let x4 = run_layer(&self.layers[3], &x3, train);
            BackboneFeatures { x1, x2, x3, x4 }
        }
    }
}

pub use vgg::*;
mod vgg {
    use super::*;

    /// VGG-16 convolution stack; features are taken after the pooling of blocks 2 to 5.
    #[derive(Debug)]
    pub struct Vgg16 {
        blocks: Vec<Vec<ConvBn2D>>,
    }

    impl Vgg16 {
        pub fn new(path: &nn::Path) -> Result<Self> {
            let mut in_c = 3;
            let blocks: Vec<_> = VGG16_BLOCKS
                .iter()
                .enumerate()
                .map(|(index, &(out_c, n_convs))| -> Result<_> {
                    let path = path / format!("conv{}", index + 1);
                    let convs: Vec<_> = (0..n_convs)
                        .map(|conv_index| {
                            let conv = ConvBn2DInit {
                                bias: true,
                                relu: true,
                                batch_norm: false,
                                ..ConvBn2DInit::new(in_c, out_c, 3)
                            }
                            .build(&path / conv_index.to_string());
                            in_c = out_c;
                            conv
                        })
                        .try_collect()?;
                    Ok(convs)
                })
                .try_collect()?;

            Ok(Self { blocks })
        }

        pub fn forward_t(&self, xs: &Tensor, train: bool) -> BackboneFeatures {
            let stage = |index: usize, xs: &Tensor| {
                run_layer(&self.blocks[index], xs, train).max_pool2d(
                    &[2, 2],
                    &[2, 2],
                    &[0, 0],
                    &[1, 1],
                    true,
                )
            };

            let x0 = stage(0, xs);
            let x1 = stage(1, &x0);
            let x2 = stage(2, &x1);
            let x3 = stage(3, &x2);
            let x4 = stage(4, &x3);
            BackboneFeatures { x1, x2, x3, x4 }
        }
    }
}

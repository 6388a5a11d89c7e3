use crate::common::*;

#[derive(Debug, Clone)]
pub struct UNetInit {
    pub input_channels: usize,
    pub n_classes: usize,
    pub base_channels: usize,
}

impl Default for UNetInit {
    fn default() -> Self {
        Self {
            input_channels: 6,
            n_classes: 3,
            base_channels: 64,
        }
    }
}

impl UNetInit {
    pub fn build<'p>(self, path: impl Borrow<nn::Path<'p>>) -> Result<UNet> {
        let path = path.borrow();
        let Self {
            input_channels,
            n_classes,
            base_channels: c,
        } = self;

        ensure!(input_channels > 0, "input_channels must be positive");
        ensure!(n_classes > 0, "n_classes must be positive");
        ensure!(
            c > 0 && c % 2 == 0,
            "base_channels must be a positive even number"
        );

        let inc = DoubleConv::new(path / "inc", input_channels, c, c)?;
        let downs = vec![
            DoubleConv::new(path / "down1", c, c * 2, c * 2)?,
            DoubleConv::new(path / "down2", c * 2, c * 4, c * 4)?,
            DoubleConv::new(path / "down3", c * 4, c * 8, c * 8)?,
            DoubleConv::new(path / "down4", c * 8, c * 8, c * 8)?,
        ];
        let ups = vec![
            DoubleConv::new(path / "up1", c * 16, c * 4, c * 8)?,
            DoubleConv::new(path / "up2", c * 8, c * 2, c * 4)?,
            DoubleConv::new(path / "up3", c * 4, c, c * 2)?,
            DoubleConv::new(path / "up4", c * 2, c, c)?,
        ];
        let outc = ConvBn2DInit {
            bias: true,
            batch_norm: false,
            ..ConvBn2DInit::new(c, n_classes, 1)
        }
        .build(path / "outc")?;

        Ok(UNet {
            inc,
            downs,
            ups,
            outc,
            input_channels,
            n_classes,
        })
    }
}

/// Two `3 × 3` conv + BN + ReLU layers.
#[derive(Debug)]
struct DoubleConv {
    conv1: ConvBn2D,
    conv2: ConvBn2D,
}

impl DoubleConv {
    fn new<'p>(
        path: impl Borrow<nn::Path<'p>>,
        in_c: usize,
        out_c: usize,
        mid_c: usize,
    ) -> Result<Self> {
        let path = path.borrow();
        let conv = |in_c, out_c, name: &str| {
            ConvBn2DInit {
                relu: true,
                ..ConvBn2DInit::new(in_c, out_c, 3)
            }
            .build(path / name)
        };
        Ok(Self {
            conv1: conv(in_c, mid_c, "conv1")?,
            conv2: conv(mid_c, out_c, "conv2")?,
        })
    }
}

impl nn::ModuleT for DoubleConv {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        xs.apply_t(&self.conv1, train).apply_t(&self.conv2, train)
    }
}

/// U-Net with bilinear upsampling for multi-class segmentation.
#[derive(Debug)]
pub struct UNet {
    inc: DoubleConv,
    downs: Vec<DoubleConv>,
    ups: Vec<DoubleConv>,
    outc: ConvBn2D,
    input_channels: usize,
    n_classes: usize,
}

impl UNet {
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Returns per-class logits at the input resolution.
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Result<Tensor> {
        match *input.size().as_slice() {
            [_b, c, h, w] => {
                ensure!(
                    c == self.input_channels as i64,
                    "expect {} input channels, but get {}",
                    self.input_channels,
                    c
                );
                ensure!(
                    h >= 16 && w >= 16,
                    "input must be at least 16x16, but get {}x{}",
                    h,
                    w
                );
            }
            _ => bail!(
                "expect a [batch, channels, height, width] input, but get {:?}",
                input.size()
            ),
        }

        let mut skips = vec![input.apply_t(&self.inc, train)];
        for down in &self.downs {
            let xs = skips
                .last()
                .ok_or_else(|| format_err!("missing skip connection"))?
                .max_pool2d(&[2, 2], &[2, 2], &[0, 0], &[1, 1], false)
                .apply_t(down, train);
            skips.push(xs);
        }

        let mut xs = skips
            .pop()
            .ok_or_else(|| format_err!("missing bottleneck features"))?;
        for (up, skip) in self.ups.iter().zip(skips.iter().rev()) {
            let (h, w) = skip.size_hw()?;
            let upsampled = xs.resize2d_bilinear(h, w, true)?;
            xs = Tensor::cat(&[skip.shallow_clone(), upsampled], 1).apply_t(up, train);
        }

        Ok(xs.apply_t(&self.outc, train))
    }
}

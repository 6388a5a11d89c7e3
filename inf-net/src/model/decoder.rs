use crate::common::*;

/// Partial decoder aggregating the three deepest RFB outputs into a
/// global location map at the resolution of the shallowest one.
#[derive(Debug)]
pub struct PartialDecoder {
    conv_upsample1: ConvBn2D,
    conv_upsample2: ConvBn2D,
    conv_upsample3: ConvBn2D,
    conv_upsample4: ConvBn2D,
    conv_upsample5: ConvBn2D,
    conv_concat2: ConvBn2D,
    conv_concat3: ConvBn2D,
    conv4: ConvBn2D,
    conv5: ConvBn2D,
}

impl PartialDecoder {
    pub fn new<'p>(
        path: impl Borrow<nn::Path<'p>>,
        channel: usize,
        n_classes: usize,
    ) -> Result<Self> {
        let path = path.borrow();
        let conv3x3 = |in_c: usize, out_c: usize, name: &str| {
            ConvBn2DInit::new(in_c, out_c, 3).build(path / name)
        };

        Ok(Self {
            conv_upsample1: conv3x3(channel, channel, "conv_upsample1")?,
            conv_upsample2: conv3x3(channel, channel, "conv_upsample2")?,
            conv_upsample3: conv3x3(channel, channel, "conv_upsample3")?,
            conv_upsample4: conv3x3(channel, channel, "conv_upsample4")?,
            conv_upsample5: conv3x3(channel * 2, channel * 2, "conv_upsample5")?,
            conv_concat2: conv3x3(channel * 2, channel * 2, "conv_concat2")?,
            conv_concat3: conv3x3(channel * 3, channel * 3, "conv_concat3")?,
            conv4: conv3x3(channel * 3, channel * 3, "conv4")?,
            conv5: ConvBn2DInit {
                bias: true,
                batch_norm: false,
                ..ConvBn2DInit::new(channel * 3, n_classes, 1)
            }
            .build(path / "conv5")?,
        })
    }

    /// Aggregate features ordered from deepest (`x4`) to shallowest (`x2`).
    pub fn forward_t(&self, x4: &Tensor, x3: &Tensor, x2: &Tensor, train: bool) -> Result<Tensor> {
        let (h3, w3) = x3.size_hw()?;
        let (h2, w2) = x2.size_hw()?;
        let up3 = |xs: &Tensor| xs.resize2d_bilinear(h3, w3, true);
        let up2 = |xs: &Tensor| xs.resize2d_bilinear(h2, w2, true);

        let x4_up3 = up3(x4)?;
        let x4_up2 = up2(&x4_up3)?;

        let x3_1 = x4_up3.apply_t(&self.conv_upsample1, train) * x3;
        let x2_1 = x4_up2.apply_t(&self.conv_upsample2, train)
            * up2(x3)?.apply_t(&self.conv_upsample3, train)
            * x2;

        let x3_2 = Tensor::cat(&[x3_1, x4_up3.apply_t(&self.conv_upsample4, train)], 1)
            .apply_t(&self.conv_concat2, train);
        let x2_2 = Tensor::cat(&[x2_1, up2(&x3_2)?.apply_t(&self.conv_upsample5, train)], 1)
            .apply_t(&self.conv_concat3, train);

        Ok(x2_2
            .apply_t(&self.conv4, train)
            .apply_t(&self.conv5, train))
    }
}

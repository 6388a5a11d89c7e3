use crate::common::*;

#[derive(Debug, Clone)]
pub struct ReverseAttentionInit {
    pub in_c: usize,
    pub mid_c: usize,
    pub edge_c: usize,
    pub n_classes: usize,
    pub ksize: usize,
    pub n_convs: usize,
    pub out_ksize: usize,
}

impl ReverseAttentionInit {
    pub fn build<'p>(self, path: impl Borrow<nn::Path<'p>>) -> Result<ReverseAttention> {
        let path = path.borrow();
        let Self {
            in_c,
            mid_c,
            edge_c,
            n_classes,
            ksize,
            n_convs,
            out_ksize,
        } = self;
        ensure!(n_convs >= 1, "n_convs must be at least 1");

        let reduce = ConvBn2DInit::new(in_c, mid_c, 1).build(path / "conv1")?;
        let convs: Vec<_> = (0..n_convs)
            .map(|index| {
                let in_c = if index == 0 { mid_c + edge_c } else { mid_c };
                ConvBn2DInit {
                    relu: true,
                    ..ConvBn2DInit::new(in_c, mid_c, ksize)
                }
                .build(path / format!("conv{}", index + 2))
            })
            .try_collect()?;
        let output = ConvBn2DInit::new(mid_c, n_classes, out_ksize)
            .build(path / format!("conv{}", n_convs + 2))?;

        Ok(ReverseAttention {
            reduce,
            convs,
            output,
        })
    }
}

/// Refines a coarse prediction by attending to the regions it did not cover.
#[derive(Debug)]
pub struct ReverseAttention {
    reduce: ConvBn2D,
    convs: Vec<ConvBn2D>,
    output: ConvBn2D,
}

impl ReverseAttention {
    /// Computes `crop + residual` where the residual is predicted from the
    /// feature weighted by `1 - sigmoid(crop)` and the edge guidance.
    pub fn forward_t(
        &self,
        feature: &Tensor,
        crop: &Tensor,
        edge_guidance: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let (height, width) = feature.size_hw()?;
        ensure!(
            crop.size_hw()? == (height, width),
            "the coarse map must match the feature resolution"
        );

        let attention = (crop.sigmoid().neg() + 1.0).mean_dim(&[1], true, Kind::Float);
        let xs = (feature * attention).apply_t(&self.reduce, train);
        let edge = edge_guidance.resize2d_bilinear(height, width, false)?;
        let xs = self
            .convs
            .iter()
            .fold(Tensor::cat(&[xs, edge], 1), |xs, conv| xs.apply_t(conv, train));
        let residual = xs.apply_t(&self.output, train);
        Ok(residual + crop)
    }
}

use super::{
    backbone::{Backbone, BackboneFeatures, BackboneKind},
    decoder::PartialDecoder,
    reverse_attention::{ReverseAttention, ReverseAttentionInit},
    rfb::Rfb,
};
use crate::common::*;

pub const EDGE_CHANNELS: usize = 64;

#[derive(Debug, Clone)]
pub struct InfNetInit {
    pub backbone: BackboneKind,
    pub channel: usize,
    pub n_classes: usize,
}

impl Default for InfNetInit {
    fn default() -> Self {
        Self {
            backbone: BackboneKind::ResNet50,
            channel: 32,
            n_classes: 1,
        }
    }
}

impl InfNetInit {
    pub fn build<'p>(self, path: impl Borrow<nn::Path<'p>>) -> Result<InfNet> {
        let path = path.borrow();
        let Self {
            backbone: backbone_kind,
            channel,
            n_classes,
        } = self;

        ensure!(channel > 0, "channel must be positive");
        ensure!(n_classes > 0, "n_classes must be positive");

        let [c1, c2, c3, c4] = backbone_kind.channels();
        let backbone = Backbone::new(path / "backbone", backbone_kind)?;

        let rfb2 = Rfb::new(path / "rfb2_1", c2, channel)?;
        let rfb3 = Rfb::new(path / "rfb3_1", c3, channel)?;
        let rfb4 = Rfb::new(path / "rfb4_1", c4, channel)?;
        let decoder = PartialDecoder::new(path / "par_dec", channel, n_classes)?;

        let ra4 = ReverseAttentionInit {
            in_c: c4,
            mid_c: 256,
            edge_c: EDGE_CHANNELS,
            n_classes,
            ksize: 5,
            n_convs: 3,
            out_ksize: 1,
        }
        .build(path / "ra4")?;
        let ra3 = ReverseAttentionInit {
            in_c: c3,
            mid_c: 64,
            edge_c: EDGE_CHANNELS,
            n_classes,
            ksize: 3,
            n_convs: 2,
            out_ksize: 3,
        }
        .build(path / "ra3")?;
        let ra2 = ReverseAttentionInit {
            in_c: c2,
            mid_c: 64,
            edge_c: EDGE_CHANNELS,
            n_classes,
            ksize: 3,
            n_convs: 2,
            out_ksize: 3,
        }
        .build(path / "ra2")?;

        let edge_convs = vec![
            ConvBn2DInit::new(c1, EDGE_CHANNELS, 1).build(path / "edge_conv1")?,
            ConvBn2DInit::new(EDGE_CHANNELS, EDGE_CHANNELS, 3).build(path / "edge_conv2")?,
            ConvBn2DInit::new(EDGE_CHANNELS, EDGE_CHANNELS, 3).build(path / "edge_conv3")?,
        ];
        let edge_output = ConvBn2DInit::new(EDGE_CHANNELS, 1, 3).build(path / "edge_conv4")?;

        Ok(InfNet {
            backbone,
            rfb2,
            rfb3,
            rfb4,
            decoder,
            ra4,
            ra3,
            ra2,
            edge_convs,
            edge_output,
            n_classes,
        })
    }
}

#[derive(Debug)]
pub struct InfNet {
    backbone: Backbone,
    rfb2: Rfb,
    rfb3: Rfb,
    rfb4: Rfb,
    decoder: PartialDecoder,
    ra4: ReverseAttention,
    ra3: ReverseAttention,
    ra2: ReverseAttention,
    edge_convs: Vec<ConvBn2D>,
    edge_output: ConvBn2D,
    n_classes: usize,
}

impl InfNet {
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn backbone_kind(&self) -> BackboneKind {
        self.backbone.kind()
    }

    pub fn forward_t(&self, input: &Tensor, train: bool) -> Result<InfNetOutput> {
        let (height, width) = input.size_hw()?;
        let BackboneFeatures { x1, x2, x3, x4 } = self.backbone.forward_t(input, train)?;

        let x2_rfb = x2.apply_t(&self.rfb2, train);
        let x3_rfb = x3.apply_t(&self.rfb3, train);
        let x4_rfb = x4.apply_t(&self.rfb4, train);

        let edge_guidance = self
            .edge_convs
            .iter()
            .fold(x1, |xs, conv| xs.apply_t(conv, train));
        let lateral_edge = edge_guidance
            .apply_t(&self.edge_output, train)
            .resize2d_bilinear(height, width, false)?;

        let ra5_feat = self.decoder.forward_t(&x4_rfb, &x3_rfb, &x2_rfb, train)?;
        let lateral_map_5 = ra5_feat.resize2d_bilinear(height, width, false)?;

        let refine = |head: &ReverseAttention, feature: &Tensor, coarse: &Tensor| -> Result<_> {
            let (h, w) = feature.size_hw()?;
            let crop = coarse.resize2d_bilinear(h, w, false)?;
            head.forward_t(feature, &crop, &edge_guidance, train)
        };

        let ra4_feat = refine(&self.ra4, &x4, &ra5_feat)?;
        let lateral_map_4 = ra4_feat.resize2d_bilinear(height, width, false)?;
        let ra3_feat = refine(&self.ra3, &x3, &ra4_feat)?;
        let lateral_map_3 = ra3_feat.resize2d_bilinear(height, width, false)?;
        let ra2_feat = refine(&self.ra2, &x2, &ra3_feat)?;
        let lateral_map_2 = ra2_feat.resize2d_bilinear(height, width, false)?;

        Ok(InfNetOutput {
            lateral_map_5,
            lateral_map_4,
            lateral_map_3,
            lateral_map_2,
            lateral_edge,
        })
    }
}

/// Logits of every prediction head, resized to the input resolution.
#[derive(Debug, TensorLike)]
pub struct InfNetOutput {
    pub lateral_map_5: Tensor,
    pub lateral_map_4: Tensor,
    pub lateral_map_3: Tensor,
    pub lateral_map_2: Tensor,
    pub lateral_edge: Tensor,
}

impl InfNetOutput {
    /// The segmentation maps from the deepest to the finest head.
    pub fn lateral_maps(&self) -> [&Tensor; 4] {
        [
            &self.lateral_map_5,
            &self.lateral_map_4,
            &self.lateral_map_3,
            &self.lateral_map_2,
        ]
    }

    /// Resize every head to `height × width`.
    pub fn resized(&self, height: i64, width: i64) -> Result<Self> {
        let resize = |tensor: &Tensor| tensor.resize2d_bilinear(height, width, false);
        Ok(Self {
            lateral_map_5: resize(&self.lateral_map_5)?,
            lateral_map_4: resize(&self.lateral_map_4)?,
            lateral_map_3: resize(&self.lateral_map_3)?,
            lateral_map_2: resize(&self.lateral_map_2)?,
            lateral_edge: resize(&self.lateral_edge)?,
        })
    }

    /// The finest map resized to `height × width`, passed through sigmoid
    /// and min-max normalized per image. The output has shape `[B, C, H, W]`.
    pub fn probability_map(&self, height: i64, width: i64) -> Result<Tensor> {
        let maps = self
            .lateral_map_2
            .resize2d_bilinear(height, width, false)?
            .sigmoid();
        let normalized: Vec<_> = (0..maps.size()[0])
            .map(|index| maps.i(index).min_max_normalize())
            .collect();
        Ok(Tensor::f_stack(&normalized, 0)?)
    }
}

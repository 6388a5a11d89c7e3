use crate::{
    common::*,
    conv_nd::{Conv2DInit, ConvND},
};

#[derive(Debug, Clone)]
pub struct ConvBn2DInit {
    pub in_c: usize,
    pub out_c: usize,
    pub k: [usize; 2],
    pub s: usize,
    pub p: [usize; 2],
    pub d: usize,
    pub bias: bool,
    pub relu: bool,
    pub batch_norm: bool,
}

impl ConvBn2DInit {
    pub fn new(in_c: usize, out_c: usize, k: usize) -> Self {
        Self {
            in_c,
            out_c,
            k: [k, k],
            s: 1,
            p: [k / 2, k / 2],
            d: 1,
            bias: false,
            relu: false,
            batch_norm: true,
        }
    }

    /// A square kernel with `padding = dilation` so the spatial size is kept.
    pub fn dilated(in_c: usize, out_c: usize, dilation: usize) -> Self {
        Self {
            p: [dilation, dilation],
            d: dilation,
            ..Self::new(in_c, out_c, 3)
        }
    }

    /// An asymmetric `kh × kw` kernel padded to keep the spatial size.
    pub fn asymmetric(in_c: usize, out_c: usize, kh: usize, kw: usize) -> Self {
        Self {
            k: [kh, kw],
            p: [kh / 2, kw / 2],
            ..Self::new(in_c, out_c, 1)
        }
    }

    pub fn build<'p, P>(self, path: P) -> Result<ConvBn2D>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();

        let Self {
            in_c,
            out_c,
            k,
            s,
            p,
            d,
            bias,
            relu,
            batch_norm,
        } = self;

        let conv = Conv2DInit {
            ksize: k,
            stride: [s, s],
            padding: p,
            dilation: [d, d],
            bias,
            ..Conv2DInit::new(1)
        }
        .build(path / "conv", in_c, out_c)?;
        let bn = batch_norm.then(|| {
            nn::batch_norm2d(path / "bn", out_c as i64, Default::default())
        });

        Ok(ConvBn2D { conv, bn, relu })
    }
}

/// Convolution followed by batch normalization and an optional ReLU.
#[derive(Debug)]
pub struct ConvBn2D {
    conv: ConvND,
    bn: Option<nn::BatchNorm>,
    relu: bool,
}

impl nn::ModuleT for ConvBn2D {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let Self {
            ref conv,
            ref bn,
            relu,
        } = *self;

        let xs = conv.forward(xs);
        let xs = match bn {
            Some(bn) => xs.apply_t(bn, train),
            None => xs,
        };

        if relu {
            xs.relu()
        } else {
            xs
        }
    }
}

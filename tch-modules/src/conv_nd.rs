use crate::common::*;

pub use conv_init::*;
pub use conv_nd_::*;

mod conv_init {
    use super::*;

    /// Convolution with per-dimension kernel size, stride, padding and dilation.
    ///
    /// Unlike `nn::conv2d`, the kernel may be asymmetric, e.g. `[1, 3]`.
    #[derive(Debug, Clone)]
    pub struct ConvNDInit<const DIM: usize> {
        pub ksize: [usize; DIM],
        pub stride: [usize; DIM],
        pub padding: [usize; DIM],
        pub dilation: [usize; DIM],
        pub groups: usize,
        pub bias: bool,
        pub ws_init: nn::Init,
        pub bs_init: nn::Init,
    }

    pub type Conv2DInit = ConvNDInit<2>;

    impl<const DIM: usize> ConvNDInit<DIM> {
        pub fn new(ksize: usize) -> Self {
            Self {
                ksize: [ksize; DIM],
                stride: [1; DIM],
                padding: [ksize / 2; DIM],
                dilation: [1; DIM],
                groups: 1,
                bias: true,
                ws_init: nn::Init::KaimingUniform,
                bs_init: nn::Init::Const(0.0),
            }
        }

        pub fn build<'a>(
            self,
            path: impl Borrow<nn::Path<'a>>,
            in_dim: usize,
            out_dim: usize,
        ) -> Result<ConvND> {
            let Self {
                ksize,
                stride,
                padding,
                dilation,
                groups,
                bias,
                ws_init,
                bs_init,
            } = self;

            ensure!(in_dim > 0 && out_dim > 0, "channel sizes must be positive");
            ensure!(
                groups > 0 && in_dim % groups == 0 && out_dim % groups == 0,
                "in_dim and out_dim must be multiples of groups"
            );
            ensure!(
                ksize.iter().chain(&stride).chain(&dilation).all(|&v| v > 0),
                "kernel size, stride and dilation must be positive"
            );

            let path = path.borrow();
            let in_dim = in_dim as i64;
            let out_dim = out_dim as i64;
            let to_i64 = |values: [usize; DIM]| -> Vec<i64> {
                values.iter().map(|&v| v as i64).collect()
            };
            let groups = groups as i64;

            let bs = bias.then(|| path.var("bias", &[out_dim], bs_init));
            let ws = {
                let weight_size: Vec<i64> = [out_dim, in_dim / groups]
                    .into_iter()
                    .chain(to_i64(ksize))
                    .collect();
                path.var("weight", &weight_size, ws_init)
            };

            Ok(ConvND {
                stride: to_i64(stride),
                padding: to_i64(padding),
                dilation: to_i64(dilation),
                groups,
                weight: ws,
                bias: bs,
            })
        }
    }
}

mod conv_nd_ {
    use super::*;

    #[derive(Debug)]
    pub struct ConvND {
        pub(super) stride: Vec<i64>,
        pub(super) padding: Vec<i64>,
        pub(super) dilation: Vec<i64>,
        pub(super) groups: i64,
        pub(super) weight: Tensor,
        pub(super) bias: Option<Tensor>,
    }

    impl ConvND {
        pub fn weight(&self) -> &Tensor {
            &self.weight
        }
    }

    impl nn::Module for ConvND {
        fn forward(&self, input: &Tensor) -> Tensor {
            let Self {
                ref stride,
                ref padding,
                ref dilation,
                groups,
                ref weight,
                ref bias,
            } = *self;
            let ndims = stride.len();

            input.convolution(
                weight,
                bias.as_ref(),
                stride,
                padding,
                dilation,
                false,
                &vec![0; ndims],
                groups,
            )
        }
    }
}

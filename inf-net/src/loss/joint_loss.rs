use crate::common::*;

/// Boundary-weighted BCE plus weighted IoU.
///
/// Pixels whose mask value differs from its local average get a larger weight
/// `1 + boundary_weight · |avg_pool(mask) − mask|`.
#[derive(Debug, Clone)]
pub struct JointLoss {
    kernel_size: i64,
    boundary_weight: f64,
}

impl Default for JointLoss {
    fn default() -> Self {
        Self {
            kernel_size: 31,
            boundary_weight: 5.0,
        }
    }
}

impl JointLoss {
    pub fn new(kernel_size: usize, boundary_weight: f64) -> Result<Self> {
        ensure!(
            kernel_size % 2 == 1,
            "kernel_size must be odd, but get {}",
            kernel_size
        );
        ensure!(
            boundary_weight >= 0.0,
            "boundary_weight must be non-negative"
        );
        Ok(Self {
            kernel_size: kernel_size as i64,
            boundary_weight,
        })
    }

    /// Per-pixel weights of shape `[B, C, H, W]`.
    pub fn weights(&self, mask: &Tensor) -> Tensor {
        let Self {
            kernel_size,
            boundary_weight,
        } = *self;
        let padding = kernel_size / 2;
        let local_mean = mask.avg_pool2d(
            &[kernel_size, kernel_size],
            &[1, 1],
            &[padding, padding],
            false,
            true,
            None::<i64>,
        );
        (local_mean - mask).abs() * boundary_weight + 1.0
    }

    /// Computes the loss of `[B, C, H, W]` logits against a mask of equal shape.
    pub fn forward(&self, pred: &Tensor, mask: &Tensor) -> Result<Tensor> {
        ensure!(
            pred.size() == mask.size(),
            "prediction and mask must have equal shape, but get {:?} and {:?}",
            pred.size(),
            mask.size()
        );
        ensure!(
            pred.dim() == 4,
            "expect [batch, channels, height, width] tensors, but get {:?}",
            pred.size()
        );

        let weit = self.weights(mask);
        let weit_sum = weit.sum_dim_intlist(&[2, 3], false, Kind::Float);

        let bce = pred.binary_cross_entropy_with_logits::<Tensor>(
            mask,
            None,
            None,
            Reduction::None,
        );
        let wbce = (&weit * bce).sum_dim_intlist(&[2, 3], false, Kind::Float) / &weit_sum;

        let prob = pred.sigmoid();
        let inter = (&prob * mask * &weit).sum_dim_intlist(&[2, 3], false, Kind::Float);
        let union = ((&prob + mask) * &weit).sum_dim_intlist(&[2, 3], false, Kind::Float);
        let wiou = ((&inter + 1.0) / (union - &inter + 1.0)).neg() + 1.0;

        Ok((wbce + wiou).mean(Kind::Float))
    }
}

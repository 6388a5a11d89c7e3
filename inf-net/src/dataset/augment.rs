use crate::common::*;

pub const LABEL_SMOOTH_EPSILON: f64 = 0.1;

/// Random flips applied identically to every tensor of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlipAugment {
    pub horizontal: Ratio,
    pub vertical: Ratio,
}

impl Default for FlipAugment {
    fn default() -> Self {
        Self {
            horizontal: Ratio::half(),
            vertical: Ratio::half(),
        }
    }
}

impl FlipAugment {
    /// Flip the `[.., H, W]` tensors with the same random decision.
    pub fn apply<R>(&self, rng: &mut R, tensors: &[&Tensor]) -> Vec<Tensor>
    where
        R: Rng,
    {
        let hflip = rng.gen_bool(self.horizontal.to_f64());
        let vflip = rng.gen_bool(self.vertical.to_f64());
        let dims: Vec<i64> = hflip
            .then(|| -1)
            .into_iter()
            .chain(vflip.then(|| -2))
            .collect();

        tensors
            .iter()
            .map(|tensor| {
                if dims.is_empty() {
                    Tensor::shallow_clone(tensor)
                } else {
                    tensor.flip(&dims)
                }
            })
            .collect()
    }
}

/// Soften a one-hot mask to `mask·(1 − ε) + ε / C` where `C` is the channel count.
pub fn label_smooth(mask: &Tensor, epsilon: Ratio) -> Result<Tensor> {
    let n_classes = match *mask.size().as_slice() {
        [channels, _, _] | [_, channels, _, _] => channels,
        _ => bail!("expect a [C, H, W] or [B, C, H, W] mask"),
    };
    let epsilon = epsilon.to_f64();
    Ok(mask * (1.0 - epsilon) + epsilon / n_classes as f64)
}

/// Zero a random square of 1/4 the image side in each of the `[C, H, W]` tensors.
///
/// The square position is shared by all tensors, which must agree in spatial size.
pub fn random_cutout<R>(rng: &mut R, tensors: &[&Tensor]) -> Result<Vec<Tensor>>
where
    R: Rng,
{
    let (height, width) = tensors
        .iter()
        .map(|tensor| tensor.size_hw())
        .try_collect::<_, Vec<_>, _>()?
        .into_iter()
        .dedup()
        .exactly_one()
        .map_err(|_| format_err!("the tensors must have the same spatial size"))?;

    let side = height.min(width) / 4;
    if side == 0 {
        return Ok(tensors.iter().map(|tensor| tensor.copy()).collect());
    }
    let top = rng.gen_range(0..=(height - side));
    let left = rng.gen_range(0..=(width - side));

    let outputs = tensors
        .iter()
        .map(|tensor| {
            let output = tensor.copy();
            let _ = output
                .i((.., top..(top + side), left..(left + side)))
                .fill_(0.0);
            output
        })
        .collect();
    Ok(outputs)
}

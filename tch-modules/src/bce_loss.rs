use crate::common::*;

/// Binary cross-entropy on probabilities in `[0, 1]`.
#[derive(Debug)]
pub struct BceLoss {
    reduction: Reduction,
}

impl BceLoss {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        ensure!(
            input.size() == target.size(),
            "input and target tensors must have equal shape, but get {:?} and {:?}",
            input.size(),
            target.size()
        );

        // return zero tensor if (1) input is empty and (2) using mean reduction
        if input.is_empty() && self.reduction == Reduction::Mean {
            return Ok(Tensor::zeros(&[], (Kind::Float, input.device())).set_requires_grad(false));
        }

        Ok(input.binary_cross_entropy(target, None::<Tensor>, self.reduction))
    }
}

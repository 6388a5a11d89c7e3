use crate::common::*;

#[derive(Debug)]
pub struct BceWithLogitsLossInit {
    pub weight: Option<Tensor>,
    pub pos_weight: Option<Tensor>,
    pub reduction: Reduction,
}

impl BceWithLogitsLossInit {
    pub fn default(reduction: Reduction) -> Self {
        Self {
            weight: None,
            pos_weight: None,
            reduction,
        }
    }

    pub fn build(self) -> BceWithLogitsLoss {
        let Self {
            weight,
            pos_weight,
            reduction,
        } = self;

        BceWithLogitsLoss {
            weight,
            pos_weight,
            reduction,
        }
    }
}

#[derive(Debug)]
pub struct BceWithLogitsLoss {
    weight: Option<Tensor>,
    pos_weight: Option<Tensor>,
    reduction: Reduction,
}

impl BceWithLogitsLoss {
    pub fn reduction(&self) -> Reduction {
        self.reduction
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        ensure!(
            input.size() == target.size(),
            "input and target tensors must have equal shape, but get {:?} and {:?}",
            input.size(),
            target.size()
        );
        debug_assert!(
            bool::from(target.ge(0.0).logical_and(&target.le(1.0)).all()),
            "target values must be in range of [0.0, 1.0]"
        );

        // return zero tensor if (1) input is empty and (2) using mean reduction
        if input.is_empty() && self.reduction == Reduction::Mean {
            return Ok(Tensor::zeros(&[], (Kind::Float, input.device())).set_requires_grad(false));
        }

        Ok(input.binary_cross_entropy_with_logits(
            target,
            self.weight.as_ref(),
            self.pos_weight.as_ref(),
            self.reduction,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn bce_with_logits_loss_converges() -> Result<()> {
        let mut rng = rand::thread_rng();
        let device = Device::Cpu;

        let n_batch = 8;
        let n_class = rng.gen_range(1..4);

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let loss_fn = BceWithLogitsLossInit::default(Reduction::Mean).build();

        let input = root.randn("input", &[n_batch, n_class, 4, 4], 0.0, 1.0);
        let target = Tensor::rand(&[n_batch, n_class, 4, 4], (Kind::Float, device))
            .ge(0.5)
            .to_kind(Kind::Float)
            .set_requires_grad(false);

        let mut optimizer = nn::Adam::default().build(&vs, 0.1)?;

        for _ in 0..2000 {
            let loss = loss_fn.forward(&input, &target)?;
            optimizer.backward_step(&loss);
        }

        ensure!(
            bool::from((input.sigmoid() - &target).abs().le(0.05).all()),
            "the loss does not coverage"
        );

        Ok(())
    }

    #[test]
    fn bce_with_logits_loss_rejects_mismatched_shapes() {
        let loss_fn = BceWithLogitsLossInit::default(Reduction::Mean).build();
        let input = Tensor::zeros(&[1, 1, 4, 4], (Kind::Float, Device::Cpu));
        let target = Tensor::zeros(&[1, 1, 4, 5], (Kind::Float, Device::Cpu));
        assert!(loss_fn.forward(&input, &target).is_err());
    }

    #[test]
    fn bce_with_logits_loss_empty_input() -> Result<()> {
        let loss_fn = BceWithLogitsLossInit::default(Reduction::Mean).build();
        let empty = Tensor::zeros(&[0, 1], (Kind::Float, Device::Cpu));
        let loss = loss_fn.forward(&empty, &empty)?;
        assert_eq!(f64::from(&loss), 0.0);
        Ok(())
    }
}

use crate::common::*;
use tch_modules::BceLoss;

/// BCE of the sigmoid class probabilities against one-hot masks.
#[derive(Debug)]
pub struct MultiClassLoss {
    bce: BceLoss,
}

impl Default for MultiClassLoss {
    fn default() -> Self {
        Self {
            bce: BceLoss::new(Reduction::Mean),
        }
    }
}

impl MultiClassLoss {
    pub fn forward(&self, logits: &Tensor, masks: &Tensor) -> Result<Tensor> {
        self.bce.forward(&logits.sigmoid(), masks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_class_loss_test() -> Result<()> {
        let masks = Tensor::zeros(&[1, 3, 2, 2], (Kind::Float, Device::Cpu));
        let _ = masks.i((.., 0, .., ..)).fill_(1.0);
        let logits = (&masks * 2.0 - 1.0) * 10.0;

        let loss_fn = MultiClassLoss::default();
        let loss = f64::from(&loss_fn.forward(&logits, &masks)?);
        assert!(loss < 1e-3);

        let loss = f64::from(&loss_fn.forward(&Tensor::zeros_like(&logits), &masks)?);
        assert_abs_diff_eq!(loss, 2f64.ln(), epsilon = 1e-5);
        Ok(())
    }
}

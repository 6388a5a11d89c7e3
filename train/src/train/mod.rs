//! Training workers.

mod multi_class;
mod single_class;

pub use multi_class::*;
pub use single_class::*;

use crate::{common::*, config::OptimizerConfig};

const DUMMY_LR: f64 = 1.0;

pub fn build_optimizer(vs: &nn::VarStore, config: &OptimizerConfig) -> Result<nn::Optimizer> {
    let optimizer = match *config {
        OptimizerConfig::Adam { weight_decay } => nn::Adam {
            wd: weight_decay.raw(),
            ..Default::default()
        }
        .build(vs, DUMMY_LR)?,
        OptimizerConfig::Sgd {
            momentum,
            weight_decay,
        } => nn::Sgd {
            momentum: momentum.raw(),
            wd: weight_decay.raw(),
            ..Default::default()
        }
        .build(vs, DUMMY_LR)?,
    };
    Ok(optimizer)
}

/// Backward pass and parameter update with optional gradient value clipping.
pub fn optimize_step(optimizer: &mut nn::Optimizer, loss: &Tensor, clip: Option<R64>) {
    optimizer.zero_grad();
    loss.backward();
    if let Some(clip) = clip {
        optimizer.clip_grad_value(clip.raw());
    }
    optimizer.step();
}

/// The training size of a scale rate, rounded to a multiple of 32.
pub fn scaled_size(base_size: usize, rate: R64) -> i64 {
    let size = ((base_size as f64 * rate.raw() / 32.0).round() * 32.0) as i64;
    size.max(32)
}

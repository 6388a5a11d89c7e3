//! Network building blocks shared by the Inf-Net models.

mod common;

pub mod bce_loss;
pub mod bce_with_logits_loss;
pub mod conv_bn_2d;
pub mod conv_nd;

pub use bce_loss::*;
pub use bce_with_logits_loss::*;
pub use conv_bn_2d::*;
pub use conv_nd::*;

//! Tensor helpers shared by the Inf-Net crates.

mod common;
pub mod image;
pub mod ratio;
pub mod tensor;

pub use crate::image::*;
pub use ratio::*;
pub use tensor::*;

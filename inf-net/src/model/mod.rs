//! Segmentation networks.

mod backbone;
mod config;
mod decoder;
mod inf_net;
mod reverse_attention;
mod rfb;
mod unet;

pub use backbone::*;
pub use config::*;
pub use decoder::*;
pub use inf_net::*;
pub use reverse_attention::*;
pub use rfb::*;
pub use unet::*;

//! Segmentation and classification metrics.

mod classification;
mod evaluation;
mod log;
mod segmentation;
mod statistics;

pub use classification::*;
pub use evaluation::*;
pub use log::*;
pub use segmentation::*;
pub use statistics::*;

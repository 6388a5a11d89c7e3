//! Dataset loading and batching.

mod augment;
mod batch;
mod dataset_;
mod lung_inf;
mod multi_class;
mod utils;

pub use augment::*;
pub use batch::*;
pub use dataset_::*;
pub use lung_inf::*;
pub use multi_class::*;
pub use utils::*;

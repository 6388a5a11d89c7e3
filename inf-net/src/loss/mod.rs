//! Training objectives.

mod inf_net_loss;
mod joint_loss;
mod multi_class;

pub use inf_net_loss::*;
pub use joint_loss::*;
pub use multi_class::*;

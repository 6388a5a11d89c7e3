//! Lung infection segmentation with Inf-Net: models, losses, metrics,
//! datasets and severity scoring.

mod common;
pub mod checkpoint;
pub mod dataset;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod severity;

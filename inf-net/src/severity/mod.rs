//! Severity scoring from the predicted infection area.

mod ictcf;
mod score;
mod table;

pub use ictcf::*;
pub use score::*;
pub use table::*;

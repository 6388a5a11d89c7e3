//! Misc utilities.

mod avg_meter;
mod checkpoint;
mod lr_scheduler;
mod rate_counter;

pub use avg_meter::*;
pub use checkpoint::*;
pub use lr_scheduler::*;
pub use rate_counter::*;

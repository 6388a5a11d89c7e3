pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use std::borrow::Borrow;
pub use tch::{
    nn::{self, Module as _, ModuleT as _, OptimizerConfig as _},
    Device, Kind, Reduction, Tensor,
};
pub use tch_goodies::TensorExt as _;

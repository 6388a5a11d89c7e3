pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use approx::{abs_diff_eq, assert_abs_diff_eq, AbsDiffEq};
pub use image::{GrayImage, RgbImage};
pub use noisy_float::prelude::*;
pub use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    borrow::Borrow,
    convert::TryFrom,
    fmt::{self, Display, Formatter},
};
pub use tch::{Device, IndexOp, Kind, Tensor};

unzip_n::unzip_n!(pub 2);

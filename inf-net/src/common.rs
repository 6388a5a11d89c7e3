pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use approx::{abs_diff_eq, assert_abs_diff_eq};
pub use itertools::{izip, Itertools as _};
pub use log::{info, warn};
pub use noisy_float::prelude::*;
pub use rand::prelude::*;
pub use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    borrow::Borrow,
    cmp::Ordering,
    collections::{HashMap, HashSet},
    fmt::{self, Display},
    fs,
    io::{self, Write as _},
    iter,
    path::{Path, PathBuf},
    str::FromStr,
};
pub use strum::{AsRefStr, Display as StrumDisplay, EnumString};
pub use thiserror::Error as ThisError;
pub use tch::{
    nn::{self, ModuleT as _, OptimizerConfig},
    Device, IndexOp, Kind, Reduction, Tensor,
};
pub use tch_goodies::{ImageTensorExt, Ratio, TensorExt};
pub use tch_modules::{ConvBn2D, ConvBn2DInit};
pub use tch_tensor_like::TensorLike;

unzip_n::unzip_n!(pub 2);
unzip_n::unzip_n!(pub 3);
unzip_n::unzip_n!(pub 5);

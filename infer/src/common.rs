pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use futures::future::FutureExt;
pub use image::{GrayImage, RgbImage};
pub use inf_net::{
    dataset::{file_stem, find_counterpart, imagenet_normalize, list_images},
    model::{Model, ModelConfig},
};
pub use itertools::Itertools;
pub use log::{info, warn};
pub use noisy_float::prelude::*;
pub use once_cell::sync::Lazy;
pub use semver::{Version, VersionReq};
pub use serde::{de::Error as DeserializeError, Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
pub use tch::{nn, Device, IndexOp, Kind, Tensor};
pub use tch_goodies::{
    load_rgb_image, tensor_to_gray_image, tensor_to_rgb_image, ImageTensorExt, TensorExt,
};
pub use tch_tensor_like::TensorLike;

pub type Fallible<T> = Result<T, Error>;

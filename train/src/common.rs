//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context, Error, Result};
pub use approx::{abs_diff_eq, assert_abs_diff_eq};
pub use chrono::{DateTime, Local};
pub use futures::future::FutureExt;
pub use inf_net::{
    checkpoint as inf_checkpoint,
    dataset::{
        Batcher, FlipAugment, LungInfBatch, LungInfDataset, LungInfTestDataset, MultiClassAugment,
        MultiClassBatch, MultiClassDataset, RandomAccessDataset,
    },
    loss::{InfNetLoss, InfNetLossOutput, JointLoss, MultiClassLoss},
    metrics::ConfusionCounts,
    model::{Model, ModelConfig},
};
pub use itertools::{izip, Itertools};
pub use log::{info, warn};
pub use noisy_float::prelude::*;
pub use once_cell::sync::Lazy;
pub use regex::Regex;
pub use semver::{Version, VersionReq};
pub use serde::{de::Error as DeserializeError, Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    borrow::{Borrow, Cow},
    collections::VecDeque,
    fmt::Debug,
    fs,
    future::Future,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};
pub use structopt::StructOpt;
pub use tch::{
    nn::{self, OptimizerConfig as _},
    Device, IndexOp, Kind, Tensor,
};
pub use tch_goodies::{Ratio, TensorExt};
pub use tch_tensor_like::TensorLike;
pub use tfrecord::{EventWriter, EventWriterInit};
pub use tokio::sync::broadcast;

pub type Fallible<T> = Result<T, Error>;

unzip_n::unzip_n!(pub 2);

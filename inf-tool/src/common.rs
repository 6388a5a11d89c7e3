pub use anyhow::{ensure, format_err, Context as _, Result};
pub use inf_net::dataset::{
    class_index_to_one_hot, file_stem, find_counterpart, gt_to_class_index, imagenet_normalize,
    list_images,
};
pub use log::{info, warn};
pub use prettytable::{cell, row, Table};
pub use std::path::{Path, PathBuf};
pub use tch::{nn, Device, IndexOp, Tensor};
pub use tch_goodies::{load_gray_image, load_rgb_image, ImageTensorExt, TensorExt};

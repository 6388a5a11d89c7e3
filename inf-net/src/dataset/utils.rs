use crate::common::*;

pub const IMAGENET_MEAN: [f64; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f64; 3] = [0.229, 0.224, 0.225];

const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// Normalize a `[3, H, W]` tensor in `[0, 1]` with the ImageNet statistics.
pub fn imagenet_normalize(image: &Tensor) -> Result<Tensor> {
    ensure!(
        image.dim() == 3 && image.size()[0] == 3,
        "expect a [3, H, W] image, but get shape {:?}",
        image.size()
    );
    let device = image.device();
    let mean = Tensor::of_slice(&IMAGENET_MEAN)
        .to_kind(Kind::Float)
        .to_device(device)
        .view([3, 1, 1]);
    let std = Tensor::of_slice(&IMAGENET_STD)
        .to_kind(Kind::Float)
        .to_device(device)
        .view([3, 1, 1]);
    Ok((image.to_kind(Kind::Float) - mean) / std)
}

/// List `.jpg` and `.png` files in a directory sorted by file name.
pub fn list_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    ensure!(
        dir.is_dir(),
        "the dataset directory '{}' does not exist",
        dir.display()
    );

    let paths: Vec<_> = IMAGE_EXTENSIONS
        .iter()
        .map(|ext| -> Result<_> {
            let pattern = dir.join(format!("*.{}", ext));
            let pattern = pattern
                .to_str()
                .ok_or_else(|| format_err!("non-UTF-8 path '{}'", pattern.display()))?;
            let paths: Vec<_> = glob::glob(pattern)?.try_collect()?;
            Ok(paths)
        })
        .flatten_ok()
        .try_collect()?;
    let paths: Vec<_> = paths
        .into_iter()
        .sorted_by(|lhs, rhs| lhs.file_name().cmp(&rhs.file_name()))
        .collect();

    ensure!(
        !paths.is_empty(),
        "no images found in directory '{}'",
        dir.display()
    );
    Ok(paths)
}

/// The file stem as a string, e.g. `img_001` for `Imgs/img_001.jpg`.
pub fn file_stem(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| format_err!("invalid file name '{}'", path.display()))
}

/// Find the file with the same stem in another directory.
pub fn find_counterpart(dir: impl AsRef<Path>, stem: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            format_err!(
                "the counterpart of '{}' is missing in '{}'",
                stem,
                dir.display()
            )
        })
}

/// Map a raw `[1, H, W]` or `[H, W]` grayscale mask with values in `0..=255`
/// to per-pixel class indexes of shape `[H, W]`.
///
/// Values up to 2 are class indexes already. Larger values follow the
/// 0 / 128 / 255 encoding and are divided by 127.5 and rounded.
pub fn gt_to_class_index(gt: &Tensor) -> Result<Tensor> {
    let gt = match gt.dim() {
        2 => gt.shallow_clone(),
        3 if gt.size()[0] == 1 => gt.squeeze_dim(0),
        _ => bail!("expect a [1, H, W] or [H, W] mask, but get {:?}", gt.size()),
    };
    let gt = gt.to_kind(Kind::Float);
    let scaled = (&gt / 127.5).round();
    let index = gt
        .where_self(&gt.le(2.0), &scaled)
        .clamp(0.0, 2.0)
        .to_kind(Kind::Int64);
    Ok(index)
}

/// Convert a `[H, W]` class index map into a `[n_classes, H, W]` one-hot mask.
pub fn class_index_to_one_hot(index: &Tensor, n_classes: i64) -> Result<Tensor> {
    ensure!(index.dim() == 2, "expect a [H, W] class index map");
    let one_hot = index
        .f_one_hot(n_classes)?
        .permute(&[2, 0, 1])
        .to_kind(Kind::Float);
    Ok(one_hot)
}

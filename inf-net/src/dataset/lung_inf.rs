use super::{
    file_stem, find_counterpart, imagenet_normalize, list_images, Collate, FlipAugment,
    RandomAccessDataset,
};
use crate::common::*;
use tch_goodies::{load_gray_image, load_rgb_image};

pub use lung_inf_::*;
pub use lung_inf_test::*;

mod lung_inf_ {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LungInfRecord {
        pub image: PathBuf,
        pub gt: PathBuf,
        pub edge: PathBuf,
    }

    /// A single-class training sample.
    #[derive(Debug, TensorLike)]
    pub struct LungInfSample {
        /// Normalized `[3, S, S]` image.
        pub image: Tensor,
        /// `[1, S, S]` mask in `[0, 1]`.
        pub gt: Tensor,
        /// `[1, S, S]` edge map in `[0, 1]`.
        pub edge: Tensor,
    }

    impl LungInfSample {
        pub fn augment<R>(self, augment: &FlipAugment, rng: &mut R) -> Self
        where
            R: Rng,
        {
            let Self { image, gt, edge } = self;
            let mut flipped = augment.apply(rng, &[&image, &gt, &edge]).into_iter();
            match (flipped.next(), flipped.next(), flipped.next()) {
                (Some(image), Some(gt), Some(edge)) => Self { image, gt, edge },
                _ => Self { image, gt, edge },
            }
        }
    }

    #[derive(Debug, TensorLike)]
    pub struct LungInfBatch {
        pub images: Tensor,
        pub gts: Tensor,
        pub edges: Tensor,
    }

    impl LungInfBatch {
        pub fn batch_size(&self) -> i64 {
            self.images.size()[0]
        }

        /// Bilinear resize with aligned corners of every tensor to `size × size`.
        pub fn resize(&self, size: i64) -> Result<Self> {
            Ok(Self {
                images: self.images.resize2d_bilinear(size, size, true)?,
                gts: self.gts.resize2d_bilinear(size, size, true)?,
                edges: self.edges.resize2d_bilinear(size, size, true)?,
            })
        }
    }

    impl Collate for LungInfSample {
        type Batch = LungInfBatch;

        fn collate(samples: Vec<Self>) -> Result<Self::Batch> {
            ensure!(!samples.is_empty(), "cannot collate an empty batch");
            let (images, gts, edges) = samples
                .into_iter()
                .map(|sample| {
                    let LungInfSample { image, gt, edge } = sample;
                    (image, gt, edge)
                })
                .unzip_n_vec();
            Ok(LungInfBatch {
                images: Tensor::f_stack(&images, 0)?,
                gts: Tensor::f_stack(&gts, 0)?,
                edges: Tensor::f_stack(&edges, 0)?,
            })
        }
    }

    /// Training split with `Imgs/`, `GT/` and `Edge/` directories.
    #[derive(Debug)]
    pub struct LungInfDataset {
        train_size: i64,
        records: Vec<LungInfRecord>,
    }

    impl LungInfDataset {
        pub fn new(root: impl AsRef<Path>, train_size: usize) -> Result<Self> {
            let root = root.as_ref();
            ensure!(train_size > 0, "train_size must be positive");
            let gt_dir = root.join("GT");
            let edge_dir = root.join("Edge");

            let records: Vec<_> = list_images(root.join("Imgs"))?
                .into_iter()
                .map(|image| -> Result<_> {
                    let stem = file_stem(&image)?;
                    let gt = find_counterpart(&gt_dir, stem)?;
                    let edge = find_counterpart(&edge_dir, stem)?;
                    Ok(LungInfRecord { image, gt, edge })
                })
                .try_collect()?;

            info!(
                "loaded {} training records from '{}'",
                records.len(),
                root.display()
            );

            Ok(Self {
                train_size: train_size as i64,
                records,
            })
        }
    }

    impl RandomAccessDataset for LungInfDataset {
        type Sample = LungInfSample;

        fn num_records(&self) -> usize {
            self.records.len()
        }

        fn nth(&self, index: usize) -> Result<Self::Sample> {
            let LungInfRecord { image, gt, edge } = self
                .records
                .get(index)
                .ok_or_else(|| format_err!("invalid index {}", index))?;
            let size = self.train_size;

            let image = load_rgb_image(image)?
                .to_tensor()
                .resize2d_bilinear(size, size, false)?;
            let image = imagenet_normalize(&image)?;
            let gt = load_gray_image(gt)?
                .to_tensor()
                .resize2d_bilinear(size, size, false)?;
            let edge = load_gray_image(edge)?
                .to_tensor()
                .resize2d_bilinear(size, size, false)?;

            Ok(LungInfSample { image, gt, edge })
        }
    }
}

mod lung_inf_test {
    use super::*;

    /// A test sample with the image at the test size and the mask at its native size.
    #[derive(Debug, TensorLike)]
    pub struct LungInfTestSample {
        /// Normalized `[1, 3, S, S]` image.
        pub image: Tensor,
        /// `[1, 1, H, W]` mask in `[0, 1]`.
        pub gt: Tensor,
        #[tensor_like(clone)]
        pub name: String,
    }

    /// Test split with `Imgs/` and `GT/` directories.
    #[derive(Debug)]
    pub struct LungInfTestDataset {
        test_size: i64,
        records: Vec<(PathBuf, PathBuf)>,
    }

    impl LungInfTestDataset {
        pub fn new(root: impl AsRef<Path>, test_size: usize) -> Result<Self> {
            let root = root.as_ref();
            ensure!(test_size > 0, "test_size must be positive");
            let gt_dir = root.join("GT");

            let records: Vec<_> = list_images(root.join("Imgs"))?
                .into_iter()
                .map(|image| -> Result<_> {
                    let gt = find_counterpart(&gt_dir, file_stem(&image)?)?;
                    Ok((image, gt))
                })
                .try_collect()?;

            Ok(Self {
                test_size: test_size as i64,
                records,
            })
        }
    }

    impl RandomAccessDataset for LungInfTestDataset {
        type Sample = LungInfTestSample;

        fn num_records(&self) -> usize {
            self.records.len()
        }

        fn nth(&self, index: usize) -> Result<Self::Sample> {
            let (image_path, gt_path) = self
                .records
                .get(index)
                .ok_or_else(|| format_err!("invalid index {}", index))?;
            let size = self.test_size;

            let image = load_rgb_image(image_path)?
                .to_tensor()
                .resize2d_bilinear(size, size, false)?;
            let image = imagenet_normalize(&image)?.unsqueeze(0);
            let gt = load_gray_image(gt_path)?.to_tensor().unsqueeze(0);
            let name = image_path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| format_err!("invalid file name '{}'", image_path.display()))?
                .to_string();

            Ok(LungInfTestSample { image, gt, name })
        }
    }
}

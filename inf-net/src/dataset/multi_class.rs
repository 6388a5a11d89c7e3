use super::{
    class_index_to_one_hot, file_stem, find_counterpart, gt_to_class_index, imagenet_normalize,
    label_smooth, list_images, random_cutout, Collate, FlipAugment, RandomAccessDataset,
};
use crate::common::*;
use tch_goodies::{load_gray_image, load_rgb_image};

pub const MULTI_CLASS_CLASSES: i64 = 3;

/// Training-time options of the multi-class dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiClassAugment {
    #[serde(default)]
    pub flip: Option<FlipAugment>,
    #[serde(default)]
    pub label_smooth: Option<Ratio>,
    /// The probability to cut out a square from the image and the prior.
    #[serde(default)]
    pub random_cutout: Ratio,
}

impl Default for MultiClassAugment {
    fn default() -> Self {
        Self {
            flip: None,
            label_smooth: None,
            random_cutout: Ratio::zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiClassRecord {
    pub image: PathBuf,
    pub prior: PathBuf,
    pub gt: PathBuf,
}

#[derive(Debug, TensorLike)]
pub struct MultiClassSample {
    /// Normalized `[3, H, W]` image.
    pub image: Tensor,
    /// Normalized `[3, H, W]` prior segmentation.
    pub prior: Tensor,
    /// One-hot `[3, H, W]` mask ordered as background, GGO, consolidation.
    pub mask: Tensor,
    #[tensor_like(clone)]
    pub name: String,
}

impl MultiClassSample {
    /// The `[6, H, W]` network input, the image stacked over the prior.
    pub fn input(&self) -> Tensor {
        Tensor::cat(&[&self.image, &self.prior], 0)
    }

    pub fn augment<R>(self, augment: &MultiClassAugment, rng: &mut R) -> Result<Self>
    where
        R: Rng,
    {
        let MultiClassAugment {
            ref flip,
            label_smooth: smooth,
            random_cutout: cutout_prob,
        } = *augment;
        let Self {
            mut image,
            mut prior,
            mut mask,
            name,
        } = self;

        if let Some(flip) = flip {
            if let [new_image, new_prior, new_mask] =
                &flip.apply(rng, &[&image, &prior, &mask])[..]
            {
                image = new_image.shallow_clone();
                prior = new_prior.shallow_clone();
                mask = new_mask.shallow_clone();
            }
        }

        if rng.gen_bool(cutout_prob.to_f64()) {
            if let [new_image, new_prior] = &random_cutout(rng, &[&image, &prior])?[..] {
                image = new_image.shallow_clone();
                prior = new_prior.shallow_clone();
            }
        }

        if let Some(epsilon) = smooth {
            mask = label_smooth(&mask, epsilon)?;
        }

        Ok(Self {
            image,
            prior,
            mask,
            name,
        })
    }
}

#[derive(Debug, TensorLike)]
pub struct MultiClassBatch {
    /// `[B, 6, H, W]` network inputs.
    pub inputs: Tensor,
    /// `[B, 3, H, W]` masks.
    pub masks: Tensor,
    #[tensor_like(clone)]
    pub names: Vec<String>,
}

impl Collate for MultiClassSample {
    type Batch = MultiClassBatch;

    fn collate(samples: Vec<Self>) -> Result<Self::Batch> {
        ensure!(!samples.is_empty(), "cannot collate an empty batch");
        let (inputs, masks, names) = samples
            .into_iter()
            .map(|sample| {
                let input = sample.input();
                let MultiClassSample { mask, name, .. } = sample;
                (input, mask, name)
            })
            .unzip_n_vec();

        Ok(MultiClassBatch {
            inputs: Tensor::f_stack(&inputs, 0)?,
            masks: Tensor::f_stack(&masks, 0)?,
            names,
        })
    }
}

/// Multi-class split with `Imgs/`, `Prior/` and `GT/` directories.
#[derive(Debug)]
pub struct MultiClassDataset {
    records: Vec<MultiClassRecord>,
}

impl MultiClassDataset {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_prior_dir(root.as_ref(), root.as_ref().join("Prior"))
    }

    /// Load priors from a directory outside the split, e.g. Semi-Inf-Net predictions.
    pub fn with_prior_dir(root: impl AsRef<Path>, prior_dir: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let prior_dir = prior_dir.as_ref();
        let gt_dir = root.join("GT");

        let records: Vec<_> = list_images(root.join("Imgs"))?
            .into_iter()
            .map(|image| -> Result<_> {
                let stem = file_stem(&image)?;
                let prior = find_counterpart(prior_dir, stem)?;
                let gt = find_counterpart(&gt_dir, stem)?;
                Ok(MultiClassRecord { image, prior, gt })
            })
            .try_collect()?;

        info!(
            "loaded {} multi-class records from '{}'",
            records.len(),
            root.display()
        );
        Ok(Self { records })
    }
}

impl RandomAccessDataset for MultiClassDataset {
    type Sample = MultiClassSample;

    fn num_records(&self) -> usize {
        self.records.len()
    }

    fn nth(&self, index: usize) -> Result<Self::Sample> {
        let MultiClassRecord { image, prior, gt } = self
            .records
            .get(index)
            .ok_or_else(|| format_err!("invalid index {}", index))?;

        let name = image
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format_err!("invalid file name '{}'", image.display()))?
            .to_string();
        let image = imagenet_normalize(&load_rgb_image(image)?.to_tensor())?;
        let prior = imagenet_normalize(&load_rgb_image(prior)?.to_tensor())?;
        let mask = {
            let raw = load_gray_image(gt)?.to_raw_tensor();
            class_index_to_one_hot(&gt_to_class_index(&raw)?, MULTI_CLASS_CLASSES)?
        };

        ensure!(
            image.size_hw()? == prior.size_hw()? && image.size_hw()? == mask.size_hw()?,
            "the image, prior and mask of '{}' differ in size",
            name
        );

        Ok(MultiClassSample {
            image,
            prior,
            mask,
            name,
        })
    }
}

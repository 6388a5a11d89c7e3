use crate::{
    common::*,
    config::{Config, InputConfig},
};

/// A preprocessed slice ready for the network.
#[derive(Debug, TensorLike)]
pub struct InputRecord {
    /// `[1, C, H, W]` network input.
    pub input: Tensor,
    /// Height and width of the prediction to write.
    #[tensor_like(copy)]
    pub output_size: (i64, i64),
    #[tensor_like(clone)]
    pub name: String,
}

#[derive(Debug, Clone)]
enum InputItem {
    LungInf { image: PathBuf, gt: Option<PathBuf> },
    MultiClass { image: PathBuf, prior: PathBuf },
}

#[derive(Debug)]
pub struct InputStream {
    config: Arc<Config>,
    items: Vec<InputItem>,
}

impl InputStream {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let items: Vec<_> = match config.input {
            InputConfig::LungInf {
                ref image_dir,
                ref gt_dir,
                ..
            } => list_images(image_dir)?
                .into_iter()
                .map(|image| -> Result<_> {
                    let gt = gt_dir
                        .as_ref()
                        .map(|gt_dir| find_counterpart(gt_dir, file_stem(&image)?))
                        .transpose()?;
                    Ok(InputItem::LungInf { image, gt })
                })
                .try_collect()?,
            InputConfig::MultiClass {
                ref image_dir,
                ref prior_dir,
            } => list_images(image_dir)?
                .into_iter()
                .map(|image| -> Result<_> {
                    let prior = find_counterpart(prior_dir, file_stem(&image)?)?;
                    Ok(InputItem::MultiClass { image, prior })
                })
                .try_collect()?,
        };

        info!("found {} input images", items.len());
        Ok(Self { config, items })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = Result<InputRecord>> + '_ {
        self.items.iter().map(move |item| self.load(item))
    }

    fn load(&self, item: &InputItem) -> Result<InputRecord> {
        let record = match item {
            InputItem::LungInf { image, gt } => {
                let image_size = match self.config.input {
                    InputConfig::LungInf { image_size, .. } => image_size.get() as i64,
                    _ => bail!("inconsistent input configuration"),
                };
                let rgb = load_rgb_image(image)?;
                let (width, height) = match gt {
                    Some(gt) => ::image::image_dimensions(gt)
                        .with_context(|| format!("unable to read '{}'", gt.display()))?,
                    None => rgb.dimensions(),
                };
                let input = imagenet_normalize(
                    &rgb.to_tensor()
                        .resize2d_bilinear(image_size, image_size, false)?,
                )?;

                InputRecord {
                    input: input.unsqueeze(0),
                    output_size: (height as i64, width as i64),
                    name: file_name(image)?,
                }
            }
            InputItem::MultiClass { image, prior } => {
                let rgb = load_rgb_image(image)?;
                let (width, height) = rgb.dimensions();
                let image_tensor = imagenet_normalize(&rgb.to_tensor())?;
                let prior_tensor = imagenet_normalize(&load_rgb_image(prior)?.to_tensor())?;
                ensure!(
                    image_tensor.size() == prior_tensor.size(),
                    "the prior of '{}' differs in size",
                    image.display()
                );

                InputRecord {
                    input: Tensor::cat(&[image_tensor, prior_tensor], 0).unsqueeze(0),
                    output_size: (height as i64, width as i64),
                    name: file_name(image)?,
                }
            }
        };
        Ok(record)
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .ok_or_else(|| format_err!("invalid file name '{}'", path.display()))
}

//! Prediction images.

use crate::common::*;

#[derive(Debug, Clone)]
pub enum OutputImage {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl OutputImage {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match self {
            Self::Gray(image) => image.save(path),
            Self::Rgb(image) => image.save(path),
        }
        .with_context(|| format!("unable to write '{}'", path.display()))?;
        Ok(())
    }
}

/// The PNG file name of a prediction, e.g. `img_01.png` for `img_01.jpg`.
pub fn output_file_name(name: &str) -> String {
    Path::new(name)
        .with_extension("png")
        .to_string_lossy()
        .into_owned()
}

/// Convert a `[1, H, W]` probability map into an 8-bit grayscale image.
pub fn single_class_image(probability: &Tensor) -> Result<GrayImage> {
    tensor_to_gray_image(probability)
}

/// Convert `[3, H, W]` class scores into an RGB image.
///
/// Pixels are colored by their argmax class. Ground-glass opacities are
/// red, consolidation is green and background is black.
pub fn multi_class_image(scores: &Tensor) -> Result<RgbImage> {
    ensure!(
        scores.dim() == 3 && scores.size()[0] == 3,
        "expect [3, H, W] class scores, but get {:?}",
        scores.size()
    );
    let one_hot = scores.f_argmax_one_hot()?;
    let rgb = Tensor::stack(
        &[
            one_hot.i(1),
            one_hot.i(2),
            one_hot.i(0).zeros_like(),
        ],
        0,
    );
    tensor_to_rgb_image(&rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_file_name_test() {
        assert_eq!(output_file_name("Patient1_3.jpg"), "Patient1_3.png");
        assert_eq!(output_file_name("slice.png"), "slice.png");
    }

    #[test]
    fn multi_class_image_test() -> Result<()> {
        // background, GGO and consolidation winners for three pixels
        let scores = Tensor::of_slice(&[
            0.9f32, 0.1, 0.2, //
            0.05, 0.8, 0.3, //
            0.05, 0.1, 0.5,
        ])
        .view([3, 1, 3]);
        let image = multi_class_image(&scores)?;
        assert_eq!(image.dimensions(), (3, 1));
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(2, 0).0, [0, 255, 0]);

        assert!(multi_class_image(&scores.i(0..2)).is_err());
        Ok(())
    }

    #[test]
    fn single_class_image_test() -> Result<()> {
        let probability = Tensor::of_slice(&[0f32, 1.0, 0.5, 1.0]).view([1, 2, 2]);
        let image = single_class_image(&probability)?;
        assert_eq!(image.get_pixel(1, 0).0, [255]);
        assert_eq!(image.get_pixel(0, 1).0, [128]);
        Ok(())
    }
}

//! Conversions between `image` buffers and tensors.

use crate::common::*;
use std::path::Path;

pub trait ImageTensorExt {
    /// Convert to a `[C, H, W]` float tensor with values scaled into `[0, 1]`.
    fn to_tensor(&self) -> Tensor {
        self.to_raw_tensor() / 255.0
    }

    /// Convert to a `[C, H, W]` float tensor keeping the `0..=255` pixel values.
    fn to_raw_tensor(&self) -> Tensor;
}

impl ImageTensorExt for RgbImage {
    fn to_raw_tensor(&self) -> Tensor {
        let (width, height) = self.dimensions();
        Tensor::of_slice(self.as_raw())
            .view([height as i64, width as i64, 3])
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
    }
}

impl ImageTensorExt for GrayImage {
    fn to_raw_tensor(&self) -> Tensor {
        let (width, height) = self.dimensions();
        Tensor::of_slice(self.as_raw())
            .view([1, height as i64, width as i64])
            .to_kind(Kind::Float)
    }
}

fn to_u8_hwc(tensor: &Tensor) -> Result<(Vec<u8>, i64, u32, u32)> {
    let (channels, height, width) = match *tensor.size().as_slice() {
        [height, width] => (1, height, width),
        [channels, height, width] => (channels, height, width),
        _ => bail!(
            "expect a [H, W] or [C, H, W] tensor, but get shape {:?}",
            tensor.size()
        ),
    };
    let values: Vec<u8> = Vec::from(
        &(tensor.to_device(Device::Cpu).to_kind(Kind::Float).clamp(0.0, 1.0) * 255.0)
            .round()
            .to_kind(Kind::Uint8)
            .view([channels, height, width])
            .permute(&[1, 2, 0])
            .contiguous()
            .view([-1]),
    );
    Ok((values, channels, height as u32, width as u32))
}

/// Convert a `[H, W]` or `[1, H, W]` tensor with values in `[0, 1]` into a grayscale image.
pub fn tensor_to_gray_image(tensor: &Tensor) -> Result<GrayImage> {
    let (values, channels, height, width) = to_u8_hwc(tensor)?;
    ensure!(channels == 1, "expect a single channel tensor");
    GrayImage::from_raw(width, height, values)
        .ok_or_else(|| format_err!("pixel buffer does not match the image size"))
}

/// Convert a `[3, H, W]` tensor with values in `[0, 1]` into an RGB image.
pub fn tensor_to_rgb_image(tensor: &Tensor) -> Result<RgbImage> {
    let (values, channels, height, width) = to_u8_hwc(tensor)?;
    ensure!(channels == 3, "expect a three channel tensor");
    RgbImage::from_raw(width, height, values)
        .ok_or_else(|| format_err!("pixel buffer does not match the image size"))
}

pub fn load_rgb_image(path: impl AsRef<Path>) -> Result<RgbImage> {
    let path = path.as_ref();
    let image = ::image::open(path)
        .with_context(|| format!("unable to open image '{}'", path.display()))?;
    Ok(image.to_rgb8())
}

pub fn load_gray_image(path: impl AsRef<Path>) -> Result<GrayImage> {
    let path = path.as_ref();
    let image = ::image::open(path)
        .with_context(|| format!("unable to open image '{}'", path.display()))?;
    Ok(image.to_luma8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_image_conversion_test() -> Result<()> {
        let image = GrayImage::from_raw(3, 2, vec![0, 255, 0, 255, 0, 255]).unwrap();
        let tensor = image.to_tensor();
        assert_eq!(tensor.size(), vec![1, 2, 3]);
        assert_abs_diff_eq!(f64::from(&tensor.sum(Kind::Float)), 3.0, epsilon = 1e-6);

        let restored = tensor_to_gray_image(&tensor)?;
        assert_eq!(restored, image);
        Ok(())
    }

    #[test]
    fn rgb_image_conversion_test() -> Result<()> {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(1, 0, ::image::Rgb([255, 0, 0]));
        let tensor = image.to_tensor();
        assert_eq!(tensor.size(), vec![3, 2, 2]);
        assert_abs_diff_eq!(f64::from(&tensor.i((0, 0, 1))), 1.0, epsilon = 1e-6);
        let restored = tensor_to_rgb_image(&tensor)?;
        assert_eq!(restored, image);
        assert!(tensor_to_gray_image(&tensor).is_err());
        Ok(())
    }
}

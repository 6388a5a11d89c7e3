use crate::common::*;

pub trait TensorExt {
    fn is_empty(&self) -> bool;

    /// Get the `(height, width)` of a tensor of shape `[.., H, W]`.
    fn size_hw(&self) -> Result<(i64, i64)>;

    fn f_sum_tensors<T>(tensors: impl IntoIterator<Item = T>) -> Result<Tensor>
    where
        T: Borrow<Tensor>,
    {
        let mut iter = tensors.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| format_err!("the input iterator must not be empty"))?
            .borrow()
            .shallow_clone();
        let sum = iter.try_fold(first, |lhs, rhs| lhs.f_add(rhs.borrow()))?;
        Ok(sum)
    }

    fn f_weighted_mean_tensors<T>(pairs: impl IntoIterator<Item = (T, f64)>) -> Result<Tensor>
    where
        T: Borrow<Tensor>,
    {
        let (tensors, weights) = pairs
            .into_iter()
            .map(|(tensor, weight)| (tensor.borrow() * weight, weight))
            .unzip_n_vec();
        let sum_weights: f64 = weights.iter().cloned().sum();
        ensure!(sum_weights > 0.0, "the sum of weights must be positive");
        let sum_tensors = Self::f_sum_tensors(tensors)?;
        Ok(sum_tensors / sum_weights)
    }

    /// Bilinear resize of a `[C, H, W]` or `[B, C, H, W]` float tensor.
    fn resize2d_bilinear(
        &self,
        new_height: i64,
        new_width: i64,
        align_corners: bool,
    ) -> Result<Tensor>;

    /// Rescale values to `[0, 1]` with `(x - min) / (max - min + 1e-8)`.
    fn min_max_normalize(&self) -> Tensor;

    /// Convert class scores of shape `[C, H, W]` or `[B, C, H, W]` into
    /// the one-hot encoding of the per-pixel argmax, keeping the shape.
    fn f_argmax_one_hot(&self) -> Result<Tensor>;
}

impl TensorExt for Tensor {
    fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    fn size_hw(&self) -> Result<(i64, i64)> {
        match *self.size().as_slice() {
            [.., height, width] => Ok((height, width)),
            _ => bail!("expect at least two dimensions, but get {:?}", self.size()),
        }
    }

    fn resize2d_bilinear(
        &self,
        new_height: i64,
        new_width: i64,
        align_corners: bool,
    ) -> Result<Tensor> {
        ensure!(
            new_height > 0 && new_width > 0,
            "the target size must be positive, but get {}x{}",
            new_height,
            new_width
        );

        let input = self.to_kind(Kind::Float);
        let resized = match *self.size().as_slice() {
            [channels, height, width] => {
                if (height, width) == (new_height, new_width) {
                    return Ok(input);
                }
                input
                    .view([1, channels, height, width])
                    .f_upsample_bilinear2d(
                        &[new_height, new_width],
                        align_corners,
                        None::<f64>,
                        None::<f64>,
                    )?
                    .view([channels, new_height, new_width])
            }
            [_batch_size, _channels, height, width] => {
                if (height, width) == (new_height, new_width) {
                    return Ok(input);
                }
                input.f_upsample_bilinear2d(
                    &[new_height, new_width],
                    align_corners,
                    None::<f64>,
                    None::<f64>,
                )?
            }
            _ => bail!("invalid shape: expect three or four dimensions"),
        };

        Ok(resized)
    }

    fn min_max_normalize(&self) -> Tensor {
        let min = self.min();
        let max = self.max();
        (self - &min) / (max - min + 1e-8)
    }

    fn f_argmax_one_hot(&self) -> Result<Tensor> {
        let (class_dim, permutation): (i64, &[i64]) = match self.dim() {
            3 => (0, &[2, 0, 1]),
            4 => (1, &[0, 3, 1, 2]),
            _ => bail!("invalid shape: expect three or four dimensions"),
        };
        let num_classes = self.size()[class_dim as usize];
        let one_hot = self
            .f_argmax(class_dim, false)?
            .f_one_hot(num_classes)?
            .f_permute(permutation)?
            .to_kind(Kind::Float);
        Ok(one_hot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_mean_test() -> Result<()> {
        let lhs = Tensor::of_slice(&[1f32, 2.0]);
        let rhs = Tensor::of_slice(&[3f32, 6.0]);
        let mean = Tensor::f_weighted_mean_tensors([(&lhs, 1.0), (&rhs, 3.0)])?;
        let values: Vec<f32> = Vec::from(&mean);
        assert_abs_diff_eq!(values[0], 2.5, epsilon = 1e-6);
        assert_abs_diff_eq!(values[1], 5.0, epsilon = 1e-6);

        let empty: Vec<(Tensor, f64)> = vec![];
        assert!(Tensor::f_weighted_mean_tensors(empty).is_err());
        Ok(())
    }

    #[test]
    fn min_max_normalize_test() {
        let input = Tensor::of_slice(&[2f32, 4.0, 6.0]);
        let output: Vec<f32> = Vec::from(&input.min_max_normalize());
        assert_abs_diff_eq!(output[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(output[1], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(output[2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn argmax_one_hot_test() -> Result<()> {
        // two pixels, three classes
        let scores = Tensor::of_slice(&[0.1f32, 0.7, 0.8, 0.2, 0.1, 0.1]).view([1, 3, 1, 2]);
        let one_hot = scores.f_argmax_one_hot()?;
        assert_eq!(one_hot.size(), vec![1, 3, 1, 2]);
        let values: Vec<f32> = Vec::from(&one_hot.view([-1]));
        assert_eq!(values, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        Ok(())
    }

    #[test]
    fn resize_test() -> Result<()> {
        let input = Tensor::ones(&[3, 4, 4], (Kind::Float, Device::Cpu));
        let output = input.resize2d_bilinear(8, 6, true)?;
        assert_eq!(output.size(), vec![3, 8, 6]);
        assert!(input.resize2d_bilinear(0, 6, true).is_err());
        assert!(Tensor::ones(&[4], (Kind::Float, Device::Cpu))
            .resize2d_bilinear(2, 2, true)
            .is_err());
        Ok(())
    }
}

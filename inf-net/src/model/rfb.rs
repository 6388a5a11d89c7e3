use crate::common::*;

/// Modified receptive field block.
///
/// Three of the four branches stack a `1 × k` and a `k × 1` conv with a
/// dilated `3 × 3` conv, for `k` in 3, 5 and 7.
#[derive(Debug)]
pub struct Rfb {
    branch0: ConvBn2D,
    branches: Vec<Vec<ConvBn2D>>,
    conv_cat: ConvBn2D,
    conv_res: ConvBn2D,
}

impl Rfb {
    pub fn new<'p>(path: impl Borrow<nn::Path<'p>>, in_c: usize, out_c: usize) -> Result<Self> {
        let path = path.borrow();
        ensure!(in_c > 0 && out_c > 0, "channel sizes must be positive");

        let branch0 = ConvBn2DInit::new(in_c, out_c, 1).build(path / "branch0")?;
        let branches: Vec<_> = [3, 5, 7]
            .into_iter()
            .enumerate()
            .map(|(index, k)| -> Result<_> {
                let path = path / format!("branch{}", index + 1);
                Ok(vec![
                    ConvBn2DInit::new(in_c, out_c, 1).build(&path / "0")?,
                    ConvBn2DInit::asymmetric(out_c, out_c, 1, k).build(&path / "1")?,
                    ConvBn2DInit::asymmetric(out_c, out_c, k, 1).build(&path / "2")?,
                    ConvBn2DInit::dilated(out_c, out_c, k).build(&path / "3")?,
                ])
            })
            .try_collect()?;
        let conv_cat = ConvBn2DInit::new(out_c * 4, out_c, 3).build(path / "conv_cat")?;
        let conv_res = ConvBn2DInit::new(in_c, out_c, 1).build(path / "conv_res")?;

        Ok(Self {
            branch0,
            branches,
            conv_cat,
            conv_res,
        })
    }
}

impl nn::ModuleT for Rfb {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let outputs: Vec<_> = iter::once(xs.apply_t(&self.branch0, train))
            .chain(self.branches.iter().map(|branch| {
                branch
                    .iter()
                    .fold(xs.shallow_clone(), |xs, conv| xs.apply_t(conv, train))
            }))
            .collect();
        let xs_cat = Tensor::cat(&outputs, 1).apply_t(&self.conv_cat, train);
        (xs_cat + xs.apply_t(&self.conv_res, train)).relu()
    }
}

use super::{Collate, RandomAccessDataset};
use crate::common::*;

/// Groups dataset samples into collated batches.
///
/// The last batch may be smaller than `batch_size`.
#[derive(Debug)]
pub struct Batcher<D> {
    dataset: D,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl<D> Batcher<D>
where
    D: RandomAccessDataset,
    D::Sample: Collate,
{
    pub fn new(dataset: D, batch_size: usize, shuffle: bool, seed: u64) -> Result<Self> {
        ensure!(batch_size > 0, "batch_size must be positive");
        ensure!(dataset.num_records() > 0, "the dataset is empty");

        Ok(Self {
            dataset,
            batch_size,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        (self.dataset.num_records() + self.batch_size - 1) / self.batch_size
    }

    /// Iterate over one epoch. Each sample passes through `transform` before collation.
    pub fn epoch<'a, F>(
        &'a mut self,
        mut transform: F,
    ) -> impl Iterator<Item = Result<<D::Sample as Collate>::Batch>> + 'a
    where
        F: FnMut(D::Sample, &mut StdRng) -> Result<D::Sample> + 'a,
    {
        let Self {
            ref dataset,
            batch_size,
            shuffle,
            ref mut rng,
        } = *self;

        let mut indexes: Vec<_> = (0..dataset.num_records()).collect();
        if shuffle {
            indexes.shuffle(rng);
        }
        let chunks: Vec<Vec<usize>> = indexes
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        chunks.into_iter().map(move |chunk| {
            let samples: Vec<_> = chunk
                .into_iter()
                .map(|index| {
                    let sample = dataset.nth(index)?;
                    transform(sample, rng)
                })
                .try_collect()?;
            <D::Sample as Collate>::collate(samples)
        })
    }
}

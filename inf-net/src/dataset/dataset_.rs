use crate::common::*;

/// The dataset that can be random accessed.
pub trait RandomAccessDataset {
    type Sample;

    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Load the nth record in the dataset.
    fn nth(&self, index: usize) -> Result<Self::Sample>;
}

/// Samples that can be stacked into a batch.
pub trait Collate
where
    Self: Sized,
{
    type Batch;

    fn collate(samples: Vec<Self>) -> Result<Self::Batch>;
}

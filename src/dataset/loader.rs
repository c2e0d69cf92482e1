//! Samplers and the batch-size-1 validation loader.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{Sample, SegmentationDataset};
use crate::error::Result;

/// Order in which dataset indices are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    /// `0, 1, 2, ...`
    Sequential,
    /// Seeded random permutation.
    Random {
        /// RNG seed.
        seed: u64,
    },
}

impl Sampler {
    /// Indices for a dataset of `len` samples.
    #[must_use]
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..len).collect();
        if let Self::Random { seed } = *self {
            indices.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        indices
    }
}

/// Pick a sampler: shuffling or sequential.
#[must_use]
pub fn make_data_sampler(shuffle: bool, seed: u64) -> Sampler {
    if shuffle {
        Sampler::Random { seed }
    } else {
        Sampler::Sequential
    }
}

/// Loads samples one at a time in sampler order.
pub struct DataLoader {
    dataset: Box<dyn SegmentationDataset>,
    sampler: Sampler,
}

impl DataLoader {
    /// Create a loader over `dataset`.
    #[must_use]
    pub fn new(dataset: Box<dyn SegmentationDataset>, sampler: Sampler) -> Self {
        Self { dataset, sampler }
    }

    /// The underlying dataset.
    #[must_use]
    pub fn dataset(&self) -> &dyn SegmentationDataset {
        self.dataset.as_ref()
    }

    /// Number of batches (equal to the number of samples).
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Whether there is nothing to load.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// One pass over the dataset.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample>> + '_ {
        self.sampler
            .indices(self.dataset.len())
            .into_iter()
            .map(move |i| self.dataset.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SampleInfo;
    use ndarray::{Array2, Array3};

    struct Numbered(usize);

    impl SegmentationDataset for Numbered {
        fn name(&self) -> &str {
            "numbered"
        }

        fn len(&self) -> usize {
            self.0
        }

        fn num_class(&self) -> usize {
            2
        }

        fn get(&self, index: usize) -> Result<Sample> {
            Ok(Sample {
                img_data: vec![Array3::zeros((3, 1, 1))],
                seg_label: Array2::zeros((1, 1)),
                info: SampleInfo {
                    filename: format!("{index}.png"),
                    width: 1,
                    height: 1,
                },
            })
        }
    }

    #[test]
    fn test_sequential_sampler() {
        assert_eq!(make_data_sampler(false, 7).indices(4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_random_sampler_is_permutation_and_seeded() {
        let sampler = make_data_sampler(true, 42);
        let a = sampler.indices(50);
        let b = sampler.indices(50);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_loader_visits_every_sample_once() {
        let loader = DataLoader::new(Box::new(Numbered(5)), Sampler::Sequential);
        assert_eq!(loader.len(), 5);
        let names: Vec<String> = loader
            .iter()
            .map(|s| s.unwrap().info.filename)
            .collect();
        assert_eq!(names, ["0.png", "1.png", "2.png", "3.png", "4.png"]);
    }

    #[test]
    fn test_class_names_default() {
        let ds = Numbered(0);
        assert!(ds.is_empty());
        assert_eq!(ds.class_names(), vec!["class_0", "class_1"]);
    }
}

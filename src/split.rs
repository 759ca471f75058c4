use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

use crate::error::{MaterializeError, Result};
use crate::types::Split;

// Absorbs float error such as (1.0 - 0.8) * 10.0 == 1.9999999999999996
const SPLIT_EPSILON: f64 = 1e-9;

/// How validation indices are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    /// Fresh entropy on every materialization.
    #[default]
    Random,
    /// Reproducible draw from a fixed seed.
    Seeded(u64),
}

impl SplitStrategy {
    fn rng(self) -> StdRng {
        match self {
            SplitStrategy::Random => StdRng::from_entropy(),
            SplitStrategy::Seeded(seed) => StdRng::seed_from_u64(seed),
        }
    }
}

/// Check that a train ratio lies in (0, 1].
pub fn validate_split_ratio(split_ratio: f64) -> Result<f64> {
    if split_ratio > 0.0 && split_ratio <= 1.0 {
        Ok(split_ratio)
    } else {
        Err(MaterializeError::InvalidSplitRatio(split_ratio))
    }
}

/// Expected `(train, val)` sizes for `image_count` images.
///
/// `val = floor((1 - split_ratio) * image_count)`, train takes the rest.
pub fn split_sizes(image_count: usize, split_ratio: f64) -> (usize, usize) {
    let raw = (1.0 - split_ratio) * image_count as f64;
    let val_size = ((raw + SPLIT_EPSILON).floor().max(0.0) as usize).min(image_count);
    (image_count - val_size, val_size)
}

/// Partition of image indices into train and val.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    val_indices: HashSet<usize>,
    image_count: usize,
}

impl SplitAssignment {
    /// Draw `val` indices uniformly without replacement; the rest are train.
    pub fn draw(image_count: usize, split_ratio: f64, strategy: SplitStrategy) -> Self {
        let (_, val_size) = split_sizes(image_count, split_ratio);
        let mut rng = strategy.rng();
        let val_indices = rand::seq::index::sample(&mut rng, image_count, val_size)
            .into_iter()
            .collect();
        Self {
            val_indices,
            image_count,
        }
    }

    pub fn split_of(&self, index: usize) -> Split {
        if self.val_indices.contains(&index) {
            Split::Val
        } else {
            Split::Train
        }
    }

    pub fn val_len(&self) -> usize {
        self.val_indices.len()
    }

    pub fn train_len(&self) -> usize {
        self.image_count - self.val_indices.len()
    }

    /// Indices in the given split, ascending.
    pub fn indices(&self, split: Split) -> Vec<usize> {
        (0..self.image_count)
            .filter(|&index| self.split_of(index) == split)
            .collect()
    }
}

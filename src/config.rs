use clap::Parser;
use std::str::FromStr;

use crate::split::SplitStrategy;

/// Command-line arguments for materializing a dataset export into YOLO format.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// JSON dataset export (images, annotations and category names)
    #[arg(short = 'd', long = "dataset")]
    pub dataset: String,

    /// Directory receiving images/, labels/ and dataset.yaml
    #[arg(short = 'o', long = "output_dir")]
    pub output_dir: String,

    /// Proportion of the dataset to use for training
    #[arg(long = "split_ratio", default_value_t = 0.9, value_parser = validate_ratio)]
    pub split_ratio: f64,

    /// Seed for the train/val draw; a fresh draw is made on every run if omitted
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Hide the copy progress bar
    #[arg(long = "no_progress")]
    pub no_progress: bool,
}

impl Args {
    pub fn materializer_config(&self) -> MaterializerConfig {
        MaterializerConfig {
            split_strategy: self
                .seed
                .map(SplitStrategy::Seeded)
                .unwrap_or(SplitStrategy::Random),
            show_progress: !self.no_progress,
        }
    }
}

/// Library-side settings of a [`crate::Materializer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializerConfig {
    pub split_strategy: SplitStrategy,
    pub show_progress: bool,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            split_strategy: SplitStrategy::Random,
            show_progress: true,
        }
    }
}

// Validate that the train ratio is in (0.0, 1.0]
pub fn validate_ratio(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val > 0.0 && val <= 1.0 => Ok(val),
        _ => Err("RATIO must be greater than 0.0 and at most 1.0".to_string()),
    }
}

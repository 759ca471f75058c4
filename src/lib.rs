//! Annotated image dataset to YOLO segmentation layout
//!
//! This library materializes an in-memory polygon-annotated dataset into the
//! `images/`, `labels/` and `dataset.yaml` layout expected by YOLO training,
//! reusing a previous materialization when it still matches.

pub mod config;
pub mod conversion;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod materializer;
pub mod plugin;
pub mod split;
pub mod tracking;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Args, MaterializerConfig};
pub use error::{MaterializeError, Result};
pub use layout::DatasetLayout;
pub use manifest::Manifest;
pub use materializer::{prepare_dataset, Materializer, StaleReason, Validation};
pub use plugin::{MaterializerFactory, ProcessFactory};
pub use split::{SplitAssignment, SplitStrategy};
pub use tracking::{EpochAction, TrackingCapability, TrainerState, TrainingObserver};
pub use types::{AnnotatedImage, Annotation, Dataset, MaterializeStats, Polygon, Split};

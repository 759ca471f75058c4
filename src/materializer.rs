use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;

use crate::config::MaterializerConfig;
use crate::conversion::write_label_file;
use crate::error::{MaterializeError, Result};
use crate::layout::{count_entries, label_dir_for_image_dir, DatasetLayout, LABEL_EXTENSION};
use crate::manifest::{create_dataset_yaml, Manifest};
use crate::split::{split_sizes, validate_split_ratio, SplitAssignment};
use crate::types::{Dataset, MaterializeStats, Split};
use crate::utils::{create_progress_bar, is_supported_image};

/// Outcome of checking a target directory against a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// A matching dataset is already on disk.
    Reusable(Manifest),
    /// No manifest in the target directory.
    Missing,
    /// A dataset exists but does not match; it must be rebuilt.
    Stale(StaleReason),
}

/// Why an existing materialized dataset cannot be reused.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleReason {
    UnreadableManifest(String),
    MissingImageDir(PathBuf),
    MissingLabelDir { image_dir: PathBuf },
    ClassCountMismatch { expected: usize, recorded: usize },
    NamesLengthMismatch { expected: usize, recorded: usize },
    SplitCountMismatch {
        dir: PathBuf,
        expected: usize,
        found: usize,
    },
    /// Split files left behind without a manifest, e.g. by an interrupted run.
    OrphanedSplitDir(PathBuf),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::UnreadableManifest(e) => write!(f, "manifest cannot be read: {}", e),
            StaleReason::MissingImageDir(dir) => {
                write!(f, "image directory {} does not exist", dir.display())
            }
            StaleReason::MissingLabelDir { image_dir } => write!(
                f,
                "no label directory found beside {}",
                image_dir.display()
            ),
            StaleReason::ClassCountMismatch { expected, recorded } => write!(
                f,
                "manifest records {} classes, dataset has {}",
                recorded, expected
            ),
            StaleReason::NamesLengthMismatch { expected, recorded } => write!(
                f,
                "manifest lists {} class names, dataset has {}",
                recorded, expected
            ),
            StaleReason::SplitCountMismatch {
                dir,
                expected,
                found,
            } => write!(
                f,
                "{} holds {} entries, expected {}",
                dir.display(),
                found,
                expected
            ),
            StaleReason::OrphanedSplitDir(dir) => write!(
                f,
                "{} is not empty but no manifest was written",
                dir.display()
            ),
        }
    }
}

/// Materializes a [`Dataset`] into the YOLO segmentation directory layout.
///
/// The target directory is owned exclusively by one call at a time; callers
/// must serialize access to it.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    config: MaterializerConfig,
}

impl Materializer {
    pub fn new(config: MaterializerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MaterializerConfig {
        &self.config
    }

    /// Materialize `dataset` under `target_dir` and return the manifest path.
    ///
    /// A dataset already on disk is reused when [`Self::validate_existing`]
    /// accepts it. If it is stale, the whole of `target_dir` is deleted by
    /// [`Self::invalidate_and_rebuild`] before writing, so nothing else may
    /// be stored there.
    pub fn prepare(&self, dataset: &Dataset, target_dir: &Path, split_ratio: f64) -> Result<PathBuf> {
        check_inputs(dataset, split_ratio)?;

        match self.validate_existing(dataset, target_dir, split_ratio)? {
            Validation::Reusable(_) => {
                info!(
                    "A valid YOLO dataset already exists in {}, skip building a new one",
                    target_dir.display()
                );
                Ok(DatasetLayout::new(target_dir).manifest_path())
            }
            Validation::Missing => self.materialize(dataset, target_dir, split_ratio),
            Validation::Stale(reason) => {
                self.invalidate_and_rebuild(dataset, target_dir, split_ratio, &reason)
            }
        }
    }

    /// Check whether the dataset in `target_dir` matches `dataset` and `split_ratio`.
    ///
    /// Only aggregate counts are compared, not which image sits in which split.
    pub fn validate_existing(
        &self,
        dataset: &Dataset,
        target_dir: &Path,
        split_ratio: f64,
    ) -> Result<Validation> {
        let layout = DatasetLayout::new(target_dir);
        let manifest_path = layout.manifest_path();
        if !manifest_path.is_file() {
            for split in Split::ALL {
                for dir in [layout.images_dir(split), layout.labels_dir(split)] {
                    if dir.is_dir() && count_entries(&dir)? > 0 {
                        return Ok(Validation::Stale(StaleReason::OrphanedSplitDir(dir)));
                    }
                }
            }
            return Ok(Validation::Missing);
        }

        let manifest = match Manifest::from_yaml_file(&manifest_path) {
            Ok(manifest) => manifest,
            Err(e) => return Ok(Validation::Stale(StaleReason::UnreadableManifest(e.to_string()))),
        };

        let mut split_dirs = Vec::with_capacity(2);
        for (split, image_dir) in [(Split::Train, &manifest.train), (Split::Val, &manifest.val)] {
            if !image_dir.is_dir() {
                return Ok(Validation::Stale(StaleReason::MissingImageDir(image_dir.clone())));
            }
            match label_dir_for_image_dir(image_dir, split) {
                Some(label_dir) if label_dir.is_dir() => {
                    split_dirs.push((split, image_dir.clone(), label_dir))
                }
                _ => {
                    return Ok(Validation::Stale(StaleReason::MissingLabelDir {
                        image_dir: image_dir.clone(),
                    }))
                }
            }
        }

        let expected_classes = dataset.categories.len();
        if manifest.nc != expected_classes {
            return Ok(Validation::Stale(StaleReason::ClassCountMismatch {
                expected: expected_classes,
                recorded: manifest.nc,
            }));
        }
        if manifest.names.len() != expected_classes {
            return Ok(Validation::Stale(StaleReason::NamesLengthMismatch {
                expected: expected_classes,
                recorded: manifest.names.len(),
            }));
        }

        let (train_size, val_size) = split_sizes(dataset.images.len(), split_ratio);
        for (split, image_dir, label_dir) in split_dirs {
            let expected = match split {
                Split::Train => train_size,
                Split::Val => val_size,
            };
            for dir in [image_dir, label_dir] {
                let found = count_entries(&dir)?;
                if found != expected {
                    return Ok(Validation::Stale(StaleReason::SplitCountMismatch {
                        dir,
                        expected,
                        found,
                    }));
                }
            }
        }

        Ok(Validation::Reusable(manifest))
    }

    /// Delete `target_dir` entirely, then materialize `dataset` from scratch.
    ///
    /// This is the recovery path for a target directory that violates the
    /// layout or counts expected for `dataset`. Invalid input is rejected
    /// before anything is deleted.
    pub fn invalidate_and_rebuild(
        &self,
        dataset: &Dataset,
        target_dir: &Path,
        split_ratio: f64,
        reason: &StaleReason,
    ) -> Result<PathBuf> {
        check_inputs(dataset, split_ratio)?;
        warn!(
            "Existing dataset in {} is stale ({}). Deleting it and rebuilding.",
            target_dir.display(),
            reason
        );
        if target_dir.exists() {
            fs::remove_dir_all(target_dir).map_err(MaterializeError::io(target_dir))?;
        }
        self.materialize(dataset, target_dir, split_ratio)
    }

    fn materialize(&self, dataset: &Dataset, target_dir: &Path, split_ratio: f64) -> Result<PathBuf> {
        let layout = DatasetLayout::new(target_dir);
        layout.create_dirs()?;

        let assignment =
            SplitAssignment::draw(dataset.images.len(), split_ratio, self.config.split_strategy);
        info!(
            "Materializing {} images into {} ({} train / {} val)",
            dataset.images.len(),
            target_dir.display(),
            assignment.train_len(),
            assignment.val_len()
        );

        let pb = if self.config.show_progress {
            create_progress_bar(dataset.images.len() as u64, "Copy")
        } else {
            ProgressBar::hidden()
        };

        let mut stats = MaterializeStats::new();

        for (index, image) in dataset.images.iter().enumerate() {
            let split = assignment.split_of(index);
            let leaf = image
                .path
                .file_name()
                .ok_or_else(|| MaterializeError::MissingFileName {
                    path: image.path.clone(),
                })?;

            if !is_supported_image(&image.path) {
                warn!("Unrecognized image extension: {}", image.path.display());
            }

            let image_output_path = layout.image_path(split, leaf);
            debug!(
                "{} -> {}",
                image.path.display(),
                image_output_path.display()
            );
            fs::copy(&image.path, &image_output_path)
                .map_err(MaterializeError::io(&image.path))?;
            stats.increment_images(split);

            write_label_file(&layout.label_path(split, leaf), image)?;
            stats.increment_labels();
            stats.add_annotations_without_polygon(
                image
                    .annotations
                    .iter()
                    .filter(|annotation| annotation.primary_polygon().is_none())
                    .count(),
            );

            pb.inc(1);
        }
        pb.finish_with_message("Copy complete");

        let train_dir = layout.images_dir(Split::Train);
        let val_dir = layout.images_dir(Split::Val);
        let manifest = Manifest::new(
            fs::canonicalize(&train_dir).map_err(MaterializeError::io(&train_dir))?,
            fs::canonicalize(&val_dir).map_err(MaterializeError::io(&val_dir))?,
            dataset.category_names(),
        );

        info!("Creating dataset.yaml file...");
        let manifest_path = layout.manifest_path();
        create_dataset_yaml(&manifest_path, &manifest)?;
        stats.print_summary();

        Ok(manifest_path)
    }
}

// Reject input that cannot be materialized, before the target is touched
fn check_inputs(dataset: &Dataset, split_ratio: f64) -> Result<()> {
    validate_split_ratio(split_ratio)?;
    if dataset.images.is_empty() {
        return Err(MaterializeError::EmptyDataset);
    }

    // Label names must be unique dataset-wide: the split draw decides which
    // images share a directory.
    let mut label_names: HashMap<PathBuf, &Path> = HashMap::with_capacity(dataset.images.len());
    for image in &dataset.images {
        if image.width == 0 || image.height == 0 {
            return Err(MaterializeError::InvalidImageSize {
                path: image.path.clone(),
                width: image.width,
                height: image.height,
            });
        }
        let leaf = image
            .path
            .file_name()
            .ok_or_else(|| MaterializeError::MissingFileName {
                path: image.path.clone(),
            })?;
        let label_name = Path::new(leaf).with_extension(LABEL_EXTENSION);
        if let Some(first) = label_names.insert(label_name, &image.path) {
            return Err(MaterializeError::DuplicateFileName {
                first: first.to_path_buf(),
                second: image.path.clone(),
            });
        }
    }
    Ok(())
}

/// Materialize with the default configuration (unseeded split).
pub fn prepare_dataset(dataset: &Dataset, target_dir: &Path, split_ratio: f64) -> Result<PathBuf> {
    Materializer::default().prepare(dataset, target_dir, split_ratio)
}

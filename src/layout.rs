//! Directory layout of a materialized YOLO dataset.
//!
//! ```text
//! <root>/
//!   images/train/*    images/val/*
//!   labels/train/*.txt labels/val/*.txt
//!   dataset.yaml
//! ```

use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{MaterializeError, Result};
use crate::types::Split;

pub const IMAGES_DIR: &str = "images";
pub const LABELS_DIR: &str = "labels";
pub const MANIFEST_FILE: &str = "dataset.yaml";
pub const LABEL_EXTENSION: &str = "txt";

/// Maps `(split, leaf file name)` to image and label destinations under a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    root: PathBuf,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn images_dir(&self, split: Split) -> PathBuf {
        self.root.join(IMAGES_DIR).join(split.as_str())
    }

    pub fn labels_dir(&self, split: Split) -> PathBuf {
        self.root.join(LABELS_DIR).join(split.as_str())
    }

    /// Destination of a copied image; the leaf name is kept as is.
    pub fn image_path(&self, split: Split, leaf: &OsStr) -> PathBuf {
        self.images_dir(split).join(leaf)
    }

    /// Destination of the label file for an image leaf name.
    ///
    /// Only the final extension is swapped for `.txt`.
    pub fn label_path(&self, split: Split, leaf: &OsStr) -> PathBuf {
        self.labels_dir(split)
            .join(leaf)
            .with_extension(LABEL_EXTENSION)
    }

    /// Create the four split directories. Existing directories are left alone.
    pub fn create_dirs(&self) -> Result<()> {
        for split in Split::ALL {
            for dir in [self.images_dir(split), self.labels_dir(split)] {
                fs::create_dir_all(&dir).map_err(MaterializeError::io(&dir))?;
            }
        }
        Ok(())
    }
}

/// Derive the label directory that sits beside a recorded image directory.
///
/// The last `images` component that is directly followed by the split name is
/// replaced by `labels`; every other component is kept in place. Returns
/// `None` if the path does not end in `images/<split>`.
pub fn label_dir_for_image_dir(image_dir: &Path, split: Split) -> Option<PathBuf> {
    let components: Vec<Component<'_>> = image_dir.components().collect();
    let (last, parent) = match components.as_slice() {
        [.., parent, last] => (last, parent),
        _ => return None,
    };
    if last.as_os_str() != split.as_str() || parent.as_os_str() != IMAGES_DIR {
        return None;
    }

    let mut label_dir: PathBuf = components[..components.len() - 2].iter().collect();
    label_dir.push(LABELS_DIR);
    label_dir.push(split.as_str());
    Some(label_dir)
}

/// Number of entries directly inside a directory.
pub fn count_entries(dir: &Path) -> Result<usize> {
    let entries = fs::read_dir(dir).map_err(MaterializeError::io(dir))?;
    let mut count = 0;
    for entry in entries {
        entry.map_err(MaterializeError::io(dir))?;
        count += 1;
    }
    Ok(count)
}

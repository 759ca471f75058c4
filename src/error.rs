use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MaterializeError>;

/// Errors surfaced by dataset materialization.
///
/// Stale or corrupted datasets on disk are not errors; they are recovered by
/// [`crate::Materializer::invalidate_and_rebuild`].
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("yaml error at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("split ratio must be in (0, 1], got {0}")]
    InvalidSplitRatio(f64),
    #[error("dataset contains no images")]
    EmptyDataset,
    #[error("image {path} has invalid size {width}x{height}")]
    InvalidImageSize {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    #[error("image path {path} has no file name")]
    MissingFileName { path: PathBuf },
    #[error("images {first} and {second} map to the same label file")]
    DuplicateFileName { first: PathBuf, second: PathBuf },
}

impl MaterializeError {
    pub(crate) fn io(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        move |source| MaterializeError::Io { path, source }
    }
}

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{MaterializeError, Result};

/// Contents of `dataset.yaml` as consumed by the training framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub train: PathBuf,
    pub val: PathBuf,
    pub nc: usize,
    pub names: Vec<String>,
}

impl Manifest {
    pub fn new(train: PathBuf, val: PathBuf, names: Vec<String>) -> Self {
        Self {
            train,
            val,
            nc: names.len(),
            names,
        }
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(MaterializeError::io(path))?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|source| MaterializeError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Create the dataset.yaml file for YOLO training
pub fn create_dataset_yaml(path: &Path, manifest: &Manifest) -> Result<()> {
    let file = File::create(path).map_err(MaterializeError::io(path))?;
    let mut writer = BufWriter::new(file);
    serde_yaml::to_writer(&mut writer, manifest).map_err(|source| MaterializeError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(MaterializeError::io(path))
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{MaterializeError, Result};

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

/// Closed polygon in pixel coordinates.
///
/// Serialized as a flat `[x0, y0, x1, y1, ...]` list, the way annotation
/// exports store segmentation polygons. A dangling odd coordinate is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct Polygon {
    pub points: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl From<Vec<f64>> for Polygon {
    fn from(coords: Vec<f64>) -> Self {
        if coords.len() % 2 != 0 {
            log::warn!(
                "Polygon has an odd number of coordinates ({}), dropping the last one",
                coords.len()
            );
        }
        let points = coords.chunks_exact(2).map(|xy| (xy[0], xy[1])).collect();
        Self { points }
    }
}

impl From<Polygon> for Vec<f64> {
    fn from(polygon: Polygon) -> Self {
        polygon
            .points
            .into_iter()
            .flat_map(|(x, y)| [x, y])
            .collect()
    }
}

// A single object annotation; only the first polygon is exported
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub category_id: i64,
    #[serde(rename = "segmentation_poly", default)]
    pub polygons: Vec<Polygon>,
}

impl Annotation {
    pub fn new(category_id: i64, polygons: Vec<Polygon>) -> Self {
        Self {
            category_id,
            polygons,
        }
    }

    /// The polygon written to the label file, if any.
    pub fn primary_polygon(&self) -> Option<&Polygon> {
        self.polygons.first()
    }
}

// An image file with its pixel size and annotations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedImage {
    #[serde(rename = "filename")]
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl AnnotatedImage {
    pub fn new(path: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            width,
            height,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// In-memory annotated image dataset.
///
/// Categories are keyed by id; names are enumerated in ascending id order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "DatasetExport", into = "DatasetExport")]
pub struct Dataset {
    pub images: Vec<AnnotatedImage>,
    pub categories: BTreeMap<i64, String>,
}

impl Dataset {
    pub fn new(images: Vec<AnnotatedImage>, categories: BTreeMap<i64, String>) -> Self {
        Self { images, categories }
    }

    /// Load a host dataset export from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(MaterializeError::io(path))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| MaterializeError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Category names in id order, as written to the manifest.
    pub fn category_names(&self) -> Vec<String> {
        self.categories.values().cloned().collect()
    }
}

// On-disk shape of a host dataset export
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DatasetExport {
    images: Vec<AnnotatedImage>,
    metadata: DatasetMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatasetMetadata {
    #[serde(default)]
    category_names: BTreeMap<i64, String>,
}

impl From<DatasetExport> for Dataset {
    fn from(export: DatasetExport) -> Self {
        Self {
            images: export.images,
            categories: export.metadata.category_names,
        }
    }
}

impl From<Dataset> for DatasetExport {
    fn from(dataset: Dataset) -> Self {
        Self {
            images: dataset.images,
            metadata: DatasetMetadata {
                category_names: dataset.categories,
            },
        }
    }
}

/// Dataset split a materialized image lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Struct to hold materialization statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeStats {
    pub train_images: usize,
    pub val_images: usize,
    pub labels_written: usize,
    pub annotations_without_polygon: usize,
}

impl MaterializeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_images(&mut self, split: Split) {
        match split {
            Split::Train => self.train_images += 1,
            Split::Val => self.val_images += 1,
        }
    }

    pub fn increment_labels(&mut self) {
        self.labels_written += 1;
    }

    pub fn add_annotations_without_polygon(&mut self, count: usize) {
        self.annotations_without_polygon += count;
    }

    pub fn print_summary(&self) {
        log::info!("=== Materialization Summary ===");
        log::info!("Train images: {}", self.train_images);
        log::info!("Val images: {}", self.val_images);
        log::info!("Label files written: {}", self.labels_written);
        if self.annotations_without_polygon > 0 {
            log::warn!(
                "Annotations without polygon (category only): {}",
                self.annotations_without_polygon
            );
        }
    }
}

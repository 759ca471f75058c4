use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{MaterializeError, Result};
use crate::types::{AnnotatedImage, Annotation};

/// Format one annotation as a YOLO segmentation label line.
///
/// The line is the category id, a space, then the normalized points of the
/// first polygon separated by spaces. An annotation without polygons yields
/// `"<id> \n"`.
pub fn format_label_line(annotation: &Annotation, image_width: u32, image_height: u32) -> String {
    let mut line = format!("{} ", annotation.category_id);
    if let Some(polygon) = annotation.primary_polygon() {
        let coords: Vec<String> = polygon
            .points
            .iter()
            .flat_map(|&(x, y)| {
                let x_norm = x / image_width as f64;
                let y_norm = y / image_height as f64;
                [format!("{:.6}", x_norm), format!("{:.6}", y_norm)]
            })
            .collect();
        line.push_str(&coords.join(" "));
    }
    line.push('\n');
    line
}

/// Convert all annotations of an image, in source order
pub fn convert_to_yolo_format(image: &AnnotatedImage) -> String {
    let mut yolo_data = String::with_capacity(image.annotations.len() * 64);
    for annotation in &image.annotations {
        yolo_data.push_str(&format_label_line(annotation, image.width, image.height));
    }
    yolo_data
}

/// Write the label file for an image.
pub fn write_label_file(label_path: &Path, image: &AnnotatedImage) -> Result<()> {
    let file = File::create(label_path).map_err(MaterializeError::io(label_path))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(convert_to_yolo_format(image).as_bytes())
        .and_then(|_| writer.flush())
        .map_err(MaterializeError::io(label_path))
}

//! Blob key derivation for originals and their processed variants.

use crate::types::{ImageId, TaskType};

const ORIGINAL_DIR: &str = "original";
const PROCESSED_DIR: &str = "processed";

/// Blob key for a freshly uploaded original: `original/<uuid><ext>`.
pub fn original_path(id: ImageId, ext: &str) -> String {
    format!("{ORIGINAL_DIR}/{id}{ext}")
}

/// Derive where the output of `action` applied to `original` is stored.
///
/// The first `original` directory segment becomes `processed` and
/// `_<action>` is inserted before the extension:
/// `original/abc.jpg` + resize -> `processed/abc_resize.jpg`.
/// Total over all inputs; paths without a directory or extension still
/// receive the suffix.
pub fn processed_path(original: &str, action: TaskType) -> String {
    let (dir, file) = match original.rfind('/') {
        Some(idx) => original.split_at(idx + 1),
        None => ("", original),
    };
    let (stem, ext) = match file.rfind('.') {
        Some(idx) => file.split_at(idx),
        None => (file, ""),
    };

    let mut replaced = false;
    let dir: Vec<&str> = dir
        .split('/')
        .map(|segment| {
            if !replaced && segment == ORIGINAL_DIR {
                replaced = true;
                PROCESSED_DIR
            } else {
                segment
            }
        })
        .collect();

    format!("{}{stem}_{action}{ext}", dir.join("/"))
}

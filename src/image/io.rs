//! Convenience helpers for loading images via the `image` crate.

use crate::image::{normalize, GrayscaleMatrix};
use crate::util::{TriggerError, TriggerResult};
use std::path::Path;

/// Loads an image from disk without converting it.
pub fn load_image<P: AsRef<Path>>(path: P) -> TriggerResult<::image::DynamicImage> {
    ::image::open(path).map_err(|err| TriggerError::ImageIo {
        reason: err.to_string(),
    })
}

/// Loads an image from disk and normalizes it into a template matrix.
///
/// Unlike [`normalize`], an empty image is reported as an error because a
/// template is loaded once and an empty one can never match.
pub fn load_template<P: AsRef<Path>>(path: P) -> TriggerResult<GrayscaleMatrix> {
    let matrix = normalize(&load_image(path)?);
    if matrix.is_empty() {
        return Err(TriggerError::EmptyInput("template"));
    }
    Ok(matrix)
}

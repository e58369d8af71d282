//! Grayscale matrices and pixel normalization.
//!
//! `GrayscaleMatrix` is the only pixel representation the matchers accept: a
//! contiguous row-major `f32` buffer with one luminance sample per pixel,
//! normalized to `[0, 1]`. The stride always equals the width. A 0x0 matrix is
//! the failure sentinel produced by [`normalize`] for empty inputs.

use crate::util::{TriggerError, TriggerResult};
use ::image::DynamicImage;

pub mod io;

/// Owned single-channel luminance matrix normalized to `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GrayscaleMatrix {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl GrayscaleMatrix {
    /// Creates a matrix from normalized samples in row-major order.
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> TriggerResult<Self> {
        let needed = checked_area(width, height)?;
        if data.len() != needed {
            return Err(TriggerError::BufferLength {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Returns the empty sentinel matrix.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a matrix with every sample set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> TriggerResult<Self> {
        let needed = checked_area(width, height)?;
        Ok(Self {
            data: vec![value; needed],
            width,
            height,
        })
    }

    /// Creates a matrix from an 8-bit luma buffer, mapping `0..=255` onto `[0, 1]`.
    pub fn from_luma8(data: &[u8], width: usize, height: usize) -> TriggerResult<Self> {
        let needed = checked_area(width, height)?;
        if data.len() != needed {
            return Err(TriggerError::BufferLength {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data: data.iter().map(|&v| f32::from(v) / 255.0).collect(),
            width,
            height,
        })
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `true` for the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the row-major samples.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Returns the sample at `(x, y)` if it is within bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Returns row `y` as a slice of length `width`.
    pub fn row(&self, y: usize) -> Option<&[f32]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        self.data.get(start..start + self.width)
    }

    /// Copies the `width x height` window whose top-left corner is `(x, y)`.
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> TriggerResult<Self> {
        checked_area(width, height)?;
        let fits_x = x.checked_add(width).is_some_and(|end| end <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|end| end <= self.height);
        if !fits_x || !fits_y {
            return Err(TriggerError::InvalidInput("crop window outside matrix"));
        }
        let mut data = Vec::with_capacity(width * height);
        for row in y..y + height {
            let start = row * self.width + x;
            data.extend_from_slice(&self.data[start..start + width]);
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }
}

/// Converts an arbitrary pixel buffer into a normalized luminance matrix.
///
/// Multi-channel images are reduced to luminance first. Samples are scaled
/// from the native bit depth: 8-bit formats by `1/255`, 16-bit formats by
/// `1/65535`; float formats are clamped to `[0, 1]`. An image with a zero
/// dimension yields the empty sentinel.
pub fn normalize(img: &DynamicImage) -> GrayscaleMatrix {
    let width = img.width() as usize;
    let height = img.height() as usize;
    if width == 0 || height == 0 {
        return GrayscaleMatrix::empty();
    }

    let data: Vec<f32> = match img {
        DynamicImage::ImageLuma8(gray) => gray
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect(),
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => img
            .to_luma16()
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 65535.0)
            .collect(),
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => img
            .to_luma32f()
            .as_raw()
            .iter()
            .map(|&v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
            .collect(),
        _ => img
            .to_luma8()
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect(),
    };

    GrayscaleMatrix {
        data,
        width,
        height,
    }
}

fn checked_area(width: usize, height: usize) -> TriggerResult<usize> {
    if width == 0 || height == 0 {
        return Err(TriggerError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .ok_or(TriggerError::InvalidDimensions { width, height })
}

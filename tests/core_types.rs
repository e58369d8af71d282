use glyphtrigger::{normalize, GrayscaleMatrix, Rectangle, TriggerError};
use image::{DynamicImage, Rgb, Rgb32FImage, RgbImage};

#[test]
fn matrix_rejects_mismatched_buffer() {
    let err = GrayscaleMatrix::new(vec![0.0; 5], 2, 3).err().unwrap();
    assert_eq!(err, TriggerError::BufferLength { needed: 6, got: 5 });

    let err = GrayscaleMatrix::new(Vec::new(), 0, 3).err().unwrap();
    assert_eq!(
        err,
        TriggerError::InvalidDimensions {
            width: 0,
            height: 3,
        }
    );
}

#[test]
fn matrix_crop_matches_expected_values() {
    let data: Vec<f32> = (0..16).map(|v| v as f32 / 15.0).collect();
    let matrix = GrayscaleMatrix::new(data, 4, 4).unwrap();
    let crop = matrix.crop(1, 2, 2, 2).unwrap();
    assert_eq!(crop.width(), 2);
    assert_eq!(crop.height(), 2);
    assert_eq!(crop.get(0, 0), matrix.get(1, 2));
    assert_eq!(crop.row(1), Some(&matrix.as_slice()[13..15]));
    assert!(matrix.crop(3, 3, 2, 2).is_err());
}

#[test]
fn normalize_reduces_color_to_luminance() {
    let white = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
    let black = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
    let white = normalize(&DynamicImage::ImageRgb8(white));
    let black = normalize(&DynamicImage::ImageRgb8(black));
    assert!(white.as_slice().iter().all(|&v| v == 1.0));
    assert!(black.as_slice().iter().all(|&v| v == 0.0));

    let pixel = RgbImage::from_pixel(1, 1, Rgb([128, 128, 128]));
    let gray = normalize(&DynamicImage::ImageRgb8(pixel));
    assert!((gray.as_slice()[0] - 128.0 / 255.0).abs() < 2.0 / 255.0);
}

#[test]
fn normalize_clamps_float_samples() {
    let mut img = Rgb32FImage::new(3, 1);
    img.put_pixel(0, 0, Rgb([-0.5, -0.5, -0.5]));
    img.put_pixel(1, 0, Rgb([0.25, 0.25, 0.25]));
    img.put_pixel(2, 0, Rgb([4.0, 4.0, 4.0]));
    let matrix = normalize(&DynamicImage::ImageRgb32F(img));
    let samples = matrix.as_slice();
    assert_eq!(samples[0], 0.0);
    assert!((samples[1] - 0.25).abs() < 1e-3);
    assert_eq!(samples[2], 1.0);
}

#[test]
fn rectangle_accessors() {
    let rect = Rectangle::new(375, 160, 550, 950).unwrap();
    assert_eq!((rect.x(), rect.y(), rect.width(), rect.height()), (375, 160, 550, 950));
    assert_eq!(rect.to_string(), "550x950 at (375, 160)");
}

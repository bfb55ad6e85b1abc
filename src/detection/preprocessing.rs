use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma, Rgba};

use crate::error::{DetectionError, Result};

/// Reject rasters with no pixels
pub fn ensure_non_empty(img: &DynamicImage) -> Result<()> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectionError::InvalidImage(format!(
            "image has zero-sized dimensions {}x{}",
            width, height
        )));
    }
    Ok(())
}

/// Scale down to fit `max_width` x `max_height`, keeping the aspect ratio.
/// Smaller images are returned unchanged.
pub fn fit_within(img: &DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img.clone();
    }

    let scale = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
    let scaled_w = ((width as f32 * scale) as u32).max(1);
    let scaled_h = ((height as f32 * scale) as u32).max(1);

    DynamicImage::ImageRgba8(image::imageops::resize(
        img,
        scaled_w,
        scaled_h,
        FilterType::CatmullRom,
    ))
}

/// BT.601 luma of a pixel composited over a white sheet.
/// Fully transparent pixels read as paper.
pub fn luma_over_white(pixel: Rgba<u8>) -> f32 {
    let [r, g, b, a] = pixel.0;
    let alpha = a as f32 / 255.0;
    let over_white = |c: u8| c as f32 * alpha + 255.0 * (1.0 - alpha);
    0.299 * over_white(r) + 0.587 * over_white(g) + 0.114 * over_white(b)
}

/// Contrast stretch around mid-gray: `(v - 128) * gain + 128`, clamped and
/// rounded once.
pub fn stretch(luma: f32, gain: f32) -> u8 {
    ((luma - 128.0) * gain + 128.0).round().clamp(0.0, 255.0) as u8
}

/// Single-channel intensity with the contrast stretch applied to the
/// unrounded luma.
pub fn to_intensity(img: &DynamicImage, gain: f32) -> GrayImage {
    let rgba = img.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        Luma([stretch(luma_over_white(*rgba.get_pixel(x, y)), gain)])
    })
}

/// Full preprocessing: validation, grayscale, contrast.
pub fn preprocess(img: &DynamicImage, gain: f32) -> Result<GrayImage> {
    ensure_non_empty(img)?;
    Ok(to_intensity(img, gain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, RgbaImage};

    use crate::detection::mask::build_mask;

    #[test]
    fn test_luma_weights() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([255, 0, 0])));
        assert_eq!(to_intensity(&img, 1.0).get_pixel(0, 0)[0], 76);
    }

    #[test]
    fn test_contrast_clamps() {
        assert_eq!(stretch(0.0, 1.2), 0);
        assert_eq!(stretch(128.0, 1.2), 128);
        assert_eq!(stretch(250.0, 1.2), 255);
    }

    #[test]
    fn test_stretch_uses_unrounded_luma() {
        // luma 170.57 stretches to 179.08; rounding luma first would give 180
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([170, 170, 175])));
        let gray = preprocess(&img, 1.2).expect("non-empty image");
        assert_eq!(gray.get_pixel(0, 0)[0], 179);
        assert!(build_mask(&gray, 180).get(0, 0));
    }

    #[test]
    fn test_transparent_pixels_are_paper() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let gray = preprocess(&DynamicImage::ImageRgba8(img), 1.2).expect("non-empty image");
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 0);

        let mask = build_mask(&gray, 180);
        assert!(!mask.get(0, 0));
        assert!(mask.get(1, 0));
    }

    #[test]
    fn test_fit_within_keeps_aspect() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let fitted = fit_within(&img, 100, 100);
        assert_eq!(fitted.dimensions(), (100, 50));
    }

    #[test]
    fn test_zero_sized_rejected() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        assert!(matches!(
            preprocess(&img, 1.2),
            Err(DetectionError::InvalidImage(_))
        ));
    }
}

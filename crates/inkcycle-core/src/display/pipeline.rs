//! Frame preparation: orientation, crop-and-resize, enhancement, hashing.
//!
//! Every step is deterministic so identical plugin output always hashes to
//! the same value, which is what write deduplication relies on.

use crate::config::{Config, ImageEnhancement, Resolution};
use crate::types::Orientation;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use sha2::{Digest, Sha256};

/// Image flag that anchors the crop at the top-left instead of centering it.
pub const KEEP_WIDTH: &str = "keep-width";

/// Device-level output parameters, fixed for the lifetime of a panel.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayProfile {
    pub resolution: Resolution,
    pub orientation: Orientation,
    pub inverted: bool,
    pub enhancement: ImageEnhancement,
}

impl DisplayProfile {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resolution: config.resolution,
            orientation: config.orientation,
            inverted: config.inverted_image,
            enhancement: config.image_settings,
        }
    }
}

impl Default for DisplayProfile {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            orientation: Orientation::Horizontal,
            inverted: false,
            enhancement: ImageEnhancement::default(),
        }
    }
}

/// Run the full pipeline and return the frame the panel would receive.
pub fn process(image: &DynamicImage, profile: &DisplayProfile, image_settings: &[String]) -> RgbImage {
    let keep_width = image_settings.iter().any(|s| s == KEEP_WIDTH);
    let rotated = change_orientation(image.clone(), profile.orientation, profile.inverted);
    let resized = resize_image(rotated, profile.resolution, keep_width);
    apply_enhancement(resized.to_rgb8(), &profile.enhancement)
}

/// Rotate counter-clockwise: 90° for a vertical panel, plus 180° when inverted.
pub fn change_orientation(image: DynamicImage, orientation: Orientation, inverted: bool) -> DynamicImage {
    let mut angle = match orientation {
        Orientation::Horizontal => 0,
        Orientation::Vertical => 90,
    };
    if inverted {
        angle = (angle + 180) % 360;
    }
    match angle {
        90 => image.rotate270(),
        180 => image.rotate180(),
        270 => image.rotate90(),
        _ => image,
    }
}

/// Crop to the target aspect ratio, then resize to exactly `target`.
pub fn resize_image(image: DynamicImage, target: Resolution, keep_width: bool) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if (width, height) == (target.width, target.height) {
        return image;
    }
    if width == 0 || height == 0 || target.width == 0 || target.height == 0 {
        return DynamicImage::ImageRgb8(RgbImage::new(target.width, target.height));
    }

    let image_ratio = f64::from(width) / f64::from(height);
    let target_ratio = f64::from(target.width) / f64::from(target.height);

    let (mut x, mut y, mut crop_w, mut crop_h) = (0, 0, width, height);
    if image_ratio > target_ratio {
        crop_w = ((f64::from(height) * target_ratio) as u32).clamp(1, width);
        if !keep_width {
            x = (width - crop_w) / 2;
        }
    } else {
        crop_h = ((f64::from(width) / target_ratio) as u32).clamp(1, height);
        if !keep_width {
            y = (height - crop_h) / 2;
        }
    }

    image
        .crop_imm(x, y, crop_w, crop_h)
        .resize_exact(target.width, target.height, FilterType::Lanczos3)
}

/// Apply brightness, contrast, saturation and sharpness, in that order.
/// Each factor blends between a degenerate image (factor 0.0) and the
/// original (factor 1.0); values above 1.0 extrapolate.
pub fn apply_enhancement(mut image: RgbImage, enhancement: &ImageEnhancement) -> RgbImage {
    if enhancement.brightness != 1.0 {
        let f = enhancement.brightness;
        for px in image.pixels_mut() {
            *px = Rgb(px.0.map(|c| blend(0.0, f32::from(c), f)));
        }
    }

    if enhancement.contrast != 1.0 {
        let f = enhancement.contrast;
        let mean = mean_luma(&image);
        for px in image.pixels_mut() {
            *px = Rgb(px.0.map(|c| blend(mean, f32::from(c), f)));
        }
    }

    if enhancement.saturation != 1.0 {
        let f = enhancement.saturation;
        for px in image.pixels_mut() {
            let gray = luma(px);
            *px = Rgb(px.0.map(|c| blend(gray, f32::from(c), f)));
        }
    }

    if enhancement.sharpness != 1.0 {
        let f = enhancement.sharpness;
        let smooth: RgbImage = imageops::filter3x3(
            &image,
            &[
                1.0 / 13.0,
                1.0 / 13.0,
                1.0 / 13.0,
                1.0 / 13.0,
                5.0 / 13.0,
                1.0 / 13.0,
                1.0 / 13.0,
                1.0 / 13.0,
                1.0 / 13.0,
            ],
        );
        for (px, soft) in image.pixels_mut().zip(smooth.pixels()) {
            let mut out = px.0;
            for (c, s) in out.iter_mut().zip(soft.0) {
                *c = blend(f32::from(s), f32::from(*c), f);
            }
            *px = Rgb(out);
        }
    }

    image
}

/// SHA-256 over the RGB8 pixel bytes, lowercase hex.
pub fn compute_image_hash(image: &RgbImage) -> String {
    let digest = Sha256::digest(image.as_raw());
    format!("{digest:x}")
}

fn blend(degenerate: f32, original: f32, factor: f32) -> u8 {
    (degenerate + (original - degenerate) * factor)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn luma(px: &Rgb<u8>) -> f32 {
    let [r, g, b] = px.0;
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

fn mean_luma(image: &RgbImage) -> f32 {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return 0.0;
    }
    let total: f64 = image.pixels().map(|px| f64::from(luma(px))).sum();
    (total / count as f64).round() as f32
}

//! Image preprocessing transforms applied before text recognition.
//!
//! Each transform is a pure function on a [`DynamicImage`]: it returns a new
//! image, never mutates its input, and is deterministic. `denoise` and
//! `adaptive_threshold` preserve image dimensions exactly; `deskew` preserves
//! the canvas size and resamples the content.

use image::{DynamicImage, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Preprocessing variant applied to a page image before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocessing {
    /// No transform; the page is recognized as-is.
    None,
    /// Median-filter speckle removal.
    Denoise,
    /// Adaptive binarization against a local Gaussian mean.
    Threshold,
    /// Rotation correction from the ink bounding rectangle.
    Deskew,
}

impl Preprocessing {
    /// All variants, in the order used by augmentation mode.
    pub const ALL: [Preprocessing; 4] = [
        Preprocessing::None,
        Preprocessing::Denoise,
        Preprocessing::Threshold,
        Preprocessing::Deskew,
    ];

    /// Stable label used in checkpoint metadata and CLI arguments.
    pub fn label(&self) -> &'static str {
        match self {
            Preprocessing::None => "none",
            Preprocessing::Denoise => "denoise",
            Preprocessing::Threshold => "threshold",
            Preprocessing::Deskew => "deskew",
        }
    }

    /// Apply this transform to an image.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        match self {
            Preprocessing::None => image.clone(),
            Preprocessing::Denoise => denoise(image),
            Preprocessing::Threshold => adaptive_threshold(image),
            Preprocessing::Deskew => deskew(image),
        }
    }
}

impl std::str::FromStr for Preprocessing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Preprocessing::None),
            "denoise" => Ok(Preprocessing::Denoise),
            "threshold" => Ok(Preprocessing::Threshold),
            "deskew" => Ok(Preprocessing::Deskew),
            other => Err(format!("unknown preprocessing variant: {}", other)),
        }
    }
}

/// Remove salt-and-pepper noise with a 3x3 median filter on the grayscale
/// channel. Edge pixels use clamped neighborhoods.
pub fn denoise(image: &DynamicImage) -> DynamicImage {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    let mut result = GrayImage::new(width, height);

    let mut window = [0u8; 9];
    for y in 0..height {
        for x in 0..width {
            let mut n = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                    window[n] = gray.get_pixel(sx, sy)[0];
                    n += 1;
                }
            }
            window.sort_unstable();
            result.put_pixel(x, y, Luma([window[4]]));
        }
    }

    DynamicImage::ImageLuma8(result)
}

/// Block size for the adaptive threshold neighborhood. Must be odd.
const THRESHOLD_BLOCK: usize = 11;
/// Constant subtracted from the local weighted mean.
const THRESHOLD_C: f32 = 2.0;

/// Binarize with a per-pixel threshold computed from a Gaussian-weighted
/// local mean minus a small constant. Robust to uneven lighting where a
/// single global cutoff is not.
pub fn adaptive_threshold(image: &DynamicImage) -> DynamicImage {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    let kernel = gaussian_kernel(THRESHOLD_BLOCK);
    let half = (THRESHOLD_BLOCK / 2) as i64;

    // Separable Gaussian: horizontal pass, then vertical.
    let mut horizontal = vec![0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as i64 + k as i64 - half).clamp(0, width as i64 - 1) as u32;
                sum += weight * gray.get_pixel(sx, y)[0] as f32;
            }
            horizontal[(y * width + x) as usize] = sum;
        }
    }

    let mut result = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut mean = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - half).clamp(0, height as i64 - 1) as u32;
                mean += weight * horizontal[(sy * width + x) as usize];
            }
            let value = if gray.get_pixel(x, y)[0] as f32 > mean - THRESHOLD_C {
                255
            } else {
                0
            };
            result.put_pixel(x, y, Luma([value]));
        }
    }

    DynamicImage::ImageLuma8(result)
}

/// Normalized 1-D Gaussian kernel of odd size, sigma chosen the way OpenCV
/// derives it from the kernel size.
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as f32;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half;
            (-d * d / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= total;
    }
    kernel
}

/// Detect and correct document skew.
///
/// Finds the minimal-area rectangle enclosing all ink pixels of the inverted
/// grayscale, derives the rotation angle from that rectangle (folded into
/// [-45, 45)), and rotates the original image about its center with bilinear
/// sampling and edge-replicating border fill.
pub fn deskew(image: &DynamicImage) -> DynamicImage {
    let gray = image.to_luma8();

    // Ink is foreground after inversion: anything not pure white counts.
    let mut points: Vec<(f32, f32)> = Vec::new();
    for (x, y, pixel) in gray.enumerate_pixels() {
        if 255 - pixel[0] > 0 {
            points.push((x as f32, y as f32));
        }
    }

    if points.len() < 3 {
        return image.clone();
    }

    let raw_angle = min_area_rect_angle(&points);
    let angle = if raw_angle < -45.0 {
        -(90.0 + raw_angle)
    } else {
        -raw_angle
    };

    debug!("Deskew: raw angle {:.2}, corrected {:.2}", raw_angle, angle);

    rotate_about_center(image, angle)
}

/// Angle of the minimal-area bounding rectangle over a point set, in the
/// OpenCV `minAreaRect` convention: degrees in [-90, 0).
fn min_area_rect_angle(points: &[(f32, f32)]) -> f32 {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return -90.0;
    }

    let mut best_area = f32::INFINITY;
    let mut best_theta = 0f32;

    // Rotating calipers: the minimal rectangle has one side collinear with
    // a hull edge.
    for i in 0..hull.len() {
        let (x1, y1) = hull[i];
        let (x2, y2) = hull[(i + 1) % hull.len()];
        let theta = (y2 - y1).atan2(x2 - x1);
        let (cos, sin) = (theta.cos(), theta.sin());

        let mut min_u = f32::INFINITY;
        let mut max_u = f32::NEG_INFINITY;
        let mut min_v = f32::INFINITY;
        let mut max_v = f32::NEG_INFINITY;
        for &(px, py) in &hull {
            let u = px * cos + py * sin;
            let v = -px * sin + py * cos;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if area < best_area {
            best_area = area;
            best_theta = theta;
        }
    }

    // Fold the edge direction into [0, 90) degrees, then shift to [-90, 0).
    let mut degrees = best_theta.to_degrees() % 90.0;
    if degrees < 0.0 {
        degrees += 90.0;
    }
    degrees - 90.0
}

/// Andrew monotone chain convex hull, counter-clockwise, no duplicate
/// endpoint.
fn convex_hull(points: &[(f32, f32)]) -> Vec<(f32, f32)> {
    let mut sorted: Vec<(f32, f32)> = points.to_vec();
    sorted.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    });
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let cross = |o: (f32, f32), a: (f32, f32), b: (f32, f32)| -> f32 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut hull: Vec<(f32, f32)> = Vec::with_capacity(sorted.len() * 2);
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }

    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev() {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }

    hull.pop();
    hull
}

/// Rotate an image about its center by `angle` degrees with bilinear
/// sampling. Out-of-bounds source coordinates are clamped, which replicates
/// the border instead of filling with a constant.
fn rotate_about_center(image: &DynamicImage, angle: f32) -> DynamicImage {
    if angle.abs() < f32::EPSILON {
        return image.clone();
    }

    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);

    let radians = angle.to_radians();
    let (cos, sin) = (radians.cos(), radians.sin());

    let mut result = image::RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            // Inverse mapping: where does this output pixel come from?
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let sx = cos * dx + sin * dy + cx;
            let sy = -sin * dx + cos * dy + cy;
            result.put_pixel(x, y, bilinear_clamped(&rgb, sx, sy));
        }
    }

    DynamicImage::ImageRgb8(result)
}

fn bilinear_clamped(image: &image::RgbImage, x: f32, y: f32) -> image::Rgb<u8> {
    let (width, height) = image.dimensions();
    let clamp_x = |v: i64| v.clamp(0, width as i64 - 1) as u32;
    let clamp_y = |v: i64| v.clamp(0, height as i64 - 1) as u32;

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = image.get_pixel(clamp_x(x0), clamp_y(y0));
    let p10 = image.get_pixel(clamp_x(x0 + 1), clamp_y(y0));
    let p01 = image.get_pixel(clamp_x(x0), clamp_y(y0 + 1));
    let p11 = image.get_pixel(clamp_x(x0 + 1), clamp_y(y0 + 1));

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    image::Rgb(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn speckled_page() -> DynamicImage {
        let mut img = GrayImage::from_pixel(64, 48, Luma([255]));
        // A dark text band with a few isolated speckles elsewhere.
        for x in 10..50 {
            for y in 20..24 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        img.put_pixel(5, 5, Luma([0]));
        img.put_pixel(60, 40, Luma([0]));
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_denoise_preserves_dimensions() {
        let input = speckled_page();
        let output = denoise(&input);
        assert_eq!(output.width(), input.width());
        assert_eq!(output.height(), input.height());
    }

    #[test]
    fn test_denoise_removes_isolated_speckles() {
        let output = denoise(&speckled_page()).to_luma8();
        // Lone dark pixels surrounded by white take the white median.
        assert_eq!(output.get_pixel(5, 5)[0], 255);
        assert_eq!(output.get_pixel(60, 40)[0], 255);
        // The solid band survives.
        assert_eq!(output.get_pixel(30, 22)[0], 20);
    }

    #[test]
    fn test_adaptive_threshold_is_binary() {
        let output = adaptive_threshold(&speckled_page()).to_luma8();
        for pixel in output.pixels() {
            assert!(pixel[0] == 0 || pixel[0] == 255);
        }
    }

    #[test]
    fn test_transforms_are_deterministic() {
        let input = speckled_page();
        for variant in Preprocessing::ALL {
            let a = variant.apply(&input).to_luma8();
            let b = variant.apply(&input).to_luma8();
            assert_eq!(a.as_raw(), b.as_raw(), "variant {:?}", variant);
        }
    }

    #[test]
    fn test_deskew_blank_image_is_identity() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([255])));
        let output = deskew(&blank);
        assert_eq!(output.width(), 32);
        assert_eq!(output.height(), 32);
    }

    #[test]
    fn test_deskew_axis_aligned_content_stays_put() {
        // An axis-aligned rectangle has a min-area rect at -90 degrees,
        // which folds to a zero correction.
        let mut img = GrayImage::from_pixel(60, 40, Luma([255]));
        for x in 10..50 {
            for y in 15..25 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let input = DynamicImage::ImageLuma8(img);
        let output = deskew(&input).to_luma8();
        assert_eq!(output.get_pixel(30, 20)[0], 0);
        assert_eq!(output.get_pixel(5, 5)[0], 255);
    }

    #[test]
    fn test_angle_folding_convention() {
        // Points along a perfect horizontal strip: min-area rect angle is
        // -90 in the OpenCV convention.
        let points: Vec<(f32, f32)> = (0..100)
            .flat_map(|x| (0..5).map(move |y| (x as f32, y as f32)))
            .collect();
        let raw = min_area_rect_angle(&points);
        assert!(raw >= -90.0 && raw < 0.0, "raw angle {}", raw);
        let corrected = if raw < -45.0 { -(90.0 + raw) } else { -raw };
        assert!(corrected.abs() < 1.0, "corrected {}", corrected);
    }

    #[test]
    fn test_preprocessing_labels_roundtrip() {
        for variant in Preprocessing::ALL {
            let parsed: Preprocessing = variant.label().parse().unwrap();
            assert_eq!(parsed, variant);
        }
    }
}

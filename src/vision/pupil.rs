use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Pupil centroid in the eye crop's local pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PupilEstimate {
    pub cx: f64,
    pub cy: f64,
}

/// Locate the pupil as the centroid of the eye's darkest pixels.
///
/// A pixel is foreground when its value is at or below
/// `floor(mean * threshold_ratio)`. Returns `None` when nothing is dark
/// enough, which callers treat as "this eye contributes no score".
pub fn estimate_pupil(eye: &GrayImage, threshold_ratio: f64) -> Option<PupilEstimate> {
    let pixel_count = eye.width() as u64 * eye.height() as u64;
    if pixel_count == 0 {
        return None;
    }

    let intensity_sum: u64 = eye.pixels().map(|p| p[0] as u64).sum();
    let mean = intensity_sum as f64 / pixel_count as f64;
    let threshold = (mean * threshold_ratio).floor();

    let mut sum_x = 0u64;
    let mut sum_y = 0u64;
    let mut count = 0u64;
    for (x, y, pixel) in eye.enumerate_pixels() {
        if pixel[0] as f64 <= threshold {
            sum_x += x as u64;
            sum_y += y as u64;
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }

    Some(PupilEstimate {
        cx: sum_x as f64 / count as f64,
        cy: sum_y as f64 / count as f64,
    })
}

//! Detection geometry shared by the detector boundary and the scorer.

use image::{GrayImage, ImageBuffer};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates of its parent image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    /// Intersection with a `width` x `height` image, or `None` when nothing
    /// of the rectangle lies inside it.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Rect::new(self.x, self.y, w, h))
    }
}

/// Which detector pathway produced a face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceTier {
    Frontal,
    /// Side-on face; weaker evidence of attentiveness than a frontal hit.
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceDetection {
    pub rect: Rect,
    pub tier: ConfidenceTier,
}

impl FaceDetection {
    pub fn frontal(rect: Rect) -> Self {
        Self {
            rect,
            tier: ConfidenceTier::Frontal,
        }
    }

    pub fn profile(rect: Rect) -> Self {
        Self {
            rect,
            tier: ConfidenceTier::Profile,
        }
    }
}

/// Eye rectangle in the coordinate frame of its parent face crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeDetection {
    pub rect: Rect,
}

impl EyeDetection {
    pub fn new(rect: Rect) -> Self {
        Self { rect }
    }
}

/// Copy the part of `rect` that falls inside `image`.
///
/// Rectangles hanging off the edge are clipped the way array slicing clips;
/// `None` means the crop would be empty.
pub fn crop(image: &GrayImage, rect: &Rect) -> Option<GrayImage> {
    let clipped = rect.clip_to(image.width(), image.height())?;
    let sub: GrayImage = ImageBuffer::from_fn(clipped.width, clipped.height, |x, y| {
        *image.get_pixel(clipped.x + x, clipped.y + y)
    });
    Some(sub)
}

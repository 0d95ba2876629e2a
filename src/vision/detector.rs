//! Boundary to the external face/eye detector.
//!
//! The engine never finds faces itself. A `Detector` is handed the equalized
//! grayscale frame and returns rectangles; the scorer takes it from there.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::geometry::{EyeDetection, FaceDetection, Rect};

pub trait Detector: Send + Sync {
    /// Faces in `frame`. Implementations try the frontal pathway first and
    /// fall back to profile detections only when no frontal face is found.
    fn detect_faces(&self, frame: &GrayImage) -> Vec<FaceDetection>;

    /// Eyes inside `face`, a crop of the frame at the face rectangle.
    /// `face_index` is the position of that face in `detect_faces`' output.
    fn detect_eyes(&self, face: &GrayImage, face_index: usize) -> Vec<EyeDetection>;
}

/// Face with the eyes found inside it, as produced by an offline detector run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub rect: Option<Rect>,
    #[serde(default)]
    pub eyes: Vec<Rect>,
}

/// Detector output captured ahead of time, split by pathway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecomputedDetector {
    #[serde(default)]
    pub frontal: Vec<DetectedFace>,
    #[serde(default)]
    pub profile: Vec<DetectedFace>,
}

impl PrecomputedDetector {
    pub fn new(frontal: Vec<DetectedFace>, profile: Vec<DetectedFace>) -> Self {
        Self { frontal, profile }
    }

    fn active(&self) -> (&[DetectedFace], bool) {
        if self.frontal.iter().any(|face| face.rect.is_some()) {
            (self.frontal.as_slice(), true)
        } else {
            (self.profile.as_slice(), false)
        }
    }
}

impl Detector for PrecomputedDetector {
    fn detect_faces(&self, _frame: &GrayImage) -> Vec<FaceDetection> {
        let (faces, frontal) = self.active();
        faces
            .iter()
            .filter_map(|face| face.rect)
            .map(|rect| {
                if frontal {
                    FaceDetection::frontal(rect)
                } else {
                    FaceDetection::profile(rect)
                }
            })
            .collect()
    }

    fn detect_eyes(&self, _face: &GrayImage, face_index: usize) -> Vec<EyeDetection> {
        let (faces, _) = self.active();
        faces
            .iter()
            .filter(|face| face.rect.is_some())
            .nth(face_index)
            .map(|face| face.eyes.iter().copied().map(EyeDetection::new).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::geometry::ConfidenceTier;

    fn face(x: u32, eyes: Vec<Rect>) -> DetectedFace {
        DetectedFace {
            rect: Some(Rect::new(x, 0, 10, 10)),
            eyes,
        }
    }

    #[test]
    fn frontal_wins_over_profile() {
        let detector = PrecomputedDetector::new(vec![face(1, vec![])], vec![face(5, vec![])]);
        let faces = detector.detect_faces(&GrayImage::new(1, 1));
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].tier, ConfidenceTier::Frontal);
        assert_eq!(faces[0].rect.x, 1);
    }

    #[test]
    fn profile_is_fallback() {
        let eye = Rect::new(1, 1, 3, 3);
        let detector = PrecomputedDetector::new(vec![], vec![face(5, vec![eye])]);
        let frame = GrayImage::new(1, 1);
        let faces = detector.detect_faces(&frame);
        assert_eq!(faces[0].tier, ConfidenceTier::Profile);
        assert_eq!(detector.detect_eyes(&frame, 0), vec![EyeDetection::new(eye)]);
        assert!(detector.detect_eyes(&frame, 1).is_empty());
    }

    #[test]
    fn parses_camel_case_json() {
        let detector: PrecomputedDetector = serde_json::from_str(
            r#"{"frontal":[{"rect":{"x":0,"y":0,"width":4,"height":4},"eyes":[]}]}"#,
        )
        .unwrap();
        assert!(detector.profile.is_empty());
        assert_eq!(detector.detect_faces(&GrayImage::new(1, 1)).len(), 1);
    }
}

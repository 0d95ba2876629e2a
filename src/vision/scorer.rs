use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::{
    detector::Detector,
    geometry::{crop, ConfidenceTier, EyeDetection, FaceDetection, Rect},
    pupil::{estimate_pupil, PupilEstimate},
};

/// Tunable constants for attention scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the best face score in the final blend.
    pub face_weight: f64,
    /// Weight of the mean eye score in the final blend.
    pub eye_weight: f64,
    /// Face area / frame area that earns a full size score.
    pub optimal_face_area_ratio: f64,
    /// Size score lost per unit of area-ratio deviation.
    pub size_penalty: f64,
    /// Face score recorded for profile-only detections before geometry runs.
    pub profile_fallback_score: f64,
    /// Fraction of mean eye intensity below which pixels count as pupil.
    pub pupil_threshold_ratio: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            face_weight: 0.4,
            eye_weight: 0.6,
            optimal_face_area_ratio: 0.10,
            size_penalty: 5.0,
            profile_fallback_score: 0.5,
            pupil_threshold_ratio: 0.7,
        }
    }
}

/// How a frame's score was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreBasis {
    NoFace,
    /// Face found but no eye yielded a pupil.
    FaceOnly,
    FaceAndEyes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionBreakdown {
    pub score: f64,
    pub basis: ScoreBasis,
    pub face_score: f64,
    pub eye_scores: Vec<f64>,
    pub tier: Option<ConfidenceTier>,
    pub face_count: usize,
}

impl AttentionBreakdown {
    pub fn no_face() -> Self {
        Self {
            score: 0.0,
            basis: ScoreBasis::NoFace,
            face_score: 0.0,
            eye_scores: Vec::new(),
            tier: None,
            face_count: 0,
        }
    }
}

/// How centered the face is: 1 at the frame center, 0 at a corner.
/// Offsets are normalized by half the frame size per axis. Not clamped.
pub fn position_score(face: &Rect, frame_width: u32, frame_height: u32) -> f64 {
    let (face_cx, face_cy) = face.center();
    let half_w = frame_width as f64 / 2.0;
    let half_h = frame_height as f64 / 2.0;
    let dx = (face_cx - half_w).abs() / half_w;
    let dy = (face_cy - half_h).abs() / half_h;
    1.0 - (dx + dy) / 2.0
}

/// How close the face's share of the frame is to the optimal ratio. Not
/// clamped, so a face covering most of the frame scores below zero.
pub fn size_score(face: &Rect, frame_width: u32, frame_height: u32, config: &ScoringConfig) -> f64 {
    let frame_area = frame_width as f64 * frame_height as f64;
    let ratio = face.area() / frame_area;
    1.0 - (ratio - config.optimal_face_area_ratio).abs() * config.size_penalty
}

pub fn face_combined_score(
    face: &Rect,
    frame_width: u32,
    frame_height: u32,
    config: &ScoringConfig,
) -> f64 {
    let position = position_score(face, frame_width, frame_height);
    let size = size_score(face, frame_width, frame_height, config);
    (position + size) / 2.0
}

/// How centered the pupil sits inside its eye box.
pub fn eye_centering_score(pupil: &PupilEstimate, eye: &Rect) -> f64 {
    let half_w = eye.width as f64 / 2.0;
    let half_h = eye.height as f64 / 2.0;
    let dx = (pupil.cx - half_w).abs() / half_w;
    let dy = (pupil.cy - half_h).abs() / half_h;
    1.0 - (dx + dy) / 2.0
}

#[derive(Debug, Clone, Default)]
pub struct GeometricScorer {
    config: ScoringConfig,
}

impl GeometricScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Run `detector` over `frame` and score the result.
    pub fn score_frame(&self, frame: &GrayImage, detector: &dyn Detector) -> AttentionBreakdown {
        let faces = detector.detect_faces(frame);
        if faces.is_empty() {
            return AttentionBreakdown::no_face();
        }

        let eyes_per_face: Vec<Vec<EyeDetection>> = faces
            .iter()
            .enumerate()
            .map(|(index, face)| match crop(frame, &face.rect) {
                Some(face_image) => detector.detect_eyes(&face_image, index),
                None => Vec::new(),
            })
            .collect();

        self.score(frame, &faces, &eyes_per_face)
    }

    /// Score already-detected faces and eyes against `frame`.
    ///
    /// `eyes_per_face[i]` holds the eyes of `faces[i]` in face-local
    /// coordinates; missing entries mean no eyes for that face.
    pub fn score(
        &self,
        frame: &GrayImage,
        faces: &[FaceDetection],
        eyes_per_face: &[Vec<EyeDetection>],
    ) -> AttentionBreakdown {
        let (frame_width, frame_height) = frame.dimensions();
        if faces.is_empty() || frame_width == 0 || frame_height == 0 {
            return AttentionBreakdown::no_face();
        }

        let tier = if faces.iter().all(|f| f.tier == ConfidenceTier::Profile) {
            ConfidenceTier::Profile
        } else {
            ConfidenceTier::Frontal
        };

        let mut face_score = match tier {
            ConfidenceTier::Profile => self.config.profile_fallback_score,
            ConfidenceTier::Frontal => 0.0,
        };
        // Geometry always overrides the fallback when a rectangle exists.
        if let Some(best) = faces
            .iter()
            .map(|f| face_combined_score(&f.rect, frame_width, frame_height, &self.config))
            .reduce(f64::max)
        {
            face_score = best;
        }

        let mut eye_scores = Vec::new();
        for (face, eyes) in faces.iter().zip(eyes_per_face.iter()) {
            if eyes.is_empty() {
                continue;
            }
            let Some(face_image) = crop(frame, &face.rect) else {
                continue;
            };
            for eye in eyes {
                let Some(eye_image) = crop(&face_image, &eye.rect) else {
                    continue;
                };
                if let Some(pupil) = estimate_pupil(&eye_image, self.config.pupil_threshold_ratio) {
                    eye_scores.push(eye_centering_score(&pupil, &eye.rect));
                }
            }
        }

        let (score, basis) = if eye_scores.is_empty() {
            (self.config.face_weight * face_score, ScoreBasis::FaceOnly)
        } else {
            let eye_avg = eye_scores.iter().sum::<f64>() / eye_scores.len() as f64;
            (
                self.config.face_weight * face_score + self.config.eye_weight * eye_avg,
                ScoreBasis::FaceAndEyes,
            )
        };

        AttentionBreakdown {
            score,
            basis,
            face_score,
            eye_scores,
            tier: Some(tier),
            face_count: faces.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::detector::{DetectedFace, PrecomputedDetector};
    use image::Luma;

    const EPS: f64 = 1e-9;

    // 200x100 frame; a 40x50 face at (80, 25) is centered and covers 10%.
    const CENTERED_FACE: Rect = Rect::new(80, 25, 40, 50);
    const EYE: Rect = Rect::new(10, 10, 11, 11);

    fn bright_frame() -> GrayImage {
        GrayImage::from_pixel(200, 100, Luma([200]))
    }

    /// Bright frame with a dark pupil at the center of `EYE` inside `CENTERED_FACE`.
    fn frame_with_pupil() -> GrayImage {
        let (px, py) = (80 + 10 + 5, 25 + 10 + 5);
        GrayImage::from_fn(200, 100, |x, y| {
            let dx = x as i64 - px;
            let dy = y as i64 - py;
            if dx * dx + dy * dy <= 4 {
                Luma([10])
            } else {
                Luma([200])
            }
        })
    }

    fn scorer() -> GeometricScorer {
        GeometricScorer::default()
    }

    #[test]
    fn no_faces_scores_zero() {
        let result = scorer().score(&bright_frame(), &[], &[]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.basis, ScoreBasis::NoFace);
    }

    #[test]
    fn centered_ideal_face_without_eyes_gets_partial_credit() {
        let faces = [FaceDetection::frontal(CENTERED_FACE)];
        let result = scorer().score(&bright_frame(), &faces, &[]);
        assert!((result.face_score - 1.0).abs() < EPS);
        assert!((result.score - 0.4).abs() < EPS);
        assert_eq!(result.basis, ScoreBasis::FaceOnly);
    }

    #[test]
    fn best_face_wins_over_average() {
        let off_center = Rect::new(0, 0, 20, 20);
        let faces = [
            FaceDetection::frontal(off_center),
            FaceDetection::frontal(CENTERED_FACE),
        ];
        let result = scorer().score(&bright_frame(), &faces, &[]);
        assert!((result.face_score - 1.0).abs() < EPS);
        assert_eq!(result.face_count, 2);
    }

    #[test]
    fn sub_scores_match_formulas() {
        let config = ScoringConfig::default();
        // Center (10, 10) on a 200x100 frame: dx = 0.9, dy = 0.8.
        let face = Rect::new(0, 0, 20, 20);
        assert!((position_score(&face, 200, 100) - (1.0 - (0.9 + 0.8) / 2.0)).abs() < EPS);
        // 400 / 20000 = 0.02 -> 1 - 0.08 * 5
        assert!((size_score(&face, 200, 100, &config) - 0.6).abs() < EPS);
    }

    #[test]
    fn oversized_face_is_not_clamped() {
        let whole_frame = Rect::new(0, 0, 200, 100);
        let faces = [FaceDetection::frontal(whole_frame)];
        let result = scorer().score(&bright_frame(), &faces, &[]);
        // position 1.0, size 1 - 0.9 * 5 = -3.5
        assert!((result.face_score - (-1.25)).abs() < EPS);
        assert!((result.score - (-0.5)).abs() < EPS);
    }

    #[test]
    fn centered_pupil_blends_face_and_eye() {
        let faces = [FaceDetection::frontal(CENTERED_FACE)];
        let eyes = vec![vec![EyeDetection::new(EYE)]];
        let result = scorer().score(&frame_with_pupil(), &faces, &eyes);

        // Pupil centroid lands on pixel 5 of an 11-wide box whose center is 5.5.
        let expected_eye = 1.0 - (0.5 / 5.5 + 0.5 / 5.5) / 2.0;
        assert_eq!(result.basis, ScoreBasis::FaceAndEyes);
        assert_eq!(result.eye_scores.len(), 1);
        assert!((result.eye_scores[0] - expected_eye).abs() < EPS);
        assert!((result.score - (0.4 * 1.0 + 0.6 * expected_eye)).abs() < EPS);
    }

    #[test]
    fn eye_without_pupil_falls_back_to_face_only() {
        let faces = [FaceDetection::frontal(CENTERED_FACE)];
        let eyes = vec![vec![EyeDetection::new(EYE)]];
        let result = scorer().score(&bright_frame(), &faces, &eyes);
        assert_eq!(result.basis, ScoreBasis::FaceOnly);
        assert!((result.score - 0.4).abs() < EPS);
    }

    #[test]
    fn profile_faces_are_scored_by_geometry() {
        let faces = [FaceDetection::profile(CENTERED_FACE)];
        let result = scorer().score(&bright_frame(), &faces, &[]);
        assert_eq!(result.tier, Some(ConfidenceTier::Profile));
        assert!((result.face_score - 1.0).abs() < EPS);
    }

    #[test]
    fn score_frame_consults_detector() {
        let detector = PrecomputedDetector::new(
            vec![DetectedFace {
                rect: Some(CENTERED_FACE),
                eyes: vec![EYE],
            }],
            vec![],
        );
        let direct = scorer().score(
            &frame_with_pupil(),
            &[FaceDetection::frontal(CENTERED_FACE)],
            &[vec![EyeDetection::new(EYE)]],
        );
        let via_detector = scorer().score_frame(&frame_with_pupil(), &detector);
        assert_eq!(via_detector, direct);
    }

    #[test]
    fn empty_detector_scores_zero() {
        let result = scorer().score_frame(&bright_frame(), &PrecomputedDetector::default());
        assert_eq!(result, AttentionBreakdown::no_face());
    }
}

pub mod detector;
pub mod frame;
pub mod geometry;
pub mod pupil;
pub mod scorer;

pub use detector::{DetectedFace, Detector, PrecomputedDetector};
pub use frame::{decode_data_url, decode_frame};
pub use geometry::{ConfidenceTier, EyeDetection, FaceDetection, Rect};
pub use pupil::{estimate_pupil, PupilEstimate};
pub use scorer::{AttentionBreakdown, GeometricScorer, ScoreBasis, ScoringConfig};

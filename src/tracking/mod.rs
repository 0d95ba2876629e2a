pub mod participant;
pub mod snapshot;
pub mod tracker;
pub mod window;

pub use participant::{normalize_participant, ParticipantKey, UNKNOWN_PARTICIPANT};
pub use snapshot::{SessionSnapshot, SnapshotWriter};
pub use tracker::{
    parse_client_timestamp, AttentionTracker, FrameImage, FrameOutcome, FrameRequest, FrameResult,
};
pub use window::{LiveAttention, SessionWindow};

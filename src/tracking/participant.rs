use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity used when a frame carries no usable participant identifier.
pub const UNKNOWN_PARTICIPANT: &str = "unknown";

/// Resolve a participant identity: first non-blank of `id` then `name`,
/// otherwise [`UNKNOWN_PARTICIPANT`].
pub fn normalize_participant(id: Option<&str>, name: Option<&str>) -> String {
    [id, name]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_PARTICIPANT)
        .to_string()
}

/// `(session, participant)` pair that keys all per-participant state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantKey {
    pub session_id: String,
    pub participant_id: String,
}

impl ParticipantKey {
    pub fn new(session_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            participant_id: participant_id.into(),
        }
    }

    /// Unknown participants never reach the daily aggregate.
    pub fn is_identified(&self) -> bool {
        self.participant_id != UNKNOWN_PARTICIPANT
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.participant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_id_then_name() {
        assert_eq!(normalize_participant(Some("a@x.io"), Some("b@x.io")), "a@x.io");
        assert_eq!(normalize_participant(None, Some("b@x.io")), "b@x.io");
        assert_eq!(normalize_participant(Some("  "), Some("b@x.io")), "b@x.io");
    }

    #[test]
    fn blank_identity_becomes_unknown() {
        assert_eq!(normalize_participant(None, None), UNKNOWN_PARTICIPANT);
        assert_eq!(normalize_participant(Some(""), Some("")), UNKNOWN_PARTICIPANT);
        assert!(!ParticipantKey::new("m", UNKNOWN_PARTICIPANT).is_identified());
        assert!(ParticipantKey::new("m", "a@x.io").is_identified());
    }
}

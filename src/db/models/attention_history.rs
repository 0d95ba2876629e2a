use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scored frame as written to the append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub session_id: String,
    pub participant_id: String,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
}

/// Point of a participant's attention time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionSample {
    pub timestamp: DateTime<Utc>,
    pub attention: f64,
}

//! Per-day running attention averages.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One row per `(session, participant, date)`, folded incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttention {
    pub id: i64,
    pub session_id: String,
    pub participant_id: String,
    pub date: NaiveDate,
    pub attention_sum: f64,
    pub attention_count: u64,
    /// `attention_sum / attention_count`, kept alongside for readers.
    pub running_average: f64,
    pub updated_at: DateTime<Utc>,
}

impl DailyAttention {
    pub fn attention_percent(&self) -> f64 {
        percent(self.attention_sum, self.attention_count)
    }
}

/// Running average for one participant across every recorded day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantAverage {
    pub participant_id: String,
    pub attention_sum: f64,
    pub attention_count: u64,
    pub running_average: f64,
}

impl ParticipantAverage {
    pub fn new(participant_id: String, attention_sum: f64, attention_count: u64) -> Self {
        let running_average = if attention_count == 0 {
            0.0
        } else {
            attention_sum / attention_count as f64
        };
        Self {
            participant_id,
            attention_sum,
            attention_count,
            running_average,
        }
    }

    pub fn attention_percent(&self) -> f64 {
        percent(self.attention_sum, self.attention_count)
    }
}

fn percent(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64 * 100.0
    }
}

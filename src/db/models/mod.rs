pub mod attention_history;
pub mod daily_attention;

pub use attention_history::{AttentionSample, HistoryEntry};
pub use daily_attention::{DailyAttention, ParticipantAverage};

use anyhow::Result;
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime, to_u64},
    models::{AttentionSample, HistoryEntry},
};

impl Database {
    /// Append one scored frame. Returns the new row id.
    pub async fn append_attention_history(&self, entry: &HistoryEntry) -> Result<i64> {
        let record = entry.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO attention_history (session_id, participant_id, timestamp, attention)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.session_id,
                    record.participant_id,
                    format_timestamp(&record.timestamp),
                    record.score,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Full time series for a participant, oldest first. Ties on timestamp
    /// keep insertion order.
    pub async fn attention_history(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<Vec<AttentionSample>> {
        let session_id = session_id.to_string();
        let participant_id = participant_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT timestamp, attention
                 FROM attention_history
                 WHERE session_id = ?1 AND participant_id = ?2
                 ORDER BY timestamp ASC, id ASC",
            )?;

            let mut rows = stmt.query(params![session_id, participant_id])?;
            let mut samples = Vec::new();
            while let Some(row) = rows.next()? {
                let timestamp: String = row.get(0)?;
                samples.push(AttentionSample {
                    timestamp: parse_datetime(&timestamp, "timestamp")?,
                    attention: row.get(1)?,
                });
            }

            Ok(samples)
        })
        .await
    }

    pub async fn count_attention_history(&self, session_id: &str) -> Result<u64> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM attention_history WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            to_u64(count, "attention_history count")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn entry(participant: &str, timestamp: DateTime<Utc>, score: f64) -> HistoryEntry {
        HistoryEntry {
            session_id: "m1".into(),
            participant_id: participant.into(),
            timestamp,
            score,
        }
    }

    #[tokio::test]
    async fn reads_back_in_timestamp_order() {
        let db = Database::in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        // Out-of-order arrival still reads back chronologically.
        for offset in [3, 1, 2, 0] {
            db.append_attention_history(&entry(
                "a@x.io",
                base + Duration::seconds(offset),
                offset as f64 / 10.0,
            ))
            .await
            .unwrap();
        }
        db.append_attention_history(&entry("b@x.io", base, 1.0))
            .await
            .unwrap();

        let samples = db.attention_history("m1", "a@x.io").await.unwrap();
        assert_eq!(samples.len(), 4);
        assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(samples[0].timestamp, base);
        assert_eq!(samples[3].attention, 0.3);

        let again = db.attention_history("m1", "a@x.io").await.unwrap();
        assert_eq!(again, samples);
        assert_eq!(db.count_attention_history("m1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn equal_timestamps_keep_arrival_order() {
        let db = Database::in_memory().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        for score in [0.1, 0.2, 0.3] {
            db.append_attention_history(&entry("a@x.io", ts, score))
                .await
                .unwrap();
        }
        let scores: Vec<f64> = db
            .attention_history("m1", "a@x.io")
            .await
            .unwrap()
            .iter()
            .map(|s| s.attention)
            .collect();
        assert_eq!(scores, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn unknown_key_reads_empty() {
        let db = Database::in_memory().unwrap();
        assert!(db.attention_history("m1", "ghost").await.unwrap().is_empty());
    }
}

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_date, format_timestamp, parse_date, parse_datetime, to_u64},
    models::{DailyAttention, ParticipantAverage},
};

const DAILY_COLUMNS: &str =
    "id, session_id, participant_id, date, attention_sum, attention_count, running_average, updated_at";

fn row_to_daily_attention(row: &Row) -> Result<DailyAttention> {
    let date: String = row.get("date")?;
    let attention_count: i64 = row.get("attention_count")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(DailyAttention {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        participant_id: row.get("participant_id")?,
        date: parse_date(&date, "date")?,
        attention_sum: row.get("attention_sum")?,
        attention_count: to_u64(attention_count, "attention_count")?,
        running_average: row.get("running_average")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn row_to_participant_average(row: &Row) -> Result<ParticipantAverage> {
    let attention_count: i64 = row.get("attention_count")?;
    Ok(ParticipantAverage::new(
        row.get("participant_id")?,
        row.get("attention_sum")?,
        to_u64(attention_count, "attention_count")?,
    ))
}

impl Database {
    /// Fold one score into the day's running average for the triple.
    ///
    /// A single upsert statement: the first score for a triple creates the
    /// row, later ones add to `attention_sum` and bump `attention_count`
    /// against the stored values, so no increment can be lost.
    pub async fn record_daily_attention(
        &self,
        session_id: &str,
        participant_id: &str,
        date: NaiveDate,
        score: f64,
        updated_at: DateTime<Utc>,
    ) -> Result<DailyAttention> {
        let session_id = session_id.to_string();
        let participant_id = participant_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "INSERT INTO daily_attention (session_id, participant_id, date, attention_sum, attention_count, running_average, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?4, ?5)
                 ON CONFLICT (session_id, participant_id, date) DO UPDATE
                 SET attention_sum = attention_sum + excluded.attention_sum,
                     attention_count = attention_count + 1,
                     running_average = (attention_sum + excluded.attention_sum) / (attention_count + 1),
                     updated_at = excluded.updated_at
                 RETURNING {DAILY_COLUMNS}"
            );
            let record = conn
                .query_row(
                    &sql,
                    params![
                        session_id,
                        participant_id,
                        format_date(&date),
                        score,
                        format_timestamp(&updated_at),
                    ],
                    |row| Ok(row_to_daily_attention(row)),
                )?
                .map_err(|e| anyhow!("Failed to parse daily attention: {}", e))?;
            Ok(record)
        })
        .await
    }

    pub async fn get_daily_attention(
        &self,
        session_id: &str,
        participant_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAttention>> {
        let session_id = session_id.to_string();
        let participant_id = participant_id.to_string();
        self.execute(move |conn| {
            let record = conn
                .query_row(
                    &format!(
                        "SELECT {DAILY_COLUMNS} FROM daily_attention
                         WHERE session_id = ?1 AND participant_id = ?2 AND date = ?3"
                    ),
                    params![session_id, participant_id, format_date(&date)],
                    |row| Ok(row_to_daily_attention(row)),
                )
                .optional()?
                .transpose()?;
            Ok(record)
        })
        .await
    }

    /// Every daily row of a session, by participant then date.
    pub async fn list_daily_attention(&self, session_id: &str) -> Result<Vec<DailyAttention>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DAILY_COLUMNS} FROM daily_attention
                 WHERE session_id = ?1
                 ORDER BY participant_id ASC, date ASC"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_daily_attention(row)?);
            }

            Ok(records)
        })
        .await
    }

    /// Running average of one participant, pooled over all their days.
    pub async fn participant_average(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<Option<ParticipantAverage>> {
        let session_id = session_id.to_string();
        let participant_id = participant_id.to_string();
        self.execute(move |conn| {
            let average = conn
                .query_row(
                    "SELECT participant_id,
                            SUM(attention_sum) AS attention_sum,
                            SUM(attention_count) AS attention_count
                     FROM daily_attention
                     WHERE session_id = ?1 AND participant_id = ?2
                     GROUP BY participant_id",
                    params![session_id, participant_id],
                    |row| Ok(row_to_participant_average(row)),
                )
                .optional()?
                .transpose()?;
            Ok(average)
        })
        .await
    }

    /// One pooled running average per participant of a session.
    pub async fn session_averages(&self, session_id: &str) -> Result<Vec<ParticipantAverage>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT participant_id,
                        SUM(attention_sum) AS attention_sum,
                        SUM(attention_count) AS attention_count
                 FROM daily_attention
                 WHERE session_id = ?1
                 GROUP BY participant_id
                 ORDER BY participant_id ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut averages = Vec::new();
            while let Some(row) = rows.next()? {
                averages.push(row_to_participant_average(row)?);
            }

            Ok(averages)
        })
        .await
    }
}

//! Frame ingestion: score a still, then fold the score into the live
//! window, the history log and the daily aggregate.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use image::GrayImage;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    config::TrackerConfig,
    db::{AttentionSample, DailyAttention, Database, HistoryEntry, ParticipantAverage},
    vision::{
        decode_data_url, decode_frame, AttentionBreakdown, Detector, GeometricScorer, ScoreBasis,
    },
};

use super::{
    participant::{normalize_participant, ParticipantKey},
    snapshot::{SessionSnapshot, SnapshotWriter},
    window::{LiveAttention, SessionWindow},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Encoded or already-decoded still.
#[derive(Debug, Clone)]
pub enum FrameImage {
    /// `data:<mime>;base64,<payload>` or bare base64.
    DataUrl(String),
    Encoded(Vec<u8>),
    /// Equalized grayscale frame, used as is.
    Gray(GrayImage),
}

#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub session_id: String,
    pub participant_id: Option<String>,
    pub participant_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Timestamp exactly as the client sent it, for the session snapshot.
    pub raw_timestamp: Option<String>,
    pub image: FrameImage,
}

impl FrameRequest {
    pub fn key(&self) -> ParticipantKey {
        ParticipantKey::new(
            self.session_id.clone(),
            normalize_participant(
                self.participant_id.as_deref(),
                self.participant_name.as_deref(),
            ),
        )
    }
}

/// Parse a client timestamp. RFC 3339 with any offset is normalized to UTC;
/// a bare `YYYY-MM-DDTHH:MM:SS[.fff]` is taken as UTC.
pub fn parse_client_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|err| anyhow!("invalid timestamp '{raw}': {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameOutcome {
    /// Image could not be decoded; scored 0.0.
    DecodeFailed,
    NoFace,
    FaceOnly,
    Scored,
}

impl From<ScoreBasis> for FrameOutcome {
    fn from(basis: ScoreBasis) -> Self {
        match basis {
            ScoreBasis::NoFace => FrameOutcome::NoFace,
            ScoreBasis::FaceOnly => FrameOutcome::FaceOnly,
            ScoreBasis::FaceAndEyes => FrameOutcome::Scored,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResult {
    pub key: ParticipantKey,
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub outcome: FrameOutcome,
    pub breakdown: Option<AttentionBreakdown>,
    /// Rolling average right after this frame was pushed.
    pub rolling_average: f64,
    /// Updated daily row; `None` for unidentified participants.
    pub daily: Option<DailyAttention>,
}

/// Owns every piece of per-participant state for the life of the process.
#[derive(Clone)]
pub struct AttentionTracker {
    db: Database,
    window: SessionWindow,
    scorer: Arc<GeometricScorer>,
    detector: Arc<dyn Detector>,
    snapshots: Option<SnapshotWriter>,
    key_locks: Arc<StdMutex<HashMap<ParticipantKey, Arc<Mutex<()>>>>>,
}

impl AttentionTracker {
    pub fn new(
        db: Database,
        window: SessionWindow,
        scorer: GeometricScorer,
        detector: Arc<dyn Detector>,
        snapshots: Option<SnapshotWriter>,
    ) -> Self {
        Self {
            db,
            window,
            scorer: Arc::new(scorer),
            detector,
            snapshots,
            key_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Open the database and snapshot directory named by `config`.
    pub fn from_config(config: &TrackerConfig, detector: Arc<dyn Detector>) -> Result<Self> {
        let db = Database::new(config.db_path.clone())?;
        let snapshots = config
            .meeting_data_dir
            .clone()
            .map(SnapshotWriter::new)
            .transpose()?;
        Ok(Self::new(
            db,
            SessionWindow::new(config.window_capacity, config.short_window_capacity),
            GeometricScorer::new(config.scoring.clone()),
            detector,
            snapshots,
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn window(&self) -> &SessionWindow {
        &self.window
    }

    pub async fn ingest(&self, request: FrameRequest) -> Result<FrameResult> {
        let detector = Arc::clone(&self.detector);
        self.ingest_with(request, detector).await
    }

    /// Like [`ingest`](Self::ingest) but with a detector for this frame only.
    pub async fn ingest_with(
        &self,
        request: FrameRequest,
        detector: Arc<dyn Detector>,
    ) -> Result<FrameResult> {
        let key = request.key();
        let timestamp = request.timestamp;
        let raw_timestamp = request.raw_timestamp;

        // Held from scoring through the store writes so frames for one key
        // land in arrival order. Tokio's mutex queues waiters FIFO.
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let scorer = Arc::clone(&self.scorer);
        let image = request.image;
        let breakdown = tokio::task::spawn_blocking(move || score_image(image, &scorer, &*detector))
            .await
            .context("scoring worker join failed")?;

        let (score, outcome) = match &breakdown {
            Ok(breakdown) => (breakdown.score, FrameOutcome::from(breakdown.basis)),
            Err(err) => {
                log_warn!("frame for {key} could not be decoded, scoring 0.0: {err:#}");
                (0.0, FrameOutcome::DecodeFailed)
            }
        };

        if let Some(writer) = &self.snapshots {
            let client_timestamp = raw_timestamp
                .unwrap_or_else(|| timestamp.to_rfc3339_opts(SecondsFormat::Millis, true));
            writer.write(&SessionSnapshot::new(
                &key.session_id,
                &key.participant_id,
                client_timestamp,
            ))?;
        }

        let daily = self.apply_score(&key, timestamp, score).await?;
        let rolling_average = self.window.rolling_average(&key);

        log_debug!(
            "frame {key} at {timestamp}: score={score:.3} outcome={outcome:?} rolling={rolling_average:.3}"
        );

        Ok(FrameResult {
            key,
            timestamp,
            score,
            outcome,
            breakdown: breakdown.ok(),
            rolling_average,
            daily,
        })
    }

    /// Fold an already computed score into window, history and daily
    /// aggregate, in that order, serialized per key.
    pub async fn record_score(
        &self,
        key: &ParticipantKey,
        timestamp: DateTime<Utc>,
        score: f64,
    ) -> Result<Option<DailyAttention>> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.apply_score(key, timestamp, score).await
    }

    async fn apply_score(
        &self,
        key: &ParticipantKey,
        timestamp: DateTime<Utc>,
        score: f64,
    ) -> Result<Option<DailyAttention>> {
        self.window.push(key, score);

        self.db
            .append_attention_history(&HistoryEntry {
                session_id: key.session_id.clone(),
                participant_id: key.participant_id.clone(),
                timestamp,
                score,
            })
            .await
            .with_context(|| format!("failed to append attention history for {key}"))?;

        if !key.is_identified() {
            return Ok(None);
        }

        let daily = self
            .db
            .record_daily_attention(
                &key.session_id,
                &key.participant_id,
                timestamp.date_naive(),
                score,
                Utc::now(),
            )
            .await
            .with_context(|| format!("failed to update daily attention for {key}"))?;
        Ok(Some(daily))
    }

    pub fn rolling_average(&self, key: &ParticipantKey) -> f64 {
        self.window.rolling_average(key)
    }

    pub fn live_scores(&self) -> Vec<LiveAttention> {
        self.window.live_scores()
    }

    pub async fn session_averages(&self, session_id: &str) -> Result<Vec<ParticipantAverage>> {
        self.db.session_averages(session_id).await
    }

    pub async fn participant_average(
        &self,
        key: &ParticipantKey,
    ) -> Result<Option<ParticipantAverage>> {
        self.db
            .participant_average(&key.session_id, &key.participant_id)
            .await
    }

    pub async fn history(&self, key: &ParticipantKey) -> Result<Vec<AttentionSample>> {
        self.db
            .attention_history(&key.session_id, &key.participant_id)
            .await
    }

    /// Drop in-memory state. Durable state stays in the database.
    pub fn shutdown(&self) {
        log_info!(
            "attention tracker shutting down with {} live windows",
            self.window.key_count()
        );
        self.window.clear();
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn key_lock(&self, key: &ParticipantKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

fn score_image(
    image: FrameImage,
    scorer: &GeometricScorer,
    detector: &dyn Detector,
) -> Result<AttentionBreakdown> {
    let frame = match image {
        FrameImage::DataUrl(data) => decode_data_url(&data)?,
        FrameImage::Encoded(bytes) => decode_frame(&bytes)?,
        FrameImage::Gray(frame) => frame,
    };
    Ok(scorer.score_frame(&frame, detector))
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    config::TrackerConfig,
    db::{AttentionSample, Database, ParticipantAverage},
    tracking::{
        parse_client_timestamp, AttentionTracker, FrameImage, FrameOutcome, FrameRequest,
        FrameResult, LiveAttention, SnapshotWriter,
    },
    vision::PrecomputedDetector,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

#[derive(Parser, Debug)]
#[command(name = "attention-tracker")]
#[command(about = "Score meeting participant attention and query the aggregates")]
pub struct Cli {
    /// JSON config file; environment variables override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a JSONL file of frames, in order, and record the results
    Ingest {
        #[arg(long)]
        frames: PathBuf,
    },
    /// Per-participant running averages for a session
    Report {
        #[arg(long)]
        session: String,
    },
    /// Attention time series of one participant
    History {
        #[arg(long)]
        session: String,
        #[arg(long)]
        participant: String,
    },
    /// Latest frame metadata written for a session
    Snapshot {
        #[arg(long)]
        session: String,
    },
}

/// One line of an ingest file, in the browser extension's field names.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameLine {
    pub image_data: Option<String>,
    /// Relative paths resolve against the frames file's directory.
    pub image_path: Option<PathBuf>,
    pub meeting_id: String,
    pub timestamp: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    #[serde(default)]
    pub detections: PrecomputedDetector,
}

impl FrameLine {
    pub fn into_request(self, base_dir: &Path) -> Result<(FrameRequest, PrecomputedDetector)> {
        let timestamp = parse_client_timestamp(&self.timestamp)?;
        let image = match (self.image_data, self.image_path) {
            (Some(data), _) => FrameImage::DataUrl(data),
            (None, Some(path)) => {
                let path = base_dir.join(path);
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("failed to read frame image {}", path.display()))?;
                FrameImage::Encoded(bytes)
            }
            (None, None) => anyhow::bail!("frame has neither imageData nor imagePath"),
        };
        let request = FrameRequest {
            session_id: self.meeting_id,
            participant_id: self.user_id,
            participant_name: self.user_name,
            timestamp,
            raw_timestamp: Some(self.timestamp),
            image,
        };
        Ok((request, self.detections))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
enum FrameReply {
    #[serde(rename_all = "camelCase")]
    Success {
        meeting_id: String,
        user_email: String,
        attention: f64,
        outcome: FrameOutcome,
    },
    /// Details stay in the log.
    Error { line: usize, message: &'static str },
}

impl From<&FrameResult> for FrameReply {
    fn from(result: &FrameResult) -> Self {
        FrameReply::Success {
            meeting_id: result.key.session_id.clone(),
            user_email: result.key.participant_id.clone(),
            attention: result.score,
            outcome: result.outcome,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionReport {
    session_id: String,
    /// Frames logged for the session, unidentified participants included.
    history_samples: u64,
    participants: Vec<ParticipantReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantReport {
    participant_id: String,
    attention_count: u64,
    running_average: f64,
    attention_percent: f64,
}

impl From<ParticipantAverage> for ParticipantReport {
    fn from(average: ParticipantAverage) -> Self {
        Self {
            attention_percent: average.attention_percent(),
            participant_id: average.participant_id,
            attention_count: average.attention_count,
            running_average: average.running_average,
        }
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let config = TrackerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ingest { frames } => {
            let tracker =
                AttentionTracker::from_config(&config, Arc::new(PrecomputedDetector::default()))?;
            let live = ingest_file(&tracker, &frames).await;
            tracker.shutdown();
            let live = live?;
            println!("{}", serde_json::to_string_pretty(&live)?);
        }
        Command::Report { session } => {
            let db = Database::new(config.db_path.clone())?;
            let participants = db
                .session_averages(&session)
                .await?
                .into_iter()
                .map(ParticipantReport::from)
                .collect();
            let report = SessionReport {
                history_samples: db.count_attention_history(&session).await?,
                session_id: session,
                participants,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::History {
            session,
            participant,
        } => {
            let db = Database::new(config.db_path.clone())?;
            let samples: Vec<AttentionSample> = db.attention_history(&session, &participant).await?;
            println!("{}", serde_json::to_string_pretty(&samples)?);
        }
        Command::Snapshot { session } => {
            let dir = config
                .meeting_data_dir
                .context("snapshots are disabled (MEETING_DATA_DIR is empty)")?;
            match SnapshotWriter::new(dir)?.read(&session)? {
                Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
                None => anyhow::bail!("no snapshot recorded for session '{session}'"),
            }
        }
    }

    Ok(())
}

/// Feed every frame through `tracker`. A failing frame is reported and
/// skipped; the error count decides the final result.
pub async fn ingest_file(tracker: &AttentionTracker, frames: &Path) -> Result<Vec<LiveAttention>> {
    let file = File::open(frames)
        .with_context(|| format!("failed to open frames file {}", frames.display()))?;
    let base_dir = frames.parent().unwrap_or_else(|| Path::new("."));

    let mut failures = 0usize;
    let mut processed = 0usize;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match ingest_line(tracker, &line, base_dir).await {
            Ok(result) => FrameReply::from(&result),
            Err(err) => {
                log_error!("frame on line {line_no} failed: {err:#}");
                failures += 1;
                FrameReply::Error {
                    line: line_no,
                    message: "internal error",
                }
            }
        };
        processed += 1;
        println!("{}", serde_json::to_string(&reply)?);
    }

    log_info!("ingested {processed} frames ({failures} failed)");
    if failures > 0 {
        anyhow::bail!("{failures} of {processed} frames failed");
    }
    Ok(tracker.live_scores())
}

async fn ingest_line(
    tracker: &AttentionTracker,
    line: &str,
    base_dir: &Path,
) -> Result<FrameResult> {
    let frame: FrameLine = serde_json::from_str(line).context("malformed frame line")?;
    let (request, detector) = frame.into_request(base_dir)?;
    tracker.ingest_with(request, Arc::new(detector)).await
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt::Write as _, fs, path::PathBuf};

/// Latest frame metadata seen for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub meeting_id: String,
    pub user_email: String,
    /// Client timestamp as it was sent.
    pub timestamp: String,
}

impl SessionSnapshot {
    pub fn new(session_id: &str, participant_id: &str, timestamp: impl Into<String>) -> Self {
        Self {
            meeting_id: session_id.to_string(),
            user_email: participant_id.to_string(),
            timestamp: timestamp.into(),
        }
    }
}

/// Writes one `<session>.json` per session, overwritten on every frame.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        if session_id.is_empty() {
            anyhow::bail!("session id is empty");
        }
        Ok(self.dir.join(format!("{}.json", file_stem(session_id))))
    }

    pub fn write(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let path = self.path_for(&snapshot.meeting_id)?;
        let serialized = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, serialized)
            .with_context(|| format!("failed to write session snapshot to {}", path.display()))
    }

    pub fn read(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read session snapshot {}", path.display()))?;
        Ok(Some(serde_json::from_str(&contents)?))
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`, so distinct session
/// ids map to distinct files and none can leave the directory.
fn file_stem(session_id: &str) -> String {
    let mut stem = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            let _ = write!(stem, "%{byte:02X}");
        }
    }
    stem
}

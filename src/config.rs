use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::tracking::window::{DEFAULT_SHORT_WINDOW_CAPACITY, DEFAULT_WINDOW_CAPACITY};
use crate::vision::ScoringConfig;

pub const ENV_DB_PATH: &str = "DB_PATH";
pub const ENV_MEETING_DATA_DIR: &str = "MEETING_DATA_DIR";
pub const ENV_WINDOW_CAPACITY: &str = "ATTENTION_WINDOW_CAPACITY";
pub const ENV_SHORT_WINDOW_CAPACITY: &str = "ATTENTION_SHORT_WINDOW_CAPACITY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    /// Where per-session snapshot files go; `None` turns them off.
    pub meeting_data_dir: Option<PathBuf>,
    pub window_capacity: usize,
    pub short_window_capacity: usize,
    pub scoring: ScoringConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("attention_scores.db"),
            meeting_data_dir: Some(PathBuf::from("meeting_data")),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            short_window_capacity: DEFAULT_SHORT_WINDOW_CAPACITY,
            scoring: ScoringConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Defaults, then the optional JSON file, then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(path, &env)
    }

    pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        if let Some(value) = env.get(ENV_DB_PATH) {
            self.db_path = PathBuf::from(value);
        }
        if let Some(value) = env.get(ENV_MEETING_DATA_DIR) {
            self.meeting_data_dir = if value.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        if let Some(value) = env.get(ENV_WINDOW_CAPACITY) {
            self.window_capacity = value
                .parse()
                .with_context(|| format!("{ENV_WINDOW_CAPACITY} must be an integer"))?;
        }
        if let Some(value) = env.get(ENV_SHORT_WINDOW_CAPACITY) {
            self.short_window_capacity = value
                .parse()
                .with_context(|| format!("{ENV_SHORT_WINDOW_CAPACITY} must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            bail!("window_capacity must be at least 1");
        }
        if self.short_window_capacity == 0 {
            bail!("short_window_capacity must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = TrackerConfig::load_with_env(None, &HashMap::new()).unwrap();
        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.window_capacity, 30);
        assert_eq!(config.short_window_capacity, 5);
    }

    #[test]
    fn file_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        fs::write(
            &path,
            r#"{ "db_path": "/var/lib/attention.db", "scoring": { "face_weight": 0.5 } }"#,
        )
        .unwrap();

        let config = TrackerConfig::load_with_env(Some(&path), &HashMap::new()).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/attention.db"));
        assert_eq!(config.scoring.face_weight, 0.5);
        assert_eq!(config.scoring.eye_weight, 0.6);
        assert_eq!(config.window_capacity, 30);
    }

    #[test]
    fn env_overrides_file() {
        let config = TrackerConfig::load_with_env(
            None,
            &env(&[
                (ENV_DB_PATH, "scores.db"),
                (ENV_MEETING_DATA_DIR, ""),
                (ENV_WINDOW_CAPACITY, "10"),
            ]),
        )
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("scores.db"));
        assert_eq!(config.meeting_data_dir, None);
        assert_eq!(config.window_capacity, 10);
    }

    #[test]
    fn rejects_bad_capacities() {
        assert!(TrackerConfig::load_with_env(None, &env(&[(ENV_WINDOW_CAPACITY, "0")])).is_err());
        assert!(
            TrackerConfig::load_with_env(None, &env(&[(ENV_SHORT_WINDOW_CAPACITY, "lots")]))
                .is_err()
        );
    }
}

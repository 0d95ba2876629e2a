//! In-memory recent-history windows, one per participant key.
//!
//! Lives for the lifetime of the owning tracker; nothing here is persisted
//! and idle keys are never expired.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};

use super::participant::ParticipantKey;

pub const DEFAULT_WINDOW_CAPACITY: usize = 30;
pub const DEFAULT_SHORT_WINDOW_CAPACITY: usize = 5;

/// Fixed-capacity FIFO; pushing past capacity evicts the oldest value.
#[derive(Debug, Clone)]
struct BoundedScores {
    capacity: usize,
    values: VecDeque<f64>,
}

impl BoundedScores {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

#[derive(Debug)]
struct WindowState {
    recent: BoundedScores,
    short_term: BoundedScores,
}

/// Live view of one key's window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAttention {
    pub session_id: String,
    pub participant_id: String,
    /// Rolling average rounded to two decimals.
    pub attention_score: f64,
    /// Short-horizon average rounded to two decimals.
    pub short_term_score: f64,
    pub sample_count: usize,
}

#[derive(Clone)]
pub struct SessionWindow {
    capacity: usize,
    short_capacity: usize,
    entries: Arc<RwLock<HashMap<ParticipantKey, Arc<Mutex<WindowState>>>>>,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY, DEFAULT_SHORT_WINDOW_CAPACITY)
    }
}

impl SessionWindow {
    /// Capacities below one are raised to one.
    pub fn new(capacity: usize, short_capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            short_capacity: short_capacity.max(1),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn push(&self, key: &ParticipantKey, score: f64) {
        let state = self.state_for(key);
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.recent.push(score);
        guard.short_term.push(score);
    }

    /// Mean of the held recent scores, 0.0 for an unseen key.
    pub fn rolling_average(&self, key: &ParticipantKey) -> f64 {
        self.with_state(key, |state| state.recent.mean()).unwrap_or(0.0)
    }

    /// Mean of the short-horizon buffer, 0.0 for an unseen key.
    pub fn short_term_average(&self, key: &ParticipantKey) -> f64 {
        self.with_state(key, |state| state.short_term.mean()).unwrap_or(0.0)
    }

    /// Held recent scores, oldest first.
    pub fn recent_scores(&self, key: &ParticipantKey) -> Vec<f64> {
        self.with_state(key, |state| state.recent.values.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn key_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every tracked key with its averages, ordered by session then participant.
    pub fn live_scores(&self) -> Vec<LiveAttention> {
        let entries: Vec<(ParticipantKey, Arc<Mutex<WindowState>>)> = {
            let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            map.iter()
                .map(|(key, state)| (key.clone(), Arc::clone(state)))
                .collect()
        };

        let mut live: Vec<LiveAttention> = entries
            .into_iter()
            .map(|(key, state)| {
                let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
                LiveAttention {
                    session_id: key.session_id,
                    participant_id: key.participant_id,
                    attention_score: round2(guard.recent.mean()),
                    short_term_score: round2(guard.short_term.mean()),
                    sample_count: guard.recent.values.len(),
                }
            })
            .collect();

        live.sort_by(|a, b| {
            a.session_id
                .cmp(&b.session_id)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        live
    }

    /// Drop every window.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn with_state<T>(&self, key: &ParticipantKey, f: impl FnOnce(&WindowState) -> T) -> Option<T> {
        let state = {
            let map = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            map.get(key).map(Arc::clone)
        }?;
        let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&guard))
    }

    fn state_for(&self, key: &ParticipantKey) -> Arc<Mutex<WindowState>> {
        if let Some(state) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(state);
        }

        let mut map = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let state = map.entry(key.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(WindowState {
                recent: BoundedScores::new(self.capacity),
                short_term: BoundedScores::new(self.short_capacity),
            }))
        });
        Arc::clone(state)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

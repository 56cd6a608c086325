use crate::error::AppError;
use crate::models::prediction_types::PredictionResult;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Receives every prediction the core produces.
pub trait ResultSink: Send + Sync {
    fn record(&self, result: &PredictionResult);
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub recorded_at: u64,
    pub result: PredictionResult,
}

/// Most recent predictions, newest last. Oldest entries are evicted once
/// `capacity` is reached.
pub struct ResultHistory {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl ResultHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries().iter().cloned().collect()
    }

    pub fn healthy_count(&self) -> usize {
        self.entries().iter().filter(|e| e.result.is_healthy).count()
    }

    pub fn save_json(&self, path: &Path) -> Result<(), AppError> {
        let serialized = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, serialized)
            .map_err(|e| AppError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}

impl ResultSink for ResultHistory {
    fn record(&self, result: &PredictionResult) {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut entries = self.entries();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(HistoryEntry {
            recorded_at,
            result: result.clone(),
        });
    }
}

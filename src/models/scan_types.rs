use crate::models::prediction_types::PredictionResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanPhase {
    Idle,
    Armed,
    Analyzing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanTrigger {
    Tick,
    Manual,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub phase: ScanPhase,
    pub running: bool,
    pub interval_ms: u64,
    pub last_result: Option<PredictionResult>,
    pub completed_cycles: u64,
    pub dropped_ticks: u64,
}

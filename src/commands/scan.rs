use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::scan_types::ScanSnapshot;
use crate::services::classifier::gateway::PredictionGateway;
use crate::services::history::{HistoryEntry, ResultHistory};
use crate::services::live_scan::{DirectoryCamera, LiveScanController};
use log::{info, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub snapshot: ScanSnapshot,
    pub history: Vec<HistoryEntry>,
}

/// Runs a live scan over the frames in `frames` for `duration`, then stops and
/// waits for any in-flight cycle to land.
pub async fn run_scan(
    config: &AppConfig,
    frames: &Path,
    duration: Duration,
) -> Result<ScanReport, AppError> {
    let camera = DirectoryCamera::open(&frames.to_string_lossy())?;
    info!("Scanning {} frame(s) from {}", camera.frame_count(), frames.display());

    let gateway = PredictionGateway::from_config(config)?;
    gateway.initialize().await;

    let history = Arc::new(ResultHistory::new(config.history_capacity));
    let controller = LiveScanController::new(
        gateway,
        Arc::new(camera),
        history.clone(),
        config.scan_interval(),
    );

    controller.start();
    tokio::time::sleep(duration).await;
    controller.stop();

    controller.wait_until_settled().await;

    if history.is_empty() {
        warn!("Scan finished without any results");
    } else {
        info!(
            "Scan finished: {} result(s), {} healthy",
            history.len(),
            history.healthy_count()
        );
    }

    Ok(ScanReport {
        snapshot: controller.snapshot(),
        history: history.snapshot(),
    })
}

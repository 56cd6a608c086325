use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::prediction_types::{ImageRef, PredictionResult};
use crate::services::analysis_session::AnalysisSessionManager;
use crate::services::classifier::gateway::PredictionGateway;
use crate::services::fs_service;
use crate::services::history::ResultHistory;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Batch-analyzes the images found under `paths`. When `output` is given the
/// results are also written there as a JSON history.
pub async fn analyze_paths(
    config: &AppConfig,
    paths: &[PathBuf],
    recursive: bool,
    output: Option<&Path>,
) -> Result<Vec<PredictionResult>, AppError> {
    let files = fs_service::collect_images(paths, recursive)?;
    info!("Found {} image(s)", files.len());

    let gateway = PredictionGateway::from_config(config)?;
    gateway.initialize().await;

    let history = Arc::new(ResultHistory::new(config.history_capacity.max(files.len())));
    let mut session = AnalysisSessionManager::new(gateway).with_sink(history.clone());
    session.add_images(
        files
            .iter()
            .map(|path| ImageRef::new(fs_service::to_file_uri(path))),
    );

    let results = session.analyze_all().await?;

    if let Some(output) = output {
        history.save_json(output)?;
        info!("Wrote {} result(s) to {}", history.len(), output.display());
    }
    Ok(results)
}

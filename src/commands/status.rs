use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::prediction_types::GatewayStatus;
use crate::services::classifier::gateway::PredictionGateway;

/// Probes the configured backend once and reports what the gateway decided.
pub async fn gateway_status(config: &AppConfig) -> Result<GatewayStatus, AppError> {
    let gateway = PredictionGateway::from_config(config)?;
    gateway.initialize().await;
    Ok(gateway.status())
}

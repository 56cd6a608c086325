use crate::error::AppError;
use crate::services::classifier::catalog;
use serde::{Deserialize, Serialize};

/// Opaque reference to an image handed over by an acquisition collaborator.
/// The URI doubles as the image identity in the batch working set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    pub uri: String,
}

impl ImageRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub class_name: String,
    pub plant_type: String,
    pub is_healthy: bool,
    #[serde(default)]
    pub disease_type: Option<String>,
    pub confidence: f64,
}

impl PredictionResult {
    /// Builds a result for a catalog label, deriving the plant and condition fields.
    pub fn from_label(label: &str, confidence: f64) -> Result<Self, AppError> {
        if !catalog::is_known(label) {
            return Err(AppError::Backend(format!("Label not in catalog: {}", label)));
        }
        Ok(Self::derive(label, confidence))
    }

    /// Derivation for labels already known to be in the catalog.
    pub(crate) fn derive(label: &str, confidence: f64) -> Self {
        let (plant, condition) = catalog::split_label(label).unwrap_or((label, ""));
        let is_healthy = condition == catalog::HEALTHY_TOKEN;

        Self {
            class_name: label.to_string(),
            plant_type: catalog::display_segment(plant),
            is_healthy,
            disease_type: if is_healthy {
                None
            } else {
                Some(catalog::display_segment(condition))
            },
            confidence,
        }
    }

    /// Checks a result produced elsewhere (the remote service) against the catalog
    /// and the health/disease invariant.
    pub fn validate(&self) -> Result<(), AppError> {
        if !catalog::is_known(&self.class_name) {
            return Err(AppError::Backend(format!(
                "Label not in catalog: {}",
                self.class_name
            )));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(AppError::Backend(format!(
                "Confidence out of range: {}",
                self.confidence
            )));
        }

        let expected_healthy = catalog::split_label(&self.class_name)
            .map(|(_, condition)| condition == catalog::HEALTHY_TOKEN)
            .unwrap_or(false);
        if self.is_healthy != expected_healthy {
            return Err(AppError::Backend(format!(
                "isHealthy={} contradicts label {}",
                self.is_healthy, self.class_name
            )));
        }
        if self.disease_type.is_some() == self.is_healthy {
            return Err(AppError::Backend(format!(
                "diseaseType presence contradicts label {}",
                self.class_name
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Readiness {
    #[default]
    Unloaded,
    BackendAvailable,
    FallbackMode,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub readiness: Readiness,
    pub ready: bool,
    pub using_backend: bool,
    pub backend_url: String,
    pub model_loaded: Option<bool>,
    pub degraded_reason: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub model_loaded: Option<bool>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::prediction_types::{GatewayStatus, ImageRef, PredictionResult, Readiness};
use crate::services::classifier::backend::{HttpBackend, InferenceBackend};
use crate::services::classifier::fallback::FallbackSynthesizer;
use crate::services::image_source;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outcome of a single attempt against the remote service.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome {
    Ok(PredictionResult),
    Unavailable(String),
}

#[derive(Debug, Default)]
struct GatewayState {
    readiness: Readiness,
    model_loaded: Option<bool>,
    degraded_reason: Option<String>,
}

/// Single entry point for predictions. Cloning is cheap and every clone shares
/// the same readiness state, so one gateway is built per app session and handed
/// to each consumer.
#[derive(Clone)]
pub struct PredictionGateway {
    backend: Arc<dyn InferenceBackend>,
    state: Arc<Mutex<GatewayState>>,
    fallback: Arc<tokio::sync::Mutex<FallbackSynthesizer>>,
    health_timeout: Duration,
    predict_timeout: Option<Duration>,
    upload_max_edge: Option<u32>,
}

impl PredictionGateway {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: &AppConfig) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(GatewayState::default())),
            fallback: Arc::new(tokio::sync::Mutex::new(FallbackSynthesizer::new(
                config.fallback_seed,
                config.fallback_delay(),
            ))),
            health_timeout: config.health_timeout(),
            predict_timeout: config.predict_timeout(),
            upload_max_edge: config.upload_max_edge,
        }
    }

    /// Gateway talking HTTP to `config.backend_url`.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let backend = HttpBackend::new(&config.backend_url, config.request_timeout())?;
        Ok(Self::new(Arc::new(backend), config))
    }

    fn state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn readiness(&self) -> Readiness {
        self.state().readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() != Readiness::Unloaded
    }

    pub fn is_using_backend(&self) -> bool {
        self.readiness() == Readiness::BackendAvailable
    }

    pub fn status(&self) -> GatewayStatus {
        let state = self.state();
        GatewayStatus {
            readiness: state.readiness,
            ready: state.readiness != Readiness::Unloaded,
            using_backend: state.readiness == Readiness::BackendAvailable,
            backend_url: self.backend.base_url().to_string(),
            model_loaded: state.model_loaded,
            degraded_reason: state.degraded_reason.clone(),
        }
    }

    /// Probes the service and records the outcome. A failed probe is not an error:
    /// the gateway stays usable in fallback mode.
    pub async fn initialize(&self) -> Readiness {
        let probe = tokio::time::timeout(self.health_timeout, self.backend.health()).await;

        let (readiness, model_loaded, reason) = match probe {
            Ok(Ok(report)) if report.is_healthy() => {
                (Readiness::BackendAvailable, report.model_loaded, None)
            }
            Ok(Ok(report)) => (
                Readiness::FallbackMode,
                report.model_loaded,
                Some(format!("Backend reported status {:?}", report.status)),
            ),
            Ok(Err(e)) => (Readiness::FallbackMode, None, Some(e.to_string())),
            Err(_) => (
                Readiness::FallbackMode,
                None,
                Some(format!(
                    "Health probe timed out after {}ms",
                    self.health_timeout.as_millis()
                )),
            ),
        };

        match &reason {
            None => {
                info!("Inference backend available at {}", self.backend.base_url());
                if model_loaded == Some(false) {
                    warn!("Backend is up but reports no model loaded");
                }
            }
            Some(reason) => warn!("Inference backend unavailable, using fallback: {}", reason),
        }

        let mut state = self.state();
        state.readiness = readiness;
        state.model_loaded = model_loaded;
        state.degraded_reason = reason;
        readiness
    }

    /// Classifies an image. Backend failures never surface here: they downgrade the
    /// gateway and the same call answers from the fallback synthesizer.
    pub async fn predict(&self, image: &ImageRef) -> Result<PredictionResult, AppError> {
        match self.readiness() {
            Readiness::Unloaded => Err(AppError::NotReady),
            Readiness::BackendAvailable => match self.try_backend(image).await {
                BackendOutcome::Ok(result) => Ok(result),
                BackendOutcome::Unavailable(reason) => {
                    self.degrade(reason);
                    Ok(self.synthesize().await)
                }
            },
            Readiness::FallbackMode => Ok(self.synthesize().await),
        }
    }

    /// One remote attempt, with every failure mode folded into `Unavailable`.
    pub async fn try_backend(&self, image: &ImageRef) -> BackendOutcome {
        let backend = Arc::clone(&self.backend);
        let image = image.clone();
        let max_edge = self.upload_max_edge;

        // Run on its own task so a panicking backend is reported instead of unwinding
        // through the caller.
        let mut handle = tokio::spawn(async move {
            if image.is_remote() {
                return backend.predict_url(&image.uri).await;
            }
            let encoded = image_source::encode_for_upload(&image, max_edge).await?;
            backend.predict_encoded(encoded).await
        });

        let joined = match self.predict_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return BackendOutcome::Unavailable(format!(
                        "Prediction timed out after {}ms",
                        limit.as_millis()
                    ));
                }
            },
            None => handle.await,
        };

        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(AppError::Backend(format!("Prediction task failed: {}", e))),
        };

        match result.and_then(|prediction| prediction.validate().map(|_| prediction)) {
            Ok(prediction) => BackendOutcome::Ok(prediction),
            Err(e) => BackendOutcome::Unavailable(e.to_string()),
        }
    }

    fn degrade(&self, reason: String) {
        let mut state = self.state();
        if state.readiness == Readiness::BackendAvailable {
            warn!("Switching to fallback predictions: {}", reason);
            state.readiness = Readiness::FallbackMode;
        }
        state.degraded_reason = Some(reason);
    }

    async fn synthesize(&self) -> PredictionResult {
        let (result, delay) = {
            let mut synth = self.fallback.lock().await;
            (synth.next_result(), synth.delay())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        debug!(
            "Fallback prediction {} ({:.2})",
            result.class_name, result.confidence
        );
        result
    }
}

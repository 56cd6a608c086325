use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::prediction_types::{HealthReport, ImageRef, PredictionResult};
use crate::services::classifier::backend::InferenceBackend;
use crate::services::history::ResultSink;
use crate::services::live_scan::camera::FrameSource;
use async_trait::async_trait;
use base64::Engine;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn test_config() -> AppConfig {
    AppConfig {
        backend_url: "http://backend.test".to_string(),
        fallback_delay_ms: 0,
        fallback_seed: Some(7),
        ..AppConfig::default()
    }
}

/// Distinct inline image whose URI survives an encode round trip unchanged.
pub fn inline_image(n: u32) -> ImageRef {
    let b64 = base64::engine::general_purpose::STANDARD.encode(format!("leaf-{}", n));
    ImageRef::new(format!("data:image/jpeg;base64,{}", b64))
}

enum HealthScript {
    Status(String),
    Unreachable,
}

/// In-process stand-in for the inference service.
pub struct ScriptedBackend {
    health: HealthScript,
    health_delay: Duration,
    predict_delay: Duration,
    panic_on_predict: bool,
    responses: Mutex<VecDeque<Result<PredictionResult, AppError>>>,
    default_label: Option<String>,
    received: Mutex<Vec<String>>,
    predict_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedBackend {
    fn with_health(health: HealthScript) -> Self {
        Self {
            health,
            health_delay: Duration::ZERO,
            predict_delay: Duration::ZERO,
            panic_on_predict: false,
            responses: Mutex::new(VecDeque::new()),
            default_label: None,
            received: Mutex::new(Vec::new()),
            predict_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn healthy() -> Self {
        Self::with_health(HealthScript::Status("healthy".to_string()))
    }

    pub fn with_status(status: &str) -> Self {
        Self::with_health(HealthScript::Status(status.to_string()))
    }

    pub fn unreachable() -> Self {
        Self::with_health(HealthScript::Unreachable)
    }

    pub fn with_health_delay(mut self, delay: Duration) -> Self {
        self.health_delay = delay;
        self
    }

    pub fn with_predict_delay(mut self, delay: Duration) -> Self {
        self.predict_delay = delay;
        self
    }

    pub fn panic_on_predict(mut self) -> Self {
        self.panic_on_predict = true;
        self
    }

    /// Answer used once the scripted responses run out.
    pub fn respond_with(mut self, label: &str) -> Self {
        self.default_label = Some(label.to_string());
        self
    }

    pub fn push_response(self, response: Result<PredictionResult, AppError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn received_payloads(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    async fn answer(&self, payload: String) -> Result<PredictionResult, AppError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.received.lock().unwrap().push(payload);

        if !self.predict_delay.is_zero() {
            tokio::time::sleep(self.predict_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on_predict {
            panic!("scripted backend panic");
        }

        let scripted = self.responses.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => match &self.default_label {
                Some(label) => PredictionResult::from_label(label, 0.93),
                None => Err(AppError::Backend("no scripted response".into())),
            },
        }
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn base_url(&self) -> &str {
        "http://backend.test"
    }

    async fn health(&self) -> Result<HealthReport, AppError> {
        if !self.health_delay.is_zero() {
            tokio::time::sleep(self.health_delay).await;
        }
        match &self.health {
            HealthScript::Status(status) => Ok(HealthReport {
                status: status.clone(),
                model_loaded: Some(true),
            }),
            HealthScript::Unreachable => Err(AppError::Backend("connection refused".into())),
        }
    }

    async fn predict_encoded(&self, image_b64: String) -> Result<PredictionResult, AppError> {
        self.answer(image_b64).await
    }

    async fn predict_url(&self, url: &str) -> Result<PredictionResult, AppError> {
        self.answer(url.to_string()).await
    }
}

/// Camera that hands out numbered inline frames.
pub struct FakeCamera {
    captured: AtomicUsize,
    fail: bool,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            captured: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            captured: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn captured(&self) -> usize {
        self.captured.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for FakeCamera {
    async fn capture_frame(&self) -> Result<ImageRef, AppError> {
        if self.fail {
            return Err(AppError::Capture("camera unavailable".into()));
        }
        let n = self.captured.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(inline_image(n as u32))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    results: Mutex<Vec<PredictionResult>>,
}

impl RecordingSink {
    pub fn results(&self) -> Vec<PredictionResult> {
        self.results.lock().unwrap().clone()
    }
}

impl ResultSink for RecordingSink {
    fn record(&self, result: &PredictionResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

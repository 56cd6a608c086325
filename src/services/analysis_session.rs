use crate::error::AppError;
use crate::models::prediction_types::{ImageRef, PredictionResult};
use crate::services::classifier::gateway::PredictionGateway;
use crate::services::history::ResultSink;
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    AlreadyAnalyzed,
    GatewayNotReady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeOutcome {
    Analyzed(PredictionResult),
    Skipped(SkipReason),
}

/// Working set of picked images and their cached predictions.
///
/// Every mutating operation takes `&mut self`, so one manager never has two
/// predictions in flight and the result map has a single writer.
pub struct AnalysisSessionManager {
    gateway: PredictionGateway,
    sink: Option<Arc<dyn ResultSink>>,
    images: Vec<ImageRef>,
    results: HashMap<String, PredictionResult>,
}

impl AnalysisSessionManager {
    pub fn new(gateway: PredictionGateway) -> Self {
        Self {
            gateway,
            sink: None,
            images: Vec::new(),
            results: HashMap::new(),
        }
    }

    /// Forwards every new prediction to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Appends images in order. URIs already in the working set are ignored.
    pub fn add_images<I>(&mut self, images: I) -> usize
    where
        I: IntoIterator<Item = ImageRef>,
    {
        let mut added = 0;
        for image in images {
            if self.contains(&image.uri) {
                debug!("Skipping duplicate image {}", image.uri);
                continue;
            }
            self.images.push(image);
            added += 1;
        }
        added
    }

    /// Drops the image together with its cached result.
    pub fn remove_image(&mut self, id: &str) -> Result<ImageRef, AppError> {
        let index = self
            .images
            .iter()
            .position(|image| image.uri == id)
            .ok_or_else(|| AppError::UnknownImage(id.to_string()))?;
        self.results.remove(id);
        Ok(self.images.remove(index))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.images.iter().any(|image| image.uri == id)
    }

    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images without a cached result, in working-set order.
    pub fn pending(&self) -> Vec<&ImageRef> {
        self.images
            .iter()
            .filter(|image| !self.results.contains_key(&image.uri))
            .collect()
    }

    pub fn get_result(&self, id: &str) -> Option<&PredictionResult> {
        self.results.get(id)
    }

    /// Predicts one image unless it already has a result. Repeated calls for an
    /// analyzed image never reach the gateway.
    pub async fn analyze_one(&mut self, id: &str) -> Result<AnalyzeOutcome, AppError> {
        let image = self
            .images
            .iter()
            .find(|image| image.uri == id)
            .cloned()
            .ok_or_else(|| AppError::UnknownImage(id.to_string()))?;

        if self.results.contains_key(id) {
            return Ok(AnalyzeOutcome::Skipped(SkipReason::AlreadyAnalyzed));
        }
        if !self.gateway.is_ready() {
            return Ok(AnalyzeOutcome::Skipped(SkipReason::GatewayNotReady));
        }

        let result = self.gateway.predict(&image).await?;
        self.results.insert(image.uri.clone(), result.clone());
        if let Some(sink) = &self.sink {
            sink.record(&result);
        }
        Ok(AnalyzeOutcome::Analyzed(result))
    }

    /// Analyzes every pending image one at a time, in working-set order, and
    /// returns only the newly produced results.
    pub async fn analyze_all(&mut self) -> Result<Vec<PredictionResult>, AppError> {
        if !self.gateway.is_ready() {
            return Err(AppError::NotReady);
        }
        if self.images.is_empty() {
            return Err(AppError::NoImages);
        }

        let pending: Vec<String> = self.pending().into_iter().map(|i| i.uri.clone()).collect();
        let total = pending.len();
        let mut produced = Vec::with_capacity(total);

        for (index, id) in pending.iter().enumerate() {
            if let AnalyzeOutcome::Analyzed(result) = self.analyze_one(id).await? {
                info!(
                    "[{}/{}] {} -> {} ({:.1}%)",
                    index + 1,
                    total,
                    id,
                    result.class_name,
                    result.confidence * 100.0
                );
                produced.push(result);
            }
        }

        Ok(produced)
    }
}

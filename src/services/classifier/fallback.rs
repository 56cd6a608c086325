use crate::models::prediction_types::PredictionResult;
use crate::services::classifier::catalog::CLASS_NAMES;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub const MIN_CONFIDENCE: f64 = 0.7;
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Produces placeholder predictions while the inference service is unreachable.
pub struct FallbackSynthesizer {
    rng: StdRng,
    delay: Duration,
}

impl FallbackSynthesizer {
    /// A seed makes the sequence of results reproducible.
    pub fn new(seed: Option<u64>, delay: Duration) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, delay }
    }

    /// Simulated inference latency.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn next_result(&mut self) -> PredictionResult {
        let label = CLASS_NAMES[self.rng.gen_range(0..CLASS_NAMES.len())];
        let confidence = self.rng.gen_range(MIN_CONFIDENCE..=MAX_CONFIDENCE);
        PredictionResult::derive(label, confidence)
    }
}

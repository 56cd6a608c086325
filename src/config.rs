use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_BACKEND_URL: &str = "LEAFSCAN_BACKEND_URL";
const ENV_SCAN_INTERVAL_MS: &str = "LEAFSCAN_SCAN_INTERVAL_MS";
const ENV_FALLBACK_SEED: &str = "LEAFSCAN_FALLBACK_SEED";

/// One day.
pub const MAX_SCAN_INTERVAL_MS: u64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend_url: String,
    pub health_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Upper bound on one remote predict call; expiry falls back like any backend failure.
    pub predict_timeout_ms: Option<u64>,
    pub fallback_delay_ms: u64,
    /// Makes fallback results reproducible. Leave unset outside of tests.
    pub fallback_seed: Option<u64>,
    pub scan_interval_ms: u64,
    /// Local images with a longer edge are downscaled before upload.
    pub upload_max_edge: Option<u32>,
    pub history_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            health_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
            predict_timeout_ms: None,
            fallback_delay_ms: 1_000,
            fallback_seed: None,
            scan_interval_ms: 3_000,
            upload_max_edge: None,
            history_capacity: 100,
        }
    }
}

impl AppConfig {
    /// Reads the JSON config file when given (missing keys keep their defaults),
    /// then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    AppError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&contents).map_err(|e| {
                    AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
            None => AppConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(raw) = lookup(ENV_SCAN_INTERVAL_MS) {
            self.scan_interval_ms = raw.parse().map_err(|_| {
                AppError::Config(format!("{} must be an integer, got {:?}", ENV_SCAN_INTERVAL_MS, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_FALLBACK_SEED) {
            self.fallback_seed = Some(raw.parse().map_err(|_| {
                AppError::Config(format!("{} must be an integer, got {:?}", ENV_FALLBACK_SEED, raw))
            })?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.backend_url.trim().is_empty() {
            return Err(AppError::Config("backend_url is empty".into()));
        }
        if self.scan_interval_ms == 0 {
            return Err(AppError::Config("scan_interval_ms must be greater than zero".into()));
        }
        if self.scan_interval_ms > MAX_SCAN_INTERVAL_MS {
            return Err(AppError::Config(format!(
                "scan_interval_ms must be at most {}, got {}",
                MAX_SCAN_INTERVAL_MS, self.scan_interval_ms
            )));
        }
        if self.upload_max_edge == Some(0) {
            return Err(AppError::Config("upload_max_edge must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn predict_timeout(&self) -> Option<Duration> {
        self.predict_timeout_ms.map(Duration::from_millis)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"backend_url": "http://10.0.0.2:5000", "fallback_delay_ms": 0}}"#).unwrap();

        let config: AppConfig =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(config.backend_url, "http://10.0.0.2:5000");
        assert_eq!(config.fallback_delay_ms, 0);
        assert_eq!(config.scan_interval_ms, 3_000);
        assert_eq!(config.health_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND_URL, "http://backend:8080"),
            (ENV_SCAN_INTERVAL_MS, "1500"),
            (ENV_FALLBACK_SEED, "7"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend_url, "http://backend:8080");
        assert_eq!(config.scan_interval(), Duration::from_millis(1500));
        assert_eq!(config.fallback_seed, Some(7));
    }

    #[test]
    fn bad_override_is_config_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_SCAN_INTERVAL_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = AppConfig {
            scan_interval_ms: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_interval_from_env_is_rejected() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| {
                (key == ENV_SCAN_INTERVAL_MS).then(|| u64::MAX.to_string())
            })
            .unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.scan_interval_ms = MAX_SCAN_INTERVAL_MS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/leafscan.json"))).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}

use crate::error::AppError;
use crate::models::prediction_types::{HealthReport, PredictionResult};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Remote inference service as seen by the gateway. Implementations report every
/// failure as an error; deciding what to do about it is the gateway's job.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn base_url(&self) -> &str;

    async fn health(&self) -> Result<HealthReport, AppError>;

    /// Submits a base64-encoded image.
    async fn predict_encoded(&self, image_b64: String) -> Result<PredictionResult, AppError>;

    /// Asks the service to fetch and classify a remote image itself.
    async fn predict_url(&self, url: &str) -> Result<PredictionResult, AppError>;
}

#[derive(Serialize)]
struct PredictBody {
    image: String,
}

#[derive(Serialize)]
struct PredictUrlBody<'a> {
    url: &'a str,
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_prediction(response: reqwest::Response) -> Result<PredictionResult, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!("HTTP {}: {}", status, body.trim())));
        }

        response
            .json::<PredictionResult>()
            .await
            .map_err(|e| AppError::Backend(format!("Malformed prediction response: {}", e)))
    }
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn health(&self) -> Result<HealthReport, AppError> {
        let response = self.client.get(self.endpoint("/health")).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Backend(format!(
                "Health check returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<HealthReport>()
            .await
            .map_err(|e| AppError::Backend(format!("Malformed health response: {}", e)))
    }

    async fn predict_encoded(&self, image_b64: String) -> Result<PredictionResult, AppError> {
        let response = self
            .client
            .post(self.endpoint("/predict"))
            .json(&PredictBody { image: image_b64 })
            .send()
            .await?;
        Self::read_prediction(response).await
    }

    async fn predict_url(&self, url: &str) -> Result<PredictionResult, AppError> {
        let response = self
            .client
            .post(self.endpoint("/predict_url"))
            .json(&PredictUrlBody { url })
            .send()
            .await?;
        Self::read_prediction(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    const FULL_PREDICTION: &str = r#"{"className":"Apple___Black_rot","plantType":"Apple","isHealthy":false,"diseaseType":"Black rot","confidence":0.875}"#;

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&data[..end]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    /// Serves one canned response and hands back the raw request it answered.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            let _ = tx.send(request);
        });

        (format!("http://{}", addr), rx)
    }

    fn backend_at(url: &str) -> HttpBackend {
        HttpBackend::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn predict_posts_image_and_decodes_result() {
        let (url, request) = serve_once("200 OK", FULL_PREDICTION).await;

        let result = backend_at(&url).predict_encoded("bGVhZg==".into()).await.unwrap();
        assert_eq!(result, PredictionResult::from_label("Apple___Black_rot", 0.875).unwrap());

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /predict HTTP/1.1"));
        assert!(request.ends_with(r#"{"image":"bGVhZg=="}"#));
    }

    #[tokio::test]
    async fn predict_url_posts_the_url() {
        let (url, request) = serve_once("200 OK", FULL_PREDICTION).await;

        backend_at(&url)
            .predict_url("https://images.example.com/leaf.jpg")
            .await
            .unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /predict_url HTTP/1.1"));
        assert!(request.ends_with(r#"{"url":"https://images.example.com/leaf.jpg"}"#));
    }

    #[tokio::test]
    async fn server_error_on_predict_is_backend_error() {
        let (url, _request) =
            serve_once("500 Internal Server Error", r#"{"error":"model crashed"}"#).await;

        let err = backend_at(&url).predict_encoded("AAAA".into()).await.unwrap_err();
        match err {
            AppError::Backend(message) => {
                assert!(message.contains("500"));
                assert!(message.contains("model crashed"));
            }
            other => panic!("expected a backend error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_prediction_is_backend_error() {
        let (url, _request) = serve_once("200 OK", "<html>gateway</html>").await;
        let err = backend_at(&url).predict_encoded("AAAA".into()).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(ref m) if m.contains("Malformed")));
    }

    #[tokio::test]
    async fn partial_prediction_is_backend_error() {
        let (url, _request) = serve_once("200 OK", r#"{"className":"Apple___healthy"}"#).await;
        let err = backend_at(&url).predict_encoded("AAAA".into()).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
    }

    #[tokio::test]
    async fn label_outside_catalog_decodes_but_fails_validation() {
        let (url, _request) = serve_once(
            "200 OK",
            r#"{"className":"Banana___healthy","plantType":"Banana","isHealthy":true,"diseaseType":null,"confidence":0.9}"#,
        )
        .await;

        let result = backend_at(&url).predict_encoded("AAAA".into()).await.unwrap();
        assert_eq!(result.class_name, "Banana___healthy");
        assert!(matches!(result.validate(), Err(AppError::Backend(_))));
    }

    #[tokio::test]
    async fn health_reports_status_and_model_flag() {
        let (url, request) = serve_once("200 OK", r#"{"status":"healthy","model_loaded":true}"#).await;

        let report = backend_at(&url).health().await.unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.model_loaded, Some(true));
        assert!(request.await.unwrap().starts_with("GET /health HTTP/1.1"));
    }

    #[tokio::test]
    async fn starting_status_decodes_as_unhealthy() {
        let (url, _request) = serve_once("200 OK", r#"{"status":"starting"}"#).await;

        let report = backend_at(&url).health().await.unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.model_loaded, None);
    }

    #[tokio::test]
    async fn health_server_error_is_backend_error() {
        let (url, _request) = serve_once("503 Service Unavailable", r#"{"status":"down"}"#).await;
        let err = backend_at(&url).health().await.unwrap_err();
        assert!(matches!(err, AppError::Backend(ref m) if m.contains("503")));
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let backend = HttpBackend::new("http://127.0.0.1:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.base_url(), "http://127.0.0.1:5000");
        assert_eq!(backend.endpoint("/health"), "http://127.0.0.1:5000/health");
    }

    #[test]
    fn predict_body_matches_wire_format() {
        let body = serde_json::to_value(PredictBody { image: "AAAA".into() }).unwrap();
        assert_eq!(body, serde_json::json!({ "image": "AAAA" }));
    }

    #[tokio::test]
    async fn unreachable_backend_reports_error() {
        // nothing listens on the discard port
        let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert!(matches!(backend.health().await, Err(AppError::Backend(_))));
    }
}

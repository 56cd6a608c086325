use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum AppError {
    /// `predict` or a batch sweep was issued before the gateway was initialized.
    NotReady,
    UnknownImage(String),
    NoImages,
    /// A manual capture was requested while a cycle is still in flight.
    ScanBusy,
    Backend(String),
    Capture(String),
    Io(String),
    Config(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotReady => write!(f, "Prediction gateway is not initialized"),
            AppError::UnknownImage(uri) => write!(f, "Image is not in the working set: {}", uri),
            AppError::NoImages => write!(f, "No images to analyze"),
            AppError::ScanBusy => write!(f, "A capture is already in progress"),
            AppError::Backend(msg) => write!(f, "Inference backend error: {}", msg),
            AppError::Capture(msg) => write!(f, "Frame capture failed: {}", msg),
            AppError::Io(msg) => write!(f, "{}", msg),
            AppError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            AppError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Hard errors are programmer errors that callers must handle; everything
    /// else is either absorbed by the gateway or reported as a no-op.
    pub fn is_hard(&self) -> bool {
        matches!(self, AppError::NotReady | AppError::UnknownImage(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

use crate::error::AppError;
use crate::models::prediction_types::ImageRef;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;
use std::io::Cursor;
use std::path::PathBuf;

const UPLOAD_QUALITY: u8 = 85;

/// Maps a `file://` URI or a bare path to a filesystem path.
pub fn local_path(uri: &str) -> Option<PathBuf> {
    if uri.starts_with("http://") || uri.starts_with("https://") || uri.starts_with("data:") {
        return None;
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    if path.is_empty() {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Reads the raw bytes behind a local or inline (`data:`) image reference.
pub async fn read_image_bytes(image: &ImageRef) -> Result<Vec<u8>, AppError> {
    if let Some(payload) = image.uri.strip_prefix("data:") {
        let (_, b64) = payload
            .split_once(',')
            .ok_or_else(|| AppError::Io("Malformed data URI".to_string()))?;
        return base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .map_err(|e| AppError::Io(format!("Invalid base64 in data URI: {}", e)));
    }

    let path = local_path(&image.uri)
        .ok_or_else(|| AppError::Io(format!("Not a local image: {}", image.uri)))?;
    tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Io(format!("Failed to read image {}: {}", path.display(), e)))
}

/// Downscales to fit `max_edge` and re-encodes as JPEG. Images already within
/// bounds are returned untouched.
pub fn downscale_for_upload(bytes: Vec<u8>, max_edge: u32) -> Result<Vec<u8>, AppError> {
    let img = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| AppError::Io(format!("Failed to detect image format: {}", e)))?
        .decode()
        .map_err(|e| AppError::Io(format!("Failed to decode image: {}", e)))?;

    if img.width() <= max_edge && img.height() <= max_edge {
        return Ok(bytes);
    }

    let resized = img.resize(max_edge, max_edge, FilterType::Triangle);
    let rgb = image::DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, UPLOAD_QUALITY);
    rgb.write_with_encoder(encoder)
        .map_err(|e| AppError::Io(format!("Failed to encode upload image: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Produces the base64 payload sent as `{"image": ...}` to the inference service.
pub async fn encode_for_upload(image: &ImageRef, max_edge: Option<u32>) -> Result<String, AppError> {
    let mut bytes = read_image_bytes(image).await?;
    if let Some(max_edge) = max_edge {
        bytes = tokio::task::spawn_blocking(move || downscale_for_upload(bytes, max_edge))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to spawn resize task: {}", e)))??;
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
}

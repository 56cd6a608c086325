use crate::error::AppError;
use crate::models::prediction_types::ImageRef;
use crate::services::fs_service;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Image acquisition collaborator for the live scan loop.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture_frame(&self) -> Result<ImageRef, AppError>;
}

/// Replays the image files of a folder in name order, wrapping around at the end.
pub struct DirectoryCamera {
    frames: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl DirectoryCamera {
    pub fn open(dir: &str) -> Result<Self, AppError> {
        let frames = fs_service::list_image_files(dir)?;
        if frames.is_empty() {
            return Err(AppError::Capture(format!("No image frames in {}", dir)));
        }
        Ok(Self {
            frames,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl FrameSource for DirectoryCamera {
    async fn capture_frame(&self) -> Result<ImageRef, AppError> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        let path = &self.frames[index];
        if !path.exists() {
            return Err(AppError::Capture(format!("Frame disappeared: {}", path.display())));
        }
        Ok(ImageRef::new(fs_service::to_file_uri(path)))
    }
}

use crate::error::AppError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn to_file_uri(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.to_string_lossy())
}

fn sort_by_file_name(paths: &mut [PathBuf]) {
    paths.sort_by_key(|p| {
        p.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_lowercase()
    });
}

/// Image files directly inside `path`, sorted by name. Hidden files are skipped.
pub fn list_image_files(path: &str) -> Result<Vec<PathBuf>, AppError> {
    let dir_path = Path::new(path);
    if !dir_path.is_dir() {
        return Err(AppError::Io(format!("Not a directory: {}", path)));
    }

    let read_dir = std::fs::read_dir(dir_path)
        .map_err(|e| AppError::Io(format!("Cannot read directory {}: {}", path, e)))?;

    let mut images = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        match entry.file_type() {
            Ok(ft) if ft.is_file() => {}
            _ => continue,
        }

        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        if is_image_file(&path) {
            images.push(path);
        }
    }

    sort_by_file_name(&mut images);
    Ok(images)
}

/// Expands command-line inputs into image files: files are kept as given,
/// directories contribute their images (descending when `recursive`).
pub fn collect_images(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, AppError> {
    let mut images = Vec::new();

    for input in inputs {
        if input.is_file() {
            images.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            return Err(AppError::Io(format!("Path does not exist: {}", input.display())));
        }

        if recursive {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
                .map(|entry| entry.into_path())
                .filter(|path| is_image_file(path))
                .collect();
            found.sort();
            images.extend(found);
        } else {
            images.extend(list_image_files(&input.to_string_lossy())?);
        }
    }

    Ok(images)
}

// Recipe image storage
//
// Images arrive inline as `data:image/<ext>;base64,<payload>` strings and are
// stored under `<root>/recipes/`. Only the relative path is kept in the database.

use async_trait::async_trait;
use base64::Engine;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{AppError, AppResult};
use crate::validation::FieldErrors;

const IMAGE_DIR: &str = "recipes";
const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store an inline image and return its path relative to the media root
    async fn save_image(&self, data_uri: &str) -> AppResult<String>;

    /// Remove a previously stored file; missing files are ignored
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Public URL for a stored path
    fn url(&self, path: &str) -> String;
}

pub struct LocalMediaStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalMediaStorage {
    pub fn new(config: &MediaConfig) -> Self {
        let mut url_prefix = config.url.clone();
        if !url_prefix.ends_with('/') {
            url_prefix.push('/');
        }
        Self {
            root: PathBuf::from(&config.root),
            url_prefix,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn save_image(&self, data_uri: &str) -> AppResult<String> {
        let image = decode_data_uri(data_uri)?;

        let dir = self.root.join(IMAGE_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create media directory: {}", e)))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), image.extension);
        tokio::fs::write(dir.join(&file_name), &image.bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write image: {}", e)))?;

        tracing::debug!(file = %file_name, size = image.bytes.len(), "stored recipe image");
        Ok(format!("{}/{}", IMAGE_DIR, file_name))
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        if path.is_empty() {
            return Ok(());
        }
        match tokio::fs::remove_file(self.root.join(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::warn!("Failed to remove image {}: {}", path, e);
                Ok(())
            }
        }
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            return String::new();
        }
        format!("{}{}", self.url_prefix, path)
    }
}

/// Split and decode a base64 image data URI
pub fn decode_data_uri(data_uri: &str) -> AppResult<DecodedImage> {
    let invalid = || {
        AppError::Validation(FieldErrors::single(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        ))
    };

    let rest = data_uri.strip_prefix("data:image/").ok_or_else(invalid)?;
    let (extension, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let extension = extension.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid());
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(DecodedImage { extension, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_decode_data_uri() {
        let image = decode_data_uri(PIXEL).unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_data_uri("https://example.com/cat.png").is_err());
        assert!(decode_data_uri("data:image/png;base64,@@@").is_err());
        assert!(decode_data_uri("data:image/svg+xml;base64,PHN2Zz4=").is_err());
        assert!(decode_data_uri("data:image/png;base64,").is_err());
    }

    #[tokio::test]
    async fn test_save_url_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalMediaStorage::new(&MediaConfig {
            root: dir.path().to_string_lossy().into_owned(),
            url: "/media".to_string(),
        });

        let path = storage.save_image(PIXEL).await.unwrap();
        assert!(path.starts_with("recipes/"));
        assert!(path.ends_with(".png"));
        assert!(storage.root().join(&path).exists());
        assert_eq!(storage.url(&path), format!("/media/{}", path));

        storage.delete(&path).await.unwrap();
        assert!(!storage.root().join(&path).exists());
        storage.delete(&path).await.unwrap();
    }
}

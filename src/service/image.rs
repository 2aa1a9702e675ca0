//! Image uploads for application photos.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use crate::config::UploadConfig;
use crate::domain::{Image, new_id};
use crate::error::{AppError, Result};
use crate::storage::{Collection, Storage};

/// Service for uploaded images.
pub struct ImageService {
    images: Collection<Image>,
    limits: UploadConfig,
}

impl ImageService {
    /// Create a new image service.
    pub fn new(storage: Arc<dyn Storage>, limits: UploadConfig) -> Self {
        Self {
            images: Collection::new(storage),
            limits,
        }
    }

    /// Largest accepted upload in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.limits.max_image_bytes
    }

    /// Store an uploaded image.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty upload, a non-image
    /// content type, or an oversized file.
    pub async fn upload(
        &self,
        filename: Option<String>,
        content_type: &str,
        data: Bytes,
    ) -> Result<Image> {
        if data.is_empty() {
            return Err(AppError::BadRequest("No image file provided".to_string()));
        }
        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest(
                "Only image files are allowed".to_string(),
            ));
        }
        if data.len() > self.limits.max_image_bytes {
            return Err(AppError::BadRequest(format!(
                "Image exceeds {} bytes",
                self.limits.max_image_bytes
            )));
        }

        let image = Image {
            id: new_id(),
            filename,
            content_type: content_type.to_string(),
            data: data.to_vec(),
            created_at: Utc::now(),
        };
        self.images.insert(&image).await?;
        metrics::counter!("admitdesk_images_uploaded_total").increment(1);

        info!(id = %image.id, size = image.data.len(), content_type, "Image stored");
        Ok(image)
    }

    /// Get an image by id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if no such image exists.
    pub async fn get(&self, id: &str) -> Result<Image> {
        self.images
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Image".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileStorageConfig;
    use crate::storage::file::FileStorage;
    use tempfile::TempDir;

    fn create_service(max_image_bytes: usize) -> (ImageService, TempDir) {
        let temp = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(
            FileStorage::new(&FileStorageConfig {
                data_dir: temp.path().to_path_buf(),
            })
            .unwrap(),
        );
        (
            ImageService::new(storage, UploadConfig { max_image_bytes }),
            temp,
        )
    }

    #[tokio::test]
    async fn test_upload_and_get() {
        let (service, _temp) = create_service(1024);

        let image = service
            .upload(
                Some("me.png".to_string()),
                "image/png",
                Bytes::from_static(&[1, 2, 3]),
            )
            .await
            .unwrap();
        let fetched = service.get(&image.id).await.unwrap();
        assert_eq!(fetched.data, vec![1, 2, 3]);
        assert_eq!(fetched.content_type, "image/png");

        assert!(matches!(
            service.get("missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (service, _temp) = create_service(4);

        for (content_type, data) in [
            ("text/plain", vec![1_u8]),
            ("image/png", vec![]),
            ("image/png", vec![0; 5]),
        ] {
            assert!(matches!(
                service
                    .upload(None, content_type, Bytes::from(data))
                    .await
                    .unwrap_err(),
                AppError::BadRequest(_)
            ));
        }
    }
}

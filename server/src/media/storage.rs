//! Stores validated images under the media root with generated names.

use std::path::Path;

use uuid::Uuid;

use super::{data_uri, processing};
use crate::error::{ApiError, ValidationError};

pub const RECIPE_IMAGES_DIR: &str = "recipes/images";
pub const AVATARS_DIR: &str = "avatars";

/// Validates `data` as an image and writes it to `<media_root>/<dir>/<uuid>.<ext>`.
/// Returns the path relative to the media root.
pub async fn store_bytes(media_root: &Path, dir: &str, data: &[u8]) -> Result<String, ApiError> {
    let format = processing::validate_image(data).map_err(ValidationError::InvalidImage)?;

    let relative = format!("{dir}/{}.{}", Uuid::new_v4(), processing::extension(format));
    let target = media_root.join(&relative);

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to create {}: {e}", parent.display())))?;
    }
    tokio::fs::write(&target, data)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write {}: {e}", target.display())))?;

    tracing::debug!(path = %relative, bytes = data.len(), "stored image");
    Ok(relative)
}

/// Stores an image submitted as a JSON field. Only base64 data URIs are accepted.
pub async fn store_image_field(media_root: &Path, dir: &str, value: &str) -> Result<String, ApiError> {
    if !data_uri::is_data_uri(value) {
        return Err(ValidationError::InvalidImage(
            "Expected a data:image/<ext>;base64,<payload> URI".to_string(),
        )
        .into());
    }
    let decoded = data_uri::decode(value).map_err(ValidationError::InvalidImage)?;
    // The stored extension comes from the sniffed format, not the client's claim
    tracing::debug!(claimed = %decoded.ext, bytes = decoded.bytes.len(), "decoded image data URI");
    store_bytes(media_root, dir, &decoded.bytes).await
}

/// Deletes a stored file. Failures are logged, not returned.
pub async fn remove(media_root: &Path, stored_path: &str) {
    if stored_path.contains("..") {
        tracing::warn!(path = %stored_path, "refusing to remove path outside media root");
        return;
    }
    if let Err(e) = tokio::fs::remove_file(media_root.join(stored_path)).await {
        tracing::warn!(path = %stored_path, error = %e, "failed to remove stored image");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::processing::tiny_png;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    #[tokio::test]
    async fn test_store_bytes_writes_under_dir() {
        let root = tempfile::tempdir().unwrap();
        let png = tiny_png();

        let stored = store_bytes(root.path(), RECIPE_IMAGES_DIR, &png).await.unwrap();

        assert!(stored.starts_with("recipes/images/"));
        assert!(stored.ends_with(".png"));
        assert_eq!(std::fs::read(root.path().join(&stored)).unwrap(), png);
    }

    #[tokio::test]
    async fn test_store_image_field_decodes_data_uri() {
        let root = tempfile::tempdir().unwrap();
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(tiny_png()));

        let stored = store_image_field(root.path(), AVATARS_DIR, &uri).await.unwrap();
        assert!(stored.starts_with("avatars/"));
    }

    #[tokio::test]
    async fn test_store_image_field_rejects_non_image_payload() {
        let root = tempfile::tempdir().unwrap();
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(b"hello"));

        let err = store_image_field(root.path(), AVATARS_DIR, &uri).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_generated_names_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let png = tiny_png();
        let a = store_bytes(root.path(), AVATARS_DIR, &png).await.unwrap();
        let b = store_bytes(root.path(), AVATARS_DIR, &png).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_remove_deletes_file() {
        let root = tempfile::tempdir().unwrap();
        let stored = store_bytes(root.path(), AVATARS_DIR, &tiny_png()).await.unwrap();

        remove(root.path(), &stored).await;
        assert!(!root.path().join(&stored).exists());
    }
}

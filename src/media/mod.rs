//! Hosted image storage.
//!
//! Post images are uploaded to a third-party media host and referenced by
//! URL. Every backend must be able to recover its own object identifier from
//! a URL it handed out, because deletion requests only carry the URL.

pub mod cloudinary;
pub mod s3;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, MediaBackend};

pub use cloudinary::CloudinaryClient;
pub use s3::S3MediaStore;

/// Image formats accepted for post uploads.
pub const ALLOWED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "svg", "ico", "jfif", "webp"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
    #[error("image format '{0}' is not allowed")]
    UnsupportedFormat(String),
    #[error("media host request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("media host returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("storage error: {0}")]
    Storage(String),
}

/// A decoded image ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Lowercase file extension, one of [`ALLOWED_FORMATS`].
    pub format: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Parse a base64 `data:` URL such as `data:image/png;base64,iVBOR...`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not a base64 image data URL or the
    /// format is outside [`ALLOWED_FORMATS`].
    pub fn from_data_url(data_url: &str) -> Result<Self, MediaError> {
        let rest = data_url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| MediaError::InvalidPayload("expected a data: URL".to_string()))?;

        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| MediaError::InvalidPayload("missing ',' separator".to_string()))?;

        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| MediaError::InvalidPayload("only base64 data URLs are supported".to_string()))?;

        let subtype = mime
            .strip_prefix("image/")
            .ok_or_else(|| MediaError::UnsupportedFormat(mime.to_string()))?;

        let format = normalize_format(subtype);
        if !ALLOWED_FORMATS.contains(&format.as_str()) {
            return Err(MediaError::UnsupportedFormat(format));
        }

        let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| MediaError::InvalidPayload(format!("bad base64 data: {e}")))?;

        if bytes.is_empty() {
            return Err(MediaError::InvalidPayload("image is empty".to_string()));
        }

        Ok(Self { format, bytes })
    }

    /// MIME type for the stored object.
    #[must_use]
    pub fn content_type(&self) -> String {
        mime_guess::from_ext(&self.format)
            .first_or_octet_stream()
            .to_string()
    }
}

fn normalize_format(subtype: &str) -> String {
    match subtype.to_lowercase().as_str() {
        "svg+xml" => "svg".to_string(),
        "x-icon" | "vnd.microsoft.icon" => "ico".to_string(),
        "pjpeg" => "jfif".to_string(),
        other => other.to_string(),
    }
}

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

/// A media host that stores post images.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Upload an image under `key` (without extension).
    async fn upload(&self, key: &str, image: &ImagePayload) -> Result<UploadedImage, MediaError>;

    /// Recover the backend identifier from a URL returned by [`MediaStore::upload`].
    fn public_id_from_url(&self, url: &str) -> Option<String>;

    /// Delete an image. Returns false if the host had nothing to delete.
    async fn destroy(&self, public_id: &str) -> Result<bool, MediaError>;
}

/// Build the backend selected by `MEDIA_BACKEND`.
///
/// # Errors
///
/// Returns an error if the selected backend is missing credentials.
pub fn from_config(config: &Config) -> Result<Arc<dyn MediaStore>> {
    let store: Arc<dyn MediaStore> = match config.media_backend {
        MediaBackend::Cloudinary => Arc::new(
            CloudinaryClient::new(config).context("Failed to initialize Cloudinary client")?,
        ),
        MediaBackend::S3 => {
            Arc::new(S3MediaStore::new(config).context("Failed to initialize S3 media store")?)
        }
    };

    info!(backend = store.backend_name(), "Media store configured");
    Ok(store)
}

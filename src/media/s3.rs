use anyhow::{Context, Result};
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use tracing::{debug, info};

use super::{ImagePayload, MediaError, MediaStore, UploadedImage};
use crate::config::Config;

/// Post images in an S3-compatible bucket.
///
/// The object key doubles as the public identifier; URLs are the configured
/// public base (or the bucket's default address) followed by the key.
#[derive(Clone)]
pub struct S3MediaStore {
    bucket: Box<Bucket>,
    prefix: String,
    public_base: String,
}

impl S3MediaStore {
    /// Create a new store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials or the bucket name are missing.
    pub fn new(config: &Config) -> Result<Self> {
        let bucket_name = config.s3_bucket.as_deref().context("S3_BUCKET not set")?;
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").context("AWS_ACCESS_KEY_ID not set")?;
        let secret_key =
            std::env::var("AWS_SECRET_ACCESS_KEY").context("AWS_SECRET_ACCESS_KEY not set")?;

        let credentials = Credentials::new(Some(&access_key), Some(&secret_key), None, None, None)
            .context("Failed to create S3 credentials")?;

        let region = if let Some(ref endpoint) = config.s3_endpoint {
            Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            }
        } else {
            config.s3_region.parse().unwrap_or(Region::UsEast1)
        };

        let bucket =
            Bucket::new(bucket_name, region, credentials).context("Failed to create S3 bucket")?;

        // Use path-style for custom endpoints (MinIO, R2, etc.)
        let bucket = if config.s3_endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        let public_base = public_base_url(
            bucket_name,
            config.s3_endpoint.as_deref(),
            config.s3_public_url.as_deref(),
        );

        Ok(Self {
            bucket,
            prefix: config.s3_prefix.clone(),
            public_base,
        })
    }

    /// Get the public URL for an object.
    #[must_use]
    pub fn get_public_url(&self, s3_key: &str) -> String {
        format!("{}/{}", self.public_base, s3_key)
    }

    async fn object_exists(&self, s3_key: &str) -> Result<bool, MediaError> {
        match self.bucket.head_object(s3_key).await {
            // Without `fail-on-err` the status comes back instead of an error.
            Ok((_, code)) => Ok((200..300).contains(&code)),
            Err(s3::error::S3Error::HttpFailWithBody(404, _) | s3::error::S3Error::HttpFail) => {
                Ok(false)
            }
            Err(e) => Err(MediaError::Storage(format!("S3 head object failed: {e}"))),
        }
    }
}

fn public_base_url(bucket: &str, endpoint: Option<&str>, public_url: Option<&str>) -> String {
    match (public_url, endpoint) {
        (Some(base), _) => base.trim_end_matches('/').to_string(),
        (None, Some(endpoint)) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
        (None, None) => format!("https://{bucket}.s3.amazonaws.com"),
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn upload(&self, key: &str, image: &ImagePayload) -> Result<UploadedImage, MediaError> {
        let s3_key = format!("{}{key}.{}", self.prefix, image.format);
        let content_type = image.content_type();

        debug!(key = %s3_key, content_type = %content_type, "Uploading image to S3");

        let response = self
            .bucket
            .put_object_with_content_type(&s3_key, &image.bytes, &content_type)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to upload image to S3: {e}")))?;
        if !(200..300).contains(&response.status_code()) {
            return Err(MediaError::Api {
                status: response.status_code(),
                body: String::from_utf8_lossy(response.as_slice()).into_owned(),
            });
        }

        let url = self.get_public_url(&s3_key);
        info!(key = %s3_key, url = %url, "Uploaded image to S3");

        Ok(UploadedImage {
            url,
            public_id: s3_key,
        })
    }

    fn public_id_from_url(&self, url: &str) -> Option<String> {
        let key = url
            .strip_prefix(&self.public_base)?
            .trim_start_matches('/');
        let key = key.split(['?', '#']).next().unwrap_or(key);
        if key.is_empty() {
            return None;
        }
        urlencoding::decode(key).ok().map(std::borrow::Cow::into_owned)
    }

    async fn destroy(&self, public_id: &str) -> Result<bool, MediaError> {
        if !self.object_exists(public_id).await? {
            return Ok(false);
        }

        debug!(key = %public_id, "Deleting S3 object");

        let response = self
            .bucket
            .delete_object(public_id)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to delete S3 object: {e}")))?;

        Ok((200..300).contains(&response.status_code()))
    }
}

impl std::fmt::Debug for S3MediaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3MediaStore")
            .field("bucket", &self.bucket.name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

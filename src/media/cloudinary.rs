//! Cloudinary upload and destroy API client.
//!
//! Requests are signed: the parameters (minus `file`, `api_key` and
//! `resource_type`) are sorted, joined as `k=v&k=v`, suffixed with the API
//! secret and hashed with the account's signature algorithm.

use std::borrow::Cow;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::multipart;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{ImagePayload, MediaError, MediaStore, UploadedImage, ALLOWED_FORMATS};
use crate::config::{Config, SignatureAlgorithm};

static VERSION_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v\d+$").unwrap());

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: Option<String>,
}

/// Cloudinary client configured once per process.
#[derive(Clone)]
pub struct CloudinaryClient {
    http: reqwest::Client,
    api_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    upload_preset: Option<String>,
    signature_algorithm: SignatureAlgorithm,
}

impl CloudinaryClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_url: config.cloudinary_api_url.trim_end_matches('/').to_string(),
            cloud_name: config
                .cloudinary_cloud_name
                .clone()
                .context("CLOUDINARY_CLOUD_NAME not set")?,
            api_key: config
                .cloudinary_api_key
                .clone()
                .context("CLOUDINARY_API_KEY not set")?,
            api_secret: config
                .cloudinary_api_secret
                .clone()
                .context("CLOUDINARY_API_SECRET not set")?,
            upload_preset: config.cloudinary_upload_preset.clone(),
            signature_algorithm: config.cloudinary_signature_algorithm,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1_1/{}/image/{action}", self.api_url, self.cloud_name)
    }

    /// Sign a set of request parameters.
    #[must_use]
    pub fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let payload = format!("{to_sign}{}", self.api_secret);

        match self.signature_algorithm {
            SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(payload.as_bytes())),
            SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(payload.as_bytes())),
        }
    }

    fn signed_form(&self, params: Vec<(&'static str, String)>) -> multipart::Form {
        let signature = self.sign(&params);
        let mut form = multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }
        form
    }

    async fn error_from(response: reqwest::Response) -> MediaError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        MediaError::Api { status, body }
    }
}

#[async_trait]
impl MediaStore for CloudinaryClient {
    fn backend_name(&self) -> &'static str {
        "cloudinary"
    }

    async fn upload(&self, key: &str, image: &ImagePayload) -> Result<UploadedImage, MediaError> {
        let mut params = vec![
            ("allowed_formats", ALLOWED_FORMATS.join(",")),
            ("public_id", key.to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];
        if let Some(preset) = &self.upload_preset {
            params.push(("upload_preset", preset.clone()));
        }

        let part = multipart::Part::bytes(image.bytes.clone())
            .file_name(format!("{key}.{}", image.format))
            .mime_str(&image.content_type())?;
        let form = self.signed_form(params).part("file", part);

        let url = self.endpoint("upload");
        debug!(url = %url, public_id = %key, bytes = image.bytes.len(), "Uploading image to Cloudinary");

        let response = self.http.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let uploaded: UploadResponse = response.json().await?;
        let url = uploaded
            .secure_url
            .or(uploaded.url)
            .ok_or_else(|| MediaError::Api {
                status: 200,
                body: "upload response had no url".to_string(),
            })?;

        info!(public_id = %uploaded.public_id, url = %url, "Uploaded image to Cloudinary");

        Ok(UploadedImage {
            url,
            public_id: uploaded.public_id,
        })
    }

    fn public_id_from_url(&self, url: &str) -> Option<String> {
        extract_public_id(url)
    }

    async fn destroy(&self, public_id: &str) -> Result<bool, MediaError> {
        let params = vec![
            ("public_id", public_id.to_string()),
            ("timestamp", chrono::Utc::now().timestamp().to_string()),
        ];
        let form = self.signed_form(params);

        let url = self.endpoint("destroy");
        debug!(url = %url, public_id = %public_id, "Destroying Cloudinary image");

        let response = self.http.post(&url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let destroyed: DestroyResponse = response.json().await?;
        match destroyed.result.as_deref() {
            Some("ok") => {
                info!(public_id = %public_id, "Destroyed Cloudinary image");
                Ok(true)
            }
            other => {
                warn!(public_id = %public_id, result = ?other, "Cloudinary had nothing to destroy");
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for CloudinaryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryClient")
            .field("cloud_name", &self.cloud_name)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// Extract the public ID from a Cloudinary delivery URL.
///
/// `https://res.cloudinary.com/demo/image/upload/v1712345678/folder/abc_1.png`
/// yields `folder/abc_1`. The version segment, query string and file
/// extension are dropped.
#[must_use]
pub fn extract_public_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/upload/")?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    let start = segments
        .iter()
        .position(|s| VERSION_SEGMENT.is_match(s))
        .map_or(0, |i| i + 1);
    let path = segments.get(start..)?.join("/");
    if path.is_empty() {
        return None;
    }

    let stem = match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => path.as_str(),
    };

    urlencoding::decode(stem).ok().map(Cow::into_owned)
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Web Server
    pub web_host: String,
    pub web_port: u16,
    pub max_body_bytes: usize,

    // Media Store
    pub media_backend: MediaBackend,

    // Cloudinary
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
    pub cloudinary_api_url: String,
    pub cloudinary_signature_algorithm: SignatureAlgorithm,

    // S3 Storage
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_prefix: String,
    pub s3_public_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaBackend {
    /// Hosted image service with signed upload/destroy calls
    Cloudinary,
    /// Any S3-compatible bucket (AWS, R2, MinIO)
    S3,
}

/// Digest used to sign Cloudinary API requests. Must match the account setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/social.sqlite")),

            // Web Server
            web_host: env_or_default("WEB_HOST", "0.0.0.0"),
            web_port: parse_env_u16("WEB_PORT", 8080)?,
            max_body_bytes: parse_env_usize("MAX_BODY_BYTES", 50 * 1024 * 1024)?,

            // Media Store
            media_backend: parse_media_backend(&env_or_default("MEDIA_BACKEND", "cloudinary"))?,

            // Cloudinary
            cloudinary_cloud_name: optional_env("CLOUDINARY_CLOUD_NAME"),
            cloudinary_api_key: optional_env("CLOUDINARY_API_KEY"),
            cloudinary_api_secret: optional_env("CLOUDINARY_API_SECRET"),
            cloudinary_upload_preset: optional_env("CLOUDINARY_UPLOAD_PRESET"),
            cloudinary_api_url: env_or_default("CLOUDINARY_API_URL", "https://api.cloudinary.com"),
            cloudinary_signature_algorithm: parse_signature_algorithm(&env_or_default(
                "CLOUDINARY_SIGNATURE_ALGORITHM",
                "sha1",
            ))?,

            // S3 Storage
            s3_bucket: optional_env("S3_BUCKET"),
            s3_region: env_or_default("S3_REGION", "us-east-1"),
            s3_endpoint: optional_env("S3_ENDPOINT"),
            s3_prefix: env_or_default("S3_PREFIX", "posts/"),
            s3_public_url: optional_env("S3_PUBLIC_URL"),
        })
    }

    /// Configuration with local defaults and a Cloudinary backend pointed at
    /// placeholder credentials. Intended for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from("./data/test.sqlite"),
            web_host: "127.0.0.1".to_string(),
            web_port: 0,
            max_body_bytes: 50 * 1024 * 1024,
            media_backend: MediaBackend::Cloudinary,
            cloudinary_cloud_name: Some("demo".to_string()),
            cloudinary_api_key: Some("123456789012345".to_string()),
            cloudinary_api_secret: Some("test-secret".to_string()),
            cloudinary_upload_preset: None,
            cloudinary_api_url: "https://api.cloudinary.com".to_string(),
            cloudinary_signature_algorithm: SignatureAlgorithm::Sha1,
            s3_bucket: None,
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_prefix: "posts/".to_string(),
            s3_public_url: None,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// The selected media backend must have its credentials set; the other
    /// backend's settings are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_BODY_BYTES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        match self.media_backend {
            MediaBackend::Cloudinary => {
                require_set("CLOUDINARY_CLOUD_NAME", self.cloudinary_cloud_name.as_deref())?;
                require_set("CLOUDINARY_API_KEY", self.cloudinary_api_key.as_deref())?;
                require_set("CLOUDINARY_API_SECRET", self.cloudinary_api_secret.as_deref())?;
            }
            MediaBackend::S3 => {
                require_set("S3_BUCKET", self.s3_bucket.as_deref())?;
            }
        }
        Ok(())
    }
}

fn require_set(name: &str, value: Option<&str>) -> Result<(), ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_media_backend(value: &str) -> Result<MediaBackend, ConfigError> {
    match value.to_lowercase().as_str() {
        "cloudinary" => Ok(MediaBackend::Cloudinary),
        "s3" => Ok(MediaBackend::S3),
        _ => Err(ConfigError::InvalidValue {
            name: "MEDIA_BACKEND".to_string(),
            message: format!("must be 'cloudinary' or 's3', got '{value}'"),
        }),
    }
}

fn parse_signature_algorithm(value: &str) -> Result<SignatureAlgorithm, ConfigError> {
    match value.to_lowercase().as_str() {
        "sha1" => Ok(SignatureAlgorithm::Sha1),
        "sha256" => Ok(SignatureAlgorithm::Sha256),
        _ => Err(ConfigError::InvalidValue {
            name: "CLOUDINARY_SIGNATURE_ALGORITHM".to_string(),
            message: format!("must be 'sha1' or 'sha256', got '{value}'"),
        }),
    }
}

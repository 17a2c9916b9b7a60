#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cloudflare R2 object storage for report images.
//!
//! Annotated detection previews and manual-report photos are uploaded to
//! the `pothole-map-images` R2 bucket and referenced from incident
//! records by public URL. Upload failures never fail an ingestion
//! request - the pipeline logs and continues without an image.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `CLOUDFLARE_ACCOUNT_ID` | Yes | Cloudflare account ID (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | Yes | S3-compatible access key for R2 |
//! | `R2_SECRET_ACCESS_KEY` | Yes | S3-compatible secret key for R2 |
//! | `R2_PUBLIC_BASE_URL` | Yes | Public bucket base URL for serving images |

use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use aws_sdk_s3::primitives::ByteStream;

/// R2 bucket name for report images.
const BUCKET: &str = "pothole-map-images";

/// Errors that can occur during object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `DeleteObject` failed.
    #[error("Failed to delete s3://{bucket}/{key}: {source}")]
    Delete {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Trait for the binary object storage collaborator.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads an object and returns its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] if the upload fails.
    async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError>;

    /// Deletes an object by name.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] if the delete fails.
    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError>;
}

/// Client for storing report images in Cloudflare R2.
pub struct R2ImageStore {
    client: aws_sdk_s3::Client,
    public_base_url: String,
}

impl R2ImageStore {
    /// Creates a new R2 image store from environment variables.
    ///
    /// Reads `CLOUDFLARE_ACCOUNT_ID`, `R2_ACCESS_KEY_ID`,
    /// `R2_SECRET_ACCESS_KEY`, and `R2_PUBLIC_BASE_URL` from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::MissingEnv`] if any required variable
    /// is unset.
    pub fn from_env() -> Result<Self, ObjectStoreError> {
        let account_id = require_env("CLOUDFLARE_ACCOUNT_ID")?;
        let access_key = require_env("R2_ACCESS_KEY_ID")?;
        let secret_key = require_env("R2_SECRET_ACCESS_KEY")?;
        let public_base_url = require_env("R2_PUBLIC_BASE_URL")?;

        let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com");
        let creds = Credentials::new(&access_key, &secret_key, None, None, "r2-env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for R2ImageStore {
    async fn upload(
        &self,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        self.client
            .put_object()
            .bucket(BUCKET)
            .key(name)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Upload {
                bucket: BUCKET.to_string(),
                key: name.to_string(),
                source: Box::new(e),
            })?;

        let url = format!("{}/{name}", self.public_base_url);
        log::debug!("Uploaded image to {url}");
        Ok(url)
    }

    async fn delete(&self, name: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(BUCKET)
            .key(name)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Delete {
                bucket: BUCKET.to_string(),
                key: name.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, ObjectStoreError> {
    std::env::var(name).map_err(|_| ObjectStoreError::MissingEnv {
        name: name.to_string(),
    })
}

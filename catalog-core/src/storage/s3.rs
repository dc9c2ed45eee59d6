use async_trait::async_trait;
use catalog_config::StorageConfig;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use url::{Position, Url};

use super::ObjectStorage;
use super::sigv4::{SigV4Presigner, canonical_uri};
use crate::error::{CatalogError, Result};

/// Lifetime of the URLs used for the bucket existence check and creation calls.
const CONTROL_EXPIRY: Duration = Duration::from_secs(60);

/// S3-compatible storage (MinIO, AWS) addressed path-style:
/// `{scheme}://{endpoint}/{bucket}/{key}`.
#[derive(Clone)]
pub struct S3Storage {
    http: reqwest::Client,
    origin: Url,
    bucket: String,
    presigner: SigV4Presigner,
}

impl fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Storage")
            .field("origin", &self.origin.as_str())
            .field("bucket", &self.bucket)
            .field("presigner", &self.presigner)
            .finish()
    }
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let (Some(access_key), Some(secret_key)) =
            (config.access_key.as_deref(), config.secret_key.as_deref())
        else {
            return Err(CatalogError::InvalidInput(
                "storage access_key and secret_key are required".into(),
            ));
        };
        if config.bucket.trim().is_empty() {
            return Err(CatalogError::InvalidInput(
                "storage bucket must not be empty".into(),
            ));
        }

        let raw = if config.endpoint.contains("://") {
            config.endpoint.clone()
        } else {
            let scheme = if config.use_ssl { "https" } else { "http" };
            format!("{scheme}://{}", config.endpoint)
        };
        let origin = Url::parse(&raw).map_err(|err| {
            CatalogError::InvalidInput(format!(
                "invalid storage endpoint {:?}: {err}",
                config.endpoint
            ))
        })?;
        if origin.host_str().is_none() {
            return Err(CatalogError::InvalidInput(format!(
                "storage endpoint {:?} has no host",
                config.endpoint
            )));
        }

        info!(endpoint = %origin, bucket = %config.bucket, "object storage configured");

        Ok(Self {
            http: reqwest::Client::new(),
            origin,
            bucket: config.bucket.clone(),
            presigner: SigV4Presigner::new(access_key, secret_key, &config.region),
        })
    }

    /// `host[:port]` exactly as sent in the `Host` header.
    fn host(&self) -> &str {
        &self.origin[Position::BeforeHost..Position::AfterPort]
    }

    fn presigned(&self, method: &str, path: &str, expiry: Duration) -> Result<Url> {
        let query = self
            .presigner
            .presign(method, self.host(), path, expiry, Utc::now())?;
        let origin = &self.origin[..Position::BeforePath];
        let raw = format!("{origin}{}?{query}", canonical_uri(path));
        Url::parse(&raw)
            .map_err(|err| CatalogError::Internal(format!("Failed to build presigned url: {err}")))
    }

    async fn bucket_exists(&self) -> Result<bool> {
        let url = self.presigned("HEAD", &self.bucket, CONTROL_EXPIRY)?;
        let response = self.http.request(Method::HEAD, url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(CatalogError::HttpStatus {
                status,
                url: format!("{}/{}", self.origin, self.bucket),
                body: String::new(),
            }),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn ensure_bucket(&self) -> Result<()> {
        if self.bucket_exists().await? {
            debug!(bucket = %self.bucket, "bucket already exists");
            return Ok(());
        }

        let url = self.presigned("PUT", &self.bucket, CONTROL_EXPIRY)?;
        let response = self.http.request(Method::PUT, url).send().await?;
        let status = response.status();
        // 409 means another process created it between the existence check and here.
        if status.is_success() || status == StatusCode::CONFLICT {
            info!(bucket = %self.bucket, "created storage bucket");
            return Ok(());
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(CatalogError::HttpStatus { status, url, body })
    }

    async fn presigned_put_url(&self, key: &str, expiry: Duration) -> Result<Url> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(CatalogError::InvalidInput("object key must not be empty".into()));
        }
        self.presigned("PUT", &format!("{}/{key}", self.bucket), expiry)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

//! Signed, short-lived links to objects in the private document bucket.

pub mod path;
mod router;
pub mod token;

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use crate::config::StorageConfig;
use crate::error::ApiError;
use crate::store::object_store::ObjectStore;
use crate::store::StoreError;

pub use path::{normalize_path, sanitize_filename};
pub use router::storage_router;
pub use token::{clamp_ttl, SignedLink, StorageClaims, TokenSigner};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    InvalidPath(String),
    #[error("bucket '{0}' is not allowed")]
    BucketNotAllowed(String),
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token is missing bucket or path")]
    IncompleteToken,
    #[error("could not sign storage token: {0}")]
    Signing(String),
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::InvalidPath(_)
            | StorageError::BucketNotAllowed(_)
            | StorageError::IncompleteToken => ApiError::invalid(value.to_string()),
            StorageError::InvalidToken => ApiError::Forbidden(value.to_string()),
            StorageError::Signing(_) => ApiError::internal("could not sign storage link", value),
        }
    }
}

/// Object bytes ready to be streamed back through the proxy.
#[derive(Debug, Clone)]
pub struct ProxiedObject {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
    pub download: bool,
}

impl ProxiedObject {
    pub fn content_disposition(&self) -> String {
        let mode = if self.download { "attachment" } else { "inline" };
        format!("{mode}; filename=\"{}\"", self.filename)
    }
}

impl IntoResponse for ProxiedObject {
    fn into_response(self) -> Response {
        let disposition = self.content_disposition();
        (
            [
                (CONTENT_TYPE, self.content_type),
                (CONTENT_DISPOSITION, disposition),
                (CACHE_CONTROL, "private, max-age=60".to_string()),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// Bucket policy plus token signing; needs no object store, so offline tools can mint links.
#[derive(Clone)]
pub struct LinkIssuer {
    signer: TokenSigner,
    bucket: String,
    allowed_buckets: Vec<String>,
}

impl LinkIssuer {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            signer: TokenSigner::new(&config.jwt_secret, &config.api_base_url),
            bucket: config.bucket.clone(),
            allowed_buckets: vec![config.bucket.clone()],
        }
    }

    fn resolve_bucket<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str, StorageError> {
        let bucket = requested
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
            .unwrap_or(&self.bucket);
        if self.allowed_buckets.iter().any(|allowed| allowed == bucket) {
            Ok(bucket)
        } else {
            Err(StorageError::BucketNotAllowed(bucket.to_string()))
        }
    }

    pub fn sign_at(
        &self,
        bucket: Option<&str>,
        raw_path: &str,
        ttl: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<SignedLink, StorageError> {
        let bucket = self.resolve_bucket(bucket)?;
        let path = normalize_path(raw_path, bucket)?;
        self.signer.sign_at(bucket, &path, ttl, now)
    }

    /// Verified bucket and normalized path carried by a token.
    fn redeemable_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, String), StorageError> {
        let claims = self.signer.verify_at(token, now)?;
        let bucket = self.resolve_bucket(Some(&claims.bucket))?;
        let path = normalize_path(&claims.path, bucket)?;
        Ok((bucket.to_string(), path))
    }
}

#[derive(Clone)]
pub struct StorageProxy {
    links: LinkIssuer,
    objects: Arc<dyn ObjectStore>,
}

impl StorageProxy {
    pub fn new(config: &StorageConfig, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            links: LinkIssuer::new(config),
            objects,
        }
    }

    /// Default bucket for uploads and generated reports.
    pub fn bucket(&self) -> &str {
        &self.links.bucket
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn sign(
        &self,
        bucket: Option<&str>,
        raw_path: &str,
        ttl: Option<i64>,
    ) -> Result<SignedLink, StorageError> {
        self.links.sign_at(bucket, raw_path, ttl, Utc::now())
    }

    pub fn sign_at(
        &self,
        bucket: Option<&str>,
        raw_path: &str,
        ttl: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<SignedLink, StorageError> {
        self.links.sign_at(bucket, raw_path, ttl, now)
    }

    /// Best-effort link for list views; a bad stored path yields `None`.
    pub fn link_for(&self, raw_path: Option<&str>) -> Option<String> {
        let raw_path = raw_path.filter(|path| !path.trim().is_empty())?;
        match self.sign(None, raw_path, None) {
            Ok(link) => Some(link.url),
            Err(err) => {
                tracing::warn!(error = %err, path = raw_path, "could not sign stored path");
                None
            }
        }
    }

    pub async fn redeem(&self, token: &str, download: bool) -> Result<ProxiedObject, ApiError> {
        self.redeem_at(token, download, Utc::now()).await
    }

    pub async fn redeem_at(
        &self,
        token: &str,
        download: bool,
        now: DateTime<Utc>,
    ) -> Result<ProxiedObject, ApiError> {
        let (bucket, path) = self.links.redeemable_at(token, now)?;

        let bytes = self
            .objects
            .download(&bucket, &path)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => ApiError::NotFound("file not found".into()),
                other => ApiError::internal("could not fetch stored object", other),
            })?;

        let filename = sanitize_filename(&path);
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        tracing::debug!(bucket = %bucket, path = %path, download, "serving proxied object");

        Ok(ProxiedObject {
            bytes,
            filename,
            content_type,
            download,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryObjects;
    use chrono::Duration;

    fn proxy(objects: Arc<MemoryObjects>) -> StorageProxy {
        let config = StorageConfig {
            jwt_secret: "test-secret".into(),
            api_base_url: "http://localhost:8000".into(),
            bucket: StorageConfig::DEFAULT_BUCKET.into(),
        };
        StorageProxy::new(&config, objects)
    }

    #[tokio::test]
    async fn signed_link_serves_object_with_headers() {
        let objects = Arc::new(MemoryObjects::default());
        objects.put("documentos-aval", "avales/a1/ine.pdf", b"%PDF-1.4".to_vec(), "application/pdf");
        let proxy = proxy(objects);

        let link = proxy
            .sign(None, "public/documentos-aval/avales/a1/ine.pdf", None)
            .expect("link signs");
        assert_eq!(link.path, "avales/a1/ine.pdf");

        let object = proxy.redeem(&link.token, true).await.expect("object served");
        assert_eq!(object.content_type, "application/pdf");
        assert_eq!(object.content_disposition(), "attachment; filename=\"ine.pdf\"");
        assert_eq!(&object.bytes[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn expired_link_is_forbidden_without_touching_storage() {
        let objects = Arc::new(MemoryObjects::default());
        objects.put("documentos-aval", "a.pdf", b"x".to_vec(), "application/pdf");
        let proxy = proxy(objects.clone());

        let now = Utc::now();
        let link = proxy
            .sign_at(None, "a.pdf", Some(60), now)
            .expect("link signs");
        match proxy
            .redeem_at(&link.token, false, now + Duration::seconds(61))
            .await
        {
            Err(ApiError::Forbidden(message)) => assert_eq!(message, "invalid or expired token"),
            other => panic!("expected forbidden, got {other:?}"),
        }
        assert_eq!(objects.download_count(), 0);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let proxy = proxy(Arc::new(MemoryObjects::default()));
        let link = proxy.sign(None, "missing.pdf", None).expect("link signs");
        match proxy.redeem(&link.token, false).await {
            Err(ApiError::NotFound(message)) => assert_eq!(message, "file not found"),
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn unknown_bucket_and_traversal_are_invalid() {
        let proxy = proxy(Arc::new(MemoryObjects::default()));
        assert!(matches!(
            proxy.sign(Some("otro"), "a.pdf", None),
            Err(StorageError::BucketNotAllowed(_))
        ));
        assert!(matches!(
            proxy.sign(None, "../a.pdf", None),
            Err(StorageError::InvalidPath(_))
        ));
        assert_eq!(proxy.link_for(Some("  ")), None);
        assert!(proxy.link_for(Some("a.pdf")).is_some());
    }
}

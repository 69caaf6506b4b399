use async_trait::async_trait;
use axum::body::Bytes;

use super::StoreError;

/// Private object storage. Paths are bucket-relative object keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, bucket: &str, path: &str) -> Result<Bytes, StoreError>;
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StoreError>;
    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), StoreError>;
}

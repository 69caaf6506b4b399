//! Administrative CRUD over the rental records.

pub mod contracts;
pub mod crud;
pub mod directory;
pub mod guarantors;
pub mod payments;
pub mod registries;

use std::sync::Arc;

use axum::Router;

use crate::context::AppContext;
use crate::error::non_fatal;
use crate::storage::normalize_path;

pub use crud::Resource;

pub fn resource_router() -> Router<Arc<AppContext>> {
    Router::new()
        .merge(directory::directory_router())
        .merge(guarantors::guarantor_router())
        .merge(contracts::contract_router())
        .merge(payments::payment_router())
        .merge(registries::registry_router())
}

/// Drops an object replaced by a newer upload. Failures only log.
pub(crate) async fn remove_superseded(ctx: &AppContext, raw: &str) {
    let bucket = ctx.storage.bucket();
    let path = match normalize_path(raw, bucket) {
        Ok(path) => path,
        Err(err) => {
            tracing::debug!(error = %err, "superseded object path skipped");
            return;
        }
    };
    non_fatal(
        "remove superseded object",
        ctx.storage.objects().remove(bucket, &[path]),
    )
    .await;
}

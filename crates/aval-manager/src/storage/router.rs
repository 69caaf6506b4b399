use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::{ProxiedObject, SignedLink};
use crate::context::AppContext;
use crate::error::ApiError;
use crate::identity::AdminPrincipal;

#[derive(Debug, Deserialize)]
struct SignRequest {
    path: String,
    #[serde(default)]
    bucket: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ProxyParams {
    token: String,
    #[serde(default)]
    download: bool,
}

pub fn storage_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/storage/sign", post(sign_link))
        .route("/storage/proxy", get(proxy_object))
}

async fn sign_link(
    State(ctx): State<Arc<AppContext>>,
    AdminPrincipal(admin): AdminPrincipal,
    Json(request): Json<SignRequest>,
) -> Result<Json<SignedLink>, ApiError> {
    let link = ctx
        .storage
        .sign(request.bucket.as_deref(), &request.path, request.expires_in)?;
    tracing::info!(
        user_id = %admin.id,
        path = %link.path,
        expires_at = %link.expires_at,
        "storage link signed"
    );
    Ok(Json(link))
}

async fn proxy_object(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ProxyParams>,
) -> Result<ProxiedObject, ApiError> {
    ctx.storage.redeem(&params.token, params.download).await
}

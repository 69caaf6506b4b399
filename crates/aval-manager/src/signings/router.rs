use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use uuid::Uuid;

use super::SigningFilter;
use crate::context::AppContext;
use crate::domain::{Signing, SigningDraft, SigningPatch};
use crate::error::ApiError;
use crate::identity::AdminPrincipal;

/// Admin routes over `/firmas`.
pub fn signing_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/firmas", get(list_signings).post(create_signing))
        .route("/firmas/:id", put(update_signing).delete(delete_signing))
}

async fn list_signings(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Query(filter): Query<SigningFilter>,
) -> Result<Json<Vec<Signing>>, ApiError> {
    ctx.signings.list(&filter).await.map(Json)
}

async fn create_signing(
    State(ctx): State<Arc<AppContext>>,
    AdminPrincipal(admin): AdminPrincipal,
    Json(draft): Json<SigningDraft>,
) -> Result<(StatusCode, Json<Signing>), ApiError> {
    let signing = ctx.signings.create(draft, Some(admin.id)).await?;
    Ok((StatusCode::CREATED, Json(signing)))
}

async fn update_signing(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<SigningPatch>,
) -> Result<Json<Signing>, ApiError> {
    ctx.signings.update(id, patch).await.map(Json)
}

async fn delete_signing(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.signings.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

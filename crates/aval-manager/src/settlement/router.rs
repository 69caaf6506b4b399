use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use super::SettlementRequest;
use crate::context::AppContext;
use crate::domain::SettlementBatch;
use crate::error::ApiError;
use crate::identity::AdminPrincipal;

/// Batch row plus a fresh proxy link to its report.
#[derive(Debug, Serialize)]
pub struct BatchView {
    #[serde(flatten)]
    pub batch: SettlementBatch,
    pub pdf_url: Option<String>,
}

impl BatchView {
    fn new(ctx: &AppContext, batch: SettlementBatch) -> Self {
        let pdf_url = ctx.storage.link_for(batch.report_path.as_deref());
        Self { batch, pdf_url }
    }
}

pub fn settlement_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/pagos/cortes", get(list_batches).post(create_batch))
        .route("/pagos/cortes/:id/reconciliar", post(reconcile_batch))
}

async fn list_batches(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<BatchView>>, ApiError> {
    let batches = ctx.settlements.list().await?;
    Ok(Json(
        batches
            .into_iter()
            .map(|batch| BatchView::new(&ctx, batch))
            .collect(),
    ))
}

async fn create_batch(
    State(ctx): State<Arc<AppContext>>,
    AdminPrincipal(admin): AdminPrincipal,
    Json(request): Json<SettlementRequest>,
) -> Result<(StatusCode, Json<BatchView>), ApiError> {
    tracing::info!(
        user_id = %admin.id,
        from = %request.fecha_inicio,
        to = %request.fecha_fin,
        "settlement requested"
    );
    let batch = ctx.settlements.build(&request).await?;
    Ok((StatusCode::CREATED, Json(BatchView::new(&ctx, batch))))
}

async fn reconcile_batch(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchView>, ApiError> {
    let batch = ctx.settlements.reconcile(id).await?;
    Ok(Json(BatchView::new(&ctx, batch)))
}

use std::sync::Arc;

use axum::extract::{Query as QueryParams, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{
    blacklisted_clients, on_duty_availability, on_duty_documents_at, on_duty_guarantor,
    public_documents, public_signings, vetoed_guarantors, PublicBlacklistedClient, PublicDocument,
    PublicGuarantorVeto, PublicSigning, PublicSigningFilter,
};
use crate::context::AppContext;
use crate::domain::{AvailabilityBlock, PublicGuarantor};
use crate::error::ApiError;

pub fn public_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/public/firmas", get(signings))
        .route("/public/documentos", get(documents))
        .route("/public/documentos/en-turno", get(on_duty_documents))
        .route("/public/avales/en-turno", get(on_duty))
        .route(
            "/public/avales/en-turno/disponibilidades",
            get(on_duty_blocks),
        )
        .route("/public/lista-negra/avales", get(guarantor_blacklist))
        .route("/public/lista-negra/clientes", get(client_blacklist))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct GuarantorBlacklistParams {
    #[serde(default)]
    inmobiliaria_id: Option<Uuid>,
    #[serde(default = "default_true")]
    solo_activos: bool,
}

#[derive(Debug, Deserialize)]
struct ClientBlacklistParams {
    #[serde(default)]
    search: Option<String>,
    #[serde(default = "default_true")]
    solo_activos: bool,
}

async fn signings(
    State(ctx): State<Arc<AppContext>>,
    QueryParams(filter): QueryParams<PublicSigningFilter>,
) -> Result<Json<Vec<PublicSigning>>, ApiError> {
    public_signings(&ctx.tables, &filter).await.map(Json)
}

async fn documents(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<PublicDocument>>, ApiError> {
    public_documents(&ctx.tables, &ctx.storage).await.map(Json)
}

async fn on_duty_documents(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<PublicDocument>>, ApiError> {
    on_duty_documents_at(&ctx.tables, &ctx.storage, Utc::now())
        .await
        .map(Json)
}

async fn on_duty(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Option<PublicGuarantor>>, ApiError> {
    on_duty_guarantor(&ctx.tables).await.map(Json)
}

async fn on_duty_blocks(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Vec<AvailabilityBlock>>, ApiError> {
    on_duty_availability(&ctx.tables).await.map(Json)
}

async fn guarantor_blacklist(
    State(ctx): State<Arc<AppContext>>,
    QueryParams(params): QueryParams<GuarantorBlacklistParams>,
) -> Result<Json<Vec<PublicGuarantorVeto>>, ApiError> {
    vetoed_guarantors(&ctx.tables, params.inmobiliaria_id, params.solo_activos)
        .await
        .map(Json)
}

async fn client_blacklist(
    State(ctx): State<Arc<AppContext>>,
    QueryParams(params): QueryParams<ClientBlacklistParams>,
) -> Result<Json<Vec<PublicBlacklistedClient>>, ApiError> {
    blacklisted_clients(&ctx.tables, params.search.as_deref(), params.solo_activos)
        .await
        .map(Json)
}

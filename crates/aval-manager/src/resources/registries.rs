//! Guarantor vetoes and the client blacklist.

use std::sync::Arc;

use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::crud::{self, delete_one, get_one, Resource};
use crate::context::AppContext;
use crate::domain::{
    ClientBlacklistDraft, ClientBlacklistEntry, ClientBlacklistPatch, GuarantorVeto,
    GuarantorVetoDraft, GuarantorVetoPatch, Validate, VetoStatus,
};
use crate::error::ApiError;
use crate::identity::AdminPrincipal;
use crate::store::repositories::{CLIENT_BLACKLIST, GUARANTOR_VETOES};
use crate::store::{timestamp, Query};

pub struct GuarantorVetoes;

impl Resource for GuarantorVetoes {
    const TABLE: &'static str = GUARANTOR_VETOES;
    const NOUN: &'static str = "veto";
    const STAMPS_UPDATES: bool = true;
    type Row = GuarantorVeto;
    type Draft = GuarantorVetoDraft;
    type Patch = GuarantorVetoPatch;
}

pub struct Blacklist;

impl Resource for Blacklist {
    const TABLE: &'static str = CLIENT_BLACKLIST;
    const NOUN: &'static str = "blacklist entry";
    const STAMPS_UPDATES: bool = true;
    type Row = ClientBlacklistEntry;
    type Draft = ClientBlacklistDraft;
    type Patch = ClientBlacklistPatch;
}

pub fn registry_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/vetos-avales", get(list_vetoes).post(create_veto))
        .route(
            "/vetos-avales/:id",
            get(get_one::<GuarantorVetoes>)
                .put(update_veto)
                .delete(delete_one::<GuarantorVetoes>),
        )
        .route(
            "/clientes-morosidad",
            get(list_blacklist).post(create_blacklist_entry),
        )
        .route(
            "/clientes-morosidad/:id",
            get(get_one::<Blacklist>)
                .put(update_blacklist_entry)
                .delete(delete_one::<Blacklist>),
        )
}

/// Clearing time for a status written at `now`: set when cleared, kept if already known.
fn cleared_at(
    status: VetoStatus,
    given: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        VetoStatus::Limpio => Some(given.unwrap_or(now)),
        VetoStatus::Vetado => None,
    }
}

/// Column map for a registry patch. A status change rewrites `limpio_at` alongside it.
fn status_columns<P: serde::Serialize>(
    patch: &P,
    status: Option<VetoStatus>,
    given: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Map<String, Value>, ApiError> {
    let mut columns = crud::patch_columns(patch)?;
    if let Some(status) = status {
        let stamp = cleared_at(status, given, now)
            .map(|at| Value::String(timestamp(at)))
            .unwrap_or(Value::Null);
        columns.insert("limpio_at".into(), stamp);
    }
    Ok(columns)
}

#[derive(Debug, Default, Deserialize)]
struct VetoFilter {
    #[serde(default)]
    aval_id: Option<Uuid>,
    #[serde(default)]
    inmobiliaria_id: Option<Uuid>,
    #[serde(default)]
    estatus: Option<VetoStatus>,
}

async fn list_vetoes(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    QueryParams(filter): QueryParams<VetoFilter>,
) -> Result<Json<Vec<GuarantorVeto>>, ApiError> {
    let query = with_status(
        Query::table(GUARANTOR_VETOES)
            .eq_opt("aval_id", filter.aval_id)
            .eq_opt("inmobiliaria_id", filter.inmobiliaria_id),
        filter.estatus,
    );
    crud::list::<GuarantorVetoes>(&ctx.tables, query.order_desc("created_at"))
        .await
        .map(Json)
}

/// Status filter that also matches the legacy spelling of active rows.
fn with_status(query: Query, status: Option<VetoStatus>) -> Query {
    match status {
        Some(VetoStatus::Vetado) => query.in_list("estatus", VetoStatus::ACTIVE_LABELS),
        Some(VetoStatus::Limpio) => query.in_list("estatus", ["limpio", "levantado"]),
        None => query,
    }
}

async fn create_veto(
    State(ctx): State<Arc<AppContext>>,
    AdminPrincipal(admin): AdminPrincipal,
    Json(mut draft): Json<GuarantorVetoDraft>,
) -> Result<(StatusCode, Json<GuarantorVeto>), ApiError> {
    draft.registered_by.get_or_insert(admin.id);
    draft.cleared_at = cleared_at(draft.status, draft.cleared_at, Utc::now());
    let veto = crud::create::<GuarantorVetoes>(&ctx.tables, &draft).await?;
    tracing::info!(
        veto_id = %veto.id,
        guarantor_id = %veto.guarantor_id,
        global = veto.is_global(),
        "guarantor veto registered"
    );
    Ok((StatusCode::CREATED, Json(veto)))
}

async fn update_veto(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<GuarantorVetoPatch>,
) -> Result<Json<GuarantorVeto>, ApiError> {
    patch.validate()?;
    let columns = status_columns(&patch, patch.status, patch.cleared_at, Utc::now())?;
    crud::apply::<GuarantorVetoes>(&ctx.tables, id, columns)
        .await
        .map(Json)
}

#[derive(Debug, Default, Deserialize)]
struct BlacklistFilter {
    #[serde(default)]
    cliente_id: Option<Uuid>,
    #[serde(default)]
    estatus: Option<VetoStatus>,
}

async fn list_blacklist(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    QueryParams(filter): QueryParams<BlacklistFilter>,
) -> Result<Json<Vec<ClientBlacklistEntry>>, ApiError> {
    let query = with_status(
        Query::table(CLIENT_BLACKLIST).eq_opt("cliente_id", filter.cliente_id),
        filter.estatus,
    );
    crud::list::<Blacklist>(&ctx.tables, query.order_desc("created_at"))
        .await
        .map(Json)
}

async fn create_blacklist_entry(
    State(ctx): State<Arc<AppContext>>,
    AdminPrincipal(admin): AdminPrincipal,
    Json(mut draft): Json<ClientBlacklistDraft>,
) -> Result<(StatusCode, Json<ClientBlacklistEntry>), ApiError> {
    draft.registered_by.get_or_insert(admin.id);
    draft.cleared_at = cleared_at(draft.status, draft.cleared_at, Utc::now());
    let entry = crud::create::<Blacklist>(&ctx.tables, &draft).await?;
    tracing::info!(entry_id = %entry.id, client_id = %entry.client_id, "client blacklisted");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_blacklist_entry(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<ClientBlacklistPatch>,
) -> Result<Json<ClientBlacklistEntry>, ApiError> {
    patch.validate()?;
    let columns = status_columns(&patch, patch.status, patch.cleared_at, Utc::now())?;
    crud::apply::<Blacklist>(&ctx.tables, id, columns)
        .await
        .map(Json)
}

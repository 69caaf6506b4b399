//! Advisors, agencies, clients and properties.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::crud::{self, create_one, delete_one, get_one, update_one, Resource};
use crate::context::AppContext;
use crate::domain::{
    Advisor, AdvisorDraft, AdvisorPatch, Agency, AgencyDraft, AgencyPatch, Client, ClientDraft,
    ClientPatch, Property, PropertyDraft, PropertyPatch, Validate,
};
use crate::error::ApiError;
use crate::identity::AdminPrincipal;
use crate::store::repositories::{ADVISORS, AGENCIES, CLIENTS, COMMISSIONS, PROPERTIES};
use crate::store::{Query, Tables};

pub struct Advisors;

impl Resource for Advisors {
    const TABLE: &'static str = ADVISORS;
    const NOUN: &'static str = "advisor";
    type Row = Advisor;
    type Draft = AdvisorDraft;
    type Patch = AdvisorPatch;
}

pub struct Agencies;

impl Resource for Agencies {
    const TABLE: &'static str = AGENCIES;
    const NOUN: &'static str = "agency";
    type Row = Agency;
    type Draft = AgencyDraft;
    type Patch = AgencyPatch;
}

pub struct Clients;

impl Resource for Clients {
    const TABLE: &'static str = CLIENTS;
    const NOUN: &'static str = "client";
    const STAMPS_UPDATES: bool = true;
    type Row = Client;
    type Draft = ClientDraft;
    type Patch = ClientPatch;
}

pub struct Properties;

impl Resource for Properties {
    const TABLE: &'static str = PROPERTIES;
    const NOUN: &'static str = "property";
    type Row = Property;
    type Draft = PropertyDraft;
    type Patch = PropertyPatch;
}

pub fn directory_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route(
            "/asesores",
            get(list_advisors).post(create_one::<Advisors>),
        )
        .route(
            "/asesores/:id",
            get(get_one::<Advisors>)
                .put(update_one::<Advisors>)
                .delete(delete_one::<Advisors>),
        )
        .route("/inmobiliarias", get(list_agencies).post(create_agency))
        .route(
            "/inmobiliarias/:id",
            get(get_one::<Agencies>)
                .put(update_agency)
                .delete(delete_one::<Agencies>),
        )
        .route("/clientes", get(list_clients).post(create_one::<Clients>))
        .route(
            "/clientes/:id",
            get(get_one::<Clients>)
                .put(update_one::<Clients>)
                .delete(delete_one::<Clients>),
        )
        .route(
            "/propiedades",
            get(list_properties).post(create_one::<Properties>),
        )
        .route(
            "/propiedades/:id",
            get(get_one::<Properties>)
                .put(update_one::<Properties>)
                .delete(delete_one::<Properties>),
        )
}

#[derive(Debug, Deserialize)]
struct CommissionBeneficiary {
    beneficiario_id: Uuid,
}

/// Signing counts are recomputed from the advisor commissions on file.
pub async fn advisors_with_counts(tables: &Tables) -> Result<Vec<Advisor>, ApiError> {
    let advisors =
        crud::list::<Advisors>(tables, Query::table(ADVISORS).order_asc("nombre")).await?;
    let commissions: Vec<CommissionBeneficiary> = tables
        .select(
            &Query::table(COMMISSIONS)
                .columns("beneficiario_id")
                .eq("beneficiario_tipo", "asesor"),
        )
        .await?;

    let mut counts: HashMap<Uuid, i32> = HashMap::new();
    for commission in commissions {
        *counts.entry(commission.beneficiario_id).or_default() += 1;
    }
    Ok(advisors
        .into_iter()
        .map(|mut advisor| {
            advisor.signing_count = counts.get(&advisor.id).copied().unwrap_or_default();
            advisor
        })
        .collect())
}

async fn list_advisors(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<Advisor>>, ApiError> {
    advisors_with_counts(&ctx.tables).await.map(Json)
}

#[derive(Debug, Default, Deserialize)]
struct AgencyFilter {
    #[serde(default)]
    q: Option<String>,
}

async fn list_agencies(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    QueryParams(filter): QueryParams<AgencyFilter>,
) -> Result<Json<Vec<Agency>>, ApiError> {
    let mut query = Query::table(AGENCIES);
    if let Some(term) = filter.q.as_deref().map(str::trim).filter(|term| !term.is_empty()) {
        query = query.ilike_contains("nombre", term);
    }
    crud::list::<Agencies>(&ctx.tables, query.order_asc("nombre"))
        .await
        .map(Json)
}

async fn ensure_unique_agency(
    tables: &Tables,
    name: &str,
    except: Option<Uuid>,
) -> Result<(), ApiError> {
    let existing: Vec<Agency> = tables
        .select(&Query::table(AGENCIES).ilike_exact("nombre", name).limit(2))
        .await?;
    if existing.iter().any(|agency| Some(agency.id) != except) {
        return Err(ApiError::Conflict("agency is already registered".into()));
    }
    Ok(())
}

async fn create_agency(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Json(draft): Json<AgencyDraft>,
) -> Result<(StatusCode, Json<Agency>), ApiError> {
    draft.validate()?;
    ensure_unique_agency(&ctx.tables, &draft.nombre, None).await?;
    let agency = crud::create::<Agencies>(&ctx.tables, &draft).await?;
    Ok((StatusCode::CREATED, Json(agency)))
}

async fn update_agency(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<AgencyPatch>,
) -> Result<Json<Agency>, ApiError> {
    patch.validate()?;
    if let Some(name) = patch.nombre.as_deref() {
        ensure_unique_agency(&ctx.tables, name, Some(id)).await?;
    }
    crud::update::<Agencies>(&ctx.tables, id, &patch).await.map(Json)
}

#[derive(Debug, Default, Deserialize)]
struct ClientFilter {
    #[serde(default)]
    search: Option<String>,
}

async fn list_clients(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    QueryParams(filter): QueryParams<ClientFilter>,
) -> Result<Json<Vec<Client>>, ApiError> {
    let mut query = Query::table(CLIENTS);
    if let Some(term) = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
    {
        query = query.ilike_contains("nombre_completo", term);
    }
    crud::list::<Clients>(&ctx.tables, query.order_desc("created_at"))
        .await
        .map(Json)
}

async fn list_properties(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<Property>>, ApiError> {
    crud::list::<Properties>(&ctx.tables, Query::table(PROPERTIES).order_desc("created_at"))
        .await
        .map(Json)
}

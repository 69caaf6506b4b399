//! Advisor-facing booking portal under `/asesores/portal`.

use std::sync::Arc;

use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::SigningFilter;
use crate::context::AppContext;
use crate::domain::{
    AvailabilityBlock, BlacklistReason, Client, ClientBlacklistDraft, ClientBlacklistEntry,
    ClientDraft, PublicGuarantor, Signing, SigningChannel, SigningDraft, SigningState, Validate,
    VetoStatus,
};
use crate::error::ApiError;
use crate::identity::{Principal, StaffPrincipal};
use crate::scheduling::TimeWindow;
use crate::store::repositories::{
    AvailabilityRepository, ADVISORS, CLIENTS, CLIENT_BLACKLIST, GUARANTORS,
};
use crate::store::{Filter, Query, Tables};

const CLIENT_SEARCH_LIMIT: usize = 50;
const CLIENT_SEARCH_MIN_CHARS: usize = 3;

pub fn portal_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/asesores/portal/avales", get(list_guarantors))
        .route(
            "/asesores/portal/avales/:id/disponibilidades",
            get(guarantor_availability),
        )
        .route(
            "/asesores/portal/firmas",
            get(list_own_signings).post(book_signing),
        )
        .route("/asesores/portal/firmas/:id/cancelar", post(cancel_signing))
        .route("/asesores/portal/clientes", get(search_clients))
        .route(
            "/asesores/portal/lista-negra/clientes",
            post(blacklist_client),
        )
}

/// How the portal identifies a client: by id, by an official identifier, or by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientReference {
    #[serde(default)]
    pub cliente_id: Option<Uuid>,
    #[serde(default)]
    pub cliente_nombre: Option<String>,
    #[serde(default)]
    pub cliente_curp: Option<String>,
    #[serde(default)]
    pub cliente_rfc: Option<String>,
    #[serde(default)]
    pub cliente_numero_identificacion: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSigningRequest {
    pub aval_id: Uuid,
    #[serde(flatten)]
    pub client: ClientReference,
    #[serde(default)]
    pub inmobiliaria_id: Option<Uuid>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub correo: Option<String>,
    pub tipo_renta: String,
    pub periodo_contrato_anios: i32,
    pub monto_renta: Decimal,
    pub propiedad_domicilio: String,
    pub ubicacion_maps_url: String,
    pub fecha_inicio: DateTime<Utc>,
    #[serde(default)]
    pub fecha_fin: Option<DateTime<Utc>>,
    #[serde(default)]
    pub canal_firma: SigningChannel,
    pub pago_por_servicio: Decimal,
    #[serde(default)]
    pub notas: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalBlacklistRequest {
    #[serde(flatten)]
    pub client: ClientReference,
    #[serde(default)]
    pub motivo_tipo: BlacklistReason,
    pub motivo: String,
}

#[derive(Debug, Deserialize)]
struct ClientSearch {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
struct AdvisorProfile {
    nombre: String,
}

async fn list_guarantors(
    State(ctx): State<Arc<AppContext>>,
    _staff: StaffPrincipal,
) -> Result<Json<Vec<PublicGuarantor>>, ApiError> {
    let query = Query::table(GUARANTORS)
        .columns("id,nombre_completo,email,telefono")
        .eq("activo", true)
        .order_asc("nombre_completo");
    Ok(Json(ctx.tables.select(&query).await?))
}

async fn guarantor_availability(
    State(ctx): State<Arc<AppContext>>,
    _staff: StaffPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AvailabilityBlock>>, ApiError> {
    Ok(Json(ctx.tables.blocks_for(id).await?))
}

async fn list_own_signings(
    State(ctx): State<Arc<AppContext>>,
    StaffPrincipal(caller): StaffPrincipal,
) -> Result<Json<Vec<Signing>>, ApiError> {
    let filter = SigningFilter {
        created_by: own_scope(&caller),
        ascending: true,
        ..SigningFilter::default()
    };
    ctx.signings.list(&filter).await.map(Json)
}

async fn book_signing(
    State(ctx): State<Arc<AppContext>>,
    StaffPrincipal(caller): StaffPrincipal,
    Json(request): Json<PortalSigningRequest>,
) -> Result<(StatusCode, Json<Signing>), ApiError> {
    let advisor = advisor_profile(&ctx.tables, caller.id).await?;
    let window = TimeWindow::new(request.fecha_inicio, request.fecha_fin)?;
    // Fail before any client row is written; the client blacklist runs inside `create`.
    ctx.signings
        .check_guarantor(request.aval_id, request.inmobiliaria_id)
        .await?;
    ctx.signings
        .engine()
        .can_book(request.aval_id, &window, None)
        .await?;

    let client_id = resolve_client(
        &ctx.tables,
        &request.client,
        request.correo.as_deref(),
        request.telefono.as_deref(),
    )
    .await?;
    let client_name = match request.client.cliente_nombre.clone() {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => stored_client_name(&ctx.tables, client_id).await?,
    };

    let draft = SigningDraft {
        guarantor_id: request.aval_id,
        client_id: Some(client_id),
        agency_id: request.inmobiliaria_id,
        contract_id: None,
        advisor_name: advisor.nombre,
        client_name,
        phone: request.telefono,
        email: request.correo,
        rental_kind: request.tipo_renta,
        contract_years: request.periodo_contrato_anios,
        rent_amount: request.monto_renta,
        property_address: request.propiedad_domicilio,
        location_url: request.ubicacion_maps_url,
        starts_at: window.start,
        ends_at: Some(window.end),
        state: SigningState::Programada,
        channel: request.canal_firma,
        service_fee: request.pago_por_servicio,
        request_url: None,
        notes: request.notas,
        created_by: Some(caller.id),
    };
    let signing = ctx.signings.create(draft, Some(caller.id)).await?;
    Ok((StatusCode::CREATED, Json(signing)))
}

async fn cancel_signing(
    State(ctx): State<Arc<AppContext>>,
    StaffPrincipal(caller): StaffPrincipal,
    Path(id): Path<Uuid>,
) -> Result<Json<Signing>, ApiError> {
    ctx.signings
        .cancel(id, own_scope(&caller))
        .await
        .map(Json)
}

async fn search_clients(
    State(ctx): State<Arc<AppContext>>,
    _staff: StaffPrincipal,
    QueryParams(search): QueryParams<ClientSearch>,
) -> Result<Json<Vec<Client>>, ApiError> {
    let term: String = search
        .query
        .trim()
        .chars()
        .map(|c| if matches!(c, ',' | '(' | ')' | '"') { ' ' } else { c })
        .collect();
    let term = term.trim();
    if term.chars().count() < CLIENT_SEARCH_MIN_CHARS {
        return Err(ApiError::invalid(format!(
            "query must contain at least {CLIENT_SEARCH_MIN_CHARS} characters"
        )));
    }
    let query = Query::table(CLIENTS)
        .any_of(vec![
            Filter::ilike_contains("nombre_completo", term),
            Filter::eq("curp", term),
            Filter::eq("rfc", term),
            Filter::eq("numero_identificacion", term),
        ])
        .order_asc("nombre_completo")
        .limit(CLIENT_SEARCH_LIMIT);
    Ok(Json(ctx.tables.select(&query).await?))
}

async fn blacklist_client(
    State(ctx): State<Arc<AppContext>>,
    StaffPrincipal(caller): StaffPrincipal,
    Json(request): Json<PortalBlacklistRequest>,
) -> Result<(StatusCode, Json<ClientBlacklistEntry>), ApiError> {
    let draft = ClientBlacklistDraft {
        client_id: Uuid::nil(),
        registered_by: Some(caller.id),
        reason: request.motivo_tipo,
        motivo: request.motivo,
        status: VetoStatus::Vetado,
        cleared_at: None,
    };
    draft.validate()?;
    let client_id = resolve_client(&ctx.tables, &request.client, None, None).await?;
    let draft = ClientBlacklistDraft { client_id, ..draft };
    let entry: ClientBlacklistEntry = ctx.tables.insert(CLIENT_BLACKLIST, &draft).await?;
    tracing::info!(client_id = %client_id, registered_by = %caller.id, "client blacklisted");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Advisors only see and cancel what they created; admins are unrestricted.
fn own_scope(caller: &Principal) -> Option<Uuid> {
    if caller.is_admin() {
        None
    } else {
        Some(caller.id)
    }
}

async fn advisor_profile(tables: &Tables, user_id: Uuid) -> Result<AdvisorProfile, ApiError> {
    tables
        .first(Query::table(ADVISORS).columns("id,nombre").eq("user_id", user_id))
        .await?
        .ok_or_else(|| {
            ApiError::invalid(
                "your user is not linked to an advisor profile; contact an administrator",
            )
        })
}

async fn stored_client_name(tables: &Tables, client_id: Uuid) -> Result<String, ApiError> {
    let client: Option<Client> = tables.by_id(CLIENTS, client_id).await?;
    client
        .map(|client| client.full_name)
        .ok_or_else(|| ApiError::NotFound("client not found".to_string()))
}

/// Id first, then CURP, RFC and ID number; otherwise a new client is created by name.
pub async fn resolve_client(
    tables: &Tables,
    reference: &ClientReference,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<Uuid, ApiError> {
    if let Some(id) = reference.cliente_id {
        return Ok(id);
    }

    let identifiers = [
        ("curp", reference.cliente_curp.as_deref()),
        ("rfc", reference.cliente_rfc.as_deref()),
        ("numero_identificacion", reference.cliente_numero_identificacion.as_deref()),
    ];
    for (column, value) in identifiers {
        let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
            continue;
        };
        let found: Option<Client> = tables
            .first(Query::table(CLIENTS).eq(column, value))
            .await?;
        if let Some(client) = found {
            return Ok(client.id);
        }
    }

    let name = reference
        .cliente_nombre
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::invalid("cliente_nombre is required"))?;
    let draft = ClientDraft {
        full_name: name.to_string(),
        phone: phone.map(str::to_string),
        email: email.map(str::to_string),
        curp: reference.cliente_curp.clone(),
        rfc: reference.cliente_rfc.clone(),
        id_number: reference.cliente_numero_identificacion.clone(),
        ..ClientDraft::default()
    };
    let client: Client = tables.insert(CLIENTS, &draft).await?;
    tracing::info!(client_id = %client.id, "client created from portal");
    Ok(client.id)
}

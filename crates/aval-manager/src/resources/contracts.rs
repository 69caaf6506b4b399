//! Contracts and the documents filed against them.

use std::sync::Arc;

use axum::extract::{Path, Query as QueryParams, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use super::crud::{self, create_one, delete_one, get_one, update_one, Resource};
use super::remove_superseded;
use crate::context::AppContext;
use crate::domain::{
    Contract, ContractDraft, ContractPatch, Document, DocumentDraft, DocumentPatch,
};
use crate::error::ApiError;
use crate::identity::{AdminPrincipal, StaffPrincipal};
use crate::store::repositories::{CONTRACTS, DOCUMENTS};
use crate::store::{Query, Tables};

pub struct Contracts;

impl Resource for Contracts {
    const TABLE: &'static str = CONTRACTS;
    const NOUN: &'static str = "contract";
    const STAMPS_UPDATES: bool = true;
    type Row = Contract;
    type Draft = ContractDraft;
    type Patch = ContractPatch;
}

pub struct Documents;

impl Resource for Documents {
    const TABLE: &'static str = DOCUMENTS;
    const NOUN: &'static str = "document";
    type Row = Document;
    type Draft = DocumentDraft;
    type Patch = DocumentPatch;
}

pub fn contract_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/contratos", get(list_contracts).post(create_one::<Contracts>))
        .route(
            "/contratos/:id",
            get(get_one::<Contracts>)
                .put(update_one::<Contracts>)
                .delete(delete_one::<Contracts>),
        )
        .route("/documentos", get(list_documents).post(create_one::<Documents>))
        .route("/documentos/aval/:aval_id", get(list_guarantor_documents))
        .route(
            "/documentos/:id",
            get(get_one::<Documents>)
                .put(update_document)
                .delete(delete_one::<Documents>),
        )
}

async fn list_contracts(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<Contract>>, ApiError> {
    crud::list::<Contracts>(&ctx.tables, Query::table(CONTRACTS).order_desc("created_at"))
        .await
        .map(Json)
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct DocumentFilter {
    #[serde(default)]
    pub contrato_id: Option<Uuid>,
    #[serde(default)]
    pub cliente_id: Option<Uuid>,
    /// Matches documents of any contract the guarantor backs.
    #[serde(default)]
    pub aval_id: Option<Uuid>,
}

#[derive(Deserialize)]
struct ContractRef {
    id: Uuid,
}

pub async fn find_documents(tables: &Tables, filter: DocumentFilter) -> Result<Vec<Document>, ApiError> {
    let mut query = Query::table(DOCUMENTS)
        .eq_opt("contrato_id", filter.contrato_id)
        .eq_opt("cliente_id", filter.cliente_id);

    if let Some(guarantor) = filter.aval_id {
        let contracts: Vec<ContractRef> = tables
            .select(&Query::table(CONTRACTS).columns("id").eq("aval_id", guarantor))
            .await?;
        if contracts.is_empty() {
            return Ok(Vec::new());
        }
        query = query.in_list("contrato_id", contracts.into_iter().map(|contract| contract.id));
    }
    crud::list::<Documents>(tables, query.order_desc("created_at")).await
}

async fn list_documents(
    State(ctx): State<Arc<AppContext>>,
    _staff: StaffPrincipal,
    QueryParams(filter): QueryParams<DocumentFilter>,
) -> Result<Json<Vec<Document>>, ApiError> {
    find_documents(&ctx.tables, filter).await.map(Json)
}

async fn list_guarantor_documents(
    State(ctx): State<Arc<AppContext>>,
    _staff: StaffPrincipal,
    Path(aval_id): Path<Uuid>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let filter = DocumentFilter {
        aval_id: Some(aval_id),
        ..DocumentFilter::default()
    };
    find_documents(&ctx.tables, filter).await.map(Json)
}

async fn update_document(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<Document>, ApiError> {
    let stored = crud::fetch::<Documents>(&ctx.tables, id).await?;
    let updated = crud::update::<Documents>(&ctx.tables, id, &patch).await?;
    if stored.path != updated.path {
        remove_superseded(&ctx, &stored.path).await;
    }
    Ok(Json(updated))
}

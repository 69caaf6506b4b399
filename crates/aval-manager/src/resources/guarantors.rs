use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::crud::{self, delete_one, get_one, Resource};
use super::remove_superseded;
use crate::context::AppContext;
use crate::domain::{
    AvailabilityBlock, AvailabilityDraft, AvailabilityInput, AvailabilityPatch, Guarantor,
    GuarantorDraft, GuarantorPatch, Validate,
};
use crate::error::ApiError;
use crate::identity::{AdminPrincipal, StaffPrincipal};
use crate::store::repositories::{AvailabilityRepository, AVAILABILITY, GUARANTORS};
use crate::store::{Query, Tables};

const CREDIT_REPORT_LIMIT: usize = 20 * 1024 * 1024;

pub struct Guarantors;

impl Resource for Guarantors {
    const TABLE: &'static str = GUARANTORS;
    const NOUN: &'static str = "guarantor";
    const STAMPS_UPDATES: bool = true;
    type Row = Guarantor;
    type Draft = GuarantorDraft;
    type Patch = GuarantorPatch;
}

pub struct Availability;

impl Resource for Availability {
    const TABLE: &'static str = AVAILABILITY;
    const NOUN: &'static str = "availability block";
    type Row = AvailabilityBlock;
    type Draft = AvailabilityDraft;
    type Patch = AvailabilityPatch;
}

pub fn guarantor_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/avales", get(list_guarantors).post(create_guarantor))
        .route(
            "/avales/:id",
            get(get_one::<Guarantors>)
                .put(update_guarantor)
                .delete(delete_one::<Guarantors>),
        )
        .route(
            "/avales/:id/buro-credito",
            put(upload_credit_report).layer(DefaultBodyLimit::max(CREDIT_REPORT_LIMIT)),
        )
        .route(
            "/disponibilidades",
            get(list_availability).post(crud::create_one::<Availability>),
        )
        .route(
            "/disponibilidades/:id",
            put(update_availability).delete(delete_one::<Availability>),
        )
}

async fn list_guarantors(
    State(ctx): State<Arc<AppContext>>,
    _staff: StaffPrincipal,
) -> Result<Json<Vec<Guarantor>>, ApiError> {
    crud::list::<Guarantors>(&ctx.tables, Query::table(GUARANTORS).order_desc("created_at"))
        .await
        .map(Json)
}

async fn replace_blocks(
    tables: &Tables,
    guarantor: Uuid,
    blocks: &[AvailabilityInput],
) -> Result<(), ApiError> {
    let drafts: Vec<AvailabilityDraft> = blocks
        .iter()
        .map(|block| block.for_guarantor(guarantor))
        .collect();
    AvailabilityRepository::replace_blocks(tables, guarantor, &drafts).await?;
    tracing::debug!(guarantor_id = %guarantor, blocks = drafts.len(), "availability replaced");
    Ok(())
}

async fn create_guarantor(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Json(draft): Json<GuarantorDraft>,
) -> Result<(StatusCode, Json<Guarantor>), ApiError> {
    let guarantor = crud::create::<Guarantors>(&ctx.tables, &draft).await?;
    if let Some(blocks) = draft.availability.as_deref().filter(|blocks| !blocks.is_empty()) {
        replace_blocks(&ctx.tables, guarantor.id, blocks).await?;
    }
    Ok((StatusCode::CREATED, Json(guarantor)))
}

async fn update_guarantor(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<GuarantorPatch>,
) -> Result<Json<Guarantor>, ApiError> {
    let guarantor = crud::update::<Guarantors>(&ctx.tables, id, &patch).await?;
    if let Some(blocks) = patch.availability.as_deref() {
        replace_blocks(&ctx.tables, guarantor.id, blocks).await?;
    }
    Ok(Json(guarantor))
}

#[derive(Debug, Serialize)]
pub struct CreditReportUpload {
    pub buro_credito_url: String,
}

/// Accepts only unencrypted PDF documents.
pub fn check_credit_report(bytes: &[u8]) -> Result<(), ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::invalid("uploaded file is empty"));
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(ApiError::invalid("only PDF files are accepted"));
    }
    if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
        return Err(ApiError::invalid(
            "PDF is password protected; upload an unlocked copy",
        ));
    }
    Ok(())
}

pub fn credit_report_path(guarantor: Uuid, millis: i64) -> String {
    format!("avales/{guarantor}/buro_credito/{millis}-buro-credito.pdf")
}

async fn upload_credit_report(
    State(ctx): State<Arc<AppContext>>,
    AdminPrincipal(admin): AdminPrincipal,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<CreditReportUpload>, ApiError> {
    let guarantor = crud::fetch::<Guarantors>(&ctx.tables, id).await?;
    check_credit_report(&body)?;

    let path = credit_report_path(id, Utc::now().timestamp_millis());
    let size = body.len();
    ctx.storage
        .objects()
        .upload(ctx.storage.bucket(), &path, body, mime::APPLICATION_PDF.as_ref())
        .await
        .map_err(|err| ApiError::internal("could not store credit report", err))?;

    let mut columns = Map::new();
    columns.insert("buro_credito_url".into(), Value::String(path.clone()));
    crud::apply::<Guarantors>(&ctx.tables, id, columns).await?;
    tracing::info!(guarantor_id = %id, user_id = %admin.id, size, "credit report stored");

    if let Some(previous) = guarantor.documents.buro_credito_url.as_deref() {
        if previous != path {
            remove_superseded(&ctx, previous).await;
        }
    }
    Ok(Json(CreditReportUpload {
        buro_credito_url: path,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct AvailabilityFilter {
    #[serde(default)]
    aval_id: Option<Uuid>,
}

async fn list_availability(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    QueryParams(filter): QueryParams<AvailabilityFilter>,
) -> Result<Json<Vec<AvailabilityBlock>>, ApiError> {
    let query = Query::table(AVAILABILITY)
        .eq_opt("aval_id", filter.aval_id)
        .order_desc("fecha_inicio");
    crud::list::<Availability>(&ctx.tables, query).await.map(Json)
}

/// The stored window is merged in so a one-sided patch cannot invert it.
async fn update_availability(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<AvailabilityPatch>,
) -> Result<Json<AvailabilityBlock>, ApiError> {
    let stored = crud::fetch::<Availability>(&ctx.tables, id).await?;
    let merged = AvailabilityDraft {
        guarantor_id: stored.guarantor_id,
        starts_at: patch.starts_at.unwrap_or(stored.starts_at),
        ends_at: patch.ends_at.unwrap_or(stored.ends_at),
        recurring: patch.recurring.unwrap_or(stored.recurring),
    };
    merged.validate()?;
    crud::update::<Availability>(&ctx.tables, id, &patch)
        .await
        .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryTables;
    use serde_json::json;

    #[test]
    fn credit_report_must_be_plain_pdf() {
        assert!(check_credit_report(b"%PDF-1.7\n1 0 obj").is_ok());
        let rejected: [&[u8]; 3] = [
            b"",
            b"PK\x03\x04zip",
            b"%PDF-1.7 trailer << /Encrypt 5 0 R >>",
        ];
        for bytes in rejected {
            match check_credit_report(bytes) {
                Err(ApiError::InvalidRequest { .. }) => {}
                other => panic!("expected invalid request, got {other:?}"),
            }
        }
    }

    #[test]
    fn credit_report_path_is_namespaced_by_guarantor() {
        let id = Uuid::nil();
        assert_eq!(
            credit_report_path(id, 1_700_000_000_000),
            "avales/00000000-0000-0000-0000-000000000000/buro_credito/1700000000000-buro-credito.pdf"
        );
    }

    #[tokio::test]
    async fn blocks_are_replaced_wholesale() {
        let memory = MemoryTables::new();
        let guarantor = Uuid::new_v4();
        memory.seed(
            AVAILABILITY,
            vec![json!({"aval_id": guarantor, "fecha_inicio": "2024-01-01T09:00:00Z", "fecha_fin": "2024-01-01T18:00:00Z"})],
        );
        let tables = Tables::new(Arc::new(memory.clone()));
        let block: AvailabilityInput = serde_json::from_value(json!({
            "fecha_inicio": "2024-02-05T09:00:00Z",
            "fecha_fin": "2024-02-05T13:00:00Z"
        }))
        .expect("block decodes");

        replace_blocks(&tables, guarantor, &[block])
            .await
            .expect("blocks replaced");
        let rows = memory.rows(AVAILABILITY);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["fecha_inicio"], "2024-02-05T09:00:00Z");
    }
}

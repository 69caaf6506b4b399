use std::sync::Arc;

use axum::extract::{Path, Query as QueryParams, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::crud::{self, create_one, delete_one, get_one, update_one, Resource};
use crate::context::AppContext;
use crate::domain::payment::check_service_amounts;
use crate::domain::{
    BeneficiaryKind, CommissionPayment, CommissionPaymentDraft, CommissionPaymentPatch,
    CommissionState, Payment, PaymentDraft, PaymentPatch, ServicePayment, ServicePaymentDraft,
    ServicePaymentPatch, Validate,
};
use crate::error::ApiError;
use crate::identity::AdminPrincipal;
use crate::settlement::day_bounds;
use crate::store::repositories::{COMMISSIONS, RENT_PAYMENTS, SERVICE_PAYMENTS};
use crate::store::{timestamp, Query};

pub struct RentPayments;

impl Resource for RentPayments {
    const TABLE: &'static str = RENT_PAYMENTS;
    const NOUN: &'static str = "payment";
    type Row = Payment;
    type Draft = PaymentDraft;
    type Patch = PaymentPatch;
}

pub struct ServicePayments;

impl Resource for ServicePayments {
    const TABLE: &'static str = SERVICE_PAYMENTS;
    const NOUN: &'static str = "service payment";
    const STAMPS_UPDATES: bool = true;
    type Row = ServicePayment;
    type Draft = ServicePaymentDraft;
    type Patch = ServicePaymentPatch;
}

pub struct Commissions;

impl Resource for Commissions {
    const TABLE: &'static str = COMMISSIONS;
    const NOUN: &'static str = "commission payment";
    const STAMPS_UPDATES: bool = true;
    type Row = CommissionPayment;
    type Draft = CommissionPaymentDraft;
    type Patch = CommissionPaymentPatch;
}

pub fn payment_router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/pagos", get(list_rent_payments).post(create_rent_payment))
        .route(
            "/pagos/:id",
            get(get_one::<RentPayments>)
                .put(update_one::<RentPayments>)
                .delete(delete_one::<RentPayments>),
        )
        .route(
            "/pagos-servicio",
            get(list_service_payments).post(create_one::<ServicePayments>),
        )
        .route(
            "/pagos-servicio/:id",
            get(get_one::<ServicePayments>)
                .put(update_service_payment)
                .delete(delete_one::<ServicePayments>),
        )
        .route(
            "/pagos-comisiones",
            get(list_commissions).post(create_one::<Commissions>),
        )
        .route(
            "/pagos-comisiones/:id",
            get(get_one::<Commissions>)
                .put(update_one::<Commissions>)
                .delete(delete_one::<Commissions>),
        )
}

async fn list_rent_payments(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
) -> Result<Json<Vec<Payment>>, ApiError> {
    crud::list::<RentPayments>(&ctx.tables, Query::table(RENT_PAYMENTS).order_desc("created_at"))
        .await
        .map(Json)
}

async fn create_rent_payment(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Json(mut draft): Json<PaymentDraft>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    draft.paid_at.get_or_insert_with(Utc::now);
    let payment = crud::create::<RentPayments>(&ctx.tables, &draft).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Filters shared by the service and commission ledgers.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LedgerFilter {
    #[serde(default)]
    pub firma_id: Option<Uuid>,
    #[serde(default)]
    pub corte_id: Option<Uuid>,
    /// Only rows not yet consumed by a settlement.
    #[serde(default)]
    pub sin_corte: bool,
    #[serde(default)]
    pub fecha_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub fecha_fin: Option<NaiveDate>,
    #[serde(default)]
    pub beneficiario_id: Option<Uuid>,
    #[serde(default)]
    pub beneficiario_tipo: Option<BeneficiaryKind>,
    #[serde(default)]
    pub estado: Option<CommissionState>,
}

impl LedgerFilter {
    fn apply(&self, mut query: Query) -> Query {
        query = query
            .eq_opt("firma_id", self.firma_id)
            .eq_opt("corte_id", self.corte_id);
        if self.sin_corte {
            query = query.is_null("corte_id");
        }
        let (from, to) = match (self.fecha_inicio, self.fecha_fin) {
            (Some(start), Some(end)) => {
                let (from, to) = day_bounds(start, end);
                (Some(from), Some(to))
            }
            (Some(start), None) => (Some(day_bounds(start, start).0), None),
            (None, Some(end)) => (None, Some(day_bounds(end, end).1)),
            (None, None) => (None, None),
        };
        if let Some(from) = from {
            query = query.gte("fecha_pago", timestamp(from));
        }
        if let Some(to) = to {
            query = query.lte("fecha_pago", timestamp(to));
        }
        query
    }
}

async fn list_service_payments(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    QueryParams(filter): QueryParams<LedgerFilter>,
) -> Result<Json<Vec<ServicePayment>>, ApiError> {
    let query = filter
        .apply(Query::table(SERVICE_PAYMENTS))
        .order_desc("fecha_pago");
    crud::list::<ServicePayments>(&ctx.tables, query).await.map(Json)
}

/// Amount rules are checked against the row as it will be stored.
async fn update_service_payment(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    Path(id): Path<Uuid>,
    Json(patch): Json<ServicePaymentPatch>,
) -> Result<Json<ServicePayment>, ApiError> {
    patch.validate()?;
    let stored = crud::fetch::<ServicePayments>(&ctx.tables, id).await?;
    let mut errors = Vec::new();
    check_service_amounts(
        &mut errors,
        patch.cash_amount.unwrap_or(stored.cash_amount),
        patch.transfer_amount.unwrap_or(stored.transfer_amount),
        patch
            .receipt_path
            .as_deref()
            .or(stored.receipt_path.as_deref()),
    );
    if !errors.is_empty() {
        return Err(ApiError::invalid_fields(errors));
    }
    crud::update::<ServicePayments>(&ctx.tables, id, &patch)
        .await
        .map(Json)
}

async fn list_commissions(
    State(ctx): State<Arc<AppContext>>,
    _admin: AdminPrincipal,
    QueryParams(filter): QueryParams<LedgerFilter>,
) -> Result<Json<Vec<CommissionPayment>>, ApiError> {
    let query = filter
        .apply(Query::table(COMMISSIONS))
        .eq_opt("beneficiario_id", filter.beneficiario_id)
        .eq_opt("beneficiario_tipo", filter.beneficiario_tipo.map(kind_column))
        .eq_opt("estado", filter.estado.map(state_column))
        .order_desc("created_at");
    crud::list::<Commissions>(&ctx.tables, query).await.map(Json)
}

fn kind_column(kind: BeneficiaryKind) -> &'static str {
    match kind {
        BeneficiaryKind::Aval => "aval",
        BeneficiaryKind::Asesor => "asesor",
    }
}

fn state_column(state: CommissionState) -> &'static str {
    match state {
        CommissionState::Pendiente => "pendiente",
        CommissionState::Pagado => "pagado",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryTables;
    use crate::store::Tables;
    use serde_json::json;

    #[tokio::test]
    async fn ledger_filter_limits_to_unsettled_rows_in_range() {
        let memory = MemoryTables::new();
        let signing = Uuid::new_v4();
        memory.seed(
            SERVICE_PAYMENTS,
            vec![
                json!({"firma_id": signing, "monto_efectivo": "100", "fecha_pago": "2024-01-10T12:00:00Z"}),
                json!({"firma_id": signing, "monto_efectivo": "200", "fecha_pago": "2024-01-31T23:30:00Z"}),
                json!({"firma_id": signing, "monto_efectivo": "300", "fecha_pago": "2024-02-01T00:00:00Z"}),
                json!({"firma_id": signing, "monto_efectivo": "400", "fecha_pago": "2024-01-15T00:00:00Z", "corte_id": Uuid::new_v4()}),
            ],
        );
        let tables = Tables::new(Arc::new(memory));

        let filter = LedgerFilter {
            sin_corte: true,
            fecha_inicio: NaiveDate::from_ymd_opt(2024, 1, 1),
            fecha_fin: NaiveDate::from_ymd_opt(2024, 1, 31),
            ..LedgerFilter::default()
        };
        let rows = crud::list::<ServicePayments>(
            &tables,
            filter
                .apply(Query::table(SERVICE_PAYMENTS))
                .order_desc("fecha_pago"),
        )
        .await
        .expect("payments load");

        let amounts: Vec<String> = rows.iter().map(|row| row.cash_amount.to_string()).collect();
        assert_eq!(amounts, vec!["200", "100"]);
    }

    #[test]
    fn filter_labels_match_stored_values() {
        assert_eq!(
            serde_json::to_value(BeneficiaryKind::Asesor).expect("encodes"),
            json!(kind_column(BeneficiaryKind::Asesor))
        );
        assert_eq!(
            serde_json::to_value(CommissionState::Pagado).expect("encodes"),
            json!(state_column(CommissionState::Pagado))
        );
    }
}

//! Payout batches ("cortes"): selection of unsettled payments, the PDF report and the
//! stamping that marks payments as consumed.
//!
//! A batch header is written in state `pendiente` before anything else happens. Only after the
//! report is stored and every member row is stamped does it move to `cerrado`; any failure in
//! between leaves it pending so `reconcile` can finish the job.

pub mod money;
pub mod pdf;
pub mod report;
mod router;

use std::sync::Arc;

use axum::body::Bytes;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{BatchState, BeneficiaryKind, CommissionPayment, ServicePayment, SettlementBatch};
use crate::error::ApiError;
use crate::store::object_store::ObjectStore;
use crate::store::repositories::{distinct, BatchRepository, NameDirectory, PaymentLedger};

pub use report::{ReportNames, SettlementReport};
pub use router::settlement_router;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementRequest {
    pub fecha_inicio: NaiveDate,
    pub fecha_fin: NaiveDate,
    #[serde(default = "default_true")]
    pub incluir_servicios: bool,
    #[serde(default = "default_true")]
    pub incluir_comisiones: bool,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SettlementError {
    #[error("fecha_inicio must not be after fecha_fin")]
    InvalidRange,
    #[error("no unsettled payments in the selected range")]
    NoData,
    #[error("settlement {batch} voided: {claimed} payments already belong to another settlement")]
    Claimed { batch: Uuid, claimed: u64 },
    #[error("settlement {batch} left pending: {reason}")]
    Incomplete { batch: Uuid, reason: String },
}

impl From<SettlementError> for ApiError {
    fn from(value: SettlementError) -> Self {
        match value {
            SettlementError::InvalidRange => ApiError::invalid(value.to_string()),
            SettlementError::NoData => ApiError::RejectedByPolicy(value.to_string()),
            SettlementError::Claimed { .. } => ApiError::Conflict(value.to_string()),
            SettlementError::Incomplete { batch, .. } => {
                tracing::error!(batch_id = %batch, error = %value, "settlement incomplete");
                ApiError::Internal(format!("settlement {batch} left pending; reconcile it"))
            }
        }
    }
}

/// Inclusive day bounds `[start 00:00:00, end 23:59:59.999999]` in UTC.
pub fn day_bounds(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
    let to = Utc.from_utc_datetime(&end.and_time(NaiveTime::MIN)) + Duration::days(1)
        - Duration::microseconds(1);
    (from, to)
}

pub fn report_path(batch: Uuid) -> String {
    format!("reportes/cortes/{batch}.pdf")
}

#[derive(Clone)]
pub struct SettlementBuilder {
    ledger: Arc<dyn PaymentLedger>,
    names: Arc<dyn NameDirectory>,
    batches: Arc<dyn BatchRepository>,
    objects: Arc<dyn ObjectStore>,
    bucket: String,
    guard: Arc<Mutex<()>>,
}

impl SettlementBuilder {
    pub fn new(
        ledger: Arc<dyn PaymentLedger>,
        names: Arc<dyn NameDirectory>,
        batches: Arc<dyn BatchRepository>,
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            names,
            batches,
            objects,
            bucket: bucket.into(),
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub async fn list(&self) -> Result<Vec<SettlementBatch>, ApiError> {
        Ok(self.batches.list().await?)
    }

    pub async fn build(&self, request: &SettlementRequest) -> Result<SettlementBatch, ApiError> {
        if request.fecha_inicio > request.fecha_fin {
            return Err(SettlementError::InvalidRange.into());
        }
        let _serialized = self.guard.lock().await;

        let (from, to) = day_bounds(request.fecha_inicio, request.fecha_fin);
        let services = if request.incluir_servicios {
            self.ledger.unbatched_services(from, to).await?
        } else {
            Vec::new()
        };
        let commissions = if request.incluir_comisiones {
            self.ledger.unbatched_commissions(from, to).await?
        } else {
            Vec::new()
        };
        if services.is_empty() && commissions.is_empty() {
            return Err(SettlementError::NoData.into());
        }

        let total_service: Decimal = services.iter().map(ServicePayment::total).sum();
        let total_commissions: Decimal = commissions.iter().map(|payment| payment.amount).sum();
        let names = self.resolve_names(&services, &commissions).await?;

        let id = Uuid::new_v4();
        let header = json!({
            "id": id,
            "fecha_inicio": request.fecha_inicio,
            "fecha_fin": request.fecha_fin,
            "incluir_servicios": request.incluir_servicios,
            "incluir_comisiones": request.incluir_comisiones,
            "total_servicio": total_service,
            "total_comisiones": total_commissions,
            "estado": BatchState::Pendiente,
            "servicio_ids": services.iter().map(|payment| payment.id).collect::<Vec<_>>(),
            "comision_ids": commissions.iter().map(|payment| payment.id).collect::<Vec<_>>(),
        });
        let batch = self.batches.create(header).await?;
        tracing::info!(
            batch_id = %batch.id,
            services = services.len(),
            commissions = commissions.len(),
            %total_service,
            %total_commissions,
            "settlement header written"
        );

        self.complete(batch, &services, &commissions, &names).await
    }

    /// Finishes a pending batch: re-renders the report and re-runs the stamping.
    pub async fn reconcile(&self, id: Uuid) -> Result<SettlementBatch, ApiError> {
        let _serialized = self.guard.lock().await;
        let batch = self
            .batches
            .find(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("settlement not found".into()))?;

        match batch.state {
            BatchState::Cerrado => return Ok(batch),
            BatchState::Anulado => {
                return Err(ApiError::Conflict(
                    "settlement was voided and cannot be reconciled".into(),
                ))
            }
            BatchState::Pendiente => {}
        }

        let services = self.ledger.services_by_ids(&batch.service_ids).await?;
        let commissions = self.ledger.commissions_by_ids(&batch.commission_ids).await?;
        let names = self.resolve_names(&services, &commissions).await?;
        tracing::info!(batch_id = %batch.id, "reconciling settlement");
        self.complete(batch, &services, &commissions, &names).await
    }

    async fn resolve_names(
        &self,
        services: &[ServicePayment],
        commissions: &[CommissionPayment],
    ) -> Result<ReportNames, ApiError> {
        let signing_ids = distinct(
            services
                .iter()
                .map(|payment| payment.signing_id)
                .chain(commissions.iter().map(|payment| payment.signing_id)),
        );
        let beneficiaries = |kind: BeneficiaryKind| {
            distinct(
                commissions
                    .iter()
                    .filter(|payment| payment.beneficiary_kind == kind)
                    .map(|payment| payment.beneficiary_id),
            )
        };

        Ok(ReportNames {
            signings: self.names.signing_names(&signing_ids).await?,
            guarantors: self
                .names
                .guarantor_names(&beneficiaries(BeneficiaryKind::Aval))
                .await?,
            advisors: self
                .names
                .advisor_names(&beneficiaries(BeneficiaryKind::Asesor))
                .await?,
        })
    }

    async fn complete(
        &self,
        batch: SettlementBatch,
        services: &[ServicePayment],
        commissions: &[CommissionPayment],
        names: &ReportNames,
    ) -> Result<SettlementBatch, ApiError> {
        let id = batch.id;
        let incomplete = |reason: String| SettlementError::Incomplete { batch: id, reason };

        let report = SettlementReport {
            start_date: batch.start_date,
            end_date: batch.end_date,
            total_service: batch.total_service,
            total_commissions: batch.total_commissions,
            services,
            commissions,
            names,
        };
        let path = report_path(id);
        self.objects
            .upload(
                &self.bucket,
                &path,
                Bytes::from(report.render()),
                mime::APPLICATION_PDF.as_ref(),
            )
            .await
            .map_err(|err| incomplete(format!("report upload failed: {err}")))?;
        self.batches
            .update(id, json!({ "pdf_path": path }))
            .await
            .map_err(|err| incomplete(format!("report path not recorded: {err}")))?;

        let service_ids: Vec<Uuid> = services.iter().map(|payment| payment.id).collect();
        let commission_ids: Vec<Uuid> = commissions.iter().map(|payment| payment.id).collect();
        let outcome = self
            .batches
            .seal(id, &service_ids, &commission_ids)
            .await
            .map_err(|err| incomplete(format!("stamping failed: {err}")))?;

        if outcome.claimed > 0 {
            self.batches
                .update(id, json!({ "estado": BatchState::Anulado }))
                .await
                .map_err(|err| incomplete(format!("could not void batch: {err}")))?;
            tracing::warn!(batch_id = %id, claimed = outcome.claimed, "settlement voided");
            return Err(SettlementError::Claimed {
                batch: id,
                claimed: outcome.claimed,
            }
            .into());
        }

        let closed = self
            .batches
            .update(id, json!({ "estado": BatchState::Cerrado }))
            .await
            .map_err(|err| incomplete(format!("could not close batch: {err}")))?;
        tracing::info!(batch_id = %id, stamped = outcome.stamped, "settlement closed");
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryObjects, MemoryTables};
    use crate::store::repositories::{BATCHES, COMMISSIONS, SERVICE_PAYMENTS, SIGNINGS};
    use crate::store::Tables;
    use serde_json::Value;

    fn builder(memory: &MemoryTables, objects: &MemoryObjects) -> SettlementBuilder {
        let tables = Tables::new(Arc::new(memory.clone()));
        SettlementBuilder::new(
            Arc::new(tables.clone()),
            Arc::new(tables.clone()),
            Arc::new(tables),
            Arc::new(objects.clone()),
            "documentos-aval",
        )
    }

    fn january() -> SettlementRequest {
        SettlementRequest {
            fecha_inicio: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            fecha_fin: NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date"),
            incluir_servicios: true,
            incluir_comisiones: true,
        }
    }

    fn seed_january(memory: &MemoryTables) -> Uuid {
        let signing = Uuid::new_v4();
        memory.seed(
            SIGNINGS,
            vec![json!({"id": signing, "cliente_nombre": "Ana Ruiz", "asesor_nombre": "Luis"})],
        );
        memory.seed(
            SERVICE_PAYMENTS,
            vec![
                json!({"firma_id": signing, "monto_efectivo": "100.00", "monto_transferencia": "0", "fecha_pago": "2024-01-05T10:00:00Z", "corte_id": null}),
                json!({"firma_id": signing, "monto_efectivo": "0", "monto_transferencia": "250.50", "fecha_pago": "2024-01-20T10:00:00Z", "corte_id": null}),
                json!({"firma_id": signing, "monto_efectivo": "49.50", "monto_transferencia": "0", "fecha_pago": "2024-01-31T23:59:59Z", "corte_id": null}),
                json!({"firma_id": signing, "monto_efectivo": "999", "monto_transferencia": "0", "fecha_pago": "2024-02-01T00:00:00Z", "corte_id": null}),
            ],
        );
        signing
    }

    #[test]
    fn day_bounds_cover_whole_days() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date");
        let (from, to) = day_bounds(day, day);
        assert_eq!(from.to_rfc3339(), "2024-01-31T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2024-01-31T23:59:59.999999+00:00");
    }

    #[tokio::test]
    async fn january_batch_totals_and_consumes_payments() {
        let memory = MemoryTables::new();
        let objects = MemoryObjects::default();
        seed_january(&memory);
        let builder = builder(&memory, &objects);

        let batch = builder.build(&january()).await.expect("settlement builds");
        assert_eq!(batch.total_service, Decimal::new(40_000, 2));
        assert_eq!(batch.total_commissions, Decimal::ZERO);
        assert_eq!(batch.state, BatchState::Cerrado);
        assert_eq!(batch.report_path.as_deref(), Some(report_path(batch.id).as_str()));
        assert_eq!(batch.service_ids.len(), 3);

        let (pdf, content_type) = objects
            .get("documentos-aval", &report_path(batch.id))
            .expect("report uploaded");
        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(content_type, "application/pdf");

        let stamped = memory
            .rows(SERVICE_PAYMENTS)
            .into_iter()
            .filter(|row| row["corte_id"] == Value::String(batch.id.to_string()))
            .count();
        assert_eq!(stamped, 3);

        match builder.build(&january()).await {
            Err(ApiError::RejectedByPolicy(_)) => {}
            other => panic!("expected no data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn inverted_range_is_invalid() {
        let memory = MemoryTables::new();
        let objects = MemoryObjects::default();
        let mut request = january();
        std::mem::swap(&mut request.fecha_inicio, &mut request.fecha_fin);
        match builder(&memory, &objects).build(&request).await {
            Err(ApiError::InvalidRequest { .. }) => {}
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_upload_leaves_batch_pending_until_reconciled() {
        let memory = MemoryTables::new();
        let objects = MemoryObjects::default();
        seed_january(&memory);
        let builder = builder(&memory, &objects);

        objects.fail_uploads(true);
        match builder.build(&january()).await {
            Err(ApiError::Internal(message)) => assert!(message.contains("left pending")),
            other => panic!("expected internal error, got {other:?}"),
        }
        let header = memory.rows(BATCHES).pop().expect("header written");
        assert_eq!(header["estado"], "pendiente");
        assert!(memory
            .rows(SERVICE_PAYMENTS)
            .iter()
            .all(|row| row["corte_id"].is_null()));

        objects.fail_uploads(false);
        let id: Uuid = serde_json::from_value(header["id"].clone()).expect("batch id");
        let batch = builder.reconcile(id).await.expect("reconcile closes batch");
        assert_eq!(batch.state, BatchState::Cerrado);
        assert!(objects.get("documentos-aval", &report_path(id)).is_some());
    }

    #[tokio::test]
    async fn rows_claimed_elsewhere_void_the_batch() {
        let memory = MemoryTables::new();
        let objects = MemoryObjects::default();
        let signing = seed_january(&memory);
        let builder = builder(&memory, &objects);

        memory.seed(
            COMMISSIONS,
            vec![json!({"firma_id": signing, "beneficiario_tipo": "aval", "beneficiario_id": Uuid::new_v4(), "monto": "300", "fecha_pago": "2024-01-10T00:00:00Z", "corte_id": null})],
        );
        memory.register_function("fn_sellar_corte", move |_, _| {
            Ok(json!({ "stamped": 0, "claimed": 1 }))
        });

        match builder.build(&january()).await {
            Err(ApiError::Conflict(message)) => assert!(message.contains("voided")),
            other => panic!("expected conflict, got {other:?}"),
        }
        let header = memory.rows(BATCHES).pop().expect("header written");
        assert_eq!(header["estado"], "anulado");
        assert!(memory
            .rows(COMMISSIONS)
            .iter()
            .all(|row| row["corte_id"].is_null()));
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_non_negative, Validate};
use crate::error::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServicePaymentState {
    #[default]
    Registrado,
    Liquidado,
}

/// Service fee collected for a signing, in cash and/or transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePayment {
    pub id: Uuid,
    #[serde(rename = "firma_id")]
    pub signing_id: Uuid,
    #[serde(rename = "monto_efectivo", default)]
    pub cash_amount: Decimal,
    #[serde(rename = "monto_transferencia", default)]
    pub transfer_amount: Decimal,
    #[serde(rename = "fecha_pago", default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "comprobante_url", default)]
    pub receipt_path: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(rename = "estado", default)]
    pub state: ServicePaymentState,
    /// Settlement batch that consumed this payment.
    #[serde(rename = "corte_id", default)]
    pub batch_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ServicePayment {
    pub fn total(&self) -> Decimal {
        self.cash_amount + self.transfer_amount
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePaymentDraft {
    #[serde(rename = "firma_id")]
    pub signing_id: Uuid,
    #[serde(rename = "monto_efectivo", default)]
    pub cash_amount: Decimal,
    #[serde(rename = "monto_transferencia", default)]
    pub transfer_amount: Decimal,
    #[serde(rename = "fecha_pago", default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "comprobante_url", default, skip_serializing_if = "Option::is_none")]
    pub receipt_path: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "estado", default)]
    pub state: ServicePaymentState,
    #[serde(rename = "corte_id", default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

impl Validate for ServicePaymentDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_non_negative(errors, "monto_efectivo", Some(self.cash_amount));
        check_non_negative(errors, "monto_transferencia", Some(self.transfer_amount));
        check_service_amounts(
            errors,
            self.cash_amount,
            self.transfer_amount,
            self.receipt_path.as_deref(),
        );
    }
}

/// At least one positive amount; a transfer needs its receipt on file.
pub(crate) fn check_service_amounts(
    errors: &mut Vec<FieldError>,
    cash: Decimal,
    transfer: Decimal,
    receipt: Option<&str>,
) {
    if cash <= Decimal::ZERO && transfer <= Decimal::ZERO {
        errors.push(FieldError::new(
            "monto_efectivo",
            "at least one of monto_efectivo or monto_transferencia must be positive",
        ));
    }
    if transfer > Decimal::ZERO && receipt.map(str::trim).unwrap_or_default().is_empty() {
        errors.push(FieldError::new(
            "comprobante_url",
            "comprobante_url is required for transfer payments",
        ));
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicePaymentPatch {
    #[serde(rename = "monto_efectivo", default, skip_serializing_if = "Option::is_none")]
    pub cash_amount: Option<Decimal>,
    #[serde(
        rename = "monto_transferencia",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transfer_amount: Option<Decimal>,
    #[serde(rename = "fecha_pago", default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "comprobante_url", default, skip_serializing_if = "Option::is_none")]
    pub receipt_path: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ServicePaymentState>,
    #[serde(rename = "corte_id", default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

impl Validate for ServicePaymentPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_non_negative(errors, "monto_efectivo", self.cash_amount);
        check_non_negative(errors, "monto_transferencia", self.transfer_amount);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeneficiaryKind {
    Aval,
    Asesor,
}

impl BeneficiaryKind {
    pub const fn label(self) -> &'static str {
        match self {
            BeneficiaryKind::Aval => "Aval",
            BeneficiaryKind::Asesor => "Asesor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentChannel {
    Efectivo,
    Transferencia,
    Mixto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommissionState {
    #[default]
    Pendiente,
    Pagado,
}

/// Commission owed to a guarantor or advisor for a signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionPayment {
    pub id: Uuid,
    #[serde(rename = "firma_id")]
    pub signing_id: Uuid,
    #[serde(rename = "beneficiario_tipo")]
    pub beneficiary_kind: BeneficiaryKind,
    #[serde(rename = "beneficiario_id")]
    pub beneficiary_id: Uuid,
    #[serde(rename = "monto")]
    pub amount: Decimal,
    #[serde(rename = "metodo", default)]
    pub channel: Option<PaymentChannel>,
    #[serde(rename = "fecha_programada", default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_pago", default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "comprobante_url", default)]
    pub receipt_path: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(rename = "estado", default)]
    pub state: CommissionState,
    #[serde(rename = "corte_id", default)]
    pub batch_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionPaymentDraft {
    #[serde(rename = "firma_id")]
    pub signing_id: Uuid,
    #[serde(rename = "beneficiario_tipo")]
    pub beneficiary_kind: BeneficiaryKind,
    #[serde(rename = "beneficiario_id")]
    pub beneficiary_id: Uuid,
    #[serde(rename = "monto")]
    pub amount: Decimal,
    #[serde(rename = "metodo", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<PaymentChannel>,
    #[serde(rename = "fecha_programada", default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_pago", default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "comprobante_url", default, skip_serializing_if = "Option::is_none")]
    pub receipt_path: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "estado", default)]
    pub state: CommissionState,
    #[serde(rename = "corte_id", default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

impl Validate for CommissionPaymentDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_non_negative(errors, "monto", Some(self.amount));
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommissionPaymentPatch {
    #[serde(rename = "beneficiario_tipo", default, skip_serializing_if = "Option::is_none")]
    pub beneficiary_kind: Option<BeneficiaryKind>,
    #[serde(rename = "beneficiario_id", default, skip_serializing_if = "Option::is_none")]
    pub beneficiary_id: Option<Uuid>,
    #[serde(rename = "monto", default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(rename = "metodo", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<PaymentChannel>,
    #[serde(rename = "fecha_programada", default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_pago", default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "comprobante_url", default, skip_serializing_if = "Option::is_none")]
    pub receipt_path: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<CommissionState>,
    #[serde(rename = "corte_id", default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
}

impl Validate for CommissionPaymentPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_non_negative(errors, "monto", self.amount);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Efectivo,
    Bancario,
}

/// Rent payment recorded against a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    #[serde(rename = "contrato_id")]
    pub contract_id: Uuid,
    #[serde(rename = "metodo")]
    pub method: PaymentMethod,
    #[serde(rename = "monto")]
    pub amount: Decimal,
    #[serde(rename = "fecha_pago", default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub referencia: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDraft {
    #[serde(rename = "contrato_id")]
    pub contract_id: Uuid,
    #[serde(rename = "metodo")]
    pub method: PaymentMethod,
    #[serde(rename = "monto")]
    pub amount: Decimal,
    #[serde(rename = "fecha_pago", default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referencia: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for PaymentDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_non_negative(errors, "monto", Some(self.amount));
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentPatch {
    #[serde(rename = "metodo", default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
    #[serde(rename = "monto", default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(rename = "fecha_pago", default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referencia: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for PaymentPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_non_negative(errors, "monto", self.amount);
    }
}

/// Lifecycle of a settlement batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    /// Header written; report or stamping not yet confirmed.
    #[default]
    Pendiente,
    Cerrado,
    /// Members were claimed by another batch.
    Anulado,
}

/// Snapshot of the payments settled over a closed date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementBatch {
    pub id: Uuid,
    #[serde(rename = "fecha_inicio")]
    pub start_date: NaiveDate,
    #[serde(rename = "fecha_fin")]
    pub end_date: NaiveDate,
    #[serde(rename = "incluir_servicios", default)]
    pub include_services: bool,
    #[serde(rename = "incluir_comisiones", default)]
    pub include_commissions: bool,
    #[serde(rename = "total_servicio")]
    pub total_service: Decimal,
    #[serde(rename = "total_comisiones")]
    pub total_commissions: Decimal,
    #[serde(rename = "pdf_path", default)]
    pub report_path: Option<String>,
    #[serde(rename = "estado", default)]
    pub state: BatchState,
    #[serde(rename = "servicio_ids", default)]
    pub service_ids: Vec<Uuid>,
    #[serde(rename = "comision_ids", default)]
    pub commission_ids: Vec<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

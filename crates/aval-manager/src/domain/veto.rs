use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_min_len, Validate};
use crate::error::FieldError;

/// Registry status shared by guarantor vetoes and the client blacklist.
///
/// `activo` and `levantado` are legacy spellings still present in older rows; they decode to
/// the canonical values and are never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VetoStatus {
    #[default]
    #[serde(alias = "activo")]
    Vetado,
    #[serde(alias = "levantado")]
    Limpio,
}

impl VetoStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VetoStatus::Vetado => "vetado",
            VetoStatus::Limpio => "limpio",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, VetoStatus::Vetado)
    }

    /// Labels matched when filtering for active entries.
    pub const ACTIVE_LABELS: [&'static str; 2] = ["vetado", "activo"];
}

/// Exclusion of a guarantor, either global or scoped to one agency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuarantorVeto {
    pub id: Uuid,
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    /// `None` makes the veto global.
    #[serde(rename = "inmobiliaria_id", default)]
    pub agency_id: Option<Uuid>,
    #[serde(default)]
    pub motivo: Option<String>,
    #[serde(rename = "estatus", default)]
    pub status: VetoStatus,
    #[serde(rename = "registrado_por", default)]
    pub registered_by: Option<Uuid>,
    #[serde(rename = "limpio_at", default)]
    pub cleared_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl GuarantorVeto {
    pub fn is_global(&self) -> bool {
        self.agency_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuarantorVetoDraft {
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    #[serde(rename = "inmobiliaria_id", default)]
    pub agency_id: Option<Uuid>,
    pub motivo: String,
    #[serde(rename = "estatus", default)]
    pub status: VetoStatus,
    #[serde(rename = "registrado_por", default, skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<Uuid>,
    #[serde(rename = "limpio_at", default, skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
}

impl Validate for GuarantorVetoDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "motivo", Some(&self.motivo), 1);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuarantorVetoPatch {
    #[serde(rename = "inmobiliaria_id", default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
    #[serde(rename = "estatus", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VetoStatus>,
    #[serde(rename = "registrado_por", default, skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<Uuid>,
    #[serde(rename = "limpio_at", default, skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
}

impl Validate for GuarantorVetoPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "motivo", self.motivo.as_deref(), 1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistReason {
    #[default]
    Moroso,
    Problematico,
}

/// Client blacklist entry; any active entry blocks new signings for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientBlacklistEntry {
    pub id: Uuid,
    #[serde(rename = "cliente_id")]
    pub client_id: Uuid,
    #[serde(rename = "registrado_por", default)]
    pub registered_by: Option<Uuid>,
    #[serde(rename = "motivo_tipo", default)]
    pub reason: BlacklistReason,
    #[serde(default)]
    pub motivo: Option<String>,
    #[serde(rename = "estatus", default)]
    pub status: VetoStatus,
    #[serde(rename = "limpio_at", default)]
    pub cleared_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientBlacklistDraft {
    #[serde(rename = "cliente_id")]
    pub client_id: Uuid,
    #[serde(rename = "registrado_por", default, skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<Uuid>,
    #[serde(rename = "motivo_tipo", default)]
    pub reason: BlacklistReason,
    pub motivo: String,
    #[serde(rename = "estatus", default)]
    pub status: VetoStatus,
    #[serde(rename = "limpio_at", default, skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
}

impl Validate for ClientBlacklistDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "motivo", Some(&self.motivo), 1);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientBlacklistPatch {
    #[serde(rename = "motivo_tipo", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<BlacklistReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivo: Option<String>,
    #[serde(rename = "estatus", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VetoStatus>,
    #[serde(rename = "registrado_por", default, skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<Uuid>,
    #[serde(rename = "limpio_at", default, skip_serializing_if = "Option::is_none")]
    pub cleared_at: Option<DateTime<Utc>>,
}

impl Validate for ClientBlacklistPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "motivo", self.motivo.as_deref(), 1);
    }
}

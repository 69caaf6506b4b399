use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_email, check_min_len, Validate};
use crate::error::FieldError;

/// Guarantor ("aval") profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guarantor {
    pub id: Uuid,
    #[serde(rename = "nombre_completo")]
    pub full_name: String,
    #[serde(rename = "edad", default)]
    pub age: Option<i32>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "estado_civil", default)]
    pub marital_status: Option<String>,
    #[serde(rename = "domicilio_actual", default)]
    pub address: Option<String>,
    #[serde(flatten)]
    pub documents: GuarantorDocuments,
    #[serde(rename = "buro_credito_password", default)]
    pub credit_report_password: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(rename = "activo", default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Storage paths of the documents kept on file for a guarantor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuarantorDocuments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identificacion_oficial_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprobante_domicilio_cfe_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprobante_domicilio_siapa_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pago_predial_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escrituras_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificado_libre_gravamen_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curp_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acta_nacimiento_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprobante_ingresos_1_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprobante_ingresos_2_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprobante_ingresos_3_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buro_credito_url: Option<String>,
}

impl GuarantorDocuments {
    /// Column names of the labelled documents, in display order.
    pub const LABELLED_COLUMNS: [&'static str; 12] = [
        "identificacion_oficial_url",
        "comprobante_domicilio_cfe_url",
        "comprobante_domicilio_siapa_url",
        "pago_predial_url",
        "escrituras_url",
        "certificado_libre_gravamen_url",
        "rfc_url",
        "curp_url",
        "acta_nacimiento_url",
        "comprobante_ingresos_1_url",
        "comprobante_ingresos_2_url",
        "comprobante_ingresos_3_url",
    ];

    /// Human label and stored path of every document present on file.
    pub fn labelled(&self) -> Vec<(&'static str, &str)> {
        let entries = [
            ("Identificación oficial", &self.identificacion_oficial_url),
            ("Comprobante domicilio CFE", &self.comprobante_domicilio_cfe_url),
            ("Comprobante domicilio SIAPA", &self.comprobante_domicilio_siapa_url),
            ("Pago predial", &self.pago_predial_url),
            ("Escrituras", &self.escrituras_url),
            (
                "Certificado libre de gravamen",
                &self.certificado_libre_gravamen_url,
            ),
            ("RFC", &self.rfc_url),
            ("CURP", &self.curp_url),
            ("Acta de nacimiento", &self.acta_nacimiento_url),
            ("Comprobante de ingresos 1", &self.comprobante_ingresos_1_url),
            ("Comprobante de ingresos 2", &self.comprobante_ingresos_2_url),
            ("Comprobante de ingresos 3", &self.comprobante_ingresos_3_url),
        ];
        entries
            .into_iter()
            .filter_map(|(label, path)| {
                path.as_deref()
                    .map(str::trim)
                    .filter(|path| !path.is_empty())
                    .map(|path| (label, path))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuarantorDraft {
    #[serde(rename = "nombre_completo")]
    pub full_name: String,
    #[serde(rename = "edad", default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "estado_civil", default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
    #[serde(rename = "domicilio_actual", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(flatten)]
    pub documents: GuarantorDocuments,
    #[serde(
        rename = "buro_credito_password",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credit_report_password: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "activo", default = "default_active")]
    pub active: bool,
    /// Availability blocks stored alongside the profile.
    #[serde(rename = "disponibilidades", default, skip_serializing)]
    pub availability: Option<Vec<AvailabilityInput>>,
}

impl Validate for GuarantorDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre_completo", Some(&self.full_name), 1);
        if self.age.is_some_and(|age| age < 0) {
            errors.push(FieldError::new("edad", "edad must not be negative"));
        }
        check_email(errors, "email", self.email.as_deref());
        validate_blocks(errors, self.availability.as_deref());
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuarantorPatch {
    #[serde(rename = "nombre_completo", default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "edad", default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "estado_civil", default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
    #[serde(rename = "domicilio_actual", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(flatten)]
    pub documents: GuarantorDocuments,
    #[serde(
        rename = "buro_credito_password",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub credit_report_password: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "activo", default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    /// When present, replaces every stored availability block.
    #[serde(rename = "disponibilidades", default, skip_serializing)]
    pub availability: Option<Vec<AvailabilityInput>>,
}

impl Validate for GuarantorPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre_completo", self.full_name.as_deref(), 1);
        if self.age.is_some_and(|age| age < 0) {
            errors.push(FieldError::new("edad", "edad must not be negative"));
        }
        check_email(errors, "email", self.email.as_deref());
        validate_blocks(errors, self.availability.as_deref());
    }
}

fn validate_blocks(errors: &mut Vec<FieldError>, blocks: Option<&[AvailabilityInput]>) {
    for (index, block) in blocks.unwrap_or_default().iter().enumerate() {
        if block.ends_at < block.starts_at {
            errors.push(FieldError::new(
                format!("disponibilidades[{index}].fecha_fin"),
                "fecha_fin must not precede fecha_inicio",
            ));
        }
    }
}

/// Contact card exposed on the public surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicGuarantor {
    pub id: Uuid,
    #[serde(rename = "nombre_completo")]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
}

/// Interval during which a guarantor can attend signings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityBlock {
    pub id: Uuid,
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    #[serde(rename = "fecha_inicio")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_fin")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "recurrente", default)]
    pub recurring: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Block supplied inline with a guarantor profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityInput {
    #[serde(rename = "fecha_inicio")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_fin")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "recurrente", default)]
    pub recurring: bool,
}

impl AvailabilityInput {
    pub fn for_guarantor(&self, guarantor_id: Uuid) -> AvailabilityDraft {
        AvailabilityDraft {
            guarantor_id,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            recurring: self.recurring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityDraft {
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    #[serde(rename = "fecha_inicio")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_fin")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "recurrente", default)]
    pub recurring: bool,
}

impl Validate for AvailabilityDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        if self.ends_at < self.starts_at {
            errors.push(FieldError::new(
                "fecha_fin",
                "fecha_fin must not precede fecha_inicio",
            ));
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityPatch {
    #[serde(rename = "fecha_inicio", default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_fin", default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "recurrente", default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<bool>,
}

impl Validate for AvailabilityPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end < start {
                errors.push(FieldError::new(
                    "fecha_fin",
                    "fecha_fin must not precede fecha_inicio",
                ));
            }
        }
    }
}

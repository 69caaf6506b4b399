use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_email, check_http_url, check_min_len, check_non_negative, Validate};
use crate::error::FieldError;

/// Sales advisor; `user_id` links the profile to a login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisor {
    pub id: Uuid,
    pub nombre: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "pago_comision", default)]
    pub commission_rate: Decimal,
    #[serde(rename = "firmas_count", default)]
    pub signing_count: i32,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorDraft {
    pub nombre: String,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "pago_comision")]
    pub commission_rate: Decimal,
    #[serde(rename = "firmas_count", default)]
    pub signing_count: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl Validate for AdvisorDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre", Some(&self.nombre), 3);
        check_min_len(errors, "telefono", self.phone.as_deref(), 7);
        check_non_negative(errors, "pago_comision", Some(self.commission_rate));
        if self.signing_count < 0 {
            errors.push(FieldError::new("firmas_count", "firmas_count must not be negative"));
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvisorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "pago_comision", default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<Decimal>,
    #[serde(rename = "firmas_count", default, skip_serializing_if = "Option::is_none")]
    pub signing_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl Validate for AdvisorPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre", self.nombre.as_deref(), 3);
        check_min_len(errors, "telefono", self.phone.as_deref(), 7);
        check_non_negative(errors, "pago_comision", self.commission_rate);
        if self.signing_count.is_some_and(|count| count < 0) {
            errors.push(FieldError::new("firmas_count", "firmas_count must not be negative"));
        }
    }
}

/// Real-estate agency that can originate signings and scope vetoes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    pub id: Uuid,
    pub nombre: String,
    #[serde(rename = "contacto", default)]
    pub contact: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyDraft {
    pub nombre: String,
    #[serde(rename = "contacto", default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for AgencyDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre", Some(&self.nombre), 3);
        check_email(errors, "email", self.email.as_deref());
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgencyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(rename = "contacto", default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for AgencyPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre", self.nombre.as_deref(), 3);
        check_email(errors, "email", self.email.as_deref());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyReference {
    pub nombre_completo: String,
    pub parentesco: String,
    pub telefono: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalReference {
    pub nombre_completo: String,
    pub telefono: String,
}

/// Tenant who rents with a guarantor's backing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    #[serde(rename = "nombre_completo")]
    pub full_name: String,
    #[serde(default)]
    pub identificacion_oficial_url: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub curp: Option<String>,
    #[serde(default)]
    pub rfc: Option<String>,
    #[serde(rename = "numero_identificacion", default)]
    pub id_number: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(rename = "referencias_familiares", default)]
    pub family_references: Vec<FamilyReference>,
    #[serde(rename = "referencias_conocidos", default)]
    pub personal_references: Vec<PersonalReference>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientDraft {
    #[serde(rename = "nombre_completo")]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identificacion_oficial_url: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfc: Option<String>,
    #[serde(
        rename = "numero_identificacion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id_number: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "referencias_familiares", default)]
    pub family_references: Vec<FamilyReference>,
    #[serde(rename = "referencias_conocidos", default)]
    pub personal_references: Vec<PersonalReference>,
}

impl Validate for ClientDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre_completo", Some(&self.full_name), 1);
        check_email(errors, "email", self.email.as_deref());
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientPatch {
    #[serde(rename = "nombre_completo", default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identificacion_oficial_url: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rfc: Option<String>,
    #[serde(
        rename = "numero_identificacion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id_number: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        rename = "referencias_familiares",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub family_references: Option<Vec<FamilyReference>>,
    #[serde(
        rename = "referencias_conocidos",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub personal_references: Option<Vec<PersonalReference>>,
}

impl Validate for ClientPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "nombre_completo", self.full_name.as_deref(), 1);
        check_email(errors, "email", self.email.as_deref());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    #[serde(rename = "domicilio")]
    pub address: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "estado")]
    pub region: String,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDraft {
    #[serde(rename = "domicilio")]
    pub address: String,
    #[serde(rename = "ciudad", default = "default_city")]
    pub city: String,
    #[serde(rename = "estado", default = "default_region")]
    pub region: String,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_city() -> String {
    "Guadalajara".to_string()
}

fn default_region() -> String {
    "Jalisco".to_string()
}

impl Validate for PropertyDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "domicilio", Some(&self.address), 1);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyPatch {
    #[serde(rename = "domicilio", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "ciudad", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for PropertyPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "domicilio", self.address.as_deref(), 1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContractState {
    #[default]
    Pendiente,
    Firmado,
    Cancelado,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    #[serde(rename = "cliente_id")]
    pub client_id: Uuid,
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    #[serde(rename = "propiedad_id")]
    pub property_id: Uuid,
    #[serde(rename = "lugar_firma_maps_url")]
    pub signing_location_url: String,
    #[serde(rename = "tipo_renta")]
    pub rental_kind: String,
    #[serde(rename = "monto_renta_mensual")]
    pub monthly_rent: Decimal,
    #[serde(rename = "pago_por_servicio")]
    pub service_fee: Decimal,
    #[serde(rename = "periodo_contrato")]
    pub term: String,
    #[serde(rename = "fecha_firma")]
    pub signed_at: DateTime<Utc>,
    #[serde(rename = "estado", default)]
    pub state: ContractState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDraft {
    #[serde(rename = "cliente_id")]
    pub client_id: Uuid,
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    #[serde(rename = "propiedad_id")]
    pub property_id: Uuid,
    #[serde(rename = "lugar_firma_maps_url")]
    pub signing_location_url: String,
    #[serde(rename = "tipo_renta")]
    pub rental_kind: String,
    #[serde(rename = "monto_renta_mensual")]
    pub monthly_rent: Decimal,
    #[serde(rename = "pago_por_servicio")]
    pub service_fee: Decimal,
    #[serde(rename = "periodo_contrato")]
    pub term: String,
    #[serde(rename = "fecha_firma")]
    pub signed_at: DateTime<Utc>,
    #[serde(rename = "estado", default)]
    pub state: ContractState,
}

impl Validate for ContractDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_http_url(errors, "lugar_firma_maps_url", Some(&self.signing_location_url));
        check_non_negative(errors, "monto_renta_mensual", Some(self.monthly_rent));
        check_non_negative(errors, "pago_por_servicio", Some(self.service_fee));
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractPatch {
    #[serde(rename = "cliente_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(rename = "aval_id", default, skip_serializing_if = "Option::is_none")]
    pub guarantor_id: Option<Uuid>,
    #[serde(rename = "propiedad_id", default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<Uuid>,
    #[serde(
        rename = "lugar_firma_maps_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub signing_location_url: Option<String>,
    #[serde(rename = "tipo_renta", default, skip_serializing_if = "Option::is_none")]
    pub rental_kind: Option<String>,
    #[serde(
        rename = "monto_renta_mensual",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub monthly_rent: Option<Decimal>,
    #[serde(
        rename = "pago_por_servicio",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_fee: Option<Decimal>,
    #[serde(rename = "periodo_contrato", default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(rename = "fecha_firma", default, skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ContractState>,
}

impl Validate for ContractPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_http_url(
            errors,
            "lugar_firma_maps_url",
            self.signing_location_url.as_deref(),
        );
        check_non_negative(errors, "monto_renta_mensual", self.monthly_rent);
        check_non_negative(errors, "pago_por_servicio", self.service_fee);
    }
}

/// File attached to a contract or client, stored in the document bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    #[serde(rename = "contrato_id", default)]
    pub contract_id: Option<Uuid>,
    #[serde(rename = "cliente_id", default)]
    pub client_id: Option<Uuid>,
    pub tipo: String,
    #[serde(rename = "archivo_path")]
    pub path: String,
    #[serde(rename = "creado_por", default)]
    pub created_by: Option<Uuid>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDraft {
    #[serde(rename = "contrato_id", default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<Uuid>,
    #[serde(rename = "cliente_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    pub tipo: String,
    #[serde(rename = "archivo_path")]
    pub path: String,
    #[serde(rename = "creado_por", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for DocumentDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "tipo", Some(&self.tipo), 1);
        check_min_len(errors, "archivo_path", Some(&self.path), 1);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(rename = "contrato_id", default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<Uuid>,
    #[serde(rename = "cliente_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(rename = "archivo_path", default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for DocumentPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "tipo", self.tipo.as_deref(), 1);
        check_min_len(errors, "archivo_path", self.path.as_deref(), 1);
    }
}

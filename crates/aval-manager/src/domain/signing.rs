use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::{check_email, check_http_url, check_min_len, check_non_negative, Validate};
use crate::error::FieldError;

/// Lifecycle of a signing appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SigningState {
    #[default]
    Programada,
    Realizada,
    Reprogramada,
    Cancelada,
}

impl SigningState {
    /// States that hold the guarantor's calendar.
    pub const ACTIVE: [SigningState; 2] = [SigningState::Programada, SigningState::Reprogramada];

    pub const fn label(self) -> &'static str {
        match self {
            SigningState::Programada => "programada",
            SigningState::Realizada => "realizada",
            SigningState::Reprogramada => "reprogramada",
            SigningState::Cancelada => "cancelada",
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, SigningState::Programada | SigningState::Reprogramada)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, SigningState::Realizada | SigningState::Cancelada)
    }

    /// Whether a stored signing in `self` may move to `next`.
    pub const fn can_transition_to(self, next: SigningState) -> bool {
        match self {
            SigningState::Programada => !matches!(next, SigningState::Programada),
            SigningState::Reprogramada => !matches!(next, SigningState::Programada),
            SigningState::Realizada | SigningState::Cancelada => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SigningChannel {
    Inmobiliaria,
    #[default]
    DuenoDirecto,
}

/// Booking of one guarantor for a client within `[starts_at, ends_at)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signing {
    pub id: Uuid,
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    #[serde(rename = "cliente_id", default)]
    pub client_id: Option<Uuid>,
    #[serde(rename = "inmobiliaria_id", default)]
    pub agency_id: Option<Uuid>,
    #[serde(rename = "contrato_id", default)]
    pub contract_id: Option<Uuid>,
    #[serde(rename = "asesor_nombre", default)]
    pub advisor_name: Option<String>,
    #[serde(rename = "cliente_nombre", default)]
    pub client_name: Option<String>,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "correo", default)]
    pub email: Option<String>,
    #[serde(rename = "tipo_renta", default)]
    pub rental_kind: Option<String>,
    #[serde(rename = "periodo_contrato_anios", default)]
    pub contract_years: Option<i32>,
    #[serde(rename = "monto_renta", default)]
    pub rent_amount: Option<Decimal>,
    #[serde(rename = "propiedad_domicilio", default)]
    pub property_address: Option<String>,
    #[serde(rename = "ubicacion_maps_url", default)]
    pub location_url: Option<String>,
    #[serde(rename = "fecha_inicio")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "fecha_fin")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "estado", default)]
    pub state: SigningState,
    #[serde(rename = "canal_firma", default)]
    pub channel: SigningChannel,
    #[serde(rename = "pago_por_servicio", default)]
    pub service_fee: Option<Decimal>,
    #[serde(rename = "solicitud_aval_url", default)]
    pub request_url: Option<String>,
    #[serde(rename = "notas", default)]
    pub notes: Option<String>,
    #[serde(rename = "creado_por", default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningDraft {
    #[serde(rename = "aval_id")]
    pub guarantor_id: Uuid,
    #[serde(rename = "cliente_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    #[serde(rename = "inmobiliaria_id", default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<Uuid>,
    #[serde(rename = "contrato_id", default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<Uuid>,
    #[serde(rename = "asesor_nombre")]
    pub advisor_name: String,
    #[serde(rename = "cliente_nombre")]
    pub client_name: String,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "correo", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "tipo_renta")]
    pub rental_kind: String,
    #[serde(rename = "periodo_contrato_anios")]
    pub contract_years: i32,
    #[serde(rename = "monto_renta")]
    pub rent_amount: Decimal,
    #[serde(rename = "propiedad_domicilio")]
    pub property_address: String,
    #[serde(rename = "ubicacion_maps_url")]
    pub location_url: String,
    #[serde(rename = "fecha_inicio")]
    pub starts_at: DateTime<Utc>,
    /// Defaults to `starts_at` when omitted.
    #[serde(rename = "fecha_fin", default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "estado", default)]
    pub state: SigningState,
    #[serde(rename = "canal_firma", default)]
    pub channel: SigningChannel,
    #[serde(rename = "pago_por_servicio")]
    pub service_fee: Decimal,
    #[serde(
        rename = "solicitud_aval_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_url: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "creado_por", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Uuid>,
}

impl Validate for SigningDraft {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "asesor_nombre", Some(&self.advisor_name), 3);
        check_min_len(errors, "cliente_nombre", Some(&self.client_name), 3);
        check_min_len(errors, "telefono", self.phone.as_deref(), 7);
        check_email(errors, "correo", self.email.as_deref());
        check_min_len(errors, "tipo_renta", Some(&self.rental_kind), 3);
        check_contract_years(errors, Some(self.contract_years));
        check_non_negative(errors, "monto_renta", Some(self.rent_amount));
        check_min_len(errors, "propiedad_domicilio", Some(&self.property_address), 3);
        check_http_url(errors, "ubicacion_maps_url", Some(&self.location_url));
        check_non_negative(errors, "pago_por_servicio", Some(self.service_fee));
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningPatch {
    #[serde(rename = "aval_id", default, skip_serializing_if = "Option::is_none")]
    pub guarantor_id: Option<Uuid>,
    #[serde(rename = "cliente_id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<Uuid>,
    /// `Some(None)` clears the agency; an absent field keeps it.
    #[serde(
        rename = "inmobiliaria_id",
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub agency_id: Option<Option<Uuid>>,
    #[serde(rename = "contrato_id", default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<Uuid>,
    #[serde(rename = "asesor_nombre", default, skip_serializing_if = "Option::is_none")]
    pub advisor_name: Option<String>,
    #[serde(rename = "cliente_nombre", default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "correo", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "tipo_renta", default, skip_serializing_if = "Option::is_none")]
    pub rental_kind: Option<String>,
    #[serde(
        rename = "periodo_contrato_anios",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub contract_years: Option<i32>,
    #[serde(rename = "monto_renta", default, skip_serializing_if = "Option::is_none")]
    pub rent_amount: Option<Decimal>,
    #[serde(
        rename = "propiedad_domicilio",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub property_address: Option<String>,
    #[serde(
        rename = "ubicacion_maps_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub location_url: Option<String>,
    #[serde(rename = "fecha_inicio", default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "fecha_fin", default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SigningState>,
    #[serde(rename = "canal_firma", default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<SigningChannel>,
    #[serde(
        rename = "pago_por_servicio",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_fee: Option<Decimal>,
    #[serde(
        rename = "solicitud_aval_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub request_url: Option<String>,
    #[serde(rename = "notas", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SigningPatch {
    pub fn touches_window(&self) -> bool {
        self.starts_at.is_some() || self.ends_at.is_some()
    }

    pub fn state(state: SigningState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }
}

impl Validate for SigningPatch {
    fn collect_errors(&self, errors: &mut Vec<FieldError>) {
        check_min_len(errors, "asesor_nombre", self.advisor_name.as_deref(), 3);
        check_min_len(errors, "cliente_nombre", self.client_name.as_deref(), 3);
        check_min_len(errors, "telefono", self.phone.as_deref(), 7);
        check_email(errors, "correo", self.email.as_deref());
        check_min_len(errors, "tipo_renta", self.rental_kind.as_deref(), 3);
        check_contract_years(errors, self.contract_years);
        check_non_negative(errors, "monto_renta", self.rent_amount);
        check_min_len(
            errors,
            "propiedad_domicilio",
            self.property_address.as_deref(),
            3,
        );
        check_http_url(errors, "ubicacion_maps_url", self.location_url.as_deref());
        check_non_negative(errors, "pago_por_servicio", self.service_fee);
    }
}

/// Keeps an explicit `null` apart from a missing field.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn check_contract_years(errors: &mut Vec<FieldError>, years: Option<i32>) {
    if years.is_some_and(|years| !(0..=50).contains(&years)) {
        errors.push(FieldError::new(
            "periodo_contrato_anios",
            "periodo_contrato_anios must be between 0 and 50",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_distinguishes_null_agency_from_missing() {
        let cleared: SigningPatch =
            serde_json::from_value(json!({"inmobiliaria_id": null})).expect("patch decodes");
        assert_eq!(cleared.agency_id, Some(None));
        assert_eq!(
            serde_json::to_value(&cleared).expect("patch encodes"),
            json!({"inmobiliaria_id": null})
        );

        let untouched: SigningPatch = serde_json::from_value(json!({})).expect("patch decodes");
        assert_eq!(untouched.agency_id, None);
        assert_eq!(
            serde_json::to_value(&untouched).expect("patch encodes"),
            json!({})
        );
    }

    #[test]
    fn terminal_states_accept_no_transition() {
        for next in [
            SigningState::Programada,
            SigningState::Realizada,
            SigningState::Reprogramada,
            SigningState::Cancelada,
        ] {
            assert!(!SigningState::Realizada.can_transition_to(next));
            assert!(!SigningState::Cancelada.can_transition_to(next));
        }
    }

    #[test]
    fn rescheduled_is_reenterable() {
        assert!(SigningState::Programada.can_transition_to(SigningState::Reprogramada));
        assert!(SigningState::Reprogramada.can_transition_to(SigningState::Reprogramada));
        assert!(SigningState::Reprogramada.can_transition_to(SigningState::Realizada));
        assert!(!SigningState::Reprogramada.can_transition_to(SigningState::Programada));
    }

    #[test]
    fn states_serialize_as_lowercase_labels() {
        let encoded = serde_json::to_value(SigningState::Reprogramada).expect("encodes");
        assert_eq!(encoded, "reprogramada");
        assert_eq!(SigningState::Cancelada.label(), "cancelada");
        let channel = serde_json::to_value(SigningChannel::DuenoDirecto).expect("encodes");
        assert_eq!(channel, "dueno_directo");
    }
}

//! Typed rows exchanged with the relational store and the HTTP surface.
//!
//! Field names follow Rust conventions; serde renames map them onto the column names the
//! database and existing clients use. Every record comes in three shapes: the stored row, a
//! `*Draft` accepted on create and a `*Patch` whose absent fields are left untouched.

pub mod directory;
pub mod guarantor;
pub mod payment;
pub mod signing;
pub mod veto;

pub use directory::{
    Advisor, AdvisorDraft, AdvisorPatch, Agency, AgencyDraft, AgencyPatch, Client, ClientDraft,
    ClientPatch, Contract, ContractDraft, ContractPatch, ContractState, Document, DocumentDraft,
    DocumentPatch, FamilyReference, PersonalReference, Property, PropertyDraft, PropertyPatch,
};
pub use guarantor::{
    AvailabilityBlock, AvailabilityDraft, AvailabilityInput, AvailabilityPatch, Guarantor,
    GuarantorDocuments, GuarantorDraft, GuarantorPatch, PublicGuarantor,
};
pub use payment::{
    BatchState, BeneficiaryKind, CommissionPayment, CommissionPaymentDraft,
    CommissionPaymentPatch, CommissionState, Payment, PaymentChannel, PaymentDraft,
    PaymentMethod, PaymentPatch, ServicePayment, ServicePaymentDraft, ServicePaymentPatch,
    ServicePaymentState, SettlementBatch,
};
pub use signing::{Signing, SigningChannel, SigningDraft, SigningPatch, SigningState};
pub use veto::{
    BlacklistReason, ClientBlacklistDraft, ClientBlacklistEntry, ClientBlacklistPatch,
    GuarantorVeto, GuarantorVetoDraft, GuarantorVetoPatch, VetoStatus,
};

use reqwest::Url;
use rust_decimal::Decimal;

use crate::error::{ApiError, FieldError};

/// Field-level checks run before a payload reaches the store.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = Vec::new();
        self.collect_errors(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::invalid_fields(errors))
        }
    }

    fn collect_errors(&self, errors: &mut Vec<FieldError>);
}

pub(crate) fn check_min_len(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<&str>,
    min: usize,
) {
    if let Some(value) = value {
        if value.trim().chars().count() < min {
            errors.push(FieldError::new(
                field,
                format!("{field} must contain at least {min} characters"),
            ));
        }
    }
}

pub(crate) fn check_non_negative(errors: &mut Vec<FieldError>, field: &str, value: Option<Decimal>) {
    if value.is_some_and(|value| value.is_sign_negative() && !value.is_zero()) {
        errors.push(FieldError::new(field, format!("{field} must not be negative")));
    }
}

pub(crate) fn check_http_url(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        let valid = Url::parse(value.trim()).is_ok_and(|url| {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        });
        if !valid {
            errors.push(FieldError::new(field, format!("{field} must be an http(s) URL")));
        }
    }
}

pub(crate) fn check_email(errors: &mut Vec<FieldError>, field: &str, value: Option<&str>) {
    if let Some(value) = value {
        let value = value.trim();
        let valid = match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !value.contains(char::is_whitespace)
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !domain.contains('@')
            }
            None => false,
        };
        if !valid {
            errors.push(FieldError::new(field, format!("{field} must be an email address")));
        }
    }
}

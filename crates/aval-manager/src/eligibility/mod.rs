//! Veto and blacklist checks applied before a signing is created or changed.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{ClientBlacklistEntry, GuarantorVeto};
use crate::error::ApiError;
use crate::store::repositories::{ClientBlacklist, VetoRegistry};

/// How agency-scoped vetoes are treated when the signing names no agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnscopedVetoPolicy {
    /// Only global vetoes block.
    #[default]
    GlobalOnly,
    /// Any active veto blocks.
    AnyVeto,
}

impl UnscopedVetoPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "global_only" => Some(Self::GlobalOnly),
            "any_veto" => Some(Self::AnyVeto),
            _ => None,
        }
    }
}

/// Effective guarantor, client and agency of a signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    pub guarantor: Uuid,
    pub client: Option<Uuid>,
    pub agency: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EligibilityRejection {
    #[error("guarantor has an active veto")]
    GlobalVeto,
    #[error("guarantor has an active veto for this agency")]
    AgencyVeto,
    #[error("client is blacklisted; the signing cannot be registered")]
    BlacklistedClient,
}

impl From<EligibilityRejection> for ApiError {
    fn from(value: EligibilityRejection) -> Self {
        ApiError::RejectedByPolicy(value.to_string())
    }
}

/// Pure decision over the active vetoes of a guarantor.
pub fn check_vetoes(
    vetoes: &[GuarantorVeto],
    agency: Option<Uuid>,
    policy: UnscopedVetoPolicy,
) -> Result<(), EligibilityRejection> {
    let active = vetoes.iter().filter(|veto| veto.status.is_active());
    for veto in active {
        match (veto.agency_id, agency) {
            (None, _) => return Err(EligibilityRejection::GlobalVeto),
            (Some(scope), Some(agency)) if scope == agency => {
                return Err(EligibilityRejection::AgencyVeto)
            }
            (Some(_), None) if policy == UnscopedVetoPolicy::AnyVeto => {
                return Err(EligibilityRejection::AgencyVeto)
            }
            _ => {}
        }
    }
    Ok(())
}

pub fn check_blacklist(entries: &[ClientBlacklistEntry]) -> Result<(), EligibilityRejection> {
    if entries.iter().any(|entry| entry.status.is_active()) {
        return Err(EligibilityRejection::BlacklistedClient);
    }
    Ok(())
}

#[derive(Clone)]
pub struct EligibilityGate {
    vetoes: Arc<dyn VetoRegistry>,
    blacklist: Arc<dyn ClientBlacklist>,
    policy: UnscopedVetoPolicy,
}

impl EligibilityGate {
    pub fn new(
        vetoes: Arc<dyn VetoRegistry>,
        blacklist: Arc<dyn ClientBlacklist>,
        policy: UnscopedVetoPolicy,
    ) -> Self {
        Self {
            vetoes,
            blacklist,
            policy,
        }
    }

    pub async fn check_eligible(&self, parties: &Parties) -> Result<(), ApiError> {
        let vetoes = self.vetoes.active_vetoes(parties.guarantor).await?;
        check_vetoes(&vetoes, parties.agency, self.policy).map_err(|rejection| {
            tracing::info!(guarantor_id = %parties.guarantor, reason = %rejection, "signing blocked");
            ApiError::from(rejection)
        })?;

        if let Some(client) = parties.client {
            let entries = self.blacklist.active_entries(client).await?;
            check_blacklist(&entries).map_err(|rejection| {
                tracing::info!(client_id = %client, reason = %rejection, "signing blocked");
                ApiError::from(rejection)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VetoStatus;

    fn veto(agency: Option<Uuid>, status: VetoStatus) -> GuarantorVeto {
        GuarantorVeto {
            id: Uuid::new_v4(),
            guarantor_id: Uuid::nil(),
            agency_id: agency,
            motivo: None,
            status,
            registered_by: None,
            cleared_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn global_veto_blocks_every_agency() {
        let vetoes = vec![veto(None, VetoStatus::Vetado)];
        for agency in [None, Some(Uuid::new_v4())] {
            assert_eq!(
                check_vetoes(&vetoes, agency, UnscopedVetoPolicy::GlobalOnly),
                Err(EligibilityRejection::GlobalVeto)
            );
        }
    }

    #[test]
    fn scoped_veto_only_blocks_its_agency() {
        let scoped = Uuid::new_v4();
        let vetoes = vec![veto(Some(scoped), VetoStatus::Vetado)];
        assert_eq!(
            check_vetoes(&vetoes, Some(scoped), UnscopedVetoPolicy::GlobalOnly),
            Err(EligibilityRejection::AgencyVeto)
        );
        assert_eq!(
            check_vetoes(&vetoes, Some(Uuid::new_v4()), UnscopedVetoPolicy::GlobalOnly),
            Ok(())
        );
    }

    #[test]
    fn unscoped_signing_follows_policy() {
        let vetoes = vec![veto(Some(Uuid::new_v4()), VetoStatus::Vetado)];
        assert_eq!(
            check_vetoes(&vetoes, None, UnscopedVetoPolicy::GlobalOnly),
            Ok(())
        );
        assert_eq!(
            check_vetoes(&vetoes, None, UnscopedVetoPolicy::AnyVeto),
            Err(EligibilityRejection::AgencyVeto)
        );
    }

    #[test]
    fn cleared_entries_are_ignored() {
        let vetoes = vec![veto(None, VetoStatus::Limpio)];
        assert_eq!(
            check_vetoes(&vetoes, None, UnscopedVetoPolicy::AnyVeto),
            Ok(())
        );
    }

    #[test]
    fn policy_parses_known_names() {
        assert_eq!(
            UnscopedVetoPolicy::parse(" ANY_VETO "),
            Some(UnscopedVetoPolicy::AnyVeto)
        );
        assert_eq!(
            UnscopedVetoPolicy::parse("global_only"),
            Some(UnscopedVetoPolicy::GlobalOnly)
        );
        assert_eq!(UnscopedVetoPolicy::parse("strict"), None);
    }
}

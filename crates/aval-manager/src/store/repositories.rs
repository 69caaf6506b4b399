//! Narrow repository traits consumed by the engines, implemented over [`Tables`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{timestamp, Query, StoreError, Tables};
use crate::domain::{
    AvailabilityBlock, AvailabilityDraft, ClientBlacklistEntry, CommissionPayment, GuarantorVeto,
    ServicePayment, SettlementBatch, Signing, SigningState, VetoStatus,
};

pub const AVAILABILITY: &str = "disponibilidades_avales";
pub const SIGNINGS: &str = "firmas";
pub const GUARANTOR_VETOES: &str = "vetos_avales";
pub const CLIENT_BLACKLIST: &str = "clientes_morosidad";
pub const SERVICE_PAYMENTS: &str = "pagos_servicio";
pub const COMMISSIONS: &str = "pagos_comisiones";
pub const BATCHES: &str = "pagos_cortes";
pub const GUARANTORS: &str = "avales";
pub const ADVISORS: &str = "asesores";
pub const CLIENTS: &str = "clientes";
pub const USERS: &str = "usuarios";
pub const AGENCIES: &str = "inmobiliarias";
pub const PROPERTIES: &str = "propiedades";
pub const CONTRACTS: &str = "contratos";
pub const DOCUMENTS: &str = "documentos";
pub const RENT_PAYMENTS: &str = "pagos";

pub const SEAL_FUNCTION: &str = "fn_sellar_corte";

#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn blocks_for(&self, guarantor_id: Uuid) -> Result<Vec<AvailabilityBlock>, StoreError>;
    /// Drops every stored block of the guarantor and writes `blocks` in their place.
    async fn replace_blocks(
        &self,
        guarantor_id: Uuid,
        blocks: &[AvailabilityDraft],
    ) -> Result<Vec<AvailabilityBlock>, StoreError>;
}

#[async_trait]
pub trait SigningRepository: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Signing>, StoreError>;
    /// Signings of the guarantor in a calendar-holding state.
    async fn active_for(
        &self,
        guarantor_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Signing>, StoreError>;
    async fn insert(&self, row: Value) -> Result<Signing, StoreError>;
    async fn update(&self, id: Uuid, patch: Value) -> Result<Signing, StoreError>;
}

#[async_trait]
pub trait VetoRegistry: Send + Sync {
    async fn active_vetoes(&self, guarantor_id: Uuid) -> Result<Vec<GuarantorVeto>, StoreError>;
}

#[async_trait]
pub trait ClientBlacklist: Send + Sync {
    async fn active_entries(&self, client_id: Uuid) -> Result<Vec<ClientBlacklistEntry>, StoreError>;
}

#[async_trait]
pub trait PaymentLedger: Send + Sync {
    async fn unbatched_services(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ServicePayment>, StoreError>;
    async fn unbatched_commissions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CommissionPayment>, StoreError>;
    async fn services_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServicePayment>, StoreError>;
    async fn commissions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CommissionPayment>, StoreError>;
}

/// Client and advisor names recorded on a signing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningNames {
    pub client: Option<String>,
    pub advisor: Option<String>,
}

/// Batched display-name lookups, one round trip per table.
#[async_trait]
pub trait NameDirectory: Send + Sync {
    async fn signing_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, SigningNames>, StoreError>;
    async fn guarantor_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError>;
    async fn advisor_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError>;
    async fn client_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError>;
}

/// Result of the stamping function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealOutcome {
    pub stamped: u64,
    /// Members already owned by a different batch; nothing is stamped when non-zero.
    pub claimed: u64,
}

#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn create(&self, header: Value) -> Result<SettlementBatch, StoreError>;
    async fn find(&self, id: Uuid) -> Result<Option<SettlementBatch>, StoreError>;
    async fn list(&self) -> Result<Vec<SettlementBatch>, StoreError>;
    async fn update(&self, id: Uuid, patch: Value) -> Result<SettlementBatch, StoreError>;
    async fn seal(
        &self,
        id: Uuid,
        service_ids: &[Uuid],
        commission_ids: &[Uuid],
    ) -> Result<SealOutcome, StoreError>;
}

/// Fallback role lookup in the application's own user table.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn stored_role(&self, user_id: Uuid) -> Result<Option<String>, StoreError>;
}

pub(crate) fn distinct(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[derive(Deserialize)]
struct NamedRow {
    id: Uuid,
    #[serde(alias = "nombre_completo", alias = "nombre", default)]
    name: Option<String>,
}

impl Tables {
    async fn names_from(
        &self,
        table: &str,
        column: &str,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, String>, StoreError> {
        let ids = distinct(ids.iter().copied());
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = Query::table(table)
            .columns(format!("id,{column}"))
            .in_list("id", ids);
        let rows: Vec<NamedRow> = self.select(&query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.name.map(|name| (row.id, name)))
            .collect())
    }

    pub async fn agency_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        self.names_from(AGENCIES, "nombre", ids).await
    }
}

#[async_trait]
impl AvailabilityRepository for Tables {
    async fn blocks_for(&self, guarantor_id: Uuid) -> Result<Vec<AvailabilityBlock>, StoreError> {
        let query = Query::table(AVAILABILITY)
            .eq("aval_id", guarantor_id)
            .order_asc("fecha_inicio");
        self.select(&query).await
    }

    async fn replace_blocks(
        &self,
        guarantor_id: Uuid,
        blocks: &[AvailabilityDraft],
    ) -> Result<Vec<AvailabilityBlock>, StoreError> {
        self.delete_where(&Query::table(AVAILABILITY).eq("aval_id", guarantor_id))
            .await?;
        self.insert_many(AVAILABILITY, blocks)
            .await?
            .into_iter()
            .map(super::decode)
            .collect()
    }
}

#[async_trait]
impl SigningRepository for Tables {
    async fn find(&self, id: Uuid) -> Result<Option<Signing>, StoreError> {
        self.by_id(SIGNINGS, id).await
    }

    async fn active_for(
        &self,
        guarantor_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Signing>, StoreError> {
        let mut query = Query::table(SIGNINGS)
            .eq("aval_id", guarantor_id)
            .in_list("estado", SigningState::ACTIVE.map(SigningState::label));
        if let Some(id) = exclude {
            query = query.neq("id", id);
        }
        self.select(&query).await
    }

    async fn insert(&self, row: Value) -> Result<Signing, StoreError> {
        Tables::insert(self, SIGNINGS, &row).await
    }

    async fn update(&self, id: Uuid, patch: Value) -> Result<Signing, StoreError> {
        self.update_by_id(SIGNINGS, id, &patch).await
    }
}

#[async_trait]
impl VetoRegistry for Tables {
    async fn active_vetoes(&self, guarantor_id: Uuid) -> Result<Vec<GuarantorVeto>, StoreError> {
        let query = Query::table(GUARANTOR_VETOES)
            .eq("aval_id", guarantor_id)
            .in_list("estatus", VetoStatus::ACTIVE_LABELS);
        self.select(&query).await
    }
}

#[async_trait]
impl ClientBlacklist for Tables {
    async fn active_entries(&self, client_id: Uuid) -> Result<Vec<ClientBlacklistEntry>, StoreError> {
        let query = Query::table(CLIENT_BLACKLIST)
            .eq("cliente_id", client_id)
            .in_list("estatus", VetoStatus::ACTIVE_LABELS);
        self.select(&query).await
    }
}

#[async_trait]
impl PaymentLedger for Tables {
    async fn unbatched_services(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ServicePayment>, StoreError> {
        let query = Query::table(SERVICE_PAYMENTS)
            .is_null("corte_id")
            .gte("fecha_pago", timestamp(from))
            .lte("fecha_pago", timestamp(to))
            .order_asc("fecha_pago");
        self.select(&query).await
    }

    async fn unbatched_commissions(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CommissionPayment>, StoreError> {
        let query = Query::table(COMMISSIONS)
            .is_null("corte_id")
            .gte("fecha_pago", timestamp(from))
            .lte("fecha_pago", timestamp(to))
            .order_asc("fecha_pago");
        self.select(&query).await
    }

    async fn services_by_ids(&self, ids: &[Uuid]) -> Result<Vec<ServicePayment>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table(SERVICE_PAYMENTS)
            .in_list("id", ids.iter())
            .order_asc("fecha_pago");
        self.select(&query).await
    }

    async fn commissions_by_ids(&self, ids: &[Uuid]) -> Result<Vec<CommissionPayment>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::table(COMMISSIONS)
            .in_list("id", ids.iter())
            .order_asc("fecha_pago");
        self.select(&query).await
    }
}

#[derive(Deserialize)]
struct SigningNameRow {
    id: Uuid,
    #[serde(default)]
    cliente_nombre: Option<String>,
    #[serde(default)]
    asesor_nombre: Option<String>,
}

#[async_trait]
impl NameDirectory for Tables {
    async fn signing_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, SigningNames>, StoreError> {
        let ids = distinct(ids.iter().copied());
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = Query::table(SIGNINGS)
            .columns("id,cliente_nombre,asesor_nombre")
            .in_list("id", ids);
        let rows: Vec<SigningNameRow> = self.select(&query).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    row.id,
                    SigningNames {
                        client: row.cliente_nombre,
                        advisor: row.asesor_nombre,
                    },
                )
            })
            .collect())
    }

    async fn guarantor_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        self.names_from(GUARANTORS, "nombre_completo", ids).await
    }

    async fn advisor_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        self.names_from(ADVISORS, "nombre", ids).await
    }

    async fn client_names(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, StoreError> {
        self.names_from(CLIENTS, "nombre_completo", ids).await
    }
}

#[async_trait]
impl BatchRepository for Tables {
    async fn create(&self, header: Value) -> Result<SettlementBatch, StoreError> {
        self.insert(BATCHES, &header).await
    }

    async fn find(&self, id: Uuid) -> Result<Option<SettlementBatch>, StoreError> {
        self.by_id(BATCHES, id).await
    }

    async fn list(&self) -> Result<Vec<SettlementBatch>, StoreError> {
        self.select(&Query::table(BATCHES).order_desc("created_at"))
            .await
    }

    async fn update(&self, id: Uuid, patch: Value) -> Result<SettlementBatch, StoreError> {
        self.update_by_id(BATCHES, id, &patch).await
    }

    async fn seal(
        &self,
        id: Uuid,
        service_ids: &[Uuid],
        commission_ids: &[Uuid],
    ) -> Result<SealOutcome, StoreError> {
        self.rpc(
            SEAL_FUNCTION,
            json!({
                "p_corte_id": id,
                "p_servicio_ids": service_ids,
                "p_comision_ids": commission_ids,
            }),
        )
        .await
    }
}

#[async_trait]
impl RoleDirectory for Tables {
    async fn stored_role(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        let row: Option<Value> = self
            .first(Query::table(USERS).columns("rol").eq("id", user_id))
            .await?;
        Ok(row
            .as_ref()
            .and_then(|row| row.get("rol"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

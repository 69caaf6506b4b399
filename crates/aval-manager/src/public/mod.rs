//! Unauthenticated read surface under `/public`.
//!
//! Everything here is read-only. Stored object paths never leave the service without a fresh
//! proxy link next to them, and display names are resolved with one lookup per table.

mod router;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::{
    AvailabilityBlock, BlacklistReason, ClientBlacklistEntry, Guarantor, GuarantorVeto,
    PublicGuarantor, SigningState, VetoStatus,
};
use crate::error::ApiError;
use crate::resources::contracts::{find_documents, DocumentFilter};
use crate::storage::StorageProxy;
use crate::store::repositories::{
    AvailabilityRepository, NameDirectory, CLIENT_BLACKLIST, GUARANTORS, GUARANTOR_VETOES,
};
use crate::store::{timestamp, Query, Tables};

pub use router::public_router;

pub const PUBLIC_SIGNINGS_VIEW: &str = "vw_firmas_publicas";
pub const PUBLIC_DOCUMENTS_VIEW: &str = "vw_documentos_publicos";
pub const ON_DUTY_FUNCTION: &str = "fn_aval_en_turno";

/// Row of the public signings view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSigning {
    pub id: Uuid,
    pub fecha_inicio: DateTime<Utc>,
    pub fecha_fin: DateTime<Utc>,
    #[serde(default)]
    pub ubicacion_maps_url: Option<String>,
    pub estado: SigningState,
    #[serde(default)]
    pub cliente_nombre: Option<String>,
    #[serde(default)]
    pub asesor_nombre: Option<String>,
    #[serde(default)]
    pub tipo_renta: Option<String>,
    #[serde(default)]
    pub propiedad_domicilio: Option<String>,
    #[serde(default)]
    pub pago_por_servicio: Option<Decimal>,
    #[serde(default)]
    pub contrato_id: Option<Uuid>,
    #[serde(default)]
    pub aval_id: Option<Uuid>,
    #[serde(default)]
    pub aval_nombre: Option<String>,
    #[serde(default)]
    pub inmobiliaria_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicSigningFilter {
    #[serde(default)]
    pub fecha_desde: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fecha_hasta: Option<DateTime<Utc>>,
    #[serde(default)]
    pub aval_id: Option<Uuid>,
    #[serde(default)]
    pub estado: Option<SigningState>,
}

pub async fn public_signings(
    tables: &Tables,
    filter: &PublicSigningFilter,
) -> Result<Vec<PublicSigning>, ApiError> {
    let mut query = Query::table(PUBLIC_SIGNINGS_VIEW)
        .eq_opt("aval_id", filter.aval_id)
        .eq_opt("estado", filter.estado.map(SigningState::label));
    if let Some(from) = filter.fecha_desde {
        query = query.gte("fecha_inicio", timestamp(from));
    }
    if let Some(to) = filter.fecha_hasta {
        query = query.lte("fecha_fin", timestamp(to));
    }
    Ok(tables.select(&query.order_asc("fecha_inicio")).await?)
}

/// Document entry with a short-lived proxy link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicDocument {
    pub id: Uuid,
    #[serde(default)]
    pub contrato_id: Option<Uuid>,
    pub tipo: String,
    pub archivo_path: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_url: Option<String>,
}

impl PublicDocument {
    fn signed(mut self, storage: &StorageProxy) -> Self {
        self.signed_url = storage.link_for(Some(&self.archivo_path));
        self
    }
}

pub async fn public_documents(
    tables: &Tables,
    storage: &StorageProxy,
) -> Result<Vec<PublicDocument>, ApiError> {
    let rows: Vec<PublicDocument> = tables
        .select(&Query::table(PUBLIC_DOCUMENTS_VIEW).order_desc("created_at"))
        .await?;
    Ok(rows.into_iter().map(|row| row.signed(storage)).collect())
}

/// Reads the on-duty function's result: a bare id, a one-element list or a keyed row.
fn on_duty_id(value: &Value) -> Option<Uuid> {
    match value {
        Value::String(raw) => raw.parse().ok(),
        Value::Array(items) => items.first().and_then(on_duty_id),
        Value::Object(row) => row
            .get(ON_DUTY_FUNCTION)
            .or_else(|| row.get("id"))
            .and_then(on_duty_id),
        _ => None,
    }
}

/// Guarantor on duty at `now`, or the longest-registered active guarantor.
pub async fn on_duty_guarantor_at(
    tables: &Tables,
    now: DateTime<Utc>,
) -> Result<Option<Guarantor>, ApiError> {
    let scheduled = match tables
        .rpc::<Value>(ON_DUTY_FUNCTION, json!({ "target": timestamp(now) }))
        .await
    {
        Ok(value) => on_duty_id(&value),
        Err(err) => {
            tracing::warn!(error = %err, "on-duty lookup failed; using fallback guarantor");
            None
        }
    };

    if let Some(id) = scheduled {
        let guarantor = tables.by_id::<Guarantor>(GUARANTORS, id).await?;
        return guarantor
            .map(Some)
            .ok_or_else(|| ApiError::NotFound("guarantor not found".into()));
    }

    Ok(tables
        .first(
            Query::table(GUARANTORS)
                .eq("activo", true)
                .order_asc("created_at")
                .limit(1),
        )
        .await?)
}

pub async fn on_duty_guarantor(tables: &Tables) -> Result<Option<PublicGuarantor>, ApiError> {
    Ok(on_duty_guarantor_at(tables, Utc::now())
        .await?
        .map(|guarantor| PublicGuarantor {
            id: guarantor.id,
            full_name: guarantor.full_name,
            email: guarantor.email,
            phone: guarantor.phone,
        }))
}

pub async fn on_duty_availability(tables: &Tables) -> Result<Vec<AvailabilityBlock>, ApiError> {
    let Some(guarantor) = on_duty_guarantor_at(tables, Utc::now()).await? else {
        return Ok(Vec::new());
    };
    let mut blocks = tables.blocks_for(guarantor.id).await?;
    blocks.sort_by_key(|block| block.starts_at);
    Ok(blocks)
}

/// Contract documents of the on-duty guarantor followed by the profile documents on file.
pub async fn on_duty_documents_at(
    tables: &Tables,
    storage: &StorageProxy,
    now: DateTime<Utc>,
) -> Result<Vec<PublicDocument>, ApiError> {
    let Some(guarantor) = on_duty_guarantor_at(tables, now).await? else {
        return Ok(Vec::new());
    };

    let filter = DocumentFilter {
        aval_id: Some(guarantor.id),
        ..DocumentFilter::default()
    };
    let mut documents: Vec<PublicDocument> = find_documents(tables, filter)
        .await?
        .into_iter()
        .map(|document| PublicDocument {
            id: document.id,
            contrato_id: document.contract_id,
            tipo: document.tipo,
            archivo_path: document.path,
            created_at: document.created_at,
            signed_url: None,
        })
        .collect();

    let stamped_at = guarantor.updated_at.unwrap_or(now);
    documents.extend(
        guarantor
            .documents
            .labelled()
            .into_iter()
            .map(|(label, path)| PublicDocument {
                id: Uuid::new_v4(),
                contrato_id: Some(guarantor.id),
                tipo: label.to_string(),
                archivo_path: strip_public_prefix(path).to_string(),
                created_at: Some(stamped_at),
                signed_url: None,
            }),
    );
    Ok(documents
        .into_iter()
        .map(|document| document.signed(storage))
        .collect())
}

fn strip_public_prefix(path: &str) -> &str {
    let path = path.trim();
    path.strip_prefix("/storage/v1/object/public/")
        .unwrap_or(path)
}

fn active_only(query: Query, only_active: bool) -> Query {
    if only_active {
        query.in_list("estatus", VetoStatus::ACTIVE_LABELS)
    } else {
        query
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicGuarantorVeto {
    pub id: Uuid,
    pub aval_id: Uuid,
    pub aval_nombre: Option<String>,
    pub inmobiliaria_id: Option<Uuid>,
    pub inmobiliaria_nombre: Option<String>,
    pub motivo: Option<String>,
    pub estatus: VetoStatus,
    pub created_at: Option<DateTime<Utc>>,
}

pub async fn vetoed_guarantors(
    tables: &Tables,
    agency: Option<Uuid>,
    only_active: bool,
) -> Result<Vec<PublicGuarantorVeto>, ApiError> {
    let query = active_only(
        Query::table(GUARANTOR_VETOES).eq_opt("inmobiliaria_id", agency),
        only_active,
    );
    let vetoes: Vec<GuarantorVeto> = tables.select(&query.order_desc("created_at")).await?;
    if vetoes.is_empty() {
        return Ok(Vec::new());
    }

    let guarantor_ids: Vec<Uuid> = vetoes.iter().map(|veto| veto.guarantor_id).collect();
    let agency_ids: Vec<Uuid> = vetoes.iter().filter_map(|veto| veto.agency_id).collect();
    let guarantors = tables.guarantor_names(&guarantor_ids).await?;
    let agencies = tables.agency_names(&agency_ids).await?;

    Ok(vetoes
        .into_iter()
        .map(|veto| PublicGuarantorVeto {
            id: veto.id,
            aval_id: veto.guarantor_id,
            aval_nombre: guarantors.get(&veto.guarantor_id).cloned(),
            inmobiliaria_id: veto.agency_id,
            inmobiliaria_nombre: veto
                .agency_id
                .and_then(|id| agencies.get(&id).cloned()),
            motivo: veto.motivo,
            estatus: veto.status,
            created_at: veto.created_at,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicBlacklistedClient {
    pub id: Uuid,
    pub cliente_id: Uuid,
    pub cliente_nombre: Option<String>,
    pub motivo_tipo: BlacklistReason,
    pub motivo: Option<String>,
    pub estatus: VetoStatus,
    pub created_at: Option<DateTime<Utc>>,
}

pub async fn blacklisted_clients(
    tables: &Tables,
    search: Option<&str>,
    only_active: bool,
) -> Result<Vec<PublicBlacklistedClient>, ApiError> {
    let mut query = active_only(Query::table(CLIENT_BLACKLIST), only_active);
    if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
        query = query.ilike_contains("motivo", term);
    }
    let entries: Vec<ClientBlacklistEntry> =
        tables.select(&query.order_desc("created_at")).await?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let client_ids: Vec<Uuid> = entries.iter().map(|entry| entry.client_id).collect();
    let names: HashMap<Uuid, String> = tables.client_names(&client_ids).await?;
    Ok(entries
        .into_iter()
        .map(|entry| PublicBlacklistedClient {
            id: entry.id,
            cliente_id: entry.client_id,
            cliente_nombre: names.get(&entry.client_id).cloned(),
            motivo_tipo: entry.reason,
            motivo: entry.motivo,
            estatus: entry.status,
            created_at: entry.created_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::store::memory::{MemoryObjects, MemoryTables};
    use crate::store::repositories::{AGENCIES, AVAILABILITY, CLIENTS};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn storage() -> StorageProxy {
        let config = StorageConfig {
            jwt_secret: "public-secret".into(),
            api_base_url: "http://localhost:8000".into(),
            bucket: StorageConfig::DEFAULT_BUCKET.into(),
        };
        StorageProxy::new(&config, Arc::new(MemoryObjects::default()))
    }

    #[test]
    fn on_duty_result_shapes() {
        let id = Uuid::new_v4();
        assert_eq!(on_duty_id(&json!(id)), Some(id));
        assert_eq!(on_duty_id(&json!([id])), Some(id));
        assert_eq!(on_duty_id(&json!([{ "fn_aval_en_turno": id }])), Some(id));
        assert_eq!(on_duty_id(&Value::Null), None);
        assert_eq!(on_duty_id(&json!([])), None);
    }

    #[tokio::test]
    async fn scheduled_guarantor_wins_over_fallback() {
        let memory = MemoryTables::new();
        let rows = memory.seed(
            GUARANTORS,
            vec![
                json!({"nombre_completo": "Primero", "activo": true, "created_at": "2023-01-01T00:00:00Z"}),
                json!({"nombre_completo": "En turno", "activo": true, "created_at": "2024-01-01T00:00:00Z"}),
            ],
        );
        let scheduled = rows[1]["id"].clone();
        memory.register_function(ON_DUTY_FUNCTION, move |_, _| Ok(scheduled.clone()));
        let tables = Tables::new(Arc::new(memory));

        let guarantor = on_duty_guarantor(&tables)
            .await
            .expect("lookup succeeds")
            .expect("someone is on duty");
        assert_eq!(guarantor.full_name, "En turno");
    }

    #[tokio::test]
    async fn fallback_is_oldest_active_guarantor() {
        let memory = MemoryTables::new();
        let rows = memory.seed(
            GUARANTORS,
            vec![
                json!({"nombre_completo": "Inactivo", "activo": false, "created_at": "2022-01-01T00:00:00Z"}),
                json!({"nombre_completo": "Reciente", "activo": true, "created_at": "2024-01-01T00:00:00Z"}),
                json!({"nombre_completo": "Antiguo", "activo": true, "created_at": "2023-01-01T00:00:00Z"}),
            ],
        );
        memory.seed(
            AVAILABILITY,
            vec![
                json!({"aval_id": rows[2]["id"], "fecha_inicio": "2024-05-02T09:00:00Z", "fecha_fin": "2024-05-02T12:00:00Z"}),
                json!({"aval_id": rows[2]["id"], "fecha_inicio": "2024-05-01T09:00:00Z", "fecha_fin": "2024-05-01T12:00:00Z"}),
            ],
        );
        let tables = Tables::new(Arc::new(memory));

        let guarantor = on_duty_guarantor(&tables)
            .await
            .expect("lookup succeeds")
            .expect("fallback found");
        assert_eq!(guarantor.full_name, "Antiguo");

        let blocks = on_duty_availability(&tables).await.expect("blocks load");
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_at < blocks[1].starts_at);
    }

    #[tokio::test]
    async fn on_duty_documents_include_labelled_profile_files() {
        let memory = MemoryTables::new();
        memory.seed(
            GUARANTORS,
            vec![json!({
                "nombre_completo": "Ana",
                "activo": true,
                "updated_at": "2024-04-01T00:00:00Z",
                "rfc_url": "/storage/v1/object/public/documentos-aval/avales/ana/rfc.pdf",
                "curp_url": "  "
            })],
        );
        let tables = Tables::new(Arc::new(memory));
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let documents = on_duty_documents_at(&tables, &storage(), now)
            .await
            .expect("documents load");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].tipo, "RFC");
        assert_eq!(documents[0].archivo_path, "documentos-aval/avales/ana/rfc.pdf");
        assert!(documents[0]
            .signed_url
            .as_deref()
            .is_some_and(|url| url.contains("/storage/proxy?token=")));
    }

    #[tokio::test]
    async fn blacklist_views_resolve_names_in_batches() {
        let memory = MemoryTables::new();
        let guarantors = memory.seed(GUARANTORS, vec![json!({"nombre_completo": "Luis"})]);
        let agencies = memory.seed(AGENCIES, vec![json!({"nombre": "Casa Norte"})]);
        let clients = memory.seed(CLIENTS, vec![json!({"nombre_completo": "Marta"})]);
        memory.seed(
            GUARANTOR_VETOES,
            vec![
                json!({"aval_id": guarantors[0]["id"], "inmobiliaria_id": agencies[0]["id"], "motivo": "x", "estatus": "activo"}),
                json!({"aval_id": guarantors[0]["id"], "motivo": "y", "estatus": "limpio"}),
            ],
        );
        memory.seed(
            CLIENT_BLACKLIST,
            vec![json!({"cliente_id": clients[0]["id"], "motivo": "renta atrasada", "estatus": "vetado"})],
        );
        let tables = Tables::new(Arc::new(memory));

        let vetoes = vetoed_guarantors(&tables, None, true).await.expect("vetoes load");
        assert_eq!(vetoes.len(), 1);
        assert_eq!(vetoes[0].aval_nombre.as_deref(), Some("Luis"));
        assert_eq!(vetoes[0].inmobiliaria_nombre.as_deref(), Some("Casa Norte"));
        assert_eq!(vetoes[0].estatus, VetoStatus::Vetado);
        assert_eq!(
            vetoed_guarantors(&tables, None, false).await.expect("all load").len(),
            2
        );

        let clients = blacklisted_clients(&tables, Some("ATRASADA"), true)
            .await
            .expect("clients load");
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].cliente_nombre.as_deref(), Some("Marta"));
        assert_eq!(clients[0].motivo_tipo, BlacklistReason::Moroso);
    }
}

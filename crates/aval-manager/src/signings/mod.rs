//! Signing appointments: validation, eligibility, conflict checks and persistence.

pub mod portal;
pub mod router;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Signing, SigningDraft, SigningPatch, SigningState, Validate};
use crate::eligibility::{EligibilityGate, Parties};
use crate::error::ApiError;
use crate::scheduling::{ConflictEngine, TimeWindow};
use crate::store::repositories::{SigningRepository, SIGNINGS};
use crate::store::{encode, timestamp, Query, StoreError, Tables};

/// List filters accepted by the admin and portal listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigningFilter {
    #[serde(default)]
    pub aval_id: Option<Uuid>,
    #[serde(default)]
    pub estado: Option<SigningState>,
    #[serde(default)]
    pub fecha_desde: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fecha_hasta: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub created_by: Option<Uuid>,
    #[serde(skip)]
    pub ascending: bool,
}

#[derive(Clone)]
pub struct SigningService {
    tables: Tables,
    repository: Arc<dyn SigningRepository>,
    engine: ConflictEngine,
    gate: EligibilityGate,
}

impl SigningService {
    pub fn new(
        tables: Tables,
        repository: Arc<dyn SigningRepository>,
        engine: ConflictEngine,
        gate: EligibilityGate,
    ) -> Self {
        Self {
            tables,
            repository,
            engine,
            gate,
        }
    }

    pub fn engine(&self) -> &ConflictEngine {
        &self.engine
    }

    /// Veto check for a guarantor and agency before the client is known.
    pub async fn check_guarantor(
        &self,
        guarantor: Uuid,
        agency: Option<Uuid>,
    ) -> Result<(), ApiError> {
        self.gate
            .check_eligible(&Parties {
                guarantor,
                client: None,
                agency,
            })
            .await
    }

    pub async fn list(&self, filter: &SigningFilter) -> Result<Vec<Signing>, ApiError> {
        let mut query = Query::table(SIGNINGS)
            .eq_opt("aval_id", filter.aval_id)
            .eq_opt("estado", filter.estado.map(SigningState::label))
            .eq_opt("creado_por", filter.created_by);
        if let Some(from) = filter.fecha_desde {
            query = query.gte("fecha_inicio", timestamp(from));
        }
        if let Some(to) = filter.fecha_hasta {
            query = query.lte("fecha_inicio", timestamp(to));
        }
        query = if filter.ascending {
            query.order_asc("fecha_inicio")
        } else {
            query.order_desc("fecha_inicio")
        };
        Ok(self.tables.select(&query).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Signing, ApiError> {
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("signing not found".to_string()))
    }

    /// Validation, eligibility, then the serialized check-and-insert.
    pub async fn create(
        &self,
        draft: SigningDraft,
        creator: Option<Uuid>,
    ) -> Result<Signing, ApiError> {
        draft.validate()?;
        let window = TimeWindow::new(draft.starts_at, draft.ends_at)?;

        if draft.state != SigningState::Cancelada {
            self.gate
                .check_eligible(&Parties {
                    guarantor: draft.guarantor_id,
                    client: draft.client_id,
                    agency: draft.agency_id,
                })
                .await?;
        }

        let mut row = encode(&draft)?;
        if let Value::Object(fields) = &mut row {
            fields.insert("fecha_fin".to_string(), Value::String(timestamp(window.end)));
            if draft.created_by.is_none() {
                if let Some(creator) = creator {
                    fields.insert("creado_por".to_string(), Value::String(creator.to_string()));
                }
            }
        }

        let _guard = self.engine.lock(draft.guarantor_id).await;
        if draft.state.is_active() {
            self.engine
                .can_book(draft.guarantor_id, &window, None)
                .await?;
        }
        let signing = self
            .repository
            .insert(row)
            .await
            .map_err(booking_store_error)?;
        tracing::info!(
            signing_id = %signing.id,
            guarantor_id = %signing.guarantor_id,
            "signing created"
        );
        Ok(signing)
    }

    pub async fn update(&self, id: Uuid, mut patch: SigningPatch) -> Result<Signing, ApiError> {
        patch.validate()?;
        let existing = self.get(id).await?;

        if let Some(next) = patch.state {
            if next != existing.state && !existing.state.can_transition_to(next) {
                return Err(ApiError::invalid(format!(
                    "a {} signing cannot become {}",
                    existing.state.label(),
                    next.label()
                )));
            }
        }
        if patch.starts_at.is_some() && patch.ends_at.is_none() {
            patch.ends_at = patch.starts_at;
        }

        let window = TimeWindow::new(
            patch.starts_at.unwrap_or(existing.starts_at),
            Some(patch.ends_at.unwrap_or(existing.ends_at)),
        )?;
        let state = patch.state.unwrap_or(existing.state);
        let parties = Parties {
            guarantor: patch.guarantor_id.unwrap_or(existing.guarantor_id),
            client: patch.client_id.or(existing.client_id),
            agency: patch.agency_id.unwrap_or(existing.agency_id),
        };
        let touches_parties =
            patch.guarantor_id.is_some() || patch.client_id.is_some() || patch.agency_id.is_some();

        if touches_parties && state != SigningState::Cancelada {
            self.gate.check_eligible(&parties).await?;
        }

        let moved = patch.touches_window() || parties.guarantor != existing.guarantor_id;
        let _guard = self.engine.lock(parties.guarantor).await;
        if moved && state.is_active() {
            self.engine
                .can_book(parties.guarantor, &window, Some(id))
                .await?;
        }

        let signing = self
            .repository
            .update(id, encode(&patch)?)
            .await
            .map_err(booking_store_error)?;
        tracing::info!(signing_id = %id, state = state.label(), "signing updated");
        Ok(signing)
    }

    /// `owner` restricts the cancellation to signings that caller created.
    pub async fn cancel(&self, id: Uuid, owner: Option<Uuid>) -> Result<Signing, ApiError> {
        let existing = self.get(id).await?;
        if owner.is_some_and(|owner| existing.created_by != Some(owner)) {
            return Err(ApiError::NotFound("signing not found".to_string()));
        }
        self.update(id, SigningPatch::state(SigningState::Cancelada))
            .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.tables
            .delete_by_id(SIGNINGS, id)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => ApiError::NotFound("signing not found".to_string()),
                other => ApiError::from(other),
            })
    }
}

/// The exclusion constraint on active signings reports overlaps as conflicts.
fn booking_store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict(detail) => {
            tracing::info!(%detail, "booking rejected by the store");
            ApiError::Conflict("double-booked".to_string())
        }
        StoreError::NotFound => ApiError::NotFound("signing not found".to_string()),
        other => ApiError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::UnscopedVetoPolicy;
    use crate::store::MemoryTables;
    use serde_json::json;

    struct Fixture {
        memory: MemoryTables,
        service: SigningService,
        guarantor: Uuid,
    }

    fn fixture() -> Fixture {
        let memory = MemoryTables::new();
        let tables = Tables::new(Arc::new(memory.clone()));
        let shared = Arc::new(tables.clone());
        let engine = ConflictEngine::new(shared.clone(), shared.clone());
        let gate = EligibilityGate::new(shared.clone(), shared.clone(), UnscopedVetoPolicy::default());
        let service = SigningService::new(tables, shared, engine, gate);

        let guarantor = Uuid::new_v4();
        memory.seed(
            "disponibilidades_avales",
            vec![json!({
                "aval_id": guarantor,
                "fecha_inicio": "2024-01-08T09:00:00Z",
                "fecha_fin": "2024-01-08T18:00:00Z",
                "recurrente": false
            })],
        );
        Fixture {
            memory,
            service,
            guarantor,
        }
    }

    fn draft(guarantor: Uuid, start: &str, end: &str) -> SigningDraft {
        serde_json::from_value(json!({
            "aval_id": guarantor,
            "asesor_nombre": "Laura Méndez",
            "cliente_nombre": "Carlos Ruiz",
            "tipo_renta": "habitacional",
            "periodo_contrato_anios": 1,
            "monto_renta": "12000",
            "propiedad_domicilio": "Av. Chapultepec 15",
            "ubicacion_maps_url": "https://maps.example.com/x",
            "fecha_inicio": start,
            "fecha_fin": end,
            "pago_por_servicio": "1500"
        }))
        .expect("draft decodes")
    }

    #[tokio::test]
    async fn create_rejects_overlap_and_records_creator() {
        let fx = fixture();
        let creator = Uuid::new_v4();
        let created = fx
            .service
            .create(
                draft(fx.guarantor, "2024-01-08T10:00:00Z", "2024-01-08T11:00:00Z"),
                Some(creator),
            )
            .await
            .expect("first booking succeeds");
        assert_eq!(created.created_by, Some(creator));

        match fx
            .service
            .create(
                draft(fx.guarantor, "2024-01-08T10:30:00Z", "2024-01-08T11:30:00Z"),
                None,
            )
            .await
        {
            Err(ApiError::Conflict(message)) => assert_eq!(message, "double-booked"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_creates_for_one_guarantor_are_serialized() {
        let fx = fixture();
        let spawn_create = |start: &str, end: &str| {
            let service = fx.service.clone();
            let booking = draft(fx.guarantor, start, end);
            tokio::spawn(async move { service.create(booking, None).await })
        };
        let (first, second) = tokio::join!(
            spawn_create("2024-01-08T10:00:00Z", "2024-01-08T11:00:00Z"),
            spawn_create("2024-01-08T10:15:00Z", "2024-01-08T10:45:00Z"),
        );
        let outcomes = [first.expect("task joins"), second.expect("task joins")];

        let created = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        assert_eq!(created, 1, "outcomes: {outcomes:?}");
        match outcomes.iter().find(|outcome| outcome.is_err()) {
            Some(Err(ApiError::Conflict(message))) => assert_eq!(message, "double-booked"),
            other => panic!("expected one conflict, got {other:?}"),
        }
        assert_eq!(fx.memory.rows(SIGNINGS).len(), 1);
    }

    #[tokio::test]
    async fn update_moves_window_without_conflicting_with_itself() {
        let fx = fixture();
        let created = fx
            .service
            .create(
                draft(fx.guarantor, "2024-01-08T10:00:00Z", "2024-01-08T11:00:00Z"),
                None,
            )
            .await
            .expect("booking succeeds");

        let patch: SigningPatch = serde_json::from_value(json!({
            "fecha_inicio": "2024-01-08T10:30:00Z",
            "fecha_fin": "2024-01-08T11:30:00Z"
        }))
        .expect("patch decodes");
        let moved = fx
            .service
            .update(created.id, patch)
            .await
            .expect("moving within the block succeeds");
        assert_eq!(moved.starts_at.to_rfc3339(), "2024-01-08T10:30:00+00:00");
    }

    #[tokio::test]
    async fn update_resolves_missing_parties_from_stored_row() {
        let fx = fixture();
        let agency = Uuid::new_v4();
        let mut booking = draft(fx.guarantor, "2024-01-08T10:00:00Z", "2024-01-08T11:00:00Z");
        booking.agency_id = Some(agency);
        let created = fx
            .service
            .create(booking, None)
            .await
            .expect("booking succeeds");

        let client = Uuid::new_v4();
        fx.memory.seed(
            "vetos_avales",
            vec![json!({"aval_id": fx.guarantor, "inmobiliaria_id": agency, "motivo": "x", "estatus": "vetado"})],
        );
        let patch = SigningPatch {
            client_id: Some(client),
            ..SigningPatch::default()
        };
        match fx.service.update(created.id, patch).await {
            Err(ApiError::RejectedByPolicy(_)) => {}
            other => panic!("expected policy rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn patch_can_clear_the_agency() {
        let fx = fixture();
        let mut booking = draft(fx.guarantor, "2024-01-08T10:00:00Z", "2024-01-08T11:00:00Z");
        booking.agency_id = Some(Uuid::new_v4());
        let created = fx
            .service
            .create(booking, None)
            .await
            .expect("booking succeeds");

        let patch: SigningPatch =
            serde_json::from_value(json!({"inmobiliaria_id": null})).expect("patch decodes");
        let updated = fx
            .service
            .update(created.id, patch)
            .await
            .expect("clearing the agency succeeds");
        assert_eq!(updated.agency_id, None);
    }

    #[tokio::test]
    async fn terminal_signings_reject_state_changes() {
        let fx = fixture();
        let created = fx
            .service
            .create(
                draft(fx.guarantor, "2024-01-08T10:00:00Z", "2024-01-08T11:00:00Z"),
                None,
            )
            .await
            .expect("booking succeeds");
        fx.service
            .cancel(created.id, None)
            .await
            .expect("cancellation succeeds");

        match fx
            .service
            .update(created.id, SigningPatch::state(SigningState::Reprogramada))
            .await
        {
            Err(ApiError::InvalidRequest { .. }) => {}
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn advisors_cannot_cancel_foreign_signings() {
        let fx = fixture();
        let created = fx
            .service
            .create(
                draft(fx.guarantor, "2024-01-08T10:00:00Z", "2024-01-08T11:00:00Z"),
                Some(Uuid::new_v4()),
            )
            .await
            .expect("booking succeeds");

        match fx.service.cancel(created.id, Some(Uuid::new_v4())).await {
            Err(ApiError::NotFound(_)) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }
}

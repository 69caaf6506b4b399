use std::sync::Arc;

use crate::config::{AppConfig, StorageConfig};
use crate::eligibility::{EligibilityGate, UnscopedVetoPolicy};
use crate::identity::{IdentityProvider, IdentityResolver};
use crate::scheduling::ConflictEngine;
use crate::settlement::SettlementBuilder;
use crate::signings::SigningService;
use crate::storage::StorageProxy;
use crate::store::object_store::ObjectStore;
use crate::store::{StoreError, SupabaseClient, TableGateway, Tables};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppContext {
    pub tables: Tables,
    pub identity: IdentityResolver,
    pub storage: StorageProxy,
    pub signings: SigningService,
    pub settlements: SettlementBuilder,
}

impl AppContext {
    /// Wires every component against the hosted backend.
    pub fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let client = Arc::new(SupabaseClient::new(&config.supabase)?);
        Ok(Self::with_backends(
            client.clone(),
            client.clone(),
            client,
            &config.storage,
            config.eligibility.unscoped_policy,
        ))
    }

    pub fn with_backends(
        gateway: Arc<dyn TableGateway>,
        objects: Arc<dyn ObjectStore>,
        provider: Arc<dyn IdentityProvider>,
        storage: &StorageConfig,
        policy: UnscopedVetoPolicy,
    ) -> Self {
        let tables = Tables::new(gateway);
        let shared = Arc::new(tables.clone());

        let storage = StorageProxy::new(storage, objects.clone());
        let engine = ConflictEngine::new(shared.clone(), shared.clone());
        let gate = EligibilityGate::new(shared.clone(), shared.clone(), policy);
        let signings = SigningService::new(tables.clone(), shared.clone(), engine, gate);
        let settlements = SettlementBuilder::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            objects,
            storage.bucket(),
        );

        Self {
            identity: IdentityResolver::new(provider, shared),
            tables,
            storage,
            signings,
            settlements,
        }
    }
}

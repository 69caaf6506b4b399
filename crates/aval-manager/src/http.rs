use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::public::public_router;
use crate::resources::resource_router;
use crate::settlement::settlement_router;
use crate::signings::portal::portal_router;
use crate::signings::router::signing_router;
use crate::storage::storage_router;

/// Every API route, layered with CORS and request tracing.
pub fn api_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .merge(resource_router())
        .merge(signing_router())
        .merge(portal_router())
        .merge(settlement_router())
        .merge(storage_router())
        .merge(public_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

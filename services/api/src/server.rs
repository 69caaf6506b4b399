use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_operational_routes;
use aval_manager::config::{AppConfig, ServerConfig};
use aval_manager::error::AppError;
use aval_manager::{api_router, telemetry, AppContext};
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

impl ServeArgs {
    fn apply_to(self, server: &mut ServerConfig) {
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
    }
}

/// Builds the full application plus the flag that flips `/ready` once the listener is bound.
fn build_app(config: &AppConfig) -> Result<(Router, Arc<AtomicBool>), AppError> {
    let context = Arc::new(AppContext::from_config(config)?);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: Arc::clone(&readiness),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_operational_routes(api_router(context))
        .layer(Extension(state))
        .layer(prometheus_layer);
    Ok((app, readiness))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not listen for ctrl-c; shutting down");
    }
    info!("shutdown requested");
}

pub(crate) async fn run(args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    args.apply_to(&mut config.server);
    telemetry::init(&config.telemetry)?;

    let (app, readiness) = build_app(&config)?;
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        bucket = %config.storage.bucket,
        unscoped_veto_policy = ?config.eligibility.unscoped_policy,
        "aval manager ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

use crate::cli::ServeArgs;
use crate::infra::{AppState, PlacementStack};
use crate::routes::with_tnp_routes;
use axum::extract::DefaultBodyLimit;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use campus_tnp::config::AppConfig;
use campus_tnp::error::AppError;
use campus_tnp::telemetry;
use campus_tnp::workflows::placement::SeedFile;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed) = args.seed.take() {
        config.placement.seed_path = Some(seed);
    }

    telemetry::init(&config.telemetry)?;

    let seed = match &config.placement.seed_path {
        Some(path) => {
            info!(path = %path.display(), "loading seed data");
            Some(SeedFile::from_path(path)?)
        }
        None => {
            warn!("no seed file configured; every request will be rejected until tokens exist");
            None
        }
    };

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let stack = PlacementStack::in_memory(&config.placement, seed.as_ref())?;

    let app = with_tnp_routes(stack)
        .layer(DefaultBodyLimit::max(config.placement.upload_limit_bytes))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        transitions = ?config.placement.transitions,
        "placement service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryCompletionLedger, InMemoryHuntCatalog};
use crate::routes::{with_submission_routes, HuntRegistry};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use snaphunt::config::AppConfig;
use snaphunt::error::AppError;
use snaphunt::telemetry;
use snaphunt::workflows::submission::{HttpObjectStore, PhotoSubmissionService, VisionChatOracle};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(InMemoryHuntCatalog::default());
    let store = Arc::new(HttpObjectStore::from_config(&config.storage)?);
    let oracle = Arc::new(VisionChatOracle::from_config(&config.oracle)?);
    let ledger = Arc::new(InMemoryCompletionLedger::default());

    let service = Arc::new(PhotoSubmissionService::new(
        catalog.clone(),
        store.clone(),
        oracle,
        ledger,
        Duration::from_secs(config.storage.read_url_ttl_secs),
    ));
    let registry = HuntRegistry { catalog, store };

    let app = with_submission_routes(service)
        .layer(Extension(app_state))
        .layer(Extension(registry))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "photo hunt submission service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

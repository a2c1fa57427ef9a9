use crate::cli::ServeArgs;
use crate::infra::{build_desk, AppState};
use crate::routes::router;
use axum_prometheus::PrometheusMetricLayer;
use bolsao::config::AppConfig;
use bolsao::error::AppError;
use bolsao::telemetry;
use bolsao::AwardDesk;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    // The spreadsheet client owns a runtime of its own, so the desk is built
    // and finally dropped outside the server runtime.
    let desk = Arc::new(build_desk(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(&config, Arc::clone(&desk)));
    drop(runtime);
    drop(desk);
    result
}

async fn serve(config: &AppConfig, desk: Arc<AwardDesk>) -> Result<(), AppError> {
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let store_enabled = desk.store_enabled();
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        desk,
    };

    let app = router(app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, store_enabled, "bolsao award desk ready");

    axum::serve(listener, app).await?;
    Ok(())
}

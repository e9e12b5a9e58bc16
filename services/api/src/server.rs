use crate::cli::ServeArgs;
use crate::infra::{AppState, LogNotifier};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tutor_pairing::config::AppConfig;
use tutor_pairing::error::AppError;
use tutor_pairing::telemetry;
use tutor_pairing::workflows::pairing::{InMemoryPairingStore, PairingService};
use tutor_pairing::workflows::performance::TutorPerformanceService;
use tutor_pairing::workflows::roster::RosterSeed;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed_dir) = args.seed_dir.take() {
        config.server.seed_dir = Some(seed_dir);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = build_store(config.server.seed_dir.as_deref())?;
    let notifier = Arc::new(LogNotifier);
    let pairing_service = Arc::new(PairingService::new(
        store.clone(),
        notifier.clone(),
        config.pairing.clone(),
    ));
    let performance_service = Arc::new(TutorPerformanceService::new(
        store,
        notifier,
        config.scoring.clone(),
        config.pairing.max_commit_attempts,
    ));

    let app = with_service_routes(pairing_service, performance_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "tutor pairing service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// The in-memory store, filled from the seed directory when one is configured.
pub(crate) fn build_store(seed_dir: Option<&Path>) -> Result<Arc<InMemoryPairingStore>, AppError> {
    let store = Arc::new(InMemoryPairingStore::new());
    match seed_dir {
        Some(dir) => {
            let seed = RosterSeed::from_dir(dir)?;
            if seed.is_empty() {
                warn!(dir = %dir.display(), "seed directory had no roster files");
            }
            seed.load_into(&store)?;
        }
        None => warn!("no seed directory configured, starting with an empty roster"),
    }
    Ok(store)
}

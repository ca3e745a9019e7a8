//! Policy Lifecycle API Server Binary
//!
//! Starts the HTTP server, the compensation sweep and the notifier sweep.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin policy-lifecycle-api
//!
//! # Run with environment variables
//! API_HOST=0.0.0.0 API_PORT=8080 cargo run --bin policy-lifecycle-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_SEED_DEMO` - Seed the demo catalog on startup (default: true)
//! * `API_COMPENSATE_INTERVAL_SECS` - Compensation sweep cadence (default: 10)
//! * `API_NOTIFY_INTERVAL_SECS` - Notifier sweep cadence (default: 5)

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use core_kernel::ServiceResult;
use domain_claims::{ClaimService, CompensationJob, NotifierJob};
use domain_policy::{FormulaRegistry, PolicyService};
use infra_store::{demo_catalog, HttpWebhookTransport, MemoryStore};
use interface_api::{config::ApiConfig, create_router, error::fault_signal, AppState};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long log output gets to drain after an untrusted failure before the
/// listener stops.
const FAULT_FLUSH_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().unwrap_or_default();
    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting Policy Lifecycle API Server"
    );

    let store = Arc::new(MemoryStore::new());
    if config.seed_demo {
        let seeded = demo_catalog(&store).await;
        tracing::info!(
            producer = %seeded.producer.code,
            contract = %seeded.contract.code,
            plan = %seeded.plan.code,
            "demo catalog seeded"
        );
    }

    let formulas = Arc::new(FormulaRegistry::new());
    let policies = Arc::new(PolicyService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        formulas.clone(),
    ));
    let claims = Arc::new(ClaimService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
    ));

    let transport = Arc::new(HttpWebhookTransport::new()?);
    let compensation = Arc::new(CompensationJob::new(store.clone(), formulas));
    let notifier = Arc::new(NotifierJob::new(store.clone(), store.clone(), transport));

    let (stop_tx, stop_rx) = watch::channel(false);
    let compensation_loop = spawn_job(
        "compensation",
        Duration::from_secs(config.compensate_interval_secs),
        stop_rx.clone(),
        move |now| {
            let job = compensation.clone();
            async move { job.run_once(now).await }
        },
    );
    let notifier_loop = spawn_job(
        "notifier",
        Duration::from_secs(config.notify_interval_secs),
        stop_rx,
        move |now| {
            let job = notifier.clone();
            async move { job.run_once(now).await }
        },
    );

    let app = create_router(AppState { policies, claims });
    let addr: SocketAddr = config.server_addr().parse()?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_tx.send(true);
    let _ = tokio::join!(compensation_loop, notifier_loop);

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Runs one background job on a fixed cadence until the stop flag flips.
/// A failed run is logged; an untrusted failure raises the fault signal.
fn spawn_job<F, Fut>(
    name: &'static str,
    period: Duration,
    mut stop: watch::Receiver<bool>,
    run: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn(DateTime<Utc>) -> Fut + Send + 'static,
    Fut: Future<Output = ServiceResult<usize>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => match run(Utc::now()).await {
                    Ok(0) => {}
                    Ok(handled) => tracing::info!(job = name, handled, "job run complete"),
                    Err(err) => {
                        tracing::error!(job = name, error = %err, "job run failed");
                        if !err.trusted {
                            fault_signal().notify_one();
                        }
                    }
                },
                _ = stop.changed() => break,
            }
        }
        tracing::debug!(job = name, "job loop stopped");
    })
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for Ctrl+C, SIGTERM, or the fault signal.
///
/// A fault means some response or job produced an untrusted error and the
/// process state can no longer be relied on; the server stops taking
/// traffic after a short delay that lets in-flight logs drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = fault_signal().notified() => {
            tracing::error!("Untrusted failure reported, initiating shutdown");
            tokio::time::sleep(FAULT_FLUSH_DELAY).await;
        }
    }
}

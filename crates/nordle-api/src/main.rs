//! Nordle API server entry point.

use std::error::Error;
use std::sync::{Arc, Mutex};

use nordle_api::config::Config;
use nordle_api::error::AppError;
use nordle_api::state::{AppState, OracleRuntime};
use nordle_api::{build_router, telemetry};
use nordle_core::clock::{Clock, SystemClock};
use nordle_core::repository::EventRepository;
use nordle_core::rng::{DeterministicRng, StdDeterministicRng};
use nordle_event_store::memory::InMemoryEventRepository;
use nordle_event_store::pg_event_repository::PgEventRepository;
use nordle_oracle::dispatcher::{FulfillmentQueue, FulfillmentWorker};
use nordle_oracle::gateway::LocalOracleGateway;
use nordle_oracle::sweeper::ExpirySweeper;
use nordle_registry::domain::word_bank::StaticWordBank;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    let tracer_provider = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Nordle API server");

    let event_repository = event_repository(&config).await?;
    let word_bank = Arc::new(word_bank(&config).await?);
    tracing::info!(words = word_bank.len(), "word bank loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
        Arc::new(Mutex::new(StdDeterministicRng::from_entropy()));
    let request_ttl = config.request_max_age()?;

    // Background oracle machinery.
    let (fulfillment_queue, fulfillment_rx) = FulfillmentQueue::channel(config.queue_capacity);
    let worker = FulfillmentWorker::new(
        clock.clone(),
        word_bank.clone(),
        rng.clone(),
        event_repository.clone(),
    )
    .spawn(fulfillment_rx);
    let sweeper = Arc::new(ExpirySweeper::new(
        clock.clone(),
        event_repository.clone(),
        request_ttl,
    ));
    let sweep_task = sweeper.clone().spawn(config.sweep_interval);

    let app_state = AppState::new(
        clock,
        rng,
        event_repository,
        word_bank,
        Arc::new(LocalOracleGateway::default()),
        OracleRuntime {
            fulfillment_queue,
            sweeper,
            request_ttl,
        },
    );
    let app = build_router(app_state);

    let addr = config.bind_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue sender; the worker drains what is left.
    sweep_task.abort();
    if let Err(e) = worker.await {
        tracing::error!(error = %e, "fulfillment worker panicked");
    }
    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            tracing::error!(error = %e, "failed to flush spans");
        }
    }

    Ok(())
}

async fn event_repository(config: &Config) -> Result<Arc<dyn EventRepository>, AppError> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; events are kept in memory");
        return Ok(Arc::new(InMemoryEventRepository::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    Ok(Arc::new(PgEventRepository::new(pool)))
}

async fn word_bank(config: &Config) -> Result<StaticWordBank, AppError> {
    let Some(path) = config.word_bank_path.as_ref() else {
        return Ok(StaticWordBank::builtin());
    };

    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::WordBank(format!("{}: {e}", path.display())))?;
    let bank = StaticWordBank::from_yaml(&source)
        .map_err(|e| AppError::WordBank(format!("{}: {e}", path.display())))?;
    if bank.is_empty() {
        return Err(AppError::WordBank(format!("{} holds no words", path.display())));
    }
    Ok(bank)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}

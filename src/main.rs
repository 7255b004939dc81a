use std::{process, sync::Arc};

use microcosm::{
    application::error::AppError,
    application::services::{Repositories, Services},
    cache::{CacheConfig, Clock, DedupGuard, ResultCache, SystemClock},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        memory::MemoryStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::internal(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cache_config = CacheConfig::from(&settings.cache);
    let dedup = Arc::new(DedupGuard::new(clock.clone(), cache_config.dedup_ttl));
    let cache = ResultCache::in_memory(cache_config, clock);

    let services = Services::build(repositories, cache, dedup);
    let state = ApiState::new(services, settings.site.clone());
    let router = http::build_router(state);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;

    info!(
        target = "microcosm::serve",
        addr = %addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InfraError::Serve)?;

    info!(target = "microcosm::serve", "server stopped");
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = PostgresRepositories::connect(&settings.database).await?;
    PostgresRepositories::run_migrations(&pool).await?;
    info!(target = "microcosm::migrate", "migrations applied");
    Ok(())
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    if settings.database.url.is_none() {
        warn!(
            target = "microcosm::serve",
            "database url is not configured; serving from the in-memory store"
        );
        return Ok(Repositories::from_backend(Arc::new(MemoryStore::new())));
    }

    let repositories = PostgresRepositories::open(&settings.database).await?;
    Ok(Repositories::from_backend(Arc::new(repositories)))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "microcosm::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "microcosm::serve", "shutdown signal received");
}

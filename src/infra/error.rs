use std::net::SocketAddr;

use thiserror::Error;

/// Failures while bringing the process up or tearing it down.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server stopped with an error: {0}")]
    Serve(#[source] std::io::Error),
    #[error("database url is not configured")]
    MissingDatabaseUrl,
    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("failed to apply migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

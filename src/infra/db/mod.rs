//! Postgres-backed repository implementations.

mod microcosms;
mod permissions;
mod profiles;
mod questions;
mod reactions;
mod store;
mod util;
mod watchers;

pub use store::PgStoreTransaction;
pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::DatabaseSettings;

use super::error::InfraError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Shared pool handle implementing every repository seam.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a pool sized by the settings. Fails when no URL is configured.
    pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, InfraError> {
        let url = settings
            .url
            .as_deref()
            .ok_or(InfraError::MissingDatabaseUrl)?;
        PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .connect(url)
            .await
            .map_err(InfraError::Connect)
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), InfraError> {
        MIGRATOR.run(pool).await?;
        info!(
            target = "microcosm::db",
            migrations = MIGRATOR.iter().count(),
            "schema is up to date"
        );
        Ok(())
    }

    /// Connect and bring the schema up to date.
    pub async fn open(settings: &DatabaseSettings) -> Result<Self, InfraError> {
        let pool = Self::connect(settings).await?;
        Self::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
    }
}

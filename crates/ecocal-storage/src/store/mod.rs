use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;

pub mod event;
pub mod notification;
pub mod ports;
pub mod rule;

pub use event::NewEconomicEvent;

/// Single access point to the application database (`ecocal.db`).
///
/// Every method is `async` and goes through SeaORM.
pub struct Store {
    pub(crate) db: DatabaseConnection,
}

impl Store {
    /// Connects, enables WAL for SQLite and runs pending migrations.
    ///
    /// `db_url` example: `sqlite:///var/lib/ecocal/ecocal.db?mode=rwc`.
    /// `data_dir` is created if missing.
    pub async fn new(db_url: &str, data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        let db = Database::connect(db_url)
            .await
            .with_context(|| format!("failed to connect to {db_url}"))?;

        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await.context("migration failed")?;

        tracing::info!(db_url = %db_url, "Initialized store (SeaORM)");
        Ok(Self { db })
    }

    /// Opens `<data_dir>/ecocal.db`, creating it when absent.
    pub async fn open_in(data_dir: &Path) -> Result<Self> {
        let url = sqlite_url(data_dir);
        Self::new(&url, data_dir).await
    }

    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// `sqlite://<data_dir>/ecocal.db?mode=rwc`
pub fn sqlite_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join("ecocal.db").display())
}

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::info;

use crate::error::{MonitorError, StorageError};
use crate::models::{PriceRange, UserWatch, WatchEdit};
use crate::traits::{SeenStore, WatchStore};

pub mod memory;

pub use memory::MemoryStore;

/// Sqlite-backed watch store and seen-set ledger.
pub struct Database {
    pool: SqlitePool,
    max_sites: usize,
}

impl Database {
    pub async fn new(db_url: &str, max_sites: usize) -> Result<Self> {
        let in_memory = is_memory_url(db_url);

        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database file");
            if let Some(parent) = database_path(db_url).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            Sqlite::create_database(db_url).await?;
        }

        let options = SqliteConnectOptions::from_str(db_url)?;
        let pool = if in_memory {
            // Every connection to `:memory:` is its own database, so keep exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool, max_sites })
    }

    /// Throwaway database, mostly for tests.
    pub async fn in_memory(max_sites: usize) -> Result<Self> {
        Self::new("sqlite::memory:", max_sites).await
    }

    async fn upsert_watch<'e, E>(executor: E, watch: &UserWatch) -> Result<(), StorageError>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let sites = serde_json::to_string(&watch.sites)?;

        sqlx::query(
            r"
            INSERT INTO watches (user_id, sites, keyword, min_price, max_price, active, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                sites = excluded.sites,
                keyword = excluded.keyword,
                min_price = excluded.min_price,
                max_price = excluded.max_price,
                active = excluded.active,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&watch.user_id)
        .bind(sites)
        .bind(&watch.keyword)
        .bind(watch.price.min)
        .bind(watch.price.max)
        .bind(watch.active)
        .bind(Utc::now().timestamp())
        .execute(executor)
        .await?;

        Ok(())
    }
}

const WATCH_COLUMNS: &str = "user_id, sites, keyword, min_price, max_price, active";

fn row_to_watch(row: &SqliteRow) -> Result<UserWatch, StorageError> {
    let sites: String = row.try_get("sites")?;

    Ok(UserWatch {
        user_id: row.try_get("user_id")?,
        sites: serde_json::from_str(&sites)?,
        keyword: row.try_get("keyword")?,
        price: PriceRange {
            min: row.try_get("min_price")?,
            max: row.try_get("max_price")?,
        },
        active: row.try_get("active")?,
    })
}

fn is_memory_url(db_url: &str) -> bool {
    db_url.contains(":memory:") || db_url.contains("mode=memory")
}

fn database_path(db_url: &str) -> &Path {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);
    Path::new(rest.split('?').next().unwrap_or(rest))
}

#[async_trait]
impl WatchStore for Database {
    async fn active_watches(&self) -> Result<Vec<UserWatch>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {WATCH_COLUMNS} FROM watches WHERE active = 1 ORDER BY user_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_watch).collect()
    }

    async fn get_watch(&self, user_id: &str) -> Result<Option<UserWatch>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {WATCH_COLUMNS} FROM watches WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_watch).transpose()
    }

    async fn update_watch(&self, user_id: &str, edit: WatchEdit) -> Result<UserWatch, MonitorError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {WATCH_COLUMNS} FROM watches WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut watch = match row {
            Some(row) => row_to_watch(&row)?,
            None => UserWatch::new(user_id),
        };

        // A rejected edit drops `tx`, which rolls back.
        watch.apply(&edit, self.max_sites)?;

        Self::upsert_watch(&mut *tx, &watch).await?;
        tx.commit().await?;

        Ok(watch)
    }
}

#[async_trait]
impl SeenStore for Database {
    async fn has(&self, user_id: &str, url: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM seen WHERE user_id = ? AND url = ? LIMIT 1")
            .bind(user_id)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    async fn mark(&self, user_id: &str, url: &str) -> Result<(), StorageError> {
        sqlx::query("INSERT OR IGNORE INTO seen (user_id, url, notified_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(url)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM seen WHERE notified_at < ?")
            .bind(cutoff.timestamp())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            max_sites: self.max_sites,
        }
    }
}

//! Session trait and the SQLite implementation.

use crate::dialect::{Compiled, Dialect};
use crate::error::{ArchiveError, ArchiveResult};
use crate::expr::SqlValue;
use crate::models::ArchivedWorkflowBody;
use crate::predicate::unix_micros;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Arguments, Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// A connection to the archive tables.
///
/// Statements arrive already rendered for [`ArchiveSession::dialect`].
#[async_trait]
pub trait ArchiveSession: Send + Sync {
    /// SQL flavor statements must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Create the archive tables and indexes if they do not exist.
    async fn migrate(&self) -> ArchiveResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> ArchiveResult<()>;

    /// Run `statements` in order inside one transaction and return the rows
    /// affected by each. Nothing is committed if any statement fails.
    async fn execute_in_transaction(&self, statements: Vec<Compiled>) -> ArchiveResult<Vec<u64>>;

    async fn fetch_bodies(&self, statement: Compiled) -> ArchiveResult<Vec<ArchivedWorkflowBody>>;

    async fn fetch_count(&self, statement: Compiled) -> ArchiveResult<u64>;

    async fn fetch_strings(&self, statement: Compiled) -> ArchiveResult<Vec<String>>;
}

/// SQLite-based archive session.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite allows a single writer; one connection avoids "database is locked".
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout: Duration::from_secs(query_timeout_secs),
        };
        store.migrate().await?;

        tracing::debug!(
            path = %path.display(),
            query_timeout_secs,
            "Opened SQLite archive (query timeout is advisory)"
        );

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    fn warn_if_slow(&self, started: Instant, sql: &str) {
        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_secs = self.query_timeout.as_secs(),
                sql,
                "SQLite query exceeded advisory timeout"
            );
        }
    }
}

fn sqlite_arguments<'q>(params: Vec<SqlValue>) -> ArchiveResult<SqliteArguments<'q>> {
    let mut args = SqliteArguments::default();
    for param in params {
        let added = match param {
            SqlValue::Text(v) => args.add(v),
            SqlValue::Int(v) => args.add(v),
            SqlValue::Bytes(v) => args.add(v),
            SqlValue::Timestamp(v) => args.add(unix_micros(v)),
            SqlValue::TextArray(_) => {
                return Err(ArchiveError::InvalidArgument(
                    "array parameters are not supported by SQLite".to_string(),
                ));
            }
        };
        added.map_err(sqlx::Error::Encode)?;
    }
    Ok(args)
}

#[async_trait]
impl ArchiveSession for SqliteStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn migrate(&self) -> ArchiveResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> ArchiveResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn execute_in_transaction(&self, statements: Vec<Compiled>) -> ArchiveResult<Vec<u64>> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        let mut affected = Vec::with_capacity(statements.len());
        for statement in statements {
            let args = sqlite_arguments(statement.params)?;
            let result = sqlx::query_with::<Sqlite, _>(&statement.sql, args)
                .execute(&mut *tx)
                .await?;
            affected.push(result.rows_affected());
        }
        tx.commit().await?;
        self.warn_if_slow(started, "transaction");
        Ok(affected)
    }

    async fn fetch_bodies(&self, statement: Compiled) -> ArchiveResult<Vec<ArchivedWorkflowBody>> {
        let started = Instant::now();
        let args = sqlite_arguments(statement.params)?;
        let rows = sqlx::query_as_with::<Sqlite, ArchivedWorkflowBody, _>(&statement.sql, args)
            .fetch_all(&self.pool)
            .await?;
        self.warn_if_slow(started, &statement.sql);
        Ok(rows)
    }

    async fn fetch_count(&self, statement: Compiled) -> ArchiveResult<u64> {
        let started = Instant::now();
        let args = sqlite_arguments(statement.params)?;
        let count: i64 = sqlx::query_scalar_with::<Sqlite, i64, _>(&statement.sql, args)
            .fetch_one(&self.pool)
            .await?;
        self.warn_if_slow(started, &statement.sql);
        Ok(count.max(0) as u64)
    }

    async fn fetch_strings(&self, statement: Compiled) -> ArchiveResult<Vec<String>> {
        let started = Instant::now();
        let args = sqlite_arguments(statement.params)?;
        let values = sqlx::query_scalar_with::<Sqlite, String, _>(&statement.sql, args)
            .fetch_all(&self.pool)
            .await?;
        self.warn_if_slow(started, &statement.sql);
        Ok(values)
    }
}

/// SQLite schema. Timestamps are Unix microseconds.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS archived_workflows (
    cluster_name TEXT NOT NULL,
    instance_id TEXT NOT NULL,
    uid TEXT NOT NULL,
    name TEXT NOT NULL,
    namespace TEXT NOT NULL,
    phase TEXT NOT NULL,
    started_at INTEGER NOT NULL,
    finished_at INTEGER NOT NULL,
    workflow BLOB NOT NULL,
    PRIMARY KEY (cluster_name, uid)
);

CREATE INDEX IF NOT EXISTS idx_archived_workflows_scope
    ON archived_workflows (cluster_name, instance_id, namespace);

CREATE INDEX IF NOT EXISTS idx_archived_workflows_name
    ON archived_workflows (cluster_name, namespace, name);

CREATE INDEX IF NOT EXISTS idx_archived_workflows_started_at
    ON archived_workflows (cluster_name, started_at DESC);

CREATE INDEX IF NOT EXISTS idx_archived_workflows_finished_at
    ON archived_workflows (cluster_name, finished_at);

CREATE TABLE IF NOT EXISTS archived_workflow_labels (
    cluster_name TEXT NOT NULL,
    uid TEXT NOT NULL,
    label_key TEXT NOT NULL,
    label_value TEXT NOT NULL,
    PRIMARY KEY (cluster_name, uid, label_key)
);

CREATE INDEX IF NOT EXISTS idx_archived_workflow_labels_key_value
    ON archived_workflow_labels (cluster_name, label_key, label_value);
"#;

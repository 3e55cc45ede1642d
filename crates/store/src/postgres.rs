//! PostgreSQL-based archive session.

use crate::dialect::{Compiled, Dialect};
use crate::error::ArchiveResult;
use crate::expr::SqlValue;
use crate::models::ArchivedWorkflowBody;
use crate::store::ArchiveSession;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Arguments, Pool, Postgres};
use std::str::FromStr;
use wfarchive_core::config::PgSslMode;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

fn pg_arguments(params: Vec<SqlValue>) -> ArchiveResult<PgArguments> {
    let mut args = PgArguments::default();
    for param in params {
        let added = match param {
            SqlValue::Text(v) => args.add(v),
            SqlValue::Int(v) => args.add(v),
            SqlValue::Bytes(v) => args.add(v),
            SqlValue::Timestamp(v) => args.add(v),
            SqlValue::TextArray(v) => args.add(v),
        };
        added.map_err(sqlx::Error::Encode)?;
    }
    Ok(args)
}

/// PostgreSQL-based archive session.
#[derive(Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> ArchiveResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// Lets the password come from its own environment variable instead of
    /// being embedded in a URL.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> ArchiveResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Never log the password.
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> ArchiveResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl ArchiveSession for PostgresStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn migrate(&self) -> ArchiveResult<()> {
        // Prepared statements cannot hold more than one command.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> ArchiveResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn execute_in_transaction(&self, statements: Vec<Compiled>) -> ArchiveResult<Vec<u64>> {
        let mut tx = self.pool.begin().await?;
        let mut affected = Vec::with_capacity(statements.len());
        for statement in statements {
            let args = pg_arguments(statement.params)?;
            let result = sqlx::query_with::<Postgres, _>(&statement.sql, args)
                .execute(&mut *tx)
                .await?;
            affected.push(result.rows_affected());
        }
        tx.commit().await?;
        Ok(affected)
    }

    async fn fetch_bodies(&self, statement: Compiled) -> ArchiveResult<Vec<ArchivedWorkflowBody>> {
        let args = pg_arguments(statement.params)?;
        let rows = sqlx::query_as_with::<Postgres, ArchivedWorkflowBody, _>(&statement.sql, args)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn fetch_count(&self, statement: Compiled) -> ArchiveResult<u64> {
        let args = pg_arguments(statement.params)?;
        let count: i64 = sqlx::query_scalar_with::<Postgres, i64, _>(&statement.sql, args)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_strings(&self, statement: Compiled) -> ArchiveResult<Vec<String>> {
        let args = pg_arguments(statement.params)?;
        let values = sqlx::query_scalar_with::<Postgres, String, _>(&statement.sql, args)
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }
}

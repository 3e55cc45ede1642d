//! SQL-backed archive of completed workflows.
//!
//! This crate provides:
//! - Tenant-scoped archive, list, count, get and delete of workflows
//! - Label selector filtering over a label index table
//! - Time-to-live retention sweeps
//! - SQLite and PostgreSQL backends behind one archive implementation

pub mod archive;
pub mod dialect;
pub mod error;
pub mod expr;
pub mod filter;
pub mod models;
pub mod null;
pub mod postgres;
pub mod predicate;
pub mod query;
pub mod scope;
pub mod selector;
pub mod store;

pub use archive::{
    PostgresWorkflowArchive, SqlWorkflowArchive, SqliteWorkflowArchive, WorkflowArchive,
};
pub use dialect::Dialect;
pub use error::{ArchiveError, ArchiveResult};
pub use filter::WorkflowFilter;
pub use null::NullWorkflowArchive;
pub use postgres::PostgresStore;
pub use scope::TenantScope;
pub use store::{ArchiveSession, SqliteStore};

use std::sync::Arc;
use wfarchive_core::InstanceIdProvider;
use wfarchive_core::config::{AppConfig, DatabaseConfig, PostgresTarget};

/// Create an archive from configuration.
pub async fn from_config(
    config: &AppConfig,
    instance_id: Arc<dyn InstanceIdProvider>,
) -> ArchiveResult<Arc<dyn WorkflowArchive>> {
    if !config.archive.enabled {
        tracing::info!("Workflow archiving is disabled");
        return Ok(Arc::new(NullWorkflowArchive) as Arc<dyn WorkflowArchive>);
    }

    let database = &config.archive.database;
    database.validate().map_err(ArchiveError::Config)?;

    let scope = TenantScope::new(
        config.cluster_name.clone(),
        config.managed_namespace.clone(),
        instance_id,
    );

    match database {
        DatabaseConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(SqlWorkflowArchive::new(store, scope)) as Arc<dyn WorkflowArchive>)
        }
        DatabaseConfig::Postgres {
            username,
            password,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
            ..
        } => {
            let target = database.postgres_target().map_err(ArchiveError::Config)?;
            let store = match target {
                PostgresTarget::Url(url) => {
                    tracing::info!("Connecting to PostgreSQL using connection URL");
                    PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
                }
                PostgresTarget::Params {
                    host,
                    port,
                    database,
                } => {
                    PostgresStore::from_params(
                        host,
                        port,
                        username.as_deref(),
                        password.as_deref(),
                        database,
                        *ssl_mode,
                        *max_connections,
                        *statement_timeout_ms,
                    )
                    .await?
                }
            };
            Ok(Arc::new(SqlWorkflowArchive::new(store, scope)) as Arc<dyn WorkflowArchive>)
        }
    }
}

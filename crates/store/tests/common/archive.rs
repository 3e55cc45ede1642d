//! Archive test utilities.

use std::sync::Arc;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use wfarchive_core::StaticInstanceId;
use wfarchive_store::dialect::SqlBuilder;
use wfarchive_store::expr::SqlValue;
use wfarchive_store::{
    ArchiveError, ArchiveResult, ArchiveSession, PostgresStore, SqlWorkflowArchive, SqliteStore,
    TenantScope, WorkflowArchive,
};

/// Stable prefix for Docker/container startup failures in Postgres test setup.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// Cluster, namespace and instance of the default test tenant.
pub const CLUSTER: &str = "cluster-a";
pub const INSTANCE: &str = "instance-a";

/// A session shared by any number of tenant-scoped archives.
#[derive(Clone)]
pub enum TestDb {
    Sqlite(SqliteStore),
    Postgres(PostgresStore),
}

#[allow(dead_code)]
impl TestDb {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite(store) => store.dialect().as_str(),
            Self::Postgres(store) => store.dialect().as_str(),
        }
    }

    /// Archive scoped to `(cluster, managed_namespace, instance)`.
    pub fn archive_for(
        &self,
        cluster: &str,
        managed_namespace: &str,
        instance: &str,
    ) -> Arc<dyn WorkflowArchive> {
        let scope = TenantScope::new(
            cluster,
            managed_namespace,
            Arc::new(StaticInstanceId::new(instance)),
        );
        match self {
            Self::Sqlite(store) => {
                Arc::new(SqlWorkflowArchive::new(store.clone(), scope)) as Arc<dyn WorkflowArchive>
            }
            Self::Postgres(store) => {
                Arc::new(SqlWorkflowArchive::new(store.clone(), scope)) as Arc<dyn WorkflowArchive>
            }
        }
    }

    /// Archive of the default test tenant.
    pub fn archive(&self) -> Arc<dyn WorkflowArchive> {
        self.archive_for(CLUSTER, "", INSTANCE)
    }

    /// Label index rows stored for `(cluster, uid)`, regardless of tenant.
    pub async fn label_rows(&self, cluster: &str, uid: &str) -> u64 {
        let dialect = match self {
            Self::Sqlite(store) => store.dialect(),
            Self::Postgres(store) => store.dialect(),
        };
        let mut b = SqlBuilder::new(dialect);
        b.push("SELECT COUNT(*) FROM archived_workflow_labels WHERE cluster_name = ")
            .push_bind(SqlValue::Text(cluster.to_string()))
            .push(" AND uid = ")
            .push_bind(SqlValue::Text(uid.to_string()));
        let statement = b.finish();
        let count = match self {
            Self::Sqlite(store) => store.fetch_count(statement).await,
            Self::Postgres(store) => store.fetch_count(statement).await,
        };
        count.expect("Failed to count label rows")
    }
}

/// SQLite archive database in a temporary directory.
pub struct TestArchive {
    pub db: TestDb,
    _temp_dir: TempDir,
}

impl TestArchive {
    pub async fn new() -> ArchiveResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let store = SqliteStore::new(temp_dir.path().join("archive.db"), None).await?;
        Ok(Self {
            db: TestDb::Sqlite(store),
            _temp_dir: temp_dir,
        })
    }
}

/// PostgreSQL archive database in a testcontainer.
pub struct PostgresTestArchive {
    pub db: TestDb,
    _container: ContainerAsync<Postgres>,
}

impl PostgresTestArchive {
    pub async fn new() -> ArchiveResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                ArchiveError::Config(format!(
                    "{} Failed to start PostgreSQL container: {e}",
                    POSTGRES_CONTAINER_START_ERR_PREFIX
                ))
            })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        // Default credentials from testcontainers-modules postgres
        let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
        let store = PostgresStore::from_url(&url, 5, None).await?;

        Ok(Self {
            db: TestDb::Postgres(store),
            _container: container,
        })
    }
}

/// Run a test against both SQLite and PostgreSQL backends.
///
/// PostgreSQL is skipped when SKIP_POSTGRES_TESTS is set or Docker is unavailable.
#[allow(dead_code)]
pub async fn run_archive_test_both<F, Fut>(test_fn: F)
where
    F: Fn(TestDb) -> Fut + Clone,
    Fut: std::future::Future<Output = ()>,
{
    let sqlite = TestArchive::new()
        .await
        .expect("Failed to create SQLite test archive");
    test_fn.clone()(sqlite.db.clone()).await;

    if std::env::var("SKIP_POSTGRES_TESTS").is_err() {
        match PostgresTestArchive::new().await {
            Ok(postgres) => {
                test_fn(postgres.db.clone()).await;
            }
            Err(err) => {
                let msg = err.to_string();
                if msg.contains(POSTGRES_CONTAINER_START_ERR_PREFIX) {
                    eprintln!("Skipping PostgreSQL archive tests: {msg}");
                } else {
                    panic!("PostgreSQL test setup failed: {msg}");
                }
            }
        }
    }
}

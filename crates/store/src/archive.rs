//! The workflow archive.

use crate::error::{ArchiveError, ArchiveResult};
use crate::expr::Expr;
use crate::filter::WorkflowFilter;
use crate::models::{ArchivedLabelRow, ArchivedWorkflowRow};
use crate::postgres::PostgresStore;
use crate::predicate::{finished_before, name_equal, namespace_equal, uid_equal};
use crate::query::ArchiveQueries;
use crate::scope::TenantScope;
use crate::store::{ArchiveSession, SqliteStore};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use wfarchive_core::{JsonCodec, Workflow, WorkflowCodec};

/// Durable, tenant-scoped store of completed workflows.
#[async_trait]
pub trait WorkflowArchive: Send + Sync {
    /// Store `workflow`, replacing any earlier record with the same uid.
    ///
    /// Concurrent calls for one uid are not serialized. Each call replaces the
    /// record and its labels atomically, but on PostgreSQL a racing call can
    /// fail with a primary key violation ([`ArchiveError::Database`]) and may
    /// be retried by the caller.
    async fn archive_workflow(&self, workflow: &Workflow) -> ArchiveResult<()>;

    /// Matching workflows, most recently started first. A `limit` of zero
    /// returns every match and ignores `offset`.
    async fn list_workflows(
        &self,
        filter: &WorkflowFilter,
        limit: u32,
        offset: u32,
    ) -> ArchiveResult<Vec<Workflow>>;

    async fn count_workflows(&self, filter: &WorkflowFilter) -> ArchiveResult<u64>;

    /// Look up by uid, or by namespace and name when `uid` is empty.
    async fn get_workflow(
        &self,
        uid: &str,
        namespace: &str,
        name: &str,
    ) -> ArchiveResult<Option<Workflow>>;

    /// Returns the number of records removed.
    async fn delete_workflow(&self, uid: &str) -> ArchiveResult<u64>;

    /// Remove workflows that finished more than `ttl` ago by the store's clock.
    async fn delete_expired_workflows(&self, ttl: Duration) -> ArchiveResult<u64>;

    async fn list_label_keys(&self) -> ArchiveResult<BTreeSet<String>>;

    async fn list_label_values(&self, key: &str) -> ArchiveResult<BTreeSet<String>>;

    fn is_enabled(&self) -> bool;

    async fn migrate(&self) -> ArchiveResult<()>;

    async fn health_check(&self) -> ArchiveResult<()>;
}

/// Archive backed by a SQL session.
pub struct SqlWorkflowArchive<S> {
    session: S,
    scope: TenantScope,
    queries: ArchiveQueries,
    codec: Arc<dyn WorkflowCodec>,
}

pub type SqliteWorkflowArchive = SqlWorkflowArchive<SqliteStore>;
pub type PostgresWorkflowArchive = SqlWorkflowArchive<PostgresStore>;

impl<S: ArchiveSession> SqlWorkflowArchive<S> {
    pub fn new(session: S, scope: TenantScope) -> Self {
        let queries = ArchiveQueries::new(session.dialect());
        Self {
            session,
            scope,
            queries,
            codec: Arc::new(JsonCodec),
        }
    }

    /// Replace the body codec.
    pub fn with_codec(mut self, codec: Arc<dyn WorkflowCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn scope(&self) -> &TenantScope {
        &self.scope
    }

    fn decode(&self, body: &[u8]) -> ArchiveResult<Workflow> {
        let mut workflow = self.codec.decode(body)?;
        workflow.stamp_archived();
        Ok(workflow)
    }

    async fn fetch_one(&self, filter: &Expr) -> ArchiveResult<Option<Workflow>> {
        let rows = self
            .session
            .fetch_bodies(self.queries.select_bodies(filter, 1, 0))
            .await?;
        rows.into_iter()
            .next()
            .map(|row| self.decode(&row.workflow))
            .transpose()
    }
}

#[async_trait]
impl<S: ArchiveSession> WorkflowArchive for SqlWorkflowArchive<S> {
    async fn archive_workflow(&self, workflow: &Workflow) -> ArchiveResult<()> {
        if workflow.uid().is_empty() {
            return Err(ArchiveError::InvalidArgument(
                "workflow uid is required".to_string(),
            ));
        }

        let mut wf = workflow.clone();
        wf.stamp_archived();
        let body = self.codec.encode(&wf)?;

        tracing::debug!(
            uid = %wf.uid(),
            labels = wf.labels().len(),
            "Archiving workflow"
        );

        let cluster_name = self.scope.cluster_name();
        let instance_id = self.scope.instance_id();
        let record = ArchivedWorkflowRow::from_workflow(cluster_name, instance_id.clone(), &wf, body);

        let mut statements = vec![
            self.queries.delete_records(
                &self
                    .scope
                    .predicate_for_instance(&instance_id)
                    .and(uid_equal(wf.uid())),
            ),
            self.queries.insert_record(&record),
            self.queries.delete_labels(cluster_name, wf.uid()),
        ];
        statements.extend(
            ArchivedLabelRow::for_workflow(cluster_name, &wf)
                .iter()
                .map(|label| self.queries.insert_label(label)),
        );

        self.session.execute_in_transaction(statements).await?;
        Ok(())
    }

    async fn list_workflows(
        &self,
        filter: &WorkflowFilter,
        limit: u32,
        offset: u32,
    ) -> ArchiveResult<Vec<Workflow>> {
        let predicate = self.scope.predicate().and(filter.predicate()?);
        let rows = self
            .session
            .fetch_bodies(self.queries.select_bodies(&predicate, limit, offset))
            .await?;

        let mut workflows = Vec::with_capacity(rows.len());
        for row in rows {
            match self.decode(&row.workflow) {
                Ok(wf) => workflows.push(wf),
                Err(e) => {
                    tracing::error!(
                        uid = %row.uid,
                        name = %row.name,
                        error = %e,
                        "Unable to decode archived workflow"
                    );
                }
            }
        }
        Ok(workflows)
    }

    async fn count_workflows(&self, filter: &WorkflowFilter) -> ArchiveResult<u64> {
        let predicate = self.scope.predicate().and(filter.predicate()?);
        self.session
            .fetch_count(self.queries.count(&predicate))
            .await
    }

    async fn get_workflow(
        &self,
        uid: &str,
        namespace: &str,
        name: &str,
    ) -> ArchiveResult<Option<Workflow>> {
        if !uid.is_empty() {
            let predicate = self.scope.predicate().and(uid_equal(uid));
            return self.fetch_one(&predicate).await;
        }

        if namespace.is_empty() || name.is_empty() {
            return Err(ArchiveError::InvalidArgument(
                "both name and namespace are required if uid is not specified".to_string(),
            ));
        }

        let predicate = Expr::all([
            self.scope.predicate(),
            namespace_equal(namespace),
            name_equal(name),
        ]);
        let count = self
            .session
            .fetch_count(self.queries.count(&predicate))
            .await?;
        if count > 1 {
            return Err(ArchiveError::AmbiguousResult {
                count,
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        self.fetch_one(&predicate).await
    }

    async fn delete_workflow(&self, uid: &str) -> ArchiveResult<u64> {
        let predicate = self.scope.predicate().and(uid_equal(uid));
        let affected = self
            .session
            .execute_in_transaction(vec![
                self.queries.delete_records(&predicate),
                self.queries
                    .delete_orphan_labels(self.scope.cluster_name(), Some(uid)),
            ])
            .await?;

        let rows_affected = affected.first().copied().unwrap_or(0);
        tracing::debug!(uid = %uid, rows_affected, "Deleted archived workflow");
        Ok(rows_affected)
    }

    async fn delete_expired_workflows(&self, ttl: Duration) -> ArchiveResult<u64> {
        let predicate = self.scope.predicate().and(finished_before(ttl));
        let affected = self
            .session
            .execute_in_transaction(vec![
                self.queries.delete_records(&predicate),
                self.queries
                    .delete_orphan_labels(self.scope.cluster_name(), None),
            ])
            .await?;

        let rows_affected = affected.first().copied().unwrap_or(0);
        tracing::info!(
            rows_affected,
            ttl_secs = ttl.as_secs(),
            "Deleted expired archived workflows"
        );
        Ok(rows_affected)
    }

    async fn list_label_keys(&self) -> ArchiveResult<BTreeSet<String>> {
        let keys = self
            .session
            .fetch_strings(self.queries.label_keys(&self.scope.predicate()))
            .await?;
        Ok(keys.into_iter().collect())
    }

    async fn list_label_values(&self, key: &str) -> ArchiveResult<BTreeSet<String>> {
        let values = self
            .session
            .fetch_strings(self.queries.label_values(&self.scope.predicate(), key))
            .await?;
        Ok(values.into_iter().collect())
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn migrate(&self) -> ArchiveResult<()> {
        self.session.migrate().await
    }

    async fn health_check(&self) -> ArchiveResult<()> {
        self.session.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfarchive_core::StaticInstanceId;

    async fn sqlite_archive(dir: &tempfile::TempDir) -> SqliteWorkflowArchive {
        let store = SqliteStore::new(dir.path().join("archive.db"), None)
            .await
            .unwrap();
        let scope = TenantScope::new("c1", "", Arc::new(StaticInstanceId::new("i1")));
        SqlWorkflowArchive::new(store, scope)
    }

    struct FailingCodec;

    impl WorkflowCodec for FailingCodec {
        fn encode(&self, _: &Workflow) -> wfarchive_core::Result<Vec<u8>> {
            Err(wfarchive_core::Error::Encoding("refused".to_string()))
        }

        fn decode(&self, _: &[u8]) -> wfarchive_core::Result<Workflow> {
            Err(wfarchive_core::Error::Encoding("refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_empty_uid_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = sqlite_archive(&dir).await;
        let err = archive
            .archive_workflow(&Workflow::new("", "argo", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_encoding_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let archive = sqlite_archive(&dir).await.with_codec(Arc::new(FailingCodec));
        let err = archive
            .archive_workflow(&Workflow::new("u1", "argo", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Encoding(_)));
        assert_eq!(
            archive.count_workflows(&WorkflowFilter::new()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_undecodable_rows_are_skipped_by_list() {
        let dir = tempfile::tempdir().unwrap();
        let archive = sqlite_archive(&dir).await;
        archive
            .archive_workflow(&Workflow::new("u1", "argo", "hello"))
            .await
            .unwrap();

        let broken = SqlWorkflowArchive {
            codec: Arc::new(FailingCodec),
            ..archive
        };
        let listed = broken
            .list_workflows(&WorkflowFilter::new(), 0, 0)
            .await
            .unwrap();
        assert!(listed.is_empty());
        assert_eq!(
            broken.count_workflows(&WorkflowFilter::new()).await.unwrap(),
            1
        );

        // A single lookup surfaces the failure instead.
        let err = broken.get_workflow("u1", "", "").await.unwrap_err();
        assert!(matches!(err, ArchiveError::Encoding(_)));
    }

    #[tokio::test]
    async fn test_stored_workflow_is_not_mutated() {
        let dir = tempfile::tempdir().unwrap();
        let archive = sqlite_archive(&dir).await;
        let wf = Workflow::new("u1", "argo", "hello");
        archive.archive_workflow(&wf).await.unwrap();
        assert!(!wf.is_archived());

        let got = archive.get_workflow("u1", "", "").await.unwrap().unwrap();
        assert!(got.is_archived());
    }
}

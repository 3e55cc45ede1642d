//! Archive used when archiving is disabled.

use crate::archive::WorkflowArchive;
use crate::error::ArchiveResult;
use crate::filter::WorkflowFilter;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use wfarchive_core::Workflow;

/// Persists nothing and finds nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullWorkflowArchive;

#[async_trait]
impl WorkflowArchive for NullWorkflowArchive {
    async fn archive_workflow(&self, _workflow: &Workflow) -> ArchiveResult<()> {
        Ok(())
    }

    async fn list_workflows(
        &self,
        _filter: &WorkflowFilter,
        _limit: u32,
        _offset: u32,
    ) -> ArchiveResult<Vec<Workflow>> {
        Ok(Vec::new())
    }

    async fn count_workflows(&self, _filter: &WorkflowFilter) -> ArchiveResult<u64> {
        Ok(0)
    }

    async fn get_workflow(
        &self,
        _uid: &str,
        _namespace: &str,
        _name: &str,
    ) -> ArchiveResult<Option<Workflow>> {
        Ok(None)
    }

    async fn delete_workflow(&self, _uid: &str) -> ArchiveResult<u64> {
        Ok(0)
    }

    async fn delete_expired_workflows(&self, _ttl: Duration) -> ArchiveResult<u64> {
        Ok(0)
    }

    async fn list_label_keys(&self) -> ArchiveResult<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    async fn list_label_values(&self, _key: &str) -> ArchiveResult<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn migrate(&self) -> ArchiveResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> ArchiveResult<()> {
        Ok(())
    }
}

//! Database models mapping to the archive schema.

use crate::predicate::to_utc;
use sqlx::FromRow;
use time::OffsetDateTime;
use wfarchive_core::Workflow;

// =============================================================================
// Archived workflows
// =============================================================================

/// Indexed columns and body of one archived workflow, as written.
#[derive(Debug, Clone)]
pub struct ArchivedWorkflowRow {
    pub cluster_name: String,
    pub instance_id: String,
    pub uid: String,
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub workflow: Vec<u8>,
}

impl ArchivedWorkflowRow {
    /// Build the record for `wf` with an already encoded body.
    ///
    /// Missing timestamps are indexed as the Unix epoch.
    pub fn from_workflow(
        cluster_name: &str,
        instance_id: String,
        wf: &Workflow,
        workflow: Vec<u8>,
    ) -> Self {
        let status = &wf.status;
        Self {
            cluster_name: cluster_name.to_string(),
            instance_id,
            uid: wf.uid().to_string(),
            name: wf.name().to_string(),
            namespace: wf.namespace().to_string(),
            phase: status.phase.as_str().to_string(),
            started_at: to_utc(status.started_at.unwrap_or(OffsetDateTime::UNIX_EPOCH)),
            finished_at: to_utc(status.finished_at.unwrap_or(OffsetDateTime::UNIX_EPOCH)),
            workflow,
        }
    }
}

/// Body of an archived workflow as read back by list and get.
#[derive(Debug, Clone, FromRow)]
pub struct ArchivedWorkflowBody {
    pub uid: String,
    pub name: String,
    pub workflow: Vec<u8>,
}

// =============================================================================
// Label index
// =============================================================================

/// One label of an archived workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedLabelRow {
    pub cluster_name: String,
    pub uid: String,
    pub label_key: String,
    pub label_value: String,
}

impl ArchivedLabelRow {
    /// Label rows for every label currently on `wf`.
    pub fn for_workflow(cluster_name: &str, wf: &Workflow) -> Vec<Self> {
        wf.labels()
            .iter()
            .map(|(key, value)| Self {
                cluster_name: cluster_name.to_string(),
                uid: wf.uid().to_string(),
                label_key: key.clone(),
                label_value: value.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use wfarchive_core::WorkflowPhase;

    #[test]
    fn test_missing_timestamps_are_epoch() {
        let wf = Workflow::new("u1", "argo", "hello");
        let row = ArchivedWorkflowRow::from_workflow("c1", "i1".to_string(), &wf, vec![]);
        assert_eq!(row.started_at, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(row.finished_at, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(row.phase, "");
    }

    #[test]
    fn test_timestamps_are_normalized_to_utc() {
        let mut wf = Workflow::new("u1", "argo", "hello");
        wf.status.phase = WorkflowPhase::Succeeded;
        wf.status.started_at = Some(datetime!(2024-05-01 12:00:00 +02:00));
        let row = ArchivedWorkflowRow::from_workflow("c1", "i1".to_string(), &wf, vec![]);
        assert_eq!(row.started_at, datetime!(2024-05-01 10:00:00 UTC));
        assert_eq!(row.started_at.offset(), time::UtcOffset::UTC);
        assert_eq!(row.phase, "Succeeded");
    }

    #[test]
    fn test_label_rows() {
        let mut wf = Workflow::new("u1", "argo", "hello");
        wf.metadata.labels.insert("a".to_string(), "1".to_string());
        wf.metadata.labels.insert("b".to_string(), "2".to_string());
        let rows = ArchivedLabelRow::for_workflow("c1", &wf);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label_key, "a");
        assert_eq!(rows[1].label_value, "2");
        assert!(rows.iter().all(|r| r.uid == "u1" && r.cluster_name == "c1"));
    }
}

//! Workflow object model and body codec.
//!
//! The archive only reads the identity, label and timing fields. Everything
//! else is carried through `extra` maps so that a decoded body re-encodes to
//! the same document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// Label stamped onto every workflow written to or read from the archive.
pub const ARCHIVING_STATUS_LABEL: &str = "workflows.argoproj.io/workflow-archiving-status";

/// Value of [`ARCHIVING_STATUS_LABEL`] for archived workflows.
pub const ARCHIVING_STATUS_PERSISTED: &str = "Persisted";

/// Lifecycle phase of a workflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowPhase {
    #[default]
    #[serde(rename = "")]
    Unknown,
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object metadata of a workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMeta {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Observed status of a workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default)]
    pub phase: WorkflowPhase,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub finished_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A workflow as handed to and returned from the archive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub metadata: WorkflowMeta,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workflow {
    /// Create a workflow with the given identity and no status.
    pub fn new(
        uid: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            metadata: WorkflowMeta {
                uid: uid.into(),
                name: name.into(),
                namespace: namespace.into(),
                ..WorkflowMeta::default()
            },
            ..Self::default()
        }
    }

    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }

    /// Mark the workflow as coming from the archive.
    pub fn stamp_archived(&mut self) {
        self.metadata.labels.insert(
            ARCHIVING_STATUS_LABEL.to_string(),
            ARCHIVING_STATUS_PERSISTED.to_string(),
        );
    }

    /// Whether the archival-status marker is present.
    pub fn is_archived(&self) -> bool {
        self.metadata
            .labels
            .get(ARCHIVING_STATUS_LABEL)
            .is_some_and(|v| v == ARCHIVING_STATUS_PERSISTED)
    }
}

/// Serializes workflow bodies for storage.
pub trait WorkflowCodec: Send + Sync {
    /// Encode a workflow into its stored form.
    fn encode(&self, workflow: &Workflow) -> crate::Result<Vec<u8>>;

    /// Decode a stored body.
    fn decode(&self, body: &[u8]) -> crate::Result<Workflow>;
}

/// JSON body codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl WorkflowCodec for JsonCodec {
    fn encode(&self, workflow: &Workflow) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(workflow)?)
    }

    fn decode(&self, body: &[u8]) -> crate::Result<Workflow> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_json_codec_preserves_unknown_fields() {
        let body = br#"{
            "apiVersion": "argoproj.io/v1alpha1",
            "kind": "Workflow",
            "metadata": {
                "uid": "u-1",
                "name": "hello",
                "namespace": "argo",
                "labels": {"team": "infra"},
                "generation": 3
            },
            "spec": {"entrypoint": "main"},
            "status": {
                "phase": "Succeeded",
                "startedAt": "2024-05-01T10:00:00Z",
                "finishedAt": "2024-05-01T10:05:00Z",
                "progress": "1/1"
            }
        }"#;

        let wf = JsonCodec.decode(body).unwrap();
        assert_eq!(wf.uid(), "u-1");
        assert_eq!(wf.status.phase, WorkflowPhase::Succeeded);
        assert_eq!(wf.status.started_at, Some(datetime!(2024-05-01 10:00:00 UTC)));
        assert_eq!(wf.extra["spec"]["entrypoint"], "main");
        assert_eq!(wf.metadata.extra["generation"], 3);
        assert_eq!(wf.status.extra["progress"], "1/1");

        let reencoded = JsonCodec.encode(&wf).unwrap();
        let again = JsonCodec.decode(&reencoded).unwrap();
        assert_eq!(wf, again);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = JsonCodec.decode(b"not json").unwrap_err();
        assert!(matches!(err, crate::Error::Encoding(_)));
    }

    #[test]
    fn test_stamp_archived() {
        let mut wf = Workflow::new("u-1", "argo", "hello");
        assert!(!wf.is_archived());
        wf.stamp_archived();
        assert!(wf.is_archived());
        assert_eq!(wf.labels().len(), 1);
    }

    #[test]
    fn test_unknown_phase_is_empty_string() {
        let wf: Workflow = serde_json::from_str(r#"{"status": {"phase": ""}}"#).unwrap();
        assert_eq!(wf.status.phase, WorkflowPhase::Unknown);
        assert_eq!(wf.status.phase.to_string(), "");
    }
}

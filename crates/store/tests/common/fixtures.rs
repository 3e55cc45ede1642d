//! Workflow fixtures.

use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use wfarchive_core::{Workflow, WorkflowPhase};

/// Start time shared by fixtures that need a deterministic order.
pub const BASE_TIME: OffsetDateTime = datetime!(2024-05-01 00:00:00 UTC);

/// A succeeded workflow started `minutes` after [`BASE_TIME`] and finished a
/// minute later.
#[allow(dead_code)]
pub fn workflow(uid: &str, namespace: &str, name: &str, minutes: i64) -> Workflow {
    let mut wf = Workflow::new(uid, namespace, name);
    wf.status.phase = WorkflowPhase::Succeeded;
    wf.status.started_at = Some(BASE_TIME + Duration::minutes(minutes));
    wf.status.finished_at = Some(BASE_TIME + Duration::minutes(minutes + 1));
    wf
}

/// Same as [`workflow`] with the given labels.
#[allow(dead_code)]
pub fn labeled(uid: &str, name: &str, minutes: i64, labels: &[(&str, &str)]) -> Workflow {
    let mut wf = workflow(uid, "argo", name, minutes);
    for (key, value) in labels {
        wf.metadata
            .labels
            .insert((*key).to_string(), (*value).to_string());
    }
    wf
}

/// A workflow that finished `age` before now.
#[allow(dead_code)]
pub fn finished_ago(uid: &str, age: Duration) -> Workflow {
    let finished = OffsetDateTime::now_utc() - age;
    let mut wf = Workflow::new(uid, "argo", uid);
    wf.status.phase = WorkflowPhase::Failed;
    wf.status.started_at = Some(finished - Duration::minutes(5));
    wf.status.finished_at = Some(finished);
    wf
}

/// Uids of `workflows`, in order.
#[allow(dead_code)]
pub fn uids(workflows: &[Workflow]) -> Vec<String> {
    workflows.iter().map(|wf| wf.uid().to_string()).collect()
}

/// A uid unique to this test run.
#[allow(dead_code)]
pub fn fresh_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

//! Statements issued by the archive, rendered for one dialect.

use crate::dialect::{Compiled, Dialect, SqlBuilder};
use crate::expr::{ARCHIVE_TABLE, Expr, LABELS_TABLE, SqlValue};
use crate::models::{ArchivedLabelRow, ArchivedWorkflowRow};

/// Builds archive statements for a dialect.
#[derive(Clone, Copy, Debug)]
pub struct ArchiveQueries {
    dialect: Dialect,
}

impl ArchiveQueries {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    fn builder(&self) -> SqlBuilder {
        SqlBuilder::new(self.dialect)
    }

    /// Bodies matching `filter`, most recently started first.
    pub fn select_bodies(&self, filter: &Expr, limit: u32, offset: u32) -> Compiled {
        let mut b = self.builder();
        b.push("SELECT uid, name, workflow FROM ")
            .push(ARCHIVE_TABLE)
            .push(" WHERE ")
            .push_expr(filter)
            .push_order_by_started_desc()
            .push_page(limit, offset);
        b.finish()
    }

    pub fn count(&self, filter: &Expr) -> Compiled {
        let mut b = self.builder();
        b.push("SELECT COUNT(*) FROM ")
            .push(ARCHIVE_TABLE)
            .push(" WHERE ")
            .push_expr(filter);
        b.finish()
    }

    pub fn delete_records(&self, filter: &Expr) -> Compiled {
        let mut b = self.builder();
        b.push("DELETE FROM ")
            .push(ARCHIVE_TABLE)
            .push(" WHERE ")
            .push_expr(filter);
        b.finish()
    }

    pub fn insert_record(&self, row: &ArchivedWorkflowRow) -> Compiled {
        let mut b = self.builder();
        b.push("INSERT INTO ")
            .push(ARCHIVE_TABLE)
            .push(
                " (cluster_name, instance_id, uid, name, namespace, phase, \
                 started_at, finished_at, workflow) VALUES (",
            )
            .push_bind_list([
                SqlValue::Text(row.cluster_name.clone()),
                SqlValue::Text(row.instance_id.clone()),
                SqlValue::Text(row.uid.clone()),
                SqlValue::Text(row.name.clone()),
                SqlValue::Text(row.namespace.clone()),
                SqlValue::Text(row.phase.clone()),
                SqlValue::Timestamp(row.started_at),
                SqlValue::Timestamp(row.finished_at),
                SqlValue::Bytes(row.workflow.clone()),
            ])
            .push(")");
        b.finish()
    }

    /// Every label row of one workflow.
    pub fn delete_labels(&self, cluster_name: &str, uid: &str) -> Compiled {
        let mut b = self.builder();
        b.push("DELETE FROM ")
            .push(LABELS_TABLE)
            .push(" WHERE cluster_name = ")
            .push_bind(SqlValue::Text(cluster_name.to_string()))
            .push(" AND uid = ")
            .push_bind(SqlValue::Text(uid.to_string()));
        b.finish()
    }

    pub fn insert_label(&self, row: &ArchivedLabelRow) -> Compiled {
        let mut b = self.builder();
        b.push("INSERT INTO ")
            .push(LABELS_TABLE)
            .push(" (cluster_name, uid, label_key, label_value) VALUES (")
            .push_bind_list([
                SqlValue::Text(row.cluster_name.clone()),
                SqlValue::Text(row.uid.clone()),
                SqlValue::Text(row.label_key.clone()),
                SqlValue::Text(row.label_value.clone()),
            ])
            .push(")");
        b.finish()
    }

    /// Label rows of the cluster whose record no longer exists, optionally
    /// limited to one uid.
    pub fn delete_orphan_labels(&self, cluster_name: &str, uid: Option<&str>) -> Compiled {
        let mut b = self.builder();
        b.push("DELETE FROM ")
            .push(LABELS_TABLE)
            .push(" WHERE cluster_name = ")
            .push_bind(SqlValue::Text(cluster_name.to_string()));
        if let Some(uid) = uid {
            b.push(" AND uid = ").push_bind(SqlValue::Text(uid.to_string()));
        }
        b.push(" AND NOT EXISTS (SELECT 1 FROM ")
            .push(ARCHIVE_TABLE)
            .push(" w WHERE w.cluster_name = ")
            .push(LABELS_TABLE)
            .push(".cluster_name AND w.uid = ")
            .push(LABELS_TABLE)
            .push(".uid)");
        b.finish()
    }

    /// Distinct label keys of the records matching `scope`.
    pub fn label_keys(&self, scope: &Expr) -> Compiled {
        let mut b = self.builder();
        b.push("SELECT DISTINCT l.label_key FROM ")
            .push(LABELS_TABLE)
            .push(" l WHERE ");
        self.push_visible_record(&mut b, scope);
        b.push(" ORDER BY l.label_key");
        b.finish()
    }

    /// Distinct values of label `key` on the records matching `scope`.
    pub fn label_values(&self, scope: &Expr, key: &str) -> Compiled {
        let mut b = self.builder();
        b.push("SELECT DISTINCT l.label_value FROM ")
            .push(LABELS_TABLE)
            .push(" l WHERE l.label_key = ")
            .push_bind(SqlValue::Text(key.to_string()))
            .push(" AND ");
        self.push_visible_record(&mut b, scope);
        b.push(" ORDER BY l.label_value");
        b.finish()
    }

    fn push_visible_record(&self, b: &mut SqlBuilder, scope: &Expr) {
        b.push("EXISTS (SELECT 1 FROM ")
            .push(ARCHIVE_TABLE)
            .push(" WHERE ")
            .push(ARCHIVE_TABLE)
            .push(".cluster_name = l.cluster_name AND ")
            .push(ARCHIVE_TABLE)
            .push(".uid = l.uid AND ")
            .push_expr(scope)
            .push(")");
    }
}

//! Backend-neutral conditional expressions over the archive tables.
//!
//! Expressions are rendered to SQL by [`crate::dialect::SqlBuilder`].

use time::OffsetDateTime;

/// Records table.
pub const ARCHIVE_TABLE: &str = "archived_workflows";

/// Label index table.
pub const LABELS_TABLE: &str = "archived_workflow_labels";

/// A bound query parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Bytes(Vec<u8>),
    Timestamp(OffsetDateTime),
    TextArray(Vec<String>),
}

/// Columns of the records table that predicates may reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    ClusterName,
    InstanceId,
    Uid,
    Name,
    Namespace,
    StartedAt,
    FinishedAt,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClusterName => "cluster_name",
            Self::InstanceId => "instance_id",
            Self::Uid => "uid",
            Self::Name => "name",
            Self::Namespace => "namespace",
            Self::StartedAt => "started_at",
            Self::FinishedAt => "finished_at",
        }
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Lt,
    Gt,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

/// Test applied to the value of a matching label row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelTest {
    /// Any value.
    Any,
    Equals(String),
    In(Vec<String>),
    GreaterThan(i64),
    LessThan(i64),
}

/// A conditional expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    True,
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        column: Column,
        op: CmpOp,
        value: SqlValue,
    },
    /// Case-sensitive prefix match on a text column.
    StartsWith { column: Column, prefix: String },
    /// Whether the record has (`present`) or lacks a label row with `key`
    /// whose value passes `test`.
    Label {
        present: bool,
        key: String,
        test: LabelTest,
    },
    /// `finished_at` is older than the store's current time minus `ttl_secs`.
    FinishedBefore { ttl_secs: i64 },
}

impl Expr {
    pub fn eq(column: Column, value: SqlValue) -> Self {
        Self::Compare {
            column,
            op: CmpOp::Eq,
            value,
        }
    }

    /// Conjunction of `exprs`, flattening nested conjunctions and dropping
    /// always-true operands.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let mut terms = Vec::new();
        for expr in exprs {
            match expr {
                Self::True => {}
                Self::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Self::True,
            1 => terms.remove(0),
            _ => Self::And(terms),
        }
    }

    /// `self AND other`.
    pub fn and(self, other: Expr) -> Self {
        Self::all([self, other])
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

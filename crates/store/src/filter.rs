//! Filters accepted by list and count.

use crate::error::ArchiveResult;
use crate::expr::Expr;
use crate::predicate::{name_equal, name_prefix, namespace_equal, started_at_range};
use crate::selector::label_predicate;
use time::OffsetDateTime;
use wfarchive_core::LabelRequirement;

/// Optional constraints on listed workflows. Empty strings and unset bounds
/// do not constrain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowFilter {
    pub namespace: String,
    pub name: String,
    pub name_prefix: String,
    pub min_started_at: Option<OffsetDateTime>,
    pub max_started_at: Option<OffsetDateTime>,
    pub label_requirements: Vec<LabelRequirement>,
}

impl WorkflowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Only workflows started strictly after `at`.
    pub fn started_after(mut self, at: OffsetDateTime) -> Self {
        self.min_started_at = Some(at);
        self
    }

    /// Only workflows started strictly before `at`.
    pub fn started_before(mut self, at: OffsetDateTime) -> Self {
        self.max_started_at = Some(at);
        self
    }

    pub fn label(mut self, requirement: LabelRequirement) -> Self {
        self.label_requirements.push(requirement);
        self
    }

    pub fn labels(mut self, requirements: impl IntoIterator<Item = LabelRequirement>) -> Self {
        self.label_requirements.extend(requirements);
        self
    }

    /// Predicate for everything but the tenant scope.
    pub fn predicate(&self) -> ArchiveResult<Expr> {
        Ok(Expr::all([
            namespace_equal(&self.namespace),
            name_equal(&self.name),
            name_prefix(&self.name_prefix),
            started_at_range(self.min_started_at, self.max_started_at),
            label_predicate(&self.label_requirements)?,
        ]))
    }
}

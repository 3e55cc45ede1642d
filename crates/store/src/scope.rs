//! Tenant scoping.

use crate::expr::{Column, Expr, SqlValue};
use crate::predicate::namespace_equal;
use std::fmt;
use std::sync::Arc;
use wfarchive_core::InstanceIdProvider;

/// The cluster, managed namespace and owning instance that every archive
/// operation is confined to.
#[derive(Clone)]
pub struct TenantScope {
    cluster_name: String,
    managed_namespace: String,
    instance_id: Arc<dyn InstanceIdProvider>,
}

impl TenantScope {
    pub fn new(
        cluster_name: impl Into<String>,
        managed_namespace: impl Into<String>,
        instance_id: Arc<dyn InstanceIdProvider>,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            managed_namespace: managed_namespace.into(),
            instance_id,
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn managed_namespace(&self) -> &str {
        &self.managed_namespace
    }

    /// Current owning instance. Read from the provider on every call.
    pub fn instance_id(&self) -> String {
        self.instance_id.instance_id()
    }

    /// `cluster_name = ? AND instance_id = ?`, plus the managed namespace when set.
    pub fn predicate(&self) -> Expr {
        self.predicate_for_instance(&self.instance_id())
    }

    /// Scope predicate for an instance identifier the caller already read.
    pub fn predicate_for_instance(&self, instance_id: &str) -> Expr {
        Expr::all([
            Expr::eq(
                Column::ClusterName,
                SqlValue::Text(self.cluster_name.clone()),
            ),
            namespace_equal(&self.managed_namespace),
            Expr::eq(Column::InstanceId, SqlValue::Text(instance_id.to_string())),
        ])
    }
}

impl fmt::Debug for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantScope")
            .field("cluster_name", &self.cluster_name)
            .field("managed_namespace", &self.managed_namespace)
            .field("instance_id", &self.instance_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wfarchive_core::StaticInstanceId;

    fn text(v: &str) -> SqlValue {
        SqlValue::Text(v.to_string())
    }

    #[test]
    fn test_unmanaged_namespace_is_not_constrained() {
        let scope = TenantScope::new("c1", "", Arc::new(StaticInstanceId::new("i1")));
        assert_eq!(
            scope.predicate(),
            Expr::And(vec![
                Expr::eq(Column::ClusterName, text("c1")),
                Expr::eq(Column::InstanceId, text("i1")),
            ])
        );
    }

    #[test]
    fn test_managed_namespace() {
        let scope = TenantScope::new("c1", "argo", Arc::new(StaticInstanceId::new("")));
        assert_eq!(
            scope.predicate(),
            Expr::And(vec![
                Expr::eq(Column::ClusterName, text("c1")),
                Expr::eq(Column::Namespace, text("argo")),
                Expr::eq(Column::InstanceId, text("")),
            ])
        );
    }

    struct Rotating(Mutex<u32>);

    impl InstanceIdProvider for Rotating {
        fn instance_id(&self) -> String {
            let mut n = self.0.lock().unwrap();
            *n += 1;
            format!("i{n}")
        }
    }

    #[test]
    fn test_instance_id_is_read_per_call() {
        let scope = TenantScope::new("c1", "", Arc::new(Rotating(Mutex::new(0))));
        assert_eq!(scope.instance_id(), "i1");
        assert_eq!(scope.instance_id(), "i2");
    }
}

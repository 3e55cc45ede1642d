//! Instance ownership.

/// Supplies the identifier of the controller instance that owns archived records.
///
/// The archive reads the identifier on every operation, so implementations may
/// change it over time.
pub trait InstanceIdProvider: Send + Sync {
    fn instance_id(&self) -> String;
}

/// A fixed instance identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaticInstanceId(String);

impl StaticInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl InstanceIdProvider for StaticInstanceId {
    fn instance_id(&self) -> String {
        self.0.clone()
    }
}

//! Core types for the workflow archive.
//!
//! This crate defines the data model shared by the store and the CLI:
//! - The workflow object and its body codec
//! - Label requirements and label selector parsing
//! - The instance ownership provider
//! - Configuration

pub mod config;
pub mod error;
pub mod instance;
pub mod selector;
pub mod workflow;

pub use error::{Error, Result};
pub use instance::{InstanceIdProvider, StaticInstanceId};
pub use selector::{LabelRequirement, Operator};
pub use workflow::{
    ARCHIVING_STATUS_LABEL, ARCHIVING_STATUS_PERSISTED, JsonCodec, Workflow, WorkflowCodec,
    WorkflowMeta, WorkflowPhase, WorkflowStatus,
};

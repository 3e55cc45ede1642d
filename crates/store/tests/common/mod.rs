//! Common test utilities and fixtures.

pub mod archive;
pub mod fixtures;

#[allow(unused_imports)]
pub use archive::*;
#[allow(unused_imports)]
pub use fixtures::*;

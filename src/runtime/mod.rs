//! Store registry support.
//!
//! This module provides the registry that owns every store entry, the event
//! bus stores publish on, and the global and scoped registry contexts.

mod registry;

pub use registry::{Registry, RegistryConfig, DATA_LOADED};

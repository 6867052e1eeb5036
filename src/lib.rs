//! # Glassbil
//!
//! Named, action-driven state stores with immutable snapshots.
//!
//! Glassbil keeps application state in a [`Registry`] of named entries. Each
//! entry is read and written through a [`Store`] handle:
//!
//! ## Stores
//!
//! - `Store` - Named state container driven by registered actions
//! - `Actions` - Transition functions, sync or completed later through a `Continuation`
//! - `Unwatch` - Handle for a watch on one path of a store's snapshot
//!
//! ## Snapshots and events
//!
//! - `Frozen` - Immutable, cheaply cloned view over a JSON state tree
//! - `EventBus` - Named-channel publish/subscribe with stoppable propagation
//! - `global:data-loaded` - Fired once every registered store has loaded
//!
//! ## Outer surfaces
//!
//! - [`devtools`] - Bridge to an external time-travel inspector
//! - [`worker`] - Run a store on a background thread behind a stub

pub mod bus;
pub mod devtools;
pub mod error;
pub mod frozen;
pub mod runtime;
pub mod store;
pub mod worker;

// Re-export main types for convenience
pub use bus::{Event, EventBus, ListenerId, Propagation};
pub use error::{Result, StoreError};
pub use frozen::{Frozen, Path, Segment};
pub use runtime::{Registry, RegistryConfig, DATA_LOADED};
pub use store::{
    channel_name, Actions, Continuation, Dispatch, Store, StoreBuilder, StoreKind, Transition,
    Unwatch, CHANGED, SET_STATE,
};

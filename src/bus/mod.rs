//! Named-channel publish/subscribe.
//!
//! Every store publishes its change notifications through an [`EventBus`]
//! shared by the registry that owns it.

mod bus;

pub use bus::{Event, EventBus, ListenerId, Propagation};

//! Named, action-driven state stores.
//!
//! A [`Store`] is a handle onto one named entry of a
//! [`Registry`](crate::Registry). State changes only through registered
//! actions or an explicit [`Store::set_state`], and every genuine change is
//! announced on the store's `changed` channel.

mod action;
mod store;
mod watch;

pub use action::{Actions, Continuation, Dispatch, Transition};
pub use store::{channel_name, Store, StoreBuilder, StoreKind, CHANGED, SET_STATE};
pub use watch::Unwatch;

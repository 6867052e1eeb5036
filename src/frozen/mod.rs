//! Read-only views over shared state trees.
//!
//! A [`Frozen`] wraps a `serde_json::Value` behind an `Arc` and hands out
//! further views for children on demand. [`Path`] parses the dot-separated
//! accessors used by store watches.

mod frozen;
mod path;

pub use frozen::Frozen;
pub use path::{Path, Segment};

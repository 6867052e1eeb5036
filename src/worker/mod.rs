//! Running a store on a background thread.
//!
//! [`spawn`] moves a store onto its own thread and hands back a
//! [`WorkerStub`] with the same surface. The two ends talk over a pair of
//! channels carrying the JSON messages in [`protocol`].

mod host;
pub mod protocol;
mod stub;

pub use host::{serve, spawn};
pub use protocol::{ActionMessage, Request, Response};
pub use stub::WorkerStub;

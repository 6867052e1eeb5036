//! Bridge between a store and an external time-travel inspector.
//!
//! The inspector itself is abstracted behind [`InspectorExtension`] and
//! [`InspectorSession`]; [`attach`] wires a store to one.

mod devtools;

pub use devtools::{
    attach, ConnectOptions, DevtoolsHandle, Features, InspectorExtension, InspectorMessage,
    InspectorPayload, InspectorSession, MessageHandler,
};

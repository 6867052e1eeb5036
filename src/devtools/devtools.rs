use crate::bus::{Event, ListenerId};
use crate::store::{Store, CHANGED, SET_STATE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capabilities requested when opening a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Features {
    pub skip: bool,
}

/// Arguments to [`InspectorExtension::connect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectOptions {
    pub name: String,
    pub features: Features,
}

/// Inner payload of an inspector message, e.g. `{"type": "JUMP_TO_STATE"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InspectorPayload {
    #[serde(rename = "type")]
    pub kind: String,
}

/// A message sent from the inspector to the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InspectorMessage {
    #[serde(rename = "type")]
    pub kind: String,
    /// The state to adopt, JSON-encoded.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub payload: Option<InspectorPayload>,
}

pub type MessageHandler = Box<dyn Fn(InspectorMessage) + Send + Sync>;

/// One open connection to a time-travel inspector.
pub trait InspectorSession: Send + Sync {
    /// Route inspector messages to `on_message`.
    fn subscribe(&self, on_message: MessageHandler);

    /// Report the state the store starts from.
    fn init(&self, state: &Value);

    /// Report a change made by `action`.
    fn send(&self, action: &str, state: &Value);
}

/// Entry point of an inspector, e.g. a browser extension bridge.
pub trait InspectorExtension {
    fn connect(&self, options: ConnectOptions) -> Arc<dyn InspectorSession>;
}

/// Attachment of a store to an inspector session.
#[derive(Clone)]
pub struct DevtoolsHandle {
    session: Arc<dyn InspectorSession>,
    listener: ListenerId,
}

impl DevtoolsHandle {
    pub fn session(&self) -> &Arc<dyn InspectorSession> {
        &self.session
    }

    /// The `changed` listener that forwards changes to the session.
    pub fn listener(&self) -> ListenerId {
        self.listener
    }
}

impl fmt::Debug for DevtoolsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevtoolsHandle")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

/// Connect `store` to an inspector.
///
/// Without an extension this logs a warning and returns `None`. A store that
/// is already attached keeps its session and gets the same handle back.
///
/// States the inspector asks the store to jump to are adopted without being
/// echoed back; every other change is sent as `(action, plain state)`.
pub fn attach(store: &Store, extension: Option<&dyn InspectorExtension>) -> Option<DevtoolsHandle> {
    if let Some(handle) = store.inspector.get() {
        return Some(handle.clone());
    }
    let Some(extension) = extension else {
        tracing::warn!(store = store.name(), "no inspector extension available");
        return None;
    };

    let session = extension.connect(ConnectOptions {
        name: store.name().to_string(),
        features: Features { skip: false },
    });
    let ignore_next = Arc::new(AtomicBool::new(false));

    let target = store.clone();
    let ignore = ignore_next.clone();
    session.subscribe(Box::new(move |message| {
        adopt(&target, &ignore, message);
    }));
    session.init(&store.data().to_value());

    let outgoing = session.clone();
    let ignore = ignore_next;
    let listener = store.on(CHANGED, move |event: &Event| {
        if ignore.swap(false, Ordering::SeqCst) {
            return;
        }
        let action = event.action.as_deref().unwrap_or(SET_STATE);
        outgoing.send(action, &event.payload.to_value());
    });

    let handle = DevtoolsHandle { session, listener };
    if store.inspector.set(handle.clone()).is_err() {
        store.off(CHANGED, listener);
        return store.inspector.get().cloned();
    }
    tracing::debug!(store = store.name(), "attached inspector session");
    Some(handle)
}

fn adopt(store: &Store, ignore: &AtomicBool, message: InspectorMessage) {
    if message.kind != "DISPATCH" {
        return;
    }
    let Some(encoded) = message.state else {
        return;
    };
    let kind = message.payload.map(|payload| payload.kind).unwrap_or_default();
    if kind == "TOGGLE_ACTION" {
        tracing::warn!(store = store.name(), "skipping actions is not supported");
        return;
    }

    let encoded = if encoded == r#"{"length":0}"# {
        "[]".to_string()
    } else {
        encoded
    };
    let state: Value = match serde_json::from_str(&encoded) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(store = store.name(), error = %e, "inspector sent an undecodable state");
            return;
        }
    };

    ignore.store(
        kind == "JUMP_TO_ACTION" || kind == "JUMP_TO_STATE",
        Ordering::SeqCst,
    );
    if !store.set_state(state, None) {
        ignore.store(false, Ordering::SeqCst);
    }
}

use super::protocol::{ActionMessage, Request, Response};
use super::stub::WorkerStub;
use crate::bus::Event;
use crate::error::{Result, StoreError};
use crate::runtime::Registry;
use crate::store::{Store, CHANGED, SET_STATE};
use crossbeam_channel::{Receiver, Sender};
use serde_json::Value;
use std::sync::Arc;

/// Serve `store` to a client over a pair of channels until the client hangs
/// up.
///
/// Batches are applied in order; `"setState"` entries commit their payload
/// directly. Every change of the store is reported back as a `@@STATE`
/// message, whatever caused it.
///
/// # Errors
///
/// Returns the first protocol violation: an unknown message kind, a
/// malformed message, or an action the store does not have.
pub fn serve(store: &Store, requests: &Receiver<Value>, responses: &Sender<Value>) -> Result<()> {
    let outgoing = responses.clone();
    let listener = store.on(CHANGED, move |event: &Event| {
        let message = Response::State {
            payload: event.payload.to_value(),
            action_name: event.action.clone(),
        };
        // A vanished client ends the request loop on its own.
        let _ = outgoing.send(message.encode());
    });

    let outcome = run(store, requests, responses);
    store.off(CHANGED, listener);
    outcome
}

fn run(store: &Store, requests: &Receiver<Value>, responses: &Sender<Value>) -> Result<()> {
    for message in requests.iter() {
        match Request::decode(message)? {
            Request::Actions => {
                let names = Response::Actions {
                    payload: store.actions(),
                };
                responses
                    .send(names.encode())
                    .map_err(|_| StoreError::Disconnected)?;
            }
            Request::Action { messages } => {
                tracing::debug!(store = store.name(), batch = messages.len(), "applying action batch");
                for message in messages {
                    apply(store, message)?;
                }
            }
        }
    }
    Ok(())
}

fn apply(store: &Store, message: ActionMessage) -> Result<()> {
    if message.action_name == SET_STATE {
        store.set_state(message.payload, Some(SET_STATE));
    } else {
        store.dispatch(&message.action_name, message.payload)?;
    }
    Ok(())
}

/// Run a store on a dedicated thread and return a stub that talks to it.
///
/// `factory` builds the store inside the new thread against a registry of
/// its own, so the background store shares nothing with the caller.
///
/// # Errors
///
/// [`StoreError::UnsupportedEnvironment`] if the thread cannot be started.
pub fn spawn<F>(name: &str, factory: F) -> Result<WorkerStub>
where
    F: FnOnce(Arc<Registry>) -> Store + Send + 'static,
{
    let (request_tx, request_rx) = crossbeam_channel::unbounded();
    let (response_tx, response_rx) = crossbeam_channel::unbounded();

    let thread = std::thread::Builder::new()
        .name(format!("{name}-worker"))
        .spawn(move || {
            let store = factory(Registry::new());
            let outcome = serve(&store, &request_rx, &response_tx);
            if let Err(e) = &outcome {
                tracing::error!(store = store.name(), error = %e, "background store stopped");
            }
            outcome
        })
        .map_err(|e| {
            StoreError::UnsupportedEnvironment(format!("cannot start background store: {e}"))
        })?;

    WorkerStub::connect(name, request_tx, response_rx, Some(thread))
}

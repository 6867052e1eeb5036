use super::protocol::{ActionMessage, Request, Response};
use crate::bus::{Event, EventBus, ListenerId, Propagation};
use crate::error::{Result, StoreError};
use crate::frozen::Frozen;
use crate::runtime::Registry;
use crate::store::{channel_name, CHANGED, SET_STATE};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client-side stand-in for a store running elsewhere.
///
/// The stub mirrors the store surface (snapshot, action names, events) but
/// runs no transitions itself. Dispatches are queued and sent as one batch
/// on the next [`tick`](WorkerStub::tick); state changes reported by the
/// background store are applied locally and re-published on the stub's
/// `changed` channel.
///
/// # Examples
///
/// ```
/// use glassbil::{worker, Actions, Store};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let stub = worker::spawn("notes", |registry| {
///     Store::builder()
///         .registry(registry)
///         .name("notes")
///         .actions(Actions::new().with("added", |state, note, _next| {
///             let mut notes = state.to_value();
///             notes.as_array_mut().unwrap().push(note);
///             notes
///         }))
///         .build()
/// })
/// .unwrap();
///
/// while stub.actions().is_empty() {
///     stub.wait(Duration::from_secs(1)).unwrap();
/// }
/// stub.dispatch("added", json!("buy milk")).unwrap();
/// stub.tick().unwrap();
/// stub.wait(Duration::from_secs(1)).unwrap();
/// assert_eq!(stub.data(), json!(["buy milk"]));
/// stub.shutdown().unwrap();
/// ```
pub struct WorkerStub {
    name: String,
    bus: EventBus,
    requests: Sender<Value>,
    responses: Receiver<Value>,
    current: Mutex<Frozen>,
    actions: Mutex<Vec<String>>,
    queue: Mutex<Vec<ActionMessage>>,
    thread: Option<JoinHandle<Result<()>>>,
}

impl WorkerStub {
    /// Open a stub over existing channels and ask for the action names.
    ///
    /// Events are published on the current registry's bus.
    pub fn connect(
        name: &str,
        requests: Sender<Value>,
        responses: Receiver<Value>,
        thread: Option<JoinHandle<Result<()>>>,
    ) -> Result<Self> {
        requests
            .send(Request::Actions.encode())
            .map_err(|_| StoreError::Disconnected)?;
        Ok(Self {
            name: name.to_string(),
            bus: Registry::current().bus().clone(),
            requests,
            responses,
            current: Mutex::new(Frozen::empty()),
            actions: Mutex::new(Vec::new()),
            queue: Mutex::new(Vec::new()),
            thread,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last state reported by the background store.
    pub fn data(&self) -> Frozen {
        lock(&self.current).clone()
    }

    /// Action names discovered so far. Empty until discovery completes.
    pub fn actions(&self) -> Vec<String> {
        lock(&self.actions).clone()
    }

    /// Queue `action` for the next batch.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownAction`] if the background store has not
    /// announced an action of that name.
    pub fn dispatch(&self, action: &str, payload: Value) -> Result<()> {
        if !lock(&self.actions).iter().any(|known| known == action) {
            return Err(StoreError::UnknownAction {
                store: self.name.clone(),
                action: action.to_string(),
            });
        }
        self.enqueue(action, payload);
        Ok(())
    }

    /// Queue a direct state replacement for the next batch.
    pub fn set_state(&self, state: impl Into<Frozen>, action: Option<&str>) {
        self.enqueue(action.unwrap_or(SET_STATE), state.into().into_value());
    }

    fn enqueue(&self, action: &str, payload: Value) {
        lock(&self.queue).push(ActionMessage {
            action_name: action.to_string(),
            payload,
        });
    }

    /// Send the queued batch, if any. Returns how many actions were sent.
    pub fn flush(&self) -> Result<usize> {
        let messages = std::mem::take(&mut *lock(&self.queue));
        if messages.is_empty() {
            return Ok(0);
        }
        let count = messages.len();
        self.requests
            .send(Request::Action { messages }.encode())
            .map_err(|_| StoreError::Disconnected)?;
        Ok(count)
    }

    /// One scheduler tick: flush the queue, then apply every response that
    /// has already arrived. Returns how many responses were applied.
    pub fn tick(&self) -> Result<usize> {
        self.flush()?;
        let mut applied = 0;
        loop {
            match self.responses.try_recv() {
                Ok(message) => {
                    self.receive(message)?;
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return Ok(applied),
                Err(TryRecvError::Disconnected) => return Err(StoreError::Disconnected),
            }
        }
    }

    /// Flush, then block up to `timeout` for one response and apply it.
    /// Returns `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        self.flush()?;
        match self.responses.recv_timeout(timeout) {
            Ok(message) => {
                self.receive(message)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::Disconnected),
        }
    }

    fn receive(&self, message: Value) -> Result<()> {
        match Response::decode(message)? {
            Response::Actions { payload } => {
                tracing::debug!(store = %self.name, actions = payload.len(), "discovered actions");
                *lock(&self.actions) = payload;
            }
            Response::State {
                payload,
                action_name,
            } => {
                let state = Frozen::wrap(payload);
                *lock(&self.current) = state.clone();
                self.bus
                    .publish(&self.channel(CHANGED), state, action_name.as_deref());
            }
        }
        Ok(())
    }

    pub fn channel(&self, event: &str) -> String {
        channel_name(&self.name, event)
    }

    pub fn on<F, R>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        self.bus.subscribe(&self.channel(event), listener)
    }

    pub fn one<F, R>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        self.bus.subscribe_once(&self.channel(event), listener)
    }

    pub fn off(&self, event: &str, listener: ListenerId) -> bool {
        self.bus.unsubscribe(&self.channel(event), listener)
    }

    pub fn off_all(&self, event: &str) {
        self.bus.unsubscribe_all(&self.channel(event));
    }

    pub fn trigger(&self, event: &str, payload: impl Into<Frozen>, action: Option<&str>) {
        self.bus
            .publish(&self.channel(event), payload.into(), action);
    }

    /// Hang up and wait for the background store to finish.
    ///
    /// # Errors
    ///
    /// Whatever error stopped the background store, or
    /// [`StoreError::Disconnected`] if its thread panicked.
    pub fn shutdown(self) -> Result<()> {
        let WorkerStub {
            requests, thread, ..
        } = self;
        drop(requests);
        match thread {
            Some(thread) => thread.join().map_err(|_| StoreError::Disconnected)?,
            None => Ok(()),
        }
    }
}

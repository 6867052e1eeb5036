use crate::frozen::Frozen;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener = Arc<dyn Fn(&Event) -> Propagation + Send + Sync>;

/// A single publication delivered to listeners.
#[derive(Clone, Debug)]
pub struct Event {
    /// The channel the event was published on.
    pub channel: String,
    /// The published value, usually a store snapshot.
    pub payload: Frozen,
    /// The action that produced the payload, when there is one.
    pub action: Option<String>,
}

/// What a listener asks the bus to do with the rest of the current publish.
///
/// Listeners may return `()` to continue, or a `bool` where `false` stops
/// the remaining listeners from seeing this publication.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

impl From<()> for Propagation {
    fn from(_: ()) -> Self {
        Propagation::Continue
    }
}

impl From<bool> for Propagation {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Propagation::Continue
        } else {
            Propagation::Stop
        }
    }
}

/// Handle identifying one registration, used to unsubscribe it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: Listener,
}

struct BusInner {
    next_id: AtomicU64,
    channels: Mutex<HashMap<String, Vec<Registration>>>,
}

/// A registry of named channels, each with an ordered list of listeners.
///
/// Cloning is cheap and yields a handle to the same registry.
///
/// Publishing iterates a snapshot of the channel taken when the publish
/// starts, and skips any entry that has been unsubscribed by the time its
/// turn comes. Listeners may therefore subscribe, unsubscribe or publish
/// re-entrantly without disturbing the pass in progress.
///
/// # Examples
///
/// ```
/// use glassbil::{EventBus, Frozen};
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let bus = EventBus::new();
/// let hits = Arc::new(AtomicUsize::new(0));
/// let hits_clone = hits.clone();
/// bus.subscribe("greetings", move |_event| {
///     hits_clone.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.publish("greetings", Frozen::wrap("hello".into()), None);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(0),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, Vec<Registration>>> {
        self.inner
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.inner.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn insert(&self, channel: &str, id: ListenerId, listener: Listener) {
        self.channels()
            .entry(channel.to_string())
            .or_default()
            .push(Registration { id, listener });
    }

    /// Append `listener` to `channel`. The same closure may be added twice.
    pub fn subscribe<F, R>(&self, channel: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        let id = self.next_id();
        self.insert(channel, id, Arc::new(move |event: &Event| listener(event).into()));
        id
    }

    /// Subscribe `listener` for a single delivery.
    ///
    /// The registration removes itself before the listener runs, so it is
    /// invoked at most once no matter how often the channel fires afterwards.
    pub fn subscribe_once<F, R>(&self, channel: &str, listener: F) -> ListenerId
    where
        F: Fn(&Event) -> R + Send + Sync + 'static,
        R: Into<Propagation>,
    {
        let id = self.next_id();
        let bus: Weak<BusInner> = Arc::downgrade(&self.inner);
        let channel_name = channel.to_string();
        let fired = AtomicBool::new(false);

        self.insert(
            channel,
            id,
            Arc::new(move |event: &Event| {
                if fired.swap(true, Ordering::SeqCst) {
                    return Propagation::Continue;
                }
                if let Some(inner) = bus.upgrade() {
                    EventBus { inner }.unsubscribe(&channel_name, id);
                }
                listener(event).into()
            }),
        );
        id
    }

    /// Remove one registration. Returns `false` if it was not present.
    pub fn unsubscribe(&self, channel: &str, id: ListenerId) -> bool {
        let mut channels = self.channels();
        let Some(registrations) = channels.get_mut(channel) else {
            return false;
        };
        match registrations.iter().position(|entry| entry.id == id) {
            Some(index) => {
                registrations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every listener on `channel`.
    pub fn unsubscribe_all(&self, channel: &str) {
        if let Some(registrations) = self.channels().get_mut(channel) {
            registrations.clear();
        }
    }

    /// Deliver an event to every listener on `channel`, in registration order.
    ///
    /// A listener returning [`Propagation::Stop`] ends this delivery; the
    /// listeners after it stay registered. Unknown channels are a no-op.
    pub fn publish(&self, channel: &str, payload: Frozen, action: Option<&str>) {
        let snapshot: Vec<(ListenerId, Listener)> = match self.channels().get(channel) {
            Some(registrations) => registrations
                .iter()
                .map(|entry| (entry.id, Arc::clone(&entry.listener)))
                .collect(),
            None => return,
        };

        tracing::trace!(channel, listeners = snapshot.len(), "publishing event");

        let event = Event {
            channel: channel.to_string(),
            payload,
            action: action.map(str::to_string),
        };

        for (id, listener) in snapshot {
            if !self.is_registered(channel, id) {
                continue;
            }
            if listener(&event) == Propagation::Stop {
                tracing::trace!(channel, "propagation stopped by listener");
                break;
            }
        }
    }

    fn is_registered(&self, channel: &str, id: ListenerId) -> bool {
        self.channels()
            .get(channel)
            .is_some_and(|registrations| registrations.iter().any(|entry| entry.id == id))
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.channels().get(channel).map_or(0, Vec::len)
    }

    /// Drop every channel and every listener.
    pub fn reset_all(&self) {
        self.channels().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channels().len())
            .finish()
    }
}

use super::store::{Store, CHANGED};
use crate::bus::{Event, EventBus, ListenerId};
use crate::frozen::{Frozen, Path};
use std::sync::{Mutex, PoisonError};

/// Handle returned by [`Store::watch`]. Call [`unwatch`](Unwatch::unwatch)
/// to stop the callbacks; dropping the handle leaves the watch in place.
#[derive(Debug)]
pub struct Unwatch {
    bus: EventBus,
    channel: String,
    id: ListenerId,
}

impl Unwatch {
    /// Detach the watch. Returns `false` if it was already gone, e.g. after
    /// a registry reset.
    pub fn unwatch(self) -> bool {
        self.bus.unsubscribe(&self.channel, self.id)
    }
}

impl Store {
    /// Call `callback(new, old, snapshot)` whenever the value at `path`
    /// changes.
    ///
    /// `path` is dot-separated (`"todos.0.title"`); a missing node reads as
    /// `None`. The current value is captured as the baseline immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use glassbil::{Registry, Store};
    /// use serde_json::json;
    /// use std::sync::{Arc, Mutex};
    ///
    /// let store = Store::builder().registry(Registry::new()).name("profile").build();
    /// store.set_state(json!({"name": "ada", "visits": 1}), None);
    ///
    /// let names = Arc::new(Mutex::new(Vec::new()));
    /// let names_clone = names.clone();
    /// let handle = store.watch("name", move |new, _old, _state| {
    ///     names_clone.lock().unwrap().push(new.map(|n| n.to_string()));
    /// });
    ///
    /// store.set_state(json!({"name": "ada", "visits": 2}), None);
    /// store.set_state(json!({"name": "grace", "visits": 2}), None);
    /// handle.unwatch();
    /// store.set_state(json!({"name": "alan", "visits": 2}), None);
    ///
    /// assert_eq!(*names.lock().unwrap(), vec![Some("\"grace\"".to_string())]);
    /// ```
    pub fn watch<F>(&self, path: &str, callback: F) -> Unwatch
    where
        F: Fn(Option<&Frozen>, Option<&Frozen>, &Frozen) + Send + Sync + 'static,
    {
        self.watch_with(path, callback, |old, new| old == new)
    }

    /// Like [`watch`](Store::watch), with `same(old, new)` deciding whether
    /// two observed values count as equal.
    ///
    /// The baseline only moves when a change is reported, so a tolerant
    /// comparator sees drift accumulate against the last reported value.
    pub fn watch_with<F, C>(&self, path: &str, callback: F, same: C) -> Unwatch
    where
        F: Fn(Option<&Frozen>, Option<&Frozen>, &Frozen) + Send + Sync + 'static,
        C: Fn(Option<&Frozen>, Option<&Frozen>) -> bool + Send + Sync + 'static,
    {
        let path = Path::parse(path);
        let baseline = Mutex::new(self.data().at(path.clone()));
        let channel = self.channel(CHANGED);

        let id = self.registry().bus().subscribe(&channel, move |event: &Event| {
            let current = event.payload.at(path.clone());
            let previous = {
                let mut observed = baseline.lock().unwrap_or_else(PoisonError::into_inner);
                if same(observed.as_ref(), current.as_ref()) {
                    return;
                }
                std::mem::replace(&mut *observed, current.clone())
            };
            callback(current.as_ref(), previous.as_ref(), &event.payload);
        });

        Unwatch {
            bus: self.registry().bus().clone(),
            channel,
            id,
        }
    }
}

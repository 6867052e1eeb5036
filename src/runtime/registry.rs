use crate::bus::EventBus;
use crate::frozen::Frozen;
use crate::store::{channel_name, CHANGED};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Channel on which the registry announces that every store has loaded.
pub const DATA_LOADED: &str = "global:data-loaded";

/// Tuning knobs for a [`Registry`].
///
/// # Examples
///
/// ```
/// use glassbil::RegistryConfig;
///
/// let config = RegistryConfig {
///     history_capacity: 3,
///     ..RegistryConfig::default()
/// };
/// assert_eq!(config.auto_name_prefix, "store");
/// ```
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How many prior snapshots each store keeps for [`previous`](crate::Store::previous).
    ///
    /// Zero disables history and therefore rollback.
    ///
    /// Default: 10.
    pub history_capacity: usize,

    /// Prefix for the names handed to stores built without one.
    ///
    /// Default: `"store"`, giving `store-0`, `store-1`, ...
    pub auto_name_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            auto_name_prefix: "store".to_string(),
        }
    }
}

/// Shared state behind one store name.
struct Entry {
    loaded: bool,
    current: Frozen,
    history: VecDeque<Frozen>,
}

impl Entry {
    fn new() -> Self {
        Self {
            loaded: false,
            current: Frozen::empty(),
            history: VecDeque::new(),
        }
    }
}

struct RegistryState {
    entries: HashMap<String, Entry>,
    ready_fired: bool,
    generation: u64,
}

impl RegistryState {
    /// Claim the one-per-generation "all loaded" announcement, if it is due.
    fn take_ready_payload(&mut self) -> Option<Frozen> {
        if self.ready_fired
            || self.entries.is_empty()
            || !self.entries.values().all(|entry| entry.loaded)
        {
            return None;
        }
        self.ready_fired = true;

        let stores: Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.current.to_value()))
            .collect();
        Some(Frozen::wrap(Value::Object(stores)))
    }
}

/// Owner of every store entry and of the event bus they publish on.
///
/// Stores are handles onto a registry: two stores built with the same name
/// against the same registry share one entry. Most programs use the lazily
/// created [`global`](Registry::global) registry; tests and background
/// workers create isolated ones.
///
/// # Examples
///
/// ```
/// use glassbil::{Registry, Store};
/// use serde_json::json;
///
/// Registry::scope(|| {
///     let a = Store::new("cart");
///     let b = Store::new("cart");
///     a.set_state(json!(["apple"]), None);
///     assert_eq!(b.data(), json!(["apple"]));
/// });
/// ```
pub struct Registry {
    config: RegistryConfig,
    bus: EventBus,
    next_name: AtomicUsize,
    state: Mutex<RegistryState>,
}

// Thread-local stack for scoped registries
thread_local! {
    static REGISTRY_STACK: RefCell<Vec<Arc<Registry>>> = const { RefCell::new(Vec::new()) };
}

impl Registry {
    /// Create an isolated registry with default configuration.
    pub fn new() -> Arc<Self> {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Arc<Self> {
        Arc::new(Registry {
            config,
            bus: EventBus::new(),
            next_name: AtomicUsize::new(0),
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                ready_fired: false,
                generation: 0,
            }),
        })
    }

    /// The process-wide registry, created on first use.
    pub fn global() -> Arc<Self> {
        static REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(REGISTRY.get_or_init(Self::new))
    }

    /// The innermost scoped registry on this thread, or the global one.
    pub fn current() -> Arc<Self> {
        REGISTRY_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .cloned()
                .unwrap_or_else(Self::global)
        })
    }

    /// Run `f` with a fresh registry as the current one.
    ///
    /// Every store built without an explicit registry inside `f` lands in
    /// the fresh registry, which is dropped when `f` returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_registry(Self::new(), f)
    }

    /// Run `f` with `registry` pushed as the current registry.
    pub fn with_registry<F, R>(registry: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        REGISTRY_STACK.with(|stack| {
            stack.borrow_mut().push(registry);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        REGISTRY_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the entry for `name`, creating it if needed, and return the
    /// name it is registered under. Existing entries are left untouched.
    pub(crate) fn attach(&self, name: Option<&str>) -> String {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!(
                "{}-{}",
                self.config.auto_name_prefix,
                self.next_name.fetch_add(1, Ordering::SeqCst)
            ),
        };
        self.state()
            .entries
            .entry(name.clone())
            .or_insert_with(Entry::new);
        name
    }

    /// Names of every store entry, sorted.
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn snapshot(&self, name: &str) -> Option<Frozen> {
        self.state().entries.get(name).map(|entry| entry.current.clone())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.state()
            .entries
            .get(name)
            .is_some_and(|entry| entry.loaded)
    }

    pub fn history_len(&self, name: &str) -> usize {
        self.state()
            .entries
            .get(name)
            .map_or(0, |entry| entry.history.len())
    }

    /// How many times this registry has been reset.
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Commit `state` as the new snapshot of `name`.
    ///
    /// The entry is marked loaded either way. When the snapshot actually
    /// differs, the previous one is pushed onto the bounded history and a
    /// `changed` event is published. Afterwards the registry checks whether
    /// every store has now loaded. Returns whether the snapshot changed.
    pub(crate) fn commit(&self, name: &str, state: Frozen, action: Option<&str>) -> bool {
        let capacity = self.config.history_capacity;
        let (changed, ready) = {
            let mut registry = self.state();
            let entry = registry
                .entries
                .entry(name.to_string())
                .or_insert_with(Entry::new);
            entry.loaded = true;

            let changed = if entry.current == state {
                None
            } else {
                let previous = std::mem::replace(&mut entry.current, state);
                if capacity > 0 {
                    entry.history.push_back(previous);
                    while entry.history.len() > capacity {
                        entry.history.pop_front();
                    }
                }
                Some(entry.current.clone())
            };
            (changed, registry.take_ready_payload())
        };

        tracing::debug!(store = name, action, changed = changed.is_some(), "committed state");

        let is_changed = changed.is_some();
        if let Some(snapshot) = changed {
            self.bus
                .publish(&channel_name(name, CHANGED), snapshot, action);
        }
        if let Some(payload) = ready {
            tracing::info!(stores = payload.len(), "all stores loaded");
            self.bus.publish(DATA_LOADED, payload, None);
        }
        is_changed
    }

    /// Restore the most recent history entry of `name`.
    ///
    /// Returns `false` without publishing when there is nothing to restore.
    pub(crate) fn rollback(&self, name: &str) -> bool {
        let restored = {
            let mut registry = self.state();
            let Some(entry) = registry.entries.get_mut(name) else {
                return false;
            };
            let Some(previous) = entry.history.pop_back() else {
                return false;
            };
            entry.current = previous;
            entry.current.clone()
        };

        tracing::debug!(store = name, "rolled back to previous state");
        self.bus.publish(&channel_name(name, CHANGED), restored, None);
        true
    }

    /// Drop every store entry and every listener, and start a new generation
    /// in which the "all loaded" event may fire again.
    pub fn reset(&self) {
        {
            let mut registry = self.state();
            registry.entries.clear();
            registry.ready_fired = false;
            registry.generation += 1;
        }
        self.bus.reset_all();
        tracing::info!(generation = self.generation(), "registry reset");
    }
}

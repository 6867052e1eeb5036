//! Integration tests for Glassbil

use glassbil::{
    worker, Actions, Dispatch, Event, Frozen, Propagation, Registry, RegistryConfig, Store,
    StoreError, Transition, CHANGED, DATA_LOADED,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

fn todo_actions() -> Actions {
    Actions::new()
        .with("added", |state, entry, _next| {
            let mut todos = state.to_value();
            if let Some(items) = todos.as_array_mut() {
                items.push(entry);
            }
            todos
        })
        .with("removed", |state, id, _next| {
            state.filter(|todo| todo.field("id").map(Frozen::into_value) != Some(id.clone()))
        })
}

fn todo_store(registry: &Arc<Registry>) -> Store {
    Store::builder()
        .registry(registry.clone())
        .name("test")
        .actions(todo_actions())
        .build()
}

#[test]
fn add_then_remove_notifies_twice() {
    let registry = Registry::new();
    let store = todo_store(&registry);

    let lengths = Arc::new(Mutex::new(Vec::new()));
    let lengths_clone = lengths.clone();
    store.on(CHANGED, move |event: &Event| {
        lengths_clone.lock().unwrap().push(event.payload.len());
    });

    store.dispatch("added", json!({"id": 123})).unwrap();
    store.dispatch("removed", json!(123)).unwrap();

    assert_eq!(*lengths.lock().unwrap(), vec![1, 0]);
    assert!(store.data().is_empty());
}

#[test]
fn one_shot_listener_fires_once() {
    let registry = Registry::new();
    let store = todo_store(&registry);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    store.one(CHANGED, move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    store.dispatch("added", json!({"id": 1})).unwrap();
    store.dispatch("added", json!({"id": 2})).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.bus().listener_count("test-store:changed"), 0);
}

#[test]
fn history_is_bounded() {
    let registry = Registry::new();
    let store = todo_store(&registry);

    for id in 0..15 {
        store.dispatch("added", json!({"id": id})).unwrap();
    }
    assert_eq!(store.history_len(), 10);

    assert!(store.previous());
    assert_eq!(store.data().len(), 14);
    assert_eq!(store.history_len(), 9);
}

#[test]
fn history_capacity_is_configurable() {
    let registry = Registry::with_config(RegistryConfig {
        history_capacity: 2,
        ..RegistryConfig::default()
    });
    let store = todo_store(&registry);
    for id in 0..5 {
        store.dispatch("added", json!({"id": id})).unwrap();
    }
    assert_eq!(store.history_len(), 2);
    assert!(store.previous());
    assert!(store.previous());
    assert!(!store.previous());
    assert_eq!(store.data().len(), 3);
}

#[test]
fn stopping_listener_short_circuits_the_rest() {
    let registry = Registry::new();
    let store = todo_store(&registry);

    let order = Arc::new(Mutex::new(Vec::new()));
    let first = order.clone();
    store.on(CHANGED, move |_| {
        first.lock().unwrap().push("first");
        Propagation::Stop
    });
    let second = order.clone();
    store.on(CHANGED, move |_| {
        second.lock().unwrap().push("second");
    });

    store.dispatch("added", json!({"id": 1})).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first"]);
}

#[test]
fn data_loaded_fires_once_per_generation() {
    let registry = Registry::new();
    let fired = Arc::new(Mutex::new(Vec::new()));

    let subscribe = |registry: &Arc<Registry>| {
        let fired = fired.clone();
        registry.bus().subscribe(DATA_LOADED, move |event: &Event| {
            fired.lock().unwrap().push(event.payload.keys());
        });
    };
    subscribe(&registry);

    let build = |name: &str| Store::builder().registry(registry.clone()).name(name).build();
    let a = build("A");
    let b = build("B");

    a.set_state(json!([1]), None);
    assert!(fired.lock().unwrap().is_empty());
    b.set_state(json!([2]), None);
    a.set_state(json!([3]), None);
    assert_eq!(
        *fired.lock().unwrap(),
        vec![vec!["A".to_string(), "B".to_string()]]
    );

    assert!(a.reset());
    subscribe(&registry);
    let a = build("A");
    let b = build("B");
    a.set_state(json!([]), None);
    b.set_state(json!([]), None);
    assert_eq!(fired.lock().unwrap().len(), 2);
    assert_eq!(registry.generation(), 1);
}

#[test]
fn specialized_stores_cannot_reset() {
    let registry = Registry::new();
    let root = todo_store(&registry);
    root.dispatch("added", json!({"id": 1})).unwrap();

    let narrow = Store::builder()
        .registry(registry.clone())
        .name("narrow")
        .specialized()
        .build();
    assert!(!narrow.reset());
    assert_eq!(root.data().len(), 1);
}

#[test]
fn snapshots_are_immutable() {
    let registry = Registry::new();
    let store = todo_store(&registry);
    store.dispatch("added", json!({"id": 1, "title": "milk"})).unwrap();

    let snapshot = store.data();
    let todo = snapshot.index(0).unwrap();
    let err = todo.set("title", "eggs").unwrap_err();
    assert!(matches!(err, StoreError::Immutable { .. }));
    assert_eq!(
        err.to_string(),
        r#"Cannot change property "title" to ""eggs"" of an immutable object"#
    );
    assert_eq!(store.data(), json!([{"id": 1, "title": "milk"}]));
}

#[test]
fn snapshots_convert_back_to_plain_values() {
    let registry = Registry::new();
    let store = todo_store(&registry);
    let original = json!({"todos": [{"id": 1, "tags": ["a", "b"]}], "count": 1});
    store.set_state(original.clone(), None);

    let plain: Value = store.data().to_value();
    assert_eq!(plain, original);

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Todo {
        id: u64,
        tags: Vec<String>,
    }
    let todos: Vec<Todo> = store.data().at("todos").unwrap().deserialize().unwrap();
    assert_eq!(
        todos,
        vec![Todo {
            id: 1,
            tags: vec!["a".to_string(), "b".to_string()]
        }]
    );
}

#[test]
fn equal_state_publishes_nothing() {
    let registry = Registry::new();
    let store = todo_store(&registry);
    store.set_state(json!([1, 2]), None);

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    store.on(CHANGED, move |_| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!store.set_state(json!([1, 2]), None));
    let same = store.data();
    assert!(!store.set_state(same, None));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.history_len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn deferred_continuation_commits_later() {
    let registry = Registry::new();
    let store = Store::builder()
        .registry(registry.clone())
        .name("remote")
        .build();

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let done_tx = Mutex::new(Some(done_tx));
    store.register("fetched", move |_state, payload, next| {
        let done_tx = done_tx.lock().unwrap().take();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            next.commit(payload);
            if let Some(done_tx) = done_tx {
                let _ = done_tx.send(());
            }
        });
        Transition::Pending
    });

    let actions = Arc::new(Mutex::new(Vec::new()));
    let actions_clone = actions.clone();
    store.on(CHANGED, move |event: &Event| {
        actions_clone.lock().unwrap().push(event.action.clone());
    });

    let outcome = store.dispatch("fetched", json!(["loaded"])).unwrap();
    assert_eq!(outcome, Dispatch::Pending);
    assert!(!store.is_loaded());

    done_rx.await.unwrap();
    assert!(store.is_loaded());
    assert_eq!(store.data(), json!(["loaded"]));
    assert_eq!(*actions.lock().unwrap(), vec![Some("fetched".to_string())]);
}

#[test]
fn watch_reports_path_changes_until_unwatched() {
    let registry = Registry::new();
    let store = Store::builder()
        .registry(registry.clone())
        .name("settings")
        .build();
    store.set_state(json!({"theme": {"mode": "light"}, "font": 12}), None);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let handle = store.watch("theme.mode", move |new, old, _state| {
        seen_clone.lock().unwrap().push((
            new.map(Frozen::to_value),
            old.map(Frozen::to_value),
        ));
    });

    store.set_state(json!({"theme": {"mode": "light"}, "font": 14}), None);
    store.set_state(json!({"theme": {"mode": "dark"}, "font": 14}), None);
    store.set_state(json!({"font": 14}), None);
    assert!(handle.unwatch());
    store.set_state(json!({"theme": {"mode": "light"}}), None);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (Some(json!("dark")), Some(json!("light"))),
            (None, Some(json!("dark"))),
        ]
    );
}

#[test]
fn scoped_registries_are_isolated() {
    let outer = Registry::scope(|| {
        let store = Store::new("shared");
        store.set_state(json!(["inner"]), None);
        Registry::scope(|| Store::new("shared").data())
    });
    assert!(outer.is_empty());
}

#[test]
fn worker_round_trip() {
    // The stub publishes on the current registry, so keep it off the global one.
    Registry::scope(|| {
        let stub = worker::spawn("todos", |registry| {
            Store::builder()
                .registry(registry)
                .name("todos")
                .actions(todo_actions())
                .build()
        })
        .unwrap();

        while stub.actions().is_empty() {
            assert!(stub.wait(Duration::from_secs(5)).unwrap());
        }
        assert_eq!(stub.actions(), vec!["added".to_string(), "removed".to_string()]);

        let changes = Arc::new(Mutex::new(Vec::new()));
        let changes_clone = changes.clone();
        let listener = stub.on(CHANGED, move |event: &Event| {
            changes_clone
                .lock()
                .unwrap()
                .push((event.payload.len(), event.action.clone()));
        });

        stub.dispatch("added", json!({"id": 1})).unwrap();
        stub.dispatch("added", json!({"id": 2})).unwrap();
        stub.tick().unwrap();
        while changes.lock().unwrap().len() < 2 {
            assert!(stub.wait(Duration::from_secs(5)).unwrap());
        }

        assert_eq!(stub.data(), json!([{"id": 1}, {"id": 2}]));
        assert_eq!(
            *changes.lock().unwrap(),
            vec![(1, Some("added".to_string())), (2, Some("added".to_string()))]
        );

        let err = stub.dispatch("renamed", json!(null)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownAction { .. }));

        assert!(stub.off(CHANGED, listener));
        stub.shutdown().unwrap();
    });
}

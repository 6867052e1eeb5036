//! Demonstration of a store managing a todo list

use glassbil::{Actions, Event, Frozen, Store, Transition, CHANGED, DATA_LOADED};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn todo_actions() -> Actions {
    Actions::new()
        .with("added", |state, title, _next| {
            let mut todos = state.to_value();
            let id = todos.as_array().map_or(0, Vec::len);
            if let Some(items) = todos.as_array_mut() {
                items.push(json!({"id": id, "title": title, "completed": false}));
            }
            todos
        })
        .with("toggled", |state, id, _next| {
            state.map(|todo| {
                let mut todo = todo.to_value();
                if todo["id"] == id {
                    let done = todo["completed"].as_bool().unwrap_or(false);
                    todo["completed"] = json!(!done);
                }
                todo
            })
        })
        .with("cleared", |state, _payload, next| {
            // Finishes through the continuation, like a transition that waits on I/O.
            next.commit(state.filter(|todo| {
                !todo.field("completed").and_then(|c| c.as_bool()).unwrap_or(false)
            }));
            Transition::Pending
        })
}

fn print_todos(state: &Frozen) {
    state.for_each(|todo| {
        let done = todo.field("completed").and_then(|c| c.as_bool()).unwrap_or(false);
        let status = if done { "✓" } else { " " };
        let title = todo.field("title").map(|t| t.to_string()).unwrap_or_default();
        println!("   [{}] {}", status, title);
    });
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Store Example: Todo App ===\n");

    let store = Store::builder().name("todos").actions(todo_actions()).build();

    println!("1. Setting up listeners");
    store.on(DATA_LOADED, |_: &Event| {
        println!("   [Ready] every store has loaded");
    });
    store.on(CHANGED, |event: &Event| {
        let action = event.action.as_deref().unwrap_or("?");
        println!("   [{}] {} todos", action, event.payload.len());
    });
    let watch = store.watch("0.completed", |new, old, _state| {
        println!(
            "   [Watch] first todo completed: {:?} -> {:?}",
            old.map(Frozen::to_value),
            new.map(Frozen::to_value)
        );
    });

    println!("\n2. Adding todos");
    for title in ["Learn Rust", "Build a store", "Write documentation"] {
        store.dispatch("added", json!(title)).unwrap();
    }

    println!("\n3. Current todos:");
    print_todos(&store.data());

    println!("\n4. Completing first todo");
    store.dispatch("toggled", json!(0)).unwrap();

    println!("\n5. Trying to edit a snapshot in place");
    if let Err(e) = store.data().index(0).unwrap().set("title", "hacked") {
        println!("   {}", e);
    }

    println!("\n6. Clearing completed todos");
    watch.unwatch();
    store.dispatch("cleared", json!(null)).unwrap();
    print_todos(&store.data());

    println!("\n7. Undoing the clear");
    store.previous();
    print_todos(&store.data());

    println!("\n✓ Example complete!");
}

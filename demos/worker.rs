//! Demonstration of a store running on a background thread

use glassbil::{worker, Actions, Event, Store, CHANGED};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> glassbil::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Worker Example: Background Counter ===\n");

    let stub = worker::spawn("counter", |registry| {
        Store::builder()
            .registry(registry)
            .name("counter")
            .actions(
                Actions::new()
                    .with("incremented", |state, by, _next| {
                        json!(state.as_i64().unwrap_or(0) + by.as_i64().unwrap_or(1))
                    })
                    .with("doubled", |state, _payload, _next| {
                        json!(state.as_i64().unwrap_or(0) * 2)
                    }),
            )
            .build()
    })?;

    println!("1. Discovering actions");
    while stub.actions().is_empty() {
        stub.wait(Duration::from_secs(1))?;
    }
    println!("   {:?}", stub.actions());

    stub.on(CHANGED, |event: &Event| {
        let action = event.action.as_deref().unwrap_or("?");
        println!("   [{}] counter = {}", action, event.payload);
    });

    println!("\n2. Queueing a batch");
    stub.dispatch("incremented", json!(5))?;
    stub.dispatch("doubled", json!(null))?;
    stub.set_state(json!(100), None);
    println!("   sent {} actions", stub.flush()?);

    println!("\n3. Receiving changes");
    while stub.wait(Duration::from_millis(200))? {}

    println!("\n4. Unknown actions are refused locally");
    if let Err(e) = stub.dispatch("halved", json!(null)) {
        println!("   {}", e);
    }

    stub.shutdown()?;
    println!("\n✓ Example complete!");
    Ok(())
}

//! Counter application built as an accessor, with an effect printing changes

use serde_json::{json, Value};
use std::time::Duration;
use tincan_accessor::{
    action_tree, getter_tree, make_accessor, mutation_tree, payload, AccessorConfig, ActionTree,
    Effect, GetterTree, MutationTree, Result,
};

fn state() -> Value {
    json!({ "count": 0, "step": 1, "history": [0] })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tincan_accessor=debug".into()),
        )
        .init();

    println!("=== Counter Accessor ===\n");

    let getters = getter_tree(
        &state,
        GetterTree::new()
            .getter("is_even", |state, _| {
                Ok(json!(state.get_as::<i64>("count")? % 2 == 0))
            })
            .getter("label", |state, getters| {
                let parity = if getters.get_as::<bool>("is_even")? { "even" } else { "odd" };
                Ok(json!(format!("{} ({parity})", state.get_as::<i64>("count")?)))
            }),
    );

    let mutations = mutation_tree(
        &state,
        MutationTree::new()
            .mutation("increment", |state, _| {
                let step: i64 = state.get_as("step")?;
                let count = state.update_as("count", |count: &mut i64| {
                    *count += step;
                    *count
                })?;
                state.update_as("history", |history: &mut Vec<i64>| history.push(count))
            })
            .mutation("set_step", |state, payload| {
                state.set("step", payload.arg(0)?)
            }),
    );

    let actions = action_tree(
        &state,
        ActionTree::new().action("increment_later", |store, payload| async move {
            let delay: u64 = payload.arg_or(0, 10)?;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            store.commit("increment", ())?;
            store.getters.get("label")
        }),
    );

    let counter = make_accessor(
        AccessorConfig::new(state)
            .getters(getters)
            .mutations(mutations)
            .actions(actions),
    )?;

    let _printer = Effect::new({
        let counter = counter.clone();
        move || {
            if let Ok(label) = counter.get("label") {
                println!("   [Effect] count is {label}");
            }
        }
    });

    println!("\n1. Committing mutations");
    counter.commit("increment", ())?;
    counter.commit("increment", ())?;

    println!("\n2. Changing the step");
    counter.commit("set_step", payload![5])?;
    counter.commit("increment", ())?;

    println!("\n3. Dispatching an async action");
    let label = counter.dispatch("increment_later", payload![20]).await?;
    println!("   action returned {label}");

    println!("\n4. Final history: {}", counter.get("history")?);
    println!("\n=== Counter Complete ===");
    Ok(())
}

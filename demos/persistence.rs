//! Persisting accessor state as JSON and restoring it into a fresh accessor

use serde::{Deserialize, Serialize};
use serde_json::json;
use tincan_accessor::{
    dump_state, dump_state_as, load_state, make_accessor, payload, Accessor, AccessorConfig,
    GetterTree, MutationTree, Result,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Settings {
    theme: String,
    font_size: u32,
    recent: Vec<String>,
}

fn settings() -> Result<Accessor> {
    make_accessor(
        AccessorConfig::typed(|| Settings {
            theme: "light".into(),
            font_size: 14,
            recent: Vec::new(),
        })
        .getters(GetterTree::new().getter("recent_count", |state, _| {
            Ok(json!(state.get_as::<Vec<String>>("recent")?.len()))
        }))
        .mutations(
            MutationTree::new()
                .mutation("set_theme", |state, payload| state.set("theme", payload.arg(0)?))
                .mutation("open", |state, payload| {
                    let path: String = payload.arg(0)?;
                    state.update_as("recent", |recent: &mut Vec<String>| recent.push(path))
                }),
        ),
    )
}

fn main() -> Result<()> {
    println!("=== Persistence ===\n");

    let session = settings()?;
    session.commit("set_theme", payload!["dark"])?;
    session.commit("open", payload!["notes.md"])?;
    session.commit("open", payload!["todo.md"])?;

    let saved = serde_json::to_string_pretty(&dump_state(&session))
        .map_err(|err| tincan_accessor::AccessorError::failed(err.to_string()))?;
    println!("1. Saved state:\n{saved}");

    let restored = settings()?;
    let parsed = serde_json::from_str(&saved)
        .map_err(|err| tincan_accessor::AccessorError::failed(err.to_string()))?;
    load_state(&restored, &parsed)?;

    println!("\n2. Restored theme: {}", restored.get("theme")?);
    println!("   Recent files: {}", restored.get("recent_count")?);

    let typed: Settings = dump_state_as(&restored)?;
    println!("\n3. As a struct: {typed:?}");
    Ok(())
}

//! List available stages.

use super::load_config;
use anyhow::Result;
use std::path::Path;

pub fn list_stages(config_path: &Path, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = litnb_runtime::stage_registry();
    let active = config.active_stages();

    // Surface unknown names from the config before printing anything
    registry.from_config(&config)?;

    if json {
        let records: Vec<serde_json::Value> = registry
            .names()
            .into_iter()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "active": active.contains(&name),
                    "position": active.iter().position(|s| *s == name),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("Pipeline ({} stages):", active.len());
    for (i, name) in active.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, name);
    }

    let inactive: Vec<&str> = registry
        .names()
        .into_iter()
        .filter(|name| !active.contains(name))
        .collect();
    if !inactive.is_empty() {
        println!("Available:");
        for name in inactive {
            println!("      {}", name);
        }
    }
    Ok(())
}

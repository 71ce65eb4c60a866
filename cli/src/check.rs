//! Flow document validation

use anyhow::{Context, Result};
use chatflow_core::{FlowDocument, Settings};
use std::path::Path;

/// Parse and validate a flow document (and optionally a settings file).
pub fn run_check_command(flow_path: &Path, settings_path: Option<&Path>) -> Result<()> {
    println!("Checking flow at: {}", flow_path.display());

    let document = FlowDocument::load(flow_path)
        .with_context(|| format!("Failed to read flow document: {}", flow_path.display()))?;
    let blocks = document.blocks.len();
    let unreachable = unreachable_blocks(&document);
    let flow = document.into_flow().context("Flow is invalid")?;
    println!("  ✅ {} blocks, starting at `{}`", blocks, flow.start());

    if unreachable.is_empty() {
        println!("  ✅ every block is reachable through literal paths and routes");
    } else {
        println!("  ⚠️  not reachable from `{}`: {}", flow.start(), unreachable.join(", "));
    }

    if let Some(path) = settings_path {
        Settings::load(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?;
        println!("  ✅ settings at {} are valid", path.display());
    }

    println!();
    println!("✅ Check complete!");
    Ok(())
}

/// Blocks no literal path or route leads to. Only a hint: resolvers added
/// in code can still reach them.
fn unreachable_blocks(document: &FlowDocument) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut queue = vec![document.start.clone()];
    while let Some(id) = queue.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(block) = document.blocks.get(&id) else {
            continue;
        };
        queue.extend(block.path.iter().cloned());
        if let Some(routes) = &block.routes {
            queue.extend(routes.when.values().cloned());
            queue.extend(routes.otherwise.iter().cloned());
        }
    }
    document
        .blocks
        .keys()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect()
}

//! Starter files

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const FLOW_TEMPLATE: &str = include_str!("../templates/flow.toml");
pub const SETTINGS_TEMPLATE: &str = include_str!("../templates/settings.toml");

/// Write `flow.toml` and `settings.toml` into `dir`.
pub fn run_new_command(dir: &Path, force: bool) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for (name, contents) in [("flow.toml", FLOW_TEMPLATE), ("settings.toml", SETTINGS_TEMPLATE)] {
        let target = dir.join(name);
        if target.exists() && !force {
            anyhow::bail!("{} already exists (use --force to overwrite)", target.display());
        }
        fs::write(&target, contents)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        println!("Created {}", target.display());
    }

    println!();
    println!("Next steps:");
    println!("  chatflow run {} --settings {} --echo-responder",
        dir.join("flow.toml").display(),
        dir.join("settings.toml").display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        run_new_command(dir.path(), false).unwrap();
        assert!(run_new_command(dir.path(), false).is_err());
        run_new_command(dir.path(), true).unwrap();
    }
}

//! Profiles command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use dsmod_core::ProfileTable;
use owo_colors::OwoColorize;

/// Run the profiles command
pub fn run(output: Option<&Path>, validate: Option<&Path>) -> Result<()> {
    if let Some(path) = validate {
        let table = ProfileTable::load(path)
            .with_context(|| format!("Invalid profile table {}", path.display()))?;
        println!(
            "{} {} weapon profiles in {}",
            "valid".green(),
            table.weapons.len(),
            path.display()
        );
        for (id, profile) in &table.weapons {
            let modded = if profile.modded.is_some() { " (+mod)" } else { "" };
            let name = profile.display_name.as_deref().unwrap_or("-");
            println!("  {:<28} {}{}", id, name, modded);
        }
        return Ok(());
    }

    let table = ProfileTable::builtin();
    match output {
        Some(path) => {
            table.save(path)?;
            eprintln!("Wrote {} weapon profiles to {}", table.weapons.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&table)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_dumped_table_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        run(Some(&path), None).unwrap();
        run(None, Some(&path)).unwrap();
        assert_eq!(ProfileTable::load(&path).unwrap(), ProfileTable::builtin());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, "{\"weapons\": 3}").unwrap();
        assert!(run(None, Some(&path)).is_err());
    }
}

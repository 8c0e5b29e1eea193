//! Signatures command implementation.

use std::path::Path;

use anyhow::Result;
use dsmod_core::{builtin_signatures, save_signatures};

/// Run the signatures command
pub fn run(output: Option<&Path>) -> Result<()> {
    let set = builtin_signatures();
    match output {
        Some(path) => {
            save_signatures(path, &set)?;
            eprintln!(
                "Wrote {} signatures ({}) to {}",
                set.entries.len(),
                set.version,
                path.display()
            );
        }
        None => println!("{}", serde_json::to_string_pretty(&set)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsmod_core::load_signatures;

    #[test]
    fn test_written_set_loads_as_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signatures.json");
        run(Some(&path)).unwrap();

        let loaded = load_signatures(&path).unwrap();
        let builtin = builtin_signatures();
        assert_eq!(loaded.version, builtin.version);
        assert_eq!(loaded.entries, builtin.entries);
    }
}

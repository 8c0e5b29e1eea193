//! Check command implementation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use dsmod_core::scan::pe::map_image;
use dsmod_core::{
    FunctionRegistry, SignatureScanner, SignatureSet, builtin_signatures, load_signatures,
};
use owo_colors::OwoColorize;

/// Map an executable file and resolve every signature of `set` against it.
pub fn resolve(file: &[u8], set: &SignatureSet) -> Result<(FunctionRegistry, u64)> {
    let (layout, image) = map_image(file).context("Not a PE32+ executable")?;
    let scanner = SignatureScanner::for_mapped_image(&layout, &image, layout.image_base);
    let mut registry = FunctionRegistry::from_set(set)?;
    registry.resolve_all(&scanner);
    Ok((registry, layout.image_base))
}

/// Run the check command
pub fn run(exe: &Path, signatures: Option<&Path>) -> Result<()> {
    let set = match signatures {
        Some(path) => load_signatures(path)
            .with_context(|| format!("Failed to load signatures from {}", path.display()))?,
        None => builtin_signatures(),
    };
    let file = fs::read(exe).with_context(|| format!("Failed to read {}", exe.display()))?;
    let (registry, image_base) = resolve(&file, &set)?;

    println!("Executable: {}", exe.display());
    println!("Signature set: {}", set.version);
    println!();

    let width = registry.iter().map(|f| f.name().len()).max().unwrap_or(0);
    for function in registry.iter() {
        match function.address.and_then(|a| a.checked_sub(image_base)) {
            Some(rva) => println!(
                "  {:<width$}  {}  rva 0x{:X}",
                function.name(),
                "ok".green(),
                rva,
            ),
            None => println!(
                "  {:<width$}  {}  {}",
                function.name(),
                "missing".red(),
                function.signature.describe().dimmed(),
            ),
        }
    }
    println!();

    match registry.ensure_all_resolved() {
        Ok(()) => {
            println!("{}", "Compatible".green().bold());
            Ok(())
        }
        Err(e) if e.is_incompatible_host() => {
            println!("{}", "Incompatible".red().bold());
            bail!(
                "{} of {} signatures not found",
                registry.unresolved().len(),
                registry.len()
            )
        }
        Err(e) => Err(e.into()),
    }
}

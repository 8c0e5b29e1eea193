use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::scan::scanner::SignatureScanner;
use crate::scan::signature::{FunctionSignature, SignatureSet};

/// One declared host function and what is known about it so far.
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub signature: FunctionSignature,
    /// Absolute address, `None` until the scan finds it
    pub address: Option<u64>,
    /// Trampoline to the original code, set once the hook is created
    pub original: Option<usize>,
}

impl ResolvedFunction {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn is_resolved(&self) -> bool {
        self.address.is_some()
    }
}

/// Outcome of one scan pass
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub resolved: usize,
    pub missing: Vec<String>,
    pub elapsed: Duration,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Registry of every host function the mod needs.
///
/// All signatures are declared up front, resolved in one pass, and the
/// aggregate result gates hook installation.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: Vec<ResolvedFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_set(set: &SignatureSet) -> Result<Self> {
        let mut registry = Self::new();
        for signature in &set.entries {
            registry.declare(signature.clone())?;
        }
        Ok(registry)
    }

    /// Declare a signature; the pattern is validated immediately.
    pub fn declare(&mut self, signature: FunctionSignature) -> Result<()> {
        if self.get(&signature.name).is_some() {
            return Err(Error::DuplicateSignature(signature.name));
        }
        signature.pattern_bytes()?;
        self.functions.push(ResolvedFunction {
            signature,
            address: None,
            original: None,
        });
        Ok(())
    }

    /// Scan for every declared signature. Misses are collected and logged,
    /// never returned as errors here.
    pub fn resolve_all(&mut self, scanner: &SignatureScanner<'_>) -> ScanReport {
        let start = Instant::now();
        let mut missing = Vec::new();

        for function in &mut self.functions {
            match scanner.scan(&function.signature) {
                Ok(Some(address)) => {
                    debug!(
                        "{} at {:#x} (rva {:#x})",
                        function.name(),
                        address,
                        address.wrapping_sub(scanner.base())
                    );
                    function.address = Some(address);
                }
                Ok(None) => {
                    error!("Signature: {} was not resolved!", function.name());
                    function.address = None;
                    missing.push(function.name().to_string());
                }
                Err(e) => {
                    error!("Signature: {} is invalid: {}", function.name(), e);
                    function.address = None;
                    missing.push(function.name().to_string());
                }
            }
        }

        let report = ScanReport {
            resolved: self.functions.len() - missing.len(),
            missing,
            elapsed: start.elapsed(),
        };
        info!(
            "Sigscan elapsed: {} ms ({}/{} resolved)",
            report.elapsed.as_millis(),
            report.resolved,
            self.functions.len()
        );
        report
    }

    pub fn is_all_resolved(&self) -> bool {
        self.functions.iter().all(ResolvedFunction::is_resolved)
    }

    pub fn unresolved(&self) -> Vec<&str> {
        self.functions
            .iter()
            .filter(|f| !f.is_resolved())
            .map(ResolvedFunction::name)
            .collect()
    }

    /// Initialization gate: fails with every unresolved name if any is missing.
    pub fn ensure_all_resolved(&self) -> Result<()> {
        if self.is_all_resolved() {
            return Ok(());
        }
        Err(Error::UnresolvedSignatures(
            self.unresolved().into_iter().map(str::to_string).collect(),
        ))
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedFunction> {
        self.functions.iter().find(|f| f.name() == name)
    }

    pub fn address(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|f| f.address)
    }

    pub fn set_original(&mut self, name: &str, original: usize) -> Result<()> {
        let function = self
            .functions
            .iter_mut()
            .find(|f| f.signature.name == name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
        function.original = Some(original);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedFunction> {
        self.functions.iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

//! Hook installation
//!
//! The inline-hooking mechanism sits behind [`HookBackend`] so that the
//! installer's all-or-nothing rules can be exercised without patching code.

#[cfg(test)]
pub mod mock;

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::scan::FunctionRegistry;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Inline hooking primitive.
pub trait HookBackend {
    /// Build a detour from `target` to `replacement` without enabling it.
    /// Returns the address of a callable trampoline to the original code.
    ///
    /// # Safety
    /// `target` must be the entry of a function in executable memory and
    /// `replacement` a function with the same ABI and signature.
    unsafe fn create(
        &mut self,
        target: usize,
        replacement: usize,
    ) -> std::result::Result<usize, BackendError>;

    /// Redirect the entry of a previously created detour.
    ///
    /// # Safety
    /// Every original a replacement may call must already be published.
    unsafe fn enable(&mut self, target: usize) -> std::result::Result<(), BackendError>;
}

/// Slot holding the trampoline of one hooked function.
///
/// Set once during installation; replacements read it to forward calls.
pub struct OriginalFn {
    name: &'static str,
    address: AtomicUsize,
}

impl OriginalFn {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            address: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> Option<usize> {
        match self.address.load(Ordering::Acquire) {
            0 => None,
            address => Some(address),
        }
    }

    /// Reinterpret the trampoline as a function pointer of type `F`.
    ///
    /// # Safety
    /// `F` must be a function pointer type matching the hooked function.
    pub unsafe fn as_fn<F: Copy>(&self) -> Option<F> {
        debug_assert_eq!(size_of::<F>(), size_of::<usize>());
        // SAFETY: caller guarantees F is a pointer-sized fn type for this target.
        self.get()
            .map(|address| unsafe { std::mem::transmute_copy::<usize, F>(&address) })
    }

    fn publish(&self, address: usize) {
        self.address.store(address, Ordering::Release);
    }
}

/// Pairs a registry entry with the replacement that intercepts it.
#[derive(Clone, Copy)]
pub struct HookBinding {
    pub original: &'static OriginalFn,
    pub replacement: usize,
}

impl HookBinding {
    pub fn new(original: &'static OriginalFn, replacement: usize) -> Self {
        Self {
            original,
            replacement,
        }
    }

    pub fn name(&self) -> &'static str {
        self.original.name()
    }
}

pub struct HookInstaller<B: HookBackend> {
    backend: B,
    installed: Vec<&'static str>,
}

impl<B: HookBackend> HookInstaller<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            installed: Vec::new(),
        }
    }

    pub fn installed(&self) -> &[&'static str] {
        &self.installed
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Install every binding or fail as a whole.
    ///
    /// Nothing is touched unless the registry is fully resolved. All detours
    /// are created and their originals published before the first one is
    /// enabled.
    ///
    /// # Safety
    /// Resolved addresses must point at the functions their signatures
    /// describe, and each replacement must match its target's ABI.
    pub unsafe fn install_all(
        &mut self,
        registry: &mut FunctionRegistry,
        bindings: &[HookBinding],
    ) -> Result<usize> {
        registry.ensure_all_resolved()?;

        let mut targets = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let address = registry
                .address(binding.name())
                .ok_or_else(|| Error::UnknownFunction(binding.name().to_string()))?;
            targets.push(address);
        }

        info!("Applying hooks...");
        for (binding, &address) in bindings.iter().zip(&targets) {
            // SAFETY: forwarded from the caller's contract.
            let original =
                unsafe { self.backend.create(address as usize, binding.replacement) }
                    .map_err(|e| hook_failed(binding.name(), address, e))?;
            registry.set_original(binding.name(), original)?;
            binding.original.publish(original);
            debug!(
                "Created hook {} at {:#x}, original at {:#x}",
                binding.name(),
                address,
                original
            );
        }

        for (binding, &address) in bindings.iter().zip(&targets) {
            // SAFETY: every original was published in the loop above.
            unsafe { self.backend.enable(address as usize) }
                .map_err(|e| hook_failed(binding.name(), address, e))?;
            self.installed.push(binding.name());
        }

        info!("Hooks applied successfully! ({} hooks)", self.installed.len());
        Ok(self.installed.len())
    }
}

fn hook_failed(name: &str, address: u64, e: BackendError) -> Error {
    error!("FATAL: Failed to install {} hook.", name);
    Error::HookInstallFailed {
        name: name.to_string(),
        address,
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;
    use crate::scan::{FunctionSignature, SignatureScanner};

    static ORIG_A: OriginalFn = OriginalFn::new("A");
    static ORIG_B: OriginalFn = OriginalFn::new("B");
    static ORIG_FAIL: OriginalFn = OriginalFn::new("Fail");
    static ORIG_GATED: OriginalFn = OriginalFn::new("Gated");

    const CODE: [u8; 8] = [0x48, 0x85, 0xD2, 0xCC, 0x40, 0x53, 0xCC, 0xCC];

    fn registry(entries: &[(&str, &str)]) -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        for (name, pattern) in entries {
            registry
                .declare(FunctionSignature::pattern(name, pattern))
                .unwrap();
        }
        let scanner = SignatureScanner::new(0x1000, 0x100).with_region(0, &CODE);
        registry.resolve_all(&scanner);
        registry
    }

    #[test]
    fn test_installs_every_binding_when_resolved() {
        let mut registry = registry(&[("A", "48 85 D2"), ("B", "40 53")]);
        let bindings = [
            HookBinding::new(&ORIG_A, 0xA0A0),
            HookBinding::new(&ORIG_B, 0xB0B0),
        ];
        let mut installer = HookInstaller::new(MockBackend::default());

        let count = unsafe { installer.install_all(&mut registry, &bindings) }.unwrap();
        assert_eq!(count, 2);
        assert_eq!(installer.installed(), &["A", "B"]);

        let backend = installer.backend();
        assert_eq!(backend.created, vec![(0x1000, 0xA0A0), (0x1004, 0xB0B0)]);
        assert_eq!(backend.enabled, vec![0x1000, 0x1004]);
        assert_eq!(ORIG_A.get(), Some(MockBackend::trampoline_for(0x1000)));
        assert_eq!(
            registry.get("B").unwrap().original,
            Some(MockBackend::trampoline_for(0x1004))
        );
    }

    #[test]
    fn test_no_hook_when_any_signature_unresolved() {
        let mut registry = registry(&[("Gated", "48 85 D2"), ("Missing", "0F 0B")]);
        let bindings = [HookBinding::new(&ORIG_GATED, 0x1)];
        let mut installer = HookInstaller::new(MockBackend::default());

        let err = unsafe { installer.install_all(&mut registry, &bindings) }.unwrap_err();
        assert!(err.is_incompatible_host());
        assert!(installer.backend().created.is_empty());
        assert!(installer.backend().enabled.is_empty());
        assert_eq!(ORIG_GATED.get(), None);
    }

    #[test]
    fn test_enable_failure_is_fatal() {
        let mut registry = registry(&[("Fail", "40 53")]);
        let bindings = [HookBinding::new(&ORIG_FAIL, 0x2)];
        let mut installer = HookInstaller::new(MockBackend::failing_enable(0x1004));

        let err = unsafe { installer.install_all(&mut registry, &bindings) }.unwrap_err();
        assert!(matches!(err, Error::HookInstallFailed { ref name, .. } if name == "Fail"));
        assert!(installer.installed().is_empty());
    }

    #[test]
    fn test_binding_for_undeclared_function() {
        static ORPHAN: OriginalFn = OriginalFn::new("Orphan");
        let mut registry = registry(&[("A", "48 85 D2")]);
        let bindings = [HookBinding::new(&ORPHAN, 0x3)];
        let mut installer = HookInstaller::new(MockBackend::default());

        let err = unsafe { installer.install_all(&mut registry, &bindings) }.unwrap_err();
        assert!(matches!(err, Error::UnknownFunction(_)));
        assert!(installer.backend().created.is_empty());
    }

    #[test]
    fn test_original_fn_cast() {
        static SLOT: OriginalFn = OriginalFn::new("Cast");
        extern "C" fn answer() -> i32 {
            42
        }
        assert!(unsafe { SLOT.as_fn::<extern "C" fn() -> i32>() }.is_none());
        SLOT.publish(answer as usize);
        let f = unsafe { SLOT.as_fn::<extern "C" fn() -> i32>() }.unwrap();
        assert_eq!(f(), 42);
    }
}

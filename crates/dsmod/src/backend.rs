//! Inline hooks through retour.

use dsmod_core::{BackendError, HookBackend};
use retour::RawDetour;

/// Owns every detour. Dropping it unhooks, so the mod leaks it once
/// installation succeeds.
#[derive(Default)]
pub struct RetourBackend {
    detours: Vec<(usize, RawDetour)>,
}

impl RetourBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detours.is_empty()
    }

    fn detour(&self, target: usize) -> Result<&RawDetour, BackendError> {
        self.detours
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, detour)| detour)
            .ok_or_else(|| format!("no detour created for {:#x}", target).into())
    }
}

impl HookBackend for RetourBackend {
    unsafe fn create(&mut self, target: usize, replacement: usize) -> Result<usize, BackendError> {
        // SAFETY: forwarded from the trait contract.
        let detour = unsafe { RawDetour::new(target as *const (), replacement as *const ()) }
            .map_err(|e| e.to_string())?;
        let trampoline = detour.trampoline() as *const () as usize;
        self.detours.push((target, detour));
        Ok(trampoline)
    }

    unsafe fn enable(&mut self, target: usize) -> Result<(), BackendError> {
        let detour = self.detour(target)?;
        // SAFETY: forwarded from the trait contract.
        unsafe { detour.enable() }.map_err(|e| e.to_string())?;
        Ok(())
    }
}

//! Recording hook backend for tests

use super::{BackendError, HookBackend};

#[derive(Debug, Default)]
pub struct MockBackend {
    pub created: Vec<(usize, usize)>,
    pub enabled: Vec<usize>,
    fail_enable: Option<usize>,
}

impl MockBackend {
    pub fn failing_enable(target: usize) -> Self {
        Self {
            fail_enable: Some(target),
            ..Default::default()
        }
    }

    pub fn trampoline_for(target: usize) -> usize {
        target | 0x7f00_0000
    }
}

impl HookBackend for MockBackend {
    unsafe fn create(
        &mut self,
        target: usize,
        replacement: usize,
    ) -> Result<usize, BackendError> {
        self.created.push((target, replacement));
        Ok(Self::trampoline_for(target))
    }

    unsafe fn enable(&mut self, target: usize) -> Result<(), BackendError> {
        if self.fail_enable == Some(target) {
            return Err(format!("target {:#x} is not patchable", target).into());
        }
        self.enabled.push(target);
        Ok(())
    }
}

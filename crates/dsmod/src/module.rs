//! The game's own module, as loaded in this process.

use std::ops::Range;
use std::slice;

use anyhow::{Context, Result};
use dsmod_core::SignatureScanner;
use dsmod_core::scan::pe::PeLayout;
use tracing::debug;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::core::PCWSTR;

/// Headers of a loaded image always fit in its first page
const HEADER_PAGE: usize = 0x1000;

pub struct MainModule {
    base: usize,
    layout: PeLayout,
}

impl MainModule {
    pub fn current() -> Result<Self> {
        // SAFETY: a null name returns the handle of the process executable.
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .context("GetModuleHandleW failed")?;
        let base = module.0 as usize;

        // SAFETY: the loader maps the header page of every module readable.
        let headers = unsafe { slice::from_raw_parts(base as *const u8, HEADER_PAGE) };
        let layout = PeLayout::parse(headers).context("Failed to parse module headers")?;
        debug!(
            "Module image: {:#x} bytes, {} sections",
            layout.size_of_image,
            layout.sections.len()
        );
        Ok(Self { base, layout })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Addresses covered by the mapped image
    pub fn image_range(&self) -> Range<usize> {
        self.base..self.base + self.layout.size_of_image as usize
    }

    /// Scanner over the module's executable sections, read in place.
    pub fn scanner(&self) -> SignatureScanner<'static> {
        let mut scanner =
            SignatureScanner::new(self.base as u64, self.layout.size_of_image as u64);
        for section in self.layout.executable_sections() {
            let start = self.base + section.virtual_address as usize;
            // SAFETY: executable sections of the running module stay mapped
            // and readable for the life of the process.
            let bytes =
                unsafe { slice::from_raw_parts(start as *const u8, section.mapped_size() as usize) };
            debug!(
                "Scanning {} at {:#x} ({:#x} bytes)",
                section.name,
                start,
                bytes.len()
            );
            scanner = scanner.with_region(section.virtual_address as u64, bytes);
        }
        scanner
    }
}

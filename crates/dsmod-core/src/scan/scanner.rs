use tracing::debug;

use crate::error::{Error, Result};
use crate::scan::pe::PeLayout;
use crate::scan::signature::{FunctionSignature, Locator, Pattern, signed_hex};

/// A contiguous run of code bytes at a known RVA.
#[derive(Debug, Clone, Copy)]
pub struct CodeRegion<'a> {
    pub rva: u64,
    pub bytes: &'a [u8],
}

/// Linear signature scanner over the code sections of one module image.
///
/// Meant to run once at startup; a multi-megabyte `.text` takes a few
/// milliseconds, which is too slow for any per-frame use.
pub struct SignatureScanner<'a> {
    base: u64,
    image_size: u64,
    regions: Vec<CodeRegion<'a>>,
}

impl<'a> SignatureScanner<'a> {
    pub fn new(base: u64, image_size: u64) -> Self {
        Self {
            base,
            image_size,
            regions: Vec::new(),
        }
    }

    pub fn with_region(mut self, rva: u64, bytes: &'a [u8]) -> Self {
        self.regions.push(CodeRegion { rva, bytes });
        self
    }

    /// Scanner over the executable sections of a mapped image buffer.
    pub fn for_mapped_image(layout: &PeLayout, image: &'a [u8], base: u64) -> Self {
        let mut scanner = Self::new(base, layout.size_of_image as u64);
        for section in layout.executable_sections() {
            let start = section.virtual_address as usize;
            let end = (start + section.mapped_size() as usize).min(image.len());
            if start < end {
                scanner = scanner.with_region(start as u64, &image[start..end]);
            }
        }
        scanner
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn regions(&self) -> &[CodeRegion<'a>] {
        &self.regions
    }

    /// Resolve a signature to an absolute address.
    ///
    /// Returns `Ok(None)` when the pattern is not present; an invalid pattern
    /// or a result outside the image is an error.
    pub fn scan(&self, signature: &FunctionSignature) -> Result<Option<u64>> {
        match &signature.locator {
            Locator::Rva { rva } => {
                if *rva >= self.image_size {
                    return Err(Error::InvalidSignature(format!(
                        "{}: rva {:#x} outside image of {:#x} bytes",
                        signature.name, rva, self.image_size
                    )));
                }
                Ok(Some(self.base + rva))
            }
            Locator::Pattern { pattern, offset } => {
                let pattern = Pattern::parse(pattern)
                    .map_err(|e| Error::InvalidSignature(format!("{}: {}", signature.name, e)))?;
                let Some(found) = self.find(&pattern) else {
                    return Ok(None);
                };
                let address = found.wrapping_add_signed(*offset);
                if !self.contains(address) {
                    return Err(Error::InvalidSignature(format!(
                        "{}: offset {} leaves the image",
                        signature.name,
                        signed_hex(*offset)
                    )));
                }
                Ok(Some(address))
            }
        }
    }

    fn contains(&self, address: u64) -> bool {
        address
            .checked_sub(self.base)
            .is_some_and(|rva| rva < self.image_size)
    }

    /// First absolute address matching the pattern across all regions.
    pub fn find(&self, pattern: &Pattern) -> Option<u64> {
        self.regions.iter().find_map(|region| {
            find_pattern(region.bytes, pattern).map(|pos| {
                let address = self.base + region.rva + pos as u64;
                debug!("Pattern matched at {:#x} (rva {:#x})", address, address - self.base);
                address
            })
        })
    }
}

/// Offset of the first masked match of `pattern` in `haystack`.
///
/// Candidates come from `memchr` on the first literal byte, so wildcard-heavy
/// prefixes do not degrade into a byte-by-byte compare.
pub fn find_pattern(haystack: &[u8], pattern: &Pattern) -> Option<usize> {
    if pattern.is_empty() || haystack.len() < pattern.len() {
        return None;
    }
    let (anchor_idx, anchor_byte) = pattern.anchor();
    let last_start = haystack.len() - pattern.len();

    memchr::memchr_iter(anchor_byte, &haystack[anchor_idx..])
        .take_while(|&start| start <= last_start)
        .find(|&start| pattern.matches(&haystack[start..]))
}

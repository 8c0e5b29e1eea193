//! PE32+ header reading on top of `object`
//!
//! Only what the scanner needs: image size, preferred base and the section
//! table. Works on the in-memory image of a loaded module as well as on the
//! raw bytes of an executable file.

use object::LittleEndian as LE;
use object::pe::{
    IMAGE_SCN_CNT_CODE, IMAGE_SCN_MEM_EXECUTE, ImageDosHeader, ImageNtHeaders64,
    ImageSectionHeader,
};
use object::read::pe::{ImageNtHeaders, ImageOptionalHeader};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub raw_offset: u32,
    pub raw_size: u32,
    pub characteristics: u32,
}

impl Section {
    fn from_header(header: &ImageSectionHeader) -> Self {
        Self {
            name: String::from_utf8_lossy(header.raw_name()).into_owned(),
            virtual_address: header.virtual_address.get(LE),
            virtual_size: header.virtual_size.get(LE),
            raw_offset: header.pointer_to_raw_data.get(LE),
            raw_size: header.size_of_raw_data.get(LE),
            characteristics: header.characteristics.get(LE),
        }
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics & (IMAGE_SCN_MEM_EXECUTE | IMAGE_SCN_CNT_CODE) != 0
    }

    /// Bytes of the section that are backed by the image.
    pub fn mapped_size(&self) -> u32 {
        if self.virtual_size == 0 {
            self.raw_size
        } else {
            self.virtual_size
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeLayout {
    pub image_base: u64,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub sections: Vec<Section>,
}

impl PeLayout {
    pub fn parse(headers: &[u8]) -> Result<Self> {
        let dos = ImageDosHeader::parse(headers).map_err(invalid)?;
        let mut offset = dos.nt_headers_offset().into();
        let (nt, _) = ImageNtHeaders64::parse(headers, &mut offset).map_err(invalid)?;
        let optional = nt.optional_header();
        let sections = nt
            .sections(headers, offset)
            .map_err(invalid)?
            .iter()
            .map(Section::from_header)
            .collect();

        Ok(Self {
            image_base: optional.image_base(),
            size_of_image: optional.size_of_image(),
            size_of_headers: optional.size_of_headers(),
            sections,
        })
    }

    pub fn executable_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.is_executable())
    }
}

/// Lay out an executable file the way the loader maps it, so that offsets
/// into the returned buffer are RVAs.
pub fn map_image(file: &[u8]) -> Result<(PeLayout, Vec<u8>)> {
    let layout = PeLayout::parse(file)?;
    let mut image = vec![0u8; layout.size_of_image as usize];

    let header_len = (layout.size_of_headers as usize)
        .min(file.len())
        .min(image.len());
    image[..header_len].copy_from_slice(&file[..header_len]);

    for section in &layout.sections {
        let len = section.raw_size.min(section.mapped_size()) as usize;
        let src_start = section.raw_offset as usize;
        let dst_start = section.virtual_address as usize;
        let src = file.get(src_start..src_start + len).ok_or_else(|| {
            Error::InvalidImage(format!("section {} exceeds file size", section.name))
        })?;
        let dst = image.get_mut(dst_start..dst_start + len).ok_or_else(|| {
            Error::InvalidImage(format!("section {} exceeds image size", section.name))
        })?;
        dst.copy_from_slice(src);
    }

    Ok((layout, image))
}

fn invalid(e: object::read::Error) -> Error {
    Error::InvalidImage(e.to_string())
}

/// Builds a small PE32+ file for tests: headers in the first 0x200 bytes,
/// sections packed after them with file alignment 0x200.
#[cfg(test)]
pub(crate) fn build_test_pe(sections: &[(&str, u32, &[u8], bool)]) -> Vec<u8> {
    use object::pe::{
        IMAGE_DOS_SIGNATURE, IMAGE_FILE_MACHINE_AMD64, IMAGE_NT_OPTIONAL_HDR64_MAGIC,
        IMAGE_NT_SIGNATURE,
    };

    const NT: usize = 0x80;
    const HEADERS: usize = 0x200;
    const OPTIONAL_SIZE: usize = 240;
    const SECTION_HEADER_SIZE: usize = 40;

    let put = |file: &mut Vec<u8>, at: usize, bytes: &[u8]| {
        file[at..at + bytes.len()].copy_from_slice(bytes);
    };

    let size_of_image = sections
        .iter()
        .map(|(_, va, data, _)| *va as usize + data.len())
        .max()
        .unwrap_or(HEADERS)
        .next_multiple_of(0x1000);

    let mut file = vec![0u8; HEADERS];
    put(&mut file, 0, &IMAGE_DOS_SIGNATURE.to_le_bytes());
    put(&mut file, 0x3C, &(NT as u32).to_le_bytes());
    put(&mut file, NT, &IMAGE_NT_SIGNATURE.to_le_bytes());
    let coff = NT + 4;
    put(&mut file, coff, &IMAGE_FILE_MACHINE_AMD64.to_le_bytes());
    put(&mut file, coff + 2, &(sections.len() as u16).to_le_bytes());
    put(&mut file, coff + 16, &(OPTIONAL_SIZE as u16).to_le_bytes());
    let optional = coff + 20;
    put(&mut file, optional, &IMAGE_NT_OPTIONAL_HDR64_MAGIC.to_le_bytes());
    put(&mut file, optional + 24, &0x1_4000_0000u64.to_le_bytes());
    put(&mut file, optional + 56, &(size_of_image as u32).to_le_bytes());
    put(&mut file, optional + 60, &(HEADERS as u32).to_le_bytes());
    put(&mut file, optional + 108, &16u32.to_le_bytes());

    let mut table = optional + OPTIONAL_SIZE;
    for (name, va, data, exec) in sections {
        let raw_offset = file.len();
        let raw_size = data.len().next_multiple_of(0x200);
        file.extend_from_slice(data);
        file.resize(raw_offset + raw_size, 0);

        let characteristics: u32 = if *exec {
            IMAGE_SCN_CNT_CODE | IMAGE_SCN_MEM_EXECUTE
        } else {
            0x4000_0040
        };
        let n = name.len().min(8);
        put(&mut file, table, &name.as_bytes()[..n]);
        put(&mut file, table + 8, &(data.len() as u32).to_le_bytes());
        put(&mut file, table + 12, &va.to_le_bytes());
        put(&mut file, table + 16, &(raw_size as u32).to_le_bytes());
        put(&mut file, table + 20, &(raw_offset as u32).to_le_bytes());
        put(&mut file, table + 36, &characteristics.to_le_bytes());
        table += SECTION_HEADER_SIZE;
    }

    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let file = build_test_pe(&[
            (".text", 0x1000, &[0x90; 16], true),
            (".rdata", 0x2000, &[0x00; 8], false),
        ]);
        let layout = PeLayout::parse(&file).unwrap();
        assert_eq!(layout.image_base, 0x1_4000_0000);
        assert_eq!(layout.size_of_image, 0x3000);
        assert_eq!(layout.sections.len(), 2);
        assert_eq!(layout.sections[0].name, ".text");
        assert_eq!(layout.executable_sections().count(), 1);
    }

    #[test]
    fn test_map_image_places_sections_at_rva() {
        let code = [0x48, 0x85, 0xD2, 0x74, 0x05];
        let file = build_test_pe(&[(".text", 0x1000, &code, true)]);
        let (layout, image) = map_image(&file).unwrap();
        assert_eq!(image.len(), layout.size_of_image as usize);
        assert_eq!(&image[0x1000..0x1005], &code);
        assert_eq!(&image[0..2], b"MZ");
    }

    #[test]
    fn test_rejects_non_pe() {
        assert!(PeLayout::parse(b"not an image at all").is_err());
        assert!(PeLayout::parse(&[]).is_err());
    }

    #[test]
    fn test_rejects_pe32() {
        let mut file = build_test_pe(&[(".text", 0x1000, &[0xC3], true)]);
        file[0x98..0x9A].copy_from_slice(&0x10Bu16.to_le_bytes());
        assert!(matches!(PeLayout::parse(&file), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_truncated_section_table() {
        let file = build_test_pe(&[(".text", 0x1000, &[0xC3], true)]);
        let mut headers = file[..0x200].to_vec();
        // claim more sections than the header block holds
        headers[0x86..0x88].copy_from_slice(&64u16.to_le_bytes());
        assert!(matches!(PeLayout::parse(&headers), Err(Error::InvalidImage(_))));
    }
}

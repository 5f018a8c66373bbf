//! Minimal PE64 parsing: headers, section table, export directory.
//!
//! This is not a general PE toolkit. It reads exactly what sysid
//! resolution needs and refuses anything that does not check out, with a
//! distinct error per failure so callers can tell a bad signature from a
//! truncated read.

use crate::error::{Error, Result};
use crate::pe::source::{DiskImage, ImageSource, MemoryImage};
use core::ffi::CStr;
use core::mem::size_of;
use std::path::Path;
use windows::Win32::System::Diagnostics::Debug::{
    IMAGE_FILE_HEADER, IMAGE_NT_HEADERS64, IMAGE_SECTION_HEADER,
};
use windows::Win32::System::SystemServices::{
    IMAGE_DOS_HEADER, IMAGE_DOS_SIGNATURE, IMAGE_EXPORT_DIRECTORY, IMAGE_NT_SIGNATURE,
};

pub const IMAGE_DIRECTORY_ENTRY_EXPORT: usize = 0;

/// One entry of the export directory.
///
/// `name` is empty for exports that only exist by ordinal; PE files really
/// do ship these, so nothing here assumes a name is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub ordinal: u32,
    /// RVA of the exported symbol
    pub virtual_address: u32,
}

/// One section header, reduced to the fields RVA translation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub pointer_to_raw_data: u32,
    pub size_of_raw_data: u32,
}

/// A parsed PE image over either source kind.
///
/// # Usage
///
/// ```ignore
/// // loaded module, RVAs index the snapshot directly
/// let mapped = PeFile::from_memory(range.base, range.size as usize)?;
///
/// // file on disk, RVAs go through the section table
/// let file = PeFile::open(r"C:\Windows\system32\ntdll.dll")?;
///
/// for export in file.exports() {
///     println!("#{} {} -> {:#x}", export.ordinal, export.name, export.virtual_address);
/// }
/// ```
pub struct PeFile {
    source: Box<dyn ImageSource>,
    sections: Vec<Section>,
    exports: Vec<Export>,
}

impl PeFile {
    /// Parse the file at `path` in disk layout.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_source(Box::new(DiskImage::open(path)?))
    }

    /// Snapshot and parse an image already mapped at `base`. The range must
    /// come from the loader walk; see [`MemoryImage::snapshot`].
    pub fn from_memory(base: u64, size: usize) -> Result<Self> {
        Self::from_source(Box::new(MemoryImage::snapshot(base, size)))
    }

    /// Parse an image from any byte provider.
    pub fn from_source(source: Box<dyn ImageSource>) -> Result<Self> {
        let (sections, exports) = {
            let bytes = source.bytes();

            // 'MZ'
            let dos: IMAGE_DOS_HEADER = read_struct(bytes, 0)?;
            if dos.e_magic != IMAGE_DOS_SIGNATURE {
                return Err(Error::DosSignature { found: dos.e_magic });
            }

            // 'PE\0\0'
            let nt_offset = dos.e_lfanew as usize;
            let nt: IMAGE_NT_HEADERS64 = read_struct(bytes, nt_offset)?;
            if nt.Signature != IMAGE_NT_SIGNATURE {
                return Err(Error::NtSignature { found: nt.Signature });
            }

            let section_offset = nt_offset
                + size_of::<u32>()
                + size_of::<IMAGE_FILE_HEADER>()
                + nt.FileHeader.SizeOfOptionalHeader as usize;

            let mut sections = Vec::with_capacity(nt.FileHeader.NumberOfSections as usize);
            for i in 0..nt.FileHeader.NumberOfSections as usize {
                let header: IMAGE_SECTION_HEADER =
                    read_struct(bytes, section_offset + i * size_of::<IMAGE_SECTION_HEADER>())?;
                sections.push(Section {
                    name: section_name(&header.Name),
                    virtual_address: header.VirtualAddress,
                    virtual_size: unsafe { header.Misc.VirtualSize },
                    pointer_to_raw_data: header.PointerToRawData,
                    size_of_raw_data: header.SizeOfRawData,
                });
            }

            let directory = nt.OptionalHeader.DataDirectory[IMAGE_DIRECTORY_ENTRY_EXPORT];
            if directory.VirtualAddress == 0 {
                return Err(Error::NoExportDirectory);
            }

            let exports = parse_exports(&*source, &sections, directory.VirtualAddress)?;
            (sections, exports)
        };

        Ok(Self {
            source,
            sections,
            exports,
        })
    }

    /// Whole image as visible to the underlying source.
    pub fn bytes(&self) -> &[u8] {
        self.source.bytes()
    }

    /// Owned copy of an exact byte range.
    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.source.read(offset, len)
    }

    /// Offset into [`PeFile::bytes`] for `rva`, honoring the source's layout.
    pub fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        self.source.rva_to_offset(&self.sections, rva)
    }

    /// Exports in function-table (ordinal) order.
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }
}

/// Walk the three export tables into a flat list.
///
/// The function table defines the entries; the name and name-ordinal tables
/// only decorate them. An entry nothing names stays an ordinal-only export
/// with an empty name.
fn parse_exports(
    source: &dyn ImageSource,
    sections: &[Section],
    directory_rva: u32,
) -> Result<Vec<Export>> {
    let bytes = source.bytes();
    let directory_offset = source.rva_to_offset(sections, directory_rva)?;
    let directory: IMAGE_EXPORT_DIRECTORY = read_struct(bytes, directory_offset)?;

    let funcs_offset = source.rva_to_offset(sections, directory.AddressOfFunctions)?;
    let names_offset = source.rva_to_offset(sections, directory.AddressOfNames)?;
    let ordinals_offset = source.rva_to_offset(sections, directory.AddressOfNameOrdinals)?;

    let func_count = directory.NumberOfFunctions as usize;
    if funcs_offset + func_count * size_of::<u32>() > bytes.len() {
        return Err(Error::Truncated {
            offset: funcs_offset,
            len: bytes.len(),
        });
    }

    let mut exports = Vec::with_capacity(func_count);
    for i in 0..func_count {
        exports.push(Export {
            name: String::new(),
            ordinal: directory.Base + i as u32,
            virtual_address: u32_at(bytes, funcs_offset + i * size_of::<u32>())?,
        });
    }

    for i in 0..directory.NumberOfNames as usize {
        let name_rva = u32_at(bytes, names_offset + i * size_of::<u32>())?;
        let name_offset = source.rva_to_offset(sections, name_rva)?;
        let name = cstr_at(bytes, name_offset)?;

        // the name-ordinal table holds unbiased indexes into the function table
        let index = u16_at(bytes, ordinals_offset + i * size_of::<u16>())? as usize;
        if let Some(export) = exports.get_mut(index) {
            export.name = name;
        }
    }

    Ok(exports)
}

fn read_struct<T: Copy>(bytes: &[u8], offset: usize) -> Result<T> {
    let end = offset.checked_add(size_of::<T>()).ok_or(Error::Truncated {
        offset,
        len: bytes.len(),
    })?;
    if end > bytes.len() {
        return Err(Error::Truncated {
            offset,
            len: bytes.len(),
        });
    }

    Ok(unsafe { core::ptr::read_unaligned(bytes.as_ptr().add(offset) as *const T) })
}

fn u32_at(bytes: &[u8], offset: usize) -> Result<u32> {
    read_struct::<u32>(bytes, offset).map(u32::from_le)
}

fn u16_at(bytes: &[u8], offset: usize) -> Result<u16> {
    read_struct::<u16>(bytes, offset).map(u16::from_le)
}

fn cstr_at(bytes: &[u8], offset: usize) -> Result<String> {
    let tail = bytes.get(offset..).ok_or(Error::Truncated {
        offset,
        len: bytes.len(),
    })?;
    let cstr = CStr::from_bytes_until_nul(tail).map_err(|_| Error::Truncated {
        offset,
        len: bytes.len(),
    })?;

    Ok(cstr.to_string_lossy().into_owned())
}

fn section_name(raw: &[u8; 8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

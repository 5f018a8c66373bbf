//! Byte providers for PE images.
//!
//! The parser never cares where an image came from; it talks to one of two
//! sources. A [`MemoryImage`] is a snapshot of an image the loader already
//! mapped and relocated, so RVAs index it directly. A [`DiskImage`] is the
//! raw file, where RVAs only mean something after a trip through the
//! section table.

use crate::error::{Error, Result};
use crate::pe::parser::Section;
use std::fs;
use std::path::Path;

/// Capability set the parser needs from an image.
pub trait ImageSource {
    /// Whole image as visible to this source.
    fn bytes(&self) -> &[u8];

    /// Owned copy of an exact byte range.
    fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        self.bytes()
            .get(offset..offset + len)
            .map(<[u8]>::to_vec)
            .ok_or(Error::Truncated {
                offset,
                len: self.bytes().len(),
            })
    }

    /// Translate an RVA into an offset into [`ImageSource::bytes`].
    fn rva_to_offset(&self, sections: &[Section], rva: u32) -> Result<usize>;
}

/// Snapshot of an image that is already mapped into this process.
pub struct MemoryImage {
    buf: Vec<u8>,
}

impl MemoryImage {
    /// Copy `size` bytes starting at `base` out of the foreign mapping.
    ///
    /// The copy is a volatile byte-at-a-time read: the pages belong to the
    /// loader (and may be executable), and nothing may keep references into
    /// them once this returns. `base` and `size` must describe a mapping
    /// that is actually resident, i.e. come from the loader walk.
    pub fn snapshot(base: u64, size: usize) -> Self {
        let mut buf = Vec::with_capacity(size);
        for i in 0..size {
            let byte = unsafe { core::ptr::read_volatile((base as usize + i) as *const u8) };
            buf.push(byte);
        }

        Self { buf }
    }

    /// Wrap bytes the caller already holds in mapped layout (RVA == offset),
    /// e.g. an image dumped out of another process.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf }
    }
}

impl ImageSource for MemoryImage {
    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    // the loader already applied the section mapping, RVAs are offsets
    fn rva_to_offset(&self, _sections: &[Section], rva: u32) -> Result<usize> {
        if (rva as usize) < self.buf.len() {
            Ok(rva as usize)
        } else {
            Err(Error::RvaOutOfSections(rva))
        }
    }
}

/// An image file read from disk, still in file layout.
pub struct DiskImage {
    buf: Vec<u8>,
}

impl DiskImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            buf: fs::read(path)?,
        })
    }

    /// Wrap bytes the caller already holds in file layout.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf }
    }
}

impl ImageSource for DiskImage {
    fn bytes(&self) -> &[u8] {
        &self.buf
    }

    fn rva_to_offset(&self, sections: &[Section], rva: u32) -> Result<usize> {
        for section in sections {
            if rva >= section.virtual_address
                && rva < section.virtual_address + section.virtual_size
            {
                return Ok((rva - section.virtual_address + section.pointer_to_raw_data) as usize);
            }
        }

        Err(Error::RvaOutOfSections(rva))
    }
}

//! Resolves exported native functions into SysIDs, with mode-dependent
//! recovery when the in-memory stub turns out to be hooked.

pub mod halo;
pub mod sysid;

use crate::environment_block::loader::{file_name, in_memory_modules};
use crate::error::{Error, Result};
use crate::pe::PeFile;
use crate::resolver::sysid::{sysid_from_stub, STUB_WINDOW};

/// Where ntdll lives on every installation anyone cares about.
pub const NTDLL_DISK_PATH: &str = r"C:\Windows\system32\ntdll.dll";

/// Default module the resolver works against.
pub const NTDLL_MODULE_NAME: &str = "ntdll.dll";

/// How a [`Resolver`] obtains an image, and what it does when the stub it
/// lands on does not look like a syscall stub anymore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Resolve from the loaded module; a hooked stub is a hard error.
    Memory,
    /// Resolve from the file on disk; hooks never apply, but file reads are
    /// visible to anything watching the filesystem.
    Disk,
    /// Resolve from memory, and on a hooked stub silently re-open the image
    /// from disk and retry once.
    Auto,
    /// Resolve from memory, and on a hooked stub infer the SysID from a
    /// neighboring intact stub.
    HalosGate,
}

/// SysID resolver over one module image.
///
/// Holds the parsed image and the mode chosen at construction. Not safe to
/// share across threads while resolving: `Auto` mode swaps the image in
/// place when it falls back to disk. One resolver per thread, or serialize.
///
/// # Usage
///
/// ```ignore
/// let mut resolver = Resolver::new(ResolveMode::HalosGate)?;
/// let id = resolver.sysid_by_name("NtAllocateVirtualMemory")?;
/// ```
pub struct Resolver {
    image: PeFile,
    mode: ResolveMode,
    /// base of the in-memory mapping; zero whenever `image` is disk-backed,
    /// which is also what keeps `function_pointer` honest about returning a
    /// bare RVA in that case
    memory_base: u64,
    disk_path: String,
}

impl Resolver {
    /// Resolver over ntdll with the default name and disk path.
    pub fn new(mode: ResolveMode) -> Result<Self> {
        Self::named(mode, NTDLL_MODULE_NAME, NTDLL_DISK_PATH)
    }

    /// Resolver over an arbitrary module.
    ///
    /// Memory-flavored modes walk the loader list and take the first entry
    /// whose full path matches `disk_path` or whose file name matches
    /// `module_name`, both case-insensitively. `Disk` mode opens
    /// `disk_path` without touching the loader at all.
    pub fn named(mode: ResolveMode, module_name: &str, disk_path: &str) -> Result<Self> {
        match mode {
            ResolveMode::Disk => Ok(Self {
                image: PeFile::open(disk_path)?,
                mode,
                memory_base: 0,
                disk_path: disk_path.to_string(),
            }),
            ResolveMode::Memory | ResolveMode::Auto | ResolveMode::HalosGate => {
                let loads = in_memory_modules()?;
                for (path, range) in &loads {
                    if path.eq_ignore_ascii_case(disk_path)
                        || file_name(path).eq_ignore_ascii_case(module_name)
                    {
                        return Ok(Self {
                            image: PeFile::from_memory(range.base, range.size as usize)?,
                            mode,
                            memory_base: range.base,
                            disk_path: disk_path.to_string(),
                        });
                    }
                }

                Err(Error::ModuleNotFound {
                    name: module_name.to_string(),
                    path: disk_path.to_string(),
                })
            }
        }
    }

    /// Resolver over an image the caller already holds, e.g. one snapshotted
    /// from another process or built somewhere unusual. `memory_base` must
    /// be the mapping base for mapped images and zero for file-layout ones.
    pub fn from_image(mode: ResolveMode, image: PeFile, memory_base: u64, disk_path: &str) -> Self {
        Self {
            image,
            mode,
            memory_base,
            disk_path: disk_path.to_string(),
        }
    }

    /// SysID of the named export. The name match is exact, including case,
    /// and an empty name never matches anything.
    pub fn sysid_by_name(&mut self, name: &str) -> Result<u16> {
        self.resolve(name, 0, false)
    }

    /// SysID of the export carrying this ordinal. Some functions are only
    /// exported by ordinal; this is the path that still reaches them.
    pub fn sysid_by_ordinal(&mut self, ordinal: u32) -> Result<u16> {
        self.resolve("", ordinal, true)
    }

    /// Address of a named export: mapping base plus RVA. Matching here is
    /// case-insensitive, unlike SysID lookup. For a disk-backed image the
    /// base is zero and the result is a bare RVA; callers know which
    /// flavor of resolver they built.
    pub fn function_pointer(&self, name: &str) -> Result<u64> {
        for export in self.image.exports() {
            if !export.name.is_empty() && export.name.eq_ignore_ascii_case(name) {
                return Ok(self.memory_base + export.virtual_address as u64);
            }
        }

        Err(Error::ExportNotFound(name.to_string()))
    }

    /// GetProcAddress-shaped convenience: lookup with the error swallowed,
    /// address zero when the export is missing.
    pub fn procedure(&self, name: &str) -> Procedure {
        Procedure {
            address: self.function_pointer(name).unwrap_or_default(),
        }
    }

    /// Mapping base for memory-backed images, zero for disk-backed.
    pub fn memory_base(&self) -> u64 {
        self.memory_base
    }

    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    pub fn image(&self) -> &PeFile {
        &self.image
    }

    fn resolve(&mut self, name: &str, ordinal: u32, use_ordinal: bool) -> Result<u16> {
        match self.lookup(name, ordinal, use_ordinal) {
            Err(Error::MayBeHooked { found }) => self.recover(name, ordinal, use_ordinal, found),
            other => other,
        }
    }

    /// Mode-dependent handling of a hooked stub. Everything except
    /// `MayBeHooked` has already propagated by the time this runs.
    fn recover(
        &mut self,
        name: &str,
        ordinal: u32,
        use_ordinal: bool,
        found: [u8; STUB_WINDOW],
    ) -> Result<u16> {
        match self.mode {
            ResolveMode::Auto => {
                // the disk copy is what the hook overwrote, so read it from
                // the file instead; a failing reopen is reported as-is
                self.image = PeFile::open(&self.disk_path)?;
                self.memory_base = 0;
                self.lookup(name, ordinal, use_ordinal)
            }
            ResolveMode::HalosGate => {
                let offset = self.export_offset(name, ordinal, use_ordinal)?;
                let bytes = self.image.bytes();
                halo::sysid_from_neighbor(bytes, offset, bytes.len(), Error::MayBeHooked { found })
            }
            ResolveMode::Memory | ResolveMode::Disk => Err(Error::MayBeHooked { found }),
        }
    }

    /// Single-export SysID read: find the export, translate its RVA, pull
    /// the ID out of the stub's first bytes.
    fn lookup(&self, name: &str, ordinal: u32, use_ordinal: bool) -> Result<u16> {
        let offset = self.export_offset(name, ordinal, use_ordinal)?;
        let bytes = self.image.bytes();
        let window: [u8; STUB_WINDOW] = bytes
            .get(offset..offset + STUB_WINDOW)
            .and_then(|w| w.try_into().ok())
            .ok_or(Error::Truncated {
                offset,
                len: bytes.len(),
            })?;

        sysid_from_stub(&window)
    }

    fn export_offset(&self, name: &str, ordinal: u32, use_ordinal: bool) -> Result<usize> {
        for export in self.image.exports() {
            // a value can be exported by ordinal but carry no name; the
            // name arm therefore insists on a non-empty needle so those
            // entries stay unreachable by name
            let matched = if use_ordinal {
                export.ordinal == ordinal
            } else {
                !name.is_empty() && export.name == name
            };

            if matched {
                return self.image.rva_to_offset(export.virtual_address);
            }
        }

        Err(Error::ExportNotFound(if use_ordinal {
            format!("ordinal {ordinal}")
        } else {
            name.to_string()
        }))
    }
}

/// Address handle mirroring the shape of a windows `Proc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Procedure {
    address: u64,
}

impl Procedure {
    pub fn addr(&self) -> u64 {
        self.address
    }
}

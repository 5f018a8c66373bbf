use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Every failure this library can report.
///
/// Most variants are terminal for the call that produced them. The one
/// exception is [`Error::MayBeHooked`], which the resolver treats as a
/// recoverable signal in `Auto` and `HalosGate` modes; it carries the ten
/// bytes actually observed at the stub so a caller (or a log line) can see
/// what the hook left behind.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested module is not in the loader's module list.
    #[error("module not found ({name} / {path})")]
    ModuleNotFound {
        /// Module file name that was searched for
        name: String,
        /// Full path that was searched for
        path: String,
    },

    /// `e_magic` was not `MZ`.
    #[error("invalid IMAGE_DOS_SIGNATURE: {found:#06x}")]
    DosSignature {
        /// Value read where the signature should be
        found: u16,
    },

    /// The NT header signature was not `PE\0\0`.
    #[error("invalid IMAGE_NT_SIGNATURE: {found:#010x}")]
    NtSignature {
        /// Value read where the signature should be
        found: u32,
    },

    /// The export data directory is absent from the image.
    #[error("image has no export directory")]
    NoExportDirectory,

    /// A read would have run past the end of the image bytes.
    #[error("image truncated: read at {offset:#x} exceeds {len:#x}")]
    Truncated {
        /// Offset the read started at
        offset: usize,
        /// Total length of the image bytes
        len: usize,
    },

    /// An RVA that should be section-backed is not covered by any section.
    #[error("rva {0:#010x} lies outside every section")]
    RvaOutOfSections(u32),

    /// No export matched the requested name or ordinal.
    #[error("could not find export: {0}")]
    ExportNotFound(String),

    /// The stub's opening bytes do not match the syscall prologue.
    /// `found` is the ten-byte window as observed.
    #[error("may be hooked: wanted 4c8bd1b8.., got {found:02x?}")]
    MayBeHooked {
        /// The ten bytes read at the stub's entry
        found: [u8; 10],
    },

    /// No `syscall; ret` sequence was found in the resident ntdll.
    #[error("no syscall;ret gadget found in ntdll")]
    GadgetNotFound,

    /// A syscall returned a non-zero NTSTATUS.
    #[error("non-zero return from syscall: {0:#010x}")]
    NonZeroStatus(u32),

    /// A loader path could not be decoded from its UTF-16 buffer.
    #[error("undecodable module path in loader entry")]
    BadModulePath(#[from] std::string::FromUtf16Error),

    /// Disk image could not be opened or read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

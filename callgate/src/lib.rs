//! Resolve Windows syscall numbers and issue syscalls without ever calling
//! through ntdll's exported stubs.
//!
//! The exported stubs are where userland security products plant their
//! hooks, so everything here goes around them: the loaded ntdll image is
//! found by walking the PEB (no API calls), its export directory is parsed
//! by hand from either the in-memory mapping or the file on disk, and each
//! function's SysID is read straight out of its stub bytes. When a stub has
//! been overwritten, the resolver can fall back to the on-disk image or
//! infer the number from a neighboring intact stub (Halo's Gate).
//!
//! # Usage
//!
//! ```ignore
//! use callgate::{ResolveMode, Resolver};
//!
//! let mut resolver = Resolver::new(ResolveMode::HalosGate)?;
//! let id = resolver.sysid_by_name("NtAllocateVirtualMemory")?;
//!
//! // direct:
//! let status = unsafe { callgate::syscall::invoke(id, &args) };
//! // or through a borrowed syscall;ret inside ntdll:
//! let status = unsafe { callgate::syscall::syscall_via_gate(id, &args)? };
//! ```
//!
//! x86-64 Windows only; every offset and byte pattern in here is specific
//! to that environment.

pub mod environment_block;
pub mod error;
pub mod pe;
pub mod resolver;
pub mod syscall;
pub mod util;

pub use environment_block::loader::{in_memory_modules, ntdll_range, ModuleRange};
pub use error::{Error, Result};
pub use pe::{DiskImage, Export, ImageSource, MemoryImage, PeFile, Section};
pub use resolver::halo::{sysid_from_neighbor, NEXT_STUB_GAP, SYSCALL_RET};
pub use resolver::sysid::{sysid_from_stub, STUB_PROLOGUE, STUB_WINDOW};
pub use resolver::{Procedure, ResolveMode, Resolver, NTDLL_DISK_PATH, NTDLL_MODULE_NAME};
pub use syscall::find_syscall_ret;
pub use util::write_memory;

//! Walks the loader's module list straight out of process memory.
//!
//! No API calls are made anywhere in here; the PEB comes from a register
//! read and everything else is pointer-chasing through `Ldr`. The loader
//! owns every byte we look at, so the walk copies what it needs and never
//! writes.

use crate::environment_block::read_gs::GetBlock;
use crate::environment_block::types::{
    LDR_DATA_TABLE_ENTRY, PROCESS_ENVIRONMENT_BLOCK,
};
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use windows::Win32::Foundation::UNICODE_STRING;
use windows::Win32::System::Kernel::LIST_ENTRY;

lazy_static! {
    static ref GLOBAL_PEB: PROCESS_ENVIRONMENT_BLOCK = PROCESS_ENVIRONMENT_BLOCK::get();
}

unsafe impl Sync for PROCESS_ENVIRONMENT_BLOCK {}
unsafe impl Send for PROCESS_ENVIRONMENT_BLOCK {}

/// In-memory extent of one loaded module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRange {
    /// Image base as mapped into this process
    pub base: u64,
    /// `SizeOfImage` as the loader reports it
    pub size: u64,
}

/// `InMemoryOrderLinks` sits one `LIST_ENTRY` into the table entry, so the
/// containing record starts 0x10 bytes before the link we are holding.
const IN_MEMORY_ORDER_LINKS_OFFSET: isize = 0x10;

/// Enumerate every module in the current process.
///
/// Keys are full paths in whatever case the loader recorded them; look them
/// up case-insensitively. Values carry the module's base and image size.
///
/// # Usage
///
/// ```ignore
/// let loads = in_memory_modules()?;
/// for (path, range) in &loads {
///     println!("{path} @ {:#x} ({} bytes)", range.base, range.size);
/// }
/// ```
pub fn in_memory_modules() -> Result<HashMap<String, ModuleRange>> {
    let mut modules = HashMap::new();

    unsafe {
        let ldr = GLOBAL_PEB.LoaderData;
        let head = &(*ldr).InMemoryOrderModuleList as *const LIST_ENTRY;
        let mut link = (*head).Flink;

        // circular list; the walk is done when the link comes back around
        while link as *const LIST_ENTRY != head {
            let entry =
                link.byte_offset(-IN_MEMORY_ORDER_LINKS_OFFSET) as *const LDR_DATA_TABLE_ENTRY;

            if let Some(path) = unicode_to_string(&(*entry).FullDllName)? {
                modules.insert(
                    path,
                    ModuleRange {
                        base: (*entry).DllBase as u64,
                        size: (*entry).SizeOfImage as u64,
                    },
                );
            }

            link = (*link).Flink;
        }
    }

    Ok(modules)
}

/// In-memory extent of ntdll specifically. The neighbor search uses this to
/// know where stubs stop existing.
pub fn ntdll_range() -> Result<(u64, u64)> {
    let loads = in_memory_modules()?;
    for (path, range) in &loads {
        if file_name(path).eq_ignore_ascii_case("ntdll.dll") {
            return Ok((range.base, range.size));
        }
    }

    Err(Error::ModuleNotFound {
        name: "ntdll.dll".into(),
        path: String::new(),
    })
}

/// Last path component, tolerating either separator.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Copies a loader `UNICODE_STRING` into an owned `String`. Entries with a
/// null buffer (the list's terminal slot, some placeholder entries) come
/// back as `None`.
unsafe fn unicode_to_string(us: &UNICODE_STRING) -> Result<Option<String>> {
    if us.Buffer.is_null() || us.Length == 0 {
        return Ok(None);
    }

    let chars = core::slice::from_raw_parts(us.Buffer.as_ptr(), (us.Length / 2) as usize);
    Ok(Some(String::from_utf16(chars)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name(r"C:\Windows\system32\ntdll.dll"), "ntdll.dll");
        assert_eq!(file_name("ntdll.dll"), "ntdll.dll");
        assert_eq!(file_name("a/b/c.dll"), "c.dll");
    }

    // the walker itself only means anything inside a live win64 process
    #[test]
    #[cfg(windows)]
    fn walker_sees_ntdll() {
        let loads = in_memory_modules().unwrap();
        let hit = loads
            .keys()
            .find(|p| file_name(p).eq_ignore_ascii_case("ntdll.dll"));
        assert!(hit.is_some(), "ntdll should always be resident");

        let (base, size) = ntdll_range().unwrap();
        assert_ne!(base, 0);
        assert_ne!(size, 0);
    }
}

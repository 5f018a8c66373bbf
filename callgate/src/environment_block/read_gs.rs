use core::arch::asm;

use super::types::PROCESS_ENVIRONMENT_BLOCK;

/// Read a qword from an offset off the GS segment register.
///
/// On x64 the GS base points at the current thread's TEB; the PEB pointer
/// lives at `gs:[0x60]`. This is the whole trick that lets the walker run
/// without touching a single exported function.
#[inline]
#[cfg(target_arch = "x86_64")]
pub fn __readgsqword(offset: u64) -> u64 {
    let mut result: u64;
    unsafe {
        asm!(
            "mov {}, gs:[{:e}]",
            out(reg) result,
            in(reg) offset,
            options(nostack, pure, readonly),
        );
    }

    result
}

/// Register-relative access to a process-global block.
pub trait GetBlock {
    fn get_ptr() -> *const Self;
    fn get() -> Self
    where
        Self: Sized + Copy,
    {
        unsafe { *Self::get_ptr() }
    }
}

impl GetBlock for PROCESS_ENVIRONMENT_BLOCK {
    fn get_ptr() -> *const Self {
        __readgsqword(0x60) as *const Self
    }
}

//! Arity-indexed syscall trampolines.
//!
//! Callers stage the SysID (and optionally a gate address) into the
//! process-wide slots, then call the wrapper matching their argument
//! count. Each wrapper lays arguments out per the x64 syscall convention
//! (first four in rcx/rdx/r8/r9, the rest spilled above the shadow space)
//! and drops one call-frame into [`descend`], so the kernel sees the same
//! stack shape it would below a real ntdll stub.

#![allow(unused_assignments)]

use core::arch::asm;

static mut SYSTEM_CALL: u32 = 0;
static mut GATE_ADDRESS: u64 = 0;

/// Stage the SysID and gate for the next trampoline call. A zero gate
/// means "execute `syscall` locally"; anything else is jumped to and must
/// point at a `syscall; ret` sequence.
pub extern "system" fn set_syscall(sysid: u16, gate: u64) {
    unsafe {
        SYSTEM_CALL = sysid as u32;
        GATE_ADDRESS = gate;
    }
}

/// Zero the slots once the call is done.
pub extern "system" fn clear_syscall() {
    unsafe {
        SYSTEM_CALL = 0;
        GATE_ADDRESS = 0;
    }
}

/// The actual descent into the kernel.
///
/// With no gate staged this is the canonical stub body: `mov r10, rcx`,
/// SysID into eax, `syscall`. With a gate staged the final instruction is
/// instead a jump to the borrowed `syscall; ret`, parked in our own shadow
/// slot; the gadget's `ret` lands straight back in the wrapper, and the
/// `syscall` instruction itself never executes from this module's pages.
#[inline(never)]
#[cfg(target_arch = "x86_64")]
unsafe extern "system" fn descend() {
    asm!(
        "mov qword ptr ss:[rsp+0x08], {1:r}",
        "mov r10, rcx",
        "mov eax, {0:e}",
        "test {1:r}, {1:r}",
        "jnz 2f",
        "syscall",
        "jmp 3f",
        "2:",
        "jmp qword ptr ss:[rsp+0x08]",
        "3:",
        inout(reg) SYSTEM_CALL => _,
        inout(reg) GATE_ADDRESS => _,
        options(nostack),
    );
}

#[inline(never)]
#[cfg(target_arch = "x86_64")]
pub unsafe extern "system" fn syscall_4(args: *const u64) -> u32 {
    let mut status: u32 = 0;
    asm!(
        "sub rsp, 0x28",
        "call {d}",
        "add rsp, 0x28",

        in("rcx") *args.wrapping_add(0),
        in("rdx") *args.wrapping_add(1),
        in("r8") *args.wrapping_add(2),
        in("r9") *args.wrapping_add(3),

        d = sym descend,
        out("rax") status,

        clobber_abi("system"),
    );

    status
}

#[inline(never)]
#[cfg(target_arch = "x86_64")]
pub unsafe extern "system" fn syscall_6(args: *const u64) -> u32 {
    let mut status: u32 = 0;
    asm!(
        "sub rsp, 0x38",
        "mov r10, qword ptr [{a} + 0x20]",
        "mov qword ptr [rsp + 0x20], r10",
        "mov r10, qword ptr [{a} + 0x28]",
        "mov qword ptr [rsp + 0x28], r10",
        "mov rcx, qword ptr [{a}]",
        "mov rdx, qword ptr [{a} + 0x08]",
        "mov r8, qword ptr [{a} + 0x10]",
        "mov r9, qword ptr [{a} + 0x18]",
        "call {d}",
        "add rsp, 0x38",

        a = in(reg) args,
        d = sym descend,
        out("rax") status,

        clobber_abi("system"),
    );

    status
}

#[inline(never)]
#[cfg(target_arch = "x86_64")]
pub unsafe extern "system" fn syscall_8(args: *const u64) -> u32 {
    let mut status: u32 = 0;
    asm!(
        "sub rsp, 0x48",
        "mov r10, qword ptr [{a} + 0x20]",
        "mov qword ptr [rsp + 0x20], r10",
        "mov r10, qword ptr [{a} + 0x28]",
        "mov qword ptr [rsp + 0x28], r10",
        "mov r10, qword ptr [{a} + 0x30]",
        "mov qword ptr [rsp + 0x30], r10",
        "mov r10, qword ptr [{a} + 0x38]",
        "mov qword ptr [rsp + 0x38], r10",
        "mov rcx, qword ptr [{a}]",
        "mov rdx, qword ptr [{a} + 0x08]",
        "mov r8, qword ptr [{a} + 0x10]",
        "mov r9, qword ptr [{a} + 0x18]",
        "call {d}",
        "add rsp, 0x48",

        a = in(reg) args,
        d = sym descend,
        out("rax") status,

        clobber_abi("system"),
    );

    status
}

#[inline(never)]
#[cfg(target_arch = "x86_64")]
pub unsafe extern "system" fn syscall_11(args: *const u64) -> u32 {
    let mut status: u32 = 0;
    asm!(
        "sub rsp, 0x68",
        "mov r10, qword ptr [{a} + 0x20]",
        "mov qword ptr [rsp + 0x20], r10",
        "mov r10, qword ptr [{a} + 0x28]",
        "mov qword ptr [rsp + 0x28], r10",
        "mov r10, qword ptr [{a} + 0x30]",
        "mov qword ptr [rsp + 0x30], r10",
        "mov r10, qword ptr [{a} + 0x38]",
        "mov qword ptr [rsp + 0x38], r10",
        "mov r10, qword ptr [{a} + 0x40]",
        "mov qword ptr [rsp + 0x40], r10",
        "mov r10, qword ptr [{a} + 0x48]",
        "mov qword ptr [rsp + 0x48], r10",
        "mov r10, qword ptr [{a} + 0x50]",
        "mov qword ptr [rsp + 0x50], r10",
        "mov rcx, qword ptr [{a}]",
        "mov rdx, qword ptr [{a} + 0x08]",
        "mov r8, qword ptr [{a} + 0x10]",
        "mov r9, qword ptr [{a} + 0x18]",
        "call {d}",
        "add rsp, 0x68",

        a = in(reg) args,
        d = sym descend,
        out("rax") status,

        clobber_abi("system"),
    );

    status
}

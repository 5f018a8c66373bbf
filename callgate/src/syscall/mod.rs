//! Direct and recycled-gate syscall invocation.
//!
//! Resolution gives a SysID; this module spends it. `invoke` executes the
//! `syscall` instruction from our own text, `invoke_via_gate` borrows a
//! `syscall; ret` inside ntdll instead so the instruction retires from an
//! address every sane call stack would contain anyway.

pub mod stubs;

use crate::environment_block::loader::ntdll_range;
use crate::error::{Error, Result};
use crate::pe::source::{ImageSource, MemoryImage};
use crate::resolver::halo::SYSCALL_RET;
use rand::random_range;

/// Issue the syscall `sysid` with the given arguments, executing the
/// `syscall` instruction locally. Returns the raw NTSTATUS.
///
/// Arguments are passed through untyped; anything past the eleventh is
/// ignored. Handles and pointers travel as `usize`.
///
/// # Safety
///
/// This hands arbitrary values to an arbitrary kernel service. The caller
/// is responsible for the SysID matching the intended service on the
/// running build and for every argument being what that service expects.
pub unsafe fn invoke(sysid: u16, args: &[usize]) -> u32 {
    dispatch(sysid, 0, args)
}

/// Like [`invoke`], but instead of executing `syscall` here, jump to
/// `gate`, which must point at a `syscall; ret` sequence inside the
/// resident ntdll (see [`find_syscall_ret`]).
///
/// # Safety
///
/// Everything from [`invoke`], plus `gate` really has to be a
/// `syscall; ret` gadget; jumping anywhere else is undefined in every way
/// that matters.
pub unsafe fn invoke_via_gate(sysid: u16, gate: u64, args: &[usize]) -> u32 {
    dispatch(sysid, gate, args)
}

/// Checked [`invoke`]: non-zero status comes back as
/// [`Error::NonZeroStatus`].
///
/// # Safety
///
/// See [`invoke`].
pub unsafe fn syscall(sysid: u16, args: &[usize]) -> Result<u32> {
    match invoke(sysid, args) {
        0 => Ok(0),
        status => Err(Error::NonZeroStatus(status)),
    }
}

/// Checked recycled-gate call. Locates a gate inside ntdll on each call,
/// so consecutive invocations retire the `syscall` instruction from
/// varying addresses.
///
/// # Safety
///
/// See [`invoke`].
pub unsafe fn syscall_via_gate(sysid: u16, args: &[usize]) -> Result<u32> {
    let gate = find_syscall_ret()?;
    match invoke_via_gate(sysid, gate, args) {
        0 => Ok(0),
        status => Err(Error::NonZeroStatus(status)),
    }
}

/// Find a `syscall; ret` inside the resident ntdll and return its absolute
/// address. The pick is randomized across every occurrence in the image,
/// so repeated callers do not keep advertising one fixed return target.
pub fn find_syscall_ret() -> Result<u64> {
    let (base, size) = ntdll_range()?;
    let image = MemoryImage::snapshot(base, size as usize);
    let bytes = image.bytes();

    let gates: Vec<usize> = bytes
        .windows(SYSCALL_RET.len())
        .enumerate()
        .filter(|(_, w)| *w == SYSCALL_RET)
        .map(|(i, _)| i)
        .collect();

    if gates.is_empty() {
        return Err(Error::GadgetNotFound);
    }

    Ok(base + gates[random_range(0..gates.len())] as u64)
}

fn dispatch(sysid: u16, gate: u64, args: &[usize]) -> u32 {
    let mut staged = [0u64; 11];
    for (slot, arg) in staged.iter_mut().zip(args) {
        *slot = *arg as u64;
    }

    stubs::set_syscall(sysid, gate);
    let status = unsafe {
        match args.len() {
            0..=4 => stubs::syscall_4(staged.as_ptr()),
            5 | 6 => stubs::syscall_6(staged.as_ptr()),
            7 | 8 => stubs::syscall_8(staged.as_ptr()),
            _ => stubs::syscall_11(staged.as_ptr()),
        }
    };
    stubs::clear_syscall();

    status
}

//! testing/debugging runner module
//!
//! Resolves a handful of Nt* functions in each mode, then drives a full
//! allocate -> write -> protect -> free round trip against the current
//! process using direct and recycled-gate syscalls.

use anyhow::{bail, Result};
use callgate::{syscall, write_memory, ResolveMode, Resolver};
use core::ffi::c_void;
use core::ptr::null_mut;

const MEM_COMMIT: u32 = 0x1000;
const MEM_RESERVE: u32 = 0x2000;
const MEM_RELEASE: u32 = 0x8000;
const PAGE_READWRITE: u32 = 0x04;
const PAGE_EXECUTE_READ: u32 = 0x20;

const CURRENT_PROCESS: usize = usize::MAX; // pseudo-handle, -1

const PAYLOAD: [u8; 8] = [0xde, 0xad, 0xbe, 0xef, 0xca, 0xfe, 0xba, 0xbe];

fn main() -> Result<()> {
    // same function through every mode; auto/halos should agree with
    // memory unless something on this box is hooking ntdll
    for mode in [
        ResolveMode::Memory,
        ResolveMode::Disk,
        ResolveMode::Auto,
        ResolveMode::HalosGate,
    ] {
        let mut resolver = Resolver::new(mode)?;
        let id = resolver.sysid_by_name("NtAllocateVirtualMemory")?;
        println!("[+] {mode:?}: NtAllocateVirtualMemory -> {id:#06x}");
    }

    let mut resolver = Resolver::new(ResolveMode::HalosGate)?;
    let nt_allocate = resolver.sysid_by_name("NtAllocateVirtualMemory")?;
    let nt_protect = resolver.sysid_by_name("NtProtectVirtualMemory")?;
    let nt_free = resolver.sysid_by_name("NtFreeVirtualMemory")?;

    println!(
        "[+] resolved: allocate={nt_allocate:#06x} protect={nt_protect:#06x} free={nt_free:#06x}"
    );
    println!(
        "[+] ntdll!NtAllocateVirtualMemory lives at {:#016x}",
        resolver.procedure("NtAllocateVirtualMemory").addr()
    );

    let gate = callgate::find_syscall_ret()?;
    println!("[+] borrowed syscall;ret gate at {gate:#016x}");

    // allocate RW memory in this process with a direct syscall
    let mut base_address: *mut c_void = null_mut();
    let mut region_size: usize = PAYLOAD.len();

    let status = unsafe {
        syscall::invoke(
            nt_allocate,
            &[
                CURRENT_PROCESS,
                &mut base_address as *mut _ as usize,
                0,
                &mut region_size as *mut _ as usize,
                (MEM_RESERVE | MEM_COMMIT) as usize,
                PAGE_READWRITE as usize,
            ],
        )
    };
    if status != 0 || base_address.is_null() {
        bail!("[x] NtAllocateVirtualMemory failed with NTSTATUS {status:#010x}");
    }
    println!("[+] allocated {region_size} bytes at {base_address:#016x?}");

    unsafe { write_memory(&PAYLOAD, base_address as usize) };
    println!("[+] payload copied into the allocation");

    // flip it to RX through the recycled gate this time
    let mut protect_base = base_address;
    let mut protect_size = PAYLOAD.len();
    let mut old_protect: u32 = 0;

    let status = unsafe {
        syscall::invoke_via_gate(
            nt_protect,
            gate,
            &[
                CURRENT_PROCESS,
                &mut protect_base as *mut _ as usize,
                &mut protect_size as *mut _ as usize,
                PAGE_EXECUTE_READ as usize,
                &mut old_protect as *mut _ as usize,
            ],
        )
    };
    if status != 0 {
        bail!("[x] NtProtectVirtualMemory failed with NTSTATUS {status:#010x}");
    }
    println!("[+] protection flipped RW -> RX (was {old_protect:#x})");

    // checked wrapper for the cleanup
    let mut free_size: usize = 0;
    unsafe {
        syscall::syscall(
            nt_free,
            &[
                CURRENT_PROCESS,
                &mut base_address as *mut _ as usize,
                &mut free_size as *mut _ as usize,
                MEM_RELEASE as usize,
            ],
        )?;
    }
    println!("[+] released, done :)");

    Ok(())
}

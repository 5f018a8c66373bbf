#![allow(non_snake_case, non_camel_case_types)]

use core::ffi::c_void;
use windows::Win32::Foundation::UNICODE_STRING;
use windows::Win32::System::Kernel::LIST_ENTRY;

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PEB_LDR_DATA {
    pub Length: u32,
    pub Initialized: u32,
    pub SsHandle: *mut c_void,
    pub InLoadOrderModuleList: *mut c_void,
    pub InInitializationOrderModuleList: *mut c_void,
    pub InMemoryOrderModuleList: LIST_ENTRY,
}

/// Process Environment Block, through the last field this crate reads.
///
/// Only the prefix up to `LoaderData` is load-bearing; the tail exists so the
/// struct can be copied out wholesale without slicing a live loader
/// structure. Field layouts past the documented prefix drift between OS
/// builds, which is fine as long as nothing here dereferences them.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct PROCESS_ENVIRONMENT_BLOCK {
    pub InheritedAddressSpace: u8,
    pub ReadImageFileExecOptions: u8,
    pub BeingDebugged: u8,
    pub Spare: u8,
    pub Mutant: *mut c_void,
    pub ImageBase: *mut c_void,
    pub LoaderData: *mut PEB_LDR_DATA,
    /// `RTL_USER_PROCESS_PARAMETERS` in full; nothing here reads into it
    pub ProcessParameters: *mut c_void,
    pub SubSystemData: *mut c_void,
    pub ProcessHeap: *mut c_void,
    pub FastPebLock: *mut c_void,
    pub FastPebLockRoutine: *mut c_void,
    pub FastPebUnlockRoutine: *mut c_void,
    pub EnvironmentUpdateCount: u32,
    pub KernelCallbackTable: *mut c_void,
    pub EventLogSection: *mut c_void,
    pub EventLog: *mut c_void,
    pub FreeList: *mut c_void,
    pub TlsExpansionCounter: u32,
    pub TlsBitmap: *mut c_void,
    pub TlsBitmapBits: [u32; 0x2],
    pub ReadOnlySharedMemoryBase: *mut c_void,
    pub ReadOnlySharedMemoryHeap: *mut c_void,
    pub ReadOnlyStaticServerData: *mut c_void,
    pub AnsiCodePageData: *mut c_void,
    pub OemCodePageData: *mut c_void,
    pub UnicodeCaseTableData: *mut c_void,
    pub NumberOfProcessors: u32,
    pub NtGlobalFlag: u32,
    pub Spare2: [u8; 0x4],
    pub CriticalSectionTimeout: i64,
    pub HeapSegmentReserve: u32,
    pub HeapSegmentCommit: u32,
    pub HeapDeCommitTotalFreeThreshold: u32,
    pub HeapDeCommitFreeBlockThreshold: u32,
    pub NumberOfHeaps: u32,
    pub MaximumNumberOfHeaps: u32,
    pub ProcessHeaps: *mut c_void,
    pub GdiSharedHandleTable: *mut c_void,
    pub ProcessStarterHelper: *mut c_void,
    pub GdiDCAttributeList: *mut c_void,
    pub LoaderLock: *mut c_void,
    pub OSMajorVersion: u32,
    pub OSMinorVersion: u32,
    pub OSBuildNumber: u32,
    pub OSPlatformId: u32,
    pub ImageSubSystem: u32,
    pub ImageSubSystemMajorVersion: u32,
    pub ImageSubSystemMinorVersion: u32,
    pub GdiHandleBuffer: [u32; 0x22],
    pub PostProcessInitRoutine: u32,
    pub TlsExpansionBitmap: u32,
    pub TlsExpansionBitmapBits: [u8; 0x80],
    pub SessionId: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union LDR_DATA_TABLE_ENTRY_u1 {
    pub InInitializationOrderLinks: LIST_ENTRY,
    pub InProgressLinks: LIST_ENTRY,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union LDR_DATA_TABLE_ENTRY_u2 {
    pub FlagGroup: [u8; 4],
    pub Flags: u32,
}

pub type PLDR_INIT_ROUTINE = Option<
    unsafe extern "system" fn(DllHandle: *mut c_void, Reason: u32, Context: *mut c_void) -> u8,
>;

/// One loaded module, as the loader tracks it. The real structure keeps
/// going past `TimeDateStamp`; everything the walker needs sits well inside
/// this prefix.
#[repr(C)]
pub struct LDR_DATA_TABLE_ENTRY {
    pub InLoadOrderLinks: LIST_ENTRY,
    pub InMemoryOrderLinks: LIST_ENTRY,
    pub u1: LDR_DATA_TABLE_ENTRY_u1,
    pub DllBase: *mut c_void,
    pub EntryPoint: PLDR_INIT_ROUTINE,
    pub SizeOfImage: u32,
    pub FullDllName: UNICODE_STRING,
    pub BaseDllName: UNICODE_STRING,
    pub u2: LDR_DATA_TABLE_ENTRY_u2,
    pub ObsoleteLoadCount: u16,
    pub TlsIndex: u16,
    pub HashLinks: LIST_ENTRY,
    pub TimeDateStamp: u32,
}

//! SysID extraction from the opening bytes of a syscall stub.

use crate::error::{Error, Result};

/// Bytes every unhooked x64 syscall stub starts with:
///
/// ```text
/// mov r10, rcx    ; 4c 8b d1
/// mov eax, imm32  ; b8 <sysid as the low word>
/// ```
///
/// Public so callers holding a [`Error::MayBeHooked`] payload can diff the
/// observed bytes against what should have been there.
pub const STUB_PROLOGUE: [u8; 4] = [0x4c, 0x8b, 0xd1, 0xb8];

/// Number of stub bytes the extractor looks at.
pub const STUB_WINDOW: usize = 10;

/// Pull the SysID out of the first ten bytes of a stub.
///
/// A prologue match returns the low 16 bits of the `mov eax` immediate.
/// Anything else comes back as [`Error::MayBeHooked`] carrying the window
/// exactly as observed; hook installers overwrite these bytes with a jump,
/// and the mismatch is the only hook detection there is.
pub fn sysid_from_stub(stub: &[u8; STUB_WINDOW]) -> Result<u16> {
    if stub[..STUB_PROLOGUE.len()] != STUB_PROLOGUE {
        return Err(Error::MayBeHooked { found: *stub });
    }

    Ok(u16::from_le_bytes([stub[4], stub[5]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_sysid_from_clean_stub() {
        let stub = [0x4c, 0x8b, 0xd1, 0xb8, 0x55, 0x00, 0x00, 0x00, 0x0f, 0x05];
        assert_eq!(sysid_from_stub(&stub).unwrap(), 0x0055);
    }

    #[test]
    fn sysid_is_little_endian_low_word() {
        let stub = [0x4c, 0x8b, 0xd1, 0xb8, 0x34, 0x12, 0x00, 0x00, 0x0f, 0x05];
        assert_eq!(sysid_from_stub(&stub).unwrap(), 0x1234);
    }

    #[test]
    fn hooked_stub_reports_observed_bytes() {
        let stub = [0xe9, 0x00, 0x00, 0x00, 0x00, 0x90, 0x90, 0x90, 0x90, 0x90];
        match sysid_from_stub(&stub) {
            Err(Error::MayBeHooked { found }) => assert_eq!(found, stub),
            other => panic!("expected MayBeHooked, got {other:?}"),
        }
    }

    #[test]
    fn any_prologue_mismatch_is_hooked() {
        // one byte off is enough
        let stub = [0x4c, 0x8b, 0xd1, 0xb9, 0x55, 0x00, 0x00, 0x00, 0x0f, 0x05];
        assert!(matches!(
            sysid_from_stub(&stub),
            Err(Error::MayBeHooked { .. })
        ));
    }
}

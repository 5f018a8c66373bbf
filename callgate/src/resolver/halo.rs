//! Halo's Gate: recover a hooked stub's SysID from its neighbors.
//!
//! SysIDs are handed out in stub order, so if a stub's own prologue is
//! gone, the ID is still one add/subtract away from any intact neighbor.
//! The search keys on the `syscall; ret` epilogue because hooks clobber
//! stub entries, not stub exits.

use crate::error::{Error, Result};
use crate::resolver::sysid::{sysid_from_stub, STUB_WINDOW};

/// `syscall; ret`, the tail every stub ends with.
pub const SYSCALL_RET: [u8; 3] = [0x0f, 0x05, 0xc3];

/// Bytes from the first byte of one stub's epilogue to the first byte of
/// the next stub. ntdll's stubs are laid out 32 bytes apart with the
/// epilogue at +0x12, so the gap is 0x20 - 0x12 = 14. This is a property
/// of the toolchain that built ntdll, not of the instruction set; if a
/// future build spaces stubs differently this constant is the thing to
/// retune.
pub const NEXT_STUB_GAP: usize = 14;

/// Infer the SysID of the stub at `offset` from a neighboring intact stub.
///
/// Scans forward from `offset` for an epilogue, then backward from
/// `offset - 1`, trying a SysID extraction [`NEXT_STUB_GAP`] bytes past
/// each hit. The forward pass walks over the hooked stub's own epilogue
/// before reaching a neighbor, the backward pass never sees it, which is
/// why the two distance counters start differently:
///
/// * forward: counter from 0, bumped at each epilogue, result is
///   `neighbor - distance`
/// * backward: counter from 1, bumped after each failed extraction, result
///   is `neighbor + distance - 1`
///
/// `span` bounds the forward scan (the module's image size, from
/// [`crate::environment_block::loader::ntdll_range`]); the backward scan
/// stops at the start of `image`. If both directions come up empty the
/// `original` hook signal is returned unchanged, because the observed
/// bytes are worth more to the caller than a generic miss.
pub fn sysid_from_neighbor(
    image: &[u8],
    offset: usize,
    span: usize,
    original: Error,
) -> Result<u16> {
    let limit = span.min(image.len());

    // forward
    let mut distance: u16 = 0;
    let mut i = offset;
    while i + SYSCALL_RET.len() <= limit {
        if image[i..i + SYSCALL_RET.len()] == SYSCALL_RET {
            distance = distance.wrapping_add(1);
            if let Some(Ok(neighbor)) = try_extract(image, i + NEXT_STUB_GAP) {
                return Ok(neighbor.wrapping_sub(distance));
            }
        }
        i += 1;
    }

    // backward
    let mut distance: u16 = 1;
    for i in (0..offset).rev() {
        if image.get(i..i + SYSCALL_RET.len()) == Some(&SYSCALL_RET[..]) {
            if let Some(Ok(neighbor)) = try_extract(image, i + NEXT_STUB_GAP) {
                return Ok(neighbor.wrapping_add(distance).wrapping_sub(1));
            }
            distance = distance.wrapping_add(1);
        }
    }

    Err(original)
}

/// Extraction attempt at `offset`; `None` when the window would run off the
/// image, `Some(Err(..))` when the bytes there are not a stub prologue.
/// Epilogue byte patterns that show up inside data get rejected here and
/// the scan simply keeps going.
fn try_extract(image: &[u8], offset: usize) -> Option<Result<u16>> {
    let window: &[u8; STUB_WINDOW] = image.get(offset..offset + STUB_WINDOW)?.try_into().ok()?;
    Some(sysid_from_stub(window))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook_signal() -> Error {
        Error::MayBeHooked { found: [0xe9; 10] }
    }

    #[test]
    fn forward_neighbor_one_stub_ahead() {
        // hooked stub at 0, its own epilogue at 3, next stub 14 past that
        let mut image = vec![0u8; 64];
        image[0] = 0xe9;
        image[3..6].copy_from_slice(&SYSCALL_RET);
        image[17..25].copy_from_slice(&[0x4c, 0x8b, 0xd1, 0xb8, 0x58, 0x00, 0x00, 0x00]);

        let id = sysid_from_neighbor(&image, 0, image.len(), hook_signal()).unwrap();
        assert_eq!(id, 0x0057);
    }

    #[test]
    fn backward_neighbor_one_stub_behind() {
        // epilogue at 0, the stub it belongs to's successor at 14 carrying
        // 0x42, hooked stub at 32 with nothing ahead of it
        let mut image = vec![0u8; 64];
        image[0..3].copy_from_slice(&SYSCALL_RET);
        image[14..22].copy_from_slice(&[0x4c, 0x8b, 0xd1, 0xb8, 0x42, 0x00, 0x00, 0x00]);
        image[32] = 0xe9;

        let id = sysid_from_neighbor(&image, 32, image.len(), hook_signal()).unwrap();
        assert_eq!(id, 0x0042);
    }

    #[test]
    fn backward_skips_the_hooked_stub_itself() {
        // two stubs behind the hooked one; the first backward epilogue
        // leads to the hooked stub and must not count as a neighbor
        let mut image = vec![0u8; 96];
        // stub A (sysid 0x10) epilogue at 18, stub B starts at 32
        image[0..8].copy_from_slice(&[0x4c, 0x8b, 0xd1, 0xb8, 0x10, 0x00, 0x00, 0x00]);
        image[18..21].copy_from_slice(&SYSCALL_RET);
        // stub B (sysid 0x11) epilogue at 50, hooked stub C starts at 64
        image[32..40].copy_from_slice(&[0x4c, 0x8b, 0xd1, 0xb8, 0x11, 0x00, 0x00, 0x00]);
        image[50..53].copy_from_slice(&SYSCALL_RET);
        // stub C, fully clobbered including its epilogue
        image[64..74].copy_from_slice(&[0xe9; 10]);

        // backward pass: B's epilogue points at C (fails), A's epilogue
        // points at B (sysid 0x11, distance 2) -> 0x11 + 2 - 1 = 0x12
        let id = sysid_from_neighbor(&image, 64, image.len(), hook_signal()).unwrap();
        assert_eq!(id, 0x0012);
    }

    #[test]
    fn exhausted_scan_returns_the_original_signal() {
        let image = vec![0u8; 64];
        let err = sysid_from_neighbor(&image, 32, image.len(), hook_signal()).unwrap_err();
        match err {
            Error::MayBeHooked { found } => assert_eq!(found, [0xe9; 10]),
            other => panic!("expected the original MayBeHooked, got {other:?}"),
        }
    }

    #[test]
    fn forward_scan_respects_span() {
        // a perfectly good neighbor past the span must not be considered
        let mut image = vec![0u8; 64];
        image[40..43].copy_from_slice(&SYSCALL_RET);
        image[54..62].copy_from_slice(&[0x4c, 0x8b, 0xd1, 0xb8, 0x99, 0x00, 0x00, 0x00]);

        let err = sysid_from_neighbor(&image, 0, 20, hook_signal()).unwrap_err();
        assert!(matches!(err, Error::MayBeHooked { .. }));
    }

    #[test]
    fn epilogue_bytes_inside_data_are_skipped() {
        // stray 0f 05 c3 with garbage at +14, then a real neighbor
        let mut image = vec![0u8; 96];
        image[2..5].copy_from_slice(&SYSCALL_RET);
        // nothing resembling a prologue at 16
        image[30..33].copy_from_slice(&SYSCALL_RET);
        image[44..52].copy_from_slice(&[0x4c, 0x8b, 0xd1, 0xb8, 0x20, 0x00, 0x00, 0x00]);

        // both hits count toward distance; only the second extracts
        let id = sysid_from_neighbor(&image, 0, image.len(), hook_signal()).unwrap();
        assert_eq!(id, 0x0020 - 2);
    }
}

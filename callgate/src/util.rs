/// Store `bytes` at `destination`, one byte at a time.
///
/// Trusted primitive: no permission check, no atomicity, no nothing. The
/// destination pages must already be writable or this faults on the spot.
pub unsafe fn write_memory(bytes: &[u8], destination: usize) {
    for (index, byte) in bytes.iter().enumerate() {
        let write_ptr = (destination + index) as *mut u8;
        *write_ptr = *byte;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_into_an_owned_buffer() {
        let mut target = [0u8; 8];
        unsafe { write_memory(&[0xde, 0xad, 0xbe, 0xef], target.as_mut_ptr() as usize) };
        assert_eq!(target, [0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);
    }
}

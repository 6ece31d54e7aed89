//! Memory poisoning for debugging.
//!
//! Fills fresh payload bytes with a known pattern so reads of
//! uninitialised memory stand out in dumps.

/// Pattern used to poison uninitialized memory.
pub const UNINIT_PATTERN: u8 = 0xAB;

/// Poison a region with the uninitialized pattern.
pub fn poison_uninit(bytes: &mut [u8]) {
    bytes.fill(UNINIT_PATTERN);
}

/// Check if a region is entirely the uninitialized pattern.
#[cfg(test)]
pub fn is_uninit_poison(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == UNINIT_PATTERN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poison_uninit() {
        let mut bytes = [0u8; 8];
        poison_uninit(&mut bytes[2..]);
        assert_eq!(bytes[..2], [0, 0]);
        assert!(is_uninit_poison(&bytes[2..]));
    }
}

//! Fixed-width hex rendering without `core::fmt`.

/// [H1] Nibble 0-9 maps to '0'-'9', [H2] nibble 10-15 maps to 'a'-'f'
#[inline]
#[must_use]
pub const fn nibble_to_hex(nibble: u8) -> u8 {
    if nibble < 10 {
        b'0' + nibble // [H1]
    } else {
        b'a' + (nibble - 10) // [H2]
    }
}

/// A `u64` rendered as `0x` followed by exactly 16 lowercase digits.
#[derive(Clone, Copy)]
pub struct HexU64 {
    buf: [u8; 18],
}

impl HexU64 {
    /// [H3] zero-padded to 16 digits, [H4] covers the full u64 range
    #[must_use]
    pub const fn new(val: u64) -> Self {
        let mut buf = [0u8; 18];
        buf[0] = b'0';
        buf[1] = b'x';
        let mut i = 0;
        while i < 16 {
            let nibble = ((val >> ((15 - i) * 4)) & 0xf) as u8;
            buf[2 + i] = nibble_to_hex(nibble);
            i += 1;
        }
        Self { buf }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY: buf only ever holds ASCII ('0'-'9', 'a'-'f', 'x')
        unsafe { core::str::from_utf8_unchecked(&self.buf) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // H1
    #[test]
    fn test_nibble_digits() {
        assert_eq!(nibble_to_hex(0), b'0');
        assert_eq!(nibble_to_hex(9), b'9');
    }

    // H2
    #[test]
    fn test_nibble_letters() {
        assert_eq!(nibble_to_hex(10), b'a');
        assert_eq!(nibble_to_hex(15), b'f');
    }

    // H3, H4
    #[test]
    fn test_hex_u64_width() {
        assert_eq!(HexU64::new(0).as_str(), "0x0000000000000000");
        assert_eq!(HexU64::new(u64::MAX).as_str(), "0xffffffffffffffff");
        assert_eq!(HexU64::new(0x0123_4567_89ab_cdef).as_str(), "0x0123456789abcdef");
        assert_eq!(HexU64::new(0x80).as_str(), "0x0000000000000080");
    }
}

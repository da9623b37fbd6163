//! Bounded text sink over a caller-provided byte slice.

use core::fmt;

/// `fmt::Write` adapter that fills a borrowed buffer and never overruns it.
///
/// Once a write does not fit, the longest prefix that ends on a char
/// boundary is kept, the buffer is marked truncated and every later write
/// is dropped.
pub struct FmtBuffer<'a> {
    buf: &'a mut [u8],
    len: usize,
    truncated: bool,
}

impl<'a> FmtBuffer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            truncated: false,
        }
    }

    /// [B1] Text written so far
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    /// [B1] Consume the sink, keeping the borrow of the underlying buffer.
    pub fn into_str(self) -> &'a str {
        let Self { buf, len, .. } = self;
        let written: &'a [u8] = buf;
        core::str::from_utf8(&written[..len]).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// [B2] True once any write was cut short
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Write for FmtBuffer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Err(fmt::Error); // [B3] stays full
        }

        let room = self.buf.len() - self.len;
        if s.len() <= room {
            self.buf[self.len..self.len + s.len()].copy_from_slice(s.as_bytes());
            self.len += s.len();
            return Ok(());
        }

        // [B4] never split a multi-byte char
        let mut cut = room;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buf[self.len..self.len + cut].copy_from_slice(&s.as_bytes()[..cut]);
        self.len += cut;
        self.truncated = true; // [B2]
        Err(fmt::Error)
    }
}

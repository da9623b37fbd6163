//! Read-only accessors over a captured state, portable across backends.

use core::fmt::{self, Write};

use cpuex_utils::{FmtBuffer, HexU64};
use log::error;

use crate::traits::{CpuState, Field};

/// Buffer size that always holds [`to_string`] for every backend.
pub const STATE_STRING_CAPACITY: usize = 1024;

/// Bytes [`to_string`] produces for a record with this layout.
pub const fn string_len(fields: &[Field]) -> usize {
    // "name=" + "0x" + 16 digits + "\n"
    let mut total = 0;
    let mut i = 0;
    while i < fields.len() {
        total += fields[i].name.len() + 1 + 18 + 1;
        i += 1;
    }
    total
}

/// The state exactly as captured, byte for byte.
pub fn raw_faulting_cpu_state<S: CpuState>(state: &S) -> &[u8] {
    let () = S::LAYOUT_CHECKED;
    bytemuck::bytes_of(state)
}

/// Render one `name=0x...` line per field, in layout order.
///
/// Output stops at the end of `buf`; check
/// [`FmtBuffer::is_truncated`] on the result.
pub fn to_string<'b, S: CpuState>(state: &S, buf: &'b mut [u8]) -> FmtBuffer<'b> {
    let mut out = FmtBuffer::new(buf);
    let _ = write_cpu_state(state, &mut out);
    out
}

/// Same text as [`to_string`], into any writer.
pub fn write_cpu_state<S: CpuState, W: Write>(state: &S, out: &mut W) -> fmt::Result {
    let () = S::LAYOUT_CHECKED;
    // Plain string pieces only: this runs in exception context.
    for field in S::FIELDS {
        out.write_str(field.name)?;
        out.write_char('=')?;
        out.write_str(HexU64::new(field.read(state)).as_str())?;
        out.write_char('\n')?;
    }
    Ok(())
}

/// Dump the state through the `log` facade.
pub fn log_cpu_state<S: CpuState>(state: &S) {
    error!("{} exception: {}", S::ARCH.name(), state.cause());
    if let Some(addr) = state.fault_address() {
        error!("fault address: {}", HexU64::new(addr).as_str());
    }
    for field in S::FIELDS {
        error!("  {:<10} {}", field.name, HexU64::new(field.read(state)).as_str());
    }
}

#[cfg(all(test, feature = "std"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aarch64::TrapFrame;
    use crate::traits::fields_tile;
    use crate::x86_64::InterruptFrame;
    use std::string::String;

    fn sample_trap_frame() -> TrapFrame {
        let mut frame = TrapFrame::default();
        for (i, x) in frame.x.iter_mut().enumerate() {
            *x = i as u64;
        }
        frame.sp_el0 = 0x4000_0000;
        frame.elr = 0x8_0000;
        frame.spsr = 0x3c4;
        frame.esr = 0x5600_0000; // svc
        frame
    }

    #[test]
    fn test_capacity_fits_every_backend() {
        assert!(string_len(TrapFrame::FIELDS) <= STATE_STRING_CAPACITY);
        assert!(string_len(InterruptFrame::FIELDS) <= STATE_STRING_CAPACITY);
    }

    #[test]
    fn test_to_string_format() {
        let frame = sample_trap_frame();
        let mut buf = [0u8; STATE_STRING_CAPACITY];
        let out = to_string(&frame, &mut buf);
        assert!(!out.is_truncated());
        let text = out.as_str();
        assert!(text.starts_with("x0=0x0000000000000000\nx1=0x0000000000000001\n"));
        assert!(text.contains("\nelr=0x0000000000080000\n"));
        assert!(text.contains("\nsp_el0=0x0000000040000000\n"));
        assert_eq!(text.len(), string_len(TrapFrame::FIELDS));
    }

    #[test]
    fn test_to_string_is_stable() {
        let frame = sample_trap_frame();
        let mut a = [0u8; STATE_STRING_CAPACITY];
        let mut b = [0u8; STATE_STRING_CAPACITY];
        assert_eq!(to_string(&frame, &mut a).as_str(), to_string(&frame, &mut b).as_str());
    }

    /// Every raw byte belongs to a field that appears in the string form.
    #[test]
    fn test_to_string_covers_raw_state() {
        fn check<S: CpuState>(state: &S) {
            let raw = raw_faulting_cpu_state(state);
            assert!(fields_tile(S::FIELDS, raw.len()));

            let mut text = String::new();
            write_cpu_state(state, &mut text).unwrap();
            let lines: std::vec::Vec<_> = text.lines().collect();
            assert_eq!(lines.len(), S::FIELDS.len());

            for (field, line) in S::FIELDS.iter().zip(lines) {
                let chunk = &raw[field.offset..field.offset + Field::WIDTH];
                let value = u64::from_ne_bytes(chunk.try_into().unwrap());
                assert_eq!(line, std::format!("{}={:#018x}", field.name, value));
            }
        }

        check(&sample_trap_frame());
        let mut frame = InterruptFrame::default();
        for field in InterruptFrame::FIELDS {
            field.write(&mut frame, field.offset as u64 * 3 + 1);
        }
        check(&frame);
    }

    #[test]
    fn test_to_string_truncates_into_small_buffer() {
        let frame = sample_trap_frame();
        let mut buf = [0u8; 30];
        let out = to_string(&frame, &mut buf);
        assert!(out.is_truncated());
        assert_eq!(out.as_str(), "x0=0x0000000000000000\nx1=0x000");
    }

    #[test]
    fn test_raw_state_is_the_record() {
        let frame = sample_trap_frame();
        let raw = raw_faulting_cpu_state(&frame);
        assert_eq!(raw.len(), core::mem::size_of::<TrapFrame>());
        assert_eq!(&raw[8..16], &1u64.to_ne_bytes());
    }
}

//! Architectural exception vectors 0-31 and the flag words that go with them.

use bitflags::bitflags;

/// Exception vector number.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vector {
    DivideError = 0,
    Debug = 1,
    NonMaskableInterrupt = 2,
    Breakpoint = 3,
    Overflow = 4,
    BoundRangeExceeded = 5,
    InvalidOpcode = 6,
    DeviceNotAvailable = 7,
    DoubleFault = 8,
    CoprocessorSegmentOverrun = 9,
    InvalidTss = 10,
    SegmentNotPresent = 11,
    StackSegmentFault = 12,
    GeneralProtection = 13,
    PageFault = 14,
    X87FloatingPoint = 16,
    AlignmentCheck = 17,
    MachineCheck = 18,
    SimdFloatingPoint = 19,
    Virtualization = 20,
    ControlProtection = 21,
    HypervisorInjection = 28,
    VmmCommunication = 29,
    Security = 30,
}

impl Vector {
    /// Vectors with an architectural meaning; 15, 22-27 and 31 are reserved.
    pub const fn from_number(number: u64) -> Option<Self> {
        Some(match number {
            0 => Self::DivideError,
            1 => Self::Debug,
            2 => Self::NonMaskableInterrupt,
            3 => Self::Breakpoint,
            4 => Self::Overflow,
            5 => Self::BoundRangeExceeded,
            6 => Self::InvalidOpcode,
            7 => Self::DeviceNotAvailable,
            8 => Self::DoubleFault,
            9 => Self::CoprocessorSegmentOverrun,
            10 => Self::InvalidTss,
            11 => Self::SegmentNotPresent,
            12 => Self::StackSegmentFault,
            13 => Self::GeneralProtection,
            14 => Self::PageFault,
            16 => Self::X87FloatingPoint,
            17 => Self::AlignmentCheck,
            18 => Self::MachineCheck,
            19 => Self::SimdFloatingPoint,
            20 => Self::Virtualization,
            21 => Self::ControlProtection,
            28 => Self::HypervisorInjection,
            29 => Self::VmmCommunication,
            30 => Self::Security,
            _ => return None,
        })
    }

    /// The CPU pushes an error code for these vectors.
    pub const fn has_error_code(number: u64) -> bool {
        matches!(number, 8 | 10..=14 | 17 | 21 | 29 | 30)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::DivideError => "divide error",
            Self::Debug => "debug",
            Self::NonMaskableInterrupt => "non-maskable interrupt",
            Self::Breakpoint => "breakpoint",
            Self::Overflow => "overflow",
            Self::BoundRangeExceeded => "bound range exceeded",
            Self::InvalidOpcode => "invalid opcode",
            Self::DeviceNotAvailable => "device not available",
            Self::DoubleFault => "double fault",
            Self::CoprocessorSegmentOverrun => "coprocessor segment overrun",
            Self::InvalidTss => "invalid TSS",
            Self::SegmentNotPresent => "segment not present",
            Self::StackSegmentFault => "stack-segment fault",
            Self::GeneralProtection => "general protection fault",
            Self::PageFault => "page fault",
            Self::X87FloatingPoint => "x87 floating-point exception",
            Self::AlignmentCheck => "alignment check",
            Self::MachineCheck => "machine check",
            Self::SimdFloatingPoint => "SIMD floating-point exception",
            Self::Virtualization => "virtualization exception",
            Self::ControlProtection => "control protection exception",
            Self::HypervisorInjection => "hypervisor injection exception",
            Self::VmmCommunication => "VMM communication exception",
            Self::Security => "security exception",
        }
    }
}

/// Vectors the IDT routes to the dispatcher, one stub each.
///
/// Every architectural vector except 9 (coprocessor segment overrun), which
/// the IDT type treats as reserved.
pub const STUB_VECTORS: [u8; 23] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 11, 12, 13, 14, 16, 17, 18, 19, 20, 21, 28, 29, 30,
];

bitflags! {
    /// Error code pushed with a page fault.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PageFaultErrorCode: u64 {
        const PRESENT = 1 << 0;
        const WRITE = 1 << 1;
        const USER = 1 << 2;
        const RESERVED_BIT = 1 << 3;
        const INSTRUCTION_FETCH = 1 << 4;
        const PROTECTION_KEY = 1 << 5;
        const SHADOW_STACK = 1 << 6;
        const SGX = 1 << 15;
    }
}

bitflags! {
    /// RFLAGS bits that are defined in 64-bit mode.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RFlags: u64 {
        const CARRY = 1 << 0;
        /// Always reads as one.
        const RESERVED_1 = 1 << 1;
        const PARITY = 1 << 2;
        const AUXILIARY_CARRY = 1 << 4;
        const ZERO = 1 << 6;
        const SIGN = 1 << 7;
        const TRAP = 1 << 8;
        const INTERRUPT = 1 << 9;
        const DIRECTION = 1 << 10;
        const OVERFLOW = 1 << 11;
        const IOPL_LOW = 1 << 12;
        const IOPL_HIGH = 1 << 13;
        const NESTED_TASK = 1 << 14;
        const RESUME = 1 << 16;
        const VIRTUAL_8086 = 1 << 17;
        const ALIGNMENT_CHECK = 1 << 18;
        const VIRTUAL_INTERRUPT = 1 << 19;
        const VIRTUAL_INTERRUPT_PENDING = 1 << 20;
        const ID = 1 << 21;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_vectors() {
        for n in [15, 22, 23, 24, 25, 26, 27, 31, 32, 255] {
            assert_eq!(Vector::from_number(n), None);
        }
        assert_eq!(Vector::from_number(14), Some(Vector::PageFault));
        assert_eq!(Vector::from_number(30), Some(Vector::Security));
    }

    #[test]
    fn test_vector_numbers_round_trip() {
        for n in 0..32u64 {
            if let Some(v) = Vector::from_number(n) {
                assert_eq!(v as u64, n);
            }
        }
    }

    #[test]
    fn test_error_code_vectors() {
        let with_code: std::vec::Vec<u64> = (0..32).filter(|n| Vector::has_error_code(*n)).collect();
        assert_eq!(with_code, [8, 10, 11, 12, 13, 14, 17, 21, 29, 30]);
    }

    #[test]
    fn test_stub_vectors_skip_reserved_idt_slots() {
        assert!(!STUB_VECTORS.contains(&9));
        assert!(STUB_VECTORS.windows(2).all(|w| w[0] < w[1]));
        for n in STUB_VECTORS {
            assert!(Vector::from_number(u64::from(n)).is_some(), "vector {n}");
        }
        let architectural = (0..32u64).filter(|n| Vector::from_number(*n).is_some()).count();
        assert_eq!(STUB_VECTORS.len(), architectural - 1);
    }

    #[test]
    fn test_page_fault_error_code() {
        let code = PageFaultErrorCode::from_bits_retain(0b0_0111);
        assert!(code.contains(PageFaultErrorCode::PRESENT | PageFaultErrorCode::WRITE));
        assert!(code.contains(PageFaultErrorCode::USER));
        assert!(!code.contains(PageFaultErrorCode::INSTRUCTION_FETCH));
    }
}

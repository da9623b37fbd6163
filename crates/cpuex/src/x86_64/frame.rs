use bytemuck::{Pod, Zeroable};

use super::vectors::{PageFaultErrorCode, RFlags, Vector};
use crate::traits::{Arch, CpuState, Field, fields_tile};

/// Everything on the stack when the common stub calls into Rust, lowest
/// address first.
///
/// `cr2` and the general-purpose registers are pushed by the stub, `vector`
/// and `error_code` by the per-vector entry (a zero code where the CPU
/// pushes none), the rest by the CPU.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct InterruptFrame {
    pub cr2: u64,
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub vector: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

macro_rules! frame_fields {
    ($($field:ident),* $(,)?) => {
        [$(Field::new(stringify!($field), core::mem::offset_of!(InterruptFrame, $field))),*]
    };
}

const INTERRUPT_FRAME_FIELDS: [Field; 23] = frame_fields![
    cr2, r15, r14, r13, r12, r11, r10, r9, r8, rbp, rdi, rsi, rdx, rcx, rbx, rax,
    vector, error_code, rip, cs, rflags, rsp, ss,
];

const _: () = assert!(fields_tile(
    &INTERRUPT_FRAME_FIELDS,
    core::mem::size_of::<InterruptFrame>()
));

impl InterruptFrame {
    pub const fn exception(&self) -> Option<Vector> {
        Vector::from_number(self.vector)
    }

    pub const fn flags(&self) -> RFlags {
        RFlags::from_bits_retain(self.rflags)
    }

    /// Decoded error code, for page faults only.
    pub const fn page_fault_error(&self) -> Option<PageFaultErrorCode> {
        if self.vector == Vector::PageFault as u64 {
            Some(PageFaultErrorCode::from_bits_retain(self.error_code))
        } else {
            None
        }
    }

    /// Requested privilege level of the interrupted code segment.
    pub const fn privilege_level(&self) -> u8 {
        (self.cs & 0b11) as u8
    }
}

impl CpuState for InterruptFrame {
    const ARCH: Arch = Arch::X86_64;
    const FIELDS: &'static [Field] = &INTERRUPT_FRAME_FIELDS;

    fn program_counter(&self) -> u64 {
        self.rip
    }

    fn set_program_counter(&mut self, pc: u64) {
        self.rip = pc;
    }

    /// `iretq` always pops RSP, so the frame holds it for every privilege level.
    fn stack_pointer(&self) -> Option<u64> {
        Some(self.rsp)
    }

    fn fault_address(&self) -> Option<u64> {
        self.page_fault_error().map(|_| self.cr2)
    }

    fn cause(&self) -> &'static str {
        match self.exception() {
            Some(vector) => vector.name(),
            None => "reserved vector",
        }
    }

    /// Bit 1 of RFLAGS must be set and undefined bits must stay clear.
    fn reconcile(&mut self) {
        self.rflags = RFlags::from_bits_truncate(self.rflags).bits() | RFlags::RESERVED_1.bits();
    }
}

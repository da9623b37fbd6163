use bytemuck::{Pod, Zeroable};

use super::syndrome::{Spsr, Syndrome, TrapKind, VectorSlot};
use crate::traits::{Arch, CpuState, Field, fields_tile};

/// Registers saved by the vector trampoline.
///
/// Layout is shared with the assembly in `entry.rs`; every slot is written
/// back to its register before `eret`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TrapFrame {
    /// General-purpose registers x0..x30.
    pub x: [u64; 31],
    /// SP_EL0.
    pub sp_el0: u64,
    /// TPIDR_EL0, the EL0 thread pointer.
    pub tpidr_el0: u64,
    /// ELR_EL1, the return address.
    pub elr: u64,
    /// SPSR_EL1.
    pub spsr: u64,
    /// ESR_EL1.
    pub esr: u64,
    /// FAR_EL1.
    pub far: u64,
    /// Vector table slot, see [`VectorSlot`].
    pub vector: u64,
}

/// SIMD/FP state the trampoline saves below the [`TrapFrame`].
///
/// Rust code on the handler path may use q0-q31 freely, so the whole bank is
/// preserved across the call. It is not part of the handler-visible record:
/// edits to FP registers are not carried back.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FpContext {
    pub q: [u128; 32],
    pub fpcr: u64,
    pub fpsr: u64,
}

// stp q imm7 reaches 1008 bytes; the pair q30/q31 starts at 480.
const _: () = assert!(core::mem::offset_of!(FpContext, fpcr) == 512);
const _: () = assert!(core::mem::size_of::<FpContext>() % 16 == 0);

macro_rules! gpr_fields {
    ($($name:literal => $idx:literal),* $(,)?) => {
        [$(Field::new($name, core::mem::offset_of!(TrapFrame, x) + $idx * Field::WIDTH)),*]
    };
}

const GPRS: [Field; 31] = gpr_fields![
    "x0" => 0, "x1" => 1, "x2" => 2, "x3" => 3, "x4" => 4, "x5" => 5,
    "x6" => 6, "x7" => 7, "x8" => 8, "x9" => 9, "x10" => 10, "x11" => 11,
    "x12" => 12, "x13" => 13, "x14" => 14, "x15" => 15, "x16" => 16,
    "x17" => 17, "x18" => 18, "x19" => 19, "x20" => 20, "x21" => 21,
    "x22" => 22, "x23" => 23, "x24" => 24, "x25" => 25, "x26" => 26,
    "x27" => 27, "x28" => 28, "x29" => 29, "x30" => 30,
];

const TRAP_FRAME_FIELDS: [Field; 38] = {
    let tail = [
        Field::new("sp_el0", core::mem::offset_of!(TrapFrame, sp_el0)),
        Field::new("tpidr_el0", core::mem::offset_of!(TrapFrame, tpidr_el0)),
        Field::new("elr", core::mem::offset_of!(TrapFrame, elr)),
        Field::new("spsr", core::mem::offset_of!(TrapFrame, spsr)),
        Field::new("esr", core::mem::offset_of!(TrapFrame, esr)),
        Field::new("far", core::mem::offset_of!(TrapFrame, far)),
        Field::new("vector", core::mem::offset_of!(TrapFrame, vector)),
    ];
    let mut all = [Field::new("", 0); 38];
    let mut i = 0;
    while i < GPRS.len() {
        all[i] = GPRS[i];
        i += 1;
    }
    let mut j = 0;
    while j < tail.len() {
        all[GPRS.len() + j] = tail[j];
        j += 1;
    }
    all
};

const _: () = assert!(fields_tile(&TRAP_FRAME_FIELDS, core::mem::size_of::<TrapFrame>()));
// The trampoline keeps SP 16-byte aligned.
const _: () = assert!(core::mem::size_of::<TrapFrame>() % 16 == 0);

impl TrapFrame {
    pub const fn slot(&self) -> VectorSlot {
        VectorSlot::from_index(self.vector)
    }

    pub const fn syndrome(&self) -> Syndrome {
        Syndrome::new(self.esr)
    }

    pub const fn spsr_flags(&self) -> Spsr {
        Spsr::from_bits_retain(self.spsr)
    }

    /// Link register.
    pub const fn lr(&self) -> u64 {
        self.x[30]
    }

    /// Frame pointer.
    pub const fn fp(&self) -> u64 {
        self.x[29]
    }

    /// SP_EL1 of a context that ran on SP_ELx, read-only.
    ///
    /// The trampoline builds the frame directly below the interrupted stack
    /// pointer, so it is the frame's own address plus its size. Only
    /// meaningful on the frame the trampoline handed out, not on a copy.
    pub fn interrupted_sp_elx(&self) -> Option<u64> {
        if self.spsr_flags().uses_sp_el0() {
            None
        } else {
            Some(core::ptr::from_ref(self) as u64 + core::mem::size_of::<Self>() as u64)
        }
    }
}

impl CpuState for TrapFrame {
    const ARCH: Arch = Arch::Aarch64;
    const FIELDS: &'static [Field] = &TRAP_FRAME_FIELDS;

    fn program_counter(&self) -> u64 {
        self.elr
    }

    fn set_program_counter(&mut self, pc: u64) {
        self.elr = pc;
    }

    /// Only SP_EL0 is part of the frame; a context running on SP_ELx shares
    /// its stack with the frame itself, so it gets `None` here. See
    /// [`TrapFrame::interrupted_sp_elx`].
    fn stack_pointer(&self) -> Option<u64> {
        if self.spsr_flags().uses_sp_el0() {
            Some(self.sp_el0)
        } else {
            None
        }
    }

    fn fault_address(&self) -> Option<u64> {
        let syndrome = self.syndrome();
        if self.slot().kind == TrapKind::Synchronous && syndrome.class.far_valid() {
            Some(self.far)
        } else {
            None
        }
    }

    fn cause(&self) -> &'static str {
        match self.slot().kind {
            TrapKind::Synchronous => self.syndrome().class.description(),
            TrapKind::Irq => "IRQ",
            TrapKind::Fiq => "FIQ",
            TrapKind::SError => "SError interrupt",
        }
    }
}

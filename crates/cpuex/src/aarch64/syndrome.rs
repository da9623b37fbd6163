//! Decoding of the AArch64 exception syndrome (ESR_EL1), SPSR and vector slot.

use bitflags::bitflags;

/// Which group of the vector table fired.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapSource {
    CurrentSpEl0 = 0,
    CurrentSpElx = 1,
    LowerAArch64 = 2,
    LowerAArch32 = 3,
}

/// Which entry within a group fired.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapKind {
    Synchronous = 0,
    Irq = 1,
    Fiq = 2,
    SError = 3,
}

/// One of the 16 vector table entries, as recorded in `TrapFrame::vector`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorSlot {
    pub source: TrapSource,
    pub kind: TrapKind,
}

impl VectorSlot {
    pub const fn from_index(index: u64) -> Self {
        let source = match (index >> 2) & 0b11 {
            0 => TrapSource::CurrentSpEl0,
            1 => TrapSource::CurrentSpElx,
            2 => TrapSource::LowerAArch64,
            _ => TrapSource::LowerAArch32,
        };
        let kind = match index & 0b11 {
            0 => TrapKind::Synchronous,
            1 => TrapKind::Irq,
            2 => TrapKind::Fiq,
            _ => TrapKind::SError,
        };
        Self { source, kind }
    }

    pub const fn index(self) -> u64 {
        ((self.source as u64) << 2) | self.kind as u64
    }

    pub const fn from_lower_el(self) -> bool {
        matches!(
            self.source,
            TrapSource::LowerAArch64 | TrapSource::LowerAArch32
        )
    }
}

/// ESR_ELx.EC, the exception class of a synchronous exception.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExceptionClass {
    Unknown,
    WfiWfe,
    IllegalState,
    Svc64,
    Hvc64,
    Smc64,
    SysReg,
    InstrAbortLower,
    InstrAbortCurrent,
    PcAlignment,
    DataAbortLower,
    DataAbortCurrent,
    SpAlignment,
    FpException,
    SError,
    BreakpointLower,
    BreakpointCurrent,
    SoftwareStepLower,
    SoftwareStepCurrent,
    WatchpointLower,
    WatchpointCurrent,
    Brk64,
    Other(u8),
}

impl ExceptionClass {
    pub const fn from_esr(esr: u64) -> Self {
        match ((esr >> 26) & 0x3f) as u8 {
            0x00 => Self::Unknown,
            0x01 => Self::WfiWfe,
            0x0e => Self::IllegalState,
            0x15 => Self::Svc64,
            0x16 => Self::Hvc64,
            0x17 => Self::Smc64,
            0x18 => Self::SysReg,
            0x20 => Self::InstrAbortLower,
            0x21 => Self::InstrAbortCurrent,
            0x22 => Self::PcAlignment,
            0x24 => Self::DataAbortLower,
            0x25 => Self::DataAbortCurrent,
            0x26 => Self::SpAlignment,
            0x2c => Self::FpException,
            0x2f => Self::SError,
            0x30 => Self::BreakpointLower,
            0x31 => Self::BreakpointCurrent,
            0x32 => Self::SoftwareStepLower,
            0x33 => Self::SoftwareStepCurrent,
            0x34 => Self::WatchpointLower,
            0x35 => Self::WatchpointCurrent,
            0x3c => Self::Brk64,
            ec => Self::Other(ec),
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Unknown => "unknown reason",
            Self::WfiWfe => "trapped WFI/WFE",
            Self::IllegalState => "illegal execution state",
            Self::Svc64 => "SVC",
            Self::Hvc64 => "HVC",
            Self::Smc64 => "SMC",
            Self::SysReg => "trapped system register access",
            Self::InstrAbortLower => "instruction abort from lower EL",
            Self::InstrAbortCurrent => "instruction abort",
            Self::PcAlignment => "PC alignment fault",
            Self::DataAbortLower => "data abort from lower EL",
            Self::DataAbortCurrent => "data abort",
            Self::SpAlignment => "SP alignment fault",
            Self::FpException => "floating-point exception",
            Self::SError => "SError",
            Self::BreakpointLower => "breakpoint from lower EL",
            Self::BreakpointCurrent => "breakpoint",
            Self::SoftwareStepLower => "software step from lower EL",
            Self::SoftwareStepCurrent => "software step",
            Self::WatchpointLower => "watchpoint from lower EL",
            Self::WatchpointCurrent => "watchpoint",
            Self::Brk64 => "BRK instruction",
            Self::Other(_) => "unrecognised exception class",
        }
    }

    /// FAR_ELx holds the faulting address for these classes.
    pub const fn far_valid(self) -> bool {
        matches!(
            self,
            Self::InstrAbortLower
                | Self::InstrAbortCurrent
                | Self::PcAlignment
                | Self::DataAbortLower
                | Self::DataAbortCurrent
                | Self::WatchpointLower
                | Self::WatchpointCurrent
        )
    }

    pub const fn is_abort(self) -> bool {
        matches!(
            self,
            Self::InstrAbortLower
                | Self::InstrAbortCurrent
                | Self::DataAbortLower
                | Self::DataAbortCurrent
        )
    }
}

/// ISS.DFSC / ISS.IFSC of an abort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortStatus {
    AddressSize { level: u8 },
    Translation { level: u8 },
    AccessFlag { level: u8 },
    Permission { level: u8 },
    SyncExternal,
    Alignment,
    TlbConflict,
    Other(u8),
}

impl AbortStatus {
    pub const fn from_iss(iss: u32) -> Self {
        let fsc = (iss & 0x3f) as u8;
        let level = fsc & 0b11;
        match fsc >> 2 {
            0b0000 => Self::AddressSize { level },
            0b0001 => Self::Translation { level },
            0b0010 => Self::AccessFlag { level },
            0b0011 => Self::Permission { level },
            _ => match fsc {
                0x10 => Self::SyncExternal,
                0x21 => Self::Alignment,
                0x30 => Self::TlbConflict,
                other => Self::Other(other),
            },
        }
    }
}

/// Decoded ESR_ELx.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Syndrome {
    pub class: ExceptionClass,
    /// Trapped instruction was 32 bits wide.
    pub il: bool,
    pub iss: u32,
}

impl Syndrome {
    pub const fn new(esr: u64) -> Self {
        Self {
            class: ExceptionClass::from_esr(esr),
            il: esr & (1 << 25) != 0,
            iss: (esr & 0x01ff_ffff) as u32,
        }
    }

    /// Fault status for instruction and data aborts.
    pub const fn abort_status(self) -> Option<AbortStatus> {
        if self.class.is_abort() {
            Some(AbortStatus::from_iss(self.iss))
        } else {
            None
        }
    }

    /// WnR: the data abort came from a write.
    pub const fn is_write(self) -> bool {
        matches!(
            self.class,
            ExceptionClass::DataAbortLower | ExceptionClass::DataAbortCurrent
        ) && self.iss & (1 << 6) != 0
    }

    /// Immediate of an SVC/HVC/SMC/BRK.
    pub const fn immediate(self) -> Option<u16> {
        match self.class {
            ExceptionClass::Svc64
            | ExceptionClass::Hvc64
            | ExceptionClass::Smc64
            | ExceptionClass::Brk64 => Some((self.iss & 0xffff) as u16),
            _ => None,
        }
    }
}

bitflags! {
    /// SPSR_ELx as saved on exception entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Spsr: u64 {
        const N = 1 << 31;
        const Z = 1 << 30;
        const C = 1 << 29;
        const V = 1 << 28;
        const SS = 1 << 21;
        const IL = 1 << 20;
        const D = 1 << 9;
        const A = 1 << 8;
        const I = 1 << 7;
        const F = 1 << 6;
        /// M[4]: interrupted context ran AArch32.
        const AARCH32 = 1 << 4;
        /// M[0]: interrupted context used SP_ELx rather than SP_EL0.
        const SP_ELX = 1 << 0;
    }
}

impl Spsr {
    /// M[3:2]
    pub const fn exception_level(self) -> u8 {
        ((self.bits() >> 2) & 0b11) as u8
    }

    pub const fn uses_sp_el0(self) -> bool {
        !self.contains(Self::SP_ELX)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_vector_slot_round_trip() {
        for index in 0..16 {
            assert_eq!(VectorSlot::from_index(index).index(), index);
        }
        let slot = VectorSlot::from_index(9);
        assert_eq!(slot.source, TrapSource::LowerAArch64);
        assert_eq!(slot.kind, TrapKind::Irq);
        assert!(slot.from_lower_el());
        assert!(!VectorSlot::from_index(4).from_lower_el());
    }

    #[test]
    fn test_data_abort_syndrome() {
        let s = Syndrome::new(0x9600_0045);
        assert_eq!(s.class, ExceptionClass::DataAbortCurrent);
        assert!(s.il);
        assert!(s.is_write());
        assert_eq!(s.abort_status(), Some(AbortStatus::Translation { level: 1 }));
        assert!(s.class.far_valid());
        assert_eq!(s.immediate(), None);
    }

    #[test]
    fn test_permission_fault_read() {
        let s = Syndrome::new(0x9200_000f); // lower EL data abort, L3 permission, read
        assert_eq!(s.class, ExceptionClass::DataAbortLower);
        assert!(!s.is_write());
        assert_eq!(s.abort_status(), Some(AbortStatus::Permission { level: 3 }));
    }

    #[test]
    fn test_svc_and_brk_immediates() {
        assert_eq!(Syndrome::new(0x5600_0007).immediate(), Some(7));
        let brk = Syndrome::new(0xf200_03e8);
        assert_eq!(brk.class, ExceptionClass::Brk64);
        assert_eq!(brk.immediate(), Some(1000));
        assert!(!brk.class.far_valid());
        assert_eq!(brk.abort_status(), None);
    }

    #[test]
    fn test_unrecognised_class() {
        let s = Syndrome::new(0x3fu64 << 26);
        assert_eq!(s.class, ExceptionClass::Other(0x3f));
        assert_eq!(s.class.description(), "unrecognised exception class");
    }

    #[test]
    fn test_abort_status_specials() {
        assert_eq!(AbortStatus::from_iss(0x10), AbortStatus::SyncExternal);
        assert_eq!(AbortStatus::from_iss(0x21), AbortStatus::Alignment);
        assert_eq!(AbortStatus::from_iss(0x30), AbortStatus::TlbConflict);
        assert_eq!(AbortStatus::from_iss(0x09), AbortStatus::AccessFlag { level: 1 });
    }

    #[test]
    fn test_spsr_fields() {
        let el1h = Spsr::from_bits_retain(0x3c5);
        assert_eq!(el1h.exception_level(), 1);
        assert!(!el1h.uses_sp_el0());
        assert!(el1h.contains(Spsr::D | Spsr::A | Spsr::I | Spsr::F));

        let el0t = Spsr::from_bits_retain(0x0);
        assert_eq!(el0t.exception_level(), 0);
        assert!(el0t.uses_sp_el0());
    }
}

//! Architecture-independent view of a captured CPU state.
//!
//! A backend's state record is a `#[repr(C)]` block of 64-bit slots. The
//! record describes itself through a [`Field`] table so the support
//! accessors, the dispatcher's change tracking and the tests can walk any
//! backend without knowing its layout.

use bytemuck::Pod;

/// Architectures with a backend in this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arch {
    Aarch64,
    X86_64,
}

impl Arch {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aarch64 => "aarch64",
            Self::X86_64 => "x86_64",
        }
    }
}

/// One named 64-bit slot of a state record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    /// Byte offset from the start of the record.
    pub offset: usize,
}

impl Field {
    /// Every slot is a `u64`.
    pub const WIDTH: usize = 8;

    pub const fn new(name: &'static str, offset: usize) -> Self {
        Self { name, offset }
    }

    pub fn read<S: CpuState>(&self, state: &S) -> u64 {
        let () = S::LAYOUT_CHECKED;
        let bytes = bytemuck::bytes_of(state);
        bytemuck::pod_read_unaligned(&bytes[self.offset..self.offset + Self::WIDTH])
    }

    pub fn write<S: CpuState>(&self, state: &mut S, value: u64) {
        let () = S::LAYOUT_CHECKED;
        let bytes = bytemuck::bytes_of_mut(state);
        bytes[self.offset..self.offset + Self::WIDTH].copy_from_slice(&value.to_ne_bytes());
    }
}

/// True when `fields` covers `size` bytes back to back, in order, with no
/// gaps or overlaps, and fits a [`crate::ChangeSet`].
///
/// Backends assert this at compile time for their record.
pub const fn fields_tile(fields: &[Field], size: usize) -> bool {
    if fields.len() > 64 || fields.len() * Field::WIDTH != size {
        return false;
    }
    let mut i = 0;
    while i < fields.len() {
        if fields[i].offset != i * Field::WIDTH {
            return false;
        }
        i += 1;
    }
    true
}

/// Register state captured by a backend at exception entry.
///
/// The handler gets `&mut Self` pointing at the backend's own copy; whatever
/// it leaves there is what the backend restores.
pub trait CpuState: Pod {
    const ARCH: Arch;

    /// Layout of `Self`. Must satisfy [`fields_tile`].
    const FIELDS: &'static [Field];

    /// Evaluates only if [`Self::FIELDS`] tiles `Self`.
    ///
    /// Every field access names it, so an implementation with a bad table
    /// fails to build as soon as it is used:
    ///
    /// ```compile_fail
    /// use cpuex::{Arch, CpuState, Field};
    ///
    /// #[repr(C)]
    /// #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    /// struct Short {
    ///     pc: u64,
    ///     sp: u64,
    /// }
    ///
    /// impl CpuState for Short {
    ///     const ARCH: Arch = Arch::X86_64;
    ///     const FIELDS: &'static [Field] = &[Field::new("pc", 0)];
    ///     fn program_counter(&self) -> u64 { self.pc }
    ///     fn set_program_counter(&mut self, pc: u64) { self.pc = pc; }
    ///     fn stack_pointer(&self) -> Option<u64> { Some(self.sp) }
    ///     fn fault_address(&self) -> Option<u64> { None }
    ///     fn cause(&self) -> &'static str { "test" }
    /// }
    ///
    /// let state = Short { pc: 1, sp: 2 };
    /// let _ = state.field("pc");
    /// ```
    const LAYOUT_CHECKED: () = assert!(
        fields_tile(Self::FIELDS, core::mem::size_of::<Self>()),
        "CpuState::FIELDS does not tile the record"
    );

    /// Address execution resumes at.
    fn program_counter(&self) -> u64;

    fn set_program_counter(&mut self, pc: u64);

    /// Stack pointer of the faulting context, if the record holds it.
    fn stack_pointer(&self) -> Option<u64>;

    /// Faulting data or instruction address, for exceptions that report one.
    fn fault_address(&self) -> Option<u64>;

    /// Short description of what trapped.
    fn cause(&self) -> &'static str;

    /// Bring architecture-mandated bits back in line after the handler ran.
    fn reconcile(&mut self) {}

    /// Look up a slot by name.
    fn field(&self, name: &str) -> Option<u64> {
        Self::FIELDS
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.read(self))
    }

    /// Overwrite a slot by name. Returns false if there is no such slot.
    fn set_field(&mut self, name: &str, value: u64) -> bool {
        match Self::FIELDS.iter().find(|f| f.name == name) {
            Some(f) => {
                f.write(self, value);
                true
            }
            None => false,
        }
    }
}

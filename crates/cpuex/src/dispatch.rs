//! Sequencing between the backend entry, the application handler and resume.
//!
//! Behaviors:
//! - [D1] an accepted entry calls exactly one handler, exactly once
//! - [D2] the handler sees the captured state and edits it in place
//! - [D3] fields the handler rewrote are recorded, then `reconcile` runs
//! - [D4] a handler that never returns leaves the phase non-idle and
//!   nothing is reconciled
//! - [D5] entry while another exception is in flight is refused
//! - [D6] the handler slot only changes while idle

use core::marker::PhantomData;
use core::sync::atomic::{AtomicPtr, AtomicU8, AtomicU64, Ordering};

use log::{debug, error};

use crate::error::ExceptionError;
use crate::support;
use crate::traits::{CpuState, Field};

/// Application exception handler.
///
/// Returning asks the backend to resume with whatever the handler left in
/// the state. Not returning (reset, halt, spin) is the only way to report an
/// unrecoverable exception.
pub type Handler<S> = fn(&mut S);

/// Where the dispatcher is in handling an exception.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Armed, nothing in flight.
    Idle = 0,
    /// Trap taken, handler running.
    Faulted = 1,
    /// Handler returned, backend reconciling before restore.
    Resuming = 2,
    /// Handler gave up; the core will not resume.
    Terminal = 3,
}

impl Phase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Faulted,
            2 => Self::Resuming,
            _ => Self::Terminal,
        }
    }
}

/// Which state fields a handler rewrote, by index into `S::FIELDS`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet(u64);

impl ChangeSet {
    pub fn between<S: CpuState>(before: &S, after: &S) -> Self {
        let () = S::LAYOUT_CHECKED;
        let mut bits = 0u64;
        for (i, field) in S::FIELDS.iter().enumerate().take(64) {
            if field.read(before) != field.read(after) {
                bits |= 1 << i;
            }
        }
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn contains(self, index: usize) -> bool {
        index < 64 && self.0 & (1 << index) != 0
    }

    pub fn fields<S: CpuState>(self) -> impl Iterator<Item = &'static Field> {
        S::FIELDS
            .iter()
            .enumerate()
            .filter(move |(i, _)| self.contains(*i))
            .map(|(_, f)| f)
    }

    pub fn contains_name<S: CpuState>(self, name: &str) -> bool {
        self.fields::<S>().any(|f| f.name == name)
    }
}

/// Outcome of an entry whose handler returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resumed {
    pub changed: ChangeSet,
}

/// Per-backend exception dispatcher.
///
/// Lives in a `static`; every member is an atomic so the entry path never
/// waits on a lock held by the code it interrupted.
pub struct Dispatcher<S> {
    handler: AtomicPtr<()>,
    phase: AtomicU8,
    entries: AtomicU64,
    resumes: AtomicU64,
    halt: fn() -> !,
    _state: PhantomData<fn(&mut S)>,
}

impl<S: CpuState> Dispatcher<S> {
    /// `halt` is what [`Self::terminate`] ends in; backends pass their
    /// low-power spin.
    pub const fn new(halt: fn() -> !) -> Self {
        Self {
            handler: AtomicPtr::new(core::ptr::null_mut()),
            phase: AtomicU8::new(Phase::Idle as u8),
            entries: AtomicU64::new(0),
            resumes: AtomicU64::new(0),
            halt,
            _state: PhantomData,
        }
    }

    /// [D6] Install the application handler.
    pub fn set_handler(&self, handler: Handler<S>) -> Result<(), ExceptionError> {
        self.ensure_idle()?;
        self.handler.store(handler as *mut (), Ordering::Release);
        Ok(())
    }

    /// [D6] Go back to [`Self::default_handler`].
    pub fn restore_default_handler(&self) -> Result<(), ExceptionError> {
        self.ensure_idle()?;
        self.handler.store(core::ptr::null_mut(), Ordering::Release);
        Ok(())
    }

    pub fn has_custom_handler(&self) -> bool {
        !self.handler.load(Ordering::Acquire).is_null()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Traps delivered to [`Self::enter`], refused ones included.
    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }

    /// Entries whose handler returned.
    pub fn resumes(&self) -> u64 {
        self.resumes.load(Ordering::Relaxed)
    }

    /// Run the handler for one captured exception.
    ///
    /// On `Ok` the caller restores the processor from `state`. On `Err` no
    /// handler ran and the caller must not resume.
    pub fn enter(&self, state: &mut S) -> Result<Resumed, ExceptionError> {
        self.entries.fetch_add(1, Ordering::Relaxed);

        // [D5]
        if let Err(prev) = self.phase.compare_exchange(
            Phase::Idle as u8,
            Phase::Faulted as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return Err(match Phase::from_u8(prev) {
                Phase::Terminal => ExceptionError::Terminated,
                Phase::Idle | Phase::Faulted | Phase::Resuming => ExceptionError::NestedFault,
            });
        }

        #[cfg(feature = "verbose")]
        log::trace!(
            "{} exception entry: {} at {:#x}",
            S::ARCH.name(),
            state.cause(),
            state.program_counter()
        );

        let before = *state;

        // [D1][D2]
        match self.installed() {
            Some(handler) => handler(state),
            None => self.default_handler(state),
        }

        // [D3]
        self.phase.store(Phase::Resuming as u8, Ordering::Release);
        let changed = ChangeSet::between(&before, state);
        for field in changed.fields::<S>() {
            debug!(
                "handler rewrote {}: {:#x} -> {:#x}",
                field.name,
                field.read(&before),
                field.read(state)
            );
        }
        state.reconcile();

        self.resumes.fetch_add(1, Ordering::Relaxed);
        self.phase.store(Phase::Idle as u8, Ordering::Release);
        Ok(Resumed { changed })
    }

    /// [D4] Give up on the faulting context for good.
    pub fn terminate(&self) -> ! {
        self.phase.store(Phase::Terminal as u8, Ordering::Release);
        (self.halt)()
    }

    /// Handler used while no application handler is installed: dump the
    /// state and stop.
    pub fn default_handler(&self, state: &mut S) -> ! {
        error!("unhandled CPU exception: {}", state.cause());
        support::log_cpu_state(state);
        self.terminate()
    }

    fn installed(&self) -> Option<Handler<S>> {
        let ptr = self.handler.load(Ordering::Acquire);
        if ptr.is_null() {
            return None;
        }
        // SAFETY: non-null values only ever come from `set_handler`, which
        // stores a `Handler<S>` for this same `S`.
        Some(unsafe { core::mem::transmute::<*mut (), Handler<S>>(ptr) })
    }

    fn ensure_idle(&self) -> Result<(), ExceptionError> {
        if self.phase() == Phase::Idle {
            Ok(())
        } else {
            Err(ExceptionError::HandlerBusy)
        }
    }
}

#[cfg(all(test, feature = "std"))]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::aarch64::TrapFrame;
    use crate::x86_64::{InterruptFrame, Vector};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::AtomicUsize;

    fn test_halt() -> ! {
        panic!("halted");
    }

    /// A synthetic trap: registers as they were just before the fault.
    fn pre_trap_frame() -> TrapFrame {
        let mut frame = TrapFrame::default();
        for (i, x) in frame.x.iter_mut().enumerate() {
            *x = 0x1000 + i as u64;
        }
        frame.elr = 0xffff_0000_0008_1234;
        frame.spsr = 0x3c5;
        frame.esr = 0x9600_0045; // data abort, current EL, write, L1 translation
        frame.far = 0xdead_0000;
        frame.vector = 4; // current EL, SP_ELx, synchronous
        frame
    }

    /// Tests: [D1] exactly one call, [D2] state matches pre-trap values
    #[test]
    fn test_entry_calls_handler_once_with_captured_state() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn handler(state: &mut TrapFrame) {
            CALLS.fetch_add(1, Ordering::SeqCst);
            assert_eq!(state.x[0], 0x1000);
            assert_eq!(state.x[30], 0x1000 + 30);
            assert_eq!(state.program_counter(), 0xffff_0000_0008_1234);
            assert_eq!(state.fault_address(), Some(0xdead_0000));
        }

        let dispatcher = Dispatcher::<TrapFrame>::new(test_halt);
        dispatcher.set_handler(handler).unwrap();
        let mut frame = pre_trap_frame();
        let resumed = dispatcher.enter(&mut frame).unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(resumed.changed.is_empty());
        assert_eq!(frame, pre_trap_frame());
        assert_eq!(dispatcher.entries(), 1);
        assert_eq!(dispatcher.resumes(), 1);
        assert_eq!(dispatcher.phase(), Phase::Idle);
    }

    /// Tests: [D2] mutation survives, [D3] change recorded
    #[test]
    fn test_mutations_are_what_gets_restored() {
        fn skip_faulting_instruction(state: &mut TrapFrame) {
            let pc = state.program_counter();
            state.set_program_counter(pc + 4);
            state.x[0] = 0;
        }

        let dispatcher = Dispatcher::<TrapFrame>::new(test_halt);
        dispatcher.set_handler(skip_faulting_instruction).unwrap();
        let mut frame = pre_trap_frame();
        let resumed = dispatcher.enter(&mut frame).unwrap();

        assert_eq!(frame.elr, 0xffff_0000_0008_1238);
        assert_eq!(frame.x[0], 0);
        assert_eq!(resumed.changed.len(), 2);
        assert!(resumed.changed.contains_name::<TrapFrame>("elr"));
        assert!(resumed.changed.contains_name::<TrapFrame>("x0"));
        assert!(!resumed.changed.contains_name::<TrapFrame>("x1"));
    }

    /// Tests: [D3] reconcile runs after the handler
    #[test]
    fn test_reconcile_runs_after_handler_returns() {
        fn clobber_rflags(state: &mut InterruptFrame) {
            state.rflags = 0;
        }

        let dispatcher = Dispatcher::<InterruptFrame>::new(test_halt);
        dispatcher.set_handler(clobber_rflags).unwrap();
        let mut frame = InterruptFrame {
            vector: Vector::Breakpoint as u64,
            rflags: 0x246,
            ..InterruptFrame::default()
        };
        let resumed = dispatcher.enter(&mut frame).unwrap();

        // reserved bit 1 always reads as one
        assert_eq!(frame.rflags, 0x2);
        assert!(resumed.changed.contains_name::<InterruptFrame>("rflags"));
    }

    /// Tests: [D4] non-returning handler, no reconcile, no resume
    #[test]
    fn test_non_returning_handler_is_never_resumed() {
        fn give_up(_state: &mut InterruptFrame) {
            panic!("reset requested");
        }

        let dispatcher = Dispatcher::<InterruptFrame>::new(test_halt);
        dispatcher.set_handler(give_up).unwrap();
        let mut frame = InterruptFrame {
            rflags: 0,
            ..InterruptFrame::default()
        };
        let result = catch_unwind(AssertUnwindSafe(|| dispatcher.enter(&mut frame)));

        assert!(result.is_err());
        assert_eq!(frame.rflags, 0); // reconcile would have set bit 1
        assert_eq!(dispatcher.resumes(), 0);
        assert_eq!(dispatcher.phase(), Phase::Faulted);
    }

    /// Tests: [D4] default handler terminates
    #[test]
    fn test_default_handler_terminates() {
        let dispatcher = Dispatcher::<TrapFrame>::new(test_halt);
        assert!(!dispatcher.has_custom_handler());
        let mut frame = pre_trap_frame();
        let result = catch_unwind(AssertUnwindSafe(|| dispatcher.enter(&mut frame)));

        assert!(result.is_err());
        assert_eq!(dispatcher.phase(), Phase::Terminal);
        assert_eq!(dispatcher.resumes(), 0);

        // [D5] nothing runs after a terminal outcome
        let mut next = pre_trap_frame();
        assert_eq!(dispatcher.enter(&mut next), Err(ExceptionError::Terminated));
        assert_eq!(dispatcher.entries(), 2);
    }

    /// Tests: [D5] nested entry refused without calling the handler
    #[test]
    fn test_nested_entry_is_refused() {
        static INNER: Dispatcher<TrapFrame> = Dispatcher::new(test_halt);
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn faulting_handler(_state: &mut TrapFrame) {
            CALLS.fetch_add(1, Ordering::SeqCst);
            let mut nested = TrapFrame::default();
            assert_eq!(INNER.enter(&mut nested), Err(ExceptionError::NestedFault));
            // [D6] slot is locked while handling
            assert_eq!(INNER.restore_default_handler(), Err(ExceptionError::HandlerBusy));
        }

        INNER.set_handler(faulting_handler).unwrap();
        let mut frame = pre_trap_frame();
        INNER.enter(&mut frame).unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(INNER.entries(), 2);
        assert_eq!(INNER.resumes(), 1);
        assert_eq!(INNER.phase(), Phase::Idle);
    }

    /// Tests: [D6] swapping handlers while idle
    #[test]
    fn test_handler_swap_while_idle() {
        static LAST: AtomicUsize = AtomicUsize::new(0);
        fn first(_: &mut TrapFrame) {
            LAST.store(1, Ordering::SeqCst);
        }
        fn second(_: &mut TrapFrame) {
            LAST.store(2, Ordering::SeqCst);
        }

        let dispatcher = Dispatcher::<TrapFrame>::new(test_halt);
        dispatcher.set_handler(first).unwrap();
        dispatcher.set_handler(second).unwrap();
        assert!(dispatcher.has_custom_handler());
        dispatcher.enter(&mut pre_trap_frame()).unwrap();
        assert_eq!(LAST.load(Ordering::SeqCst), 2);

        dispatcher.restore_default_handler().unwrap();
        assert!(!dispatcher.has_custom_handler());
    }

    #[test]
    fn test_change_set_bits() {
        let before = pre_trap_frame();
        let mut after = before;
        after.x[3] = 0;
        after.vector = 5;
        let changes = ChangeSet::between(&before, &after);
        assert!(changes.contains(3));
        assert!(changes.contains(TrapFrame::FIELDS.len() - 1));
        assert!(!changes.contains(64));
        let names: std::vec::Vec<_> = changes.fields::<TrapFrame>().map(|f| f.name).collect();
        assert_eq!(names, ["x3", "vector"]);
    }
}

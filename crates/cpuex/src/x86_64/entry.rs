//! IDT stubs for vectors 0-31 and the common path into [`DISPATCHER`].
//!
//! Each stub normalises the stack (dummy error code where the CPU pushes
//! none, then the vector number) and jumps to the common stub, which pushes
//! the general-purpose registers and CR2 to complete an `InterruptFrame`.
//! After the handler returns the same slots are popped back, so handler
//! edits are what `iretq` resumes with.

use core::arch::naked_asm;

use cpuex_utils::{Lazy, Once};
use log::{error, info};
use ::x86_64::VirtAddr;
use ::x86_64::structures::idt::InterruptDescriptorTable;

use super::InterruptFrame;
use super::{STUB_VECTORS, Vector};
use crate::dispatch::Dispatcher;
use crate::support;

/// The dispatcher the IDT stubs enter.
pub static DISPATCHER: Dispatcher<InterruptFrame> = Dispatcher::new(halt);

static INSTALLED: Once = Once::new();

macro_rules! vector_stub {
    ($name:ident, $vector:literal) => {
        #[unsafe(naked)]
        unsafe extern "C" fn $name() {
            naked_asm!(
                "push 0",
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym cpuex_x86_64_common,
            );
        }
    };
    ($name:ident, $vector:literal, error_code) => {
        #[unsafe(naked)]
        unsafe extern "C" fn $name() {
            naked_asm!(
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym cpuex_x86_64_common,
            );
        }
    };
}

vector_stub!(cpuex_vector_0, 0);
vector_stub!(cpuex_vector_1, 1);
vector_stub!(cpuex_vector_2, 2);
vector_stub!(cpuex_vector_3, 3);
vector_stub!(cpuex_vector_4, 4);
vector_stub!(cpuex_vector_5, 5);
vector_stub!(cpuex_vector_6, 6);
vector_stub!(cpuex_vector_7, 7);
vector_stub!(cpuex_vector_8, 8, error_code);
vector_stub!(cpuex_vector_10, 10, error_code);
vector_stub!(cpuex_vector_11, 11, error_code);
vector_stub!(cpuex_vector_12, 12, error_code);
vector_stub!(cpuex_vector_13, 13, error_code);
vector_stub!(cpuex_vector_14, 14, error_code);
vector_stub!(cpuex_vector_16, 16);
vector_stub!(cpuex_vector_17, 17, error_code);
vector_stub!(cpuex_vector_18, 18);
vector_stub!(cpuex_vector_19, 19);
vector_stub!(cpuex_vector_20, 20);
vector_stub!(cpuex_vector_21, 21, error_code);
vector_stub!(cpuex_vector_28, 28);
vector_stub!(cpuex_vector_29, 29, error_code);
vector_stub!(cpuex_vector_30, 30, error_code);

#[unsafe(naked)]
unsafe extern "C" fn cpuex_x86_64_common() {
    naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rax, cr2",
        "push rax",
        // rbp survives the call and holds the frame base
        "mov rbp, rsp",
        "mov rdi, rsp",
        "and rsp, -16",
        "cld",
        "call {entry}",
        "mov rsp, rbp",
        "pop rax",
        "mov cr2, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        // vector and error code
        "add rsp, 16",
        "iretq",
        entry = sym cpuex_x86_64_entry,
    );
}

extern "C" fn cpuex_x86_64_entry(frame: &mut InterruptFrame) {
    if let Err(err) = DISPATCHER.enter(frame) {
        error!("cpu exception not dispatched: {err}");
        support::log_cpu_state(frame);
        DISPATCHER.terminate();
    }
}

type Stub = unsafe extern "C" fn();

fn stub_addr(stub: Stub) -> VirtAddr {
    VirtAddr::new(stub as usize as u64)
}

static IDT: Lazy<InterruptDescriptorTable> = Lazy::new(|| {
    let mut idt = InterruptDescriptorTable::new();
    // SAFETY: every stub is a naked entry that builds an InterruptFrame for
    // the vector it is installed on and leaves with iretq.
    unsafe {
        idt.divide_error.set_handler_addr(stub_addr(cpuex_vector_0));
        idt.debug.set_handler_addr(stub_addr(cpuex_vector_1));
        idt.non_maskable_interrupt.set_handler_addr(stub_addr(cpuex_vector_2));
        idt.breakpoint.set_handler_addr(stub_addr(cpuex_vector_3));
        idt.overflow.set_handler_addr(stub_addr(cpuex_vector_4));
        idt.bound_range_exceeded.set_handler_addr(stub_addr(cpuex_vector_5));
        idt.invalid_opcode.set_handler_addr(stub_addr(cpuex_vector_6));
        idt.device_not_available.set_handler_addr(stub_addr(cpuex_vector_7));
        idt.double_fault.set_handler_addr(stub_addr(cpuex_vector_8));
        idt.invalid_tss.set_handler_addr(stub_addr(cpuex_vector_10));
        idt.segment_not_present.set_handler_addr(stub_addr(cpuex_vector_11));
        idt.stack_segment_fault.set_handler_addr(stub_addr(cpuex_vector_12));
        idt.general_protection_fault.set_handler_addr(stub_addr(cpuex_vector_13));
        idt.page_fault.set_handler_addr(stub_addr(cpuex_vector_14));
        idt.x87_floating_point.set_handler_addr(stub_addr(cpuex_vector_16));
        idt.alignment_check.set_handler_addr(stub_addr(cpuex_vector_17));
        idt.machine_check.set_handler_addr(stub_addr(cpuex_vector_18));
        idt.simd_floating_point.set_handler_addr(stub_addr(cpuex_vector_19));
        idt.virtualization.set_handler_addr(stub_addr(cpuex_vector_20));
        idt.cp_protection_exception.set_handler_addr(stub_addr(cpuex_vector_21));
        idt.hv_injection_exception.set_handler_addr(stub_addr(cpuex_vector_28));
        idt.vmm_communication_exception.set_handler_addr(stub_addr(cpuex_vector_29));
        idt.security_exception.set_handler_addr(stub_addr(cpuex_vector_30));
    }
    idt
});

/// Load the IDT with the exception stubs. Later calls do nothing.
///
/// Only [`STUB_VECTORS`] are installed. Vector 9 is not: the `x86_64` crate
/// keeps that entry private as reserved, and no CPU after the 386 raises
/// it. Vectors 32-255 are left not-present for the interrupt controller
/// code to fill in.
pub fn init() {
    INSTALLED.call_once(|| {
        IDT.load();
        info!(
            "cpu exception vectors installed ({} vectors, {} through {})",
            STUB_VECTORS.len(),
            Vector::DivideError.name(),
            Vector::Security.name()
        );
    });
}

/// Stop the core. Interrupts stay masked from exception entry, so `hlt`
/// only wakes for NMI and the loop catches that.
pub fn halt() -> ! {
    loop {
        ::x86_64::instructions::hlt();
    }
}

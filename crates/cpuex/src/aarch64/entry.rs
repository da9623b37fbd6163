//! EL1 vector table and the trampoline into [`DISPATCHER`].
//!
//! Every one of the 16 vectors funnels into the same save/restore path. The
//! frame is built on the current SP_EL1 stack with the SIMD/FP bank
//! ([`FpContext`]) below it. On return the FP bank is reloaded as saved and
//! every `TrapFrame` slot is written back before `eret`, so whatever the
//! handler leaves in the frame is what the interrupted context resumes with.

use core::arch::global_asm;
use core::mem::{offset_of, size_of};

use aarch64_cpu::asm::barrier;
use aarch64_cpu::registers::{VBAR_EL1, Writeable};
use cpuex_utils::Once;
use log::{error, info};

use super::{FpContext, TrapFrame};
use crate::dispatch::Dispatcher;
use crate::support;

/// The dispatcher the vector table enters.
pub static DISPATCHER: Dispatcher<TrapFrame> = Dispatcher::new(halt);

static INSTALLED: Once = Once::new();

global_asm!(
    r#"
.macro CPUEX_VECTOR kind
    .balign 0x80
    sub     sp, sp, #{frame_size}
    stp     x0, x1, [sp, #({x} + 0)]
    mov     x0, #\kind
    b       cpuex_aarch64_common
.endm

.section .text.cpuex_vectors, "ax"
.global cpuex_vectors
.balign 0x800
cpuex_vectors:
    /* Current EL with SP_EL0 */
    CPUEX_VECTOR 0
    CPUEX_VECTOR 1
    CPUEX_VECTOR 2
    CPUEX_VECTOR 3
    /* Current EL with SP_ELx */
    CPUEX_VECTOR 4
    CPUEX_VECTOR 5
    CPUEX_VECTOR 6
    CPUEX_VECTOR 7
    /* Lower EL using AArch64 */
    CPUEX_VECTOR 8
    CPUEX_VECTOR 9
    CPUEX_VECTOR 10
    CPUEX_VECTOR 11
    /* Lower EL using AArch32 */
    CPUEX_VECTOR 12
    CPUEX_VECTOR 13
    CPUEX_VECTOR 14
    CPUEX_VECTOR 15

cpuex_aarch64_common:
    stp     x2, x3, [sp, #({x} + 16)]
    stp     x4, x5, [sp, #({x} + 32)]
    stp     x6, x7, [sp, #({x} + 48)]
    stp     x8, x9, [sp, #({x} + 64)]
    stp     x10, x11, [sp, #({x} + 80)]
    stp     x12, x13, [sp, #({x} + 96)]
    stp     x14, x15, [sp, #({x} + 112)]
    stp     x16, x17, [sp, #({x} + 128)]
    stp     x18, x19, [sp, #({x} + 144)]
    stp     x20, x21, [sp, #({x} + 160)]
    stp     x22, x23, [sp, #({x} + 176)]
    stp     x24, x25, [sp, #({x} + 192)]
    stp     x26, x27, [sp, #({x} + 208)]
    stp     x28, x29, [sp, #({x} + 224)]
    str     x30, [sp, #({x} + 240)]
    str     x0, [sp, #{vector}]

    mrs     x1, sp_el0
    str     x1, [sp, #{sp_el0}]
    mrs     x1, tpidr_el0
    str     x1, [sp, #{tpidr_el0}]
    mrs     x1, elr_el1
    str     x1, [sp, #{elr}]
    mrs     x1, spsr_el1
    str     x1, [sp, #{spsr}]
    mrs     x1, esr_el1
    str     x1, [sp, #{esr}]
    mrs     x1, far_el1
    str     x1, [sp, #{far}]

    /* SIMD/FP bank, below the frame */
    sub     sp, sp, #{fp_size}
    stp     q0, q1, [sp, #({q} + 0)]
    stp     q2, q3, [sp, #({q} + 32)]
    stp     q4, q5, [sp, #({q} + 64)]
    stp     q6, q7, [sp, #({q} + 96)]
    stp     q8, q9, [sp, #({q} + 128)]
    stp     q10, q11, [sp, #({q} + 160)]
    stp     q12, q13, [sp, #({q} + 192)]
    stp     q14, q15, [sp, #({q} + 224)]
    stp     q16, q17, [sp, #({q} + 256)]
    stp     q18, q19, [sp, #({q} + 288)]
    stp     q20, q21, [sp, #({q} + 320)]
    stp     q22, q23, [sp, #({q} + 352)]
    stp     q24, q25, [sp, #({q} + 384)]
    stp     q26, q27, [sp, #({q} + 416)]
    stp     q28, q29, [sp, #({q} + 448)]
    stp     q30, q31, [sp, #({q} + 480)]
    mrs     x1, fpcr
    str     x1, [sp, #{fpcr}]
    mrs     x1, fpsr
    str     x1, [sp, #{fpsr}]

    add     x0, sp, #{fp_size}
    bl      {entry}

    ldr     x1, [sp, #{fpsr}]
    msr     fpsr, x1
    ldr     x1, [sp, #{fpcr}]
    msr     fpcr, x1
    ldp     q0, q1, [sp, #({q} + 0)]
    ldp     q2, q3, [sp, #({q} + 32)]
    ldp     q4, q5, [sp, #({q} + 64)]
    ldp     q6, q7, [sp, #({q} + 96)]
    ldp     q8, q9, [sp, #({q} + 128)]
    ldp     q10, q11, [sp, #({q} + 160)]
    ldp     q12, q13, [sp, #({q} + 192)]
    ldp     q14, q15, [sp, #({q} + 224)]
    ldp     q16, q17, [sp, #({q} + 256)]
    ldp     q18, q19, [sp, #({q} + 288)]
    ldp     q20, q21, [sp, #({q} + 320)]
    ldp     q22, q23, [sp, #({q} + 352)]
    ldp     q24, q25, [sp, #({q} + 384)]
    ldp     q26, q27, [sp, #({q} + 416)]
    ldp     q28, q29, [sp, #({q} + 448)]
    ldp     q30, q31, [sp, #({q} + 480)]
    add     sp, sp, #{fp_size}

    /* Write back everything the handler may have changed */
    ldr     x1, [sp, #{far}]
    msr     far_el1, x1
    ldr     x1, [sp, #{esr}]
    msr     esr_el1, x1
    ldr     x1, [sp, #{spsr}]
    msr     spsr_el1, x1
    ldr     x1, [sp, #{elr}]
    msr     elr_el1, x1
    ldr     x1, [sp, #{tpidr_el0}]
    msr     tpidr_el0, x1
    ldr     x1, [sp, #{sp_el0}]
    msr     sp_el0, x1

    ldp     x0, x1, [sp, #({x} + 0)]
    ldp     x2, x3, [sp, #({x} + 16)]
    ldp     x4, x5, [sp, #({x} + 32)]
    ldp     x6, x7, [sp, #({x} + 48)]
    ldp     x8, x9, [sp, #({x} + 64)]
    ldp     x10, x11, [sp, #({x} + 80)]
    ldp     x12, x13, [sp, #({x} + 96)]
    ldp     x14, x15, [sp, #({x} + 112)]
    ldp     x16, x17, [sp, #({x} + 128)]
    ldp     x18, x19, [sp, #({x} + 144)]
    ldp     x20, x21, [sp, #({x} + 160)]
    ldp     x22, x23, [sp, #({x} + 176)]
    ldp     x24, x25, [sp, #({x} + 192)]
    ldp     x26, x27, [sp, #({x} + 208)]
    ldp     x28, x29, [sp, #({x} + 224)]
    ldr     x30, [sp, #({x} + 240)]
    add     sp, sp, #{frame_size}
    eret
"#,
    frame_size = const size_of::<TrapFrame>(),
    x = const offset_of!(TrapFrame, x),
    sp_el0 = const offset_of!(TrapFrame, sp_el0),
    tpidr_el0 = const offset_of!(TrapFrame, tpidr_el0),
    elr = const offset_of!(TrapFrame, elr),
    spsr = const offset_of!(TrapFrame, spsr),
    esr = const offset_of!(TrapFrame, esr),
    far = const offset_of!(TrapFrame, far),
    vector = const offset_of!(TrapFrame, vector),
    fp_size = const size_of::<FpContext>(),
    q = const offset_of!(FpContext, q),
    fpcr = const offset_of!(FpContext, fpcr),
    fpsr = const offset_of!(FpContext, fpsr),
    entry = sym cpuex_aarch64_entry,
);

/// Called by the trampoline with the frame it just built.
extern "C" fn cpuex_aarch64_entry(frame: &mut TrapFrame) {
    if let Err(err) = DISPATCHER.enter(frame) {
        error!("cpu exception not dispatched: {err}");
        support::log_cpu_state(frame);
        DISPATCHER.terminate();
    }
}

/// Point VBAR_EL1 at the vector table. Later calls do nothing.
pub fn init() {
    INSTALLED.call_once(|| {
        unsafe extern "C" {
            static cpuex_vectors: u8;
        }
        // SAFETY: only the address of the linker symbol is taken
        let base = unsafe { core::ptr::addr_of!(cpuex_vectors) as u64 };
        VBAR_EL1.set(base);
        barrier::isb(barrier::SY);
        info!("cpu exception vectors at {base:#x}");
    });
}

/// Park the core with no intention of waking up.
pub fn halt() -> ! {
    loop {
        aarch64_cpu::asm::wfe();
    }
}

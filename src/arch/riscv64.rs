//! Architecture-specific signal-frame access.
//!
//! RISC-V doesn't use `SA_RESTORER`; the kernel maps a vDSO trampoline for
//! returning from signal handlers, so unlike the other architectures there
//! is no `return_from_signal_handler` here.

use core::ffi::{c_ulong, c_void};
use rustix::runtime::Stack;

/// The integer-register block at the head of the kernel's riscv64
/// `struct sigcontext`. Only `sp` is read.
#[repr(C)]
struct UserRegs {
    pc: u64,
    ra: u64,
    sp: u64,
    rest: [u64; 29],
}

#[repr(C, align(16))]
struct Sigcontext {
    sc_regs: UserRegs,
}

/// The kernel's `struct ucontext`, with the signal mask padded out to
/// 1024 bits ahead of the machine context.
#[repr(C)]
struct Ucontext {
    uc_flags: c_ulong,
    uc_link: *mut Ucontext,
    uc_stack: Stack,
    uc_sigmask: u64,
    unused: [u8; 120],
    uc_mcontext: Sigcontext,
}

/// Extract the interrupted thread's stack pointer from the opaque context
/// argument passed to an `SA_SIGINFO` handler.
///
/// # Safety
///
/// `context` must be the third argument of an `SA_SIGINFO` signal handler
/// invocation, or null.
#[inline]
pub(crate) unsafe fn stack_pointer(context: *mut c_void) -> Option<usize> {
    if context.is_null() {
        return None;
    }
    Some(unsafe { (*context.cast::<Ucontext>()).uc_mcontext.sc_regs.sp as usize })
}

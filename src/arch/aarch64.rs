//! Architecture-specific signal-frame access and assembly code.

use core::arch::naked_asm;
use core::ffi::{c_ulong, c_void};
use linux_raw_sys::general::__NR_rt_sigreturn;
use rustix::runtime::Stack;

/// The kernel's aarch64 `struct sigcontext`. Only `sp` is read; the
/// `__reserved` area holds the FP/SIMD context and is never touched.
#[repr(C, align(16))]
struct Sigcontext {
    fault_address: u64,
    regs: [u64; 31],
    sp: u64,
    pc: u64,
    pstate: u64,
    reserved: [u8; 4096],
}

/// The kernel's `struct ucontext`. On aarch64 the signal mask sits between
/// the stack record and the machine context, padded out to 1024 bits.
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
    Some(unsafe { (*context.cast::<Ucontext>()).uc_mcontext.sp as usize })
}

/// Invoke the `__NR_rt_sigreturn` system call to return control from a
/// signal handler.
///
/// # Safety
///
/// This function must never be called other than by the `sa_restorer`
/// mechanism.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn return_from_signal_handler() {
    naked_asm!(
        "mov x8,{__NR_rt_sigreturn}",
        "svc 0",
        "udf #16",
        __NR_rt_sigreturn = const __NR_rt_sigreturn,
    );
}

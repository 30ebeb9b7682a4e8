//! Architecture-specific signal-frame access and assembly code.

use core::arch::naked_asm;
use core::ffi::{c_ulong, c_void};
use linux_raw_sys::general::__NR_rt_sigreturn;
use rustix::runtime::Stack;

/// The kernel's x86-64 `struct sigcontext`, as placed in the `rt_sigframe`
/// that `rt_sigaction`-registered handlers receive. Only `rsp` is read; the
/// rest is declared so the offsets come out right.
#[repr(C)]
struct Sigcontext {
    r8: u64,
    r9: u64,
    r10: u64,
    r11: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rdi: u64,
    rsi: u64,
    rbp: u64,
    rbx: u64,
    rdx: u64,
    rax: u64,
    rcx: u64,
    rsp: u64,
    rip: u64,
    eflags: u64,
    cs: u16,
    gs: u16,
    fs: u16,
    ss: u16,
    err: u64,
    trapno: u64,
    oldmask: u64,
    cr2: u64,
    fpstate: u64,
    reserved: [u64; 8],
}

/// The kernel's `struct ucontext`. The signal mask follows `uc_mcontext`;
/// it isn't needed here.
#[repr(C)]
struct Ucontext {
    uc_flags: c_ulong,
    uc_link: *mut Ucontext,
    uc_stack: Stack,
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
    Some(unsafe { (*context.cast::<Ucontext>()).uc_mcontext.rsp as usize })
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
        "mov rax,{__NR_rt_sigreturn}",
        "syscall",
        "ud2",
        __NR_rt_sigreturn = const __NR_rt_sigreturn,
    );
}

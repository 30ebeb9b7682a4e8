//! Raw signal-handler registration.
//!
//! Handlers are registered with the kernel directly via `rt_sigaction`
//! rather than through a libc, so this module supplies the `sa_restorer`
//! trampoline itself on the architectures that require one.

#[cfg(not(target_arch = "riscv64"))]
use crate::arch;
use core::ffi::c_void;
use rustix::io;

pub(crate) use rustix::runtime::{
    KernelSigaction as Sigaction, KernelSigactionFlags as SigactionFlags, Siginfo, Signal, Stack,
    KERNEL_SIG_DFL as SIG_DFL,
};

/// A handler function type for use with [`Sigaction`].
pub(crate) type Sighandler = rustix::runtime::KernelSighandler;

/// `MINSIGSTKSZ`
pub(crate) const MINSIGSTKSZ: usize = linux_raw_sys::general::MINSIGSTKSZ as usize;
/// `SS_DISABLE`
pub(crate) const SS_DISABLE: i32 = linux_raw_sys::general::SS_DISABLE as i32;

/// Register a signal handler.
///
/// # Safety
///
/// yolo. At least this function handles `sa_restorer` automatically though.
pub(crate) unsafe fn sigaction(sig: Signal, action: Option<Sigaction>) -> io::Result<Sigaction> {
    #[allow(unused_mut)]
    let mut action = action;

    #[cfg(not(target_arch = "riscv64"))]
    if let Some(action) = &mut action {
        action.sa_flags |= SigactionFlags::RESTORER;
        action.sa_restorer = Some(arch::return_from_signal_handler);
    }

    unsafe { rustix::runtime::kernel_sigaction(sig, action) }
}

/// Replace the calling thread's alternate signal stack.
///
/// # Safety
///
/// If `new` designates a stack, its memory must stay valid for as long as
/// signals may be delivered on it.
pub(crate) unsafe fn sigaltstack(new: Stack) -> io::Result<Stack> {
    unsafe { rustix::runtime::kernel_sigaltstack(Some(new)) }
}

/// Extract the faulting address from a `SIGSEGV`/`SIGBUS` `siginfo_t`.
///
/// # Safety
///
/// `info` must be the `siginfo_t` passed to an `SA_SIGINFO` handler for a
/// fault signal; only those fill in the `_sigfault` arm of the union.
#[inline]
pub(crate) unsafe fn fault_address(info: *const Siginfo) -> *mut c_void {
    unsafe { (*info).__bindgen_anon_1.__bindgen_anon_1._sifields._sigfault._addr as *mut c_void }
}

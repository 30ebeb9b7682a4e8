//! Fault-handler installation and dispatch.
//!
//! Registration state is process-wide and follows a single-writer contract:
//! the install/uninstall functions here are the only writers and must be
//! called from ordinary control flow (ideally during startup, before
//! spawning threads that might fault); the signal-dispatch path only reads.
//! Every field is a lock-free scalar, so the reader is safe in a context
//! where taking any lock would be a deadlock risk.
//!
//! Dispatch order per fault: the generic handler gets first refusal, then
//! stack-overflow classification and the stack-overflow handler, then the
//! generic handler once more with `final_attempt` set, and finally the
//! default dispositions are restored so the re-executed faulting
//! instruction terminates the process.

use crate::arch;
use crate::error::Unsupported;
use crate::overflow;
use crate::signal::{
    self, Sigaction, SigactionFlags, Sighandler, Siginfo, Signal, Stack, SIG_DFL,
};
use crate::vma::locate_vma;
use bitflags::bitflags;
use core::ffi::{c_int, c_void};
use core::mem;
use core::ptr::null_mut;
use core::sync::atomic::Ordering::SeqCst;
use core::sync::atomic::{AtomicU8, AtomicUsize};
use rustix::param::page_size;
use rustix::process::{getrlimit, Resource};

pub(crate) const SUPPORTED: bool = true;

/// The smallest alternate-stack block
/// [`install_stack_overflow_handler`] accepts, from the kernel's
/// `MINSIGSTKSZ`. Real handlers want comfortably more; 64 KiB is a common
/// choice.
pub const MIN_ALTERNATE_STACK_SIZE: usize = signal::MINSIGSTKSZ;

/// What a [`FaultHandler`] decided about a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultDisposition {
    /// The handler dealt with the fault; dispatch stops. Unless the handler
    /// repaired the faulting access or escaped with a non-local jump, the
    /// faulting instruction simply re-executes.
    Handled,
    /// Not this handler's fault; dispatch continues.
    Declined,
}

/// A generic fault callback.
///
/// Called with the faulting address, first with `final_attempt` false and,
/// if nothing else claims the fault, once more with `final_attempt` true.
/// Runs in signal context: it must not allocate, lock, or call anything
/// that isn't async-signal-safe.
pub type FaultHandler = fn(fault_address: *mut c_void, final_attempt: bool) -> FaultDisposition;

/// A stack-overflow callback.
///
/// Runs on the alternate signal stack. `emergency` is true when the fault
/// arrived while already executing on the alternate stack, meaning the
/// handler itself overflowed and there is no further safety net; respond
/// more conservatively than usual (typically by aborting outright).
/// `context` is the opaque OS signal-context token, passed through for
/// callers that want to inspect it.
///
/// The callback must not return; it should escape via
/// [`leave_fault_handler`]. This is encoded in the `!` return type.
pub type StackOverflowHandler = fn(emergency: bool, context: *mut c_void) -> !;

/// A continuation for [`leave_fault_handler`]: receives the three opaque
/// arguments given to that call and transfers control away, typically with
/// a `siglongjmp`-style non-local jump.
pub type Continuation = unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void) -> !;

bitflags! {
    /// Which registrations currently hold the OS signal handlers armed.
    #[derive(Clone, Copy, PartialEq, Eq)]
    struct Armed: u8 {
        const GENERIC = 1 << 0;
        const STACK_OVERFLOW = 1 << 1;
    }
}

// Process-wide registration state; see the module docs for the
// single-writer contract. Zero means "none"/"never captured" throughout.
static GENERIC_HANDLER: AtomicUsize = AtomicUsize::new(0);
static STACK_OVERFLOW_HANDLER: AtomicUsize = AtomicUsize::new(0);
static ALT_STACK_BASE: AtomicUsize = AtomicUsize::new(0);
static ALT_STACK_SIZE: AtomicUsize = AtomicUsize::new(0);
static STACK_TOP: AtomicUsize = AtomicUsize::new(0);
static ARMED: AtomicU8 = AtomicU8::new(0);

/// Register `handler` as the generic fault callback and arm the OS signal
/// handlers for `SIGSEGV` and `SIGBUS`.
///
/// Installing again replaces the previous callback; there is at most one.
///
/// # Errors
///
/// Fails with [`Unsupported`] if faults can't be intercepted here, in which
/// case `handler` will never be called and faults crash the process as
/// usual.
pub fn install_fault_handler(handler: FaultHandler) -> Result<(), Unsupported> {
    #[cfg(feature = "log")]
    log::trace!("installing generic fault handler");

    GENERIC_HANDLER.store(handler as usize, SeqCst);
    match arm(Armed::GENERIC) {
        Ok(()) => Ok(()),
        Err(err) => {
            // Leave no half-registration behind.
            clear_generic_state();
            Err(err)
        }
    }
}

/// Clear the generic fault callback.
///
/// If no stack-overflow handler remains active, this also restores the
/// default signal dispositions; otherwise the signal handlers stay armed
/// for stack-overflow detection only.
pub fn uninstall_fault_handler() {
    #[cfg(feature = "log")]
    log::trace!("uninstalling generic fault handler");

    clear_generic_state();
}

/// Register `handler` as the stack-overflow callback, designate
/// `stack_base..stack_base + stack_size` as the signal-delivery stack for
/// the calling thread, and arm the OS signal handlers.
///
/// On first use this captures an address near the top of the current
/// thread's stack and requires [`locate_vma`] to work for it once; without
/// that, overflow classification could never consult the stack's mapping.
///
/// The alternate stack is a per-thread kernel facility: in a multi-threaded
/// program, call this once per thread that wants guarded recursion, each
/// with its own block. `stack_size` must be at least
/// [`MIN_ALTERNATE_STACK_SIZE`].
///
/// # Safety
///
/// The memory block must be valid, writable, and used for nothing else for
/// as long as the registration stays armed; the kernel will run signal
/// frames on it at arbitrary points.
///
/// # Errors
///
/// Fails with [`Unsupported`] if stack-overflow recovery can't work here:
/// no fault interception, no usable VMA locator for the current stack, an
/// undersized block, or the kernel rejecting the alternate stack.
pub unsafe fn install_stack_overflow_handler(
    handler: StackOverflowHandler,
    stack_base: *mut c_void,
    stack_size: usize,
) -> Result<(), Unsupported> {
    #[cfg(feature = "log")]
    log::trace!("installing stack overflow handler, alternate stack size {stack_size}");

    if stack_base.is_null() || stack_size < MIN_ALTERNATE_STACK_SIZE {
        return Err(Unsupported);
    }

    // Capture the stack top once. The address of a local is on the stack by
    // definition; the value is only ever used as a lookup key for the
    // stack's own mapping, never dereferenced.
    if STACK_TOP.load(SeqCst) == 0 {
        let probe = 0u8;
        let probe_address = &probe as *const u8 as usize;
        locate_vma(probe_address).map_err(|_| Unsupported)?;
        STACK_TOP.store(probe_address, SeqCst);
    }

    let stack = Stack {
        ss_sp: stack_base,
        ss_flags: 0,
        ss_size: stack_size as _,
    };
    unsafe { signal::sigaltstack(stack) }.map_err(|_| Unsupported)?;

    ALT_STACK_BASE.store(stack_base as usize, SeqCst);
    ALT_STACK_SIZE.store(stack_size, SeqCst);
    STACK_OVERFLOW_HANDLER.store(handler as usize, SeqCst);
    match arm(Armed::STACK_OVERFLOW) {
        Ok(()) => Ok(()),
        Err(err) => {
            // Leave no half-registration behind.
            clear_stack_overflow_state();
            Err(err)
        }
    }
}

/// Clear the stack-overflow callback and disable the alternate delivery
/// stack.
///
/// If no generic handler remains active, this also restores the default
/// signal dispositions. The caller regains ownership of the stack memory
/// once this returns.
pub fn uninstall_stack_overflow_handler() {
    #[cfg(feature = "log")]
    log::trace!("uninstalling stack overflow handler");

    clear_stack_overflow_state();
}

/// Escape from a fault callback without returning from it.
///
/// On Linux the kernel decides "currently on the alternate stack" from the
/// stack pointer itself, and handlers here are armed with `SA_NODEFER`, so
/// the interrupted signal mask is already in effect; this reduces to
/// invoking `continuation`. Kernels that keep sticky on-alternate-stack
/// bookkeeping reset it here, which is why portable callers must leave
/// through this function rather than jumping directly.
///
/// # Safety
///
/// Must be called from within a [`FaultHandler`] or
/// [`StackOverflowHandler`] invocation. `continuation` must transfer
/// control out of the handler (it is typed never-returning) into a frame
/// that is still live.
pub unsafe fn leave_fault_handler(
    continuation: Continuation,
    arg1: *mut c_void,
    arg2: *mut c_void,
    arg3: *mut c_void,
) -> ! {
    unsafe { continuation(arg1, arg2, arg3) }
}

fn arm(which: Armed) -> Result<(), Unsupported> {
    unsafe { arm_signals() }?;
    ARMED.fetch_or(which.bits(), SeqCst);
    Ok(())
}

fn clear_generic_state() {
    GENERIC_HANDLER.store(0, SeqCst);
    disarm(Armed::GENERIC);
}

fn clear_stack_overflow_state() {
    STACK_OVERFLOW_HANDLER.store(0, SeqCst);
    ALT_STACK_BASE.store(0, SeqCst);
    ALT_STACK_SIZE.store(0, SeqCst);

    // `ss_size` stays populated: some kernels validate it even with
    // `SS_DISABLE`, where POSIX says to ignore it.
    let stack = Stack {
        ss_sp: null_mut(),
        ss_flags: signal::SS_DISABLE,
        ss_size: MIN_ALTERNATE_STACK_SIZE as _,
    };
    unsafe { signal::sigaltstack(stack) }.ok();

    disarm(Armed::STACK_OVERFLOW);
}

fn disarm(which: Armed) {
    let previous = ARMED.fetch_and(!which.bits(), SeqCst);
    let remaining = Armed::from_bits_truncate(previous) - which;
    if remaining.is_empty() {
        unsafe { restore_default_dispositions() };
    }
}

/// The signals a fault can arrive as. Invalid accesses are `SIGSEGV`
/// almost everywhere, but some paths (accesses beyond a truncated file
/// mapping, unaligned accesses) deliver `SIGBUS` instead.
const FAULT_SIGNALS: [Signal; 2] = [Signal::SEGV, Signal::BUS];

unsafe fn arm_signals() -> Result<(), Unsupported> {
    // SA_NODEFER serves two purposes: a non-local jump out of the handler
    // leaves no stale blocked-signal mask behind, and a second overflow
    // while handling the first (the emergency case) can be delivered at
    // all instead of force-killing the process.
    let handler: Sighandler = unsafe {
        mem::transmute(dispatch as unsafe extern "C" fn(c_int, *mut Siginfo, *mut c_void))
    };
    for sig in FAULT_SIGNALS {
        let mut action: Sigaction = unsafe { mem::zeroed() };
        action.sa_handler_kernel = handler;
        action.sa_flags =
            SigactionFlags::SIGINFO | SigactionFlags::ONSTACK | SigactionFlags::NODEFER;
        unsafe { signal::sigaction(sig, Some(action)) }.map_err(|_| Unsupported)?;
    }
    Ok(())
}

unsafe fn restore_default_dispositions() {
    for sig in FAULT_SIGNALS {
        let mut action: Sigaction = unsafe { mem::zeroed() };
        action.sa_handler_kernel = SIG_DFL;
        unsafe { signal::sigaction(sig, Some(action)) }.ok();
    }
}

fn generic_handler() -> Option<FaultHandler> {
    let raw = GENERIC_HANDLER.load(SeqCst);
    if raw == 0 {
        None
    } else {
        Some(unsafe { mem::transmute::<usize, FaultHandler>(raw) })
    }
}

fn stack_overflow_handler() -> Option<StackOverflowHandler> {
    let raw = STACK_OVERFLOW_HANDLER.load(SeqCst);
    if raw == 0 {
        None
    } else {
        Some(unsafe { mem::transmute::<usize, StackOverflowHandler>(raw) })
    }
}

/// The installed `SA_SIGINFO` entry point for `SIGSEGV`/`SIGBUS`.
///
/// Everything reachable from here must be async-signal-safe: no heap, no
/// locks, no formatting. Syscalls (for the VMA locator) are fine.
unsafe extern "C" fn dispatch(_sig: c_int, info: *mut Siginfo, context: *mut c_void) {
    let fault_address = unsafe { signal::fault_address(info) };

    if let Some(handler) = generic_handler() {
        if handler(fault_address, false) == FaultDisposition::Handled {
            return;
        }
    }

    if let Some(handler) = stack_overflow_handler() {
        let stack_pointer = unsafe { arch::stack_pointer(context) };
        if classify_stack_overflow(fault_address as usize, stack_pointer) {
            let emergency = stack_pointer.is_some_and(|sp| {
                overflow::on_alternate_stack(
                    sp,
                    ALT_STACK_BASE.load(SeqCst),
                    ALT_STACK_SIZE.load(SeqCst),
                )
            });
            handler(emergency, context);
        }
    }

    if let Some(handler) = generic_handler() {
        if handler(fault_address, true) == FaultDisposition::Handled {
            return;
        }
    }

    // Nobody claimed the fault. Put the default dispositions back and
    // return; the faulting instruction re-executes and the process dies the
    // way an unhandled fault always does, core dump included.
    unsafe { restore_default_dispositions() };
}

/// Decide whether a fault looks like a stack overflow, trying the
/// heuristics in decreasing order of reliability. Every failure mode
/// resolves to "no": a missed overflow crashes the process, which is the
/// conservative outcome, while a false positive would run recovery over
/// unrelated corruption.
fn classify_stack_overflow(fault_address: usize, stack_pointer: Option<usize>) -> bool {
    if let Some(sp) = stack_pointer {
        if overflow::near_stack_pointer(fault_address, sp) {
            return true;
        }
    }

    // A zero stack top means "never captured": the VMA heuristics are
    // unavailable, not anchored at address zero.
    let stack_top = STACK_TOP.load(SeqCst);
    if stack_top == 0 {
        return false;
    }
    let Ok(stack_vma) = locate_vma(stack_top) else {
        return false;
    };
    if stack_vma.contains(fault_address) || stack_vma.is_near_gap(fault_address) {
        return true;
    }

    if let Some(sp) = stack_pointer {
        if let Some(limit) = getrlimit(Resource::Stack).current {
            let alt = match (ALT_STACK_BASE.load(SeqCst), ALT_STACK_SIZE.load(SeqCst)) {
                (0, _) => None,
                (base, len) => Some((base, len)),
            };
            if overflow::matches_rlimit_shape(
                stack_vma.start,
                stack_vma.end,
                limit as usize,
                sp,
                page_size(),
                alt,
            ) {
                return true;
            }
        }
    }

    false
}

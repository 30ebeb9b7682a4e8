//! Backend for platforms where faults can't be intercepted.
//!
//! The public surface matches the real backend so callers compile
//! everywhere; installation reports [`Unsupported`] and handlers are never
//! invoked.

use crate::error::Unsupported;
use core::ffi::c_void;

pub(crate) const SUPPORTED: bool = false;

/// The smallest alternate-stack block
/// [`install_stack_overflow_handler`] accepts. Nominal on this platform;
/// installation always fails.
pub const MIN_ALTERNATE_STACK_SIZE: usize = 16 * 1024;

/// What a [`FaultHandler`] decided about a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultDisposition {
    /// The handler dealt with the fault; dispatch stops.
    Handled,
    /// Not this handler's fault; dispatch continues.
    Declined,
}

/// A generic fault callback. Never invoked on this platform.
pub type FaultHandler = fn(fault_address: *mut c_void, final_attempt: bool) -> FaultDisposition;

/// A stack-overflow callback. Never invoked on this platform.
pub type StackOverflowHandler = fn(emergency: bool, context: *mut c_void) -> !;

/// A continuation for [`leave_fault_handler`]: receives the three opaque
/// arguments given to that call and transfers control away.
pub type Continuation = unsafe extern "C" fn(*mut c_void, *mut c_void, *mut c_void) -> !;

/// Register a generic fault callback.
///
/// # Errors
///
/// Always fails with [`Unsupported`] on this platform.
pub fn install_fault_handler(_handler: FaultHandler) -> Result<(), Unsupported> {
    Err(Unsupported)
}

/// Clear the generic fault callback. Nothing to do here.
pub fn uninstall_fault_handler() {}

/// Register a stack-overflow callback.
///
/// # Safety
///
/// The memory block must be valid and writable; it is not used on this
/// platform.
///
/// # Errors
///
/// Always fails with [`Unsupported`] on this platform.
pub unsafe fn install_stack_overflow_handler(
    _handler: StackOverflowHandler,
    _stack_base: *mut c_void,
    _stack_size: usize,
) -> Result<(), Unsupported> {
    Err(Unsupported)
}

/// Clear the stack-overflow callback. Nothing to do here.
pub fn uninstall_stack_overflow_handler() {}

/// Escape from a fault callback without returning from it.
///
/// # Safety
///
/// Must be called from within a fault callback, which this platform never
/// invokes; `continuation` must transfer control into a frame that is still
/// live.
pub unsafe fn leave_fault_handler(
    continuation: Continuation,
    arg1: *mut c_void,
    arg2: *mut c_void,
    arg3: *mut c_void,
) -> ! {
    unsafe { continuation(arg1, arg2, arg3) }
}

//! Overflow the main stack, classify it as such, and escape from the
//! handler running on the alternate stack.

use recovery::{jump_continuation, map_alt_stack, JmpSlot};
use sigfault::handler::{
    install_stack_overflow_handler, leave_fault_handler, uninstall_stack_overflow_handler,
};
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;

const ALT_STACK_SIZE: usize = 64 * 1024;

static ENV: JmpSlot = JmpSlot::new();
static EMERGENCY: AtomicBool = AtomicBool::new(false);

fn on_overflow(emergency: bool, _context: *mut c_void) -> ! {
    EMERGENCY.store(emergency, SeqCst);
    unsafe { leave_fault_handler(jump_continuation, ENV.get().cast(), null_mut(), null_mut()) }
}

fn main() {
    let alt_stack = map_alt_stack(ALT_STACK_SIZE);
    unsafe { install_stack_overflow_handler(on_overflow, alt_stack, ALT_STACK_SIZE) }
        .expect("install stack overflow handler");

    if unsafe { recovery::jmp::sigsetjmp(ENV.get(), 1) } == 0 {
        recovery::burn_stack(u64::MAX);
        unreachable!("the recursion did not fault");
    }
    eprintln!("recovered from stack overflow");
    assert!(
        !EMERGENCY.load(SeqCst),
        "a first overflow must not be an emergency"
    );

    uninstall_stack_overflow_handler();
    eprintln!("done");
}

//! The generic handler gets first refusal: when it claims a fault that
//! really is a stack overflow, the stack-overflow handler never runs.

use recovery::{jump_continuation, map_alt_stack, write_stderr, JmpSlot};
use sigfault::handler::{
    install_fault_handler, install_stack_overflow_handler, leave_fault_handler, FaultDisposition,
};
use std::ffi::c_void;
use std::ptr::null_mut;

const ALT_STACK_SIZE: usize = 64 * 1024;

static ENV: JmpSlot = JmpSlot::new();

fn claim_everything(_fault_address: *mut c_void, _final_attempt: bool) -> FaultDisposition {
    write_stderr("generic handler claimed the fault\n");
    unsafe { leave_fault_handler(jump_continuation, ENV.get().cast(), null_mut(), null_mut()) }
}

fn on_overflow(_emergency: bool, _context: *mut c_void) -> ! {
    write_stderr("stack overflow handler ran\n");
    std::process::abort();
}

fn main() {
    install_fault_handler(claim_everything).expect("install fault handler");
    let alt_stack = map_alt_stack(ALT_STACK_SIZE);
    unsafe { install_stack_overflow_handler(on_overflow, alt_stack, ALT_STACK_SIZE) }
        .expect("install stack overflow handler");

    if unsafe { recovery::jmp::sigsetjmp(ENV.get(), 1) } == 0 {
        recovery::burn_stack(u64::MAX);
        unreachable!("the recursion did not fault");
    }
    eprintln!("done");
}

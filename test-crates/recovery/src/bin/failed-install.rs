//! A rejected stack-overflow installation must leave nothing behind: an
//! existing generic registration keeps working, and uninstalling the
//! never-installed handler must not restore default dispositions out from
//! under it.

use recovery::{jump_continuation, JmpSlot};
use sigfault::handler::{
    install_fault_handler, install_stack_overflow_handler, leave_fault_handler,
    uninstall_stack_overflow_handler, FaultDisposition,
};
use std::ffi::c_void;
use std::ptr::null_mut;

static ENV: JmpSlot = JmpSlot::new();

fn on_fault(_fault_address: *mut c_void, _final_attempt: bool) -> FaultDisposition {
    unsafe { leave_fault_handler(jump_continuation, ENV.get().cast(), null_mut(), null_mut()) }
}

fn on_overflow(_emergency: bool, _context: *mut c_void) -> ! {
    std::process::abort();
}

fn main() {
    install_fault_handler(on_fault).expect("install fault handler");

    // Undersized block: rejected before anything is registered.
    let mut tiny = [0u8; 64];
    let result =
        unsafe { install_stack_overflow_handler(on_overflow, tiny.as_mut_ptr().cast(), 64) };
    assert!(result.is_err(), "an undersized alternate stack was accepted");
    uninstall_stack_overflow_handler();
    eprintln!("rejected undersized alternate stack");

    if unsafe { recovery::jmp::sigsetjmp(ENV.get(), 1) } == 0 {
        unsafe { std::ptr::read_volatile(0x10 as *const u8) };
        unreachable!("the read did not fault");
    }
    eprintln!("generic handler still armed");
}

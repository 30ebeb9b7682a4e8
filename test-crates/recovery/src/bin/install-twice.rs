//! Installing a second generic handler replaces the first; only the
//! replacement sees the fault.

use recovery::{jump_continuation, JmpSlot};
use sigfault::handler::{install_fault_handler, leave_fault_handler, FaultDisposition};
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;

static ENV: JmpSlot = JmpSlot::new();
static FIRST_RAN: AtomicBool = AtomicBool::new(false);

fn first(_fault_address: *mut c_void, _final_attempt: bool) -> FaultDisposition {
    FIRST_RAN.store(true, SeqCst);
    FaultDisposition::Declined
}

fn second(_fault_address: *mut c_void, _final_attempt: bool) -> FaultDisposition {
    unsafe { leave_fault_handler(jump_continuation, ENV.get().cast(), null_mut(), null_mut()) }
}

fn main() {
    install_fault_handler(first).expect("install first handler");
    install_fault_handler(second).expect("install second handler");

    if unsafe { recovery::jmp::sigsetjmp(ENV.get(), 1) } == 0 {
        unsafe { std::ptr::read_volatile(0x10 as *const u8) };
        unreachable!("the read did not fault");
    }
    assert!(!FIRST_RAN.load(SeqCst), "replaced handler was still called");
    eprintln!("second handler ran");
}

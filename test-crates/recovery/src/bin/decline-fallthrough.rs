//! A handler that declines both attempts lets the fault fall through to
//! the default action.

use recovery::write_stderr;
use sigfault::handler::{install_fault_handler, FaultDisposition};
use std::ffi::c_void;

fn decline(_fault_address: *mut c_void, final_attempt: bool) -> FaultDisposition {
    if final_attempt {
        write_stderr("fault observed on final attempt, declining\n");
    } else {
        write_stderr("fault observed, declining\n");
    }
    FaultDisposition::Declined
}

fn main() {
    install_fault_handler(decline).expect("install fault handler");

    unsafe { std::ptr::read_volatile(0x10 as *const u8) };
    unreachable!("the read did not fault");
}

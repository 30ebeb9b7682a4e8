//! After uninstalling, a fault takes the default action again and kills
//! the process.

use recovery::{jump_continuation, JmpSlot};
use sigfault::handler::{
    install_fault_handler, leave_fault_handler, uninstall_fault_handler, FaultDisposition,
};
use std::ffi::c_void;
use std::ptr::null_mut;

static ENV: JmpSlot = JmpSlot::new();

fn on_fault(_fault_address: *mut c_void, _final_attempt: bool) -> FaultDisposition {
    unsafe { leave_fault_handler(jump_continuation, ENV.get().cast(), null_mut(), null_mut()) }
}

fn main() {
    install_fault_handler(on_fault).expect("install fault handler");
    uninstall_fault_handler();
    eprintln!("installed and uninstalled");

    unsafe { std::ptr::read_volatile(0x10 as *const u8) };
    unreachable!("the read did not fault");
}

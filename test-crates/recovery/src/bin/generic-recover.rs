//! Install a generic fault handler, fault on an unmapped address, and
//! escape back to `main` with a non-local jump.

use recovery::{jump_continuation, JmpSlot};
use sigfault::handler::{
    install_fault_handler, leave_fault_handler, uninstall_fault_handler, FaultDisposition,
};
use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

static ENV: JmpSlot = JmpSlot::new();
static FAULTS: AtomicUsize = AtomicUsize::new(0);

fn on_fault(_fault_address: *mut c_void, _final_attempt: bool) -> FaultDisposition {
    FAULTS.fetch_add(1, SeqCst);
    unsafe { leave_fault_handler(jump_continuation, ENV.get().cast(), null_mut(), null_mut()) }
}

fn main() {
    install_fault_handler(on_fault).expect("install fault handler");

    if unsafe { recovery::jmp::sigsetjmp(ENV.get(), 1) } == 0 {
        unsafe { std::ptr::read_volatile(0x10 as *const u8) };
        unreachable!("the read did not fault");
    }
    eprintln!("recovered from fault");
    assert_eq!(FAULTS.load(SeqCst), 1);

    uninstall_fault_handler();
    eprintln!("done");
}

//! Overflow the main stack, then fault again from inside the handler while
//! running on the alternate stack. The second invocation must report an
//! emergency, at which point aborting is the only sane response.

use recovery::{map_alt_stack, write_stderr};
use sigfault::handler::install_stack_overflow_handler;
use std::ffi::c_void;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

const ALT_STACK_SIZE: usize = 64 * 1024;

static ALT_BASE: AtomicUsize = AtomicUsize::new(0);

fn on_overflow(emergency: bool, _context: *mut c_void) -> ! {
    if emergency {
        write_stderr("handler stack exhausted, aborting\n");
        std::process::abort();
    }
    write_stderr("stack overflow\n");
    // Fault again while still on the alternate stack, near its top so the
    // nested signal frame has room: poke the guard page below the block,
    // which is where a handler that overran it would land.
    let guard = ALT_BASE.load(SeqCst) - 8;
    unsafe { std::ptr::read_volatile(guard as *const u8) };
    unreachable!("the guard-page read did not fault");
}

fn main() {
    let alt_stack = map_alt_stack(ALT_STACK_SIZE);
    ALT_BASE.store(alt_stack as usize, SeqCst);
    unsafe { install_stack_overflow_handler(on_overflow, alt_stack, ALT_STACK_SIZE) }
        .expect("install stack overflow handler");

    recovery::burn_stack(u64::MAX);
    unreachable!("the recursion did not fault");
}

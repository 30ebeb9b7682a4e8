//! Shared plumbing for the recovery test programs: `sigsetjmp` bindings for
//! non-local exits, a guarded alternate-stack allocator, and helpers that
//! are safe to call from signal context.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::os::fd::BorrowedFd;

pub mod jmp {
    //! Minimal `sigsetjmp`/`siglongjmp` bindings.
    //!
    //! Glibc's `sigsetjmp` is a macro over `__sigsetjmp`, so that is the
    //! symbol to link against there; musl exports the plain name.

    use std::ffi::c_int;

    /// A `sigjmp_buf`. Oversized and overaligned relative to any supported
    /// target's real layout.
    #[repr(C, align(16))]
    pub struct JmpBuf {
        buf: [u64; 64],
    }

    impl JmpBuf {
        pub const fn new() -> Self {
            Self { buf: [0; 64] }
        }
    }

    extern "C" {
        #[cfg_attr(target_env = "gnu", link_name = "__sigsetjmp")]
        pub fn sigsetjmp(buf: *mut JmpBuf, save_mask: c_int) -> c_int;
        pub fn siglongjmp(buf: *mut JmpBuf, value: c_int) -> !;
    }
}

/// A `static`-friendly home for a [`jmp::JmpBuf`].
///
/// The test programs are single-threaded; nothing synchronizes access.
pub struct JmpSlot(UnsafeCell<jmp::JmpBuf>);

unsafe impl Sync for JmpSlot {}

impl JmpSlot {
    pub const fn new() -> Self {
        Self(UnsafeCell::new(jmp::JmpBuf::new()))
    }

    pub fn get(&self) -> *mut jmp::JmpBuf {
        self.0.get()
    }
}

/// A `leave_fault_handler` continuation that `siglongjmp`s to the buffer
/// passed as the first argument.
///
/// # Safety
///
/// The first argument must point to a [`jmp::JmpBuf`] that a live frame has
/// armed with `sigsetjmp`.
pub unsafe extern "C" fn jump_continuation(
    env: *mut c_void,
    _arg2: *mut c_void,
    _arg3: *mut c_void,
) -> ! {
    unsafe { jmp::siglongjmp(env.cast(), 1) }
}

/// Map an alternate signal stack of `size` bytes with an inaccessible guard
/// page below it, so a handler that overruns the block faults instead of
/// trampling whatever the allocator placed next to it. Returns the usable
/// base, just above the guard.
pub fn map_alt_stack(size: usize) -> *mut c_void {
    use rustix::mm::{mmap_anonymous, mprotect, MapFlags, MprotectFlags, ProtFlags};
    use rustix::param::page_size;

    let page = page_size();
    assert_eq!(size % page, 0, "alternate stack size must be page-aligned");
    unsafe {
        let block = mmap_anonymous(
            std::ptr::null_mut(),
            size + page,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::PRIVATE,
        )
        .expect("mmap alternate stack");
        mprotect(block, page, MprotectFlags::empty()).expect("protect guard page");
        block.cast::<u8>().add(page).cast()
    }
}

/// Write directly to stderr, bypassing `std`'s locking and buffering, so
/// the fault handlers can report progress without touching anything that
/// isn't async-signal-safe.
pub fn write_stderr(message: &str) {
    let stderr = unsafe { BorrowedFd::borrow_raw(2) };
    rustix::io::write(stderr, message.as_bytes()).ok();
}

/// Recurse until the current stack runs out. The volatile traffic keeps the
/// frames from collapsing under optimization.
pub fn burn_stack(depth: u64) -> u64 {
    let mut pad = [0u8; 512];
    std::hint::black_box(&mut pad);
    unsafe { std::ptr::write_volatile(pad.as_mut_ptr(), depth as u8) };
    if depth == 0 {
        return 0;
    }
    burn_stack(depth - 1) + u64::from(unsafe { std::ptr::read_volatile(pad.as_ptr()) })
}

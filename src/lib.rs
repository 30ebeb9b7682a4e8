#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;

#[cfg_attr(target_arch = "aarch64", path = "arch/aarch64.rs")]
#[cfg_attr(target_arch = "x86_64", path = "arch/x86_64.rs")]
#[cfg_attr(target_arch = "riscv64", path = "arch/riscv64.rs")]
#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
))]
mod arch;

#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
))]
mod signal;

pub mod vma;

#[cfg(all(
    any(target_os = "linux", target_os = "android"),
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
))]
mod overflow;

#[cfg_attr(
    all(
        any(target_os = "linux", target_os = "android"),
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    ),
    path = "handler/linux_raw.rs"
)]
#[cfg_attr(
    not(all(
        any(target_os = "linux", target_os = "android"),
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    )),
    path = "handler/unsupported.rs"
)]
pub mod handler;

/// Whether this build can intercept invalid-access faults at all.
///
/// When this is `false`, [`handler::install_fault_handler`] always returns
/// [`error::Unsupported`] and faults take the default disposition.
pub const FAULT_RECOVERY_SUPPORTED: bool = handler::SUPPORTED;

/// Whether this build can classify and recover from stack overflow.
///
/// Requires fault interception plus a stack-pointer-bearing signal context
/// and at least one working [`vma::locate_vma`] backend.
pub const STACK_OVERFLOW_RECOVERY_SUPPORTED: bool = handler::SUPPORTED;

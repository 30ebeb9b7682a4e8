//! Error types.
//!
//! Both errors here are capability errors rather than transient failures:
//! retrying the same call on the same build will fail the same way.

use core::fmt;

/// The current platform offers no mechanism for the requested capability.
///
/// Returned synchronously by the install operations in [`crate::handler`];
/// never produced on the signal-dispatch path. On a nominally supported
/// target this can also mean the environment rejected the underlying
/// `sigaction`/`sigaltstack` calls (for example a seccomp policy), which is
/// indistinguishable from the capability being absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported;

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fault interception is not supported on this platform")
    }
}

impl core::error::Error for Unsupported {}

/// The mapping containing an address could not be determined.
///
/// Returned by [`crate::vma::locate_vma`] when the platform has no
/// memory-region query mechanism, or when every mechanism failed, or when
/// the address does not belong to any mapping. Callers doing stack-overflow
/// classification must treat this as "unknown", which defaults to "not a
/// stack overflow".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotAvailable;

impl fmt::Display for NotAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory mapping bounds are not available for this address")
    }
}

impl core::error::Error for NotAvailable {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_describe_themselves() {
        extern crate std;
        use std::string::ToString as _;

        assert!(Unsupported.to_string().contains("not supported"));
        assert!(NotAvailable.to_string().contains("not available"));
    }
}

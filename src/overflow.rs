//! Stack-overflow classification helpers.
//!
//! These are the pure parts of the fault-time decision "was this a stack
//! overflow?", kept separate from the signal plumbing so they can be tested
//! with synthetic values. The thresholds are empirical constants tied to
//! typical page sizes and guard-page conventions; they are inherited
//! platform folklore, not derived, and changing them is more likely to break
//! detection than improve it.

/// How close the fault address must be to the interrupted stack pointer for
/// the two to be treated as the same event (a push or probe running off the
/// end of the stack).
pub(crate) const SP_PROXIMITY_WINDOW: usize = 4096;

/// Address-vs-stack-pointer heuristic. Usable even on builds with no
/// mapping-enumeration mechanism.
#[inline]
pub(crate) fn near_stack_pointer(fault_address: usize, stack_pointer: usize) -> bool {
    fault_address.abs_diff(stack_pointer) <= SP_PROXIMITY_WINDOW
}

/// Stack-pointer-vs-rlimit heuristic: the stack's mapping has grown to its
/// configured maximum (within a page) and the stack pointer sits at the
/// mapping's low edge, with the fault landing just past it or already on the
/// alternate stack.
///
/// This can be fooled by an unrelated mapping that happens to match the
/// stack limit; that false-positive risk is an accepted trade-off and is why
/// this heuristic runs last.
pub(crate) fn matches_rlimit_shape(
    vma_start: usize,
    vma_end: usize,
    stack_limit: usize,
    stack_pointer: usize,
    page_size: usize,
    alt_stack: Option<(usize, usize)>,
) -> bool {
    let size = vma_end.saturating_sub(vma_start);
    if size.abs_diff(stack_limit) > page_size {
        return false;
    }
    let near_low_edge = stack_pointer.abs_diff(vma_start) <= page_size;
    let on_alt = alt_stack
        .is_some_and(|(base, len)| on_alternate_stack(stack_pointer, base, len));
    near_low_edge || on_alt
}

/// Whether `stack_pointer` lies inside the registered alternate-stack block.
/// A fault arriving in this state means the handler itself overflowed.
#[inline]
pub(crate) fn on_alternate_stack(stack_pointer: usize, base: usize, len: usize) -> bool {
    base != 0 && stack_pointer >= base && stack_pointer < base.saturating_add(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 0x1000;

    #[test]
    fn sp_proximity_window() {
        assert!(near_stack_pointer(0x7000_0000, 0x7000_0000));
        assert!(near_stack_pointer(0x7000_0000, 0x7000_0000 + SP_PROXIMITY_WINDOW));
        assert!(near_stack_pointer(0x7000_0000 + SP_PROXIMITY_WINDOW, 0x7000_0000));
        assert!(!near_stack_pointer(
            0x7000_0000,
            0x7000_0000 + SP_PROXIMITY_WINDOW + 1
        ));
        // Must not wrap near the ends of the address space.
        assert!(!near_stack_pointer(usize::MAX, 0));
    }

    #[test]
    fn rlimit_shape_requires_matching_size() {
        let (start, end) = (0x7f0000000000, 0x7f0000800000); // 8 MiB
        let sp = start + 0x10;
        assert!(matches_rlimit_shape(start, end, 0x800000, sp, PAGE, None));
        assert!(!matches_rlimit_shape(start, end, 0x400000, sp, PAGE, None));
    }

    #[test]
    fn rlimit_shape_requires_sp_at_low_edge() {
        let (start, end) = (0x7f0000000000, 0x7f0000800000);
        assert!(!matches_rlimit_shape(
            start,
            end,
            0x800000,
            start + 2 * PAGE,
            PAGE,
            None
        ));
        // Just below the edge also counts (the push that faulted).
        assert!(matches_rlimit_shape(
            start,
            end,
            0x800000,
            start - 0x20,
            PAGE,
            None
        ));
    }

    #[test]
    fn rlimit_shape_accepts_sp_on_alternate_stack() {
        let (start, end) = (0x7f0000000000, 0x7f0000800000);
        let alt = Some((0x5000_0000, 0x10000));
        // SP already moved to the alternate stack (double fault): still a
        // plausible overflow even though it's nowhere near the mapping edge.
        assert!(matches_rlimit_shape(
            start,
            end,
            0x800000,
            0x5000_0800,
            PAGE,
            alt
        ));
        // SP in the middle of the stack mapping: not an overflow shape.
        assert!(!matches_rlimit_shape(
            start,
            end,
            0x800000,
            start + 0x100000,
            PAGE,
            alt
        ));
    }

    #[test]
    fn alternate_stack_containment() {
        assert!(on_alternate_stack(0x5000_0800, 0x5000_0000, 0x10000));
        assert!(!on_alternate_stack(0x5001_0000, 0x5000_0000, 0x10000));
        assert!(!on_alternate_stack(0x4fff_fff8, 0x5000_0000, 0x10000));
        // An unregistered (zero) base never matches.
        assert!(!on_alternate_stack(0x100, 0, 0x10000));
    }
}

//! Virtual-memory-area location.
//!
//! [`locate_vma`] maps an address to the bounds of the memory mapping
//! containing it, with enough information about the adjacent unmapped gap to
//! judge whether a nearby address "belongs" to the mapping. The fault
//! handler uses it to tell a stack overflow from a wild pointer, but it is
//! usable standalone.
//!
//! Descriptors are constructed fresh on every query and never cached; a
//! stack's mapping in particular grows between queries.

use crate::error::NotAvailable;

#[cfg_attr(
    any(target_os = "linux", target_os = "android"),
    path = "vma/linux_maps.rs"
)]
#[cfg_attr(
    not(any(target_os = "linux", target_os = "android")),
    path = "vma/unsupported.rs"
)]
mod backend;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod probe;

/// Every architecture this crate supports grows its stacks downward, toward
/// lower addresses, so the interesting gap is the one below `start`.
pub(crate) const STACK_GROWS_DOWNWARD: bool = true;

/// Bounds of one contiguous mapped region, plus the observed edges of its
/// unmapped neighborhood.
///
/// `prev_end` and `next_start` are the end of the preceding mapping and the
/// start of the following one; `0` means "unknown or no neighbor observed".
/// They are only used to estimate gap sizes, never dereferenced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vma {
    /// Page-aligned inclusive lower bound of the mapping.
    pub start: usize,
    /// Page-aligned exclusive upper bound of the mapping.
    pub end: usize,
    /// End of the preceding mapping, or 0.
    pub prev_end: usize,
    /// Start of the following mapping, or 0.
    pub next_start: usize,
}

impl Vma {
    /// Whether `address` lies inside the mapping itself.
    #[inline]
    pub fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end
    }

    /// Whether `address` lies in the unmapped gap adjoining the mapping's
    /// growth edge, close enough to the edge to plausibly belong to it.
    ///
    /// "Close enough" is the half-gap rule: the address must be nearer to
    /// this mapping's edge than to the far side of the gap. The rule is
    /// guard-page folklore shared with the fault-time classification; see
    /// [`crate::overflow`].
    #[inline]
    pub fn is_near_gap(&self, address: usize) -> bool {
        if STACK_GROWS_DOWNWARD {
            near_gap_below(address, self.start, self.prev_end)
        } else {
            near_gap_above(address, self.end, self.next_start)
        }
    }
}

/// Half-gap test below a mapping that grows downward.
///
/// With an unknown `prev_end` the gap is taken to reach address 0, which
/// makes the test generous; the caller's other heuristics temper that.
pub(crate) fn near_gap_below(address: usize, start: usize, prev_end: usize) -> bool {
    if address >= start {
        return false;
    }
    let gap = start.saturating_sub(prev_end);
    start - address <= gap / 2
}

/// Half-gap test above a mapping that grows upward.
pub(crate) fn near_gap_above(address: usize, end: usize, next_start: usize) -> bool {
    if address < end {
        return false;
    }
    let gap = if next_start == 0 {
        usize::MAX - end
    } else {
        next_start.saturating_sub(end)
    };
    address - end <= gap / 2
}

/// Report the bounds of the memory mapping containing `address`.
///
/// The query allocates nothing on the heap; any scratch space it needs comes
/// from a transient anonymous mapping, so it is safe to call while handling
/// a fault on an exhausted stack.
///
/// Fails with [`NotAvailable`] when the platform provides no mapping-query
/// mechanism, when every mechanism fails, or when `address` is not mapped
/// at all.
pub fn locate_vma(address: usize) -> Result<Vma, NotAvailable> {
    backend::locate(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two synthetic mappings with a 0x8000 gap between them:
    // [0x1000, 0x5000) then [0xd000, 0x20000).
    const LOWER_END: usize = 0x5000;
    const UPPER_START: usize = 0xd000;

    fn stack_like() -> Vma {
        Vma {
            start: UPPER_START,
            end: 0x20000,
            prev_end: LOWER_END,
            next_start: 0,
        }
    }

    #[test]
    fn containment() {
        let vma = stack_like();
        assert!(vma.contains(UPPER_START));
        assert!(vma.contains(0x1ffff));
        assert!(!vma.contains(0x20000));
        assert!(!vma.contains(UPPER_START - 1));
    }

    #[test]
    fn near_gap_is_monotone_in_edge_distance() {
        // Gap size 0x8000, so the near side is within 0x4000 of the edge.
        let vma = stack_like();
        assert!(vma.is_near_gap(UPPER_START - 1));
        assert!(vma.is_near_gap(UPPER_START - 0x3fff));
        assert!(vma.is_near_gap(UPPER_START - 0x4000));
        assert!(!vma.is_near_gap(UPPER_START - 0x4001));
        assert!(!vma.is_near_gap(LOWER_END - 1));
        // Inside the mapping is not "near the gap".
        assert!(!vma.is_near_gap(UPPER_START));
    }

    #[test]
    fn near_gap_above_mirrors_below() {
        assert!(near_gap_above(LOWER_END, LOWER_END, UPPER_START));
        assert!(near_gap_above(LOWER_END + 0x4000, LOWER_END, UPPER_START));
        assert!(!near_gap_above(LOWER_END + 0x4001, LOWER_END, UPPER_START));
        assert!(!near_gap_above(LOWER_END - 1, LOWER_END, UPPER_START));
    }

    #[test]
    fn unknown_neighbors_clamp_rather_than_wrap() {
        // No previous mapping recorded: the gap is taken to reach zero.
        assert!(near_gap_below(0x800, 0x1000, 0));
        assert!(!near_gap_below(0x7ff, 0x1000, 0));
        // With no far edge the gap is clamped at the top of the address
        // space: 0x1000 here, so the near side is the 0x800 nearest the
        // mapping. The arithmetic must not overflow either way.
        assert!(near_gap_above(usize::MAX - 0x800, usize::MAX - 0x1000, 0));
        assert!(!near_gap_above(usize::MAX, usize::MAX - 0x1000, 0));
    }
}

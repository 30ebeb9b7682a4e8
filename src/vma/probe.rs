//! Probe-based fallback backend.
//!
//! When the mapping listing can't be read, the kernel can still be asked
//! page by page: `msync(MS_ASYNC)` on an unmapped page fails with `ENOMEM`
//! and is otherwise a no-op. The bounds of the mapped region around the
//! address are found with a doubling search followed by bisection, so the
//! cost is logarithmic in the region size rather than a linear page walk.
//!
//! Two approximations are inherent and accepted: touching mappings are
//! reported as one region (a probe can't see the seam), and a doubling step
//! can jump clear over a small gap, which may overstate the region. Both
//! err toward a larger stack region, and the fault-time heuristics that
//! consume these bounds are explicitly approximate.

use super::Vma;
use crate::error::NotAvailable;
use rustix::mm::{msync, MsyncFlags};
use rustix::param::page_size;

pub(super) fn locate(address: usize) -> Result<Vma, NotAvailable> {
    let page_size = page_size();
    let probe = |page: usize| is_mapped(page, page_size);

    let page = address & !(page_size - 1);
    if !probe(page) {
        return Err(NotAvailable);
    }

    let (start, prev_end) = lower_bounds(page, page_size, &probe);
    let (end, next_start) = upper_bounds(page, page_size, &probe);
    Ok(Vma {
        start,
        end,
        prev_end,
        next_start,
    })
}

fn is_mapped(page: usize, page_size: usize) -> bool {
    unsafe { msync(page as *mut _, page_size, MsyncFlags::ASYNC) }.is_ok()
}

/// Find the start of the mapped region containing `page` (a mapped,
/// page-aligned address), and an estimate of the preceding mapping's end.
fn lower_bounds(page: usize, page_size: usize, mapped: &impl Fn(usize) -> bool) -> (usize, usize) {
    // Doubling search for the first unmapped page below.
    let mut lo = 0usize; // offset in pages, known mapped
    let mut unmapped = None;
    let mut off = 1usize;
    loop {
        let Some(candidate) = offset_below(page, off, page_size) else {
            break;
        };
        if mapped(candidate) {
            lo = off;
            off = off.saturating_mul(2);
        } else {
            unmapped = Some(off);
            break;
        }
    }
    let Some(mut hi) = unmapped else {
        // Mapped (as far as probing can tell) all the way down.
        return (0, 0);
    };

    // Bisect for the boundary.
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        match offset_below(page, mid, page_size) {
            Some(candidate) if mapped(candidate) => lo = mid,
            _ => hi = mid,
        }
    }
    let start = page - lo * page_size;

    // The gap's far edge: first mapped page below `start`, if any.
    let prev_end = match first_mapped_below(start, page_size, mapped) {
        Some(nearest_mapped) => nearest_mapped + page_size,
        None => 0,
    };
    (start, prev_end)
}

/// Find the end of the mapped region containing `page`, and an estimate of
/// the following mapping's start.
fn upper_bounds(page: usize, page_size: usize, mapped: &impl Fn(usize) -> bool) -> (usize, usize) {
    let mut lo = 0usize; // offset in pages, known mapped
    let mut unmapped = None;
    let mut off = 1usize;
    loop {
        let Some(candidate) = offset_above(page, off, page_size) else {
            break;
        };
        if mapped(candidate) {
            lo = off;
            off = off.saturating_mul(2);
        } else {
            unmapped = Some(off);
            break;
        }
    }
    let Some(mut hi) = unmapped else {
        // Mapped (as far as probing can tell) all the way up; clamp.
        return (usize::MAX, 0);
    };

    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        match offset_above(page, mid, page_size) {
            Some(candidate) if mapped(candidate) => lo = mid,
            _ => hi = mid,
        }
    }
    let end = page + (lo + 1) * page_size;

    let next_start = first_mapped_above(end, page_size, mapped).unwrap_or(0);
    (end, next_start)
}

/// Doubling-then-bisect search for the mapped page nearest below `limit`
/// (exclusive). Returns its page address.
fn first_mapped_below(
    limit: usize,
    page_size: usize,
    mapped: &impl Fn(usize) -> bool,
) -> Option<usize> {
    let mut found = None;
    let mut off = 1usize;
    loop {
        let Some(candidate) = offset_below(limit, off, page_size) else {
            break;
        };
        if mapped(candidate) {
            found = Some(off);
            break;
        }
        off = off.saturating_mul(2);
    }
    let hi = found?; // mapped offset
    let mut lo = 1usize; // known unmapped (it's the adjoining gap)
    let mut hi = hi;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        match offset_below(limit, mid, page_size) {
            Some(candidate) if mapped(candidate) => hi = mid,
            _ => lo = mid,
        }
    }
    offset_below(limit, hi, page_size)
}

/// Mirror image of [`first_mapped_below`], searching above `from`
/// (inclusive).
fn first_mapped_above(
    from: usize,
    page_size: usize,
    mapped: &impl Fn(usize) -> bool,
) -> Option<usize> {
    let mut found = None;
    let mut off = 0usize;
    loop {
        let candidate = from.checked_add(off.checked_mul(page_size)?)?;
        if candidate > usize::MAX - page_size + 1 {
            break;
        }
        if mapped(candidate) {
            found = Some(off);
            break;
        }
        off = if off == 0 { 1 } else { off.saturating_mul(2) };
    }
    let hi = found?;
    if hi <= 1 {
        return from.checked_add(hi * page_size);
    }
    let mut lo = 0usize; // known unmapped (`from` itself is past the region)
    let mut hi = hi;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        match from.checked_add(mid * page_size) {
            Some(candidate) if mapped(candidate) => hi = mid,
            _ => lo = mid,
        }
    }
    from.checked_add(hi * page_size)
}

fn offset_below(base: usize, pages: usize, page_size: usize) -> Option<usize> {
    base.checked_sub(pages.checked_mul(page_size)?)
}

fn offset_above(base: usize, pages: usize, page_size: usize) -> Option<usize> {
    base.checked_add(pages.checked_mul(page_size)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 0x1000;

    // Synthetic layout: [0x10000, 0x18000) and [0x20000, 0x24000) mapped,
    // everything else unmapped.
    fn layout(page: usize) -> bool {
        (0x10000..0x18000).contains(&page) || (0x20000..0x24000).contains(&page)
    }

    #[test]
    fn bounds_of_lower_region() {
        let (start, prev_end) = lower_bounds(0x14000, PAGE, &layout);
        assert_eq!(start, 0x10000);
        assert_eq!(prev_end, 0);
        let (end, next_start) = upper_bounds(0x14000, PAGE, &layout);
        assert_eq!(end, 0x18000);
        assert_eq!(next_start, 0x20000);
    }

    #[test]
    fn bounds_of_upper_region() {
        let (start, prev_end) = lower_bounds(0x21000, PAGE, &layout);
        assert_eq!(start, 0x20000);
        assert_eq!(prev_end, 0x18000);
        let (end, next_start) = upper_bounds(0x21000, PAGE, &layout);
        assert_eq!(end, 0x24000);
        assert_eq!(next_start, 0);
    }

    #[test]
    fn single_page_region() {
        let only = |page: usize| page == 0x40000;
        let (start, prev_end) = lower_bounds(0x40000, PAGE, &only);
        assert_eq!((start, prev_end), (0x40000, 0));
        let (end, next_start) = upper_bounds(0x40000, PAGE, &only);
        assert_eq!((end, next_start), (0x41000, 0));
    }
}

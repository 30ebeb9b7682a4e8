//! `/proc/self/maps` backend.
//!
//! The listing is read in full before parsing, through a scratch buffer
//! carved out of a transient anonymous mapping. Reading it incrementally
//! into a heap buffer would be wrong twice over: the heap may be what
//! faulted, and a listing read across multiple buffer growths can tear when
//! other threads change the address space between reads. When the listing
//! doesn't fit, the buffer is remapped larger and the file re-read from the
//! start so the parse always sees one consistent snapshot.

use super::{probe, Vma};
use crate::error::NotAvailable;
use core::ffi::c_void;
use core::ptr::null_mut;
use core::slice;
use rustix::fs::{open, Mode, OFlags};
use rustix::io::{read, Errno};
use rustix::mm::{mmap_anonymous, munmap, MapFlags, ProtFlags};

const INITIAL_BUFFER_SIZE: usize = 256 * 1024;
const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

enum MapsError {
    /// The listing was read and parsed but no record contains the address.
    NotMapped,
    /// The listing could not be obtained at all.
    Unreadable,
}

pub(super) fn locate(address: usize) -> Result<Vma, NotAvailable> {
    match locate_from_maps(address) {
        Ok(vma) => Ok(vma),
        // A successful parse that found nothing is authoritative.
        Err(MapsError::NotMapped) => Err(NotAvailable),
        // Procfs may be unmounted or hidden; ask the kernel directly.
        Err(MapsError::Unreadable) => probe::locate(address),
    }
}

/// Scratch memory obtained from `mmap` rather than the heap.
struct Scratch {
    ptr: *mut c_void,
    len: usize,
}

impl Scratch {
    fn new(len: usize) -> Result<Self, MapsError> {
        let ptr = unsafe {
            mmap_anonymous(
                null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )
        }
        .map_err(|_| MapsError::Unreadable)?;
        Ok(Self { ptr, len })
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.cast::<u8>(), self.len) }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        unsafe {
            munmap(self.ptr, self.len).ok();
        }
    }
}

fn locate_from_maps(address: usize) -> Result<Vma, MapsError> {
    let mut size = INITIAL_BUFFER_SIZE;
    loop {
        let mut scratch = Scratch::new(size)?;
        let buf = scratch.as_mut_slice();
        match read_whole_listing(buf)? {
            Some(filled) => {
                return find_record(&buf[..filled], address).ok_or(MapsError::NotMapped);
            }
            None => {
                // Didn't fit; start over with a bigger snapshot buffer.
                if size >= MAX_BUFFER_SIZE {
                    return Err(MapsError::Unreadable);
                }
                size *= 2;
            }
        }
    }
}

/// Read all of `/proc/self/maps` into `buf`. Returns the filled length, or
/// `None` if the listing is larger than `buf`.
fn read_whole_listing(buf: &mut [u8]) -> Result<Option<usize>, MapsError> {
    let fd = open(
        c"/proc/self/maps",
        OFlags::RDONLY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|_| MapsError::Unreadable)?;

    let mut filled = 0;
    loop {
        if filled == buf.len() {
            return Ok(None);
        }
        match read(&fd, &mut buf[filled..]) {
            Ok(0) => return Ok(Some(filled)),
            Ok(n) => filled += n,
            Err(Errno::INTR) => continue,
            Err(_) => return Err(MapsError::Unreadable),
        }
    }
}

/// Scan the listing for the record containing `address`, remembering the
/// neighboring record boundaries for gap estimation.
fn find_record(data: &[u8], address: usize) -> Option<Vma> {
    let mut prev_end = 0;
    let mut lines = data.split(|&b| b == b'\n');
    while let Some(line) = lines.next() {
        let Some((start, end)) = parse_range(line) else {
            continue;
        };
        if address >= start && address < end {
            let next_start = lines
                .next()
                .and_then(|next| parse_range(next))
                .map_or(0, |(next_start, _)| next_start);
            return Some(Vma {
                start,
                end,
                prev_end,
                next_start,
            });
        }
        prev_end = end;
    }
    None
}

/// Parse the leading `START-END` range of one maps record.
fn parse_range(line: &[u8]) -> Option<(usize, usize)> {
    let dash = line.iter().position(|&b| b == b'-')?;
    let start = parse_hex(&line[..dash])?;
    let rest = &line[dash + 1..];
    let space = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
    let end = parse_hex(&rest[..space])?;
    if start <= end { Some((start, end)) } else { None }
}

fn parse_hex(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() {
        return None;
    }
    let mut value: usize = 0;
    for &b in digits {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return None,
        };
        value = value.checked_mul(16)?.checked_add(usize::from(digit))?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &[u8] = b"\
00400000-00452000 r-xp 00000000 08:02 173521 /usr/bin/dbus-daemon\n\
00651000-00652000 r--p 00051000 08:02 173521 /usr/bin/dbus-daemon\n\
00652000-00655000 rw-p 00052000 08:02 173521 /usr/bin/dbus-daemon\n\
00e03000-00e24000 rw-p 00000000 00:00 0 [heap]\n\
7fffb9d48000-7fffb9d69000 rw-p 00000000 00:00 0 [stack]\n\
7fffb9dff000-7fffb9e00000 r-xp 00000000 00:00 0 [vdso]\n";

    #[test]
    fn finds_containing_record_with_neighbors() {
        let vma = find_record(LISTING, 0x00652abc).unwrap();
        assert_eq!(vma.start, 0x00652000);
        assert_eq!(vma.end, 0x00655000);
        assert_eq!(vma.prev_end, 0x00652000);
        assert_eq!(vma.next_start, 0x00e03000);
    }

    #[test]
    fn first_record_has_no_previous_neighbor() {
        let vma = find_record(LISTING, 0x00400000).unwrap();
        assert_eq!(vma.prev_end, 0);
        assert_eq!(vma.next_start, 0x00651000);
    }

    #[test]
    fn last_record_has_no_next_neighbor() {
        let vma = find_record(LISTING, 0x7fffb9dff123).unwrap();
        assert_eq!(vma.next_start, 0);
    }

    #[test]
    fn unmapped_addresses_are_not_found() {
        assert!(find_record(LISTING, 0x00655000).is_none());
        assert!(find_record(LISTING, 0x1).is_none());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let listing = b"garbage\n00400000-00401000 r-xp 0 0:0 0\n";
        let vma = find_record(listing, 0x00400800).unwrap();
        assert_eq!(vma.start, 0x00400000);
        assert!(find_record(b"00400000\n", 0x00400000).is_none());
    }

    #[test]
    fn hex_parsing_rejects_overflow_and_junk() {
        assert_eq!(parse_hex(b"ff"), Some(0xff));
        assert_eq!(parse_hex(b""), None);
        assert_eq!(parse_hex(b"xyz"), None);
        assert_eq!(parse_hex(b"ffffffffffffffffff"), None);
    }
}

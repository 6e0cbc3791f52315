//! Bump allocator backing every runtime allocation.
//!
//! Memory is carved off large anonymous mappings obtained from the OS
//! and is never freed or reused: the allocator is strictly monotonic for
//! the lifetime of the process, and anonymous private mappings come back
//! zero-filled, so every returned block is zeroed without any explicit
//! clearing.
//!
//! One logical mutator allocates at a time, so the state below carries
//! no lock. The only reentrancy this code must survive is the allocator
//! being invoked again from the stack-growth trap while a call is
//! already in flight; see [`allocate`].

use std::cell::UnsafeCell;
use std::ptr;

use log::debug;

/// Size of an arena chunk. Requests larger than this bypass the arena
/// and get a dedicated mapping.
pub const CHUNK_SIZE: u32 = 20 << 20;

/// Largest modulus honored by [`round_up`].
pub const MAX_ROUND: u32 = 8;

/// Per-mutator allocation state: the current chunk and the cumulative
/// counters. Initialized empty; the first allocation maps the first
/// chunk.
struct MutatorMem {
    /// Cursor into the current chunk.
    hunk: *mut u8,
    /// Bytes remaining in the current chunk.
    nhunk: u32,
    /// Total bytes obtained from the OS.
    mapped: u64,
    /// Total bytes handed out.
    allocated: u64,
}

struct MemCell(UnsafeCell<MutatorMem>);

// SAFETY: single-mutator model: one execution context allocates at a
// time (see crate docs), so the cell is never touched concurrently.
unsafe impl Sync for MemCell {}

static MEM: MemCell = MemCell(UnsafeCell::new(MutatorMem {
    hunk: ptr::null_mut(),
    nhunk: 0,
    mapped: 0,
    allocated: 0,
}));

/// Cumulative allocation counters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemStats {
    /// Total bytes obtained from the OS, chunks and large objects both.
    pub mapped: u64,
    /// Total bytes handed out to callers.
    pub allocated: u64,
}

/// Anonymous private mapping, zero-filled by the OS. Throws on
/// exhaustion; there is no recoverable out-of-memory at this layer.
unsafe fn os_map(len: usize) -> *mut u8 {
    let v = libc::mmap(
        ptr::null_mut(),
        len,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
    );
    if v == libc::MAP_FAILED {
        crate::fatal::throw("out of memory");
    }
    v as *mut u8
}

/// Round `n` up to a multiple of `m`, with `m` clamped to [`MAX_ROUND`].
/// `m` must be nonzero.
pub fn round_up(n: u32, m: u32) -> u32 {
    let m = m.min(MAX_ROUND);
    let r = n % m;
    if r != 0 {
        n + (m - r)
    } else {
        n
    }
}

/// Allocate `n` bytes: zero-filled, 8-byte aligned, never freed.
///
/// This allocator also serves stack growth, so any function call made
/// from here can in principle re-enter `allocate`. The chunk swap below
/// therefore calls the mapping primitive directly and performs no other
/// calls while `hunk`/`nhunk` are stale: a reentrant call in that window
/// would install its own chunk and the stores here would overwrite it.
/// Worst case is an orphaned chunk, never corrupt bookkeeping.
///
/// # Safety
/// Must only be called from the mutator that owns the runtime (the
/// single-mutator contract in the crate docs).
pub unsafe fn allocate(n: u32) -> *mut u8 {
    // Keep everything 64-bit aligned.
    let n = round_up(n, 8);
    let mem = MEM.0.get();

    if n > CHUNK_SIZE {
        // Large objects get a dedicated mapping and never touch the
        // shared chunk cursor.
        let v = os_map(n as usize);
        (*mem).mapped += n as u64;
        (*mem).allocated += n as u64;
        return v;
    }

    if n > (*mem).nhunk {
        let v = os_map(CHUNK_SIZE as usize);
        (*mem).hunk = v;
        (*mem).nhunk = CHUNK_SIZE;
        (*mem).mapped += CHUNK_SIZE as u64;
        debug!("mapped new {} MiB arena chunk", CHUNK_SIZE >> 20);
    }

    let v = (*mem).hunk;
    (*mem).hunk = v.add(n as usize);
    (*mem).nhunk -= n;
    (*mem).allocated += n as u64;
    v
}

/// C-ABI entry for [`allocate`].
///
/// # Safety
/// See [`allocate`].
#[no_mangle]
pub unsafe extern "C" fn vesper_alloc(n: u32) -> *mut u8 {
    allocate(n)
}

/// C-ABI entry for [`round_up`].
#[no_mangle]
pub extern "C" fn vesper_round_up(n: u32, m: u32) -> u32 {
    round_up(n, m)
}

/// Snapshot of the cumulative allocation counters.
#[no_mangle]
pub extern "C" fn vesper_mem_stats() -> MemStats {
    unsafe {
        let mem = MEM.0.get();
        MemStats {
            mapped: (*mem).mapped,
            allocated: (*mem).allocated,
        }
    }
}

/// Copy `n` bytes from `src` to `dst`.
///
/// # Safety
/// Both ranges must be valid for `n` bytes and must not overlap.
#[no_mangle]
pub unsafe extern "C" fn vesper_memcpy(dst: *mut u8, src: *const u8, n: u32) {
    ptr::copy_nonoverlapping(src, dst, n as usize);
}

/// Copy `n` bytes from `src` to `dst`; the ranges may overlap.
///
/// # Safety
/// Both ranges must be valid for `n` bytes.
#[no_mangle]
pub unsafe extern "C" fn vesper_memmove(dst: *mut u8, src: *const u8, n: u32) {
    ptr::copy(src, dst, n as usize);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 8), 0);
        assert_eq!(round_up(1, 8), 8);
        assert_eq!(round_up(8, 8), 8);
        assert_eq!(round_up(13, 8), 16);
        assert_eq!(round_up(5, 1), 5);
        assert_eq!(round_up(6, 4), 8);
        // Modulus is clamped to MAX_ROUND, so rounding to 16 still
        // rounds to 8.
        assert_eq!(round_up(10, 16), 16);
        assert_eq!(round_up(16, 64), 16);
    }

    #[test]
    fn test_alloc_aligned_and_zeroed() {
        let _mutator = test_support::PROCESS_STATE.lock();
        unsafe {
            let p = allocate(13);
            assert!(!p.is_null());
            assert_eq!(p as usize % 8, 0);
            for i in 0..13 {
                assert_eq!(*p.add(i), 0);
            }
        }
    }

    #[test]
    fn test_alloc_ranges_never_overlap() {
        let _mutator = test_support::PROCESS_STATE.lock();
        unsafe {
            let a = allocate(16) as usize;
            let b = allocate(16) as usize;
            let c = allocate(24) as usize;
            assert!(b >= a + 16 || a >= b + 16);
            assert!(c >= b + 16 || b >= c + 24);
            assert!(c >= a + 16 || a >= c + 24);
        }
    }

    #[test]
    fn test_alloc_counts_every_byte() {
        let _mutator = test_support::PROCESS_STATE.lock();
        unsafe {
            let before = vesper_mem_stats();
            allocate(24);
            allocate(3); // rounds to 8
            let after = vesper_mem_stats();
            assert_eq!(after.allocated - before.allocated, 32);
        }
    }

    #[test]
    fn test_chunk_sized_request_maps_one_chunk() {
        let _mutator = test_support::PROCESS_STATE.lock();
        unsafe {
            let before = vesper_mem_stats();
            let p = allocate(CHUNK_SIZE);
            let after = vesper_mem_stats();
            // Exactly one fresh chunk, fully consumed by the request.
            assert_eq!(after.mapped - before.mapped, CHUNK_SIZE as u64);
            assert_eq!(after.allocated - before.allocated, CHUNK_SIZE as u64);
            assert_eq!(p as usize % 8, 0);
        }
    }

    #[test]
    fn test_large_request_bypasses_the_chunk() {
        let _mutator = test_support::PROCESS_STATE.lock();
        unsafe {
            // Anchor the chunk cursor with a small allocation.
            let anchor = allocate(8);

            let n = CHUNK_SIZE + 1;
            let rounded = round_up(n, 8) as u64;
            let before = vesper_mem_stats();
            let p = allocate(n);
            let after = vesper_mem_stats();

            assert_eq!(after.mapped - before.mapped, rounded);
            assert_eq!(after.allocated - before.allocated, rounded);
            assert_eq!(p as usize % 8, 0);
            assert_eq!(*p, 0);
            assert_eq!(*p.add(n as usize - 1), 0);

            // The chunk cursor was untouched: the next small allocation
            // continues right after the anchor.
            let next = allocate(8);
            assert_eq!(next as usize, anchor as usize + 8);
        }
    }

    #[test]
    fn test_memcpy_and_memmove() {
        let mut src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut dst = [0u8; 8];
        unsafe {
            vesper_memcpy(dst.as_mut_ptr(), src.as_ptr(), 8);
            assert_eq!(dst, src);

            // Overlapping shift by two, forward.
            vesper_memmove(src.as_mut_ptr().add(2), src.as_ptr(), 6);
            assert_eq!(src, [1, 2, 1, 2, 3, 4, 5, 6]);
        }
    }
}

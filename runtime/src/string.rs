//! Runtime string values.
//!
//! A string is one bump allocation: a fixed header holding the byte
//! length, followed immediately by the content bytes. Strings are
//! immutable once built, so a string value is just a header pointer and
//! copying one shares the buffer (see the string algorithms in
//! [`crate::alg`]). Nothing outside [`alloc`] and [`bytes`] computes the
//! header/content layout.

use std::ptr;
use std::slice;

use crate::mem;

/// String header; `len` content bytes start directly after it.
#[repr(C)]
pub struct StrHeader {
    pub len: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<StrHeader>();

static EMPTY: StrHeader = StrHeader { len: 0 };

/// The canonical empty string. Out-of-range argument and environment
/// lookups resolve to this, by design.
pub fn empty() -> *const StrHeader {
    &EMPTY
}

/// Build a runtime string holding a copy of `bytes`. The allocation is
/// never freed, like every other runtime allocation.
pub fn alloc(bytes: &[u8]) -> *const StrHeader {
    let len = bytes.len() as u32;
    let total = match (HEADER_SIZE as u32).checked_add(len) {
        Some(t) => t,
        None => crate::fatal::throw("string too large"),
    };
    unsafe {
        let h = mem::allocate(total) as *mut StrHeader;
        (*h).len = len;
        let data = (h as *mut u8).add(HEADER_SIZE);
        ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len());
        h
    }
}

/// Content bytes of a string. The `'static` lifetime is honest: string
/// memory is never reclaimed before process exit.
///
/// # Safety
/// `s` must come from [`alloc`] or be [`empty`].
pub unsafe fn bytes(s: *const StrHeader) -> &'static [u8] {
    let len = (*s).len as usize;
    let data = (s as *const u8).add(HEADER_SIZE);
    slice::from_raw_parts(data, len)
}

/// Build a runtime string from raw parts; null `data` yields the empty
/// string.
///
/// # Safety
/// `data`, when non-null, must be valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn vesper_string_new(data: *const u8, len: u32) -> *const StrHeader {
    if data.is_null() || len == 0 {
        return empty();
    }
    alloc(slice::from_raw_parts(data, len as usize))
}

/// Byte length of a string; null reads as empty.
#[no_mangle]
pub unsafe extern "C" fn vesper_string_len(s: *const StrHeader) -> u32 {
    if s.is_null() {
        return 0;
    }
    (*s).len
}

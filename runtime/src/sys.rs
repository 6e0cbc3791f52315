//! Process arguments and environment.
//!
//! The host calls [`vesper_args_init`] once at startup with the raw
//! argv-style vector: `argc` NUL-terminated arguments, a null entry,
//! then `KEY=VALUE` environment entries up to a second null entry. The
//! runtime records the vector and answers lookups against it; the
//! environment is never mutated.
//!
//! Out-of-range indices degrade to the empty string and missing keys to
//! null; neither is an error at this layer.
//!
//! The diagnostic print helpers at the bottom write raw scalars and
//! strings to stderr; they back the type-algorithm `print` path and the
//! panic messages, nothing else.

use std::slice;

use log::debug;
use parking_lot::RwLock;

use crate::string::{self, StrHeader};

struct ProcTable {
    argc: u32,
    argv: *const *const u8,
    envc: u32,
    envv: *const *const u8,
}

// SAFETY: the table only holds pointers into the host-provided startup
// vector, which outlives the process's useful life and is never written
// through.
unsafe impl Send for ProcTable {}
unsafe impl Sync for ProcTable {}

static PROC: RwLock<Option<ProcTable>> = RwLock::new(None);

/// Byte length of a NUL-terminated C string.
pub(crate) unsafe fn cstr_len(p: *const u8) -> usize {
    let mut n = 0;
    while *p.add(n) != 0 {
        n += 1;
    }
    n
}

/// Decimal prefix of `bytes` as an integer; parsing stops at the first
/// non-digit byte.
pub fn atoi(bytes: &[u8]) -> i32 {
    let mut n: i32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            break;
        }
        n = n.wrapping_mul(10).wrapping_add((b - b'0') as i32);
    }
    n
}

/// Record the process argument/environment vector. Called once at
/// startup; a second call replaces the first.
///
/// # Safety
/// `argv` must point to `argc` NUL-terminated strings, a null entry,
/// the `KEY=VALUE` environment entries, and a terminating null entry,
/// all alive for the rest of the process.
#[no_mangle]
pub unsafe extern "C" fn vesper_args_init(argc: i32, argv: *const *const u8) {
    // Skip the null entry terminating argv.
    let envv = argv.add(argc as usize + 1);
    let mut envc: u32 = 0;
    while !(*envv.add(envc as usize)).is_null() {
        envc += 1;
    }

    let mut table = PROC.write();
    if table.is_some() {
        log::warn!("process vector recorded more than once; replacing");
    }
    debug!("recorded {} arguments, {} environment entries", argc, envc);
    *table = Some(ProcTable {
        argc: argc as u32,
        argv,
        envc,
        envv,
    });
}

/// Number of process arguments.
#[no_mangle]
pub extern "C" fn vesper_arg_count() -> u32 {
    PROC.read().as_ref().map_or(0, |t| t.argc)
}

/// Number of environment entries.
#[no_mangle]
pub extern "C" fn vesper_env_count() -> u32 {
    PROC.read().as_ref().map_or(0, |t| t.envc)
}

/// Argument `i` as a runtime string; the empty string when out of range.
#[no_mangle]
pub extern "C" fn vesper_arg(i: u32) -> *const StrHeader {
    let table = PROC.read();
    let t = match table.as_ref() {
        Some(t) if i < t.argc => t,
        _ => return string::empty(),
    };
    unsafe {
        let p = *t.argv.add(i as usize);
        string::alloc(slice::from_raw_parts(p, cstr_len(p)))
    }
}

/// Environment entry `i` (the full `KEY=VALUE` form) as a runtime
/// string; the empty string when out of range.
#[no_mangle]
pub extern "C" fn vesper_env(i: u32) -> *const StrHeader {
    let table = PROC.read();
    let t = match table.as_ref() {
        Some(t) if i < t.envc => t,
        _ => return string::empty(),
    };
    unsafe {
        let p = *t.envv.add(i as usize);
        string::alloc(slice::from_raw_parts(p, cstr_len(p)))
    }
}

/// Look up `key` in the recorded environment by linear scan. Returns a
/// pointer to the NUL-terminated value bytes inside the entry, or None
/// when the key is absent.
pub fn getenv(key: &[u8]) -> Option<*const u8> {
    let table = PROC.read();
    let t = table.as_ref()?;
    for i in 0..t.envc as usize {
        unsafe {
            let entry = *t.envv.add(i);
            let entry = slice::from_raw_parts(entry, cstr_len(entry));
            if entry.len() > key.len() && &entry[..key.len()] == key && entry[key.len()] == b'=' {
                return Some(entry.as_ptr().add(key.len() + 1));
            }
        }
    }
    None
}

/// C-ABI entry for [`getenv`]; null when the key is absent.
///
/// # Safety
/// `key` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn vesper_getenv(key: *const u8) -> *const u8 {
    let key = slice::from_raw_parts(key, cstr_len(key));
    getenv(key).unwrap_or(std::ptr::null())
}

// ============================================================================
// Diagnostic printing
// ============================================================================

/// Print an integer to stderr. Diagnostic only.
#[no_mangle]
pub extern "C" fn vesper_print_int(v: u64) {
    eprint!("{}", v);
}

/// Print a runtime string to stderr. Diagnostic only.
///
/// # Safety
/// `s`, when non-null, must be a valid runtime string.
#[no_mangle]
pub unsafe extern "C" fn vesper_print_str(s: *const StrHeader) {
    if s.is_null() {
        return;
    }
    eprint!("{}", String::from_utf8_lossy(string::bytes(s)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_atoi() {
        assert_eq!(atoi(b""), 0);
        assert_eq!(atoi(b"0"), 0);
        assert_eq!(atoi(b"123"), 123);
        assert_eq!(atoi(b"42abc"), 42);
        assert_eq!(atoi(b"x42"), 0);
    }

    #[test]
    fn test_cstr_len() {
        unsafe {
            assert_eq!(cstr_len(b"\0".as_ptr()), 0);
            assert_eq!(cstr_len(b"four\0".as_ptr()), 4);
        }
    }

    // All assertions against the process table live in this one test:
    // the table is process-wide state.
    #[test]
    fn test_argument_and_environment_vector() {
        let _mutator = test_support::PROCESS_STATE.lock();
        let vector: [*const u8; 6] = [
            b"prog\0".as_ptr(),
            b"a\0".as_ptr(),
            b"b\0".as_ptr(),
            std::ptr::null(),
            b"K=v\0".as_ptr(),
            std::ptr::null(),
        ];
        unsafe {
            vesper_args_init(3, vector.as_ptr());

            assert_eq!(vesper_arg_count(), 3);
            assert_eq!(vesper_env_count(), 1);

            assert_eq!(string::bytes(vesper_arg(0)), b"prog");
            assert_eq!(string::bytes(vesper_arg(1)), b"a");
            assert_eq!(string::bytes(vesper_arg(2)), b"b");
            // Out of range degrades to the empty string.
            assert_eq!(string::bytes(vesper_arg(3)), b"");
            assert_eq!(string::bytes(vesper_arg(u32::MAX)), b"");

            assert_eq!(string::bytes(vesper_env(0)), b"K=v");
            assert_eq!(string::bytes(vesper_env(1)), b"");

            let v = getenv(b"K").expect("K is set");
            assert_eq!(slice::from_raw_parts(v, cstr_len(v)), b"v");
            assert!(getenv(b"MISSING").is_none());
            // A key that prefixes an entry without hitting '=' does not
            // match.
            assert!(getenv(b"K=").is_none());

            assert_eq!(vesper_getenv(b"K\0".as_ptr()), v);
            assert!(vesper_getenv(b"MISSING\0".as_ptr()).is_null());
        }
    }
}

//! Unrecoverable-error path.
//!
//! This layer never returns a recoverable error to its callers: a
//! detected contract violation reports to stderr and terminates the
//! process. [`vesper_panic`] handles violations raised by generated
//! code (with an optional stack traceback); [`throw`] handles internal
//! invariant failures and aborts so the failure still leaves a core
//! dump. Neither can be caught or retried.

use std::slice;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::RwLock;

use crate::sys;

/// Environment variable controlling traceback verbosity on panic.
pub const TRACEBACK_VAR: &[u8] = b"VESPERTRACEBACK";

/// Set once a panic has started; read by the traceback machinery and
/// the signal glue.
static PANICKING: AtomicI32 = AtomicI32::new(0);

/// Hooks into the external traceback machinery. The runtime itself does
/// not unwind stacks; the host registers these at startup if it can.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TracebackHooks {
    /// Unwind and print the failing execution context.
    pub current: unsafe extern "C" fn(),
    /// Print every other live execution context.
    pub others: unsafe extern "C" fn(),
}

static TRACEBACK: RwLock<Option<TracebackHooks>> = RwLock::new(None);

/// Register the traceback hooks invoked on panic.
#[no_mangle]
pub extern "C" fn vesper_set_traceback_hooks(hooks: TracebackHooks) {
    *TRACEBACK.write() = Some(hooks);
}

/// Whether a panic is in progress.
#[no_mangle]
pub extern "C" fn vesper_panicking() -> i32 {
    PANICKING.load(Ordering::SeqCst)
}

/// Traceback verbosity: [`TRACEBACK_VAR`] absent or empty means 1 (on);
/// any other value is parsed as a decimal integer, with 0 disabling the
/// traceback.
pub fn traceback_level() -> i32 {
    match sys::getenv(TRACEBACK_VAR) {
        None => 1,
        Some(p) => unsafe {
            let bytes = slice::from_raw_parts(p, sys::cstr_len(p));
            if bytes.is_empty() {
                1
            } else {
                sys::atoi(bytes)
            }
        },
    }
}

/// Report a panic raised by generated code at source line `line`, print
/// a traceback when enabled, and terminate with exit code 2.
#[no_mangle]
pub extern "C" fn vesper_panic(line: i32) -> ! {
    eprintln!();
    eprintln!("panic on line {}", line);
    if traceback_level() != 0 {
        if let Some(hooks) = *TRACEBACK.read() {
            unsafe {
                (hooks.current)();
                (hooks.others)();
            }
        }
    }
    PANICKING.store(1, Ordering::SeqCst);
    // Stop here first when a debugger is attached.
    unsafe {
        libc::raise(libc::SIGTRAP);
    }
    std::process::exit(2);
}

/// Report an internal invariant failure and abort. The abort raises
/// SIGABRT, which leaves a core dump, so the failure stays diagnosable.
pub fn throw(msg: &str) -> ! {
    eprintln!("throw: {}", msg);
    std::process::abort();
}

/// C-ABI entry for [`throw`].
///
/// # Safety
/// `msg`, when non-null, must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn vesper_throw(msg: *const u8) -> ! {
    if msg.is_null() {
        throw("");
    }
    let bytes = slice::from_raw_parts(msg, sys::cstr_len(msg));
    throw(&String::from_utf8_lossy(bytes));
}

/// Out-of-range index detected by generated code.
#[no_mangle]
pub extern "C" fn vesper_throw_index() -> ! {
    throw("index out of range");
}

/// A typed function ran off its end without returning a value.
#[no_mangle]
pub extern "C" fn vesper_throw_return() -> ! {
    throw("no return at end of a typed function");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_panicking_flag_starts_clear() {
        assert_eq!(vesper_panicking(), 0);
    }

    // Traceback verbosity reads the process environment table, so every
    // variant stays inside this one test.
    #[test]
    fn test_traceback_level() {
        let _mutator = test_support::PROCESS_STATE.lock();
        unsafe {
            // No table recorded at all: default on.
            // (Recording an empty vector gives the same answer.)
            let empty: [*const u8; 2] = [std::ptr::null(), std::ptr::null()];
            sys::vesper_args_init(0, empty.as_ptr());
            assert_eq!(traceback_level(), 1);

            let off: [*const u8; 3] = [
                std::ptr::null(),
                b"VESPERTRACEBACK=0\0".as_ptr(),
                std::ptr::null(),
            ];
            sys::vesper_args_init(0, off.as_ptr());
            assert_eq!(traceback_level(), 0);

            let verbose: [*const u8; 3] = [
                std::ptr::null(),
                b"VESPERTRACEBACK=2\0".as_ptr(),
                std::ptr::null(),
            ];
            sys::vesper_args_init(0, verbose.as_ptr());
            assert_eq!(traceback_level(), 2);

            // Present but empty: default on.
            let blank: [*const u8; 3] = [
                std::ptr::null(),
                b"VESPERTRACEBACK=\0".as_ptr(),
                std::ptr::null(),
            ];
            sys::vesper_args_init(0, blank.as_ptr());
            assert_eq!(traceback_level(), 1);
        }
    }
}

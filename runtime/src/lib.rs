//! Vesper Runtime Library
//!
//! The minimal support layer under compiled Vesper programs: a bump
//! allocator, the generic type-algorithm table that lets maps and
//! channels work over arbitrary element types, float decomposition
//! primitives, process argument/environment access, and the
//! fatal-error path.
//!
//! # Architecture
//!
//! - **JIT Mode**: the runtime is linked into the compiler process and
//!   generated code calls its exports directly, resolved through the
//!   plugin registry
//! - **AOT Mode**: the runtime is statically linked alongside the
//!   output binary
//!
//! # Memory Management
//!
//! One logical mutator owns the allocator: memory is carved from large
//! arena chunks, handed out zeroed and 8-byte aligned, and never freed.
//! The arena is reclaimed only by process exit; there is no garbage
//! collector at this layer.

// Core runtime modules
pub mod alg; // Generic hash/equal/print/copy over unknown element types
pub mod check; // Startup platform self-test
pub mod fatal; // Panic and throw paths
pub mod math; // Float decomposition primitives
pub mod mem; // Bump allocator
pub mod string; // Immutable runtime strings
pub mod symtab; // Symbol/line table segment views
pub mod sys; // Process arguments and environment

pub mod plugin_impl; // Plugin registration

// Re-export main types
pub use alg::{Alg, ALG_MEM, ALG_POINTER, ALG_STRING};
pub use mem::MemStats;
pub use string::StrHeader;

// Re-export plugin
pub use plugin_impl::get_plugin;

/// Initialize the runtime: record the process argument/environment
/// vector, then verify the platform contract. Called by the host
/// exactly once, before any generated code runs.
///
/// # Safety
/// `argv` must satisfy the vector layout documented on
/// [`sys::vesper_args_init`].
#[no_mangle]
pub unsafe extern "C" fn vesper_runtime_init(argc: i32, argv: *const *const u8) {
    sys::vesper_args_init(argc, argv);
    check::vesper_check();
}

/// Shutdown hook for the backend lifecycle. Arena memory is returned to
/// the OS at process exit, so there is nothing to tear down.
#[no_mangle]
pub extern "C" fn vesper_runtime_shutdown() {}

#[cfg(test)]
pub(crate) mod test_support {
    use parking_lot::Mutex;

    /// Serializes tests that touch process-wide runtime state: the
    /// single-mutator allocator and the process vector table.
    pub static PROCESS_STATE: Mutex<()> = Mutex::new(());
}

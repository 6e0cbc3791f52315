//! Runtime plugin implementation
//!
//! Registers every exported runtime symbol so the compiler backend can
//! resolve calls emitted by generated code.

/// Thread-safe function pointer wrapper
pub struct FunctionPtr(*const u8);

unsafe impl Send for FunctionPtr {}
unsafe impl Sync for FunctionPtr {}

impl FunctionPtr {
    pub const fn new(ptr: *const u8) -> Self {
        FunctionPtr(ptr)
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.0
    }
}

/// Runtime symbol for inventory-based registration
pub struct RuntimeSymbol {
    pub name: &'static str,
    pub ptr: FunctionPtr,
}

inventory::collect!(RuntimeSymbol);

/// Register a runtime symbol
macro_rules! register_symbol {
    ($name:expr, $func:path) => {
        inventory::submit! {
            RuntimeSymbol {
                name: $name,
                ptr: FunctionPtr::new($func as *const u8),
            }
        }
    };
}

// ============================================================================
// Memory
// ============================================================================

register_symbol!("vesper_alloc", crate::mem::vesper_alloc);
register_symbol!("vesper_round_up", crate::mem::vesper_round_up);
register_symbol!("vesper_mem_stats", crate::mem::vesper_mem_stats);
register_symbol!("vesper_memcpy", crate::mem::vesper_memcpy);
register_symbol!("vesper_memmove", crate::mem::vesper_memmove);

// ============================================================================
// Type algorithms
// ============================================================================

register_symbol!("vesper_alg", crate::alg::vesper_alg);

// ============================================================================
// Strings
// ============================================================================

register_symbol!("vesper_string_new", crate::string::vesper_string_new);
register_symbol!("vesper_string_len", crate::string::vesper_string_len);

// ============================================================================
// Float primitives
// ============================================================================

register_symbol!("vesper_math_f64_bits", crate::math::vesper_math_f64_bits);
register_symbol!("vesper_math_f64_from_bits", crate::math::vesper_math_f64_from_bits);
register_symbol!("vesper_math_f32_bits", crate::math::vesper_math_f32_bits);
register_symbol!("vesper_math_f32_from_bits", crate::math::vesper_math_f32_from_bits);
register_symbol!("vesper_math_is_inf", crate::math::vesper_math_is_inf);
register_symbol!("vesper_math_is_nan", crate::math::vesper_math_is_nan);
register_symbol!("vesper_math_nan", crate::math::vesper_math_nan);
register_symbol!("vesper_math_inf", crate::math::vesper_math_inf);
register_symbol!("vesper_math_frexp", crate::math::vesper_math_frexp);
register_symbol!("vesper_math_ldexp", crate::math::vesper_math_ldexp);
register_symbol!("vesper_math_modf", crate::math::vesper_math_modf);

// ============================================================================
// Process arguments and environment
// ============================================================================

register_symbol!("vesper_arg_count", crate::sys::vesper_arg_count);
register_symbol!("vesper_arg", crate::sys::vesper_arg);
register_symbol!("vesper_env_count", crate::sys::vesper_env_count);
register_symbol!("vesper_env", crate::sys::vesper_env);
register_symbol!("vesper_getenv", crate::sys::vesper_getenv);
register_symbol!("vesper_print_int", crate::sys::vesper_print_int);
register_symbol!("vesper_print_str", crate::sys::vesper_print_str);

// ============================================================================
// Fatal-error path
// ============================================================================

register_symbol!("vesper_panic", crate::fatal::vesper_panic);
register_symbol!("vesper_panicking", crate::fatal::vesper_panicking);
register_symbol!("vesper_throw", crate::fatal::vesper_throw);
register_symbol!("vesper_throw_index", crate::fatal::vesper_throw_index);
register_symbol!("vesper_throw_return", crate::fatal::vesper_throw_return);
register_symbol!("vesper_set_traceback_hooks", crate::fatal::vesper_set_traceback_hooks);

// ============================================================================
// Self-test and symbol tables
// ============================================================================

register_symbol!("vesper_cas", crate::check::vesper_cas);
register_symbol!("vesper_check", crate::check::vesper_check);
register_symbol!("vesper_symdat", crate::symtab::vesper_symdat);

/// Vesper Runtime Plugin
pub struct VesperRuntimePlugin;

impl VesperRuntimePlugin {
    pub fn new() -> Self {
        VesperRuntimePlugin
    }
}

impl Default for VesperRuntimePlugin {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the runtime plugin instance
pub fn get_plugin() -> Box<dyn vesper_plugin::RuntimePlugin> {
    Box::new(VesperRuntimePlugin)
}

impl vesper_plugin::RuntimePlugin for VesperRuntimePlugin {
    fn name(&self) -> &str {
        "vesper_runtime"
    }

    fn runtime_symbols(&self) -> Vec<(&'static str, *const u8)> {
        inventory::iter::<RuntimeSymbol>
            .into_iter()
            .map(|sym| (sym.name, sym.ptr.as_ptr()))
            .collect()
    }

    fn on_load(&self) -> Result<(), String> {
        log::debug!("vesper_runtime plugin loaded");
        Ok(())
    }
}

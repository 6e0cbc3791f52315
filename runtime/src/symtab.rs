//! Symbol and line-number table access.
//!
//! The build tools place the symbol table and the pc/line table back to
//! back at a fixed address: two 32-bit lengths, then the two segments'
//! bytes. The runtime only hands out views over that memory; the
//! traceback machinery is what interprets it. [`views_at`] is the one
//! place that decodes the segment layout.

/// Borrowed view over a static byte segment.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ByteView {
    pub len: u32,
    pub cap: u32,
    pub data: *const u8,
}

/// The two linker-provided segments.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SymDat {
    pub symtab: ByteView,
    pub pclntab: ByteView,
}

/// Fixed segment address written by the build tools into every linked
/// binary.
const SYMDAT_ADDR: usize = 0x99 << 32;

unsafe fn views_at(base: *const u32) -> SymDat {
    let sym_len = *base;
    let line_len = *base.add(1);
    let data = base.add(2) as *const u8;
    SymDat {
        symtab: ByteView {
            len: sym_len,
            cap: sym_len,
            data,
        },
        pclntab: ByteView {
            len: line_len,
            cap: line_len,
            data: data.add(sym_len as usize),
        },
    }
}

/// Views over the statically linked symbol/line segments.
///
/// # Safety
/// Only meaningful in binaries produced by the Vesper build tools,
/// which place the segments at the fixed address.
#[no_mangle]
pub unsafe extern "C" fn vesper_symdat() -> SymDat {
    views_at(SYMDAT_ADDR as *const u32)
}

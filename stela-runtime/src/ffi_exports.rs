//! # FFI Exports
//!
//! C-compatible exports for linking compiled STELA programs against the
//! runtime.
//!
//! ## Usage
//!
//! The crate builds as a `staticlib`; link compiled programs with
//! `-lstela_runtime`. Lifetime helpers generated by `stelac` call these
//! functions by name.

use crate::memory::{self, ArrayBlock, ClosureBlock, Destructor};

// ============================================================================
// Arrays
// ============================================================================

/// Allocate an empty array with room for `cap` elements.
#[no_mangle]
pub extern "C" fn stela_array_new(elem_size: usize, cap: usize) -> *mut ArrayBlock {
    memory::array_new(elem_size, cap)
}

/// Append an element to the array in `*slot`, allocating it if empty.
///
/// # Safety
/// See [`memory::array_push`].
#[no_mangle]
pub unsafe extern "C" fn stela_array_push(slot: *mut *mut ArrayBlock, elem: *const u8, elem_size: usize) {
    if slot.is_null() {
        return;
    }
    memory::array_push(slot, elem, elem_size);
}

/// Number of elements in an array.
///
/// # Safety
/// `array` must be null or a live array block.
#[no_mangle]
pub unsafe extern "C" fn stela_array_len(array: *const ArrayBlock) -> usize {
    memory::array_len(array)
}

/// Drop one reference to an array.
///
/// # Safety
/// See [`memory::array_release`].
#[no_mangle]
pub unsafe extern "C" fn stela_array_release(array: *mut ArrayBlock, elem_size: usize, elem_dtor: Option<Destructor>) {
    memory::array_release(array, elem_size, elem_dtor);
}

// ============================================================================
// Closures
// ============================================================================

/// Allocate a closure block for `func` with an `env_size`-byte environment.
#[no_mangle]
pub extern "C" fn stela_closure_new(func: *const u8, dtor: Option<Destructor>, env_size: usize) -> *mut ClosureBlock {
    memory::closure_new(func, dtor, env_size)
}

/// The captured environment of a closure.
///
/// # Safety
/// `closure` must be a live closure block.
#[no_mangle]
pub unsafe extern "C" fn stela_closure_env(closure: *mut ClosureBlock) -> *mut u8 {
    memory::closure_env(closure)
}

/// Drop one reference to a closure.
///
/// # Safety
/// `closure` must be null or a live closure block owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn stela_closure_release(closure: *mut ClosureBlock) {
    memory::closure_release(closure);
}

// ============================================================================
// Reference counts
// ============================================================================

/// Share an array or closure block. Null is ignored.
///
/// # Safety
/// `block` must be null or a live block.
#[no_mangle]
pub unsafe extern "C" fn stela_rc_retain(block: *mut u8) {
    memory::rc_retain(block);
}

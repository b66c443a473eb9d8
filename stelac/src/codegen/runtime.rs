//! Runtime ABI used by generated lifetime helpers.
//!
//! The runtime is the `stela-runtime` crate, built as a static library and
//! linked with compiled STELA programs. Every heap block starts with its
//! refcount, so one retain entry point serves arrays and closures.

/// Runtime function names.
pub mod functions {
    /// `fn(elem_size: usize, cap: usize) -> *mut ArrayBlock`
    pub const ARRAY_NEW: &str = "stela_array_new";

    /// `fn(slot: *mut *mut ArrayBlock, elem: *const u8, elem_size: usize)`
    pub const ARRAY_PUSH: &str = "stela_array_push";

    /// `fn(array: *const ArrayBlock) -> usize`
    pub const ARRAY_LEN: &str = "stela_array_len";

    /// `fn(block: *mut u8)`; null is ignored.
    pub const RC_RETAIN: &str = "stela_rc_retain";

    /// `fn(array: *mut ArrayBlock, elem_size: usize, elem_dtor: Option<fn(*mut u8)>)`
    pub const ARRAY_RELEASE: &str = "stela_array_release";

    /// `fn(func: *const u8, dtor: Option<fn(*mut u8)>, env_size: usize) -> *mut ClosureBlock`
    pub const CLOSURE_NEW: &str = "stela_closure_new";

    /// `fn(closure: *mut ClosureBlock) -> *mut u8`
    pub const CLOSURE_ENV: &str = "stela_closure_env";

    /// `fn(closure: *mut ClosureBlock)`
    pub const CLOSURE_RELEASE: &str = "stela_closure_release";
}

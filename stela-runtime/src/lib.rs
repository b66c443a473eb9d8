//! # STELA Runtime Library
//!
//! Support code linked into compiled STELA programs:
//!
//! - **Memory**: refcounted array and closure blocks ([`memory`])
//! - **FFI**: the C ABI the generated lifetime helpers call ([`ffi_exports`])
//!
//! ## Value Lifetimes
//!
//! Arrays and closures are trivially relocatable: a value is one pointer to
//! a refcounted block, so moving a value moves the pointer and copying it
//! retains the block. The compiler generates the helpers that decide when
//! to retain and release; this crate only manages the blocks.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod ffi_exports;
pub mod memory;

pub use memory::{ArrayBlock, ClosureBlock, Destructor};

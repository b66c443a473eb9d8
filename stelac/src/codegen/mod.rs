//! Code generation for STELA lifetime helpers.
//!
//! Semantic analysis decides, for every value transfer, which lifetime
//! operations run. This module turns those decisions into helper
//! functions, one per (operation, type) pair.
//!
//! # Architecture
//!
//! ```text
//! Analysis -> helper requests -> InstantiationCache -> HelperBackend
//! ```
//!
//! Two backends exist:
//! - [`RecordingBackend`] - an in-memory listing of helpers and their plans
//! - `LlvmBackend` - LLVM IR calling the runtime ABI (cargo feature `llvm`)

pub mod cache;
#[cfg(feature = "llvm")]
pub mod context;
pub mod mangle;
pub mod recording;
pub mod runtime;
pub mod types;

pub use cache::{HelperBackend, HelperBody, HelperEnv, InstantiationCache};
#[cfg(feature = "llvm")]
pub use context::LlvmBackend;
pub use recording::{RecordedHelper, RecordingBackend};

use thiserror::Error;

use crate::ast::Ast;
use crate::typeck::Analysis;

/// Errors from helper generation.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("helper handle {0} was never declared")]
    UnknownHelper(usize),

    #[error("LLVM error: {0}")]
    Llvm(String),

    #[error("LLVM verification failed: {0}")]
    Verification(String),
}

/// Generate every helper the analyzed program needs.
pub fn instantiate_helpers<B: HelperBackend>(
    ast: &Ast,
    analysis: &Analysis,
    backend: B,
) -> Result<InstantiationCache<B>, CodegenError> {
    let env = HelperEnv {
        ast,
        types: &analysis.types,
        symbols: &analysis.symbols,
    };
    let mut cache = InstantiationCache::new(backend);
    for (op, ty) in analysis.helper_requests() {
        cache.get(&env, op, ty)?;
    }
    Ok(cache)
}

/// Generate every helper as LLVM IR text.
#[cfg(feature = "llvm")]
pub fn compile_helpers_to_ir(ast: &Ast, analysis: &Analysis, module_name: &str) -> Result<String, CodegenError> {
    let context = inkwell::context::Context::create();
    let backend = LlvmBackend::new(&context, module_name);
    let cache = instantiate_helpers(ast, analysis, backend)?;
    let backend = cache.into_backend();
    backend.verify()?;
    Ok(backend.print_to_string())
}

//! # STELA Compiler Library
//!
//! The semantic core of the STELA compiler: name resolution, type checking,
//! closure captures and value lifetime planning for a small statically typed
//! language with value semantics.
//!
//! ## Compiler Pipeline
//!
//! ```text
//! Source -> Lexer -> Parser -> AST -> Module order -> Type check -> Lifetime helpers
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use stelac::config::CompilerConfig;
//! use stelac::diagnostics::CollectingSink;
//! use stelac::project::Session;
//!
//! let mut session = Session::new();
//! session
//!     .add_source("main.stela", "func square(x: sint) -> sint { return x * x; }")
//!     .expect("valid syntax");
//!
//! let mut sink = CollectingSink::new();
//! let program = session
//!     .check(&CompilerConfig::default(), &mut sink)
//!     .expect("well typed");
//! assert_eq!(program.order, vec!["main"]);
//! ```
//!
//! ## Module Overview
//!
//! - [`ast`] - Arena-allocated syntax tree with one-shot resolution slots
//! - [`codegen`] - Lifetime helper instantiation (LLVM behind the `llvm` feature)
//! - [`config`] - Compiler settings from builder, environment or CLI
//! - [`diagnostics`] - Error reporting infrastructure
//! - [`lexer`] - Tokenization (lexical analysis)
//! - [`parser`] - Parsing (syntax analysis)
//! - [`project`] - Sessions, host modules and the module import graph
//! - [`span`] - Source location tracking
//! - [`typeck`] - Scopes, symbols, type checking and lifetime classification

pub mod ast;
pub mod codegen;
pub mod config;
pub mod def;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod project;
pub mod span;
pub mod typeck;

// Re-export commonly used types
pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, ErrorCode};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use project::{CheckedProgram, Session};
pub use span::Span;

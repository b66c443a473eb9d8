//! Multi-module compilation.
//!
//! This module provides support for:
//! - Module import ordering and cycle detection
//! - Host-bound (external) modules declared through a builder
//! - Running semantic analysis over every module of a session

pub mod compiler;
pub mod graph;

pub use compiler::{CheckedProgram, ExternalModuleBuilder, Session, SessionError};
pub use graph::{find_module_order, GraphError, ModuleImports};

//! Semantic analysis for STELA.
//!
//! This module resolves names, infers the type of every expression and
//! decides how every value is constructed, copied, moved and destroyed.
//! Key components:
//!
//! - [`TypeContext`] - The analysis context, one per compilation
//! - [`ScopeGraph`] - Hierarchical scopes with overload sets
//! - [`SymbolTable`] - Every declared entity
//! - [`TypeTable`] - Interned semantic types
//!
//! # Analysis Process
//!
//! 1. **Module order** - Imports are analyzed before their importers
//! 2. **Declaration** - Types, then signatures, then globals
//! 3. **Bodies** - Statement checking and expression typing
//! 4. **Warnings** - Unused symbols, once every module is done
//!
//! # Expression Types
//!
//! Every expression carries an [`ExprType`]: its type plus whether it may
//! be written (`let`/`var`) and whether it names storage (`val`/`ref`).
//! Any semantic error stops the whole compilation.

pub mod compare;
pub mod context;
pub mod error;
pub mod lifetime;
pub mod resolve;
pub mod symbol;
pub mod types;

#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap};

pub use compare::{compare_types, concrete, representation};
pub use context::{TransferRecord, TransferSite, TypeContext, SHADOW_WARNING, UNUSED_WARNING};
pub use error::{ReturnProblem, TypeError, TypeErrorKind, TypeResult};
pub use lifetime::{classify, plan, plan_transfer, LifetimeOp, LifetimePlan, Transfer, TypeCategory};
pub use resolve::{ScopeGraph, ScopeKind};
pub use symbol::{CaptureSource, ClosureCap, Symbol, SymbolKind, SymbolTable};
pub use types::{BuiltinType, ExprType, Ty, TypeTable};

use crate::def::{ExprId, SymbolId, TypeId};
use symbol::ObjectOrigin;

/// The result of analyzing a whole program, handed to code generation.
#[derive(Debug)]
pub struct Analysis {
    pub types: TypeTable,
    pub symbols: SymbolTable,
    pub scopes: ScopeGraph,
    pub(crate) expr_types: HashMap<ExprId, ExprType>,
    pub(crate) captured: HashMap<ExprId, (SymbolId, usize)>,
    pub transfers: Vec<TransferRecord>,
    /// Objects that start out default constructed, with their types.
    pub default_constructed: Vec<(SymbolId, TypeId)>,
    /// Every closure, in creation order.
    pub closures: Vec<SymbolId>,
}

impl Analysis {
    /// The type of an analyzed expression.
    pub fn expr_type(&self, expr: ExprId) -> Option<ExprType> {
        self.expr_types.get(&expr).copied()
    }

    /// The lifetime category of an analyzed expression's type.
    pub fn category(&self, expr: ExprId) -> Option<TypeCategory> {
        self.expr_type(expr)
            .map(|et| classify(&self.types, &self.symbols, et.ty))
    }

    /// The ordered capture list of a closure: its heap record layout.
    pub fn captures(&self, lambda: SymbolId) -> &[ClosureCap] {
        self.symbols
            .lambda(lambda)
            .map(|info| info.captures.as_slice())
            .unwrap_or_default()
    }

    /// The closure and slot an identifier reads through, if it reads a
    /// captured object.
    pub fn capture_slot(&self, expr: ExprId) -> Option<(SymbolId, usize)> {
        self.captured.get(&expr).copied()
    }

    /// Number of analyzed expressions.
    pub fn expr_count(&self) -> usize {
        self.expr_types.len()
    }

    /// Every (operation, type) pair code generation needs a helper for.
    ///
    /// Transfers contribute the helpers their plan names. Objects of types
    /// that are not trivially copyable need a destructor, and a default
    /// constructor when declared without an initializer. A closure needs to
    /// copy and destroy what it captures.
    pub fn helper_requests(&self) -> BTreeSet<(LifetimeOp, TypeId)> {
        let mut requests = BTreeSet::new();
        for record in &self.transfers {
            for &op in record.transfer.helper_ops() {
                requests.insert((op, record.ty));
            }
        }

        let needs_helpers =
            |ty: TypeId| classify(&self.types, &self.symbols, ty) != TypeCategory::TriviallyCopyable;
        for (_, symbol) in self.symbols.iter() {
            let SymbolKind::Object(info) = &symbol.kind else {
                continue;
            };
            if info.origin != ObjectOrigin::Receiver && needs_helpers(info.ty.ty) {
                requests.insert((LifetimeOp::Destroy, info.ty.ty));
            }
        }
        for &(_, ty) in &self.default_constructed {
            if needs_helpers(ty) {
                requests.insert((LifetimeOp::DefConstruct, ty));
            }
        }
        for &lambda in &self.closures {
            for cap in self.captures(lambda) {
                if needs_helpers(cap.ty) {
                    requests.insert((LifetimeOp::CopyConstruct, cap.ty));
                    requests.insert((LifetimeOp::Destroy, cap.ty));
                }
            }
        }
        requests
    }
}

//! Builtin types and functions.
//!
//! Builtins live in the root scope, so every module sees them unless it
//! shadows them. The builtin functions are generic over the element type of
//! their array argument; a call instantiates them against its arguments.

use crate::ast::Referenceness;
use crate::def::TypeId;
use crate::span::Span;

use super::TypeContext;
use super::super::symbol::{BuiltinFn, SymbolKind};
use super::super::types::{BuiltinType, ExprType, Ty};

impl<'a> TypeContext<'a> {
    /// Register the builtin types and functions in the root scope.
    pub(crate) fn register_builtins(&mut self) {
        let root = self.scopes.root();
        for builtin in BuiltinType::ALL {
            let name = self.ast.predefined(builtin.name());
            let symbol = self
                .symbols
                .alloc(name, Span::dummy(), SymbolKind::BuiltinType(builtin), root);
            // The root is empty at this point; nothing can clash.
            let _ = self.scopes.insert(name, symbol, |_| true);
        }
        for builtin in BuiltinFn::ALL {
            let name = self.ast.predefined(builtin.name());
            let symbol = self
                .symbols
                .alloc(name, Span::dummy(), SymbolKind::BuiltinFn(builtin), root);
            let _ = self.scopes.insert(name, symbol, |_| true);
        }
    }

    /// The signature of `builtin` for these arguments, or `None` when the
    /// arguments do not fit.
    ///
    /// - `len([T]) -> uint`
    /// - `push(ref [T], T)`
    /// - `pop(ref [T]) -> T`
    /// - `print(x)` for any builtin or `[char]`
    pub(crate) fn instantiate_builtin(&mut self, builtin: BuiltinFn, args: &[ExprType]) -> Option<TypeId> {
        let element = |cx: &Self, arg: &ExprType| match cx.types.get(cx.concrete(arg.ty)) {
            Ty::Array(element) => Some(*element),
            _ => None,
        };

        let (params, ret) = match (builtin, args) {
            (BuiltinFn::Len, [array]) => {
                element(self, array)?;
                (vec![(Referenceness::Val, array.ty)], self.types.builtin(BuiltinType::Uint))
            }
            (BuiltinFn::Push, [array, _]) => {
                let element = element(self, array)?;
                (
                    vec![(Referenceness::Ref, array.ty), (Referenceness::Val, element)],
                    self.types.void(),
                )
            }
            (BuiltinFn::Pop, [array]) => {
                let element = element(self, array)?;
                (vec![(Referenceness::Ref, array.ty)], element)
            }
            (BuiltinFn::Print, [value]) => {
                let printable = match self.types.get(self.concrete(value.ty)) {
                    Ty::Builtin(BuiltinType::Void) => false,
                    Ty::Builtin(_) => true,
                    Ty::Array(element) => {
                        self.types.as_builtin(self.concrete(*element)) == Some(BuiltinType::Char)
                    }
                    _ => false,
                };
                if !printable {
                    return None;
                }
                (vec![(Referenceness::Val, value.ty)], self.types.void())
            }
            _ => return None,
        };
        Some(self.types.func(params, ret))
    }
}

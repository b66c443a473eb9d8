//! Symbol names of generated lifetime helpers.
//!
//! A helper for operation `op` on type `T` is named
//! `stela_<op>_<code(T)>`, where the type code is:
//!
//! | type | code |
//! |---|---|
//! | builtin | its name, e.g. `sint` |
//! | `[T]` | `A` `code(T)` |
//! | `func(P...) -> R` | `F` count, `r` for each `ref` parameter, codes, `R` `code(R)` |
//! | struct, enum, host type, strong alias | `S`/`E`/`U`/`N` name length, name, `_` symbol index |
//!
//! The symbol index keeps equally named types of different modules apart.

use std::fmt::Write;

use crate::ast::{Ast, Referenceness};
use crate::def::TypeId;
use crate::typeck::compare::concrete;
use crate::typeck::lifetime::LifetimeOp;
use crate::typeck::symbol::SymbolTable;
use crate::typeck::types::{Ty, TypeTable};

/// The helper symbol name for `op` on `ty`.
pub fn helper_name(ast: &Ast, types: &TypeTable, symbols: &SymbolTable, op: LifetimeOp, ty: TypeId) -> String {
    let mut name = format!("stela_{}_", op.name());
    type_code(ast, types, symbols, ty, &mut name);
    name
}

/// Append the mangled code of `ty` to `out`.
pub fn type_code(ast: &Ast, types: &TypeTable, symbols: &SymbolTable, ty: TypeId, out: &mut String) {
    let ty = concrete(types, symbols, ty);
    match types.get(ty) {
        Ty::Builtin(b) => out.push_str(b.name()),
        Ty::Array(element) => {
            out.push('A');
            type_code(ast, types, symbols, *element, out);
        }
        Ty::Func { params, ret } => {
            let _ = write!(out, "F{}", params.len());
            for &(referenceness, param) in params {
                if referenceness == Referenceness::Ref {
                    out.push('r');
                }
                type_code(ast, types, symbols, param, out);
            }
            out.push('R');
            type_code(ast, types, symbols, *ret, out);
        }
        Ty::Struct(sym) | Ty::Enum(sym) | Ty::User(sym) | Ty::Alias(sym) | Ty::Pending(sym) => {
            let tag = match types.get(ty) {
                Ty::Struct(_) => 'S',
                Ty::Enum(_) => 'E',
                Ty::User(_) => 'U',
                Ty::Alias(_) => 'N',
                _ => 'P',
            };
            let name = ast.name(symbols.get(*sym).name);
            let _ = write!(out, "{tag}{}{name}_{}", name.len(), sym.index());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeck::types::BuiltinType;

    #[test]
    fn test_builtin_and_array_names() {
        let ast = Ast::new();
        let mut types = TypeTable::new();
        let symbols = SymbolTable::new();
        let sint = types.builtin(BuiltinType::Sint);
        let arr = types.array_of(sint);
        let nested = types.array_of(arr);

        assert_eq!(helper_name(&ast, &types, &symbols, LifetimeOp::Destroy, sint), "stela_destroy_sint");
        assert_eq!(
            helper_name(&ast, &types, &symbols, LifetimeOp::CopyConstruct, nested),
            "stela_copy_construct_AAsint"
        );
    }

    #[test]
    fn test_function_types_encode_referenceness() {
        let ast = Ast::new();
        let mut types = TypeTable::new();
        let symbols = SymbolTable::new();
        let real = types.builtin(BuiltinType::Real);
        let void = types.void();
        let by_val = types.func(vec![(Referenceness::Val, real)], void);
        let by_ref = types.func(vec![(Referenceness::Ref, real)], void);

        let a = helper_name(&ast, &types, &symbols, LifetimeOp::Destroy, by_val);
        let b = helper_name(&ast, &types, &symbols, LifetimeOp::Destroy, by_ref);
        assert_eq!(a, "stela_destroy_F1realRvoid");
        assert_eq!(b, "stela_destroy_F1rrealRvoid");
    }
}

//! Semantic types.
//!
//! Types are interned in a [`TypeTable`] and referred to by [`TypeId`], so
//! structural equality of the *representation* is id equality. Semantic
//! equality (alias unwrapping, struct layouts) lives in [`super::compare`].

use std::collections::HashMap;

use crate::def::{SymbolId, TypeId};

pub use crate::ast::{Mutability, Referenceness};

/// The builtin scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Void,
    Bool,
    Char,
    Byte,
    Real,
    Sint,
    Uint,
}

impl BuiltinType {
    /// Every builtin, in the order they are interned.
    pub const ALL: [BuiltinType; 7] = [
        BuiltinType::Void,
        BuiltinType::Bool,
        BuiltinType::Char,
        BuiltinType::Byte,
        BuiltinType::Real,
        BuiltinType::Sint,
        BuiltinType::Uint,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinType::Void => "void",
            BuiltinType::Bool => "bool",
            BuiltinType::Char => "char",
            BuiltinType::Byte => "byte",
            BuiltinType::Real => "real",
            BuiltinType::Sint => "sint",
            BuiltinType::Uint => "uint",
        }
    }

    /// Operand of `+ - * / %` and of ordering comparisons.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BuiltinType::Char
                | BuiltinType::Byte
                | BuiltinType::Real
                | BuiltinType::Sint
                | BuiltinType::Uint
        )
    }

    /// Operand of `& | ^ << >> ~`.
    pub fn is_bitwise(self) -> bool {
        matches!(self, BuiltinType::Byte | BuiltinType::Uint)
    }

    /// Operand of unary `-`.
    pub fn is_signed(self) -> bool {
        matches!(self, BuiltinType::Real | BuiltinType::Sint)
    }

    /// Valid array subscript.
    pub fn is_index(self) -> bool {
        matches!(self, BuiltinType::Sint | BuiltinType::Uint)
    }

    /// Size in bytes of the runtime representation.
    pub fn size(self) -> u64 {
        match self {
            BuiltinType::Void => 0,
            BuiltinType::Bool | BuiltinType::Byte => 1,
            BuiltinType::Char => 4,
            BuiltinType::Real | BuiltinType::Sint | BuiltinType::Uint => 8,
        }
    }
}

/// A semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Builtin(BuiltinType),
    /// `[T]`, a refcounted heap array.
    Array(TypeId),
    /// A function or closure value.
    Func {
        params: Vec<(Referenceness, TypeId)>,
        ret: TypeId,
    },
    Struct(SymbolId),
    Enum(SymbolId),
    /// A host type with a fixed layout.
    User(SymbolId),
    /// A reference through a type alias; weak aliases unwrap, strong ones do not.
    Alias(SymbolId),
    /// The not-yet-deduced return type of a function under analysis.
    Pending(SymbolId),
}

/// Interned semantic types.
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<Ty>,
    ids: HashMap<Ty, TypeId>,
}

impl TypeTable {
    /// Create a table with every builtin pre-interned.
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            ids: HashMap::new(),
        };
        for builtin in BuiltinType::ALL {
            table.intern(Ty::Builtin(builtin));
        }
        table
    }

    /// Intern a type, returning the existing id for an identical one.
    pub fn intern(&mut self, ty: Ty) -> TypeId {
        if let Some(&id) = self.ids.get(&ty) {
            return id;
        }
        let id = TypeId::from_usize(self.types.len());
        self.types.push(ty.clone());
        self.ids.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Ty {
        &self.types[id.index()]
    }

    /// The id of `ty` if it has been interned.
    pub fn find(&self, ty: &Ty) -> Option<TypeId> {
        self.ids.get(ty).copied()
    }

    /// The id of a builtin type.
    pub fn builtin(&self, builtin: BuiltinType) -> TypeId {
        let position = BuiltinType::ALL
            .iter()
            .position(|&b| b == builtin)
            .unwrap_or(0);
        TypeId::from_usize(position)
    }

    /// The builtin behind `id`, if it is one.
    pub fn as_builtin(&self, id: TypeId) -> Option<BuiltinType> {
        match self.get(id) {
            Ty::Builtin(b) => Some(*b),
            _ => None,
        }
    }

    pub fn void(&self) -> TypeId {
        self.builtin(BuiltinType::Void)
    }

    pub fn bool(&self) -> TypeId {
        self.builtin(BuiltinType::Bool)
    }

    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        self.intern(Ty::Array(element))
    }

    pub fn func(&mut self, params: Vec<(Referenceness, TypeId)>, ret: TypeId) -> TypeId {
        self.intern(Ty::Func { params, ret })
    }

    /// Whether `id` is the pending return type of some function.
    pub fn pending_of(&self, id: TypeId) -> Option<SymbolId> {
        match self.get(id) {
            Ty::Pending(func) => Some(*func),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The type of an expression together with how it may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprType {
    pub ty: TypeId,
    pub mutability: Mutability,
    pub referenceness: Referenceness,
}

impl ExprType {
    pub fn new(ty: TypeId, mutability: Mutability, referenceness: Referenceness) -> Self {
        Self {
            ty,
            mutability,
            referenceness,
        }
    }

    /// A fresh `(let, val)` value.
    pub fn value(ty: TypeId) -> Self {
        Self::new(ty, Mutability::Let, Referenceness::Val)
    }

    /// Storage named by a declaration.
    pub fn named(ty: TypeId, mutability: Mutability) -> Self {
        Self::new(ty, mutability, Referenceness::Ref)
    }

    /// Combine with another, keeping the more restrictive mutability and
    /// referenceness of the two.
    pub fn restrict(self, other_mutability: Mutability, other_ref: Referenceness) -> Self {
        Self {
            ty: self.ty,
            mutability: self.mutability.min(other_mutability),
            referenceness: self.referenceness.min(other_ref),
        }
    }

    /// Whether this denotes writable storage.
    pub fn is_assignable(self) -> bool {
        self.mutability == Mutability::Var && self.referenceness == Referenceness::Ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_preinterned() {
        let mut table = TypeTable::new();
        for builtin in BuiltinType::ALL {
            let id = table.builtin(builtin);
            assert_eq!(table.get(id), &Ty::Builtin(builtin));
            assert_eq!(table.intern(Ty::Builtin(builtin)), id);
        }
    }

    #[test]
    fn test_interning_is_structural() {
        let mut table = TypeTable::new();
        let sint = table.builtin(BuiltinType::Sint);
        let a = table.array_of(sint);
        let b = table.array_of(sint);
        assert_eq!(a, b);
        let f = table.func(vec![(Referenceness::Ref, a)], sint);
        let g = table.func(vec![(Referenceness::Val, a)], sint);
        assert_ne!(f, g);
    }

    #[test]
    fn test_restrict_keeps_most_restrictive() {
        let table = TypeTable::new();
        let t = table.bool();
        let var_ref = ExprType::named(t, Mutability::Var);
        assert!(var_ref.is_assignable());
        let combined = var_ref.restrict(Mutability::Let, Referenceness::Ref);
        assert_eq!(combined.mutability, Mutability::Let);
        assert_eq!(combined.referenceness, Referenceness::Ref);
        let temp = ExprType::value(t).restrict(Mutability::Var, Referenceness::Ref);
        assert!(!temp.is_assignable());
    }
}

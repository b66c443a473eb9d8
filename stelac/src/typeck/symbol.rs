//! Symbols: everything a name can resolve to.
//!
//! Symbols are created once, stored in the [`SymbolTable`] for the whole
//! compilation and never removed. Scopes hold [`SymbolId`]s only.

use crate::ast::{Access, FuncKind, Name};
use crate::def::{DeclId, ExprId, ScopeId, SymbolId, TypeId};
use crate::span::Span;

use super::types::{BuiltinType, ExprType};

/// A named entity.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: Name,
    pub span: Span,
    pub kind: SymbolKind,
    /// The scope the symbol was declared in.
    pub scope: ScopeId,
    /// Whether anything referenced the symbol.
    pub used: bool,
    /// Declared by a host-bound module.
    pub external: bool,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    BuiltinType(BuiltinType),
    Struct(StructInfo),
    Enum(EnumInfo),
    Alias(AliasInfo),
    UserType(UserTypeInfo),
    /// A variable, parameter or global.
    Object(ObjectInfo),
    /// A struct field.
    Field(FieldInfo),
    EnumCase(EnumCaseInfo),
    Func(FuncInfo),
    /// A closure expression.
    Lambda(LambdaInfo),
    BuiltinFn(BuiltinFn),
    /// An imported module's namespace.
    Module { scope: ScopeId },
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub decl: DeclId,
    /// Member scope; rows are kept in declaration order.
    pub scope: ScopeId,
    /// Field symbols in declaration order.
    pub fields: Vec<SymbolId>,
    /// The nominal type of the struct.
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub decl: DeclId,
    pub scope: ScopeId,
    pub ty: TypeId,
}

/// Resolution progress of an alias target, used to detect alias cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasState {
    Unresolved,
    Resolving,
    Resolved(TypeId),
}

#[derive(Debug, Clone)]
pub struct AliasInfo {
    pub decl: DeclId,
    pub strong: bool,
    pub target: AliasState,
    /// The type naming this alias.
    pub ty: TypeId,
}

impl AliasInfo {
    pub fn target(&self) -> Option<TypeId> {
        match self.target {
            AliasState::Resolved(ty) => Some(ty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserTypeInfo {
    pub decl: DeclId,
    pub size: u64,
    pub align: u64,
    /// `(name, type, byte offset)` in declaration order.
    pub fields: Vec<(Name, TypeId, u64)>,
    pub ty: TypeId,
}

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectOrigin {
    Global,
    Local,
    Param,
    /// The receiver of a member function.
    Receiver,
}

#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Declared type and mutability; always `ref` when named.
    pub ty: ExprType,
    pub origin: ObjectOrigin,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub owner: SymbolId,
    pub ty: TypeId,
    pub access: Access,
    /// Position among the owner's fields.
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct EnumCaseInfo {
    pub owner: SymbolId,
    pub value: i64,
}

/// Analysis progress of a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyState {
    Unchecked,
    InProgress,
    Done,
}

#[derive(Debug, Clone)]
pub struct FuncInfo {
    pub decl: DeclId,
    /// Parameter types with their declared mutability and referenceness.
    pub params: Vec<ExprType>,
    /// The return type, once annotated or deduced.
    pub ret: Option<TypeId>,
    pub kind: FuncKind,
    pub access: Access,
    /// The struct a member or static function belongs to.
    pub owner: Option<SymbolId>,
    pub state: BodyState,
    /// The function's own scope, once its body has been entered.
    pub body_scope: Option<ScopeId>,
}

impl FuncInfo {
    /// Whether the function is reached through its struct's type name.
    pub fn is_static(&self) -> bool {
        self.kind == FuncKind::Static
    }
}

/// Where a closure gets a captured value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// Directly from the enclosing body's local.
    Local,
    /// From the given capture slot of the enclosing closure.
    Parent(usize),
}

/// One captured value of a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosureCap {
    pub source: SymbolId,
    pub via: CaptureSource,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct LambdaInfo {
    pub expr: ExprId,
    pub params: Vec<ExprType>,
    pub ret: Option<TypeId>,
    /// Captures in heap-record order.
    pub captures: Vec<ClosureCap>,
    /// The closure this one is nested in, if any.
    pub parent: Option<SymbolId>,
    pub scope: ScopeId,
}

/// The builtin functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFn {
    Len,
    Push,
    Pop,
    Print,
}

impl BuiltinFn {
    pub const ALL: [BuiltinFn; 4] = [BuiltinFn::Len, BuiltinFn::Push, BuiltinFn::Pop, BuiltinFn::Print];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinFn::Len => "len",
            BuiltinFn::Push => "push",
            BuiltinFn::Pop => "pop",
            BuiltinFn::Print => "print",
        }
    }
}

impl SymbolKind {
    /// A short noun for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            SymbolKind::BuiltinType(_) => "builtin type",
            SymbolKind::Struct(_) => "struct",
            SymbolKind::Enum(_) => "enum",
            SymbolKind::Alias(_) => "type alias",
            SymbolKind::UserType(_) => "host type",
            SymbolKind::Object(_) => "variable",
            SymbolKind::Field(_) => "field",
            SymbolKind::EnumCase(_) => "enum case",
            SymbolKind::Func(_) => "function",
            SymbolKind::Lambda(_) => "closure",
            SymbolKind::BuiltinFn(_) => "builtin function",
            SymbolKind::Module { .. } => "module",
        }
    }

    /// Whether the symbol names a type.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            SymbolKind::BuiltinType(_)
                | SymbolKind::Struct(_)
                | SymbolKind::Enum(_)
                | SymbolKind::Alias(_)
                | SymbolKind::UserType(_)
        )
    }

    /// Whether several symbols may share this symbol's name in one scope.
    pub fn is_overloadable(&self) -> bool {
        matches!(self, SymbolKind::Func(_) | SymbolKind::BuiltinFn(_))
    }
}

/// Owner of every symbol in a compilation.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, name: Name, span: Span, kind: SymbolKind, scope: ScopeId) -> SymbolId {
        self.symbols.push(Symbol {
            name,
            span,
            kind,
            scope,
            used: false,
            external: false,
        });
        SymbolId::from_usize(self.symbols.len() - 1)
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn mark_used(&mut self, id: SymbolId) {
        self.symbols[id.index()].used = true;
    }

    pub fn func(&self, id: SymbolId) -> Option<&FuncInfo> {
        match &self.get(id).kind {
            SymbolKind::Func(info) => Some(info),
            _ => None,
        }
    }

    pub fn func_mut(&mut self, id: SymbolId) -> Option<&mut FuncInfo> {
        match &mut self.get_mut(id).kind {
            SymbolKind::Func(info) => Some(info),
            _ => None,
        }
    }

    pub fn lambda(&self, id: SymbolId) -> Option<&LambdaInfo> {
        match &self.get(id).kind {
            SymbolKind::Lambda(info) => Some(info),
            _ => None,
        }
    }

    pub fn lambda_mut(&mut self, id: SymbolId) -> Option<&mut LambdaInfo> {
        match &mut self.get_mut(id).kind {
            SymbolKind::Lambda(info) => Some(info),
            _ => None,
        }
    }

    /// Iterate over every symbol with its id.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId::from_usize(i), s))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

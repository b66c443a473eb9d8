//! Abstract Syntax Tree for STELA.
//!
//! The AST is an arena: every expression, statement, declaration and type
//! expression lives in a vector owned by [`Ast`] and is referred to by an
//! index handle from [`crate::def`]. One `Ast` is shared by every module of a
//! compilation, so a declaration in one module can be referenced from another
//! by index alone.
//!
//! Nodes that name something carry a [`Resolved`] slot. Semantic analysis
//! fills the slot exactly once; later visits read the memoized answer.
//!
//! # Structure
//!
//! - [`Module`] - name, imports and top-level declarations
//! - [`Decl`] - functions, structs, enums, type aliases, globals, host types
//! - [`Stmt`] - statements inside function and closure bodies
//! - [`Expr`] - expressions
//! - [`TypeExpr`] - syntactic type references

use std::cell::OnceCell;
use std::fmt;

use string_interner::{DefaultStringInterner, DefaultSymbol};

use crate::def::{DeclId, ExprId, StmtId, SymbolId, TypeExprId, TypeId};
use crate::span::{FileId, Span};

/// An interned identifier.
pub type Name = DefaultSymbol;

/// An identifier together with where it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    pub name: Name,
    pub span: Span,
}

/// A slot that is filled at most once during semantic analysis.
pub struct Resolved<T: Copy>(OnceCell<T>);

impl<T: Copy + PartialEq + fmt::Debug> Resolved<T> {
    pub fn new() -> Self {
        Self(OnceCell::new())
    }

    /// The memoized value, if analysis has filled it.
    pub fn get(&self) -> Option<T> {
        self.0.get().copied()
    }

    /// Fill the slot. A second fill must agree with the first.
    pub fn set(&self, value: T) {
        if let Err(value) = self.0.set(value) {
            debug_assert_eq!(self.get(), Some(value), "resolved slot set twice with different values");
        }
    }

    /// Return the memoized value or compute and store it.
    pub fn get_or_try_init<E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let value = f()?;
        self.set(value);
        Ok(value)
    }
}

impl<T: Copy + PartialEq + fmt::Debug> Default for Resolved<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Resolved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.get() {
            Some(value) => write!(f, "Resolved({value:?})"),
            None => write!(f, "Unresolved"),
        }
    }
}

/// Whether a binding may be written through.
///
/// Ordered so that the more restrictive value compares smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mutability {
    Let,
    Var,
}

impl Mutability {
    pub fn as_str(self) -> &'static str {
        match self {
            Mutability::Let => "let",
            Mutability::Var => "var",
        }
    }
}

/// Whether a value denotes existing storage (`Ref`) or a fresh value (`Val`).
///
/// Ordered so that the more restrictive value compares smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Referenceness {
    Val,
    Ref,
}

impl Referenceness {
    pub fn as_str(self) -> &'static str {
        match self {
            Referenceness::Val => "val",
            Referenceness::Ref => "ref",
        }
    }
}

/// Member visibility inside a struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Public,
    Private,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

/// Integer literal suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSuffix {
    None,
    Uint,
    Byte,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int { value: u64, suffix: IntSuffix },
    Real(f64),
    Char(char),
    Bool(bool),
    Str(String),
}

// ============================================================
// Types
// ============================================================

/// A syntactic type reference.
#[derive(Debug)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
    /// The type symbol a `Named` reference resolved to.
    pub resolved: Resolved<SymbolId>,
    /// The semantic type this reference lowers to.
    pub lowered: Resolved<TypeId>,
}

#[derive(Debug)]
pub enum TypeExprKind {
    /// `sint`, `Point`, or module-qualified `geo.Point`.
    Named(Vec<Ident>),
    /// `[T]`
    Array(TypeExprId),
    /// `func(ref T, U) -> R`; a missing return type means `void`.
    Func {
        params: Vec<(Referenceness, TypeExprId)>,
        ret: Option<TypeExprId>,
    },
}

// ============================================================
// Expressions
// ============================================================

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// The symbol an identifier, member or call resolved to.
    pub resolved: Resolved<SymbolId>,
}

#[derive(Debug)]
pub enum ExprKind {
    Literal(Literal),
    Ident(Ident),
    Member {
        object: ExprId,
        member: Ident,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Index {
        base: ExprId,
        index: ExprId,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    Ternary {
        cond: ExprId,
        then_expr: ExprId,
        else_expr: ExprId,
    },
    Array(Vec<ExprId>),
    Closure(Box<FuncSig>),
}

/// Parameter list, return type and body shared by named functions and closures.
#[derive(Debug)]
pub struct FuncSig {
    pub params: Vec<Param>,
    pub ret: Option<TypeExprId>,
    /// `None` for host-bound (`extern`) functions.
    pub body: Option<Vec<StmtId>>,
}

#[derive(Debug)]
pub struct Param {
    pub name: Ident,
    pub mutability: Mutability,
    pub referenceness: Referenceness,
    pub ty: TypeExprId,
    pub span: Span,
    pub resolved: Resolved<SymbolId>,
}

// ============================================================
// Statements
// ============================================================

#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// `let x: T = e;` / `var x = e;`, both as statements and module globals.
#[derive(Debug)]
pub struct LocalDecl {
    pub mutability: Mutability,
    pub name: Ident,
    pub ty: Option<TypeExprId>,
    pub init: Option<ExprId>,
    pub resolved: Resolved<SymbolId>,
}

#[derive(Debug)]
pub enum StmtKind {
    Local(LocalDecl),
    /// `target = value` or `target op= value`.
    Assign {
        target: ExprId,
        op: Option<BinOp>,
        value: ExprId,
    },
    Expr(ExprId),
    If {
        cond: ExprId,
        then_body: Vec<StmtId>,
        else_body: Option<Vec<StmtId>>,
    },
    While {
        cond: ExprId,
        body: Vec<StmtId>,
    },
    Return(Option<ExprId>),
    Break,
    Continue,
    Block(Vec<StmtId>),
    /// A named function declared inside a body.
    Func(DeclId),
}

// ============================================================
// Declarations
// ============================================================

#[derive(Debug)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
    pub resolved: Resolved<SymbolId>,
}

#[derive(Debug)]
pub enum DeclKind {
    Func(FuncDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Alias(AliasDecl),
    Global(LocalDecl),
    /// A host type bound from outside STELA with a fixed layout.
    UserType(UserTypeDecl),
}

/// How a function relates to an enclosing struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    /// A free function.
    Free,
    /// `static func` inside a struct.
    Static,
    /// A member function; the receiver `self` has the given mutability.
    Method(Mutability),
}

#[derive(Debug)]
pub struct FuncDecl {
    pub name: Ident,
    pub sig: FuncSig,
    pub kind: FuncKind,
    pub access: Access,
}

#[derive(Debug)]
pub struct StructDecl {
    pub name: Ident,
    pub members: Vec<StructMember>,
}

#[derive(Debug)]
pub enum StructMember {
    Field(FieldDecl),
    Func(DeclId),
}

#[derive(Debug)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExprId,
    pub access: Access,
    pub span: Span,
}

#[derive(Debug)]
pub struct EnumDecl {
    pub name: Ident,
    pub cases: Vec<EnumCase>,
}

#[derive(Debug)]
pub struct EnumCase {
    pub name: Ident,
    pub value: Option<i64>,
}

/// `type A = T;` (weak) or `type A T;` (strong).
#[derive(Debug)]
pub struct AliasDecl {
    pub name: Ident,
    pub target: TypeExprId,
    pub strong: bool,
}

#[derive(Debug)]
pub struct UserTypeDecl {
    pub name: Ident,
    pub size: u64,
    pub align: u64,
    pub fields: Vec<UserField>,
}

#[derive(Debug)]
pub struct UserField {
    pub name: Ident,
    pub ty: TypeExprId,
    pub offset: u64,
}

impl DeclKind {
    /// The declared name.
    pub fn name(&self) -> Ident {
        match self {
            DeclKind::Func(f) => f.name,
            DeclKind::Struct(s) => s.name,
            DeclKind::Enum(e) => e.name,
            DeclKind::Alias(a) => a.name,
            DeclKind::Global(g) => g.name,
            DeclKind::UserType(u) => u.name,
        }
    }
}

// ============================================================
// Modules and the arena
// ============================================================

/// A compilation unit.
#[derive(Debug)]
pub struct Module {
    pub name: Ident,
    pub imports: Vec<Ident>,
    pub decls: Vec<DeclId>,
    pub file: FileId,
}

/// Names semantic analysis looks up without source text to intern them from.
const PREDEFINED_NAMES: &[&str] = &[
    "void", "bool", "char", "byte", "real", "sint", "uint", "len", "push", "pop", "print",
    "self", "main", "<closure>",
];

/// The node arena shared by every module of a compilation.
#[derive(Debug)]
pub struct Ast {
    interner: DefaultStringInterner,
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    decls: Vec<Decl>,
    type_exprs: Vec<TypeExpr>,
}

impl Ast {
    pub fn new() -> Self {
        let mut interner = DefaultStringInterner::new();
        for name in PREDEFINED_NAMES {
            interner.get_or_intern(name);
        }
        Self {
            interner,
            exprs: Vec::new(),
            stmts: Vec::new(),
            decls: Vec::new(),
            type_exprs: Vec::new(),
        }
    }

    /// A name interned when the arena was created.
    pub fn predefined(&self, name: &'static str) -> Name {
        debug_assert!(PREDEFINED_NAMES.contains(&name), "`{name}` is not predefined");
        match self.interner.get(name) {
            Some(symbol) => symbol,
            None => unreachable!("predefined names are interned in Ast::new"),
        }
    }

    /// Intern an identifier.
    pub fn intern(&mut self, name: &str) -> Name {
        self.interner.get_or_intern(name)
    }

    /// Look up an identifier without interning it.
    pub fn lookup_name(&self, name: &str) -> Option<Name> {
        self.interner.get(name)
    }

    /// The text of an interned identifier.
    pub fn name(&self, symbol: Name) -> &str {
        self.interner.resolve(symbol).unwrap_or("<?>")
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.exprs.push(Expr {
            kind,
            span,
            resolved: Resolved::new(),
        });
        ExprId::from_usize(self.exprs.len() - 1)
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.stmts.push(Stmt { kind, span });
        StmtId::from_usize(self.stmts.len() - 1)
    }

    pub fn alloc_decl(&mut self, kind: DeclKind, span: Span) -> DeclId {
        self.decls.push(Decl {
            kind,
            span,
            resolved: Resolved::new(),
        });
        DeclId::from_usize(self.decls.len() - 1)
    }

    pub fn alloc_type(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.type_exprs.push(TypeExpr {
            kind,
            span,
            resolved: Resolved::new(),
            lowered: Resolved::new(),
        });
        TypeExprId::from_usize(self.type_exprs.len() - 1)
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn type_expr(&self, id: TypeExprId) -> &TypeExpr {
        &self.type_exprs[id.index()]
    }

    /// Number of expression nodes allocated so far.
    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    /// The function declaration behind `id`, if it is one.
    pub fn func_decl(&self, id: DeclId) -> Option<&FuncDecl> {
        match &self.decl(id).kind {
            DeclKind::Func(func) => Some(func),
            _ => None,
        }
    }
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

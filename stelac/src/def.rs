//! Stable index handles used across the compiler.
//!
//! Every long-lived entity (AST node, scope, symbol, semantic type) lives in
//! an arena owned by the compilation and is referred to by one of these
//! copyable indices. Back-references are plain indices, so there are no
//! ownership cycles between the AST and the semantic tables.

use std::fmt;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Create an index from its raw position.
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// The raw position of this index.
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_usize(index: usize) -> Self {
                Self(u32::try_from(index).expect("arena index overflow"))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_index!(
    /// An expression node in the AST arena.
    ExprId,
    "e"
);
define_index!(
    /// A statement node in the AST arena.
    StmtId,
    "s"
);
define_index!(
    /// A declaration node in the AST arena.
    DeclId,
    "d"
);
define_index!(
    /// A syntactic type expression in the AST arena.
    TypeExprId,
    "t"
);
define_index!(
    /// A scope in the scope graph.
    ScopeId,
    "scope"
);
define_index!(
    /// A symbol in the symbol table.
    SymbolId,
    "sym"
);
define_index!(
    /// An interned semantic type in the type table.
    TypeId,
    "ty"
);

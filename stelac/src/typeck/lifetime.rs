//! Value lifetime classification for STELA.
//!
//! Every concrete type falls in one [`TypeCategory`], which decides how its
//! values are constructed, copied, moved and destroyed:
//!
//! - **Trivially copyable** - builtins and enums. Copies are bitwise,
//!   destruction does nothing.
//! - **Trivially relocatable** - arrays and closures. A value is a single
//!   owning pointer to a refcounted heap block (`{refcount, cap, len, data}`
//!   for arrays, `{refcount, dtor, fn, env...}` for closures), so a move is a
//!   pointer transfer and a copy bumps the refcount.
//! - **Nontrivial** - structs and host types. Every operation recurses into
//!   the fields. Structs are nontrivial even when all their fields are
//!   trivially copyable.
//!
//! # Relocation Elision
//!
//! When the source of an initialization or assignment is a temporary, the
//! move and the destruction of the moved-from temporary collapse into one
//! relocation: the destination simply takes over the source storage.

use crate::ast::Name;
use crate::def::TypeId;

use super::compare::representation;
use super::symbol::{SymbolKind, SymbolTable};
use super::types::{Ty, TypeTable};

/// How values of a type behave under construction, copy, move and destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    TriviallyCopyable,
    TriviallyRelocatable,
    Nontrivial,
}

/// Classify a resolved type. Strong aliases classify as their representation.
pub fn classify(types: &TypeTable, symbols: &SymbolTable, ty: TypeId) -> TypeCategory {
    match types.get(representation(types, symbols, ty)) {
        Ty::Builtin(_) | Ty::Enum(_) => TypeCategory::TriviallyCopyable,
        Ty::Array(_) | Ty::Func { .. } => TypeCategory::TriviallyRelocatable,
        Ty::Struct(_) | Ty::User(_) => TypeCategory::Nontrivial,
        // Unresolved shapes never reach code generation; stay conservative.
        Ty::Alias(_) | Ty::Pending(_) => TypeCategory::Nontrivial,
    }
}

/// A lifetime operation that may need a generated helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifetimeOp {
    DefConstruct,
    CopyConstruct,
    MoveConstruct,
    CopyAssign,
    MoveAssign,
    Destroy,
}

impl LifetimeOp {
    pub const ALL: [LifetimeOp; 6] = [
        LifetimeOp::DefConstruct,
        LifetimeOp::CopyConstruct,
        LifetimeOp::MoveConstruct,
        LifetimeOp::CopyAssign,
        LifetimeOp::MoveAssign,
        LifetimeOp::Destroy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LifetimeOp::DefConstruct => "def_construct",
            LifetimeOp::CopyConstruct => "copy_construct",
            LifetimeOp::MoveConstruct => "move_construct",
            LifetimeOp::CopyAssign => "copy_assign",
            LifetimeOp::MoveAssign => "move_assign",
            LifetimeOp::Destroy => "destroy",
        }
    }
}

/// The refcounted heap block behind a relocatable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Array { element: TypeId },
    Closure,
}

/// One field visited by a recursive plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldStep {
    pub name: Name,
    pub ty: TypeId,
    /// Byte offset for host types; struct fields are addressed by position.
    pub offset: Option<u64>,
}

/// What the helper for one (operation, type) pair does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifetimePlan {
    /// Nothing to do.
    Noop,
    /// Store zero.
    Zero { size: u64 },
    /// Copy the bytes.
    BitCopy { size: u64 },
    /// Store a null handle.
    EmptyHandle,
    /// Share the source block: copy the pointer and increment the refcount.
    Retain,
    /// Take the source block and leave the source empty.
    Transfer,
    /// Retain the source, release the old destination block, then share.
    RetainAssign,
    /// Release the old destination block, then take the source block.
    TransferAssign,
    /// Decrement the refcount; at zero destroy the contents and free.
    Release(HandleKind),
    /// Apply the same operation to every field in order.
    Fields(Vec<FieldStep>),
}

const ENUM_SIZE: u64 = 8;

/// Dispatch `op` on the concrete shape of `ty`.
pub fn plan(types: &TypeTable, symbols: &SymbolTable, op: LifetimeOp, ty: TypeId) -> LifetimePlan {
    let repr = representation(types, symbols, ty);
    let handle = match types.get(repr) {
        Ty::Builtin(b) => return scalar_plan(op, b.size()),
        Ty::Enum(_) => return scalar_plan(op, ENUM_SIZE),
        Ty::Array(element) => HandleKind::Array { element: *element },
        Ty::Func { .. } => HandleKind::Closure,
        Ty::Struct(strukt) => {
            let steps = match &symbols.get(*strukt).kind {
                SymbolKind::Struct(info) => info
                    .fields
                    .iter()
                    .filter_map(|&field| {
                        let symbol = symbols.get(field);
                        match &symbol.kind {
                            SymbolKind::Field(f) => Some(FieldStep {
                                name: symbol.name,
                                ty: f.ty,
                                offset: None,
                            }),
                            _ => None,
                        }
                    })
                    .collect(),
                _ => Vec::new(),
            };
            return LifetimePlan::Fields(steps);
        }
        Ty::User(user) => {
            let steps = match &symbols.get(*user).kind {
                SymbolKind::UserType(info) => info
                    .fields
                    .iter()
                    .map(|&(name, ty, offset)| FieldStep {
                        name,
                        ty,
                        offset: Some(offset),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            return LifetimePlan::Fields(steps);
        }
        Ty::Alias(_) | Ty::Pending(_) => return LifetimePlan::Noop,
    };

    match op {
        LifetimeOp::DefConstruct => LifetimePlan::EmptyHandle,
        LifetimeOp::CopyConstruct => LifetimePlan::Retain,
        LifetimeOp::MoveConstruct => LifetimePlan::Transfer,
        LifetimeOp::CopyAssign => LifetimePlan::RetainAssign,
        LifetimeOp::MoveAssign => LifetimePlan::TransferAssign,
        LifetimeOp::Destroy => LifetimePlan::Release(handle),
    }
}

fn scalar_plan(op: LifetimeOp, size: u64) -> LifetimePlan {
    match op {
        LifetimeOp::DefConstruct => LifetimePlan::Zero { size },
        LifetimeOp::Destroy => LifetimePlan::Noop,
        _ => LifetimePlan::BitCopy { size },
    }
}

/// Whether a value source names existing storage or is a temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Named,
    Temporary,
}

/// How a value gets from its source into its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transfer {
    BitCopy,
    CopyConstruct,
    CopyAssign,
    /// The destination takes over the temporary's storage.
    Relocate,
    /// Destroy the old destination, then take over the temporary's storage.
    RelocateAssign,
    /// Move, then destroy the moved-from temporary.
    MoveConstruct,
    /// Move-assign, then destroy the moved-from temporary.
    MoveAssign,
}

impl Transfer {
    /// Whether the moved-from source is destroyed right after the transfer.
    pub fn destroys_source(self) -> bool {
        matches!(self, Transfer::MoveConstruct | Transfer::MoveAssign)
    }

    /// The helpers code generation needs to carry out this transfer.
    pub fn helper_ops(self) -> &'static [LifetimeOp] {
        match self {
            Transfer::BitCopy | Transfer::Relocate => &[],
            Transfer::CopyConstruct => &[LifetimeOp::CopyConstruct],
            Transfer::CopyAssign => &[LifetimeOp::CopyAssign],
            Transfer::RelocateAssign => &[LifetimeOp::Destroy],
            Transfer::MoveConstruct => &[LifetimeOp::MoveConstruct, LifetimeOp::Destroy],
            Transfer::MoveAssign => &[LifetimeOp::MoveAssign, LifetimeOp::Destroy],
        }
    }
}

/// Plan the transfer of a value of `category` from `source`.
///
/// `assign` selects assignment into live storage over initialization of
/// fresh storage; `elide` enables relocation of temporaries.
pub fn plan_transfer(category: TypeCategory, source: ValueKind, assign: bool, elide: bool) -> Transfer {
    match (category, source) {
        (TypeCategory::TriviallyCopyable, _) => Transfer::BitCopy,
        (_, ValueKind::Named) if assign => Transfer::CopyAssign,
        (_, ValueKind::Named) => Transfer::CopyConstruct,
        (_, ValueKind::Temporary) => match (assign, elide) {
            (false, true) => Transfer::Relocate,
            (true, true) => Transfer::RelocateAssign,
            (false, false) => Transfer::MoveConstruct,
            (true, false) => Transfer::MoveAssign,
        },
    }
}

//! Type layout for code generation.
//!
//! Builtins have their natural size. Enums are stored as a 64-bit tag.
//! Arrays and function values are one pointer to a refcounted block.
//! Struct fields are laid out in declaration order with natural alignment.
//! Host types carry their own size, alignment and field offsets.

use crate::def::TypeId;
use crate::typeck::compare::representation;
use crate::typeck::symbol::{SymbolKind, SymbolTable};
use crate::typeck::types::{Ty, TypeTable};

/// Size of a handle to a refcounted heap block.
pub const POINTER_SIZE: u64 = 8;
/// Size of an enum value.
pub const ENUM_SIZE: u64 = 8;

/// Size and alignment of a type, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
}

impl Layout {
    const fn scalar(size: u64) -> Self {
        Self { size, align: size }
    }
}

/// The layout of a resolved type.
pub fn layout_of(types: &TypeTable, symbols: &SymbolTable, ty: TypeId) -> Layout {
    match types.get(representation(types, symbols, ty)) {
        // `void` has no storage but still aligns to a byte.
        Ty::Builtin(b) => Layout {
            size: b.size(),
            align: b.size().max(1),
        },
        Ty::Enum(_) => Layout::scalar(ENUM_SIZE),
        Ty::Array(_) | Ty::Func { .. } => Layout::scalar(POINTER_SIZE),
        Ty::Struct(_) => {
            let offsets = field_offsets(types, symbols, ty);
            let align = offsets.iter().map(|&(_, l)| l.align).max().unwrap_or(1);
            let end = offsets.last().map_or(0, |&(offset, l)| offset + l.size);
            Layout {
                size: align_to(end, align),
                align,
            }
        }
        Ty::User(user) => match &symbols.get(*user).kind {
            SymbolKind::UserType(info) => Layout {
                size: info.size,
                align: info.align.max(1),
            },
            _ => Layout::scalar(1),
        },
        Ty::Alias(_) | Ty::Pending(_) => Layout::scalar(1),
    }
}

/// Offset and layout of every field of a struct or host type, in order.
pub fn field_offsets(types: &TypeTable, symbols: &SymbolTable, ty: TypeId) -> Vec<(u64, Layout)> {
    match types.get(representation(types, symbols, ty)) {
        Ty::Struct(strukt) => {
            let SymbolKind::Struct(info) = &symbols.get(*strukt).kind else {
                return Vec::new();
            };
            let mut offset = 0;
            info.fields
                .iter()
                .filter_map(|&field| match &symbols.get(field).kind {
                    SymbolKind::Field(f) => Some(f.ty),
                    _ => None,
                })
                .map(|field_ty| {
                    let layout = layout_of(types, symbols, field_ty);
                    let start = align_to(offset, layout.align);
                    offset = start + layout.size;
                    (start, layout)
                })
                .collect()
        }
        Ty::User(user) => match &symbols.get(*user).kind {
            SymbolKind::UserType(info) => info
                .fields
                .iter()
                .map(|&(_, field_ty, offset)| (offset, layout_of(types, symbols, field_ty)))
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn align_to(offset: u64, align: u64) -> u64 {
    offset.div_ceil(align.max(1)) * align.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeck::types::BuiltinType;

    #[test]
    fn test_builtin_and_handle_layouts() {
        let mut types = TypeTable::new();
        let symbols = SymbolTable::new();
        let byte = types.builtin(BuiltinType::Byte);
        let arr = types.array_of(byte);
        assert_eq!(layout_of(&types, &symbols, byte), Layout { size: 1, align: 1 });
        assert_eq!(layout_of(&types, &symbols, arr), Layout { size: 8, align: 8 });
    }

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(0, 8), 0);
        assert_eq!(align_to(1, 8), 8);
        assert_eq!(align_to(9, 4), 12);
        assert_eq!(align_to(5, 0), 5);
    }
}

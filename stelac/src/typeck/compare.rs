//! Alias unwrapping and structural type equality.

use crate::def::{SymbolId, TypeId};

use super::symbol::{SymbolKind, SymbolTable};
use super::types::{Ty, TypeTable};

/// Unwrap weak aliases. A strong alias is a distinct nominal type and stays.
pub fn concrete(types: &TypeTable, symbols: &SymbolTable, mut ty: TypeId) -> TypeId {
    while let Ty::Alias(alias) = types.get(ty) {
        match &symbols.get(*alias).kind {
            SymbolKind::Alias(info) if !info.strong => match info.target() {
                Some(target) => ty = target,
                None => break,
            },
            _ => break,
        }
    }
    ty
}

/// Unwrap every alias, strong ones included, down to the representation.
pub fn representation(types: &TypeTable, symbols: &SymbolTable, mut ty: TypeId) -> TypeId {
    while let Ty::Alias(alias) = types.get(ty) {
        match &symbols.get(*alias).kind {
            SymbolKind::Alias(info) => match info.target() {
                Some(target) => ty = target,
                None => break,
            },
            _ => break,
        }
    }
    ty
}

/// The field symbols of a struct type symbol.
fn struct_fields(symbols: &SymbolTable, strukt: SymbolId) -> &[SymbolId] {
    match &symbols.get(strukt).kind {
        SymbolKind::Struct(info) => &info.fields,
        _ => &[],
    }
}

/// Structural type equality.
///
/// Comparison is coinductive: a pair already under comparison is assumed
/// equal, so recursive types terminate.
pub struct TypeComparer<'a> {
    types: &'a TypeTable,
    symbols: &'a SymbolTable,
    assumed: Vec<(TypeId, TypeId)>,
}

impl<'a> TypeComparer<'a> {
    pub fn new(types: &'a TypeTable, symbols: &'a SymbolTable) -> Self {
        Self {
            types,
            symbols,
            assumed: Vec::new(),
        }
    }

    /// Whether `a` and `b` denote the same type.
    pub fn compare(&mut self, a: TypeId, b: TypeId) -> bool {
        let a = concrete(self.types, self.symbols, a);
        let b = concrete(self.types, self.symbols, b);
        if a == b || self.assumed.contains(&(a, b)) {
            return true;
        }

        self.assumed.push((a, b));
        let equal = self.compare_shapes(a, b);
        self.assumed.pop();
        equal
    }

    fn compare_shapes(&mut self, a: TypeId, b: TypeId) -> bool {
        let (types, symbols) = (self.types, self.symbols);
        match (types.get(a), types.get(b)) {
            (Ty::Array(x), Ty::Array(y)) => self.compare(*x, *y),
            (
                Ty::Func {
                    params: pa,
                    ret: ra,
                },
                Ty::Func {
                    params: pb,
                    ret: rb,
                },
            ) => {
                pa.len() == pb.len()
                    && pa
                        .iter()
                        .zip(pb.iter())
                        .all(|(&(ref_a, ta), &(ref_b, tb))| ref_a == ref_b && self.compare(ta, tb))
                    && self.compare(*ra, *rb)
            }
            (Ty::Struct(s), Ty::Struct(t)) => {
                let (fs, ft) = (struct_fields(symbols, *s), struct_fields(symbols, *t));
                fs.len() == ft.len()
                    && fs.iter().zip(ft.iter()).all(|(&f, &g)| {
                        let (f, g) = (symbols.get(f), symbols.get(g));
                        match (&f.kind, &g.kind) {
                            (SymbolKind::Field(fi), SymbolKind::Field(gi)) => {
                                f.name == g.name && self.compare(fi.ty, gi.ty)
                            }
                            _ => false,
                        }
                    })
            }
            (Ty::User(s), Ty::User(t)) => {
                match (&symbols.get(*s).kind, &symbols.get(*t).kind) {
                    (SymbolKind::UserType(u), SymbolKind::UserType(v)) => {
                        u.size == v.size
                            && u.align == v.align
                            && u.fields.len() == v.fields.len()
                            && u.fields.iter().zip(v.fields.iter()).all(
                                |(&(na, ta, oa), &(nb, tb, ob))| {
                                    na == nb && oa == ob && self.compare(ta, tb)
                                },
                            )
                    }
                    _ => false,
                }
            }
            // Strong aliases, enums and builtins are nominal: equal only by id.
            _ => false,
        }
    }
}

/// Shorthand for a one-off comparison.
pub fn compare_types(types: &TypeTable, symbols: &SymbolTable, a: TypeId, b: TypeId) -> bool {
    TypeComparer::new(types, symbols).compare(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Referenceness;
    use crate::config::CompilerConfig;
    use crate::diagnostics::CollectingSink;
    use crate::project::Session;
    use crate::typeck::types::BuiltinType;
    use crate::typeck::Analysis;

    fn analyze(session: &Session) -> Analysis {
        let mut sink = CollectingSink::new();
        match session.check(&CompilerConfig::default(), &mut sink) {
            Ok(program) => program.analysis,
            Err(err) => panic!("analysis failed: {}", err.kind.message()),
        }
    }

    fn analyze_source(source: &str) -> (Session, Analysis) {
        let mut session = Session::new();
        session.add_source("main.stela", source).unwrap();
        let analysis = analyze(&session);
        (session, analysis)
    }

    /// The type declared under `name`.
    fn type_named(session: &Session, analysis: &Analysis, name: &str) -> TypeId {
        analysis
            .symbols
            .iter()
            .filter(|(_, symbol)| session.ast().name(symbol.name) == name)
            .find_map(|(_, symbol)| match &symbol.kind {
                SymbolKind::Struct(info) => Some(info.ty),
                SymbolKind::Enum(info) => Some(info.ty),
                SymbolKind::Alias(info) => Some(info.ty),
                SymbolKind::UserType(info) => Some(info.ty),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no type named `{name}`"))
    }

    #[test]
    fn test_every_type_equals_itself() {
        let (_, analysis) = analyze_source(
            r#"
            struct P { x: real; tags: [char]; }
            enum Color { Red, Green }
            type Weak = [P];
            type Strong func(ref sint) -> bool;
            func f(p: P, c: Color, w: Weak, s: Strong) -> [[uint]] { return []; }
            "#,
        );
        let types = &analysis.types;
        for index in 0..types.len() {
            let ty = TypeId::from_usize(index);
            assert!(compare_types(types, &analysis.symbols, ty, ty), "{:?}", types.get(ty));
        }
    }

    #[test]
    fn test_weak_alias_is_its_target_and_strong_alias_is_not() {
        let (session, analysis) = analyze_source("type Weak = sint;\ntype Strong sint;");
        let (types, symbols) = (&analysis.types, &analysis.symbols);
        let sint = types.builtin(BuiltinType::Sint);
        let weak = type_named(&session, &analysis, "Weak");
        let strong = type_named(&session, &analysis, "Strong");

        assert!(compare_types(types, symbols, weak, sint));
        assert!(!compare_types(types, symbols, strong, sint));
        assert!(!compare_types(types, symbols, strong, weak));
        assert_eq!(representation(types, symbols, strong), sint);
        assert_eq!(concrete(types, symbols, strong), strong);
    }

    #[test]
    fn test_structs_compare_ordered_named_fields() {
        let (session, analysis) = analyze_source(
            r#"
            struct A { x: sint; y: [real]; }
            struct B { x: sint; y: [real]; }
            struct Swapped { y: [real]; x: sint; }
            struct Renamed { a: sint; y: [real]; }
            struct Longer { x: sint; y: [real]; z: bool; }
            "#,
        );
        let (types, symbols) = (&analysis.types, &analysis.symbols);
        let a = type_named(&session, &analysis, "A");
        assert!(compare_types(types, symbols, a, type_named(&session, &analysis, "B")));
        for other in ["Swapped", "Renamed", "Longer"] {
            let other = type_named(&session, &analysis, other);
            assert!(!compare_types(types, symbols, a, other));
        }
    }

    #[test]
    fn test_enums_are_nominal() {
        let (session, analysis) = analyze_source("enum E { A, B }\nenum F { A, B }");
        let e = type_named(&session, &analysis, "E");
        let f = type_named(&session, &analysis, "F");
        assert!(!compare_types(&analysis.types, &analysis.symbols, e, f));
    }

    #[test]
    fn test_host_types_compare_layout_and_fields() {
        let mut session = Session::new();
        session
            .external("host")
            .user_type("Vec2", 16, 8, &[("x", "real", 0), ("y", "real", 8)])
            .user_type("Point", 16, 8, &[("x", "real", 0), ("y", "real", 8)])
            .user_type("Padded", 24, 8, &[("x", "real", 0), ("y", "real", 8)])
            .user_type("Packed", 16, 4, &[("x", "real", 0), ("y", "real", 8)])
            .user_type("Shifted", 16, 8, &[("x", "real", 8), ("y", "real", 0)])
            .user_type("Mixed", 16, 8, &[("x", "real", 0), ("y", "sint", 8)])
            .finish()
            .unwrap();
        let analysis = analyze(&session);
        let (types, symbols) = (&analysis.types, &analysis.symbols);

        let vec2 = type_named(&session, &analysis, "Vec2");
        assert!(compare_types(types, symbols, vec2, type_named(&session, &analysis, "Point")));
        for other in ["Padded", "Packed", "Shifted", "Mixed"] {
            let other = type_named(&session, &analysis, other);
            assert!(!compare_types(types, symbols, vec2, other));
        }
    }

    #[test]
    fn test_function_types_compare_parameter_referenceness() {
        let mut types = TypeTable::new();
        let symbols = SymbolTable::new();
        let sint = types.builtin(BuiltinType::Sint);
        let void = types.void();
        let by_value = types.func(vec![(Referenceness::Val, sint)], void);
        let by_ref = types.func(vec![(Referenceness::Ref, sint)], void);
        let returns_sint = types.func(vec![(Referenceness::Val, sint)], sint);

        assert!(!compare_types(&types, &symbols, by_value, by_ref));
        assert!(!compare_types(&types, &symbols, by_value, returns_sint));
        assert!(compare_types(&types, &symbols, by_ref, by_ref));
    }

    #[test]
    fn test_recursive_structs_compare_coinductively() {
        let (session, analysis) = analyze_source(
            r#"
            struct Node { next: [Node]; }
            struct Link { next: [Link]; }
            struct Leaf { next: [real]; }
            "#,
        );
        let (types, symbols) = (&analysis.types, &analysis.symbols);
        let node = type_named(&session, &analysis, "Node");
        let link = type_named(&session, &analysis, "Link");
        let leaf = type_named(&session, &analysis, "Leaf");

        assert!(compare_types(types, symbols, node, link));
        assert!(!compare_types(types, symbols, node, leaf));
    }
}

//! Parser tests.
//!
//! These tests verify the parser produces the expected arena nodes for
//! various inputs.

use super::*;
use crate::def::DeclId;

/// Helper to parse a complete module into a fresh arena.
fn parse_module(source: &str) -> Result<(Ast, Module), String> {
    let mut ast = Ast::new();
    let result = Parser::new(source, FileId(0), &mut ast).parse_module("test");
    match result {
        Ok(module) => Ok((ast, module)),
        Err(errors) => Err(format!("{:?}", errors)),
    }
}

/// Helper to check if source parses without errors.
fn parse_ok(source: &str) -> bool {
    parse_module(source).is_ok()
}

fn first_error(source: &str) -> String {
    match parse_module(source) {
        Ok(_) => panic!("expected a parse error for {source:?}"),
        Err(e) => e,
    }
}

fn func<'a>(ast: &'a Ast, decl: DeclId) -> &'a FuncDecl {
    ast.func_decl(decl).expect("expected a function declaration")
}

/// The expression of the single `return` in a one-statement function body.
fn returned_expr(ast: &Ast, decl: DeclId) -> crate::def::ExprId {
    let body = func(ast, decl).sig.body.as_ref().expect("body");
    match &ast.stmt(body[0]).kind {
        StmtKind::Return(Some(e)) => *e,
        other => panic!("expected return, got {other:?}"),
    }
}

// ============================================================
// Module header and imports
// ============================================================

#[test]
fn test_module_header_and_imports() {
    let (ast, module) = parse_module("module geo;\nimport math;\nimport io;\n").unwrap();
    assert_eq!(ast.name(module.name.name), "geo");
    let imports: Vec<_> = module.imports.iter().map(|i| ast.name(i.name)).collect();
    assert_eq!(imports, vec!["math", "io"]);
}

#[test]
fn test_module_name_defaults_to_given_stem() {
    let (ast, module) = parse_module("func main() {}").unwrap();
    assert_eq!(ast.name(module.name.name), "test");
}

#[test]
fn test_import_after_declaration_is_rejected() {
    let err = first_error("func f() {}\nimport late;");
    assert!(err.contains("imports must precede"), "{err}");
}

// ============================================================
// Declarations
// ============================================================

#[test]
fn test_function_with_params_and_return() {
    let (ast, module) =
        parse_module("func add(a: sint, var b: sint, ref c: [sint]) -> sint { return a + b; }")
            .unwrap();
    let f = func(&ast, module.decls[0]);
    assert_eq!(ast.name(f.name.name), "add");
    let modes: Vec<_> = f
        .sig
        .params
        .iter()
        .map(|p| (p.mutability, p.referenceness))
        .collect();
    assert_eq!(
        modes,
        vec![
            (Mutability::Let, Referenceness::Val),
            (Mutability::Var, Referenceness::Val),
            (Mutability::Var, Referenceness::Ref),
        ]
    );
    assert!(f.sig.ret.is_some());
    assert_eq!(f.kind, FuncKind::Free);
}

#[test]
fn test_extern_function_has_no_body() {
    let (ast, module) = parse_module("extern func sqrt(x: real) -> real;").unwrap();
    assert!(func(&ast, module.decls[0]).sig.body.is_none());
}

#[test]
fn test_missing_function_body() {
    let err = first_error("func f() -> sint;");
    assert!(err.contains("E0114"), "{err}");
}

#[test]
fn test_struct_members() {
    let source = r#"
        struct Counter {
            count: uint;
            private secret: sint;
            func get() -> uint { return self.count; }
            var func bump() { self.count += 1u; }
            static func zero() -> uint { return 0u; }
        }
    "#;
    let (ast, module) = parse_module(source).unwrap();
    let DeclKind::Struct(s) = &ast.decl(module.decls[0]).kind else {
        panic!("expected struct");
    };
    assert_eq!(s.members.len(), 5);
    match &s.members[1] {
        StructMember::Field(field) => assert_eq!(field.access, Access::Private),
        other => panic!("expected field, got {other:?}"),
    }
    let kinds: Vec<_> = s
        .members
        .iter()
        .filter_map(|m| match m {
            StructMember::Func(d) => Some(func(&ast, *d).kind),
            StructMember::Field(_) => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            FuncKind::Method(Mutability::Let),
            FuncKind::Method(Mutability::Var),
            FuncKind::Static,
        ]
    );
}

#[test]
fn test_enum_with_explicit_values() {
    let (ast, module) = parse_module("enum Color { Red, Green = 5, Blue = -1 }").unwrap();
    let DeclKind::Enum(e) = &ast.decl(module.decls[0]).kind else {
        panic!("expected enum");
    };
    let values: Vec<_> = e.cases.iter().map(|c| c.value).collect();
    assert_eq!(values, vec![None, Some(5), Some(-1)]);
}

#[test]
fn test_weak_and_strong_aliases() {
    let (ast, module) = parse_module("type Number = sint;\ntype Meters real;").unwrap();
    let strong: Vec<_> = module
        .decls
        .iter()
        .map(|d| match &ast.decl(*d).kind {
            DeclKind::Alias(a) => a.strong,
            _ => panic!("expected alias"),
        })
        .collect();
    assert_eq!(strong, vec![false, true]);
}

#[test]
fn test_global_requires_type_or_initializer() {
    assert!(parse_ok("let limit: sint;"));
    assert!(parse_ok("var total = 0;"));
    assert!(!parse_ok("let nothing;"));
}

// ============================================================
// Types
// ============================================================

#[test]
fn test_function_and_array_types() {
    let (ast, module) =
        parse_module("let callback: func(ref [sint], geo.Point) -> bool = f;").unwrap();
    let DeclKind::Global(global) = &ast.decl(module.decls[0]).kind else {
        panic!("expected global");
    };
    let ty = ast.type_expr(global.ty.expect("type"));
    let TypeExprKind::Func { params, ret } = &ty.kind else {
        panic!("expected function type");
    };
    assert_eq!(params[0].0, Referenceness::Ref);
    assert!(matches!(ast.type_expr(params[0].1).kind, TypeExprKind::Array(_)));
    match &ast.type_expr(params[1].1).kind {
        TypeExprKind::Named(path) => assert_eq!(path.len(), 2),
        other => panic!("expected qualified name, got {other:?}"),
    }
    assert!(ret.is_some());
}

// ============================================================
// Expressions
// ============================================================

#[test]
fn test_binary_precedence() {
    let (ast, module) = parse_module("func f() -> sint { return 1 + 2 * 3; }").unwrap();
    let e = returned_expr(&ast, module.decls[0]);
    let ExprKind::Binary { op, rhs, .. } = &ast.expr(e).kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinOp::Add);
    assert!(matches!(
        ast.expr(*rhs).kind,
        ExprKind::Binary { op: BinOp::Mul, .. }
    ));
}

#[test]
fn test_ternary_binds_loosest() {
    let (ast, module) =
        parse_module("func f(n: sint) -> sint { return n == 0 ? 1 : n * f(n - 1); }").unwrap();
    let e = returned_expr(&ast, module.decls[0]);
    let ExprKind::Ternary { cond, else_expr, .. } = &ast.expr(e).kind else {
        panic!("expected ternary");
    };
    assert!(matches!(
        ast.expr(*cond).kind,
        ExprKind::Binary { op: BinOp::Eq, .. }
    ));
    assert!(matches!(
        ast.expr(*else_expr).kind,
        ExprKind::Binary { op: BinOp::Mul, .. }
    ));
}

#[test]
fn test_unary_binds_tighter_than_binary() {
    let (ast, module) = parse_module("func f(x: sint) -> sint { return -x * 2; }").unwrap();
    let e = returned_expr(&ast, module.decls[0]);
    let ExprKind::Binary { lhs, .. } = &ast.expr(e).kind else {
        panic!("expected binary");
    };
    assert!(matches!(ast.expr(*lhs).kind, ExprKind::Unary { op: UnaryOp::Neg, .. }));
}

#[test]
fn test_postfix_chain() {
    let (ast, module) = parse_module("func f() { a.b(1)[2].c; }").unwrap();
    let body = func(&ast, module.decls[0]).sig.body.as_ref().unwrap();
    let StmtKind::Expr(e) = &ast.stmt(body[0]).kind else {
        panic!("expected expression statement");
    };
    let ExprKind::Member { object, member } = &ast.expr(*e).kind else {
        panic!("expected member");
    };
    assert_eq!(ast.name(member.name), "c");
    assert!(matches!(ast.expr(*object).kind, ExprKind::Index { .. }));
}

#[test]
fn test_literals_and_suffixes() {
    let (ast, module) =
        parse_module(r#"func f() { let a = 7u; let b = 255b; let c = 'x'; let d = "hi\n"; }"#)
            .unwrap();
    let body = func(&ast, module.decls[0]).sig.body.as_ref().unwrap();
    let lits: Vec<_> = body
        .iter()
        .map(|s| match &ast.stmt(*s).kind {
            StmtKind::Local(local) => match &ast.expr(local.init.unwrap()).kind {
                ExprKind::Literal(lit) => lit.clone(),
                other => panic!("expected literal, got {other:?}"),
            },
            other => panic!("expected local, got {other:?}"),
        })
        .collect();
    assert_eq!(
        lits,
        vec![
            Literal::Int { value: 7, suffix: IntSuffix::Uint },
            Literal::Int { value: 255, suffix: IntSuffix::Byte },
            Literal::Char('x'),
            Literal::Str("hi\n".to_string()),
        ]
    );
}

#[test]
fn test_byte_literal_out_of_range() {
    let err = first_error("func f() { let b = 300b; }");
    assert!(err.contains("byte literal out of range"), "{err}");
}

#[test]
fn test_closure_expression() {
    let (ast, module) =
        parse_module("func f() { let g = func(x: sint) -> sint { return x; }; }").unwrap();
    let body = func(&ast, module.decls[0]).sig.body.as_ref().unwrap();
    let StmtKind::Local(local) = &ast.stmt(body[0]).kind else {
        panic!("expected local");
    };
    let ExprKind::Closure(sig) = &ast.expr(local.init.unwrap()).kind else {
        panic!("expected closure");
    };
    assert_eq!(sig.params.len(), 1);
    assert!(sig.body.is_some());
}

// ============================================================
// Statements
// ============================================================

#[test]
fn test_statements() {
    let source = r#"
        func f(var n: sint) {
            while n > 0 {
                if n == 3 { break; } else if n == 4 { continue; } else { n -= 1; }
            }
            { n = 0; }
            func helper() {}
            return;
        }
    "#;
    let (ast, module) = parse_module(source).unwrap();
    let body = func(&ast, module.decls[0]).sig.body.as_ref().unwrap();
    let kinds: Vec<_> = body
        .iter()
        .map(|s| match &ast.stmt(*s).kind {
            StmtKind::While { .. } => "while",
            StmtKind::Block(_) => "block",
            StmtKind::Func(_) => "func",
            StmtKind::Return(None) => "return",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["while", "block", "func", "return"]);
}

#[test]
fn test_compound_assignment() {
    let (ast, module) = parse_module("func f(var x: uint) { x <<= 2u; }").unwrap();
    let body = func(&ast, module.decls[0]).sig.body.as_ref().unwrap();
    assert!(matches!(
        ast.stmt(body[0]).kind,
        StmtKind::Assign { op: Some(BinOp::Shl), .. }
    ));
}

// ============================================================
// Error recovery
// ============================================================

#[test]
fn test_one_error_per_broken_declaration() {
    let source = "func a() { let = ; }\nfunc b() -> { }\nfunc c() {}";
    let mut ast = Ast::new();
    let errors = Parser::new(source, FileId(0), &mut ast)
        .parse_module("test")
        .unwrap_err();
    assert_eq!(errors.len(), 2, "{errors:?}");
}

#[test]
fn test_standalone_type() {
    let mut ast = Ast::new();
    let ty = Parser::new("[func(real) -> real]", FileId(0), &mut ast)
        .parse_standalone_type()
        .unwrap();
    assert!(matches!(ast.type_expr(ty).kind, TypeExprKind::Array(_)));

    let mut ast = Ast::new();
    assert!(Parser::new("sint extra", FileId(0), &mut ast)
        .parse_standalone_type()
        .is_err());
}

//! Semantic analysis tests.
//!
//! Tests organized by category:
//! - Return type deduction and recursion
//! - Overloads and aliases
//! - Names, imports and member access
//! - Mutability and control flow
//! - Closure captures
//! - Value transfers and lifetime helpers
//! - Warnings

use crate::ast::ExprKind;
use crate::config::CompilerConfig;
use crate::diagnostics::CollectingSink;
use crate::project::{CheckedProgram, Session};

use super::error::{ReturnProblem, TypeErrorKind};
use super::lifetime::{LifetimeOp, Transfer, TypeCategory};
use super::symbol::{CaptureSource, SymbolKind};
use super::types::{BuiltinType, Ty};
use super::{TransferSite, SHADOW_WARNING, UNUSED_WARNING};

/// Parse `(file name, source)` pairs into a session and analyze them.
fn analyze(sources: &[(&str, &str)], config: &CompilerConfig) -> (Session, Result<CheckedProgram, TypeErrorKind>, CollectingSink) {
    let mut session = Session::new();
    for (name, source) in sources {
        if let Err(err) = session.add_source(name, source) {
            panic!("syntax error in {name}: {err:?}");
        }
    }
    let mut sink = CollectingSink::new();
    let result = session.check(config, &mut sink).map_err(|err| err.kind);
    (session, result, sink)
}

/// Helper to assert type checking succeeds.
fn assert_typechecks(source: &str) -> (Session, CheckedProgram, CollectingSink) {
    let (session, result, sink) = analyze(&[("main.stela", source)], &CompilerConfig::default());
    match result {
        Ok(program) => (session, program, sink),
        Err(kind) => panic!("Expected type checking to succeed, but got: {}", kind.message()),
    }
}

/// Helper to assert type checking fails, returning the error kind.
fn type_error(source: &str) -> TypeErrorKind {
    let (_, result, sink) = analyze(&[("main.stela", source)], &CompilerConfig::default());
    match result {
        Ok(_) => panic!("Expected a type error, but type checking succeeded"),
        Err(kind) => {
            assert_eq!(sink.errors().count(), 1, "the error is reported exactly once");
            kind
        }
    }
}

fn return_problem(source: &str) -> ReturnProblem {
    match type_error(source) {
        TypeErrorKind::MissingOrBadReturn { reason } => reason,
        other => panic!("expected a return error, got {other:?}"),
    }
}

/// The return type of the function named `name`, rendered.
fn return_type(session: &Session, program: &CheckedProgram, name: &str) -> Ty {
    let analysis = &program.analysis;
    let ret = analysis
        .symbols
        .iter()
        .find_map(|(_, symbol)| match &symbol.kind {
            SymbolKind::Func(info) if session.ast().name(symbol.name) == name => info.ret,
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function `{name}` with a return type"));
    analysis.types.get(ret).clone()
}

// ============================================================
// Return type deduction
// ============================================================

#[test]
fn test_recursive_factorial_deduces_return_type() {
    let (session, program, _) = assert_typechecks("func f(n: sint) { return n == 0 ? 1 : n * f(n - 1); }");
    assert_eq!(return_type(&session, &program, "f"), Ty::Builtin(BuiltinType::Sint));
}

#[test]
fn test_mutual_recursion_deduces_both_return_types() {
    let source = r#"
        func even(n: sint) { return n == 0 ? true : odd(n - 1); }
        func odd(n: sint) { return n == 0 ? false : even(n - 1); }
    "#;
    let (session, program, _) = assert_typechecks(source);
    assert_eq!(return_type(&session, &program, "even"), Ty::Builtin(BuiltinType::Bool));
    assert_eq!(return_type(&session, &program, "odd"), Ty::Builtin(BuiltinType::Bool));
}

#[test]
fn test_recursion_after_first_return_uses_deduced_type() {
    let source = r#"
        func count(n: sint) {
            if n == 0 { return 0u; }
            let rest = count(n - 1);
            return rest + 1u;
        }
    "#;
    let (session, program, _) = assert_typechecks(source);
    assert_eq!(return_type(&session, &program, "count"), Ty::Builtin(BuiltinType::Uint));
}

#[test]
fn test_only_recursive_returns_is_undeducible() {
    let problem = return_problem("func f(n: sint) { return f(n); }");
    assert!(matches!(problem, ReturnProblem::UndeducibleRecursion { .. }));
}

#[test]
fn test_pending_call_used_as_value_is_rejected() {
    let problem = return_problem("func f(n: sint) { let x = f(n); return 1; }");
    assert!(matches!(problem, ReturnProblem::RecursiveCallOutsideReturn { .. }));
}

#[test]
fn test_conflicting_assumption_is_a_mismatch() {
    let source = "func f(n: sint) { return n == 0 ? 1.0 : f(n - 1) + 1.0; }\nfunc g() -> sint { return 1; }";
    assert_typechecks(source);

    let kind = type_error("func f(b: bool) { if b { return 1 + f(false); } return true; }");
    assert!(matches!(kind, TypeErrorKind::Mismatch { .. }), "{kind:?}");
}

#[test]
fn test_missing_return_on_some_path() {
    let problem = return_problem("func f(b: bool) -> sint { if b { return 1; } }");
    assert!(matches!(problem, ReturnProblem::NotAllPathsReturn { .. }));
}

#[test]
fn test_return_value_in_void_function() {
    let problem = return_problem("func f() -> void { return 1; }");
    assert!(matches!(problem, ReturnProblem::ValueInVoid { .. }));
}

#[test]
fn test_bare_return_in_value_function() {
    let problem = return_problem("func f() -> sint { return; }");
    assert!(matches!(problem, ReturnProblem::MissingValue { .. }));
}

// ============================================================
// Overloads and aliases
// ============================================================

#[test]
fn test_weak_alias_overload_is_a_redefinition() {
    let kind = type_error("type Number = sint;\nfunc f(x: sint) {}\nfunc f(x: Number) {}");
    assert_eq!(kind, TypeErrorKind::Redefinition { name: "f".to_string() });
}

#[test]
fn test_strong_alias_overloads_coexist() {
    assert_typechecks("type Number sint;\nfunc f(x: sint) {}\nfunc f(x: Number) {}");
}

#[test]
fn test_overload_is_picked_by_argument_types() {
    let source = r#"
        func show(x: sint) -> uint { return 1u; }
        func show(x: real) -> bool { return true; }
        func main() {
            let a: uint = show(1);
            let b: bool = show(1.5);
        }
    "#;
    assert_typechecks(source);
}

#[test]
fn test_no_overload_accepts_the_arguments() {
    let source = "func show(x: sint) {}\nfunc show(x: real) {}\nfunc main() { show(true); }";
    match type_error(source) {
        TypeErrorKind::NoMatchingOverload { name, candidates, .. } => {
            assert_eq!(name, "show");
            assert_eq!(candidates, 0);
        }
        other => panic!("expected no matching overload, got {other:?}"),
    }
}

#[test]
fn test_overloads_may_differ_only_in_referenceness() {
    let source = r#"
        func pick(x: sint) -> bool { return true; }
        func pick(ref x: sint) -> uint { x = 0; return 1u; }
        func main() {
            let a: bool = pick(1);
        }
    "#;
    assert_typechecks(source);
}

#[test]
fn test_writable_argument_matches_both_referenceness_overloads() {
    let source = r#"
        func pick(x: sint) {}
        func pick(ref x: sint) {}
        func main() {
            var v = 1;
            pick(v);
        }
    "#;
    match type_error(source) {
        TypeErrorKind::NoMatchingOverload { name, candidates, .. } => {
            assert_eq!(name, "pick");
            assert_eq!(candidates, 2);
        }
        other => panic!("expected an ambiguous call, got {other:?}"),
    }
}

#[test]
fn test_alias_cycle_is_rejected() {
    let kind = type_error("type A = B;\ntype B = A;");
    assert!(matches!(kind, TypeErrorKind::RecursiveAlias { .. }), "{kind:?}");
}

#[test]
fn test_operands_must_share_a_type() {
    let kind = type_error("func f() -> sint { return 1 + 1u; }");
    assert!(matches!(kind, TypeErrorKind::InvalidOperand { .. }), "{kind:?}");
}

// ============================================================
// Names, imports and members
// ============================================================

#[test]
fn test_undefined_name() {
    let kind = type_error("func f() -> sint { return missing; }");
    assert_eq!(kind, TypeErrorKind::UndefinedSymbol { name: "missing".to_string() });
}

#[test]
fn test_name_in_two_imports_is_ambiguous() {
    let sources = [
        ("a.stela", "let limit = 1;"),
        ("b.stela", "let limit = 2;"),
        ("c.stela", "import a;\nimport b;\nfunc main() -> sint { return limit; }"),
    ];
    let (_, result, _) = analyze(&sources, &CompilerConfig::default());
    assert_eq!(
        result.err(),
        Some(TypeErrorKind::AmbiguousReference { name: "limit".to_string() })
    );
}

#[test]
fn test_qualified_name_resolves_ambiguity() {
    let sources = [
        ("a.stela", "let limit = 1;"),
        ("b.stela", "let limit = 2;"),
        ("c.stela", "import a;\nimport b;\nfunc main() -> sint { return a.limit + b.limit; }"),
    ];
    let (_, result, _) = analyze(&sources, &CompilerConfig::default());
    assert!(result.is_ok(), "{result:?}");
}

#[test]
fn test_unknown_import() {
    let kind = type_error("import nowhere;\nfunc main() {}");
    assert!(matches!(kind, TypeErrorKind::UnknownModule { .. }), "{kind:?}");
}

#[test]
fn test_private_field_is_hidden_outside_its_struct() {
    let source = r#"
        struct Account {
            private balance: sint;
            func peek() -> sint { return self.balance; }
        }
        func main() {
            let account: Account;
            let b = account.balance;
        }
    "#;
    match type_error(source) {
        TypeErrorKind::MemberAccess { owner, member, .. } => {
            assert_eq!(owner, "Account");
            assert_eq!(member, "balance");
        }
        other => panic!("expected member access error, got {other:?}"),
    }
}

#[test]
fn test_static_function_through_type_name() {
    let source = r#"
        struct Counter {
            count: uint;
            static func zero() -> uint { return 0u; }
        }
        func main() -> uint { return Counter.zero(); }
    "#;
    assert_typechecks(source);
}

#[test]
fn test_enum_cases_compare() {
    let source = r#"
        enum Color { Red, Green = 5 }
        func is_red(c: Color) -> bool { return c == Color.Red; }
    "#;
    assert_typechecks(source);
}

#[test]
fn test_duplicate_struct_field() {
    let kind = type_error("struct P { x: real; x: real; }");
    assert_eq!(
        kind,
        TypeErrorKind::DuplicateField {
            owner: "P".to_string(),
            name: "x".to_string()
        }
    );
}

// ============================================================
// Mutability and control flow
// ============================================================

#[test]
fn test_assignment_to_let_binding() {
    let kind = type_error("func main() { let x = 1; x = 2; }");
    assert!(matches!(kind, TypeErrorKind::ImmutabilityViolation { .. }), "{kind:?}");
}

#[test]
fn test_var_binding_is_assignable() {
    assert_typechecks("func main() { var x = 1; x = 2; x *= 3; }");
}

#[test]
fn test_var_method_needs_var_receiver() {
    let source = r#"
        struct Counter {
            count: uint;
            var func bump() { self.count += 1u; }
        }
        func main() {
            let c: Counter;
            c.bump();
        }
    "#;
    let kind = type_error(source);
    assert!(matches!(kind, TypeErrorKind::ImmutabilityViolation { .. }), "{kind:?}");
}

#[test]
fn test_ref_parameter_needs_writable_argument() {
    let source = r#"
        func reset(ref xs: [sint]) { xs = []; }
        func main() {
            let fixed: [sint] = [1];
            reset(fixed);
        }
    "#;
    let kind = type_error(source);
    assert!(matches!(kind, TypeErrorKind::NoMatchingOverload { .. }), "{kind:?}");
}

#[test]
fn test_break_outside_loop() {
    assert_eq!(type_error("func main() { break; }"), TypeErrorKind::LoopControl { keyword: "break" });
}

#[test]
fn test_loop_control_inside_loop() {
    assert_typechecks("func main() { var n = 3; while n > 0 { n -= 1; if n == 1 { break; } continue; } }");
}

#[test]
fn test_condition_must_be_bool() {
    let kind = type_error("func main() { if 1 { } }");
    assert!(matches!(kind, TypeErrorKind::Mismatch { .. }), "{kind:?}");
}

#[test]
fn test_function_value_is_a_condition_but_not_a_logic_operand() {
    let tested = r#"
        func main() {
            let f = func() -> sint { return 1; };
            if f { print(f()); }
            let n = true ? f() : 0;
        }
    "#;
    assert_typechecks(tested);

    let combined = r#"
        func main() {
            let f = func() -> sint { return 1; };
            if f && true { }
        }
    "#;
    let kind = type_error(combined);
    assert!(matches!(kind, TypeErrorKind::InvalidOperand { ref op, .. } if op == "&&"), "{kind:?}");
}

#[test]
fn test_empty_array_needs_a_type() {
    let kind = type_error("func main() { let xs = []; }");
    assert!(matches!(kind, TypeErrorKind::CannotInfer { .. }), "{kind:?}");
}

// ============================================================
// Closure captures
// ============================================================

#[test]
fn test_nested_closure_captures_through_parent() {
    let source = r#"
        func main() {
            let base = 10;
            let outer = func() -> sint {
                let inner = func() -> sint { return base + base; };
                return inner();
            };
            let r = outer();
        }
    "#;
    let (_, program, _) = assert_typechecks(source);
    let analysis = &program.analysis;
    let [outer, inner] = analysis.closures[..] else {
        panic!("expected two closures, got {}", analysis.closures.len());
    };

    let outer_caps = analysis.captures(outer);
    assert_eq!(outer_caps.len(), 1);
    assert_eq!(outer_caps[0].via, CaptureSource::Local);

    // Read twice, captured once.
    let inner_caps = analysis.captures(inner);
    assert_eq!(inner_caps.len(), 1);
    assert_eq!(inner_caps[0].via, CaptureSource::Parent(0));
    assert_eq!(inner_caps[0].source, outer_caps[0].source);
}

#[test]
fn test_closure_does_not_capture_its_own_locals_or_globals() {
    let source = r#"
        let scale = 2;
        func main() {
            let f = func(x: sint) -> sint {
                let y = x * scale;
                return y;
            };
            let r = f(3);
        }
    "#;
    let (_, program, _) = assert_typechecks(source);
    let analysis = &program.analysis;
    assert_eq!(analysis.closures.len(), 1);
    assert!(analysis.captures(analysis.closures[0]).is_empty());
}

#[test]
fn test_closure_capture_is_read_through_slot() {
    let source = r#"
        func main() {
            let a = 1;
            let b = 2;
            let f = func() -> sint { return b + a + b; };
            let r = f();
        }
    "#;
    let (_, program, _) = assert_typechecks(source);
    let analysis = &program.analysis;
    let lambda = analysis.closures[0];
    assert_eq!(analysis.captures(lambda).len(), 2);

    let mut slots: Vec<_> = analysis
        .captured
        .values()
        .filter(|(closure, _)| *closure == lambda)
        .map(|&(_, slot)| slot)
        .collect();
    slots.sort_unstable();
    assert_eq!(slots, vec![0, 0, 1]);
}

// ============================================================
// Value transfers and lifetime helpers
// ============================================================

const ARRAY_COPIES: &str = r#"
    func main() {
        let xs: [sint] = [1, 2];
        let ys = xs;
        print(len(ys));
    }
"#;

fn array_transfers(program: &CheckedProgram) -> Vec<(TransferSite, Transfer)> {
    let analysis = &program.analysis;
    analysis
        .transfers
        .iter()
        .filter(|record| {
            super::classify(&analysis.types, &analysis.symbols, record.ty) != TypeCategory::TriviallyCopyable
        })
        .map(|record| (record.site, record.transfer))
        .collect()
}

#[test]
fn test_temporaries_relocate_and_names_copy() {
    let (_, program, _) = assert_typechecks(ARRAY_COPIES);
    assert_eq!(
        array_transfers(&program),
        vec![
            (TransferSite::Init, Transfer::Relocate),
            (TransferSite::Init, Transfer::CopyConstruct),
            (TransferSite::Argument, Transfer::CopyConstruct),
        ]
    );
}

#[test]
fn test_without_elision_temporaries_move_then_destroy() {
    let config = CompilerConfig::builder().relocation_elision(false).build();
    let (_, result, _) = analyze(&[("main.stela", ARRAY_COPIES)], &config);
    let program = result.unwrap();
    let transfers = array_transfers(&program);
    assert_eq!(transfers[0], (TransferSite::Init, Transfer::MoveConstruct));
    assert!(transfers[0].1.destroys_source());
}

#[test]
fn test_conditional_copies_named_branch_and_relocates_temporary() {
    let source = r#"
        func main() {
            let a: [sint] = [1];
            let b = true ? a : [2];
            print(len(a));
            print(len(b));
        }
    "#;
    let (session, program, _) = assert_typechecks(source);
    assert_eq!(
        array_transfers(&program),
        vec![
            (TransferSite::Init, Transfer::Relocate),
            (TransferSite::Init, Transfer::CopyConstruct),
            (TransferSite::Init, Transfer::Relocate),
            (TransferSite::Argument, Transfer::CopyConstruct),
            (TransferSite::Argument, Transfer::CopyConstruct),
        ]
    );

    // The named branch is still alive after `b` is built from it.
    let analysis = &program.analysis;
    let relocated_names = analysis
        .transfers
        .iter()
        .filter(|record| record.transfer == Transfer::Relocate)
        .filter(|record| matches!(session.ast().expr(record.expr).kind, ExprKind::Ident(_)))
        .count();
    assert_eq!(relocated_names, 0);
}

#[test]
fn test_returned_values_are_transferred() {
    let source = r#"
        func id(a: [sint]) -> [sint] { return a; }
        func fresh() { return [1, 2]; }
        func main() {
            let xs = id(fresh());
            print(len(xs));
        }
    "#;
    let (_, program, _) = assert_typechecks(source);
    let returns: Vec<_> = array_transfers(&program)
        .into_iter()
        .filter(|&(site, _)| site == TransferSite::Return)
        .map(|(_, transfer)| transfer)
        .collect();
    assert_eq!(returns.len(), 2, "{returns:?}");
    assert!(returns.contains(&Transfer::CopyConstruct));
    assert!(returns.contains(&Transfer::Relocate));
}

#[test]
fn test_void_return_records_no_transfer() {
    let (_, program, _) = assert_typechecks("func main() { return; }");
    assert!(program.analysis.transfers.iter().all(|record| record.site != TransferSite::Return));
}

#[test]
fn test_uninitialized_objects_request_default_construction() {
    let source = r#"
        struct Point { x: real; y: real; }
        func main() {
            var p: Point;
            var xs: [real];
            let n: sint;
            p.x = 1.0;
            push(xs, p.x);
            print(n);
        }
    "#;
    let (_, program, _) = assert_typechecks(source);
    let analysis = &program.analysis;
    assert_eq!(analysis.default_constructed.len(), 3);

    let mut defaults: Vec<_> = analysis
        .helper_requests()
        .into_iter()
        .filter(|&(op, _)| op == LifetimeOp::DefConstruct)
        .map(|(_, ty)| analysis.types.get(ty).clone())
        .collect();
    defaults.sort_by_key(|ty| matches!(ty, Ty::Array(_)));
    assert_eq!(defaults.len(), 2, "trivial `sint` needs no helper: {defaults:?}");
    assert!(matches!(defaults[0], Ty::Struct(_)));
    let real = analysis.types.builtin(BuiltinType::Real);
    assert_eq!(defaults[1], Ty::Array(real));
}

#[test]
fn test_helper_requests_for_array_copies() {
    let (_, program, _) = assert_typechecks(ARRAY_COPIES);
    let analysis = &program.analysis;
    let sint = analysis.types.builtin(BuiltinType::Sint);
    let array = analysis.types.find(&Ty::Array(sint)).unwrap();

    let requests = analysis.helper_requests();
    assert!(requests.contains(&(LifetimeOp::CopyConstruct, array)));
    assert!(requests.contains(&(LifetimeOp::Destroy, array)));
    assert!(requests.iter().all(|&(_, ty)| ty == array));
}

#[test]
fn test_struct_objects_request_destructors() {
    let source = r#"
        struct Point { x: real; y: real; }
        func main() {
            var p: Point;
            p.x = 1.0;
        }
    "#;
    let (_, program, _) = assert_typechecks(source);
    let analysis = &program.analysis;
    let point = analysis
        .helper_requests()
        .into_iter()
        .find(|&(op, _)| op == LifetimeOp::Destroy)
        .map(|(_, ty)| ty)
        .unwrap();
    assert!(matches!(analysis.types.get(point), Ty::Struct(_)));
}

#[test]
fn test_every_expression_is_typed() {
    let (_, program, _) = assert_typechecks(ARRAY_COPIES);
    // [1, 2], 1, 2, xs, print(..), print, len(ys), len, ys
    assert_eq!(program.analysis.expr_count(), 9);
}

// ============================================================
// Warnings
// ============================================================

#[test]
fn test_unused_variable_warning() {
    let (_, _, sink) = assert_typechecks("func main() { let unused = 1; let _quiet = 2; }");
    let warnings: Vec<_> = sink.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code.as_deref(), Some(UNUSED_WARNING));
    assert!(warnings[0].message.contains("`unused`"));
}

#[test]
fn test_unused_warning_can_be_disabled() {
    let config = CompilerConfig::builder().warn_unused(false).build();
    let (_, result, sink) = analyze(&[("main.stela", "func main() { let unused = 1; }")], &config);
    assert!(result.is_ok());
    assert_eq!(sink.warnings().count(), 0);
}

#[test]
fn test_shadowing_warning() {
    let (_, _, sink) = assert_typechecks("let x = 1;\nfunc main() { let x = 2; print(x); }");
    let shadow: Vec<_> = sink
        .warnings()
        .filter(|w| w.code.as_deref() == Some(SHADOW_WARNING))
        .collect();
    assert_eq!(shadow.len(), 1);
}

#[test]
fn test_warnings_never_block_compilation() {
    let (_, program, sink) = assert_typechecks("func helper() {}\nfunc main() {}");
    assert_eq!(program.order, vec!["main"]);
    assert_eq!(sink.warnings().count(), 1);
    assert_eq!(sink.errors().count(), 0);
}

//! End-to-end integration tests for the STELA compiler pipeline.
//!
//! These tests exercise the complete pipeline from source files through
//! semantic analysis and lifetime helper instantiation.

use std::fs;

use proptest::prelude::*;
use stelac::codegen::{instantiate_helpers, RecordedHelper, RecordingBackend};
use stelac::diagnostics::CollectingSink;
use stelac::project::{find_module_order, CheckedProgram, GraphError, ModuleImports, Session};
use stelac::typeck::{LifetimeOp, LifetimePlan, Ty, TypeErrorKind};
use stelac::CompilerConfig;

/// Test helper to run the full pipeline on in-memory modules.
fn check_sources(sources: &[(&str, &str)]) -> (Session, Result<CheckedProgram, TypeErrorKind>) {
    let mut session = Session::new();
    for (name, source) in sources {
        session
            .add_source(name, source)
            .unwrap_or_else(|err| panic!("{name} failed to parse: {err}"));
    }
    let mut sink = CollectingSink::new();
    let result = session
        .check(&CompilerConfig::default(), &mut sink)
        .map_err(|err| err.kind);
    (session, result)
}

fn assert_checks(sources: &[(&str, &str)]) -> (Session, CheckedProgram) {
    match check_sources(sources) {
        (session, Ok(program)) => (session, program),
        (_, Err(kind)) => panic!("Type checking failed: {}", kind.message()),
    }
}

// ============================================================
// Source files
// ============================================================

#[test]
fn test_modules_from_disk_are_ordered_by_imports() {
    let dir = tempfile::tempdir().unwrap();
    let util = dir.path().join("util.stela");
    let app = dir.path().join("app.stela");
    fs::write(&app, "import util;\nfunc main() -> sint { return twice(21); }\n").unwrap();
    fs::write(&util, "func twice(x: sint) -> sint { return x * 2; }\n").unwrap();

    let mut session = Session::new();
    session.add_file(&app).unwrap();
    session.add_file(&util).unwrap();

    let mut sink = CollectingSink::new();
    let program = session.check(&CompilerConfig::default(), &mut sink).unwrap();
    assert_eq!(program.order, vec!["util", "app"]);
    assert_eq!(sink.errors().count(), 0);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new();
    let err = session.add_file(&dir.path().join("absent.stela")).unwrap_err();
    assert!(err.to_string().contains("absent.stela"), "{err}");
}

#[test]
fn test_cycle_through_three_modules() {
    let (_, result) = check_sources(&[
        ("a.stela", "import b;"),
        ("b.stela", "import c;"),
        ("c.stela", "import a;"),
    ]);
    match result {
        Err(TypeErrorKind::CyclicImport { cycle }) => {
            assert_eq!(cycle.first(), cycle.last());
            assert_eq!(cycle.len(), 4);
        }
        other => panic!("expected a cyclic import, got {other:?}"),
    }
}

// ============================================================
// Lifetime helpers
// ============================================================

fn helpers_of(session: &Session, program: &CheckedProgram) -> Vec<RecordedHelper> {
    let cache = instantiate_helpers(session.ast(), &program.analysis, RecordingBackend::new()).unwrap();
    cache.into_backend().helpers().to_vec()
}

fn find<'h>(helpers: &'h [RecordedHelper], op: LifetimeOp, prefix: &str) -> &'h RecordedHelper {
    helpers
        .iter()
        .find(|h| h.op == op && h.name.starts_with(prefix))
        .unwrap_or_else(|| panic!("no {op:?} helper named {prefix}*"))
}

#[test]
fn test_self_referential_struct_helpers_terminate() {
    let source = r#"
        struct Node { children: [Node]; }
        func main() {
            let root: Node;
            let n = len(root.children);
            print(n);
        }
    "#;
    let (session, program) = assert_checks(&[("main.stela", source)]);
    let helpers = helpers_of(&session, &program);

    let node = find(&helpers, LifetimeOp::Destroy, "stela_destroy_S4Node_");
    let array = find(&helpers, LifetimeOp::Destroy, "stela_destroy_AS4Node_");
    assert_eq!(node.calls, vec![array.name.clone()]);
    assert_eq!(array.calls, vec![node.name.clone()]);
    assert!(matches!(node.plan, Some(LifetimePlan::Fields(ref steps)) if steps.len() == 1));

    // Each (operation, type) pair is generated once.
    let mut names: Vec<_> = helpers.iter().map(|h| h.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), helpers.len());
    assert!(helpers.iter().all(|h| h.plan.is_some()));
}

#[test]
fn test_weak_alias_shares_helpers_with_its_target() {
    let source = r#"
        type Numbers = [sint];
        func main() {
            let a: Numbers = [1];
            let b: [sint] = a;
            let c = b;
            print(len(c));
        }
    "#;
    let (session, program) = assert_checks(&[("main.stela", source)]);
    let helpers = helpers_of(&session, &program);
    let destroys: Vec<_> = helpers.iter().filter(|h| h.op == LifetimeOp::Destroy).collect();
    assert_eq!(destroys.len(), 1);
    assert_eq!(destroys[0].name, "stela_destroy_Asint");
}

#[test]
fn test_struct_assignment_helpers_call_field_helpers() {
    let source = r#"
        struct Pair { left: [real]; right: real; }
        func main() {
            var a: Pair;
            let b: Pair;
            a = b;
        }
    "#;
    let (session, program) = assert_checks(&[("main.stela", source)]);
    let helpers = helpers_of(&session, &program);

    let assign = find(&helpers, LifetimeOp::CopyAssign, "stela_copy_assign_S4Pair_");
    assert_eq!(assign.calls, vec!["stela_copy_assign_Areal", "stela_copy_assign_real"]);
    let array_assign = find(&helpers, LifetimeOp::CopyAssign, "stela_copy_assign_Areal");
    assert_eq!(array_assign.plan, Some(LifetimePlan::RetainAssign));
    assert_eq!(array_assign.calls, vec!["stela_destroy_Areal"]);

    // Default-construct, copy-assign and destroy; the struct needs nothing else.
    let struct_helpers = helpers
        .iter()
        .filter(|h| matches!(program.analysis.types.get(h.ty), Ty::Struct(_)))
        .count();
    assert_eq!(struct_helpers, 3);

    let default = find(&helpers, LifetimeOp::DefConstruct, "stela_def_construct_S4Pair_");
    assert_eq!(default.calls, vec!["stela_def_construct_Areal", "stela_def_construct_real"]);
    let array_default = find(&helpers, LifetimeOp::DefConstruct, "stela_def_construct_Areal");
    assert_eq!(array_default.plan, Some(LifetimePlan::EmptyHandle));
}

// ============================================================
// Module order properties
// ============================================================

/// `(module, imports)` with c < d < e < b < a, d < f and e < f.
const LAYERED: &[(&str, &[&str])] = &[
    ("a", &["b"]),
    ("b", &["e"]),
    ("c", &[]),
    ("d", &["c"]),
    ("e", &["d"]),
    ("f", &["d", "e"]),
];

fn position(order: &[&str], name: &str) -> usize {
    order.iter().position(|&n| n == name).unwrap()
}

proptest! {
    /// Declaration order never changes which modules come first
    #[test]
    fn layered_order_respects_imports(modules in Just(LAYERED.to_vec()).prop_shuffle()) {
        let graph: Vec<_> = modules
            .iter()
            .map(|(name, imports)| ModuleImports::new(name, imports.iter().copied()))
            .collect();
        let order: Vec<&str> = find_module_order(&graph, &[])
            .unwrap()
            .into_iter()
            .map(|index| modules[index].0)
            .collect();

        prop_assert_eq!(order.len(), modules.len());
        for (before, after) in [("c", "d"), ("d", "e"), ("e", "b"), ("b", "a"), ("d", "f"), ("e", "f")] {
            prop_assert!(position(&order, before) < position(&order, after), "{:?}", order);
        }
    }

    /// A module that imports itself is always a cycle
    #[test]
    fn self_import_is_cyclic(names in prop::collection::hash_set("[a-z]{1,6}", 1..8), pick in any::<prop::sample::Index>()) {
        let names: Vec<String> = names.into_iter().collect();
        let looped = pick.index(names.len());
        let graph: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let imports = if i == looped { vec![name.as_str()] } else { Vec::new() };
                ModuleImports::new(name, imports)
            })
            .collect();
        let is_cycle = matches!(find_module_order(&graph, &[]), Err(GraphError::CyclicImport { .. }));
        prop_assert!(is_cycle);
    }

    /// Two modules importing each other are always a cycle
    #[test]
    fn mutual_import_is_cyclic(extra in 0usize..6) {
        let names: Vec<String> = (0..extra + 2).map(|i| format!("m{i}")).collect();
        let graph: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let imports = if i == 0 { vec!["m1"] } else { vec!["m0"] };
                ModuleImports::new(name, imports)
            })
            .collect();
        let is_cycle = matches!(find_module_order(&graph, &[]), Err(GraphError::CyclicImport { .. }));
        prop_assert!(is_cycle);
    }
}

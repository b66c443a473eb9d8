//! Module import graph.
//!
//! This module provides:
//! - Duplicate module name detection across compiled and external modules
//! - Topological ordering so every module follows its transitive imports
//! - Cycle detection for circular imports, reported with the cycle path

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

/// Errors that can occur while ordering modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("module `{name}` is defined more than once")]
    DuplicateModule { name: String },

    #[error("module `{importer}` imports unknown module `{name}`")]
    UnknownModule { name: String, importer: String },

    #[error("circular import detected: {}", cycle.join(" -> "))]
    CyclicImport { cycle: Vec<String> },
}

/// The import list of one module to be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImports<'a> {
    pub name: &'a str,
    pub imports: Vec<&'a str>,
}

impl<'a> ModuleImports<'a> {
    pub fn new(name: &'a str, imports: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name,
            imports: imports.into_iter().collect(),
        }
    }
}

/// Compute the order in which `modules` must be analyzed.
///
/// Returns a permutation of `0..modules.len()` in which every module comes
/// after everything it transitively imports. Imports may also name one of the
/// `external` modules, which are already available and never ordered.
///
/// Duplicate names are rejected before any traversal starts, so a duplicate
/// is reported even when the graph also contains a cycle.
pub fn find_module_order(
    modules: &[ModuleImports<'_>],
    external: &[&str],
) -> Result<Vec<usize>, GraphError> {
    let mut names: Vec<&str> = modules
        .iter()
        .map(|m| m.name)
        .chain(external.iter().copied())
        .collect();
    names.sort_unstable();
    if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(GraphError::DuplicateModule {
            name: pair[0].to_string(),
        });
    }

    let mut walk = OrderWalk {
        modules,
        index: modules.iter().enumerate().map(|(i, m)| (m.name, i)).collect(),
        external: external.iter().copied().collect(),
        done: vec![false; modules.len()],
        on_stack: vec![false; modules.len()],
        path: Vec::new(),
        order: Vec::with_capacity(modules.len()),
    };
    for module in 0..modules.len() {
        walk.visit(module)?;
    }

    debug!(
        order = ?walk.order.iter().map(|&i| modules[i].name).collect::<Vec<_>>(),
        "computed module order"
    );
    Ok(walk.order)
}

/// Depth-first post-order walk with an explicit recursion stack.
struct OrderWalk<'m, 'a> {
    modules: &'m [ModuleImports<'a>],
    index: HashMap<&'a str, usize>,
    external: HashSet<&'a str>,
    done: Vec<bool>,
    on_stack: Vec<bool>,
    path: Vec<usize>,
    order: Vec<usize>,
}

impl OrderWalk<'_, '_> {
    fn visit(&mut self, module: usize) -> Result<(), GraphError> {
        if self.on_stack[module] {
            let start = self
                .path
                .iter()
                .position(|&m| m == module)
                .unwrap_or(0);
            let mut cycle: Vec<String> = self.path[start..]
                .iter()
                .map(|&m| self.modules[m].name.to_string())
                .collect();
            cycle.push(self.modules[module].name.to_string());
            return Err(GraphError::CyclicImport { cycle });
        }
        if self.done[module] {
            return Ok(());
        }

        self.on_stack[module] = true;
        self.path.push(module);

        let modules = self.modules;
        for &import in &modules[module].imports {
            if let Some(&dep) = self.index.get(import) {
                self.visit(dep)?;
            } else if !self.external.contains(import) {
                return Err(GraphError::UnknownModule {
                    name: import.to_string(),
                    importer: modules[module].name.to_string(),
                });
            }
        }

        self.path.pop();
        self.on_stack[module] = false;
        self.done[module] = true;
        self.order.push(module);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[usize], modules: &[ModuleImports<'_>], name: &str) -> usize {
        let index = modules.iter().position(|m| m.name == name).unwrap();
        order.iter().position(|&i| i == index).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(find_module_order(&[], &[]).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_diamond_like_graph_orders_dependencies_first() {
        let modules = vec![
            ModuleImports::new("a", ["b", "c"]),
            ModuleImports::new("b", ["d", "e"]),
            ModuleImports::new("c", []),
            ModuleImports::new("d", ["c"]),
            ModuleImports::new("e", ["d"]),
            ModuleImports::new("f", ["d", "e"]),
        ];
        let order = find_module_order(&modules, &[]).unwrap();
        let pos = |name| position(&order, &modules, name);

        assert_eq!(order.len(), 6);
        assert!(pos("c") < pos("d"));
        assert!(pos("d") < pos("e"));
        assert!(pos("e") < pos("b"));
        assert!(pos("b") < pos("a"));
        assert!(pos("d") < pos("f"));
        assert!(pos("e") < pos("f"));
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let modules = vec![ModuleImports::new("loop", ["loop"])];
        assert_eq!(
            find_module_order(&modules, &[]),
            Err(GraphError::CyclicImport {
                cycle: vec!["loop".to_string(), "loop".to_string()]
            })
        );
    }

    #[test]
    fn test_indirect_cycle_reports_path() {
        let modules = vec![
            ModuleImports::new("main", ["a"]),
            ModuleImports::new("a", ["b"]),
            ModuleImports::new("b", ["a"]),
        ];
        let err = find_module_order(&modules, &[]).unwrap_err();
        assert_eq!(err.to_string(), "circular import detected: a -> b -> a");
    }

    #[test]
    fn test_duplicate_reported_before_cycle() {
        let modules = vec![
            ModuleImports::new("a", ["a"]),
            ModuleImports::new("a", []),
        ];
        assert_eq!(
            find_module_order(&modules, &[]),
            Err(GraphError::DuplicateModule {
                name: "a".to_string()
            })
        );
    }

    #[test]
    fn test_duplicate_against_external() {
        let modules = vec![ModuleImports::new("math", [])];
        assert!(matches!(
            find_module_order(&modules, &["math"]),
            Err(GraphError::DuplicateModule { .. })
        ));
    }

    #[test]
    fn test_external_imports_are_not_ordered() {
        let modules = vec![
            ModuleImports::new("main", ["math", "util"]),
            ModuleImports::new("util", ["math"]),
        ];
        assert_eq!(find_module_order(&modules, &["math"]).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_unknown_module() {
        let modules = vec![ModuleImports::new("main", ["nowhere"])];
        assert_eq!(
            find_module_order(&modules, &[]),
            Err(GraphError::UnknownModule {
                name: "nowhere".to_string(),
                importer: "main".to_string(),
            })
        );
    }

    #[test]
    fn test_repeated_import_is_harmless() {
        let modules = vec![
            ModuleImports::new("main", ["util", "util"]),
            ModuleImports::new("util", []),
        ];
        assert_eq!(find_module_order(&modules, &[]).unwrap(), vec![1, 0]);
    }
}

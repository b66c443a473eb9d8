//! Scope graph for STELA.
//!
//! Scopes form a tree rooted at a namespace holding the builtins. Every
//! module gets a namespace parented to the root; functions, closures, blocks,
//! structs and enums open child scopes of whatever scope is current.
//!
//! Scopes are never freed: leaving a scope only moves the cursor back to the
//! parent, so symbols can point at their declaring scope for the whole
//! compilation.
//!
//! # Lookup
//!
//! Lookup walks parent links with one rewrite: the parent of a *function*
//! scope is the nearest enclosing *namespace*. A named function therefore
//! never sees the locals of the body it is nested in, while a closure keeps
//! its lexical parent and does.

use std::collections::HashMap;

use crate::ast::{Access, Name};
use crate::def::{ScopeId, SymbolId};

/// The kind of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The root or a module.
    Namespace,
    /// A block inside a body.
    Block,
    /// A named function's parameters and body.
    Function,
    /// A closure's parameters and body.
    Closure,
    /// Struct members, in declaration order.
    Struct,
    /// Enum cases, in declaration order.
    Enum,
}

/// A struct member entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRow {
    pub name: Name,
    pub symbol: SymbolId,
    pub access: Access,
    pub is_static: bool,
}

/// The bindings of one scope.
#[derive(Debug, Clone)]
pub enum ScopeTable {
    /// Unordered multimap; several functions may share a name.
    Map(HashMap<Name, Vec<SymbolId>>),
    /// Struct members in declaration order.
    Members(Vec<MemberRow>),
    /// Enum cases in declaration order.
    Cases(Vec<(Name, SymbolId)>),
}

/// A scope containing bindings.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    /// The lexical parent; `None` only for the root.
    pub parent: Option<ScopeId>,
    /// The symbol that opened this scope (function, closure, struct, enum, module).
    pub owner: Option<SymbolId>,
    pub table: ScopeTable,
}

impl Scope {
    /// The symbols bound to `name` directly in this scope.
    pub fn entries(&self, name: Name) -> Vec<SymbolId> {
        match &self.table {
            ScopeTable::Map(map) => map.get(&name).cloned().unwrap_or_default(),
            ScopeTable::Members(rows) => rows
                .iter()
                .filter(|row| row.name == name)
                .map(|row| row.symbol)
                .collect(),
            ScopeTable::Cases(cases) => cases
                .iter()
                .filter(|(case, _)| *case == name)
                .map(|(_, symbol)| *symbol)
                .collect(),
        }
    }

    /// Struct member rows, empty for other scopes.
    pub fn members(&self) -> &[MemberRow] {
        match &self.table {
            ScopeTable::Members(rows) => rows,
            _ => &[],
        }
    }

    /// Enum cases, empty for other scopes.
    pub fn cases(&self) -> &[(Name, SymbolId)] {
        match &self.table {
            ScopeTable::Cases(cases) => cases,
            _ => &[],
        }
    }
}

/// The tree of every scope in a compilation plus a cursor.
#[derive(Debug, Clone)]
pub struct ScopeGraph {
    scopes: Vec<Scope>,
    cursor: ScopeId,
}

impl ScopeGraph {
    /// Create a graph holding only the root namespace.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                kind: ScopeKind::Namespace,
                parent: None,
                owner: None,
                table: ScopeTable::Map(HashMap::new()),
            }],
            cursor: ScopeId::new(0),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId::new(0)
    }

    /// The current scope.
    pub fn cursor(&self) -> ScopeId {
        self.cursor
    }

    /// Move the cursor to `scope`, returning where it was.
    pub fn set_cursor(&mut self, scope: ScopeId) -> ScopeId {
        std::mem::replace(&mut self.cursor, scope)
    }

    /// Open a new scope under the current one and make it current.
    pub fn enter(&mut self, kind: ScopeKind, owner: Option<SymbolId>) -> ScopeId {
        let table = match kind {
            ScopeKind::Struct => ScopeTable::Members(Vec::new()),
            ScopeKind::Enum => ScopeTable::Cases(Vec::new()),
            _ => ScopeTable::Map(HashMap::new()),
        };
        self.scopes.push(Scope {
            kind,
            parent: Some(self.cursor),
            owner,
            table,
        });
        self.cursor = ScopeId::from_usize(self.scopes.len() - 1);
        self.cursor
    }

    /// Return to the parent of the current scope.
    pub fn leave(&mut self) {
        if let Some(parent) = self.get(self.cursor).parent {
            self.cursor = parent;
        }
    }

    pub fn get(&self, scope: ScopeId) -> &Scope {
        &self.scopes[scope.index()]
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.get(scope).kind
    }

    pub fn set_owner(&mut self, scope: ScopeId, owner: SymbolId) {
        self.scopes[scope.index()].owner = Some(owner);
    }

    /// The scope lookup continues in after `scope`.
    pub fn lookup_parent(&self, scope: ScopeId) -> Option<ScopeId> {
        let parent = self.get(scope).parent?;
        if self.kind(scope) != ScopeKind::Function {
            return Some(parent);
        }
        let mut current = Some(parent);
        while let Some(id) = current {
            if self.kind(id) == ScopeKind::Namespace {
                return Some(id);
            }
            current = self.get(id).parent;
        }
        None
    }

    /// Whether `scope` is `ancestor` or lexically nested inside it.
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).parent;
        }
        false
    }

    /// The innermost scope, starting at `from`, that binds `name`, with its entries.
    pub fn lookup(&self, from: ScopeId, name: Name) -> Option<(ScopeId, Vec<SymbolId>)> {
        let mut current = Some(from);
        while let Some(scope) = current {
            let entries = self.get(scope).entries(name);
            if !entries.is_empty() {
                return Some((scope, entries));
            }
            current = self.lookup_parent(scope);
        }
        None
    }

    /// Every symbol bound to `name` along the lookup chain, innermost first.
    pub fn gather(&self, from: ScopeId, name: Name) -> Vec<SymbolId> {
        let mut found = Vec::new();
        let mut current = Some(from);
        while let Some(scope) = current {
            found.extend(self.get(scope).entries(name));
            current = self.lookup_parent(scope);
        }
        found
    }

    /// Bind `name` in the current scope.
    ///
    /// `conflicts` is asked about every symbol already bound to `name` in
    /// this scope; the first one it flags is returned as `Err`. On success
    /// the symbol an enclosing scope binds to `name`, if any, is returned so
    /// the caller can warn about shadowing. Struct and enum scopes never
    /// report shadowing.
    pub fn insert(
        &mut self,
        name: Name,
        symbol: SymbolId,
        conflicts: impl FnMut(SymbolId) -> bool,
    ) -> Result<Option<SymbolId>, SymbolId> {
        self.insert_row(
            MemberRow {
                name,
                symbol,
                access: Access::Public,
                is_static: false,
            },
            conflicts,
        )
    }

    /// Bind a struct member with its access and static tag.
    pub fn insert_member(
        &mut self,
        row: MemberRow,
        conflicts: impl FnMut(SymbolId) -> bool,
    ) -> Result<Option<SymbolId>, SymbolId> {
        self.insert_row(row, conflicts)
    }

    fn insert_row(
        &mut self,
        row: MemberRow,
        mut conflicts: impl FnMut(SymbolId) -> bool,
    ) -> Result<Option<SymbolId>, SymbolId> {
        let scope = self.cursor;
        if let Some(clash) = self
            .get(scope)
            .entries(row.name)
            .into_iter()
            .find(|&existing| conflicts(existing))
        {
            return Err(clash);
        }

        match &mut self.scopes[scope.index()].table {
            ScopeTable::Map(map) => map.entry(row.name).or_default().push(row.symbol),
            ScopeTable::Members(rows) => rows.push(row),
            ScopeTable::Cases(cases) => cases.push((row.name, row.symbol)),
        }

        if matches!(self.kind(scope), ScopeKind::Struct | ScopeKind::Enum) {
            return Ok(None);
        }
        Ok(self
            .lookup_parent(scope)
            .and_then(|parent| self.lookup(parent, row.name))
            .and_then(|(_, entries)| entries.first().copied()))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for ScopeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use string_interner::DefaultStringInterner;

    fn sym(n: u32) -> SymbolId {
        SymbolId::new(n)
    }

    #[test]
    fn test_enter_and_leave_keep_scopes() {
        let mut graph = ScopeGraph::new();
        let block = graph.enter(ScopeKind::Block, None);
        graph.leave();
        assert_eq!(graph.cursor(), graph.root());
        assert_eq!(graph.get(block).parent, Some(graph.root()));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_function_scope_skips_enclosing_locals() {
        let mut names = DefaultStringInterner::default();
        let x = names.get_or_intern("x");
        let mut graph = ScopeGraph::new();
        graph.enter(ScopeKind::Namespace, None);
        let outer_fn = graph.enter(ScopeKind::Function, None);
        graph.insert(x, sym(1), |_| true).unwrap();

        let nested_fn = graph.enter(ScopeKind::Function, None);
        assert!(graph.lookup(nested_fn, x).is_none());
        graph.leave();

        let closure = graph.enter(ScopeKind::Closure, None);
        assert_eq!(graph.lookup(closure, x), Some((outer_fn, vec![sym(1)])));
    }

    #[test]
    fn test_insert_reports_conflict_and_shadow() {
        let mut names = DefaultStringInterner::default();
        let f = names.get_or_intern("f");
        let mut graph = ScopeGraph::new();
        graph.insert(f, sym(1), |_| false).unwrap();
        // An overload that does not conflict is added alongside.
        assert_eq!(graph.insert(f, sym(2), |_| false), Ok(None));
        assert_eq!(graph.insert(f, sym(3), |existing| existing == sym(2)), Err(sym(2)));

        graph.enter(ScopeKind::Block, None);
        assert_eq!(graph.insert(f, sym(4), |_| true), Ok(Some(sym(1))));
        assert_eq!(graph.gather(graph.cursor(), f), vec![sym(4), sym(1), sym(2)]);
    }

    #[test]
    fn test_struct_members_keep_order() {
        let mut names = DefaultStringInterner::default();
        let (a, b) = (names.get_or_intern("a"), names.get_or_intern("b"));
        let mut graph = ScopeGraph::new();
        let s = graph.enter(ScopeKind::Struct, None);
        for (name, id) in [(b, 1), (a, 2)] {
            let row = MemberRow {
                name,
                symbol: sym(id),
                access: Access::Public,
                is_static: false,
            };
            assert_eq!(graph.insert_member(row, |_| true), Ok(None));
        }
        let order: Vec<_> = graph.get(s).members().iter().map(|r| r.name).collect();
        assert_eq!(order, vec![b, a]);
    }
}

//! Type checking context.
//!
//! The TypeContext is the main entry point for semantic analysis. It owns
//! the scope graph, the symbol table and the type table for the whole
//! compilation and analyzes one module at a time, in import order.
//!
//! Each module goes through the same phases:
//!
//! 1. Type declarations (structs, enums, aliases, host types) are declared.
//! 2. Alias targets, struct fields and host type fields are lowered.
//! 3. Function signatures are lowered and declared, free and member alike.
//! 4. Globals are declared in order, their initializers analyzed.
//! 5. Every function body not yet analyzed is checked.
//!
//! Function bodies with an unannotated return type are also analyzed on
//! demand, the first time something needs their return type.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{Ast, Ident, Module, Name, Referenceness};
use crate::config::CompilerConfig;
use crate::def::{ExprId, ScopeId, SymbolId, TypeId};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::span::Span;

use super::compare::{concrete, compare_types};
use super::error::{TypeError, TypeErrorKind, TypeResult};
use super::lifetime::{Transfer, TypeCategory};
use super::resolve::{ScopeGraph, ScopeKind};
use super::symbol::{SymbolKind, SymbolTable};
use super::types::{ExprType, Ty, TypeTable};
use super::Analysis;

mod builtins;
mod check;
mod closure;
mod collect;
mod expr;

pub(crate) use expr::ExprCtx;

/// Code of the unused-symbol warning.
pub const UNUSED_WARNING: &str = "W0001";
/// Code of the shadowing warning.
pub const SHADOW_WARNING: &str = "W0002";

/// A module that has been declared.
#[derive(Debug, Clone)]
pub(crate) struct ModuleInfo {
    pub symbol: SymbolId,
    pub scope: ScopeId,
    /// Namespaces of the direct imports, in import order.
    pub imports: Vec<ScopeId>,
}

/// Whether a body belongs to a named function or a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Function,
    Closure,
}

/// The return type of the body under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnSlot {
    Declared(TypeId),
    /// Deduced from the first return that is not a pending recursive call.
    Deduced(Option<TypeId>),
}

/// One function or closure body under analysis.
#[derive(Debug, Clone)]
pub(crate) struct FnFrame {
    /// The `Func` or `Lambda` symbol.
    pub symbol: SymbolId,
    pub kind: FrameKind,
    /// The function or closure scope.
    pub scope: ScopeId,
    pub ret: ReturnSlot,
    /// Returned pending recursive calls: `(callee, where)`.
    pub pending_returns: Vec<(SymbolId, Span)>,
    pub loop_depth: usize,
}

/// Where a value transfer happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferSite {
    /// Initializer of a local or global.
    Init,
    /// Right-hand side of an assignment.
    Assign,
    /// By-value argument of a call.
    Argument,
    /// Value of a `return`, moved into the caller's result.
    Return,
}

/// The transfer planned for one value expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    /// The source expression.
    pub expr: ExprId,
    pub ty: TypeId,
    pub site: TransferSite,
    pub transfer: Transfer,
}

/// The main type checking context.
pub struct TypeContext<'a> {
    pub(crate) ast: &'a Ast,
    pub(crate) config: &'a CompilerConfig,
    pub(crate) sink: &'a mut dyn DiagnosticSink,
    pub types: TypeTable,
    pub symbols: SymbolTable,
    pub scopes: ScopeGraph,
    /// Declared modules, by name.
    pub(crate) modules: HashMap<Name, ModuleInfo>,
    /// Module namespace scope to module name.
    pub(crate) module_scopes: HashMap<ScopeId, Name>,
    /// Bodies under analysis, innermost last.
    pub(crate) frames: Vec<FnFrame>,
    /// The type of every analyzed expression.
    pub(crate) expr_types: HashMap<ExprId, ExprType>,
    /// Identifiers read through a closure capture slot: `(closure, slot)`.
    pub(crate) captured: HashMap<ExprId, (SymbolId, usize)>,
    pub(crate) transfers: Vec<TransferRecord>,
    /// Objects declared without an initializer: `(object, type)`.
    pub(crate) default_constructed: Vec<(SymbolId, TypeId)>,
    /// Every closure, in creation order.
    pub(crate) closures: Vec<SymbolId>,
    /// Types assumed for pending recursive calls: `(function, type, where)`.
    pub(crate) assumptions: Vec<(SymbolId, TypeId, Span)>,
}

impl<'a> TypeContext<'a> {
    /// Create a context with the builtins registered in the root scope.
    pub fn new(ast: &'a Ast, config: &'a CompilerConfig, sink: &'a mut dyn DiagnosticSink) -> Self {
        let mut cx = Self {
            ast,
            config,
            sink,
            types: TypeTable::new(),
            symbols: SymbolTable::new(),
            scopes: ScopeGraph::new(),
            modules: HashMap::new(),
            module_scopes: HashMap::new(),
            frames: Vec::new(),
            expr_types: HashMap::new(),
            captured: HashMap::new(),
            transfers: Vec::new(),
            default_constructed: Vec::new(),
            closures: Vec::new(),
            assumptions: Vec::new(),
        };
        cx.register_builtins();
        cx
    }

    /// Analyze one module. Its imports must have been analyzed already.
    ///
    /// `external` marks a host-bound module: its symbols never produce
    /// unused warnings.
    pub fn check_module(&mut self, module: &Module, external: bool) -> TypeResult<()> {
        debug!(module = self.name(module.name.name), external, "analyzing module");
        let first_symbol = self.symbols.len();

        let scope = self.declare_module(module)?;
        self.with_cursor(scope, |cx| cx.collect_module(module))?;

        if external {
            for index in first_symbol..self.symbols.len() {
                self.symbols.get_mut(SymbolId::from_usize(index)).external = true;
            }
        }
        Ok(())
    }

    /// Finish the compilation: report unused symbols and hand over the tables.
    pub fn finish(mut self) -> Analysis {
        if self.config.warn_unused {
            self.report_unused();
        }
        Analysis {
            types: self.types,
            symbols: self.symbols,
            scopes: self.scopes,
            expr_types: self.expr_types,
            captured: self.captured,
            transfers: self.transfers,
            default_constructed: self.default_constructed,
            closures: self.closures,
        }
    }

    // ============================================================
    // Helpers
    // ============================================================

    /// The text of an interned name.
    pub(crate) fn name(&self, name: Name) -> &'a str {
        self.ast.name(name)
    }

    /// A readable rendering of a type for diagnostics.
    pub(crate) fn type_to_string(&self, ty: TypeId) -> String {
        match self.types.get(ty) {
            Ty::Builtin(b) => b.name().to_string(),
            Ty::Array(element) => format!("[{}]", self.type_to_string(*element)),
            Ty::Func { params, ret } => {
                let params: Vec<_> = params
                    .iter()
                    .map(|&(referenceness, ty)| match referenceness {
                        Referenceness::Ref => format!("ref {}", self.type_to_string(ty)),
                        Referenceness::Val => self.type_to_string(ty),
                    })
                    .collect();
                format!("func({}) -> {}", params.join(", "), self.type_to_string(*ret))
            }
            Ty::Struct(sym) | Ty::Enum(sym) | Ty::User(sym) | Ty::Alias(sym) => {
                self.name(self.symbols.get(*sym).name).to_string()
            }
            Ty::Pending(func) => format!("<return type of {}>", self.name(self.symbols.get(*func).name)),
        }
    }

    pub(crate) fn types_equal(&self, a: TypeId, b: TypeId) -> bool {
        compare_types(&self.types, &self.symbols, a, b)
    }

    /// `ty` with weak aliases unwrapped.
    pub(crate) fn concrete(&self, ty: TypeId) -> TypeId {
        concrete(&self.types, &self.symbols, ty)
    }

    pub(crate) fn category(&self, ty: TypeId) -> TypeCategory {
        super::lifetime::classify(&self.types, &self.symbols, ty)
    }

    /// Run `f` with the cursor at `scope`, restoring it afterwards.
    pub(crate) fn with_cursor<T>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.scopes.set_cursor(scope);
        let result = f(self);
        self.scopes.set_cursor(previous);
        result
    }

    pub(crate) fn mismatch(&self, expected: TypeId, found: TypeId, span: Span) -> Box<TypeError> {
        Box::new(TypeError::new(
            TypeErrorKind::Mismatch {
                expected: self.type_to_string(expected),
                found: self.type_to_string(found),
            },
            span,
        ))
    }

    // ============================================================
    // Declaring names
    // ============================================================

    /// Bind `symbol` in the current scope.
    ///
    /// Two functions conflict when their parameter types compare equal; any
    /// other pair sharing a name conflicts. Inside a struct or enum a
    /// conflict is a duplicate member.
    pub(crate) fn declare(&mut self, name: Ident, symbol: SymbolId) -> TypeResult<()> {
        let (types, symbols) = (&self.types, &self.symbols);
        let result = self
            .scopes
            .insert(name.name, symbol, |existing| conflicts(types, symbols, symbol, existing));
        self.finish_declare(name, symbol, result)
    }

    pub(crate) fn finish_declare(
        &mut self,
        name: Ident,
        symbol: SymbolId,
        result: Result<Option<SymbolId>, SymbolId>,
    ) -> TypeResult<()> {
        match result {
            Ok(Some(shadowed)) => {
                self.warn_shadow(name, symbol, shadowed);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(existing) => {
                let scope = self.scopes.cursor();
                let previous = self.symbols.get(existing).span;
                let kind = match self.scopes.kind(scope) {
                    ScopeKind::Struct | ScopeKind::Enum => {
                        let owner = self
                            .scopes
                            .get(scope)
                            .owner
                            .map(|owner| self.name(self.symbols.get(owner).name))
                            .unwrap_or("<anonymous>");
                        TypeErrorKind::DuplicateField {
                            owner: owner.to_string(),
                            name: self.name(name.name).to_string(),
                        }
                    }
                    _ => TypeErrorKind::Redefinition {
                        name: self.name(name.name).to_string(),
                    },
                };
                let mut err = TypeError::new(kind, name.span);
                if !previous.is_dummy() {
                    err = err.with_related(previous, "previously defined here");
                }
                err.into_err()
            }
        }
    }

    fn warn_shadow(&mut self, name: Ident, symbol: SymbolId, shadowed: SymbolId) {
        if !self.config.warn_shadow || self.name(name.name).starts_with('_') {
            return;
        }
        // Overloads extend an enclosing set rather than hide it.
        if self.symbols.get(symbol).kind.is_overloadable()
            && self.symbols.get(shadowed).kind.is_overloadable()
        {
            return;
        }
        let mut diag = Diagnostic::warning(
            format!("`{}` shadows an outer declaration", self.name(name.name)),
            name.span,
        )
        .with_code(SHADOW_WARNING);
        let previous = self.symbols.get(shadowed).span;
        if !previous.is_dummy() {
            diag = diag.with_note(previous, "shadowed declaration");
        }
        self.sink.report(&diag);
    }

    // ============================================================
    // Looking up names
    // ============================================================

    /// The module whose namespace encloses `scope`.
    pub(crate) fn module_of(&self, scope: ScopeId) -> Option<&ModuleInfo> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(name) = self.module_scopes.get(&id) {
                return self.modules.get(name);
            }
            current = self.scopes.get(id).parent;
        }
        None
    }

    /// Every symbol a name may mean from the cursor.
    ///
    /// The lexical chain wins; only when it binds nothing are the direct
    /// imports of the current module searched. A name found in two imports
    /// is ambiguous.
    pub(crate) fn lookup(&self, ident: Ident) -> TypeResult<Option<Vec<SymbolId>>> {
        let cursor = self.scopes.cursor();
        if let Some((_, entries)) = self.scopes.lookup(cursor, ident.name) {
            return Ok(Some(entries));
        }

        let Some(module) = self.module_of(cursor) else {
            return Ok(None);
        };
        let mut found: Option<Vec<SymbolId>> = None;
        for &import in &module.imports {
            let entries = self.scopes.get(import).entries(ident.name);
            if entries.is_empty() {
                continue;
            }
            if found.is_some() {
                return TypeError::new(
                    TypeErrorKind::AmbiguousReference {
                        name: self.name(ident.name).to_string(),
                    },
                    ident.span,
                )
                .with_help("qualify the name with its module")
                .into_err();
            }
            found = Some(entries);
        }
        Ok(found)
    }

    /// Every symbol bound to a name along the whole chain plus the imports,
    /// innermost first. Used to gather overload candidates.
    pub(crate) fn gather(&self, name: Name) -> Vec<SymbolId> {
        let cursor = self.scopes.cursor();
        let mut found = self.scopes.gather(cursor, name);
        if let Some(module) = self.module_of(cursor) {
            for &import in &module.imports {
                found.extend(self.scopes.get(import).entries(name));
            }
        }
        found
    }

    /// Like [`Self::lookup`] but fails when nothing is bound.
    pub(crate) fn lookup_required(&self, ident: Ident) -> TypeResult<Vec<SymbolId>> {
        match self.lookup(ident)? {
            Some(entries) => Ok(entries),
            None => TypeError::new(
                TypeErrorKind::UndefinedSymbol {
                    name: self.name(ident.name).to_string(),
                },
                ident.span,
            )
            .into_err(),
        }
    }

    // ============================================================
    // Warnings
    // ============================================================

    fn report_unused(&mut self) {
        let main = self.ast.predefined("main");
        let receiver = self.ast.predefined("self");
        let mut warnings = Vec::new();
        for (_, symbol) in self.symbols.iter() {
            if symbol.used || symbol.external || symbol.span.is_dummy() {
                continue;
            }
            if symbol.name == main || symbol.name == receiver || self.name(symbol.name).starts_with('_') {
                continue;
            }
            let what = match &symbol.kind {
                SymbolKind::Object(_) => "variable",
                SymbolKind::Func(info) if info.owner.is_none() => "function",
                SymbolKind::Struct(_) => "struct",
                SymbolKind::Enum(_) => "enum",
                SymbolKind::Alias(_) => "type alias",
                _ => continue,
            };
            warnings.push(
                Diagnostic::warning(
                    format!("unused {what} `{}`", self.name(symbol.name)),
                    symbol.span,
                )
                .with_code(UNUSED_WARNING),
            );
        }
        debug!(count = warnings.len(), "unused symbols");
        for warning in &warnings {
            self.sink.report(warning);
        }
    }
}

/// Whether `new` may not share a scope with `existing`.
fn conflicts(types: &TypeTable, symbols: &SymbolTable, new: SymbolId, existing: SymbolId) -> bool {
    match (&symbols.get(new).kind, &symbols.get(existing).kind) {
        (SymbolKind::Func(a), SymbolKind::Func(b)) => {
            a.params.len() == b.params.len()
                && a
                    .params
                    .iter()
                    .zip(&b.params)
                    .all(|(x, y)| {
                        x.referenceness == y.referenceness && compare_types(types, symbols, x.ty, y.ty)
                    })
        }
        _ => true,
    }
}

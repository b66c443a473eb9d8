//! Compilation sessions.
//!
//! A [`Session`] owns the source files and the AST arena of one compilation.
//! Modules come from source text or files, external modules from an
//! [`ExternalModuleBuilder`] describing host functions and types.
//!
//! ## Check Flow
//!
//! ```text
//! 1. Order the external modules, then the source modules
//! 2. Analyze the external modules in their order
//! 3. Analyze the source modules in their order
//! 4. Report unused symbols as warnings
//! ```
//!
//! The first error ends the compilation. It is reported to the sink and also
//! returned.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::ast::{
    Access, AliasDecl, Ast, DeclKind, FuncDecl, FuncKind, FuncSig, Ident, Module, Mutability, Param, Referenceness,
    Resolved, UserField, UserTypeDecl,
};
use crate::config::CompilerConfig;
use crate::def::{DeclId, TypeExprId};
use crate::diagnostics::{Diagnostic, DiagnosticSink, SourceFiles};
use crate::parser::Parser;
use crate::span::{FileId, Span};
use crate::typeck::{Analysis, TypeContext, TypeError, TypeResult};

use super::graph::{find_module_order, GraphError, ModuleImports};

/// Errors from loading a module into a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} syntax error(s) in {name}", diagnostics.len())]
    Parse {
        name: String,
        diagnostics: Vec<Diagnostic>,
    },
}

/// A successfully analyzed program.
#[derive(Debug)]
pub struct CheckedProgram {
    /// Source module names in analysis order.
    pub order: Vec<String>,
    pub analysis: Analysis,
}

/// One compilation.
#[derive(Debug, Default)]
pub struct Session {
    files: SourceFiles,
    ast: Ast,
    modules: Vec<Module>,
    externals: Vec<Module>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &SourceFiles {
        &self.files
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// The source modules, in the order they were added.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Parse `source` as a module. Without a `module` header the module is
    /// named after the file stem of `name`.
    pub fn add_source(&mut self, name: &str, source: &str) -> Result<usize, SessionError> {
        let file = self.files.add(name, source);
        let stem = Path::new(name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(name);
        let module = Parser::new(source, file, &mut self.ast)
            .parse_module(stem)
            .map_err(|diagnostics| SessionError::Parse {
                name: name.to_string(),
                diagnostics,
            })?;
        debug!(module = self.ast.name(module.name.name), file = name, "parsed module");
        self.modules.push(module);
        Ok(self.modules.len() - 1)
    }

    /// Read and parse a module file.
    pub fn add_file(&mut self, path: &Path) -> Result<usize, SessionError> {
        let source = fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_source(&path.display().to_string(), &source)
    }

    /// Start declaring a host-bound module.
    pub fn external(&mut self, name: &str) -> ExternalModuleBuilder<'_> {
        let file = self.files.add(format!("<host:{name}>"), "");
        let name = Ident {
            name: self.ast.intern(name),
            span: Span::dummy().in_file(file),
        };
        ExternalModuleBuilder {
            session: self,
            module: Module {
                name,
                imports: Vec::new(),
                decls: Vec::new(),
                file,
            },
            errors: Vec::new(),
        }
    }

    /// The analysis order of the source modules, as indices.
    pub fn module_order(&self) -> Result<Vec<usize>, GraphError> {
        let externals: Vec<&str> = self
            .externals
            .iter()
            .map(|m| self.ast.name(m.name.name))
            .collect();
        find_module_order(&self.imports_of(&self.modules), &externals)
    }

    fn imports_of<'s>(&'s self, modules: &'s [Module]) -> Vec<ModuleImports<'s>> {
        modules
            .iter()
            .map(|m| {
                ModuleImports::new(
                    self.ast.name(m.name.name),
                    m.imports.iter().map(|import| self.ast.name(import.name)),
                )
            })
            .collect()
    }

    /// Analyze every module.
    pub fn check(&self, config: &CompilerConfig, sink: &mut dyn DiagnosticSink) -> TypeResult<CheckedProgram> {
        let result = self.analyze(config, &mut *sink);
        if let Err(err) = &result {
            sink.report(&err.to_diagnostic());
        }
        result
    }

    fn analyze(&self, config: &CompilerConfig, sink: &mut dyn DiagnosticSink) -> TypeResult<CheckedProgram> {
        let external_order = find_module_order(&self.imports_of(&self.externals), &[])
            .map_err(|err| self.graph_error(err, &self.externals))?;
        let order = self
            .module_order()
            .map_err(|err| self.graph_error(err, &self.modules))?;

        let mut cx = TypeContext::new(&self.ast, config, sink);
        for &index in &external_order {
            cx.check_module(&self.externals[index], true)?;
        }
        for &index in &order {
            cx.check_module(&self.modules[index], false)?;
        }

        let order: Vec<String> = order
            .iter()
            .map(|&index| self.ast.name(self.modules[index].name.name).to_string())
            .collect();
        info!(modules = order.len(), externals = external_order.len(), "analysis complete");
        Ok(CheckedProgram {
            order,
            analysis: cx.finish(),
        })
    }

    /// Attribute a graph error to the header of the module it is about.
    fn graph_error(&self, err: GraphError, modules: &[Module]) -> Box<TypeError> {
        let about = match &err {
            GraphError::DuplicateModule { name } => name.as_str(),
            GraphError::UnknownModule { importer, .. } => importer.as_str(),
            GraphError::CyclicImport { cycle } => cycle.first().map_or("", String::as_str),
        };
        let span = modules
            .iter()
            .rev()
            .find(|m| self.ast.name(m.name.name) == about)
            .map_or_else(Span::dummy, |m| m.name.span);
        Box::new(TypeError::from_graph(err, span))
    }
}

/// Declares the contents of a host-bound module.
///
/// Types are written in STELA syntax, e.g. `"[sint]"` or
/// `"func(ref real) -> bool"`.
///
/// ```rust
/// use stelac::project::Session;
///
/// let mut session = Session::new();
/// session
///     .external("host")
///     .func("clock", &[], Some("uint"))
///     .func("sqrt", &[("x", "real")], Some("real"))
///     .finish()
///     .expect("valid host module");
/// ```
pub struct ExternalModuleBuilder<'s> {
    session: &'s mut Session,
    module: Module,
    errors: Vec<Diagnostic>,
}

impl ExternalModuleBuilder<'_> {
    /// Import another module already declared in the session.
    pub fn import(mut self, name: &str) -> Self {
        let ident = self.ident(name);
        self.module.imports.push(ident);
        self
    }

    /// A host function taking `params` by value.
    pub fn func(self, name: &str, params: &[(&str, &str)], ret: Option<&str>) -> Self {
        let params: Vec<_> = params.iter().map(|&(n, t)| (n, Referenceness::Val, t)).collect();
        self.func_with_refs(name, &params, ret)
    }

    /// A host function with explicit parameter referenceness.
    pub fn func_with_refs(mut self, name: &str, params: &[(&str, Referenceness, &str)], ret: Option<&str>) -> Self {
        let mut lowered = Vec::with_capacity(params.len());
        for &(param, referenceness, ty) in params {
            let Some(ty) = self.parse_type(ty) else {
                return self;
            };
            lowered.push(Param {
                name: self.ident(param),
                mutability: Mutability::Let,
                referenceness,
                ty,
                span: self.span(),
                resolved: Resolved::new(),
            });
        }
        let ret = match ret {
            Some(ret) => match self.parse_type(ret) {
                Some(ret) => Some(ret),
                None => return self,
            },
            None => None,
        };

        let decl = FuncDecl {
            name: self.ident(name),
            sig: FuncSig {
                params: lowered,
                ret,
                body: None,
            },
            kind: FuncKind::Free,
            access: Access::Public,
        };
        self.push(DeclKind::Func(decl));
        self
    }

    /// A host type with the given layout and `(name, type, offset)` fields.
    pub fn user_type(mut self, name: &str, size: u64, align: u64, fields: &[(&str, &str, u64)]) -> Self {
        let mut lowered = Vec::with_capacity(fields.len());
        for &(field, ty, offset) in fields {
            let Some(ty) = self.parse_type(ty) else {
                return self;
            };
            lowered.push(UserField {
                name: self.ident(field),
                ty,
                offset,
            });
        }
        let decl = UserTypeDecl {
            name: self.ident(name),
            size,
            align,
            fields: lowered,
        };
        self.push(DeclKind::UserType(decl));
        self
    }

    /// A type alias; `strong` makes it a distinct nominal type.
    pub fn alias(mut self, name: &str, target: &str, strong: bool) -> Self {
        let Some(target) = self.parse_type(target) else {
            return self;
        };
        let decl = AliasDecl {
            name: self.ident(name),
            target,
            strong,
        };
        self.push(DeclKind::Alias(decl));
        self
    }

    /// Add the module to the session, or return every type that failed to parse.
    pub fn finish(self) -> Result<(), SessionError> {
        if !self.errors.is_empty() {
            return Err(SessionError::Parse {
                name: format!("<host:{}>", self.session.ast.name(self.module.name.name)),
                diagnostics: self.errors,
            });
        }
        debug!(
            module = self.session.ast.name(self.module.name.name),
            decls = self.module.decls.len(),
            "declared external module"
        );
        self.session.externals.push(self.module);
        Ok(())
    }

    fn span(&self) -> Span {
        Span::dummy().in_file(self.module.file)
    }

    fn ident(&mut self, name: &str) -> Ident {
        Ident {
            name: self.session.ast.intern(name),
            span: self.span(),
        }
    }

    fn push(&mut self, kind: DeclKind) -> DeclId {
        let span = self.span();
        let decl = self.session.ast.alloc_decl(kind, span);
        self.module.decls.push(decl);
        decl
    }

    fn parse_type(&mut self, source: &str) -> Option<TypeExprId> {
        let file: FileId = self.session.files.add(format!("<host type `{source}`>"), source);
        match Parser::new(source, file, &mut self.session.ast).parse_standalone_type() {
            Ok(ty) => Some(ty),
            Err(mut errors) => {
                self.errors.append(&mut errors);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::typeck::TypeErrorKind;

    fn check(session: &Session) -> (TypeResult<CheckedProgram>, CollectingSink) {
        let config = CompilerConfig::default();
        let mut sink = CollectingSink::new();
        let result = session.check(&config, &mut sink);
        (result, sink)
    }

    #[test]
    fn test_modules_are_checked_after_their_imports() {
        let mut session = Session::new();
        session.add_source("app.stela", "import util;\nfunc main() { util.helper(); }").unwrap();
        session.add_source("util.stela", "func helper() {}").unwrap();

        let (result, sink) = check(&session);
        let program = result.unwrap();
        assert_eq!(program.order, vec!["util", "app"]);
        assert_eq!(sink.errors().count(), 0);
    }

    #[test]
    fn test_module_header_overrides_file_stem() {
        let mut session = Session::new();
        let index = session.add_source("whatever.stela", "module geometry;\nfunc area() {}").unwrap();
        let module = &session.modules()[index];
        assert_eq!(session.ast().name(module.name.name), "geometry");
    }

    #[test]
    fn test_syntax_errors_are_returned() {
        let mut session = Session::new();
        let err = session.add_source("bad.stela", "func (").unwrap_err();
        match err {
            SessionError::Parse { name, diagnostics } => {
                assert_eq!(name, "bad.stela");
                assert!(!diagnostics.is_empty());
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn test_self_import_is_reported_to_the_sink() {
        let mut session = Session::new();
        session.add_source("loop.stela", "import loop;").unwrap();

        let (result, sink) = check(&session);
        let err = result.unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::CyclicImport { .. }));
        assert_eq!(sink.errors().count(), 1);
    }

    #[test]
    fn test_host_functions_are_callable() {
        let mut session = Session::new();
        session
            .external("host")
            .func("sqrt", &[("x", "real")], Some("real"))
            .func_with_refs("fill", &[("xs", Referenceness::Ref, "[real]")], None)
            .finish()
            .unwrap();
        session
            .add_source(
                "app.stela",
                "import host;\nfunc main() { var xs: [real] = []; host.fill(xs); let r = sqrt(2.0); }",
            )
            .unwrap();

        let (result, _) = check(&session);
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[test]
    fn test_host_module_name_clashes_with_source_module() {
        let mut session = Session::new();
        session.external("io").finish().unwrap();
        session.add_source("io.stela", "func f() {}").unwrap();

        let (result, _) = check(&session);
        assert!(matches!(
            result.unwrap_err().kind,
            TypeErrorKind::DuplicateModule { .. }
        ));
    }

    #[test]
    fn test_bad_host_type_is_rejected() {
        let mut session = Session::new();
        let result = session.external("host").func("f", &[("x", "[")], None).finish();
        assert!(matches!(result, Err(SessionError::Parse { .. })));
    }
}

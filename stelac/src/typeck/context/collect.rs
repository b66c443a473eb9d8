//! Declaration collection for the type checker.
//!
//! This module declares a module's names in its namespace and lowers the
//! syntactic types of declarations into semantic types.

use crate::ast::{DeclKind, FuncKind, Ident, Module, StructMember, TypeExprKind};
use crate::def::{DeclId, ScopeId, SymbolId, TypeExprId, TypeId};

use super::{conflicts, ModuleInfo, TypeContext};
use super::super::error::{TypeError, TypeErrorKind, TypeResult};
use super::super::resolve::{MemberRow, ScopeKind};
use super::super::symbol::{
    AliasInfo, AliasState, BodyState, EnumCaseInfo, EnumInfo, FieldInfo, FuncInfo, ObjectInfo,
    ObjectOrigin, StructInfo, SymbolKind, UserTypeInfo,
};
use super::super::types::{ExprType, Ty};

impl<'a> TypeContext<'a> {
    /// Create the namespace of `module` and bind its imports in it.
    pub(crate) fn declare_module(&mut self, module: &Module) -> TypeResult<ScopeId> {
        let name = module.name;
        if self.modules.contains_key(&name.name) {
            return TypeError::new(
                TypeErrorKind::DuplicateModule {
                    name: self.name(name.name).to_string(),
                },
                name.span,
            )
            .into_err();
        }

        let root = self.scopes.root();
        let scope = self.with_cursor(root, |cx| cx.scopes.enter(ScopeKind::Namespace, None));
        let symbol = self
            .symbols
            .alloc(name.name, name.span, SymbolKind::Module { scope }, root);
        self.scopes.set_owner(scope, symbol);

        let mut imports = Vec::new();
        for import in &module.imports {
            let Some(target) = self.modules.get(&import.name) else {
                return TypeError::new(
                    TypeErrorKind::UnknownModule {
                        name: self.name(import.name).to_string(),
                        importer: self.name(name.name).to_string(),
                    },
                    import.span,
                )
                .into_err();
            };
            let (target_symbol, target_scope) = (target.symbol, target.scope);
            if imports.contains(&target_scope) {
                continue;
            }
            imports.push(target_scope);
            self.with_cursor(scope, |cx| cx.declare(*import, target_symbol))?;
        }

        self.modules.insert(
            name.name,
            ModuleInfo {
                symbol,
                scope,
                imports,
            },
        );
        self.module_scopes.insert(scope, name.name);
        Ok(scope)
    }

    /// Declare and analyze every declaration of `module`. The cursor must be
    /// at the module's namespace.
    pub(crate) fn collect_module(&mut self, module: &Module) -> TypeResult<()> {
        let ast = self.ast;

        for &decl in &module.decls {
            self.declare_type_decl(decl)?;
        }
        for &decl in &module.decls {
            self.complete_type_decl(decl)?;
        }

        let mut funcs = Vec::new();
        for &decl in &module.decls {
            match &ast.decl(decl).kind {
                DeclKind::Func(_) => funcs.push(self.declare_func(decl, None)?),
                DeclKind::Struct(strukt) => {
                    let owner = self.decl_symbol(decl);
                    let scope = self.struct_scope(owner);
                    for member in &strukt.members {
                        if let StructMember::Func(member) = member {
                            let func = self.with_cursor(scope, |cx| cx.declare_func(*member, Some(owner)))?;
                            funcs.push(func);
                        }
                    }
                }
                _ => {}
            }
        }

        for &decl in &module.decls {
            if let DeclKind::Global(global) = &ast.decl(decl).kind {
                self.check_local(global, true)?;
            }
        }

        for func in funcs {
            self.check_func_body(func)?;
        }
        Ok(())
    }

    fn decl_symbol(&self, decl: DeclId) -> SymbolId {
        match self.ast.decl(decl).resolved.get() {
            Some(symbol) => symbol,
            None => unreachable!("declaration {decl} collected before it was declared"),
        }
    }

    fn struct_scope(&self, strukt: SymbolId) -> ScopeId {
        match &self.symbols.get(strukt).kind {
            SymbolKind::Struct(info) => info.scope,
            _ => self.scopes.cursor(),
        }
    }

    /// Declare a struct, enum, alias or host type.
    fn declare_type_decl(&mut self, decl: DeclId) -> TypeResult<()> {
        let ast = self.ast;
        let node = ast.decl(decl);
        let name = node.kind.name();
        let cursor = self.scopes.cursor();
        let placeholder = self.types.void();

        let symbol = match &node.kind {
            DeclKind::Struct(_) => {
                let scope = self.scopes.enter(ScopeKind::Struct, None);
                self.scopes.leave();
                let kind = SymbolKind::Struct(StructInfo {
                    decl,
                    scope,
                    fields: Vec::new(),
                    ty: placeholder,
                });
                let symbol = self.symbols.alloc(name.name, name.span, kind, cursor);
                self.scopes.set_owner(scope, symbol);
                let ty = self.types.intern(Ty::Struct(symbol));
                if let SymbolKind::Struct(info) = &mut self.symbols.get_mut(symbol).kind {
                    info.ty = ty;
                }
                symbol
            }
            DeclKind::Enum(enumeration) => {
                let scope = self.scopes.enter(ScopeKind::Enum, None);
                self.scopes.leave();
                let kind = SymbolKind::Enum(EnumInfo {
                    decl,
                    scope,
                    ty: placeholder,
                });
                let symbol = self.symbols.alloc(name.name, name.span, kind, cursor);
                self.scopes.set_owner(scope, symbol);
                let ty = self.types.intern(Ty::Enum(symbol));
                if let SymbolKind::Enum(info) = &mut self.symbols.get_mut(symbol).kind {
                    info.ty = ty;
                }

                let mut next = 0i64;
                for case in &enumeration.cases {
                    let value = case.value.unwrap_or(next);
                    next = value.wrapping_add(1);
                    let case_symbol = self.symbols.alloc(
                        case.name.name,
                        case.name.span,
                        SymbolKind::EnumCase(EnumCaseInfo {
                            owner: symbol,
                            value,
                        }),
                        scope,
                    );
                    self.with_cursor(scope, |cx| cx.declare(case.name, case_symbol))?;
                }
                symbol
            }
            DeclKind::Alias(alias) => {
                let kind = SymbolKind::Alias(AliasInfo {
                    decl,
                    strong: alias.strong,
                    target: AliasState::Unresolved,
                    ty: placeholder,
                });
                let symbol = self.symbols.alloc(name.name, name.span, kind, cursor);
                let ty = self.types.intern(Ty::Alias(symbol));
                if let SymbolKind::Alias(info) = &mut self.symbols.get_mut(symbol).kind {
                    info.ty = ty;
                }
                symbol
            }
            DeclKind::UserType(user) => {
                let kind = SymbolKind::UserType(UserTypeInfo {
                    decl,
                    size: user.size,
                    align: user.align,
                    fields: Vec::new(),
                    ty: placeholder,
                });
                let symbol = self.symbols.alloc(name.name, name.span, kind, cursor);
                let ty = self.types.intern(Ty::User(symbol));
                if let SymbolKind::UserType(info) = &mut self.symbols.get_mut(symbol).kind {
                    info.ty = ty;
                }
                symbol
            }
            DeclKind::Func(_) | DeclKind::Global(_) => return Ok(()),
        };

        node.resolved.set(symbol);
        self.declare(name, symbol)
    }

    /// Lower the parts of a type declaration that may name other types.
    fn complete_type_decl(&mut self, decl: DeclId) -> TypeResult<()> {
        let ast = self.ast;
        match &ast.decl(decl).kind {
            DeclKind::Alias(_) => {
                let symbol = self.decl_symbol(decl);
                self.ensure_alias(symbol)
            }
            DeclKind::Struct(strukt) => {
                let owner = self.decl_symbol(decl);
                let scope = self.struct_scope(owner);
                let mut fields = Vec::new();
                for member in &strukt.members {
                    let StructMember::Field(field) = member else {
                        continue;
                    };
                    let ty = self.lower_type(field.ty)?;
                    let symbol = self.symbols.alloc(
                        field.name.name,
                        field.name.span,
                        SymbolKind::Field(FieldInfo {
                            owner,
                            ty,
                            access: field.access,
                            index: fields.len(),
                        }),
                        scope,
                    );
                    let row = MemberRow {
                        name: field.name.name,
                        symbol,
                        access: field.access,
                        is_static: false,
                    };
                    self.insert_member(scope, field.name, row)?;
                    fields.push(symbol);
                }
                if let SymbolKind::Struct(info) = &mut self.symbols.get_mut(owner).kind {
                    info.fields = fields;
                }
                Ok(())
            }
            DeclKind::UserType(user) => {
                let symbol = self.decl_symbol(decl);
                let mut fields = Vec::new();
                for field in &user.fields {
                    if fields.iter().any(|&(name, _, _)| name == field.name.name) {
                        return TypeError::new(
                            TypeErrorKind::DuplicateField {
                                owner: self.name(user.name.name).to_string(),
                                name: self.name(field.name.name).to_string(),
                            },
                            field.name.span,
                        )
                        .into_err();
                    }
                    let ty = self.lower_type(field.ty)?;
                    fields.push((field.name.name, ty, field.offset));
                }
                if let SymbolKind::UserType(info) = &mut self.symbols.get_mut(symbol).kind {
                    info.fields = fields;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Bind a struct member row in `scope`.
    fn insert_member(&mut self, scope: ScopeId, name: Ident, row: MemberRow) -> TypeResult<()> {
        let symbol = row.symbol;
        self.with_cursor(scope, |cx| {
            let (types, symbols) = (&cx.types, &cx.symbols);
            let result = cx
                .scopes
                .insert_member(row, |existing| conflicts(types, symbols, symbol, existing));
            cx.finish_declare(name, symbol, result)
        })
    }

    /// Lower a function signature and bind the function in the current
    /// scope, or as a member of `owner`.
    pub(crate) fn declare_func(&mut self, decl: DeclId, owner: Option<SymbolId>) -> TypeResult<SymbolId> {
        let ast = self.ast;
        let Some(func) = ast.func_decl(decl) else {
            unreachable!("declaration {decl} is not a function");
        };

        let mut params = Vec::with_capacity(func.sig.params.len());
        for param in &func.sig.params {
            let ty = self.lower_type(param.ty)?;
            params.push(ExprType::new(ty, param.mutability, param.referenceness));
        }
        let ret = match (func.sig.ret, &func.sig.body) {
            (Some(ret), _) => Some(self.lower_type(ret)?),
            (None, None) => Some(self.types.void()),
            (None, Some(_)) => None,
        };
        let state = if func.sig.body.is_some() {
            BodyState::Unchecked
        } else {
            BodyState::Done
        };

        let cursor = self.scopes.cursor();
        let symbol = self.symbols.alloc(
            func.name.name,
            func.name.span,
            SymbolKind::Func(FuncInfo {
                decl,
                params,
                ret,
                kind: func.kind,
                access: func.access,
                owner,
                state,
                body_scope: None,
            }),
            cursor,
        );
        ast.decl(decl).resolved.set(symbol);

        match owner {
            Some(_) => {
                let row = MemberRow {
                    name: func.name.name,
                    symbol,
                    access: func.access,
                    is_static: func.kind == FuncKind::Static,
                };
                self.insert_member(cursor, func.name, row)?;
            }
            None => self.declare(func.name, symbol)?,
        }
        Ok(symbol)
    }

    // ============================================================
    // Type lowering
    // ============================================================

    /// Lower a syntactic type, memoizing the result on the node.
    pub(crate) fn lower_type(&mut self, id: TypeExprId) -> TypeResult<TypeId> {
        let ast = self.ast;
        let node = ast.type_expr(id);
        if let Some(ty) = node.lowered.get() {
            return Ok(ty);
        }

        let ty = match &node.kind {
            TypeExprKind::Named(path) => {
                let symbol = self.resolve_type_path(path, id)?;
                self.type_of_symbol(symbol)?
            }
            TypeExprKind::Array(element) => {
                let element = self.lower_type(*element)?;
                self.types.array_of(element)
            }
            TypeExprKind::Func { params, ret } => {
                let mut lowered = Vec::with_capacity(params.len());
                for &(referenceness, param) in params {
                    lowered.push((referenceness, self.lower_type(param)?));
                }
                let ret = match ret {
                    Some(ret) => self.lower_type(*ret)?,
                    None => self.types.void(),
                };
                self.types.func(lowered, ret)
            }
        };
        node.lowered.set(ty);
        Ok(ty)
    }

    /// Resolve `name` or `module.name` to a type symbol.
    fn resolve_type_path(&mut self, path: &[Ident], id: TypeExprId) -> TypeResult<SymbolId> {
        let node = self.ast.type_expr(id);
        if let Some(symbol) = node.resolved.get() {
            return Ok(symbol);
        }

        let (last, entries) = match path {
            [name] => (*name, self.lookup(*name)?.unwrap_or_default()),
            [module, name] => {
                let scope = match self.lookup(*module)?.as_deref() {
                    Some([symbol, ..]) => match self.symbols.get(*symbol).kind {
                        SymbolKind::Module { scope } => {
                            self.symbols.mark_used(*symbol);
                            scope
                        }
                        _ => return self.not_a_type(*module),
                    },
                    _ => return self.undefined_type(*module),
                };
                (*name, self.scopes.get(scope).entries(name.name))
            }
            _ => return self.undefined_type(path[path.len() - 1]),
        };

        let Some(&symbol) = entries.first() else {
            return self.undefined_type(last);
        };
        if !self.symbols.get(symbol).kind.is_type() {
            return self.not_a_type(last);
        }
        self.symbols.mark_used(symbol);
        node.resolved.set(symbol);
        Ok(symbol)
    }

    fn undefined_type<T>(&self, name: Ident) -> TypeResult<T> {
        TypeError::new(
            TypeErrorKind::UndefinedType {
                name: self.name(name.name).to_string(),
            },
            name.span,
        )
        .into_err()
    }

    fn not_a_type<T>(&self, name: Ident) -> TypeResult<T> {
        TypeError::new(
            TypeErrorKind::NotAType {
                name: self.name(name.name).to_string(),
            },
            name.span,
        )
        .into_err()
    }

    /// The type a type symbol names.
    pub(crate) fn type_of_symbol(&mut self, symbol: SymbolId) -> TypeResult<TypeId> {
        match &self.symbols.get(symbol).kind {
            SymbolKind::BuiltinType(builtin) => Ok(self.types.builtin(*builtin)),
            SymbolKind::Struct(info) => Ok(info.ty),
            SymbolKind::Enum(info) => Ok(info.ty),
            SymbolKind::UserType(info) => Ok(info.ty),
            SymbolKind::Alias(info) => {
                let ty = info.ty;
                self.ensure_alias(symbol)?;
                Ok(ty)
            }
            other => unreachable!("{} used as a type", other.describe()),
        }
    }

    /// Lower the target of an alias, detecting alias cycles.
    fn ensure_alias(&mut self, symbol: SymbolId) -> TypeResult<()> {
        let (decl, state) = match &self.symbols.get(symbol).kind {
            SymbolKind::Alias(info) => (info.decl, info.target),
            _ => return Ok(()),
        };
        let span = self.symbols.get(symbol).span;

        match state {
            AliasState::Resolved(_) => Ok(()),
            AliasState::Resolving => TypeError::new(
                TypeErrorKind::RecursiveAlias {
                    name: self.name(self.symbols.get(symbol).name).to_string(),
                },
                span,
            )
            .into_err(),
            AliasState::Unresolved => {
                self.set_alias_state(symbol, AliasState::Resolving);
                let target_expr = match &self.ast.decl(decl).kind {
                    DeclKind::Alias(alias) => alias.target,
                    _ => unreachable!("alias symbol for a non-alias declaration"),
                };
                let scope = self.symbols.get(symbol).scope;
                let target = self.with_cursor(scope, |cx| cx.lower_type(target_expr))?;
                self.set_alias_state(symbol, AliasState::Resolved(target));
                Ok(())
            }
        }
    }

    fn set_alias_state(&mut self, symbol: SymbolId, state: AliasState) {
        if let SymbolKind::Alias(info) = &mut self.symbols.get_mut(symbol).kind {
            info.target = state;
        }
    }

    /// Declare an object in the current scope.
    pub(crate) fn declare_object(&mut self, name: Ident, ty: ExprType, origin: ObjectOrigin) -> TypeResult<SymbolId> {
        let cursor = self.scopes.cursor();
        let symbol = self.symbols.alloc(
            name.name,
            name.span,
            SymbolKind::Object(ObjectInfo { ty, origin }),
            cursor,
        );
        self.declare(name, symbol)?;
        Ok(symbol)
    }
}

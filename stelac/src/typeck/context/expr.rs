//! Expression type inference.
//!
//! Every expression is visited once, with an [`ExprCtx`] saying what its
//! parent does with it. Identifiers and member accesses use the context to
//! decide between reading a value, selecting a function overload for a call
//! and a condition test.
//!
//! # Recursive calls
//!
//! A call to a function whose body is still being analyzed and whose return
//! type is not known yet has the placeholder type `Ty::Pending`. A pending
//! value may only be an operand of a binary operator, a branch of a ternary
//! or a returned value. As an operand or branch it takes the type of the
//! other side, and that type is recorded as an assumption checked once the
//! function's return type is known. Anywhere else it is an error.

use crate::ast::{
    Access, BinOp, ExprKind, FuncKind, Ident, IntSuffix, Literal, Mutability, Referenceness, UnaryOp,
};
use crate::def::{ExprId, SymbolId, TypeId};
use crate::span::Span;

use super::{FrameKind, TransferSite, TypeContext};
use super::super::compare::representation;
use super::super::error::{ReturnProblem, TypeError, TypeErrorKind, TypeResult};
use super::super::resolve::MemberRow;
use super::super::symbol::{BodyState, SymbolKind};
use super::super::types::{BuiltinType, ExprType, Ty};

/// What the parent of an expression does with it.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ExprCtx<'c> {
    /// Reads the value.
    Value,
    /// Calls it with arguments of these types.
    Callee(&'c [ExprType]),
    /// Tests it in an `if`, `while` or ternary.
    ///
    /// Only these accept a function value for its emptiness. Operands of
    /// `&&`, `||` and `!` are plain values and must be `bool`.
    Condition,
}

/// Operator classes of the operator table.
enum OpClass {
    Logic,
    Bitwise,
    Equality,
    Ordering,
    Arithmetic,
}

fn op_class(op: BinOp) -> OpClass {
    match op {
        BinOp::And | BinOp::Or => OpClass::Logic,
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => OpClass::Bitwise,
        BinOp::Eq | BinOp::Ne => OpClass::Equality,
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => OpClass::Ordering,
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => OpClass::Arithmetic,
    }
}

impl<'a> TypeContext<'a> {
    /// Type an expression and record the result.
    pub(crate) fn visit_expr(&mut self, id: ExprId, ctx: ExprCtx<'_>) -> TypeResult<ExprType> {
        self.visit_expr_expecting(id, ctx, None)
    }

    /// Type an expression read as a plain value; pending types are rejected.
    pub(crate) fn visit_value(&mut self, id: ExprId) -> TypeResult<ExprType> {
        let et = self.visit_expr(id, ExprCtx::Value)?;
        self.require_known(et, self.ast.expr(id).span)
    }

    /// Type a value whose type is known from context, which is what lets
    /// `[]` be typed.
    pub(crate) fn visit_expecting(&mut self, id: ExprId, expected: Option<TypeId>) -> TypeResult<ExprType> {
        let et = self.visit_expr_expecting(id, ExprCtx::Value, expected)?;
        self.require_known(et, self.ast.expr(id).span)
    }

    pub(crate) fn visit_expr_expecting(
        &mut self,
        id: ExprId,
        ctx: ExprCtx<'_>,
        expected: Option<TypeId>,
    ) -> TypeResult<ExprType> {
        let ast = self.ast;
        let expr = ast.expr(id);
        let span = expr.span;

        let et = match &expr.kind {
            ExprKind::Literal(literal) => ExprType::value(self.literal_type(literal)),
            ExprKind::Ident(ident) => self.visit_ident(id, *ident, ctx)?,
            ExprKind::Member { object, member } => self.visit_member(id, *object, *member, ctx)?,
            ExprKind::Call { callee, args } => self.visit_call(*callee, args, span)?,
            ExprKind::Index { base, index } => self.visit_index(*base, *index)?,
            ExprKind::Unary { op, operand } => self.visit_unary(*op, *operand, span)?,
            ExprKind::Binary { op, lhs, rhs } => self.visit_binary(*op, *lhs, *rhs, span)?,
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => self.visit_ternary(*cond, *then_expr, *else_expr)?,
            ExprKind::Array(elements) => self.visit_array(elements, expected, span)?,
            ExprKind::Closure(sig) => self.visit_closure(id, sig, span)?,
        };

        if let ExprCtx::Condition = ctx {
            self.check_condition(et, span)?;
        }
        self.expr_types.insert(id, et);
        Ok(et)
    }

    fn literal_type(&mut self, literal: &Literal) -> TypeId {
        let builtin = match literal {
            Literal::Int { suffix, .. } => match suffix {
                IntSuffix::None => BuiltinType::Sint,
                IntSuffix::Uint => BuiltinType::Uint,
                IntSuffix::Byte => BuiltinType::Byte,
            },
            Literal::Real(_) => BuiltinType::Real,
            Literal::Char(_) => BuiltinType::Char,
            Literal::Bool(_) => BuiltinType::Bool,
            Literal::Str(_) => {
                let char_ty = self.types.builtin(BuiltinType::Char);
                return self.types.array_of(char_ty);
            }
        };
        self.types.builtin(builtin)
    }

    /// Conditions take `bool`, or a function value tested for emptiness.
    fn check_condition(&self, et: ExprType, span: Span) -> TypeResult<()> {
        let et = self.require_known(et, span)?;
        match self.types.get(self.concrete(et.ty)) {
            Ty::Builtin(BuiltinType::Bool) | Ty::Func { .. } => Ok(()),
            _ => Err(self.mismatch(self.types.bool(), et.ty, span)),
        }
    }

    // ============================================================
    // Pending recursive calls
    // ============================================================

    pub(crate) fn pending_of(&self, et: ExprType) -> Option<SymbolId> {
        self.types.pending_of(et.ty)
    }

    pub(crate) fn require_known(&self, et: ExprType, span: Span) -> TypeResult<ExprType> {
        match self.pending_of(et) {
            Some(func) => TypeError::new(
                TypeErrorKind::MissingOrBadReturn {
                    reason: ReturnProblem::RecursiveCallOutsideReturn {
                        function: self.name(self.symbols.get(func).name).to_string(),
                    },
                },
                span,
            )
            .with_help("annotate the function's return type")
            .into_err(),
            None => Ok(et),
        }
    }

    /// Let a pending side of a pair adopt the type of the other side.
    fn settle_pending(&mut self, a: &mut ExprType, b: &mut ExprType, span: Span) {
        match (self.pending_of(*a), self.pending_of(*b)) {
            (Some(func), None) => {
                self.assumptions.push((func, b.ty, span));
                a.ty = b.ty;
            }
            (None, Some(func)) => {
                self.assumptions.push((func, a.ty, span));
                b.ty = a.ty;
            }
            _ => {}
        }
    }

    // ============================================================
    // Names
    // ============================================================

    fn visit_ident(&mut self, id: ExprId, ident: Ident, ctx: ExprCtx<'_>) -> TypeResult<ExprType> {
        match ctx {
            ExprCtx::Callee(args) => {
                let candidates = self.gather(ident.name);
                if candidates.is_empty() {
                    self.lookup_required(ident)?;
                }
                self.resolve_overload(id, ident, candidates, args)
            }
            ExprCtx::Value | ExprCtx::Condition => {
                let entries = self.lookup_required(ident)?;
                self.value_of(id, ident, &entries)
            }
        }
    }

    /// The value a name denotes, given the symbols it resolved to.
    fn value_of(&mut self, id: ExprId, ident: Ident, entries: &[SymbolId]) -> TypeResult<ExprType> {
        let Some(&symbol) = entries.first() else {
            return TypeError::new(
                TypeErrorKind::UndefinedSymbol {
                    name: self.name(ident.name).to_string(),
                },
                ident.span,
            )
            .into_err();
        };

        match &self.symbols.get(symbol).kind {
            SymbolKind::Object(info) => {
                let et = info.ty;
                self.use_symbol(id, symbol);
                self.note_capture(id, symbol);
                Ok(et)
            }
            SymbolKind::Func(_) => {
                if entries.len() > 1 {
                    return TypeError::new(
                        TypeErrorKind::AmbiguousReference {
                            name: self.name(ident.name).to_string(),
                        },
                        ident.span,
                    )
                    .with_help("an overloaded function can only be called")
                    .into_err();
                }
                self.use_symbol(id, symbol);
                let ty = self.func_type(symbol)?;
                self.require_known(ExprType::value(self.func_ret(ty)), ident.span)?;
                Ok(ExprType::value(ty))
            }
            _ => TypeError::new(
                TypeErrorKind::NotAValue {
                    name: self.name(ident.name).to_string(),
                },
                ident.span,
            )
            .into_err(),
        }
    }

    fn use_symbol(&mut self, id: ExprId, symbol: SymbolId) {
        self.symbols.mark_used(symbol);
        self.ast.expr(id).resolved.set(symbol);
    }

    fn func_ret(&self, func_ty: TypeId) -> TypeId {
        match self.types.get(func_ty) {
            Ty::Func { ret, .. } => *ret,
            _ => func_ty,
        }
    }

    /// The return type of a function, analyzing its body first if the type
    /// has to be deduced. Pending while the body is under analysis.
    pub(crate) fn func_return(&mut self, func: SymbolId) -> TypeResult<TypeId> {
        let Some(info) = self.symbols.func(func) else {
            return Ok(self.types.void());
        };
        if let Some(ret) = info.ret {
            return Ok(ret);
        }
        match info.state {
            BodyState::Unchecked => {
                self.check_func_body(func)?;
                Ok(self
                    .symbols
                    .func(func)
                    .and_then(|info| info.ret)
                    .unwrap_or_else(|| self.types.void()))
            }
            BodyState::InProgress => Ok(self.types.intern(Ty::Pending(func))),
            BodyState::Done => Ok(self.types.void()),
        }
    }

    /// The function type of a named function.
    pub(crate) fn func_type(&mut self, func: SymbolId) -> TypeResult<TypeId> {
        let params: Vec<_> = match self.symbols.func(func) {
            Some(info) => info.params.iter().map(|p| (p.referenceness, p.ty)).collect(),
            None => Vec::new(),
        };
        let ret = self.func_return(func)?;
        Ok(self.types.func(params, ret))
    }

    // ============================================================
    // Overload resolution
    // ============================================================

    /// The parameters `symbol` takes if it can be called with `args`.
    fn candidate_params(&mut self, symbol: SymbolId, args: &[ExprType]) -> Option<Vec<(Referenceness, TypeId)>> {
        match &self.symbols.get(symbol).kind {
            SymbolKind::Func(info) => Some(info.params.iter().map(|p| (p.referenceness, p.ty)).collect()),
            SymbolKind::BuiltinFn(builtin) => {
                let builtin = *builtin;
                let ty = self.instantiate_builtin(builtin, args)?;
                match self.types.get(ty) {
                    Ty::Func { params, .. } => Some(params.clone()),
                    _ => None,
                }
            }
            SymbolKind::Object(info) => match self.types.get(self.concrete(info.ty.ty)) {
                Ty::Func { params, .. } => Some(params.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether arguments of these types may be passed to these parameters.
    ///
    /// A `ref` parameter needs writable storage; a value parameter takes
    /// anything of the right type.
    pub(crate) fn accepts(&self, params: &[(Referenceness, TypeId)], args: &[ExprType]) -> bool {
        params.len() == args.len()
            && params.iter().zip(args).all(|(&(referenceness, ty), arg)| {
                (referenceness == Referenceness::Val || arg.is_assignable()) && self.types_equal(ty, arg.ty)
            })
    }

    /// Pick the one candidate that accepts `args` and return its function type.
    fn resolve_overload(
        &mut self,
        id: ExprId,
        name: Ident,
        candidates: Vec<SymbolId>,
        args: &[ExprType],
    ) -> TypeResult<ExprType> {
        let mut callable = 0;
        let mut survivors = Vec::new();
        for &candidate in &candidates {
            let Some(params) = self.candidate_params(candidate, args) else {
                if matches!(self.symbols.get(candidate).kind, SymbolKind::BuiltinFn(_)) {
                    callable += 1;
                }
                continue;
            };
            callable += 1;
            if self.accepts(&params, args) {
                survivors.push(candidate);
            }
        }

        if callable == 0 {
            let ty = match candidates.first().map(|&c| &self.symbols.get(c).kind) {
                Some(SymbolKind::Object(info)) => self.type_to_string(info.ty.ty),
                Some(other) => other.describe().to_string(),
                None => self.name(name.name).to_string(),
            };
            return TypeError::new(TypeErrorKind::NotAFunction { ty }, name.span).into_err();
        }

        let [chosen] = survivors[..] else {
            return TypeError::new(
                TypeErrorKind::NoMatchingOverload {
                    name: self.name(name.name).to_string(),
                    args: args.iter().map(|arg| self.type_to_string(arg.ty)).collect(),
                    candidates: survivors.len(),
                },
                name.span,
            )
            .into_err();
        };

        self.use_symbol(id, chosen);
        let ty = match &self.symbols.get(chosen).kind {
            SymbolKind::BuiltinFn(builtin) => {
                let builtin = *builtin;
                self.instantiate_builtin(builtin, args)
                    .unwrap_or_else(|| self.types.void())
            }
            SymbolKind::Object(info) => {
                let ty = info.ty.ty;
                self.note_capture(id, chosen);
                ty
            }
            _ => self.func_type(chosen)?,
        };
        Ok(ExprType::value(ty))
    }

    // ============================================================
    // Members
    // ============================================================

    /// The type, enum or module an expression names, if it names one.
    fn resolve_static_path(&mut self, id: ExprId) -> TypeResult<Option<SymbolId>> {
        let ast = self.ast;
        let expr = ast.expr(id);
        let symbol = match &expr.kind {
            ExprKind::Ident(ident) => match self.lookup(*ident)? {
                Some(entries) => entries[0],
                None => return Ok(None),
            },
            ExprKind::Member { object, member } => {
                let Some(parent) = self.resolve_static_path(*object)? else {
                    return Ok(None);
                };
                let SymbolKind::Module { scope } = self.symbols.get(parent).kind else {
                    return Ok(None);
                };
                match self.scopes.get(scope).entries(member.name).first() {
                    Some(&symbol) => symbol,
                    None => return Ok(None),
                }
            }
            _ => return Ok(None),
        };

        let kind = &self.symbols.get(symbol).kind;
        if matches!(kind, SymbolKind::Module { .. }) || kind.is_type() {
            self.use_symbol(id, symbol);
            Ok(Some(symbol))
        } else {
            Ok(None)
        }
    }

    fn visit_member(&mut self, id: ExprId, object: ExprId, member: Ident, ctx: ExprCtx<'_>) -> TypeResult<ExprType> {
        if let Some(target) = self.resolve_static_path(object)? {
            return self.static_member(id, target, member, ctx);
        }
        let object = self.visit_value(object)?;
        self.instance_member(id, object, member, ctx)
    }

    fn no_member<T>(&self, owner: String, member: Ident) -> TypeResult<T> {
        TypeError::new(
            TypeErrorKind::NoField {
                ty: owner,
                field: self.name(member.name).to_string(),
            },
            member.span,
        )
        .into_err()
    }

    fn member_access<T>(&self, owner: SymbolId, member: Ident, reason: &str) -> TypeResult<T> {
        TypeError::new(
            TypeErrorKind::MemberAccess {
                owner: self.name(self.symbols.get(owner).name).to_string(),
                member: self.name(member.name).to_string(),
                reason: reason.to_string(),
            },
            member.span,
        )
        .into_err()
    }

    /// The struct whose member function is being analyzed, if any.
    fn current_struct(&self) -> Option<SymbolId> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.kind == FrameKind::Function)
            .and_then(|frame| self.symbols.func(frame.symbol))
            .and_then(|info| info.owner)
    }

    fn check_access(&self, owner: SymbolId, row: MemberRow, member: Ident) -> TypeResult<()> {
        if row.access == Access::Private && self.current_struct() != Some(owner) {
            return self.member_access(owner, member, "it is private");
        }
        Ok(())
    }

    /// `Module.name`, `Enum.Case` or `Struct.static_func`.
    fn static_member(&mut self, id: ExprId, target: SymbolId, member: Ident, ctx: ExprCtx<'_>) -> TypeResult<ExprType> {
        if let SymbolKind::Module { scope } = self.symbols.get(target).kind {
            let entries = self.scopes.get(scope).entries(member.name);
            if entries.is_empty() {
                return self.no_member(self.name(self.symbols.get(target).name).to_string(), member);
            }
            return match ctx {
                ExprCtx::Callee(args) => self.resolve_overload(id, member, entries, args),
                _ => self.value_of(id, member, &entries),
            };
        }

        let ty = self.type_of_symbol(target)?;
        let concrete = self.concrete(ty);
        match self.types.get(concrete).clone() {
            Ty::Enum(enumeration) => {
                let scope = match &self.symbols.get(enumeration).kind {
                    SymbolKind::Enum(info) => info.scope,
                    _ => return self.no_member(self.type_to_string(ty), member),
                };
                let case = self
                    .scopes
                    .get(scope)
                    .cases()
                    .iter()
                    .find(|(name, _)| *name == member.name)
                    .map(|&(_, symbol)| symbol);
                let Some(case) = case else {
                    return self.no_member(self.type_to_string(ty), member);
                };
                self.use_symbol(id, case);
                if let ExprCtx::Callee(_) = ctx {
                    return TypeError::new(
                        TypeErrorKind::NotAFunction {
                            ty: self.type_to_string(ty),
                        },
                        member.span,
                    )
                    .into_err();
                }
                Ok(ExprType::value(ty))
            }
            Ty::Struct(strukt) => {
                let rows = self.member_rows(strukt, member);
                if rows.is_empty() {
                    return self.no_member(self.type_to_string(ty), member);
                }
                let statics: Vec<_> = rows.iter().filter(|row| row.is_static).copied().collect();
                let Some(&first) = statics.first() else {
                    return self.member_access(strukt, member, "it is not static and needs a value");
                };
                self.check_access(strukt, first, member)?;
                let candidates = statics.iter().map(|row| row.symbol).collect();
                match ctx {
                    ExprCtx::Callee(args) => self.resolve_overload(id, member, candidates, args),
                    _ => self.value_of(id, member, &candidates),
                }
            }
            _ => self.no_member(self.type_to_string(ty), member),
        }
    }

    fn member_rows(&self, strukt: SymbolId, member: Ident) -> Vec<MemberRow> {
        match &self.symbols.get(strukt).kind {
            SymbolKind::Struct(info) => self
                .scopes
                .get(info.scope)
                .members()
                .iter()
                .filter(|row| row.name == member.name)
                .copied()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A field, host type field or member function reached through a value.
    fn instance_member(&mut self, id: ExprId, object: ExprType, member: Ident, ctx: ExprCtx<'_>) -> TypeResult<ExprType> {
        let owner_ty = object.ty;
        match self.types.get(self.concrete(owner_ty)).clone() {
            Ty::Struct(strukt) => {
                let rows = self.member_rows(strukt, member);
                let Some(&first) = rows.first() else {
                    return self.no_member(self.type_to_string(owner_ty), member);
                };
                self.check_access(strukt, first, member)?;

                if let SymbolKind::Field(field) = &self.symbols.get(first.symbol).kind {
                    let field_ty = field.ty;
                    self.use_symbol(id, first.symbol);
                    return Ok(ExprType::new(field_ty, object.mutability, object.referenceness));
                }

                let methods: Vec<_> = rows
                    .iter()
                    .filter(|row| !row.is_static)
                    .map(|row| row.symbol)
                    .collect();
                if methods.is_empty() {
                    return self.member_access(strukt, member, "it is static and is reached through the type name");
                }
                let ExprCtx::Callee(args) = ctx else {
                    return self.member_access(strukt, member, "a member function can only be called");
                };
                let callee = self.resolve_overload(id, member, methods, args)?;

                let chosen = self.ast.expr(id).resolved.get();
                let needs_var = chosen
                    .and_then(|symbol| self.symbols.func(symbol))
                    .is_some_and(|info| info.kind == FuncKind::Method(Mutability::Var));
                if needs_var && !object.is_assignable() {
                    return TypeError::new(
                        TypeErrorKind::ImmutabilityViolation {
                            what: format!(
                                "the receiver of `{}`, a `var func`, through an immutable value",
                                self.name(member.name)
                            ),
                        },
                        member.span,
                    )
                    .into_err();
                }
                Ok(callee)
            }
            Ty::User(user) => {
                let field = match &self.symbols.get(user).kind {
                    SymbolKind::UserType(info) => info
                        .fields
                        .iter()
                        .find(|(name, _, _)| *name == member.name)
                        .map(|&(_, ty, _)| ty),
                    _ => None,
                };
                match field {
                    Some(field_ty) => Ok(ExprType::new(field_ty, object.mutability, object.referenceness)),
                    None => self.no_member(self.type_to_string(owner_ty), member),
                }
            }
            _ => self.no_member(self.type_to_string(owner_ty), member),
        }
    }

    // ============================================================
    // Calls, subscripts and operators
    // ============================================================

    fn visit_call(&mut self, callee: ExprId, args: &[ExprId], span: Span) -> TypeResult<ExprType> {
        let mut arg_types = Vec::with_capacity(args.len());
        for &arg in args {
            arg_types.push(self.visit_value(arg)?);
        }

        let callee_type = self.visit_expr(callee, ExprCtx::Callee(&arg_types))?;
        let callee_type = self.require_known(callee_type, self.ast.expr(callee).span)?;
        let (params, ret) = match self.types.get(self.concrete(callee_type.ty)) {
            Ty::Func { params, ret } => (params.clone(), *ret),
            _ => {
                return TypeError::new(
                    TypeErrorKind::NotAFunction {
                        ty: self.type_to_string(callee_type.ty),
                    },
                    self.ast.expr(callee).span,
                )
                .into_err();
            }
        };

        if !self.accepts(&params, &arg_types) {
            return TypeError::new(
                TypeErrorKind::NoMatchingOverload {
                    name: self.type_to_string(callee_type.ty),
                    args: arg_types.iter().map(|arg| self.type_to_string(arg.ty)).collect(),
                    candidates: 0,
                },
                span,
            )
            .into_err();
        }

        for (&(referenceness, ty), (&arg, &arg_type)) in params.iter().zip(args.iter().zip(&arg_types)) {
            if referenceness == Referenceness::Val {
                self.record_transfer(arg, ty, arg_type, TransferSite::Argument);
            }
        }
        Ok(ExprType::value(ret))
    }

    fn visit_index(&mut self, base: ExprId, index: ExprId) -> TypeResult<ExprType> {
        let array = self.visit_value(base)?;
        let element = match self.types.get(self.concrete(array.ty)) {
            Ty::Array(element) => *element,
            _ => {
                return TypeError::new(
                    TypeErrorKind::InvalidOperand {
                        op: "[]".to_string(),
                        operands: vec![self.type_to_string(array.ty)],
                    },
                    self.ast.expr(base).span,
                )
                .into_err();
            }
        };

        let subscript = self.visit_value(index)?;
        let is_index = self
            .types
            .as_builtin(self.concrete(subscript.ty))
            .is_some_and(BuiltinType::is_index);
        if !is_index {
            return TypeError::new(
                TypeErrorKind::InvalidOperand {
                    op: "[]".to_string(),
                    operands: vec![self.type_to_string(array.ty), self.type_to_string(subscript.ty)],
                },
                self.ast.expr(index).span,
            )
            .with_help("array subscripts are `sint` or `uint`")
            .into_err();
        }
        Ok(ExprType::new(element, array.mutability, array.referenceness))
    }

    fn visit_unary(&mut self, op: UnaryOp, operand: ExprId, span: Span) -> TypeResult<ExprType> {
        let value = self.visit_value(operand)?;
        let builtin = self.types.as_builtin(self.concrete(value.ty));
        let valid = match op {
            UnaryOp::Neg => builtin.is_some_and(BuiltinType::is_signed),
            UnaryOp::Not => builtin == Some(BuiltinType::Bool),
            UnaryOp::BitNot => builtin.is_some_and(BuiltinType::is_bitwise),
        };
        if !valid {
            return TypeError::new(
                TypeErrorKind::InvalidOperand {
                    op: op.as_str().to_string(),
                    operands: vec![self.type_to_string(value.ty)],
                },
                span,
            )
            .into_err();
        }
        Ok(ExprType::value(value.ty))
    }

    fn visit_binary(&mut self, op: BinOp, lhs: ExprId, rhs: ExprId, span: Span) -> TypeResult<ExprType> {
        let mut left = self.visit_expr(lhs, ExprCtx::Value)?;
        let mut right = self.visit_expr(rhs, ExprCtx::Value)?;
        self.settle_pending(&mut left, &mut right, span);

        if self.pending_of(left).is_some() {
            // Both sides are pending; so is an arithmetic result.
            return Ok(match op_class(op) {
                OpClass::Bitwise | OpClass::Arithmetic => left,
                _ => ExprType::value(self.types.bool()),
            });
        }
        let ty = self.check_binary(op, left.ty, right.ty, span)?;
        Ok(ExprType::value(ty))
    }

    /// Apply the operator table; returns the result type.
    pub(crate) fn check_binary(&mut self, op: BinOp, lhs: TypeId, rhs: TypeId, span: Span) -> TypeResult<TypeId> {
        let builtin = self.types.as_builtin(self.concrete(lhs));
        let (valid, result) = match op_class(op) {
            OpClass::Logic => (builtin == Some(BuiltinType::Bool), self.types.bool()),
            OpClass::Bitwise => (builtin.is_some_and(BuiltinType::is_bitwise), lhs),
            OpClass::Equality => (self.is_comparable(lhs), self.types.bool()),
            OpClass::Ordering => (builtin.is_some_and(BuiltinType::is_arithmetic), self.types.bool()),
            OpClass::Arithmetic => (builtin.is_some_and(BuiltinType::is_arithmetic), lhs),
        };

        if !valid || !self.types_equal(lhs, rhs) {
            return TypeError::new(
                TypeErrorKind::InvalidOperand {
                    op: op.as_str().to_string(),
                    operands: vec![self.type_to_string(lhs), self.type_to_string(rhs)],
                },
                span,
            )
            .into_err();
        }
        Ok(result)
    }

    /// Builtins, enums and strong aliases of either compare with `==`.
    fn is_comparable(&self, ty: TypeId) -> bool {
        match self.types.get(representation(&self.types, &self.symbols, ty)) {
            Ty::Builtin(builtin) => *builtin != BuiltinType::Void,
            Ty::Enum(_) => true,
            _ => false,
        }
    }

    fn visit_ternary(&mut self, cond: ExprId, then_expr: ExprId, else_expr: ExprId) -> TypeResult<ExprType> {
        self.visit_expr(cond, ExprCtx::Condition)?;
        let mut then_type = self.visit_expr(then_expr, ExprCtx::Value)?;
        let mut else_type = self.visit_expr(else_expr, ExprCtx::Value)?;
        let span = self.ast.expr(else_expr).span;
        self.settle_pending(&mut then_type, &mut else_type, span);

        if !self.types_equal(then_type.ty, else_type.ty) {
            return Err(self.mismatch(then_type.ty, else_type.ty, span));
        }
        Ok(then_type.restrict(else_type.mutability, else_type.referenceness))
    }

    fn visit_array(&mut self, elements: &[ExprId], expected: Option<TypeId>, span: Span) -> TypeResult<ExprType> {
        let Some((&first, rest)) = elements.split_first() else {
            return match expected {
                Some(ty) if matches!(self.types.get(self.concrete(ty)), Ty::Array(_)) => Ok(ExprType::value(ty)),
                _ => TypeError::new(
                    TypeErrorKind::CannotInfer {
                        what: "an empty array literal".to_string(),
                    },
                    span,
                )
                .with_help("give the variable a type, e.g. `let xs: [sint] = [];`")
                .into_err(),
            };
        };

        let expected_element = expected.and_then(|ty| match self.types.get(self.concrete(ty)) {
            Ty::Array(element) => Some(*element),
            _ => None,
        });
        let element = self.visit_expecting(first, expected_element)?;
        self.record_transfer(first, element.ty, element, TransferSite::Init);
        for &next in rest {
            let next_type = self.visit_expecting(next, Some(element.ty))?;
            if !self.types_equal(element.ty, next_type.ty) {
                return Err(self.mismatch(element.ty, next_type.ty, self.ast.expr(next).span));
            }
            self.record_transfer(next, element.ty, next_type, TransferSite::Init);
        }
        Ok(ExprType::value(self.types.array_of(element.ty)))
    }
}

//! Statement and function body checking.
//!
//! # Return types
//!
//! An annotated function returns its annotation. An unannotated function
//! returns the type of its first `return` whose value is not a pending
//! recursive call, or `void` when it returns no value. A function whose
//! only value returns are pending recursive calls has no deducible type and
//! is rejected. Every other pending use is checked against the deduced type
//! once the body is done.

use tracing::debug;

use crate::ast::{BinOp, ExprKind, FuncKind, Ident, LocalDecl, Param, Referenceness, StmtKind};
use crate::def::{ExprId, StmtId, SymbolId, TypeId};
use crate::span::Span;

use super::super::error::{ReturnProblem, TypeError, TypeErrorKind, TypeResult};
use super::super::lifetime::{plan_transfer, ValueKind};
use super::super::resolve::ScopeKind;
use super::super::symbol::{BodyState, ObjectOrigin, SymbolKind};
use super::super::types::{ExprType, Ty};
use super::{ExprCtx, FnFrame, FrameKind, ReturnSlot, TransferRecord, TransferSite, TypeContext};

impl<'a> TypeContext<'a> {
    /// Analyze the body of a named function if that has not happened yet.
    pub(crate) fn check_func_body(&mut self, func: SymbolId) -> TypeResult<()> {
        let Some(info) = self.symbols.func(func) else {
            return Ok(());
        };
        if info.state != BodyState::Unchecked {
            return Ok(());
        }
        let (decl, kind, owner, declared) = (info.decl, info.kind, info.owner, info.ret);
        let params = info.params.clone();

        let ast = self.ast;
        let Some(func_decl) = ast.func_decl(decl) else {
            return Ok(());
        };
        let Some(body) = &func_decl.sig.body else {
            self.set_body_state(func, BodyState::Done);
            return Ok(());
        };

        debug!(function = self.name(func_decl.name.name), "checking function body");
        self.set_body_state(func, BodyState::InProgress);

        let declaring_scope = self.symbols.get(func).scope;
        let ret = self.with_cursor(declaring_scope, |cx| -> TypeResult<TypeId> {
            let scope = cx.scopes.enter(ScopeKind::Function, Some(func));
            if let Some(info) = cx.symbols.func_mut(func) {
                info.body_scope = Some(scope);
            }

            if let (FuncKind::Method(mutability), Some(owner)) = (kind, owner) {
                let owner_ty = cx.type_of_symbol(owner)?;
                let receiver = Ident {
                    name: cx.ast.predefined("self"),
                    span: func_decl.name.span,
                };
                cx.declare_object(receiver, ExprType::named(owner_ty, mutability), ObjectOrigin::Receiver)?;
            }
            cx.declare_params(&func_decl.sig.params, &params)?;

            cx.frames.push(FnFrame {
                symbol: func,
                kind: FrameKind::Function,
                scope,
                ret: declared.map_or(ReturnSlot::Deduced(None), ReturnSlot::Declared),
                pending_returns: Vec::new(),
                loop_depth: 0,
            });
            cx.check_stmts(body)?;
            let frame = cx.pop_frame();
            let ret = cx.finish_body(&frame, body, func_decl.name.span)?;
            cx.scopes.leave();
            Ok(ret)
        })?;

        if let Some(info) = self.symbols.func_mut(func) {
            info.ret = Some(ret);
            info.state = BodyState::Done;
        }
        Ok(())
    }

    fn set_body_state(&mut self, func: SymbolId, state: BodyState) {
        if let Some(info) = self.symbols.func_mut(func) {
            info.state = state;
        }
    }

    pub(crate) fn pop_frame(&mut self) -> FnFrame {
        match self.frames.pop() {
            Some(frame) => frame,
            None => unreachable!("body frame stack underflow"),
        }
    }

    /// Declare parameters in the current scope.
    pub(crate) fn declare_params(&mut self, params: &[Param], types: &[ExprType]) -> TypeResult<()> {
        for (param, ty) in params.iter().zip(types) {
            let symbol = self.declare_object(
                param.name,
                ExprType::named(ty.ty, param.mutability),
                ObjectOrigin::Param,
            )?;
            param.resolved.set(symbol);
        }
        Ok(())
    }

    /// Settle the return type of a finished body and check every path returns.
    pub(crate) fn finish_body(&mut self, frame: &FnFrame, body: &[StmtId], span: Span) -> TypeResult<TypeId> {
        let ret = match frame.ret {
            ReturnSlot::Declared(ty) | ReturnSlot::Deduced(Some(ty)) => ty,
            ReturnSlot::Deduced(None) if !frame.pending_returns.is_empty() => {
                return TypeError::new(
                    TypeErrorKind::MissingOrBadReturn {
                        reason: ReturnProblem::UndeducibleRecursion {
                            function: self.frame_name(frame).to_string(),
                        },
                    },
                    span,
                )
                .with_help("annotate the return type or add a non-recursive `return`")
                .into_err();
            }
            ReturnSlot::Deduced(None) => self.types.void(),
        };
        debug!(ret = %self.type_to_string(ret), "body finished");

        // A returned call to another function under analysis must agree.
        for &(func, at) in &frame.pending_returns {
            if func != frame.symbol {
                self.assumptions.push((func, ret, at));
            }
        }

        if !self.is_void(ret) && !self.stmts_return(body) {
            return TypeError::new(
                TypeErrorKind::MissingOrBadReturn {
                    reason: ReturnProblem::NotAllPathsReturn {
                        function: self.frame_name(frame).to_string(),
                    },
                },
                span,
            )
            .into_err();
        }

        self.verify_assumptions(frame.symbol, ret)?;
        self.resolve_pending(frame.symbol, ret);
        Ok(ret)
    }

    fn frame_name(&self, frame: &FnFrame) -> &'a str {
        self.name(self.symbols.get(frame.symbol).name)
    }

    pub(crate) fn is_void(&self, ty: TypeId) -> bool {
        self.concrete(ty) == self.types.void()
    }

    /// Check every type assumed for pending calls of `func` against `ret`.
    fn verify_assumptions(&mut self, func: SymbolId, ret: TypeId) -> TypeResult<()> {
        let (mine, others): (Vec<_>, Vec<_>) = std::mem::take(&mut self.assumptions)
            .into_iter()
            .partition(|&(f, _, _)| f == func);
        self.assumptions = others;
        for (_, assumed, span) in mine {
            if !self.types_equal(assumed, ret) {
                return Err(self.mismatch(ret, assumed, span));
            }
        }
        Ok(())
    }

    /// Replace the pending type of `func` by its deduced return type in
    /// every recorded expression type.
    fn resolve_pending(&mut self, func: SymbolId, ret: TypeId) {
        let Some(pending) = self.types.find(&Ty::Pending(func)) else {
            return;
        };
        let types = &mut self.types;
        for et in self.expr_types.values_mut() {
            if et.ty == pending {
                et.ty = ret;
                continue;
            }
            if let Ty::Func { params, ret: callee_ret } = types.get(et.ty) {
                if *callee_ret == pending {
                    let params = params.clone();
                    et.ty = types.func(params, ret);
                }
            }
        }
    }

    fn stmts_return(&self, stmts: &[StmtId]) -> bool {
        stmts.iter().any(|&stmt| self.stmt_returns(stmt))
    }

    fn stmt_returns(&self, stmt: StmtId) -> bool {
        match &self.ast.stmt(stmt).kind {
            StmtKind::Return(_) => true,
            StmtKind::If {
                then_body,
                else_body: Some(else_body),
                ..
            } => self.stmts_return(then_body) && self.stmts_return(else_body),
            StmtKind::Block(stmts) => self.stmts_return(stmts),
            _ => false,
        }
    }

    // ============================================================
    // Statements
    // ============================================================

    pub(crate) fn check_stmts(&mut self, stmts: &[StmtId]) -> TypeResult<()> {
        for &stmt in stmts {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_block(&mut self, stmts: &[StmtId]) -> TypeResult<()> {
        self.scopes.enter(ScopeKind::Block, None);
        self.check_stmts(stmts)?;
        self.scopes.leave();
        Ok(())
    }

    fn check_stmt(&mut self, id: StmtId) -> TypeResult<()> {
        let ast = self.ast;
        let stmt = ast.stmt(id);
        match &stmt.kind {
            StmtKind::Local(local) => self.check_local(local, false),
            StmtKind::Assign { target, op, value } => self.check_assign(*target, *op, *value, stmt.span),
            StmtKind::Expr(expr) => {
                // A discarded result may be a pending recursive call.
                self.visit_expr(*expr, ExprCtx::Value)?;
                Ok(())
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                self.visit_expr(*cond, ExprCtx::Condition)?;
                self.check_block(then_body)?;
                if let Some(else_body) = else_body {
                    self.check_block(else_body)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(*cond, ExprCtx::Condition)?;
                self.adjust_loop_depth(true);
                self.check_block(body)?;
                self.adjust_loop_depth(false);
                Ok(())
            }
            StmtKind::Return(value) => self.check_return(*value, stmt.span),
            StmtKind::Break => self.check_loop_control("break", stmt.span),
            StmtKind::Continue => self.check_loop_control("continue", stmt.span),
            StmtKind::Block(stmts) => self.check_block(stmts),
            StmtKind::Func(decl) => {
                let func = self.declare_func(*decl, None)?;
                self.check_func_body(func)
            }
        }
    }

    /// A local variable or a module global.
    pub(crate) fn check_local(&mut self, local: &LocalDecl, global: bool) -> TypeResult<()> {
        let declared = match local.ty {
            Some(ty) => Some(self.lower_type(ty)?),
            None => None,
        };
        let init = match local.init {
            Some(init) => Some((init, self.visit_expecting(init, declared)?)),
            None => None,
        };

        let ty = match (declared, init) {
            (Some(declared), Some((init, value))) => {
                if !self.types_equal(declared, value.ty) {
                    return Err(self.mismatch(declared, value.ty, self.ast.expr(init).span));
                }
                declared
            }
            (Some(declared), None) => declared,
            (None, Some((_, value))) => value.ty,
            (None, None) => {
                return TypeError::new(
                    TypeErrorKind::CannotInfer {
                        what: format!("`{}`", self.name(local.name.name)),
                    },
                    local.name.span,
                )
                .into_err();
            }
        };
        if self.is_void(ty) {
            return TypeError::new(
                TypeErrorKind::Mismatch {
                    expected: "a value type".to_string(),
                    found: "void".to_string(),
                },
                local.name.span,
            )
            .into_err();
        }

        let origin = if global {
            ObjectOrigin::Global
        } else {
            ObjectOrigin::Local
        };
        let symbol = self.declare_object(local.name, ExprType::named(ty, local.mutability), origin)?;
        local.resolved.set(symbol);

        match init {
            Some((init, value)) => self.record_transfer(init, ty, value, TransferSite::Init),
            None => self.default_constructed.push((symbol, ty)),
        }
        Ok(())
    }

    fn check_assign(&mut self, target: ExprId, op: Option<BinOp>, value: ExprId, span: Span) -> TypeResult<()> {
        let place = self.visit_value(target)?;
        if !place.is_assignable() {
            return TypeError::new(
                TypeErrorKind::ImmutabilityViolation {
                    what: self.describe_place(target, place),
                },
                self.ast.expr(target).span,
            )
            .into_err();
        }

        let assigned = self.visit_expecting(value, Some(place.ty))?;
        match op {
            Some(op) => {
                let result = self.check_binary(op, place.ty, assigned.ty, span)?;
                if !self.types_equal(result, place.ty) {
                    return TypeError::new(
                        TypeErrorKind::InvalidOperand {
                            op: format!("{}=", op.as_str()),
                            operands: vec![self.type_to_string(place.ty), self.type_to_string(assigned.ty)],
                        },
                        span,
                    )
                    .into_err();
                }
            }
            None => {
                if !self.types_equal(place.ty, assigned.ty) {
                    return Err(self.mismatch(place.ty, assigned.ty, self.ast.expr(value).span));
                }
                self.record_transfer(value, place.ty, assigned, TransferSite::Assign);
            }
        }
        Ok(())
    }

    fn describe_place(&self, target: ExprId, place: ExprType) -> String {
        if place.referenceness == Referenceness::Val {
            return "a temporary value".to_string();
        }
        match &self.ast.expr(target).kind {
            ExprKind::Ident(ident) => {
                let what = match self.ast.expr(target).resolved.get().map(|s| &self.symbols.get(s).kind) {
                    Some(SymbolKind::Object(info)) if info.origin == ObjectOrigin::Param => "parameter",
                    _ => "variable",
                };
                format!("{what} `{}`, which is not `var`", self.name(ident.name))
            }
            _ => "a location reached through a `let` binding".to_string(),
        }
    }

    fn check_return(&mut self, value: Option<ExprId>, span: Span) -> TypeResult<()> {
        let Some(frame) = self.frames.last() else {
            return TypeError::new(
                TypeErrorKind::MissingOrBadReturn {
                    reason: ReturnProblem::OutsideFunction,
                },
                span,
            )
            .into_err();
        };
        let function = self.frame_name(frame).to_string();
        let expected = match frame.ret {
            ReturnSlot::Declared(ty) => Some(ty),
            ReturnSlot::Deduced(ty) => ty,
        };

        let Some(value) = value else {
            return match expected {
                Some(ty) if !self.is_void(ty) => TypeError::new(
                    TypeErrorKind::MissingOrBadReturn {
                        reason: ReturnProblem::MissingValue { function },
                    },
                    span,
                )
                .into_err(),
                Some(_) => Ok(()),
                None => {
                    let void = self.types.void();
                    self.deduce_return(void);
                    Ok(())
                }
            };
        };

        let returned = self.visit_expr_expecting(value, ExprCtx::Value, expected)?;
        if let Some(func) = self.pending_of(returned) {
            match expected {
                Some(ty) => self.assumptions.push((func, ty, span)),
                None => {
                    if let Some(frame) = self.frames.last_mut() {
                        frame.pending_returns.push((func, span));
                    }
                }
            }
            return Ok(());
        }

        match expected {
            Some(ty) if self.is_void(ty) && !self.is_void(returned.ty) => TypeError::new(
                TypeErrorKind::MissingOrBadReturn {
                    reason: ReturnProblem::ValueInVoid { function },
                },
                self.ast.expr(value).span,
            )
            .into_err(),
            Some(ty) => {
                if !self.types_equal(ty, returned.ty) {
                    return Err(self.mismatch(ty, returned.ty, self.ast.expr(value).span));
                }
                if !self.is_void(ty) {
                    self.record_transfer(value, ty, returned, TransferSite::Return);
                }
                Ok(())
            }
            None => {
                self.deduce_return(returned.ty);
                if !self.is_void(returned.ty) {
                    self.record_transfer(value, returned.ty, returned, TransferSite::Return);
                }
                Ok(())
            }
        }
    }

    /// Fix the return type of the innermost body from its first return.
    fn deduce_return(&mut self, ty: TypeId) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        frame.ret = ReturnSlot::Deduced(Some(ty));
        let symbol = frame.symbol;
        match frame.kind {
            FrameKind::Function => {
                if let Some(info) = self.symbols.func_mut(symbol) {
                    info.ret = Some(ty);
                }
            }
            FrameKind::Closure => {
                if let Some(info) = self.symbols.lambda_mut(symbol) {
                    info.ret = Some(ty);
                }
            }
        }
    }

    fn adjust_loop_depth(&mut self, enter: bool) {
        if let Some(frame) = self.frames.last_mut() {
            if enter {
                frame.loop_depth += 1;
            } else {
                frame.loop_depth -= 1;
            }
        }
    }

    fn check_loop_control(&self, keyword: &'static str, span: Span) -> TypeResult<()> {
        match self.frames.last() {
            Some(frame) if frame.loop_depth > 0 => Ok(()),
            _ => TypeError::new(TypeErrorKind::LoopControl { keyword }, span).into_err(),
        }
    }

    // ============================================================
    // Lifetimes
    // ============================================================

    /// Plan how the value of `expr` reaches its destination.
    ///
    /// A conditional expression is planned per branch, so a named branch is
    /// copied and only a temporary branch is relocated.
    pub(crate) fn record_transfer(&mut self, expr: ExprId, ty: TypeId, source: ExprType, site: TransferSite) {
        let ast = self.ast;
        if let ExprKind::Ternary {
            then_expr, else_expr, ..
        } = &ast.expr(expr).kind
        {
            for branch in [*then_expr, *else_expr] {
                let branch_type = self.expr_types.get(&branch).copied().unwrap_or(source);
                self.record_transfer(branch, ty, branch_type, site);
            }
            return;
        }

        let category = self.category(ty);
        let kind = match source.referenceness {
            Referenceness::Ref => ValueKind::Named,
            Referenceness::Val => ValueKind::Temporary,
        };
        let transfer = plan_transfer(
            category,
            kind,
            site == TransferSite::Assign,
            self.config.relocation_elision,
        );
        self.transfers.push(TransferRecord {
            expr,
            ty,
            site,
            transfer,
        });
    }
}

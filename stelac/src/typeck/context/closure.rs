//! Closures and their captures.
//!
//! A closure captures every non-global object it reads that is declared
//! outside its own scope. Each capture gets a slot, in order of first use.
//! When a nested closure captures an object that also lives outside its
//! parent closure, the parent captures it too and the nested slot is filled
//! from the parent's slot.

use tracing::trace;

use crate::ast::FuncSig;
use crate::def::{ExprId, SymbolId};
use crate::span::Span;

use super::super::error::TypeResult;
use super::super::resolve::ScopeKind;
use super::super::symbol::{CaptureSource, ClosureCap, LambdaInfo, ObjectOrigin, SymbolKind};
use super::super::types::ExprType;
use super::{FnFrame, FrameKind, ReturnSlot, TypeContext};

impl<'a> TypeContext<'a> {
    pub(crate) fn visit_closure(&mut self, id: ExprId, sig: &FuncSig, span: Span) -> TypeResult<ExprType> {
        let mut params = Vec::with_capacity(sig.params.len());
        for param in &sig.params {
            let ty = self.lower_type(param.ty)?;
            params.push(ExprType::new(ty, param.mutability, param.referenceness));
        }
        let declared = match sig.ret {
            Some(ret) => Some(self.lower_type(ret)?),
            None => None,
        };

        let parent = match self.frames.last() {
            Some(frame) if frame.kind == FrameKind::Closure => Some(frame.symbol),
            _ => None,
        };
        let cursor = self.scopes.cursor();
        let lambda = self.symbols.alloc(
            self.ast.predefined("<closure>"),
            span,
            SymbolKind::Lambda(LambdaInfo {
                expr: id,
                params: params.clone(),
                ret: declared,
                captures: Vec::new(),
                parent,
                scope: cursor,
            }),
            cursor,
        );
        self.symbols.mark_used(lambda);
        self.ast.expr(id).resolved.set(lambda);
        self.closures.push(lambda);

        let scope = self.scopes.enter(ScopeKind::Closure, Some(lambda));
        if let Some(info) = self.symbols.lambda_mut(lambda) {
            info.scope = scope;
        }
        self.declare_params(&sig.params, &params)?;

        let body = sig.body.as_deref().unwrap_or_default();
        self.frames.push(FnFrame {
            symbol: lambda,
            kind: FrameKind::Closure,
            scope,
            ret: declared.map_or(ReturnSlot::Deduced(None), ReturnSlot::Declared),
            pending_returns: Vec::new(),
            loop_depth: 0,
        });
        self.check_stmts(body)?;
        let frame = self.pop_frame();
        let ret = self.finish_body(&frame, body, span)?;
        self.scopes.leave();

        if let Some(info) = self.symbols.lambda_mut(lambda) {
            info.ret = Some(ret);
        }
        let ty = self
            .types
            .func(params.iter().map(|p| (p.referenceness, p.ty)).collect(), ret);
        Ok(ExprType::value(ty))
    }

    /// Record that the identifier `id` reads `symbol`, capturing it if it
    /// lives outside the innermost closure.
    pub(crate) fn note_capture(&mut self, id: ExprId, symbol: SymbolId) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        if frame.kind != FrameKind::Closure {
            return;
        }
        let (lambda, closure_scope) = (frame.symbol, frame.scope);

        let object = self.symbols.get(symbol);
        match &object.kind {
            SymbolKind::Object(info) if info.origin != ObjectOrigin::Global => {}
            _ => return,
        }
        if self.scopes.is_within(object.scope, closure_scope) {
            return;
        }

        let slot = self.capture(lambda, symbol);
        self.captured.insert(id, (lambda, slot));
    }

    /// The capture slot of `source` in `lambda`, allocating it on first use.
    /// Idempotent.
    pub fn capture(&mut self, lambda: SymbolId, source: SymbolId) -> usize {
        let Some(info) = self.symbols.lambda(lambda) else {
            unreachable!("capture into non-closure symbol {lambda}");
        };
        if let Some(slot) = info.captures.iter().position(|cap| cap.source == source) {
            return slot;
        }
        let parent = info.parent;

        let object = self.symbols.get(source);
        let ty = match &object.kind {
            SymbolKind::Object(info) => info.ty.ty,
            _ => unreachable!("capture of non-object symbol {source}"),
        };
        let object_scope = object.scope;

        let via = match parent {
            Some(parent) => {
                let parent_scope = self.symbols.lambda(parent).map(|info| info.scope);
                match parent_scope {
                    Some(scope) if !self.scopes.is_within(object_scope, scope) => {
                        CaptureSource::Parent(self.capture(parent, source))
                    }
                    _ => CaptureSource::Local,
                }
            }
            None => CaptureSource::Local,
        };

        trace!(%lambda, %source, ?via, "capture");
        let Some(info) = self.symbols.lambda_mut(lambda) else {
            unreachable!("capture into non-closure symbol {lambda}");
        };
        info.captures.push(ClosureCap { source, via, ty });
        info.captures.len() - 1
    }
}

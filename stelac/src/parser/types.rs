//! Type expression parsing.

use super::Parser;
use crate::ast::*;
use crate::def::TypeExprId;
use crate::diagnostics::ErrorCode;
use crate::lexer::TokenKind;

impl<'src, 'ast> Parser<'src, 'ast> {
    /// Parse a type: `name`, `module.name`, `[T]` or `func(ref T, U) -> R`.
    pub(super) fn parse_type(&mut self) -> Option<TypeExprId> {
        let start = self.current.span;
        let kind = match self.current.kind {
            TokenKind::Ident => {
                let mut path = vec![self.expect_ident()?];
                if self.try_consume(TokenKind::Dot) {
                    path.push(self.expect_ident()?);
                }
                TypeExprKind::Named(path)
            }
            TokenKind::LBracket => {
                self.advance();
                let element = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                TypeExprKind::Array(element)
            }
            TokenKind::Func => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let mut params = Vec::new();
                while !self.check(TokenKind::RParen) {
                    let referenceness = if self.try_consume(TokenKind::Ref) {
                        Referenceness::Ref
                    } else {
                        Referenceness::Val
                    };
                    params.push((referenceness, self.parse_type()?));
                    if !self.try_consume(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                let ret = if self.try_consume(TokenKind::Arrow) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                TypeExprKind::Func { params, ret }
            }
            _ => {
                let found = self.current.kind.description();
                self.error_at_current(
                    &format!("expected type, found {found}"),
                    ErrorCode::ExpectedType,
                );
                return None;
            }
        };
        let span = start.merge(self.previous.span);
        Some(self.ast.alloc_type(kind, span))
    }
}

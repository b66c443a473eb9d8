//! Expression parsing using Pratt parsing for operator precedence.

use super::Parser;
use crate::ast::*;
use crate::def::ExprId;
use crate::diagnostics::ErrorCode;
use crate::lexer::TokenKind;

/// Operator precedence levels (higher = binds tighter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None = 0,
    Ternary = 1,    // ?:
    Or = 2,         // ||
    And = 3,        // &&
    Comparison = 4, // == != < > <= >=
    BitOr = 5,      // |
    BitXor = 6,     // ^
    BitAnd = 7,     // &
    Shift = 8,      // << >>
    Term = 9,       // + -
    Factor = 10,    // * / %
    Unary = 11,     // ! - ~
    Call = 12,      // () [] .
}

/// Get the precedence of a binary operator token.
fn binary_precedence(kind: TokenKind) -> Option<Precedence> {
    match kind {
        TokenKind::Question => Some(Precedence::Ternary),
        TokenKind::OrOr => Some(Precedence::Or),
        TokenKind::AndAnd => Some(Precedence::And),
        TokenKind::EqEq
        | TokenKind::NotEq
        | TokenKind::Lt
        | TokenKind::Gt
        | TokenKind::LtEq
        | TokenKind::GtEq => Some(Precedence::Comparison),
        TokenKind::Or => Some(Precedence::BitOr),
        TokenKind::Caret => Some(Precedence::BitXor),
        TokenKind::And => Some(Precedence::BitAnd),
        TokenKind::Shl | TokenKind::Shr => Some(Precedence::Shift),
        TokenKind::Plus | TokenKind::Minus => Some(Precedence::Term),
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(Precedence::Factor),
        TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot => Some(Precedence::Call),
        _ => None,
    }
}

/// Convert token kind to binary operator.
fn token_to_binop(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::Plus => Some(BinOp::Add),
        TokenKind::Minus => Some(BinOp::Sub),
        TokenKind::Star => Some(BinOp::Mul),
        TokenKind::Slash => Some(BinOp::Div),
        TokenKind::Percent => Some(BinOp::Rem),
        TokenKind::EqEq => Some(BinOp::Eq),
        TokenKind::NotEq => Some(BinOp::Ne),
        TokenKind::Lt => Some(BinOp::Lt),
        TokenKind::LtEq => Some(BinOp::Le),
        TokenKind::Gt => Some(BinOp::Gt),
        TokenKind::GtEq => Some(BinOp::Ge),
        TokenKind::AndAnd => Some(BinOp::And),
        TokenKind::OrOr => Some(BinOp::Or),
        TokenKind::And => Some(BinOp::BitAnd),
        TokenKind::Or => Some(BinOp::BitOr),
        TokenKind::Caret => Some(BinOp::BitXor),
        TokenKind::Shl => Some(BinOp::Shl),
        TokenKind::Shr => Some(BinOp::Shr),
        _ => None,
    }
}

/// Convert compound assignment token to operator.
pub(super) fn token_to_compound_op(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::PlusEq => Some(BinOp::Add),
        TokenKind::MinusEq => Some(BinOp::Sub),
        TokenKind::StarEq => Some(BinOp::Mul),
        TokenKind::SlashEq => Some(BinOp::Div),
        TokenKind::PercentEq => Some(BinOp::Rem),
        TokenKind::AndEq => Some(BinOp::BitAnd),
        TokenKind::OrEq => Some(BinOp::BitOr),
        TokenKind::CaretEq => Some(BinOp::BitXor),
        TokenKind::ShlEq => Some(BinOp::Shl),
        TokenKind::ShrEq => Some(BinOp::Shr),
        _ => None,
    }
}

impl<'src, 'ast> Parser<'src, 'ast> {
    /// Parse an expression.
    pub(super) fn parse_expr(&mut self) -> Option<ExprId> {
        self.parse_expr_prec(Precedence::None)
    }

    /// Parse an expression with at least the given precedence.
    fn parse_expr_prec(&mut self, min_prec: Precedence) -> Option<ExprId> {
        let mut left = self.parse_prefix_expr()?;

        loop {
            let Some(prec) = binary_precedence(self.current.kind) else {
                break;
            };
            if prec <= min_prec {
                break;
            }
            left = match self.current.kind {
                TokenKind::LParen => self.parse_call(left)?,
                TokenKind::LBracket => self.parse_index(left)?,
                TokenKind::Dot => self.parse_member(left)?,
                TokenKind::Question => self.parse_ternary(left)?,
                kind => {
                    let op = token_to_binop(kind)?;
                    self.advance();
                    // Left-associative: the right operand binds tighter.
                    let rhs = self.parse_expr_prec(prec)?;
                    let span = self.ast.expr(left).span.merge(self.ast.expr(rhs).span);
                    self.ast
                        .alloc_expr(ExprKind::Binary { op, lhs: left, rhs }, span)
                }
            };
        }

        Some(left)
    }

    fn parse_prefix_expr(&mut self) -> Option<ExprId> {
        let op = match self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        match op {
            Some(op) => {
                let start = self.advance().span;
                let operand = self.parse_expr_prec(Precedence::Unary)?;
                let span = start.merge(self.ast.expr(operand).span);
                Some(self.ast.alloc_expr(ExprKind::Unary { op, operand }, span))
            }
            None => self.parse_primary_expr(),
        }
    }

    fn parse_primary_expr(&mut self) -> Option<ExprId> {
        let token = self.current.clone();
        let kind = match token.kind {
            TokenKind::IntLit => {
                self.advance();
                ExprKind::Literal(self.int_literal(&token.span)?)
            }
            TokenKind::FloatLit => {
                self.advance();
                let text = self.text(&token.span).replace('_', "");
                match text.parse::<f64>() {
                    Ok(value) => ExprKind::Literal(Literal::Real(value)),
                    Err(_) => {
                        self.error_at(token.span, "invalid real literal", ErrorCode::InvalidFloat);
                        return None;
                    }
                }
            }
            TokenKind::CharLit => {
                self.advance();
                let text = self.text(&token.span);
                match unescape(&text[1..text.len() - 1]).and_then(|s| single_char(&s)) {
                    Some(c) => ExprKind::Literal(Literal::Char(c)),
                    None => {
                        self.error_at(token.span, "invalid character literal", ErrorCode::InvalidChar);
                        return None;
                    }
                }
            }
            TokenKind::StringLit => {
                self.advance();
                let text = self.text(&token.span);
                match unescape(&text[1..text.len() - 1]) {
                    Some(s) => ExprKind::Literal(Literal::Str(s)),
                    None => {
                        self.error_at(token.span, "invalid escape in string literal", ErrorCode::InvalidChar);
                        return None;
                    }
                }
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(token.kind == TokenKind::True))
            }
            TokenKind::Ident => ExprKind::Ident(self.expect_ident()?),
            TokenKind::SelfLower => {
                self.advance();
                ExprKind::Ident(Ident {
                    name: self.ast.intern("self"),
                    span: token.span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Some(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    elements.push(self.parse_expr()?);
                    if !self.try_consume(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                ExprKind::Array(elements)
            }
            TokenKind::Func => {
                self.advance();
                let sig = self.parse_func_sig(true)?;
                ExprKind::Closure(Box::new(sig))
            }
            _ => {
                let found = token.kind.description();
                self.error_at_current(
                    &format!("expected expression, found {found}"),
                    ErrorCode::ExpectedExpression,
                );
                return None;
            }
        };
        let span = token.span.merge(self.previous.span);
        Some(self.ast.alloc_expr(kind, span))
    }

    fn int_literal(&mut self, span: &crate::span::Span) -> Option<Literal> {
        let text = self.text(span).replace('_', "");
        let (digits, suffix) = match text.as_bytes().last() {
            Some(b'u') => (&text[..text.len() - 1], IntSuffix::Uint),
            Some(b'b') if !text.starts_with("0x") => (&text[..text.len() - 1], IntSuffix::Byte),
            _ => (text.as_str(), IntSuffix::None),
        };
        let parsed = match digits.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => digits.parse::<u64>(),
        };
        let value = match parsed {
            Ok(value) => value,
            Err(_) => {
                self.error_at(*span, "invalid integer literal", ErrorCode::InvalidInteger);
                return None;
            }
        };
        if suffix == IntSuffix::Byte && value > u64::from(u8::MAX) {
            self.error_at(*span, "byte literal out of range", ErrorCode::InvalidInteger);
            return None;
        }
        Some(Literal::Int { value, suffix })
    }

    fn parse_call(&mut self, callee: ExprId) -> Option<ExprId> {
        self.advance(); // consume '('
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let span = self.ast.expr(callee).span.merge(self.previous.span);
        Some(self.ast.alloc_expr(ExprKind::Call { callee, args }, span))
    }

    fn parse_index(&mut self, base: ExprId) -> Option<ExprId> {
        self.advance(); // consume '['
        let index = self.parse_expr()?;
        self.expect(TokenKind::RBracket)?;
        let span = self.ast.expr(base).span.merge(self.previous.span);
        Some(self.ast.alloc_expr(ExprKind::Index { base, index }, span))
    }

    fn parse_member(&mut self, object: ExprId) -> Option<ExprId> {
        self.advance(); // consume '.'
        let member = self.expect_ident()?;
        let span = self.ast.expr(object).span.merge(member.span);
        Some(self.ast.alloc_expr(ExprKind::Member { object, member }, span))
    }

    /// `cond ? a : b`, right-associative.
    fn parse_ternary(&mut self, cond: ExprId) -> Option<ExprId> {
        self.advance(); // consume '?'
        let then_expr = self.parse_expr_prec(Precedence::None)?;
        self.expect(TokenKind::Colon)?;
        let else_expr = self.parse_expr_prec(Precedence::None)?;
        let span = self.ast.expr(cond).span.merge(self.ast.expr(else_expr).span);
        Some(self.ast.alloc_expr(
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            },
            span,
        ))
    }
}

/// Resolve backslash escapes in a literal body.
fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            _ => return None,
        });
    }
    Some(out)
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

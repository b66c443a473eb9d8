//! Parser for STELA.
//!
//! This module implements a hand-written recursive descent parser with
//! Pratt parsing for expressions. Nodes are allocated directly into the
//! shared [`Ast`] arena.
//!
//! # Parser Architecture
//!
//! - `expr` - Expression parsing with Pratt parsing for precedence
//! - `item` - Module header, imports and declarations
//! - `types` - Type expression parsing
//!
//! Statements are parsed here, next to the token handling they lean on.
//!
//! # Example
//!
//! ```rust
//! use stelac::ast::{Ast, DeclKind};
//! use stelac::parser::Parser;
//! use stelac::span::FileId;
//!
//! let mut ast = Ast::new();
//! let source = "func add(a: sint, b: sint) -> sint { return a + b; }";
//! let module = Parser::new(source, FileId(0), &mut ast)
//!     .parse_module("main")
//!     .expect("parse failed");
//!
//! assert_eq!(module.decls.len(), 1);
//! assert!(matches!(ast.decl(module.decls[0]).kind, DeclKind::Func(_)));
//! ```
//!
//! # Error Recovery
//!
//! The parser implements panic-mode error recovery. After an error it skips
//! tokens until the start of the next declaration, so one run reports at
//! most one error per declaration.

mod expr;
mod item;
mod types;

#[cfg(test)]
mod tests;

use crate::ast::*;
use crate::def::StmtId;
use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::span::{FileId, Span};

pub use self::expr::Precedence;

/// The STELA parser.
pub struct Parser<'src, 'ast> {
    /// The lexer producing tokens.
    lexer: Lexer<'src>,
    /// The source text (for extracting lexemes).
    source: &'src str,
    /// Arena receiving the parsed nodes.
    ast: &'ast mut Ast,
    /// The file spans are attributed to.
    file: FileId,
    /// Current token.
    current: Token,
    /// Next token (for one-token lookahead).
    next: Token,
    /// Previous token.
    previous: Token,
    /// Accumulated errors.
    errors: Vec<Diagnostic>,
    /// Whether we're in panic mode (error recovery).
    panic_mode: bool,
}

impl<'src, 'ast> Parser<'src, 'ast> {
    /// Create a new parser for the given source.
    pub fn new(source: &'src str, file: FileId, ast: &'ast mut Ast) -> Self {
        let mut lexer = Lexer::for_file(source, file);
        let current = lexer.next().unwrap_or(Token::dummy(TokenKind::Eof));
        let next = lexer.next().unwrap_or(Token::dummy(TokenKind::Eof));

        let mut parser = Self {
            lexer,
            source,
            ast,
            file,
            current,
            next,
            previous: Token::dummy(TokenKind::Error),
            errors: Vec::new(),
            panic_mode: false,
        };
        parser.report_lexer_error_at_current();
        parser
    }

    /// Parse a complete module.
    ///
    /// `default_name` names the module when the file has no `module` header
    /// (the CLI passes the file stem).
    #[must_use = "parsing has no effect if the result is not used"]
    pub fn parse_module(mut self, default_name: &str) -> Result<Module, Vec<Diagnostic>> {
        let name = if self.check(TokenKind::Module) {
            self.parse_module_header()
        } else {
            let span = Span::dummy().in_file(self.file);
            Ident {
                name: self.ast.intern(default_name),
                span,
            }
        };

        let mut imports = Vec::new();
        while self.check(TokenKind::Import) {
            if let Some(import) = self.parse_import() {
                imports.push(import);
            }
        }

        let mut decls = Vec::new();
        while !self.is_at_end() {
            match self.parse_declaration() {
                Some(decl) if !self.panic_mode => decls.push(decl),
                _ => self.synchronize(),
            }
        }

        if self.errors.is_empty() {
            Ok(Module {
                name,
                imports,
                decls,
                file: self.file,
            })
        } else {
            Err(self.errors)
        }
    }

    /// Parse a source string that contains exactly one type expression.
    ///
    /// Used by the external module builder to declare host signatures.
    #[must_use = "parsing has no effect if the result is not used"]
    pub fn parse_standalone_type(mut self) -> Result<crate::def::TypeExprId, Vec<Diagnostic>> {
        let ty = self.parse_type();
        if !self.is_at_end() {
            self.error_expected("end of type");
        }
        match ty {
            Some(ty) if self.errors.is_empty() => Ok(ty),
            _ => Err(self.errors),
        }
    }

    // ============================================================
    // Token handling
    // ============================================================

    /// Check if the current token matches the given kind.
    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Check if the next token (lookahead) matches the given kind.
    fn check_next(&self, kind: TokenKind) -> bool {
        self.next.kind == kind
    }

    /// Check if we've reached the end of input.
    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    /// Advance to the next token, returning the previous.
    fn advance(&mut self) -> Token {
        self.previous = self.current.clone();

        // Don't advance past EOF
        if self.current.kind == TokenKind::Eof {
            return self.previous.clone();
        }

        self.current = self.next.clone();
        let eof = self.source.len();
        self.next = self.lexer.next().unwrap_or_else(|| {
            Token::new(TokenKind::Eof, Span::new(eof, eof, 0, 0).in_file(self.file))
        });
        self.report_lexer_error_at_current();
        self.previous.clone()
    }

    fn report_lexer_error_at_current(&mut self) {
        match self.current.kind {
            TokenKind::Error => {
                self.error_at_current("unexpected character", ErrorCode::UnexpectedCharacter)
            }
            TokenKind::UnclosedBlockComment => {
                self.error_at_current("unclosed block comment", ErrorCode::UnclosedBlockComment)
            }
            _ => {}
        }
    }

    /// Consume a token of the expected kind, or error.
    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            self.error_expected(kind.description());
            None
        }
    }

    /// Try to consume a token of the expected kind.
    fn try_consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Get the text of a span.
    fn text(&self, span: &Span) -> &'src str {
        &self.source[span.start..span.end]
    }

    /// Consume an identifier and intern it.
    fn expect_ident(&mut self) -> Option<Ident> {
        if self.check(TokenKind::Ident) {
            let token = self.advance();
            let text = self.text(&token.span);
            Some(Ident {
                name: self.ast.intern(text),
                span: token.span,
            })
        } else {
            let found = self.current.kind.description();
            self.error_at_current(
                &format!("expected identifier, found {found}"),
                ErrorCode::ExpectedIdentifier,
            );
            None
        }
    }

    // ============================================================
    // Error handling
    // ============================================================

    fn error_at_current(&mut self, message: &str, code: ErrorCode) {
        self.error_at(self.current.span, message, code);
    }

    fn error_at(&mut self, span: Span, message: &str, code: ErrorCode) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.errors
            .push(Diagnostic::error(message, span).with_code(code.as_str()));
    }

    fn error_expected(&mut self, expected: &str) {
        let found = self.current.kind.description();
        let message = format!("expected {expected}, found {found}");
        let code = if self.is_at_end() {
            ErrorCode::UnexpectedEof
        } else {
            ErrorCode::UnexpectedToken
        };
        self.error_at_current(&message, code);
    }

    /// Synchronize after an error by skipping to the next declaration keyword.
    ///
    /// Braced blocks are skipped whole so recovery never stops inside a body.
    fn synchronize(&mut self) {
        self.panic_mode = false;

        while !self.is_at_end() {
            match self.current.kind {
                TokenKind::Func
                | TokenKind::Extern
                | TokenKind::Struct
                | TokenKind::Enum
                | TokenKind::Type
                | TokenKind::Let
                | TokenKind::Var => return,
                TokenKind::LBrace => {
                    self.advance();
                    self.skip_to_closing_brace();
                    continue;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn skip_to_closing_brace(&mut self) {
        let mut depth = 1;
        while !self.is_at_end() && depth > 0 {
            match self.current.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.advance();
        }
    }

    // ============================================================
    // Statements
    // ============================================================

    /// Parse `{ stmt* }`.
    fn parse_block(&mut self) -> Option<Vec<StmtId>> {
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let before = self.current.span.start;
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => {
                    // Guarantee progress; the error is already recorded.
                    if self.current.span.start == before {
                        self.advance();
                    }
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        Some(stmts)
    }

    fn parse_stmt(&mut self) -> Option<StmtId> {
        let start = self.current.span;
        let kind = match self.current.kind {
            TokenKind::Let | TokenKind::Var => StmtKind::Local(self.parse_local_decl()?),
            TokenKind::If => return self.parse_if(),
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semi)?;
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semi)?;
                StmtKind::Continue
            }
            TokenKind::LBrace => StmtKind::Block(self.parse_block()?),
            // `func name(` is a nested declaration; `func(` is a closure expression.
            TokenKind::Func if self.check_next(TokenKind::Ident) => {
                StmtKind::Func(self.parse_func_decl(FuncKind::Free, Access::Public)?)
            }
            _ => self.parse_expr_or_assign_stmt()?,
        };
        let span = start.merge(self.previous.span);
        Some(self.ast.alloc_stmt(kind, span))
    }

    /// `let|var name (: T)? (= init)? ;`
    fn parse_local_decl(&mut self) -> Option<LocalDecl> {
        let mutability = if self.advance().kind == TokenKind::Var {
            Mutability::Var
        } else {
            Mutability::Let
        };
        let name = self.expect_ident()?;
        let ty = if self.try_consume(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.try_consume(TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        if ty.is_none() && init.is_none() {
            self.error_at(
                name.span,
                "a variable needs a type annotation or an initializer",
                ErrorCode::ExpectedType,
            );
            return None;
        }
        self.expect(TokenKind::Semi)?;
        Some(LocalDecl {
            mutability,
            name,
            ty,
            init,
            resolved: Resolved::new(),
        })
    }

    fn parse_if(&mut self) -> Option<StmtId> {
        let start = self.advance().span;
        let cond = self.parse_expr()?;
        let then_body = self.parse_block()?;
        let else_body = if self.try_consume(TokenKind::Else) {
            if self.check(TokenKind::If) {
                // `else if` nests as a single-statement else body.
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        let span = start.merge(self.previous.span);
        Some(self.ast.alloc_stmt(
            StmtKind::If {
                cond,
                then_body,
                else_body,
            },
            span,
        ))
    }

    fn parse_expr_or_assign_stmt(&mut self) -> Option<StmtKind> {
        let target = self.parse_expr()?;
        let kind = if self.try_consume(TokenKind::Eq) {
            let value = self.parse_expr()?;
            StmtKind::Assign {
                target,
                op: None,
                value,
            }
        } else if let Some(op) = expr::token_to_compound_op(self.current.kind) {
            self.advance();
            let value = self.parse_expr()?;
            StmtKind::Assign {
                target,
                op: Some(op),
                value,
            }
        } else {
            StmtKind::Expr(target)
        };
        self.expect(TokenKind::Semi)?;
        Some(kind)
    }
}

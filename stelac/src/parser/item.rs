//! Module header, import and declaration parsing.

use super::Parser;
use crate::ast::*;
use crate::def::DeclId;
use crate::diagnostics::ErrorCode;
use crate::lexer::TokenKind;

impl<'src, 'ast> Parser<'src, 'ast> {
    /// `module name;`
    pub(super) fn parse_module_header(&mut self) -> Ident {
        self.advance(); // consume 'module'
        let name = self.expect_ident();
        self.expect(TokenKind::Semi);
        name.unwrap_or(Ident {
            name: self.ast.intern("<error>"),
            span: self.previous.span,
        })
    }

    /// `import name;`
    pub(super) fn parse_import(&mut self) -> Option<Ident> {
        self.advance(); // consume 'import'
        let name = self.expect_ident()?;
        self.expect(TokenKind::Semi)?;
        Some(name)
    }

    /// Parse one top-level declaration.
    pub(super) fn parse_declaration(&mut self) -> Option<DeclId> {
        match self.current.kind {
            TokenKind::Func => self.parse_func_decl(FuncKind::Free, Access::Public),
            TokenKind::Extern => {
                self.advance();
                if !self.check(TokenKind::Func) {
                    self.error_expected("`func` after `extern`");
                    return None;
                }
                self.parse_func_decl(FuncKind::Free, Access::Public)
            }
            TokenKind::Struct => self.parse_struct(),
            TokenKind::Enum => self.parse_enum(),
            TokenKind::Type => self.parse_alias(),
            TokenKind::Let | TokenKind::Var => {
                let start = self.current.span;
                let local = self.parse_local_decl()?;
                let span = start.merge(self.previous.span);
                Some(self.ast.alloc_decl(DeclKind::Global(local), span))
            }
            TokenKind::Import => {
                self.error_at_current(
                    "imports must precede every declaration",
                    ErrorCode::InvalidItem,
                );
                None
            }
            _ => {
                let found = self.current.kind.description();
                self.error_at_current(
                    &format!("expected declaration, found {found}"),
                    ErrorCode::InvalidItem,
                );
                None
            }
        }
    }

    /// `func name(params) (-> T)? (body | ;)`
    ///
    /// A body is required unless the declaration was introduced by `extern`.
    pub(super) fn parse_func_decl(&mut self, kind: FuncKind, access: Access) -> Option<DeclId> {
        let is_extern = self.previous.kind == TokenKind::Extern;
        let start = if is_extern {
            self.previous.span
        } else {
            self.current.span
        };
        self.expect(TokenKind::Func)?;
        let name = self.expect_ident()?;
        let sig = self.parse_func_sig(!is_extern)?;
        let span = start.merge(self.previous.span);
        Some(self.ast.alloc_decl(
            DeclKind::Func(FuncDecl {
                name,
                sig,
                kind,
                access,
            }),
            span,
        ))
    }

    /// `(params) (-> T)?` followed by a block, or by `;` when no body is required.
    pub(super) fn parse_func_sig(&mut self, require_body: bool) -> Option<FuncSig> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            params.push(self.parse_param()?);
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

        let body = if require_body {
            if !self.check(TokenKind::LBrace) {
                self.error_at_current("missing function body", ErrorCode::MissingFunctionBody);
                return None;
            }
            Some(self.parse_block()?)
        } else {
            self.expect(TokenKind::Semi)?;
            None
        };

        Some(FuncSig { params, ret, body })
    }

    /// `name: T`, `var name: T` or `ref name: T`.
    fn parse_param(&mut self) -> Option<Param> {
        let start = self.current.span;
        let (mutability, referenceness) = if self.try_consume(TokenKind::Ref) {
            (Mutability::Var, Referenceness::Ref)
        } else if self.try_consume(TokenKind::Var) {
            (Mutability::Var, Referenceness::Val)
        } else {
            (Mutability::Let, Referenceness::Val)
        };
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Some(Param {
            name,
            mutability,
            referenceness,
            ty,
            span: start.merge(self.previous.span),
            resolved: Resolved::new(),
        })
    }

    fn parse_struct(&mut self) -> Option<DeclId> {
        let start = self.advance().span; // consume 'struct'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let access = if self.try_consume(TokenKind::Private) {
                Access::Private
            } else {
                Access::Public
            };
            let member = match self.current.kind {
                TokenKind::Static => {
                    self.advance();
                    StructMember::Func(self.parse_func_decl(FuncKind::Static, access)?)
                }
                TokenKind::Var if self.check_next(TokenKind::Func) => {
                    self.advance();
                    StructMember::Func(
                        self.parse_func_decl(FuncKind::Method(Mutability::Var), access)?,
                    )
                }
                TokenKind::Func => StructMember::Func(
                    self.parse_func_decl(FuncKind::Method(Mutability::Let), access)?,
                ),
                TokenKind::Ident => {
                    let field_start = self.current.span;
                    let field_name = self.expect_ident()?;
                    self.expect(TokenKind::Colon)?;
                    let ty = self.parse_type()?;
                    self.expect(TokenKind::Semi)?;
                    StructMember::Field(FieldDecl {
                        name: field_name,
                        ty,
                        access,
                        span: field_start.merge(self.previous.span),
                    })
                }
                _ => {
                    self.error_expected("field or member function");
                    return None;
                }
            };
            members.push(member);
        }
        self.expect(TokenKind::RBrace)?;

        let span = start.merge(self.previous.span);
        Some(
            self.ast
                .alloc_decl(DeclKind::Struct(StructDecl { name, members }), span),
        )
    }

    /// `enum Name { A, B = 4, C }`
    fn parse_enum(&mut self) -> Option<DeclId> {
        let start = self.advance().span; // consume 'enum'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;

        let mut cases = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let case_name = self.expect_ident()?;
            let value = if self.try_consume(TokenKind::Eq) {
                let negative = self.try_consume(TokenKind::Minus);
                let token = self.expect(TokenKind::IntLit)?;
                let text = self.text(&token.span).replace('_', "");
                match text.parse::<i64>() {
                    Ok(v) => Some(if negative { -v } else { v }),
                    Err(_) => {
                        self.error_at(token.span, "invalid enum case value", ErrorCode::InvalidInteger);
                        return None;
                    }
                }
            } else {
                None
            };
            cases.push(EnumCase {
                name: case_name,
                value,
            });
            if !self.try_consume(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;

        let span = start.merge(self.previous.span);
        Some(self.ast.alloc_decl(DeclKind::Enum(EnumDecl { name, cases }), span))
    }

    /// `type A = T;` declares a weak alias, `type A T;` a strong one.
    fn parse_alias(&mut self) -> Option<DeclId> {
        let start = self.advance().span; // consume 'type'
        let name = self.expect_ident()?;
        let strong = !self.try_consume(TokenKind::Eq);
        let target = self.parse_type()?;
        self.expect(TokenKind::Semi)?;

        let span = start.merge(self.previous.span);
        Some(self.ast.alloc_decl(
            DeclKind::Alias(AliasDecl {
                name,
                target,
                strong,
            }),
            span,
        ))
    }
}

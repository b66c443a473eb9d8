//! Lexical analysis for STELA.
//!
//! Tokenizes source text into a stream of [`Token`]s. Token kinds are derived
//! with `logos`; the [`Lexer`] wrapper attaches line/column information and
//! appends a single `Eof` token.
//!
//! # Example
//!
//! ```rust
//! use stelac::{Lexer, TokenKind};
//!
//! let tokens: Vec<_> = Lexer::new("let x = 42;").collect();
//!
//! assert_eq!(tokens[0].kind, TokenKind::Let);
//! assert_eq!(tokens[1].kind, TokenKind::Ident);
//! assert_eq!(tokens[2].kind, TokenKind::Eq);
//! assert_eq!(tokens[3].kind, TokenKind::IntLit);
//! assert_eq!(tokens[4].kind, TokenKind::Semi);
//! assert_eq!(tokens[5].kind, TokenKind::Eof);
//! ```

use crate::span::{FileId, LineIndex, Span};
use logos::Logos;

/// Token kinds for the STELA lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    // ============================================================
    // Keywords
    // ============================================================
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("else")]
    Else,
    #[token("enum")]
    Enum,
    #[token("extern")]
    Extern,
    #[token("false")]
    False,
    #[token("func")]
    Func,
    #[token("if")]
    If,
    #[token("import")]
    Import,
    #[token("let")]
    Let,
    #[token("module")]
    Module,
    #[token("private")]
    Private,
    #[token("ref")]
    Ref,
    #[token("return")]
    Return,
    #[token("self")]
    SelfLower,
    #[token("static")]
    Static,
    #[token("struct")]
    Struct,
    #[token("true")]
    True,
    #[token("type")]
    Type,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    // ============================================================
    // Literals
    // ============================================================
    /// Integer literal with optional `u` (uint) or `b` (byte) suffix.
    #[regex(r"[0-9][0-9_]*[ub]?")]
    #[regex(r"0x[0-9a-fA-F_]+[ub]?")]
    IntLit,

    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    FloatLit,

    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLit,

    #[regex(r"'([^'\\]|\\.)'")]
    CharLit,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ============================================================
    // Operators
    // ============================================================
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Not,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AndEq,
    #[token("|=")]
    OrEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,

    // ============================================================
    // Delimiters and punctuation
    // ============================================================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("?")]
    Question,

    // ============================================================
    // Comments
    // ============================================================
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,

    /// Unclosed block comment (produced by the wrapper, not by logos).
    UnclosedBlockComment,

    /// End of file marker (added by the Lexer wrapper).
    Eof,

    /// Lexer error.
    Error,
}

/// Callback for block comments. STELA block comments do not nest; an
/// unclosed comment is reported as a lexer error and mapped to
/// [`TokenKind::UnclosedBlockComment`] by the [`Lexer`] wrapper.
fn block_comment(lexer: &mut logos::Lexer<TokenKind>) -> logos::FilterResult<(), ()> {
    match lexer.remainder().find("*/") {
        Some(end) => {
            lexer.bump(end + 2);
            logos::FilterResult::Skip
        }
        None => {
            lexer.bump(lexer.remainder().len());
            logos::FilterResult::Error(())
        }
    }
}

impl TokenKind {
    /// Returns a human-readable description of the token kind.
    pub fn description(&self) -> &'static str {
        match self {
            TokenKind::Break => "keyword `break`",
            TokenKind::Continue => "keyword `continue`",
            TokenKind::Else => "keyword `else`",
            TokenKind::Enum => "keyword `enum`",
            TokenKind::Extern => "keyword `extern`",
            TokenKind::False => "keyword `false`",
            TokenKind::Func => "keyword `func`",
            TokenKind::If => "keyword `if`",
            TokenKind::Import => "keyword `import`",
            TokenKind::Let => "keyword `let`",
            TokenKind::Module => "keyword `module`",
            TokenKind::Private => "keyword `private`",
            TokenKind::Ref => "keyword `ref`",
            TokenKind::Return => "keyword `return`",
            TokenKind::SelfLower => "keyword `self`",
            TokenKind::Static => "keyword `static`",
            TokenKind::Struct => "keyword `struct`",
            TokenKind::True => "keyword `true`",
            TokenKind::Type => "keyword `type`",
            TokenKind::Var => "keyword `var`",
            TokenKind::While => "keyword `while`",
            TokenKind::IntLit => "integer literal",
            TokenKind::FloatLit => "real literal",
            TokenKind::StringLit => "string literal",
            TokenKind::CharLit => "character literal",
            TokenKind::Ident => "identifier",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::And => "`&`",
            TokenKind::Or => "`|`",
            TokenKind::Caret => "`^`",
            TokenKind::Tilde => "`~`",
            TokenKind::Shl => "`<<`",
            TokenKind::Shr => "`>>`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::Not => "`!`",
            TokenKind::Eq => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Lt => "`<`",
            TokenKind::LtEq => "`<=`",
            TokenKind::Gt => "`>`",
            TokenKind::GtEq => "`>=`",
            TokenKind::PlusEq => "`+=`",
            TokenKind::MinusEq => "`-=`",
            TokenKind::StarEq => "`*=`",
            TokenKind::SlashEq => "`/=`",
            TokenKind::PercentEq => "`%=`",
            TokenKind::AndEq => "`&=`",
            TokenKind::OrEq => "`|=`",
            TokenKind::CaretEq => "`^=`",
            TokenKind::ShlEq => "`<<=`",
            TokenKind::ShrEq => "`>>=`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Semi => "`;`",
            TokenKind::Colon => "`:`",
            TokenKind::Dot => "`.`",
            TokenKind::Arrow => "`->`",
            TokenKind::Question => "`?`",
            TokenKind::LineComment | TokenKind::BlockComment => "comment",
            TokenKind::UnclosedBlockComment => "unclosed block comment",
            TokenKind::Eof => "end of file",
            TokenKind::Error => "invalid token",
        }
    }
}

/// A token with its kind and source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn dummy(kind: TokenKind) -> Self {
        Self {
            kind,
            span: Span::dummy(),
        }
    }
}

/// The lexer for STELA source code.
#[derive(Clone)]
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    source: &'src str,
    line_index: LineIndex,
    file: FileId,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Create a lexer for a source string in the default file.
    pub fn new(source: &'src str) -> Self {
        Self::for_file(source, FileId::default())
    }

    /// Create a lexer whose spans are attributed to `file`.
    pub fn for_file(source: &'src str, file: FileId) -> Self {
        Self {
            inner: TokenKind::lexer(source),
            source,
            line_index: LineIndex::new(source),
            file,
            finished: false,
        }
    }

    fn span(&self, range: std::ops::Range<usize>) -> Span {
        let (line, col) = self.line_index.line_col(range.start);
        Span::new(range.start, range.end, line, col).in_file(self.file)
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.inner.next() {
            Some(Ok(kind)) => Some(Token::new(kind, self.span(self.inner.span()))),
            Some(Err(())) => {
                let kind = if self.inner.slice().starts_with("/*") {
                    TokenKind::UnclosedBlockComment
                } else {
                    TokenKind::Error
                };
                Some(Token::new(kind, self.span(self.inner.span())))
            }
            None => {
                self.finished = true;
                let end = self.source.len();
                Some(Token::new(TokenKind::Eof, self.span(end..end)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("func funcs var ref"),
            vec![TokenKind::Func, TokenKind::Ident, TokenKind::Var, TokenKind::Ref, TokenKind::Eof]
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            kinds(r#"42 7u 255b 3.5 'c' "hi""#),
            vec![
                TokenKind::IntLit,
                TokenKind::IntLit,
                TokenKind::IntLit,
                TokenKind::FloatLit,
                TokenKind::CharLit,
                TokenKind::StringLit,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_compound_operators_prefer_longest_match() {
        assert_eq!(
            kinds("<<= >= -> &&"),
            vec![TokenKind::ShlEq, TokenKind::GtEq, TokenKind::Arrow, TokenKind::AndAnd, TokenKind::Eof]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a // trailing\n/* block */ b"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unclosed_block_comment() {
        assert_eq!(kinds("a /* never closed"), vec![TokenKind::Ident, TokenKind::UnclosedBlockComment, TokenKind::Eof]);
    }

    #[test]
    fn test_spans_carry_line_and_column() {
        let tokens: Vec<_> = Lexer::new("let\n  x").collect();
        assert_eq!((tokens[1].span.start_line, tokens[1].span.start_col), (2, 3));
    }
}

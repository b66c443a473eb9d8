//! Semantic analysis errors.
//!
//! Every semantic error is fatal: the first one aborts the compilation and is
//! propagated as `Err(Box<TypeError>)` up to the session.

use std::fmt;

use crate::diagnostics::Diagnostic;
use crate::project::graph::GraphError;
use crate::span::Span;

/// Result type alias for semantic analysis operations.
///
/// `TypeError` is boxed to keep the `Err` path small.
pub type TypeResult<T> = Result<T, Box<TypeError>>;

/// A semantic error.
#[derive(Debug, Clone)]
pub struct TypeError {
    /// The kind of error.
    pub kind: TypeErrorKind,
    /// The source span.
    pub span: Span,
    /// Optional help message.
    pub help: Option<String>,
    /// A related location, e.g. the previous definition of a redefined name.
    pub related: Option<(Span, String)>,
}

impl TypeError {
    /// Create a new error.
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self {
            kind,
            span,
            help: None,
            related: None,
        }
    }

    /// Wrap this error in a `Box` and return as `Err`.
    pub fn into_err<T>(self) -> TypeResult<T> {
        Err(Box::new(self))
    }

    /// Add a help message.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Point at a second location.
    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related = Some((span, message.into()));
        self
    }

    /// Convert a module graph failure, attributing it to `span`.
    pub fn from_graph(err: GraphError, span: Span) -> Self {
        let kind = match err {
            GraphError::DuplicateModule { name } => TypeErrorKind::DuplicateModule { name },
            GraphError::UnknownModule { name, importer } => {
                TypeErrorKind::UnknownModule { name, importer }
            }
            GraphError::CyclicImport { cycle } => TypeErrorKind::CyclicImport { cycle },
        };
        Self::new(kind, span)
    }

    /// The stable code of this error, e.g. `E0214`.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Convert to a diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.kind.message(), self.span).with_code(self.code());
        if let Some((span, message)) = &self.related {
            diag = diag.with_note(*span, message.clone());
        }
        if let Some(help) = &self.help {
            diag = diag.with_suggestion(help.clone());
        }
        diag
    }
}

/// The kind of semantic error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeErrorKind {
    // Resolution and type errors (E02xx)
    /// Type mismatch.
    Mismatch { expected: String, found: String },
    /// A type that cannot be deduced from context.
    CannotInfer { what: String },
    /// A type name that resolves to nothing.
    UndefinedType { name: String },
    /// An alias whose target reaches the alias again.
    RecursiveAlias { name: String },
    /// A value name that resolves to nothing.
    UndefinedSymbol { name: String },
    /// A non-type name used where a type is required.
    NotAType { name: String },
    /// A callee that is not callable.
    NotAFunction { ty: String },
    /// A type or module name used as a value.
    NotAValue { name: String },
    /// A member that does not exist.
    NoField { ty: String, field: String },
    /// A name declared twice in the same scope.
    Redefinition { name: String },
    /// Two struct members or enum cases with the same name.
    DuplicateField { owner: String, name: String },
    /// No candidate, or more than one, accepts the arguments.
    NoMatchingOverload {
        name: String,
        args: Vec<String>,
        candidates: usize,
    },
    /// A name that denotes more than one thing where one was required.
    AmbiguousReference { name: String },
    /// An operator applied to operands it does not accept.
    InvalidOperand { op: String, operands: Vec<String> },
    /// A write through a `let` binding or a temporary.
    ImmutabilityViolation { what: String },
    /// Missing, extra or undeducible return value.
    MissingOrBadReturn { reason: ReturnProblem },
    /// A member that is not accessible from here.
    MemberAccess { owner: String, member: String, reason: String },
    /// `break` or `continue` outside a loop.
    LoopControl { keyword: &'static str },

    // Module graph errors (E03xx)
    /// Two modules with the same name.
    DuplicateModule { name: String },
    /// An import naming a module that does not exist.
    UnknownModule { name: String, importer: String },
    /// Modules that import each other.
    CyclicImport { cycle: Vec<String> },
}

/// Why a `return` (or the lack of one) is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnProblem {
    /// `return;` in a function that returns a value.
    MissingValue { function: String },
    /// `return x;` in a function that returns `void`.
    ValueInVoid { function: String },
    /// A path through the body that ends without returning.
    NotAllPathsReturn { function: String },
    /// The return type depends only on the function itself.
    UndeducibleRecursion { function: String },
    /// A recursive call whose result was used before its type was known.
    RecursiveCallOutsideReturn { function: String },
    /// `return` outside any function body.
    OutsideFunction,
}

impl TypeErrorKind {
    /// The stable code of this kind.
    pub fn code(&self) -> &'static str {
        match self {
            TypeErrorKind::Mismatch { .. } => "E0201",
            TypeErrorKind::CannotInfer { .. } => "E0202",
            TypeErrorKind::UndefinedType { .. } => "E0203",
            TypeErrorKind::RecursiveAlias { .. } => "E0205",
            TypeErrorKind::UndefinedSymbol { .. } => "E0208",
            TypeErrorKind::NotAType { .. } => "E0209",
            TypeErrorKind::NotAFunction { .. } => "E0210",
            TypeErrorKind::NotAValue { .. } => "E0211",
            TypeErrorKind::NoField { .. } => "E0213",
            TypeErrorKind::Redefinition { .. } => "E0214",
            TypeErrorKind::DuplicateField { .. } => "E0215",
            TypeErrorKind::NoMatchingOverload { .. } => "E0216",
            TypeErrorKind::AmbiguousReference { .. } => "E0217",
            TypeErrorKind::InvalidOperand { .. } => "E0218",
            TypeErrorKind::ImmutabilityViolation { .. } => "E0219",
            TypeErrorKind::MissingOrBadReturn { .. } => "E0220",
            TypeErrorKind::MemberAccess { .. } => "E0221",
            TypeErrorKind::LoopControl { .. } => "E0222",
            TypeErrorKind::DuplicateModule { .. } => "E0301",
            TypeErrorKind::UnknownModule { .. } => "E0302",
            TypeErrorKind::CyclicImport { .. } => "E0303",
        }
    }

    /// The human-readable message of this kind.
    pub fn message(&self) -> String {
        match self {
            TypeErrorKind::Mismatch { expected, found } => {
                format!("type mismatch: expected `{expected}`, found `{found}`")
            }
            TypeErrorKind::CannotInfer { what } => format!("cannot infer the type of {what}"),
            TypeErrorKind::UndefinedType { name } => {
                format!("cannot find type `{name}` in this scope")
            }
            TypeErrorKind::RecursiveAlias { name } => {
                format!("type alias `{name}` refers to itself")
            }
            TypeErrorKind::UndefinedSymbol { name } => {
                format!("cannot find `{name}` in this scope")
            }
            TypeErrorKind::NotAType { name } => format!("`{name}` is not a type"),
            TypeErrorKind::NotAFunction { ty } => format!("expected function, found `{ty}`"),
            TypeErrorKind::NotAValue { name } => format!("`{name}` cannot be used as a value"),
            TypeErrorKind::NoField { ty, field } => {
                format!("no member `{field}` on type `{ty}`")
            }
            TypeErrorKind::Redefinition { name } => {
                format!("the name `{name}` is defined multiple times")
            }
            TypeErrorKind::DuplicateField { owner, name } => {
                format!("`{name}` is declared more than once in `{owner}`")
            }
            TypeErrorKind::NoMatchingOverload {
                name,
                args,
                candidates,
            } => {
                let what = if *candidates == 0 {
                    "no overload of".to_string()
                } else {
                    format!("{candidates} overloads of")
                };
                format!("{what} `{name}` accept(s) arguments ({})", args.join(", "))
            }
            TypeErrorKind::AmbiguousReference { name } => {
                format!("reference to `{name}` is ambiguous")
            }
            TypeErrorKind::InvalidOperand { op, operands } => format!(
                "operator `{op}` cannot be applied to `{}`",
                operands.join("`, `")
            ),
            TypeErrorKind::ImmutabilityViolation { what } => format!("cannot assign to {what}"),
            TypeErrorKind::MissingOrBadReturn { reason } => match reason {
                ReturnProblem::MissingValue { function } => {
                    format!("`{function}` must return a value")
                }
                ReturnProblem::ValueInVoid { function } => {
                    format!("`{function}` returns `void` but a value is returned")
                }
                ReturnProblem::NotAllPathsReturn { function } => {
                    format!("not every path through `{function}` returns a value")
                }
                ReturnProblem::UndeducibleRecursion { function } => {
                    format!("cannot deduce the return type of `{function}` from its own recursion")
                }
                ReturnProblem::RecursiveCallOutsideReturn { function } => format!(
                    "the result of recursive call to `{function}` is used before its return type is known"
                ),
                ReturnProblem::OutsideFunction => "`return` outside of a function".to_string(),
            },
            TypeErrorKind::MemberAccess {
                owner,
                member,
                reason,
            } => format!("cannot access `{owner}.{member}`: {reason}"),
            TypeErrorKind::LoopControl { keyword } => format!("`{keyword}` outside of a loop"),
            TypeErrorKind::DuplicateModule { name } => {
                format!("module `{name}` is defined more than once")
            }
            TypeErrorKind::UnknownModule { name, importer } => {
                format!("module `{importer}` imports unknown module `{name}`")
            }
            TypeErrorKind::CyclicImport { cycle } => {
                format!("circular import detected: {}", cycle.join(" -> "))
            }
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.message())
    }
}

impl std::error::Error for TypeError {}

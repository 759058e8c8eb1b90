//! Front end: tokenizer, parser and syntax tree for contract source text, plus the
//! [`Diagnostic`] type every later pass reports errors with.

pub mod ast;
mod diagnostic;
mod lexer;
mod parser;

pub use diagnostic::{Diagnostic, DiagnosticKind, Span, highlight_span};
pub use lexer::{Token, tokenize};
pub use parser::{parse_expr, parse_module};

/// Result of any compilation pass.
pub type Result<T, E = Diagnostic> = std::result::Result<T, E>;

//! Compile-time diagnostics shared by every pass.

use smallvec::SmallVec;
use std::{fmt, ops::Range};

/// Byte offsets into the source text.
pub type Span = Range<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Malformed or structurally illegal source, detected independently of typing
    Syntax,
    /// Scope violations (unknown or duplicate names, misplaced declarations)
    Structure,
    /// Shape or type incompatibility
    Type,
    /// Builtin call arity or argument type mismatch
    Argument,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Syntax => "SyntaxError",
            DiagnosticKind::Structure => "StructureError",
            DiagnosticKind::Type => "TypeError",
            DiagnosticKind::Argument => "ArgumentError",
        };
        f.write_str(name)
    }
}

/// The first error raised while compiling a unit. Never downgraded, never recovered from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self { kind, message: message.into(), span }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::Syntax, message, span)
    }

    pub fn structure(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::Structure, message, span)
    }

    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::Type, message, span)
    }

    pub fn argument(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::Argument, message, span)
    }

    /// 1-based line and column of the start of the span.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let start = self.span.start.min(source.len());
        let before = &source[..floor_char_boundary(source, start)];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        (line, column)
    }

    /// Message followed by the offending source line with the span underlined.
    pub fn render(&self, source: &str) -> String {
        let (line, column) = self.line_col(source);
        let mut out = format!("{self}\n  --> line {line}, column {column}\n");
        // Writing into a String cannot fail.
        let _ = highlight_span(&mut out, source, self.span.clone(), 1);
        out
    }
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    while !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Writes the lines surrounding `span` and underlines the highlighted part. Spans covering
/// several lines are underlined up to the end of their first line.
pub fn highlight_span(
    out: &mut impl fmt::Write,
    source: &str,
    span: Span,
    line_range: usize,
) -> fmt::Result {
    let mut lines: SmallVec<[usize; 1024]> = SmallVec::new();
    lines.extend(source.char_indices().filter_map(|(i, c)| (c == '\n').then_some(i)));
    lines.push(source.len());

    let start = span.start.min(source.len());
    let line = lines.binary_search(&start).unwrap_or_else(|x| x);
    let line_end = lines[line];
    let end = span.end.clamp(start, line_end);

    let show_start = line.saturating_sub(line_range);
    let show_end = (line + line_range).min(lines.len() - 1);

    let dig_width = (show_end + 1).checked_ilog10().unwrap_or(0) as usize + 1;

    for i in show_start..=show_end {
        let current_start = lines.get(i.wrapping_sub(1)).map_or(0, |&i| i + 1);
        let current_end = lines[i];

        writeln!(out, "{:>2$} | {}", i + 1, &source[current_start..current_end], dig_width)?;
        if i == line {
            let padding = source[current_start..start].chars().count() + dig_width + 3;
            let carets = source[start..end].chars().count().max(1);
            writeln!(out, "{}{}", " ".repeat(padding), "^".repeat(carets))?;
        }
    }
    Ok(())
}

//! Indentation-aware tokenizer.
//!
//! Tokens carry no payload; literal and identifier text is recovered from the source through the
//! token's span. Layout is made explicit with `Newline`, `Indent` and `Dedent` tokens, which are
//! suppressed while inside any kind of bracket.

use crate::diagnostic::{Diagnostic, Span};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Name,
    Int,
    Hex,
    Str,
    /// `b"..."`
    ByteStr,

    // Keywords
    Def,
    Return,
    If,
    Elif,
    Else,
    For,
    In,
    While,
    Pass,
    Break,
    Continue,
    Assert,
    Raise,
    Log,
    And,
    Or,
    Not,
    True,
    False,
    Struct,
    Interface,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Colon,
    Comma,
    Dot,
    ThinArrow,
    At,

    // Operators
    Equals,
    PlusEquals,
    MinusEquals,
    StarEquals,
    SlashEquals,
    PercentEquals,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    ShiftLeft,
    ShiftRight,
    EqEq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,

    // Layout
    Newline,
    Indent,
    Dedent,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Name => "identifier",
            Token::Int => "integer literal",
            Token::Hex => "hex literal",
            Token::Str => "string literal",
            Token::ByteStr => "bytes literal",
            Token::Def => "'def'",
            Token::Return => "'return'",
            Token::If => "'if'",
            Token::Elif => "'elif'",
            Token::Else => "'else'",
            Token::For => "'for'",
            Token::In => "'in'",
            Token::While => "'while'",
            Token::Pass => "'pass'",
            Token::Break => "'break'",
            Token::Continue => "'continue'",
            Token::Assert => "'assert'",
            Token::Raise => "'raise'",
            Token::Log => "'log'",
            Token::And => "'and'",
            Token::Or => "'or'",
            Token::Not => "'not'",
            Token::True => "'True'",
            Token::False => "'False'",
            Token::Struct => "'struct'",
            Token::Interface => "'interface'",
            Token::LeftParen => "'('",
            Token::RightParen => "')'",
            Token::LeftBracket => "'['",
            Token::RightBracket => "']'",
            Token::LeftBrace => "'{'",
            Token::RightBrace => "'}'",
            Token::Colon => "':'",
            Token::Comma => "','",
            Token::Dot => "'.'",
            Token::ThinArrow => "'->'",
            Token::At => "'@'",
            Token::Equals => "'='",
            Token::PlusEquals => "'+='",
            Token::MinusEquals => "'-='",
            Token::StarEquals => "'*='",
            Token::SlashEquals => "'/='",
            Token::PercentEquals => "'%='",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Star => "'*'",
            Token::StarStar => "'**'",
            Token::Slash => "'/'",
            Token::Percent => "'%'",
            Token::Amp => "'&'",
            Token::Pipe => "'|'",
            Token::Caret => "'^'",
            Token::Tilde => "'~'",
            Token::ShiftLeft => "'<<'",
            Token::ShiftRight => "'>>'",
            Token::EqEq => "'=='",
            Token::NotEq => "'!='",
            Token::Less => "'<'",
            Token::LessEq => "'<='",
            Token::Greater => "'>'",
            Token::GreaterEq => "'>='",
            Token::Newline => "newline",
            Token::Indent => "indent",
            Token::Dedent => "dedent",
        };
        f.write_str(text)
    }
}

fn keyword(ident: &str) -> Option<Token> {
    let token = match ident {
        "def" => Token::Def,
        "return" => Token::Return,
        "if" => Token::If,
        "elif" => Token::Elif,
        "else" => Token::Else,
        "for" => Token::For,
        "in" => Token::In,
        "while" => Token::While,
        "pass" => Token::Pass,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "assert" => Token::Assert,
        "raise" => Token::Raise,
        "log" => Token::Log,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "True" => Token::True,
        "False" => Token::False,
        "struct" => Token::Struct,
        "interface" => Token::Interface,
        _ => return None,
    };
    Some(token)
}

/// Longest-match operator table; entries sharing a prefix are ordered longest first.
const OPERATORS: &[(&str, Token)] = &[
    ("**", Token::StarStar),
    ("*=", Token::StarEquals),
    ("*", Token::Star),
    ("//=", Token::SlashEquals),
    ("//", Token::Slash),
    ("/=", Token::SlashEquals),
    ("/", Token::Slash),
    ("+=", Token::PlusEquals),
    ("+", Token::Plus),
    ("->", Token::ThinArrow),
    ("-=", Token::MinusEquals),
    ("-", Token::Minus),
    ("%=", Token::PercentEquals),
    ("%", Token::Percent),
    ("<<", Token::ShiftLeft),
    ("<=", Token::LessEq),
    ("<", Token::Less),
    (">>", Token::ShiftRight),
    (">=", Token::GreaterEq),
    (">", Token::Greater),
    ("==", Token::EqEq),
    ("=", Token::Equals),
    ("!=", Token::NotEq),
    ("&", Token::Amp),
    ("|", Token::Pipe),
    ("^", Token::Caret),
    ("~", Token::Tilde),
    ("(", Token::LeftParen),
    (")", Token::RightParen),
    ("[", Token::LeftBracket),
    ("]", Token::RightBracket),
    ("{", Token::LeftBrace),
    ("}", Token::RightBrace),
    (":", Token::Colon),
    (",", Token::Comma),
    (".", Token::Dot),
    ("@", Token::At),
];

pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, Diagnostic> {
    let mut lexer = Lexer {
        source,
        pos: 0,
        tokens: Vec::with_capacity(source.len() / 3),
        indents: vec![0],
        depth: 0,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    tokens: Vec<(Token, Span)>,
    indents: Vec<usize>,
    /// Bracket nesting depth; layout tokens are only produced at depth zero.
    depth: usize,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<(), Diagnostic> {
        let mut at_line_start = true;
        while self.pos < self.source.len() {
            if at_line_start && self.depth == 0 {
                if !self.line_indentation()? {
                    continue;
                }
                at_line_start = false;
            }
            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\r' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' if self.rest().starts_with("\\\n") => self.pos += 2,
                '\n' => {
                    if self.depth == 0 {
                        self.push_newline(self.pos);
                        at_line_start = true;
                    }
                    self.pos += 1;
                }
                'b' if self.rest()[1..].starts_with(['"', '\'']) => self.byte_string()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.name(),
                c if c.is_ascii_digit() => self.number()?,
                '"' | '\'' => self.string(c, Token::Str)?,
                _ => self.operator()?,
            }
        }

        let end = self.source.len();
        self.push_newline(end);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens.push((Token::Dedent, end..end));
        }
        Ok(())
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn push_newline(&mut self, at: usize) {
        if matches!(self.tokens.last(), Some((last, _)) if *last != Token::Newline) {
            self.tokens.push((Token::Newline, at..at));
        }
    }

    /// Measures the indentation of the line starting at `pos` and emits layout tokens. Returns
    /// `false` for blank and comment-only lines, which are consumed entirely.
    fn line_indentation(&mut self) -> Result<bool, Diagnostic> {
        let start = self.pos;
        let width = self.rest().chars().take_while(|c| *c == ' ' || *c == '\t').count();
        self.pos += width;

        match self.peek() {
            None => return Ok(false),
            Some('\n') => {
                self.pos += 1;
                return Ok(false);
            }
            Some('\r') if self.rest().starts_with("\r\n") => {
                self.pos += 2;
                return Ok(false);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.pos += 1;
                }
                return Ok(false);
            }
            Some(_) => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.tokens.push((Token::Indent, start..self.pos));
        } else {
            while width < self.indents.last().copied().unwrap_or(0) {
                self.indents.pop();
                self.tokens.push((Token::Dedent, self.pos..self.pos));
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(Diagnostic::syntax(
                    "unindent does not match any outer indentation level",
                    start..self.pos,
                ));
            }
        }
        Ok(true)
    }

    fn skip_comment(&mut self) {
        let len = self.rest().find('\n').unwrap_or(self.rest().len());
        self.pos += len;
    }

    fn name(&mut self) {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        self.pos += len;
        let text = &self.source[start..self.pos];
        self.tokens.push((keyword(text).unwrap_or(Token::Name), start..self.pos));
    }

    fn number(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        let rest = self.rest();
        let token = if rest.starts_with("0x") || rest.starts_with("0X") {
            let digits = rest[2..].find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(rest.len() - 2);
            if digits == 0 {
                return Err(Diagnostic::syntax("hex literal without digits", start..start + 2));
            }
            self.pos += 2 + digits;
            Token::Hex
        } else {
            let len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '_'))
                .unwrap_or(rest.len());
            self.pos += len;
            Token::Int
        };

        match self.peek() {
            Some('.') if self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()) => {
                Err(Diagnostic::syntax("decimal literals are not supported", start..self.pos + 1))
            }
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                Err(Diagnostic::syntax("invalid numeric literal", start..self.pos + 1))
            }
            _ => {
                self.tokens.push((token, start..self.pos));
                Ok(())
            }
        }
    }

    fn string(&mut self, quote: char, token: Token) -> Result<(), Diagnostic> {
        let start = if token == Token::ByteStr { self.pos - 1 } else { self.pos };
        let triple = if quote == '"' { "\"\"\"" } else { "'''" };
        if self.rest().starts_with(triple) {
            let Some(len) = self.rest()[3..].find(triple) else {
                return Err(Diagnostic::syntax("unterminated string literal", start..start + 3));
            };
            self.pos += len + 6;
            self.tokens.push((token, start..self.pos));
            return Ok(());
        }

        let open = self.pos;
        let mut chars = self.rest().char_indices().skip(1);
        loop {
            match chars.next() {
                Some((_, '\\')) => {
                    chars.next();
                }
                Some((i, c)) if c == quote => {
                    self.pos += i + 1;
                    break;
                }
                Some((_, '\n')) | None => {
                    return Err(Diagnostic::syntax(
                        "unterminated string literal",
                        open..open + 1,
                    ));
                }
                Some(_) => {}
            }
        }

        let span = start..self.pos;
        let decoded = match token {
            Token::ByteStr => unescape_bytes(&self.source[span.clone()]).map(drop),
            _ => unescape(&self.source[span.clone()]).map(drop),
        };
        if let Err(message) = decoded {
            return Err(Diagnostic::syntax(message, span));
        }
        self.tokens.push((token, span));
        Ok(())
    }

    fn byte_string(&mut self) -> Result<(), Diagnostic> {
        self.pos += 1;
        let quote = self.peek().unwrap_or('"');
        self.string(quote, Token::ByteStr)
    }

    fn operator(&mut self) -> Result<(), Diagnostic> {
        let start = self.pos;
        let rest = self.rest();
        let Some(&(text, token)) = OPERATORS.iter().find(|(text, _)| rest.starts_with(text))
        else {
            let len = self.peek().map_or(1, char::len_utf8);
            return Err(Diagnostic::syntax(
                format!("unexpected character {:?}", &rest[..len]),
                start..start + len,
            ));
        };

        match token {
            Token::LeftParen | Token::LeftBracket | Token::LeftBrace => self.depth += 1,
            Token::RightParen | Token::RightBracket | Token::RightBrace => {
                self.depth = self.depth.saturating_sub(1)
            }
            _ => {}
        }

        self.pos += text.len();
        self.tokens.push((token, start..self.pos));
        Ok(())
    }
}

/// Decodes a quoted string literal, including its quotes, into its value.
pub fn unescape(literal: &str) -> Result<String, &'static str> {
    let bytes = decode_literal(literal, false)?;
    String::from_utf8(bytes).map_err(|_| "string literal is not valid UTF-8")
}

/// Decodes a `b"..."` literal, prefix included. `\xNN` escapes may produce any byte.
pub fn unescape_bytes(literal: &str) -> Result<Vec<u8>, &'static str> {
    decode_literal(literal.strip_prefix('b').unwrap_or(literal), true)
}

fn decode_literal(literal: &str, raw_bytes: bool) -> Result<Vec<u8>, &'static str> {
    if literal.len() >= 6 && (literal.starts_with("\"\"\"") || literal.starts_with("'''")) {
        return Ok(literal[3..literal.len() - 3].as_bytes().to_vec());
    }
    let inner = &literal[1..literal.len() - 1];
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => b'\n',
            Some('t') => b'\t',
            Some('r') => b'\r',
            Some('0') => 0,
            Some('\\') => b'\\',
            Some('\'') => b'\'',
            Some('"') => b'"',
            Some('x') => {
                let hi = chars.next().and_then(|c| c.to_digit(16));
                let lo = chars.next().and_then(|c| c.to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) if raw_bytes || hi < 8 => (hi * 16 + lo) as u8,
                    _ => return Err("invalid \\x escape (expected two hex digits below 0x80)"),
                }
            }
            _ => return Err("invalid escape sequence in string literal"),
        };
        out.push(escaped);
    }
    Ok(out)
}

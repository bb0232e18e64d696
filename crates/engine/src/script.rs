//! Script tokenizing and statement parsing.
//!
//! A script is a `;`-separated sequence of statements. The splitter is
//! literal-block-aware: a `;` inside a `"…"` string, a `` `…` `` block
//! (multi-line, used for shader source), or a `#` comment never ends a
//! statement. Splitting happens once at load; each statement is parsed on
//! execution so a malformed statement surfaces when stepped onto, not
//! before.
//!
//! Statement grammar:
//!
//! ```text
//! statement := [ target "=" ] entry "(" [ arg { "," arg } ] ")"
//! arg       := number | "string" | `block` | CONSTANT | variable
//! ```
//!
//! The assignment target is captured as raw text. Only a simple identifier
//! binds a variable; anything else (`foo.tex`) is preserved for display but
//! falls back to anonymous naming.

use crate::error::EngineError;

/// One split-off statement with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    /// Trimmed statement text, comments stripped.
    pub text: String,
    /// 1-based line of the statement's first character.
    pub line: usize,
}

/// One parsed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Number(f64),
    Str(String),
    /// Contents of a `` `…` `` literal block.
    Block(String),
    /// An `UPPER_SNAKE` API constant.
    Constant(String),
    /// A variable reference, resolved against the session environment.
    Var(String),
}

/// A parsed call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub entry: String,
    pub args: Vec<Arg>,
}

/// A fully parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub raw: RawStatement,
    /// Raw assignment target text, if the statement had one.
    pub target: Option<String>,
    pub call: Call,
}

/// Split source into statements. Fails only on unterminated strings or
/// literal blocks; everything else is deferred to parse time.
pub fn split_statements(source: &str) -> Result<Vec<RawStatement>, EngineError> {
    #[derive(PartialEq)]
    enum Mode {
        Normal,
        Str,
        StrEscape,
        Block,
        Comment,
    }

    let mut statements = Vec::new();
    let mut buf = String::new();
    let mut mode = Mode::Normal;
    let mut line = 1usize;
    let mut start_line = 1usize;
    let mut opened_line = 1usize;

    let flush = |buf: &mut String, start_line: usize, out: &mut Vec<RawStatement>| {
        let text = buf.trim();
        if !text.is_empty() {
            out.push(RawStatement { text: text.to_string(), line: start_line });
        }
        buf.clear();
    };

    for c in source.chars() {
        if c == '\n' {
            line += 1;
        }
        match mode {
            Mode::Normal => match c {
                ';' => {
                    flush(&mut buf, start_line, &mut statements);
                    start_line = line;
                }
                '#' => mode = Mode::Comment,
                '"' => {
                    opened_line = line;
                    mode = Mode::Str;
                    push_tracking_start(&mut buf, c, line, &mut start_line);
                }
                '`' => {
                    opened_line = line;
                    mode = Mode::Block;
                    push_tracking_start(&mut buf, c, line, &mut start_line);
                }
                _ => push_tracking_start(&mut buf, c, line, &mut start_line),
            },
            Mode::Str => {
                buf.push(c);
                match c {
                    '\\' => mode = Mode::StrEscape,
                    '"' => mode = Mode::Normal,
                    _ => {}
                }
            }
            Mode::StrEscape => {
                buf.push(c);
                mode = Mode::Str;
            }
            Mode::Block => {
                buf.push(c);
                if c == '`' {
                    mode = Mode::Normal;
                }
            }
            Mode::Comment => {
                if c == '\n' {
                    buf.push(c);
                    mode = Mode::Normal;
                }
            }
        }
    }

    match mode {
        Mode::Str | Mode::StrEscape => {
            return Err(EngineError::Script {
                line: opened_line,
                detail: "unterminated string literal".to_string(),
            })
        }
        Mode::Block => {
            return Err(EngineError::Script {
                line: opened_line,
                detail: "unterminated literal block".to_string(),
            })
        }
        _ => {}
    }
    flush(&mut buf, start_line, &mut statements);
    Ok(statements)
}

/// Track the line of the first non-whitespace character of a statement.
fn push_tracking_start(buf: &mut String, c: char, line: usize, start_line: &mut usize) {
    if buf.trim().is_empty() && !c.is_whitespace() {
        *start_line = line;
    }
    buf.push(c);
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_simple_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// True for identifiers written entirely in `UPPER_SNAKE` (API constants).
fn is_constant(s: &str) -> bool {
    is_simple_ident(s) && s.chars().any(|c| c.is_ascii_uppercase()) && !s.chars().any(|c| c.is_ascii_lowercase())
}

/// Parse one raw statement.
pub fn parse_statement(raw: &RawStatement) -> Result<Statement, EngineError> {
    let err = |detail: &str| EngineError::Script { line: raw.line, detail: detail.to_string() };

    let (target, rest) = match find_top_level_eq(&raw.text) {
        Some(pos) => {
            let target = raw.text[..pos].trim();
            if target.is_empty() {
                return Err(err("missing assignment target"));
            }
            (Some(target.to_string()), raw.text[pos + 1..].trim())
        }
        None => (None, raw.text.trim()),
    };

    let open = rest.find('(').ok_or_else(|| err("expected a call"))?;
    let entry = rest[..open].trim();
    if !is_simple_ident(entry) {
        return Err(err(&format!("'{entry}' is not a callable name")));
    }
    if !rest.ends_with(')') {
        return Err(err("expected ')' at end of statement"));
    }
    let arg_text = &rest[open + 1..rest.len() - 1];

    let mut args = Vec::new();
    for piece in split_args(arg_text) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        args.push(parse_arg(piece, raw.line)?);
    }

    Ok(Statement { raw: raw.clone(), target, call: Call { entry: entry.to_string(), args } })
}

/// Position of the first `=` outside strings/blocks and before any `(`.
fn find_top_level_eq(text: &str) -> Option<usize> {
    let mut in_str = false;
    let mut in_block = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' if !in_block => in_str = !in_str,
            '`' if !in_str => in_block = !in_block,
            '(' if !in_str && !in_block => return None,
            '=' if !in_str && !in_block => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split an argument list on top-level commas.
fn split_args(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut in_block = false;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '"' if !in_block => in_str = !in_str,
            '`' if !in_str => in_block = !in_block,
            '(' if !in_str && !in_block => depth += 1,
            ')' if !in_str && !in_block => depth = depth.saturating_sub(1),
            ',' if !in_str && !in_block && depth == 0 => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces
}

fn parse_arg(piece: &str, line: usize) -> Result<Arg, EngineError> {
    let err = |detail: String| EngineError::Script { line, detail };

    if let Some(inner) = piece.strip_prefix('"') {
        let inner = inner.strip_suffix('"').ok_or_else(|| err("unterminated string".into()))?;
        return Ok(Arg::Str(unescape(inner)));
    }
    if let Some(inner) = piece.strip_prefix('`') {
        let inner =
            inner.strip_suffix('`').ok_or_else(|| err("unterminated literal block".into()))?;
        return Ok(Arg::Block(inner.to_string()));
    }
    if piece.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        return piece
            .parse::<f64>()
            .map(Arg::Number)
            .map_err(|_| err(format!("'{piece}' is not a number")));
    }
    if is_constant(piece) {
        return Ok(Arg::Constant(piece.to_string()));
    }
    if is_simple_ident(piece) {
        return Ok(Arg::Var(piece.to_string()));
    }
    Err(err(format!("cannot parse argument '{piece}'")))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

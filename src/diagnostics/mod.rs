//! Error types and the sink that prints them in the bit-exact formats this
//! language's diagnostics are specified to use.
//!
//! Each error type owns its own `Display` via `thiserror` so the format lives
//! next to the data instead of scattered across call sites.

use std::fmt;
use std::io::{self, Write};

/// A lex-level diagnostic: a byte the scanner could not classify as part of
/// any token. The scanner reports this itself and keeps going — it never
/// aborts the token stream.
#[derive(Debug, thiserror::Error)]
#[error("\nillegal character: {rendered} at line {line} column {column}\n")]
pub struct LexError {
    pub rendered: String,
    pub line: usize,
    pub column: usize,
}

/// A syntax error: the parser could not match any production at the current
/// token. `column` is the column of the offending lexeme's first character.
#[derive(Debug, thiserror::Error)]
#[error("\n{message} \"{lexeme}\" at line {line}, column {column}\n")]
pub struct SyntaxError {
    pub message: String,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

/// A semantic error: a structural rule was violated (misplaced break,
/// duplicate parameter name, ...). The AST is still built to completion but
/// the command is not executed.
#[derive(Debug, thiserror::Error)]
#[error("\nsemantic error: {message} at line {line}, column {column}.\n")]
pub struct SemanticError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// A runtime error raised while evaluating a command. `function` is the name
/// of the function active when the error was raised, or `(main)` at the top
/// level — captured at the moment of the error, before any frame unwinding.
#[derive(Debug, Clone, thiserror::Error)]
#[error("\nruntime error in function {function}: {message}.\n")]
pub struct RuntimeError {
    pub function: String,
    pub message: String,
}

impl RuntimeError {
    pub fn new(function: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError {
            function: function.into(),
            message: message.into(),
        }
    }
}

/// Everything that can unwind a `?`-chain out of expression/statement
/// evaluation without being a plain value: a runtime error, or `halt`.
/// `Break`/`Continue`/`Return` are *not* here — the semantic checker
/// guarantees they only ever occur where a structured `Flow` return handles
/// them, so they never need to escape via `Result::Err`.
#[derive(Debug, Clone)]
pub enum Unwind {
    Error(RuntimeError),
    Halt,
}

impl From<RuntimeError> for Unwind {
    fn from(e: RuntimeError) -> Self {
        Unwind::Error(e)
    }
}

impl fmt::Display for Unwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unwind::Error(e) => write!(f, "{e}"),
            Unwind::Halt => write!(f, "halt"),
        }
    }
}

/// Renders an illegal byte the way spec'd diagnostics expect: control
/// characters as `^X`, high bytes as `\ooo`, everything else printed as-is.
pub fn render_illegal_char(c: char) -> String {
    let code = c as u32;
    if code < 0x20 || code == 0x7f {
        let picture = ((code ^ 0x40) as u8) as char;
        format!("^{picture}")
    } else if code < 0x80 {
        c.to_string()
    } else if code <= 0xff {
        format!("\\{code:03o}")
    } else {
        c.to_string()
    }
}

/// Destination for every diagnostic message. Generic over `Write` so tests
/// can capture output into a buffer instead of going through stderr.
pub struct Diagnostics<W: Write> {
    out: W,
}

impl Diagnostics<io::Stderr> {
    pub fn stderr() -> Self {
        Diagnostics { out: io::stderr() }
    }
}

impl<W: Write> Diagnostics<W> {
    pub fn new(out: W) -> Self {
        Diagnostics { out }
    }

    pub fn report(&mut self, err: impl fmt::Display) {
        let _ = write!(self.out, "{err}");
        let _ = self.out.flush();
    }
}

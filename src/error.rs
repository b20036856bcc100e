use core::fmt;

use thiserror::Error;


/// A location in the source text. Both fields are 1-based and the column
/// counts characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JaspError {
    #[error("{}", format_syntax_error(.message, .position))]
    SyntaxError {
        message: String,
        position: Option<Position>,
    },

    #[error("no tokens, nothing to parse")]
    EmptyInputError,

    #[error("undefined symbol: {0}")]
    UnboundSymbolError(String),

    #[error("{0}")]
    TypeError(String),

    #[error("{callee} expects {expected} arguments but {given} given")]
    ArityError {
        callee: String,
        expected: String,
        given: usize,
    },

    #[error("division by zero")]
    ZeroDivisionError,

    #[error("could not write output: {0}")]
    OutputError(String),
}

fn format_syntax_error(message: &str, position: &Option<Position>) -> String {
    match position {
        Some(position) => format!("{}: {}", position, message),
        None => message.to_owned(),
    }
}

impl JaspError {
    pub(crate) fn syntax(message: impl Into<String>, position: Position) -> Self {
        Self::SyntaxError { message: message.into(), position: Some(position) }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub(crate) fn arity(callee: impl Into<String>, expected: impl fmt::Display, given: usize) -> Self {
        Self::ArityError { callee: callee.into(), expected: expected.to_string(), given }
    }

    /// Stable name of the error kind, independent of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SyntaxError { .. } => "SyntaxError",
            Self::EmptyInputError => "EmptyInputError",
            Self::UnboundSymbolError(_) => "UnboundSymbolError",
            Self::TypeError(_) => "TypeError",
            Self::ArityError { .. } => "ArityError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OutputError(_) => "OutputError",
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Self::SyntaxError { position, .. } => *position,
            _ => None,
        }
    }
}

use core::fmt;

use logos::Logos;

use crate::error::{JaspError, Position};


#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(skip r"([ \t\r\n\f]+|;[^\n]*)")]
pub enum Token {
    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token("[")]
    LeftBracket,

    #[token("]")]
    RightBracket,

    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token(":")]
    Colon,

    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    String(String),

    // Operators lex as plain identifiers so they resolve through the environment
    #[regex(r"[A-Za-z_][A-Za-z0-9_\-]*", |lex| lex.slice().to_owned())]
    #[regex(r"[+\-*/=]|[<>]=?", |lex| lex.slice().to_owned())]
    Identifier(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LeftParen => write!(f, "("),
            Self::RightParen => write!(f, ")"),
            Self::LeftBracket => write!(f, "["),
            Self::RightBracket => write!(f, "]"),
            Self::LeftBrace => write!(f, "{{"),
            Self::RightBrace => write!(f, "}}"),
            Self::Colon => write!(f, ":"),
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Number(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{:?}", value),
            Self::Identifier(name) => write!(f, "{}", name),
        }
    }
}

/// A token together with where it starts in the source.
///
/// Two lexemes are equal when their tokens are equal, wherever they appear.
#[derive(Debug, Clone)]
pub struct Lexeme {
    pub token: Token,
    pub position: Position,
}

impl Lexeme {
    pub fn new(token: Token, position: Position) -> Self {
        Self { token, position }
    }
}

impl PartialEq for Lexeme {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl PartialEq<Token> for Lexeme {
    fn eq(&self, other: &Token) -> bool {
        &self.token == other
    }
}

fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some(other) => result.push(other),
            None => {}
        }
    }

    result
}

struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(offset, _)| offset + 1))
            .collect();
        Self { source, line_starts }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let start = self.line_starts[line - 1];
        Position::new(line, self.source[start..offset].chars().count() + 1)
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Lexeme>, JaspError> {
    let index = LineIndex::new(source);
    let mut lexemes = vec![];
    let mut tokenizer = Token::lexer(source);

    while let Some(result) = tokenizer.next() {
        let position = index.position(tokenizer.span().start);
        match result {
            Ok(token) => lexemes.push(Lexeme::new(token, position)),
            Err(_) if tokenizer.slice().starts_with('"') => {
                return Err(JaspError::syntax("missing closing double quotes", position))
            }
            Err(_) => {
                return Err(JaspError::syntax(format!("unexpected character {:?}", tokenizer.slice()), position))
            }
        }
    }

    tracing::trace!(count = lexemes.len(), "tokenized source");
    Ok(lexemes)
}

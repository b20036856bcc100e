use std::rc::Rc;

use crate::{error::{JaspError, Position}, lexer::{tokenize, Lexeme, Token}};


const KEYWORDS: [&str; 5] = ["let", "if", "while", "each", "fn"];

/// Deepest bracket nesting accepted, the parser recurses once per level.
const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
}

/// The names an `each` loop binds on every iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Binder {
    /// One name, bound to each element of a vector (or each key of a map).
    Element(String),
    /// Two names, bound to the key and the value of each map entry.
    Entry(String, String),
}

// Expressions are the basic building blocks of jasp
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Atom(Literal),
    Ref(String),
    Vector(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Let {
        name: String,
        value: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    While {
        condition: Box<Expr>,
        body: Box<Expr>,
    },
    Each {
        collection: Box<Expr>,
        binder: Binder,
        body: Box<Expr>,
    },
    FnDef {
        name: String,
        parameters: Vec<String>,
        body: Rc<Expr>,
    },
    FnCall {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },
}

/// A parsed expression and the position it was parsed from. The position
/// is only used for diagnostics and is ignored when comparing expressions.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub position: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, position: Position) -> Self {
        Self { kind, position }
    }

    /// Whether the expression is of a kind that could produce a boolean
    fn can_produce_boolean(&self) -> bool {
        matches!(self.kind, ExprKind::Atom(_) | ExprKind::FnCall { .. } | ExprKind::Let { .. } | ExprKind::Ref(_))
    }

    /// Whether the expression is of a kind that could produce a collection
    fn can_produce_collection(&self) -> bool {
        matches!(self.kind, ExprKind::Vector(_) | ExprKind::Map(_) | ExprKind::Ref(_) | ExprKind::FnCall { .. })
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

type ParseResult<'a, O> = Result<(&'a [Lexeme], O), JaspError>;

#[derive(Debug, Clone, Copy)]
enum Terminator {
    Paren,
    Bracket,
    Brace,
}

impl Terminator {
    fn token(self) -> Token {
        match self {
            Self::Paren => Token::RightParen,
            Self::Bracket => Token::RightBracket,
            Self::Brace => Token::RightBrace,
        }
    }

    fn missing(self) -> &'static str {
        match self {
            Self::Paren => "missing closing parenthesis",
            Self::Bracket => "missing closing bracket",
            Self::Brace => "missing closing brace",
        }
    }
}

fn missing_terminator(terminator: Terminator, open: &Lexeme) -> JaspError {
    JaspError::syntax(terminator.missing(), open.position)
}

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

fn at_end(tokens: &[Lexeme], terminator: Terminator) -> bool {
    tokens.first().map_or(true, |lexeme| lexeme.token == terminator.token())
}

fn expect_terminator<'a>(tokens: &'a [Lexeme], terminator: Terminator, open: &Lexeme) -> Result<&'a [Lexeme], JaspError> {
    match tokens.split_first() {
        Some((lexeme, rest)) if lexeme.token == terminator.token() => Ok(rest),
        Some((lexeme, _)) => Err(JaspError::syntax(
            format!("{}, found '{}'", terminator.missing(), lexeme.token),
            lexeme.position,
        )),
        None => Err(missing_terminator(terminator, open)),
    }
}

/// Parses one required sub-expression of a keyword form. Reaching the end of
/// input reports the open parenthesis, reaching the end of the form reports
/// `message` at the keyword.
fn parse_operand<'a>(tokens: &'a [Lexeme], open: &Lexeme, keyword: &Lexeme, message: &str) -> ParseResult<'a, Expr> {
    match tokens.first() {
        None => Err(missing_terminator(Terminator::Paren, open)),
        Some(lexeme) if lexeme.token == Token::RightParen => Err(JaspError::syntax(message, keyword.position)),
        Some(_) => parse_expr(tokens),
    }
}

/// Parses one identifier that is not a keyword.
fn parse_name<'a>(tokens: &'a [Lexeme], open: &Lexeme, keyword: &Lexeme, incomplete: &str, invalid: &str) -> ParseResult<'a, String> {
    match tokens.split_first() {
        None => Err(missing_terminator(Terminator::Paren, open)),
        Some((lexeme, _)) if lexeme.token == Token::RightParen => Err(JaspError::syntax(incomplete, keyword.position)),
        Some((Lexeme { token: Token::Identifier(name), .. }, rest)) if !is_keyword(name) => Ok((rest, name.clone())),
        Some((lexeme, _)) => Err(JaspError::syntax(invalid, lexeme.position)),
    }
}

fn parse_let<'a>(open: &Lexeme, keyword: &Lexeme, tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    let (tokens, name) = parse_name(
        tokens, open, keyword,
        "incomplete let expression",
        "variable name must be a valid identifier",
    )?;
    let (tokens, value) = parse_operand(tokens, open, keyword, "let expression must have a value")?;
    let tokens = expect_terminator(tokens, Terminator::Paren, open)?;

    Ok((tokens, Expr::new(ExprKind::Let { name, value: Box::new(value) }, keyword.position)))
}

fn parse_if<'a>(open: &Lexeme, keyword: &Lexeme, tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    let (tokens, condition) = parse_operand(
        tokens, open, keyword,
        "if expression must have a condition and at least a true branch",
    )?;
    if !condition.can_produce_boolean() {
        return Err(JaspError::syntax("if expression condition must evaluate to a boolean value", condition.position));
    }
    let (tokens, then) = parse_operand(tokens, open, keyword, "if expression must have a true branch")?;

    // The false branch is optional, so it is only parsed if the form continues
    let (tokens, otherwise) = if at_end(tokens, Terminator::Paren) {
        (tokens, None)
    } else {
        let (tokens, otherwise) = parse_expr(tokens)?;
        (tokens, Some(Box::new(otherwise)))
    };
    let tokens = expect_terminator(tokens, Terminator::Paren, open)?;

    Ok((tokens, Expr::new(ExprKind::If {
        condition: Box::new(condition),
        then: Box::new(then),
        otherwise,
    }, keyword.position)))
}

fn parse_while<'a>(open: &Lexeme, keyword: &Lexeme, tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    let (tokens, condition) = parse_operand(
        tokens, open, keyword,
        "while expression must have a condition and a body",
    )?;
    if !condition.can_produce_boolean() {
        return Err(JaspError::syntax("while expression condition must evaluate to a boolean value", condition.position));
    }
    let (tokens, body) = parse_operand(tokens, open, keyword, "while expression must have a body")?;
    let tokens = expect_terminator(tokens, Terminator::Paren, open)?;

    Ok((tokens, Expr::new(ExprKind::While {
        condition: Box::new(condition),
        body: Box::new(body),
    }, keyword.position)))
}

fn is_binder_candidate(lexeme: Option<&Lexeme>) -> bool {
    matches!(lexeme, Some(Lexeme { token: Token::Identifier(name), .. }) if !is_keyword(name))
}

fn parse_binder_name<'a>(tokens: &'a [Lexeme], open: &Lexeme, keyword: &Lexeme) -> ParseResult<'a, String> {
    parse_name(
        tokens, open, keyword,
        "each expression must name the current element",
        "each expression binder must be a valid identifier",
    )
}

fn parse_each<'a>(open: &Lexeme, keyword: &Lexeme, tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    // The iteration header is `(collection binder)` or `(collection binder binder)`,
    // the binders may also follow a header holding only the collection
    let (header_open, tokens) = match tokens.split_first() {
        None => return Err(missing_terminator(Terminator::Paren, open)),
        Some((lexeme, rest)) if lexeme.token == Token::LeftParen => (lexeme, rest),
        Some((lexeme, _)) if lexeme.token == Token::RightParen => return Err(JaspError::syntax(
            "each expression must have a collection header and a body",
            keyword.position,
        )),
        Some((lexeme, _)) => return Err(JaspError::syntax("each expression must have an iteration header", lexeme.position)),
    };

    if tokens.is_empty() {
        return Err(missing_terminator(Terminator::Paren, header_open));
    }
    if at_end(tokens, Terminator::Paren) {
        return Err(JaspError::syntax("each expression must have a non empty iteration header", header_open.position));
    }
    let (tokens, collection) = parse_expr(tokens)?;
    if !collection.can_produce_collection() {
        return Err(JaspError::syntax(
            "first element of an each expression iteration header must be a collection",
            collection.position,
        ));
    }

    let (tokens, binder) = match tokens.split_first() {
        None => return Err(missing_terminator(Terminator::Paren, header_open)),
        Some((lexeme, rest)) if lexeme.token == Token::RightParen => {
            let (rest, element) = parse_binder_name(rest, open, keyword)?;
            // A second name is only a binder if something other than the end of
            // the form follows it, otherwise it is the body
            if is_binder_candidate(rest.first()) && !at_end(&rest[1..], Terminator::Paren) {
                let (rest, value) = parse_binder_name(rest, open, keyword)?;
                (rest, Binder::Entry(element, value))
            } else {
                (rest, Binder::Element(element))
            }
        }
        Some(_) => {
            let (rest, element) = parse_binder_name(tokens, header_open, keyword)?;
            let (rest, binder) = if is_binder_candidate(rest.first()) {
                let (rest, value) = parse_binder_name(rest, header_open, keyword)?;
                (rest, Binder::Entry(element, value))
            } else {
                (rest, Binder::Element(element))
            };
            (expect_terminator(rest, Terminator::Paren, header_open)?, binder)
        }
    };

    let (tokens, body) = parse_operand(tokens, open, keyword, "each expression must have a body")?;
    let tokens = expect_terminator(tokens, Terminator::Paren, open)?;

    Ok((tokens, Expr::new(ExprKind::Each {
        collection: Box::new(collection),
        binder,
        body: Box::new(body),
    }, keyword.position)))
}

fn parse_parameters<'a>(mut tokens: &'a [Lexeme], parameters_open: &Lexeme) -> ParseResult<'a, Vec<String>> {
    let mut parameters = vec![];

    loop {
        match tokens.split_first() {
            None => return Err(missing_terminator(Terminator::Paren, parameters_open)),
            Some((lexeme, rest)) if lexeme.token == Token::RightParen => return Ok((rest, parameters)),
            Some((Lexeme { token: Token::Identifier(name), .. }, rest)) if !is_keyword(name) => {
                parameters.push(name.clone());
                tokens = rest;
            }
            Some((lexeme, _)) => return Err(JaspError::syntax(
                "function parameter must be a valid identifier",
                lexeme.position,
            )),
        }
    }
}

fn parse_fn<'a>(open: &Lexeme, keyword: &Lexeme, tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    let (tokens, name) = parse_name(
        tokens, open, keyword,
        "incomplete function definition",
        "function name must be an identifier",
    )?;

    let (parameters_open, tokens) = match tokens.split_first() {
        None => return Err(missing_terminator(Terminator::Paren, open)),
        Some((lexeme, rest)) if lexeme.token == Token::LeftParen => (lexeme, rest),
        Some((lexeme, _)) if lexeme.token == Token::RightParen => return Err(JaspError::syntax(
            "function definition must have a parameter list",
            keyword.position,
        )),
        Some((lexeme, _)) => return Err(JaspError::syntax("missing function parameter list", lexeme.position)),
    };
    let (tokens, parameters) = parse_parameters(tokens, parameters_open)?;

    let (tokens, body) = parse_operand(tokens, open, keyword, "function must have a function body")?;
    let tokens = expect_terminator(tokens, Terminator::Paren, open)?;

    Ok((tokens, Expr::new(ExprKind::FnDef { name, parameters, body: Rc::new(body) }, keyword.position)))
}

fn parse_call<'a>(open: &Lexeme, tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    if tokens.first().is_some_and(|lexeme| lexeme.token == Token::RightParen) {
        return Err(JaspError::syntax("function call must have a function expression", open.position));
    }
    let (mut tokens, callee) = parse_expr(tokens)?;

    let mut arguments = vec![];
    while !at_end(tokens, Terminator::Paren) {
        let (rest, argument) = parse_expr(tokens)?;
        arguments.push(argument);
        tokens = rest;
    }
    let tokens = expect_terminator(tokens, Terminator::Paren, open)?;

    Ok((tokens, Expr::new(ExprKind::FnCall { callee: Box::new(callee), arguments }, open.position)))
}

fn parse_form<'a>(open: &Lexeme, tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    let Some(head) = tokens.first() else {
        return Err(missing_terminator(Terminator::Paren, open));
    };

    match &head.token {
        Token::Identifier(keyword) => match keyword.as_str() {
            "let" => parse_let(open, head, &tokens[1..]),
            "if" => parse_if(open, head, &tokens[1..]),
            "while" => parse_while(open, head, &tokens[1..]),
            "each" => parse_each(open, head, &tokens[1..]),
            "fn" => parse_fn(open, head, &tokens[1..]),
            _ => parse_call(open, tokens),
        },
        _ => parse_call(open, tokens),
    }
}

fn parse_vector<'a>(open: &Lexeme, mut tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    let mut items = vec![];
    while !at_end(tokens, Terminator::Bracket) {
        let (rest, item) = parse_expr(tokens)?;
        items.push(item);
        tokens = rest;
    }
    let tokens = expect_terminator(tokens, Terminator::Bracket, open)?;

    Ok((tokens, Expr::new(ExprKind::Vector(items), open.position)))
}

fn parse_map<'a>(open: &Lexeme, mut tokens: &'a [Lexeme]) -> ParseResult<'a, Expr> {
    let mut entries = vec![];
    while !at_end(tokens, Terminator::Brace) {
        let (rest, key) = parse_expr(tokens)?;

        tokens = match rest.split_first() {
            None => return Err(missing_terminator(Terminator::Brace, open)),
            Some((lexeme, rest)) if lexeme.token == Token::Colon => rest,
            Some((lexeme, _)) if lexeme.token == Token::RightBrace => return Err(JaspError::syntax(
                "map key must have a colon and a value",
                key.position,
            )),
            Some((lexeme, _)) => return Err(JaspError::syntax("no colon between key and value in map", lexeme.position)),
        };

        if tokens.is_empty() {
            return Err(missing_terminator(Terminator::Brace, open));
        }
        if at_end(tokens, Terminator::Brace) {
            return Err(JaspError::syntax("map key must have a value", key.position));
        }
        let (rest, value) = parse_expr(tokens)?;
        entries.push((key, value));
        tokens = rest;
    }
    let tokens = expect_terminator(tokens, Terminator::Brace, open)?;

    Ok((tokens, Expr::new(ExprKind::Map(entries), open.position)))
}

fn parse_expr(tokens: &[Lexeme]) -> ParseResult<'_, Expr> {
    let Some((lexeme, rest)) = tokens.split_first() else {
        return Err(JaspError::SyntaxError { message: "unexpected end of input".to_owned(), position: None });
    };
    let position = lexeme.position;

    match &lexeme.token {
        Token::LeftParen => parse_form(lexeme, rest),
        Token::LeftBracket => parse_vector(lexeme, rest),
        Token::LeftBrace => parse_map(lexeme, rest),
        token @ (Token::RightParen | Token::RightBracket | Token::RightBrace | Token::Colon) => {
            Err(JaspError::syntax(format!("unexpected '{}'", token), position))
        }
        Token::Number(number) => Ok((rest, Expr::new(ExprKind::Atom(Literal::Number(*number)), position))),
        Token::String(string) => Ok((rest, Expr::new(ExprKind::Atom(Literal::String(string.clone())), position))),
        Token::Boolean(boolean) => Ok((rest, Expr::new(ExprKind::Atom(Literal::Boolean(*boolean)), position))),
        Token::Identifier(name) => Ok((rest, Expr::new(ExprKind::Ref(name.clone()), position))),
    }
}

fn check_nesting(lexemes: &[Lexeme]) -> Result<(), JaspError> {
    let mut depth = 0usize;
    for lexeme in lexemes {
        match lexeme.token {
            Token::LeftParen | Token::LeftBracket | Token::LeftBrace => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(JaspError::syntax(
                        format!("expressions nested deeper than {} levels", MAX_NESTING),
                        lexeme.position,
                    ));
                }
            }
            Token::RightParen | Token::RightBracket | Token::RightBrace => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

/// Parses a complete lexeme stream into its top-level expressions.
#[tracing::instrument(level = "debug", skip_all, fields(count = lexemes.len()))]
pub fn parse(lexemes: &[Lexeme]) -> Result<Vec<Expr>, JaspError> {
    if lexemes.is_empty() { return Err(JaspError::EmptyInputError); }
    check_nesting(lexemes)?;

    let mut tokens = lexemes;
    let mut program = vec![];
    while !tokens.is_empty() {
        let (rest, expr) = parse_expr(tokens)?;
        tracing::debug!(line = expr.position.line, column = expr.position.column, "parsed top-level form");
        program.push(expr);
        tokens = rest;
    }

    Ok(program)
}

pub fn parse_str(source: &str) -> Result<Vec<Expr>, JaspError> {
    parse(&tokenize(source)?)
}

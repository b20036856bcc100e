use std::{io, rc::Rc};

use crate::{
    builtin::builtin_frame,
    environment::Environment,
    error::JaspError,
    interpreter::{evaluate, EvaluationResult, Value},
    parser::{parse_str, Expr},
};


/// Where the `print` builtin writes to.
pub enum Output {
    Stdout(io::Stdout),
    Captured(Vec<u8>),
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(stdout) => io::Write::write(stdout, buf),
            Self::Captured(buffer) => io::Write::write(buffer, buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(stdout) => io::Write::flush(stdout),
            Self::Captured(_) => Ok(()),
        }
    }
}

/// An evaluation context that takes expressions and evaluates them to give
/// values.
///
/// Every context owns its own global frame, seeded with the builtins, and all
/// top-level expressions evaluated through it share that frame. Definitions
/// made by one call are therefore visible to the next.
pub struct EvaluationContext {
    environment: Rc<Environment>,
    output: Output,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::with_output(Output::Stdout(io::stdout()))
    }

    /// A context whose printed output is kept in memory, see [`Self::take_output`].
    pub fn capturing() -> Self {
        Self::with_output(Output::Captured(Vec::new()))
    }

    pub fn with_output(output: Output) -> Self {
        Self {
            environment: builtin_frame(),
            output,
        }
    }

    pub fn global(&self) -> &Rc<Environment> {
        &self.environment
    }

    pub fn evaluate_expr(&mut self, expr: &Expr) -> EvaluationResult {
        evaluate(expr, &self.environment, &mut self.output)
    }

    /// Evaluates every top-level expression in order, stopping at the first
    /// failure.
    #[tracing::instrument(level = "debug", skip_all, fields(count = program.len()))]
    pub fn interpret(&mut self, program: &[Expr]) -> Result<(), JaspError> {
        for expr in program {
            self.evaluate_expr(expr)?;
        }
        Ok(())
    }

    /// Parses and evaluates `source`, returning the value of its last
    /// top-level expression.
    pub fn evaluate_str(&mut self, source: &str) -> EvaluationResult {
        let program = parse_str(source)?;

        let mut last = Value::Nil;
        for expr in &program {
            last = self.evaluate_expr(expr)?;
        }
        Ok(last)
    }

    /// Evaluates one line typed at a prompt. Lines without any tokens and
    /// `nil` results give `None`, nothing should be echoed for them.
    pub fn evaluate_line(&mut self, line: &str) -> Result<Option<Value>, JaspError> {
        match self.evaluate_str(line) {
            Ok(value) if value.is_nil() => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(JaspError::EmptyInputError) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Drains everything printed so far. Always empty for a context writing
    /// to stdout.
    pub fn take_output(&mut self) -> String {
        match &mut self.output {
            Output::Stdout(_) => String::new(),
            Output::Captured(buffer) => String::from_utf8_lossy(&std::mem::take(buffer)).into_owned(),
        }
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates a whole program against a fresh global frame, printing to stdout.
pub fn interpret(program: &[Expr]) -> Result<(), JaspError> {
    EvaluationContext::new().interpret(program)
}

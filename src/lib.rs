mod builtin;
mod context;
mod environment;
mod error;
mod interpreter;
mod lexer;
mod parser;

#[cfg(test)]
mod test_utils;

use std::sync::Once;

pub use error::{JaspError, Position};
pub use context::{interpret, EvaluationContext, Output};
pub use environment::Environment;
pub use interpreter::{evaluate, EvaluationResult, Function, Map, Value};
pub use lexer::{tokenize, Lexeme, Token};
pub use parser::{parse, parse_str, Binder, Expr, ExprKind, Literal};

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber filtered by `RUST_LOG`, e.g.
/// `RUST_LOG=jasp=debug` or `RUST_LOG=jasp=trace`. Does nothing when the
/// variable is unset. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

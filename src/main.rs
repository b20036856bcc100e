use std::{io::{self, BufRead, Write}, process::ExitCode};

use anyhow::Context;
use jasp::{init_tracing, parse, tokenize, EvaluationContext};

fn run_file(path: &str) -> anyhow::Result<ExitCode> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path))?;

    let program = match tokenize(&source).and_then(|lexemes| parse(&lexemes)) {
        Ok(program) => program,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            return Ok(ExitCode::from(2));
        }
    };

    let mut context = EvaluationContext::new();
    if let Err(err) = context.interpret(&program) {
        eprintln!("ERROR: {}", err);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn prompt(stdout: &mut io::Stdout) -> io::Result<()> {
    stdout.write_all(b"jasp> ")?;
    stdout.flush()
}

fn run_repl() -> anyhow::Result<ExitCode> {
    let mut context = EvaluationContext::new();
    let mut stdout = io::stdout();
    let mut lines = io::stdin().lock().lines();

    prompt(&mut stdout)?;
    while let Some(line) = lines.next().transpose()? {
        match line.trim() {
            "q" | "quit" => break,
            source => match context.evaluate_line(source) {
                Ok(Some(value)) => println!("{}", value),
                Ok(None) => {}
                Err(err) => println!("ERROR: {}", err),
            },
        }
        prompt(&mut stdout)?;
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    match std::env::args().nth(1) {
        Some(path) => run_file(&path),
        None => run_repl(),
    }
}

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use jasp::EvaluationContext;

async fn query(stdout: &mut io::Stdout, lines: &mut io::Lines<io::BufReader<io::Stdin>>) -> io::Result<Option<String>> {
    stdout.write_all("> ".as_bytes()).await?;
    stdout.flush().await?;
    lines.next_line().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jasp::init_tracing();

    let mut context = EvaluationContext::new();
    let mut lines = io::BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    // Every line is owned by the parsed program, nothing borrows the input
    while let Some(line) = query(&mut stdout, &mut lines).await? {
        if matches!(line.trim(), "q" | "quit") { break; }

        match context.evaluate_line(&line) {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => {}
            Err(err) => println!("ERROR: {}", err),
        }
    }

    Ok(())
}

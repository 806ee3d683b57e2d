use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as ReplResult};

use expression::ExpressionParser;

fn main() -> ReplResult<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let parser = ExpressionParser::default();
    if args.is_empty() {
        run_repl(&parser)
    } else {
        evaluate_once(&parser, &args.join(" "));
        Ok(())
    }
}

fn evaluate_once(parser: &ExpressionParser, line: &str) {
    match parser.parse(line) {
        Ok(value) => println!("{value}"),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}

fn run_repl(parser: &ExpressionParser) -> ReplResult<()> {
    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());
                if line.trim() == "quit" {
                    std::process::exit(1);
                }
                match parser.parse(&line) {
                    Ok(value) => println!("{value}"),
                    Err(error) => println!("{error}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
    Ok(())
}

//! Interactive query loop
//!
//! Lines look like `word1 r_relation word2`; both terms may contain spaces.

use std::time::Instant;

use anyhow::anyhow;
use relinfer_core::domain::{RelationType, Term};
use relinfer_core::session::{InferOptions, InferenceSession};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::render::{Query, Renderer};

const HELP: &str = "\
Ask why two terms are related:
  <term> <r_relation> <term>     e.g. pizza r_has_part mozzarella
Commands:
  help    show this message
  stats   show fetch cache statistics
  exit    leave (also Ctrl-D)";

/// What one input line asks for
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Query(Query),
    Help,
    Stats,
    Exit,
    Empty,
}

/// Parse one REPL line
///
/// The relation is the first inner token starting with `r_`; everything
/// before it is the source and everything after it the target.
pub fn parse_line(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    match line {
        "" => return Ok(ReplCommand::Empty),
        "help" | "?" => return Ok(ReplCommand::Help),
        "stats" => return Ok(ReplCommand::Stats),
        "exit" | "quit" => return Ok(ReplCommand::Exit),
        _ => {}
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let position = tokens
        .iter()
        .enumerate()
        .skip(1)
        .take(tokens.len().saturating_sub(2))
        .find(|(_, token)| token.starts_with("r_"))
        .map(|(i, _)| i)
        .ok_or_else(|| "expected: <term> <r_relation> <term>".to_string())?;

    Ok(ReplCommand::Query(Query {
        source: Term::new(tokens[..position].join(" ")),
        relation: RelationType::new(tokens[position]),
        target: Term::new(tokens[position + 1..].join(" ")),
    }))
}

pub async fn run(
    session: &InferenceSession,
    renderer: &dyn Renderer,
    options: &InferOptions,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;

    if !quiet {
        println!("relinfer interactive mode. Type 'help' for usage, 'exit' to quit.");
    }

    loop {
        let line = match rl.readline("relinfer> ") {
            Ok(line) => line,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };
        if !line.trim().is_empty() {
            let _ = rl.add_history_entry(line.as_str());
        }

        match parse_line(&line) {
            Ok(ReplCommand::Empty) => {}
            Ok(ReplCommand::Help) => println!("{}", HELP),
            Ok(ReplCommand::Stats) => println!("{}", session.cache().stats()),
            Ok(ReplCommand::Exit) => break,
            Ok(ReplCommand::Query(query)) => {
                let started = Instant::now();
                let outcome = session
                    .infer(&query.source, &query.relation, &query.target, options)
                    .await;
                match outcome {
                    Ok(results) => {
                        for message in renderer.render(&query, &results) {
                            println!("{}", message);
                        }
                    }
                    Err(e) => eprintln!("{}", renderer.render_error(&e)),
                }
                if !quiet {
                    println!("Query time: {:.2}s", started.elapsed().as_secs_f64());
                }
            }
            Err(usage) => eprintln!("{}", usage),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(s: &str, r: &str, t: &str) -> ReplCommand {
        ReplCommand::Query(Query {
            source: Term::new(s),
            relation: RelationType::new(r),
            target: Term::new(t),
        })
    }

    #[test]
    fn test_parse_simple_query() {
        assert_eq!(
            parse_line("pizza r_has_part mozzarella"),
            Ok(query("pizza", "r_has_part", "mozzarella"))
        );
    }

    #[test]
    fn test_parse_multi_word_terms() {
        assert_eq!(
            parse_line("  pomme de terre r_isa   légume racine "),
            Ok(query("pomme de terre", "r_isa", "légume racine"))
        );
    }

    #[test]
    fn test_first_inner_relation_token_wins() {
        assert_eq!(
            parse_line("r_x r_isa r_y"),
            Ok(query("r_x", "r_isa", "r_y"))
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("help"), Ok(ReplCommand::Help));
        assert_eq!(parse_line("stats"), Ok(ReplCommand::Stats));
        assert_eq!(parse_line("exit"), Ok(ReplCommand::Exit));
        assert_eq!(parse_line("   "), Ok(ReplCommand::Empty));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_line("pizza mozzarella").is_err());
        assert!(parse_line("pizza r_has_part").is_err());
        assert!(parse_line("r_isa pizza").is_err());
    }
}

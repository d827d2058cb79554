//! Review command - edit a transaction table from the terminal.
//!
//! Rows are numbered from 1 here; the store indexes from 0.

use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::Args;
use console::{style, Term};
use tracing::info;

use stmtx_core::{
    parse_amount, BalanceKind, Field, FieldEdit, StatementResult, StoreError, TransactionDraft,
};

use super::process::format_text;
use super::{load_config, open_session, CliSession, Spinner};

/// Arguments for the review command.
#[derive(Args)]
pub struct ReviewArgs {
    /// Start from a saved JSON result instead of processing the last text
    #[arg(short, long)]
    result: Option<PathBuf>,
}

const HELP: &str = "\
Commands:
  show                          print the table and balance check
  set <row> <field> <value>     change a cell (fields: code, date, description, debit, credit, fee, vat)
  add [field=value ...]         append a row
  opening <amount|none>         set the opening balance
  ending <amount|none>          set the statement ending balance
  undo                          revert the last change
  ask <instruction>             let the assistant edit the table
  save <file>                   write the table as JSON
  quit                          leave";

/// What the loop should do after a command.
enum Flow {
    Continue,
    Quit,
}

pub async fn run(args: ReviewArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let mut session = open_session(&config)?;

    if let Some(path) = &args.result {
        let content = fs::read_to_string(path)?;
        let result: StatementResult = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid result file {}: {}", path.display(), e))?;
        info!("Loaded {} transactions from {}", result.transactions.len(), path.display());
        session.store_mut().load(result);
    } else {
        if session.raw_text().trim().is_empty() {
            anyhow::bail!("No statement to review. Run 'stmtx extract' first or pass --result.");
        }
        let spinner = Spinner::follow(session.subscribe());
        let outcome = session.submit().await;
        spinner.finish();
        outcome?;
    }

    show(&session);

    let interactive = Term::stdout().is_term();
    if interactive {
        println!("Type 'help' for commands.");
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        match execute(&mut session, line.trim()).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("{} {}", style("✗").red(), e),
        }
    }

    Ok(())
}

async fn execute(session: &mut CliSession, line: &str) -> anyhow::Result<Flow> {
    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "" => {}
        "help" | "?" => println!("{}", HELP),
        "show" => show(session),
        "quit" | "exit" | "q" => return Ok(Flow::Quit),
        "set" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let (Some(row), Some(field), value) = (parts.next(), parts.next(), parts.next()) else {
                anyhow::bail!("Usage: set <row> <field> <value>");
            };
            let index = row_index(row)?;
            let edit = FieldEdit::parse(field, value.unwrap_or("").trim()).map_err(anyhow::Error::msg)?;
            session.store_mut().edit_field(index, edit).map_err(display_row)?;
            changed(session, &format!("Row {} updated", index + 1));
        }
        "add" => {
            let mut draft = TransactionDraft::default();
            for pair in rest.split_whitespace() {
                let Some((field, value)) = pair.split_once('=') else {
                    anyhow::bail!("Expected field=value, got '{}'", pair);
                };
                let field: Field = field.parse().map_err(anyhow::Error::msg)?;
                draft.set(field, value).map_err(anyhow::Error::msg)?;
            }
            let index = session.store_mut().add_transaction(draft)?;
            changed(session, &format!("Row {} added", index + 1));
        }
        "opening" | "ending" => {
            let kind: BalanceKind = command.parse().map_err(anyhow::Error::msg)?;
            let value = match rest {
                "" | "none" | "-" => None,
                amount => Some(
                    parse_amount(amount).ok_or_else(|| anyhow::anyhow!("Not an amount: {}", amount))?,
                ),
            };
            session.store_mut().set_balance(kind, value)?;
            changed(session, &format!("{} balance updated", capitalize(command)));
        }
        "undo" => {
            if session.store_mut().undo() {
                changed(session, "Undone");
            } else {
                println!("Nothing to undo");
            }
        }
        "ask" => {
            if rest.is_empty() {
                anyhow::bail!("Usage: ask <instruction>");
            }
            let spinner = Spinner::follow(session.subscribe());
            let outcome = session.assist(rest).await;
            spinner.finish();
            let applied = outcome?;
            changed(session, &format!("Assistant applied {} edit(s)", applied));
        }
        "save" => {
            if rest.is_empty() {
                anyhow::bail!("Usage: save <file>");
            }
            let result = session
                .result()
                .ok_or_else(|| anyhow::anyhow!("No statement loaded"))?;
            fs::write(rest, serde_json::to_string_pretty(result)?)?;
            println!("{} Saved to {}", style("✓").green(), rest);
        }
        other => anyhow::bail!("Unknown command '{}'. Type 'help' for commands.", other),
    }

    Ok(Flow::Continue)
}

fn row_index(row: &str) -> anyhow::Result<usize> {
    match row.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => anyhow::bail!("Row must be a number starting at 1, got '{}'", row),
    }
}

/// Report row errors with the 1-based numbers the user typed.
fn display_row(e: StoreError) -> anyhow::Error {
    match e {
        StoreError::IndexOutOfRange { index, len } => {
            anyhow::anyhow!("Row {} does not exist (table has {} rows)", index + 1, len)
        }
        other => other.into(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn show(session: &CliSession) {
    let (Some(result), Some(summary)) = (session.result(), session.store().reconciliation()) else {
        println!("No statement loaded");
        return;
    };
    println!("{}", format_text(result, &summary));
    if let Some(warning) = &summary.mismatch {
        println!("{} {}", style("⚠").yellow(), warning);
    }
}

/// Confirm a change and repeat the balance check.
fn changed(session: &CliSession, message: &str) {
    println!("{} {}", style("✓").green(), message);
    if let Some(warning) = session.mismatch() {
        println!("{} {}", style("⚠").yellow(), warning);
    }
}

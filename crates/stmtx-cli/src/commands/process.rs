//! Process command - convert statements into a transaction table.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use stmtx_core::{format_amount, Reconciliation, StatementResult};

use super::{load_config, open_session, read_sources, Spinner};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input files or glob patterns (default: the last extracted text)
    inputs: Vec<String>,

    /// Use the statement text in this file instead of extracting files
    #[arg(long, conflicts_with = "inputs")]
    text: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (reloadable with `review --result`)
    Json,
    /// CSV transaction rows
    Csv,
    /// Plain text table with balance summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let mut session = open_session(&config)?;

    if !args.inputs.is_empty() {
        let files = read_sources(&args.inputs)?;
        let spinner = Spinner::follow(session.subscribe());
        let outcome = session.select_files(files).await;
        spinner.finish();
        outcome?;
    } else if let Some(path) = &args.text {
        info!("Reading statement text from {}", path.display());
        session.set_raw_text(fs::read_to_string(path)?);
    } else {
        info!("Using saved text from '{}'", session.file_label());
    }

    let spinner = Spinner::follow(session.subscribe());
    let outcome = session.submit().await;
    spinner.finish();
    outcome?;

    let (Some(result), Some(summary)) = (session.result(), session.store().reconciliation()) else {
        anyhow::bail!("No statement was produced");
    };

    let output = format_result(result, &summary, args.format)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Some(warning) = &summary.mismatch {
        eprintln!("{} {}", style("⚠").yellow(), warning);
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

pub fn format_result(
    result: &StatementResult,
    summary: &Reconciliation,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result, summary)),
    }
}

fn format_csv(result: &StatementResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "transaction_code",
        "date",
        "description",
        "debit",
        "credit",
        "fee",
        "vat",
    ])?;

    for tx in &result.transactions {
        wtr.write_record([
            tx.transaction_code.clone(),
            tx.date.clone(),
            tx.description.clone(),
            tx.debit.to_string(),
            tx.credit.to_string(),
            tx.fee.map(|f| f.to_string()).unwrap_or_default(),
            tx.vat.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

/// Table of rows (numbered from 1) followed by the balance summary.
pub fn format_text(result: &StatementResult, summary: &Reconciliation) -> String {
    let mut output = String::new();
    let info = &result.account_info;

    for (label, value) in [
        ("Bank", &info.bank_name),
        ("Account", &info.account_number),
        ("Holder", &info.account_holder),
        ("Period", &info.period),
        ("Currency", &info.currency),
    ] {
        if let Some(value) = value {
            output.push_str(&format!("{:<10}{}\n", format!("{}:", label), value));
        }
    }
    if !info.is_empty() {
        output.push('\n');
    }

    output.push_str(&format!(
        "{:>3}  {:<12} {:<12} {:<30} {:>14} {:>14} {:>10} {:>10}\n",
        "#", "Date", "Code", "Description", "Debit", "Credit", "Fee", "VAT"
    ));
    for (i, tx) in result.transactions.iter().enumerate() {
        output.push_str(&format!(
            "{:>3}  {:<12} {:<12} {:<30} {:>14} {:>14} {:>10} {:>10}\n",
            i + 1,
            clip(&tx.date, 12),
            clip(&tx.transaction_code, 12),
            clip(&tx.description, 30),
            format_amount(tx.debit),
            format_amount(tx.credit),
            tx.fee.map(format_amount).unwrap_or_else(|| "-".to_string()),
            tx.vat.map(format_amount).unwrap_or_else(|| "-".to_string()),
        ));
    }
    if result.transactions.is_empty() {
        output.push_str("     (no transactions)\n");
    }
    output.push('\n');

    let optional = |amount: Option<rust_decimal::Decimal>| {
        amount.map(format_amount).unwrap_or_else(|| "-".to_string())
    };
    output.push_str(&format!("Opening balance:  {:>14}\n", optional(result.opening_balance)));
    output.push_str(&format!("Total debit:      {:>14}\n", format_amount(summary.total_debit)));
    output.push_str(&format!("Total credit:     {:>14}\n", format_amount(summary.total_credit)));
    output.push_str(&format!("Total fees:       {:>14}\n", format_amount(summary.total_fee)));
    output.push_str(&format!("Total VAT:        {:>14}\n", format_amount(summary.total_vat)));
    output.push_str(&format!("Computed ending:  {:>14}\n", format_amount(summary.computed_ending)));
    output.push_str(&format!("Stated ending:    {:>14}", optional(summary.stated_ending)));

    output
}

fn clip(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut clipped: String = s.chars().take(width - 1).collect();
    clipped.push('…');
    clipped
}

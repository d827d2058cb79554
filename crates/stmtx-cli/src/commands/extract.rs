//! Extract command - turn statement files into review text.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use super::{load_config, open_session, read_sources, Spinner};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let files = read_sources(&args.inputs)?;
    let mut session = open_session(&config)?;

    let spinner = Spinner::follow(session.subscribe());
    let outcome = session.select_files(files).await;
    spinner.finish();
    outcome?;

    if session.raw_text().trim().is_empty() {
        eprintln!(
            "{} No text found in {}",
            style("⚠").yellow(),
            session.file_label()
        );
    }

    if let Some(output_path) = &args.output {
        fs::write(output_path, session.raw_text())?;
        println!(
            "{} Text written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", session.raw_text());
    }

    Ok(())
}

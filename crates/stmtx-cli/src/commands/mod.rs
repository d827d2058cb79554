//! CLI subcommands and the helpers they share.

pub mod config;
pub mod extract;
pub mod process;
pub mod review;

use std::path::{Path, PathBuf};

use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use stmtx_core::{
    FileSessionStore, LoadingState, MemorySessionStore, OpenAiCompatibleClient, Session,
    SessionStore, SourceFile, StmtxConfig,
};

/// Session type used by every command.
pub type CliSession = Session<OpenAiCompatibleClient, Box<dyn SessionStore>>;

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stmtx")
        .join("config.json")
}

/// Resolve the config file: the `--config` flag, else the default location.
pub fn config_path(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load configuration, falling back to defaults when no file exists.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<StmtxConfig> {
    match config_path {
        Some(path) => Ok(StmtxConfig::from_file(Path::new(path))?),
        None => {
            let path = default_config_path();
            if path.exists() {
                Ok(StmtxConfig::from_file(&path)?)
            } else {
                Ok(StmtxConfig::default())
            }
        }
    }
}

/// Create a session backed by the configured AI service and session file.
pub fn open_session(config: &StmtxConfig) -> anyhow::Result<CliSession> {
    let persistence: Box<dyn SessionStore> = if config.session.persist {
        let store = match &config.session.path {
            Some(path) => FileSessionStore::new(path),
            None => FileSessionStore::default_location(),
        };
        debug!("Session file: {}", store.path().display());
        Box::new(store)
    } else {
        Box::new(MemorySessionStore::new())
    };

    let ai = OpenAiCompatibleClient::from_config(config.ai.clone())?;
    Ok(Session::new(config, ai, persistence))
}

/// Expand paths and glob patterns into a list of files, in argument order.
pub fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let path = PathBuf::from(input);
        if path.is_file() {
            files.push(path);
            continue;
        }

        let mut matched: Vec<PathBuf> = glob(input)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            anyhow::bail!("No matching files found for: {}", input);
        }
        matched.sort();
        files.append(&mut matched);
    }

    Ok(files)
}

/// Read the input files, rejecting unsupported types before any work starts.
pub fn read_sources(inputs: &[String]) -> anyhow::Result<Vec<SourceFile>> {
    let mut sources = Vec::new();
    for path in expand_inputs(inputs)? {
        let source = SourceFile::from_path(&path)?;
        source.kind()?;
        sources.push(source);
    }
    Ok(sources)
}

/// Spinner that follows the session's loading state.
pub struct Spinner {
    pb: ProgressBar,
    task: JoinHandle<()>,
}

impl Spinner {
    pub fn follow(mut state: watch::Receiver<LoadingState>) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let bar = pb.clone();
        let task = tokio::spawn(async move {
            loop {
                let message = match *state.borrow_and_update() {
                    LoadingState::Idle => "Waiting...",
                    LoadingState::Extracting => "Reading files...",
                    LoadingState::Processing => "Waiting for the model...",
                };
                bar.set_message(message);

                if state.changed().await.is_err() {
                    break;
                }
            }
        });

        Self { pb, task }
    }

    pub fn finish(self) {
        self.task.abort();
        self.pb.finish_and_clear();
    }
}

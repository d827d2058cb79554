//! Error types for the stmtx-core library.

use thiserror::Error;

/// Main error type for the stmtx library.
#[derive(Error, Debug)]
pub enum StmtxError {
    /// File could not be read or decoded.
    #[error("{0}")]
    Extract(#[from] ExtractError),

    /// AI service request failed.
    #[error("AI request failed: {0}")]
    Ai(#[from] AiError),

    /// Result store mutation rejected.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Input rejected before any work was done.
    #[error("{0}")]
    Validation(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while turning source files into text or page images.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The file is unreadable, corrupt, or of an unsupported type.
    #[error("cannot read {file}: {reason}")]
    FileRead { file: String, reason: String },

    /// An underlying document library failed to parse the file.
    #[error("failed to extract {file}: {reason}")]
    Library { file: String, reason: String },

    /// The PDF is encrypted with a non-empty password.
    #[error("{0} is encrypted")]
    Encrypted(String),

    /// The document contains no pages or sheets.
    #[error("{0} is empty")]
    Empty(String),

    /// A blocking extraction task was cancelled or panicked.
    #[error("extraction task failed: {0}")]
    Task(String),
}

impl ExtractError {
    pub fn file_read(file: impl Into<String>, reason: impl ToString) -> Self {
        Self::FileRead {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    pub fn library(file: impl Into<String>, reason: impl ToString) -> Self {
        Self::Library {
            file: file.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from the AI extraction boundary.
#[derive(Error, Debug)]
pub enum AiError {
    /// No API key could be found.
    #[error("missing API key: set the {0} environment variable")]
    MissingApiKey(String),

    /// Transport-level failure.
    #[error("request error: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The model reply could not be interpreted.
    #[error("unexpected model reply: {0}")]
    InvalidResponse(String),
}

/// Errors from the editable result store.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// No statement has been loaded yet.
    #[error("no statement loaded")]
    Empty,

    /// Row index outside the transaction table.
    #[error("row {index} out of range (table has {len} rows)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Result type for the stmtx library.
pub type Result<T> = std::result::Result<T, StmtxError>;

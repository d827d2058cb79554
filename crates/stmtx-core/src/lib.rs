//! Core library for converting bank statements into transaction tables.
//!
//! This crate provides:
//! - File extraction (PDF page images, images, Word, Excel, plain text)
//! - The AI boundary for OCR, structured extraction, and assisted editing
//! - Balance reconciliation
//! - An editable result store with snapshot undo
//! - Session orchestration and persistence

pub mod ai;
pub mod error;
pub mod models;
pub mod persist;
pub mod reconcile;
pub mod store;

#[cfg(feature = "native")]
pub mod extract;
#[cfg(feature = "native")]
pub mod session;

pub use error::{AiError, ExtractError, Result, StmtxError, StoreError};
pub use models::{format_amount, parse_amount, AccountInfo, PageImage, StatementResult, StmtxConfig, Transaction};
pub use persist::{FileSessionStore, MemorySessionStore, PersistedSession, SessionStore};
pub use reconcile::{calculate_mismatch, reconcile, Reconciliation};
pub use store::{
    AmountField, BalanceKind, Field, FieldEdit, ResultStore, StatementEdit, TextField, TransactionDraft,
};
pub use ai::StatementAi;

#[cfg(feature = "native")]
pub use ai::OpenAiCompatibleClient;
#[cfg(feature = "native")]
pub use extract::{DocumentExtractor, ExtractedContent, FileKind, SourceFile, FILE_SEPARATOR};
#[cfg(feature = "native")]
pub use session::{LoadingState, Session};

//! Data models and configuration.

pub mod amount;
pub mod config;
pub mod statement;

pub use amount::{format_amount, parse_amount};
pub use config::StmtxConfig;
pub use statement::{AccountInfo, PageImage, StatementResult, Transaction};

//! Editable statement result with snapshot undo.
//!
//! Every mutation (direct edit, row insertion, balance change, or an
//! assistant-proposed edit) first pushes the pre-mutation result onto the
//! history and then applies the change. Undo pops whole snapshots, LIFO.

mod edit;

pub use edit::{
    AmountField, BalanceKind, Field, FieldEdit, StatementEdit, TextField, TransactionDraft,
};

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::StoreError;
use crate::models::config::StoreConfig;
use crate::models::statement::StatementResult;
use crate::reconcile::{reconcile, Reconciliation};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Holds the active statement and its undo history.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    current: Option<StatementResult>,
    history: Vec<StatementResult>,
    config: StoreConfig,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            current: None,
            history: Vec::new(),
            config,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// The active statement, if one is loaded.
    pub fn current(&self) -> Option<&StatementResult> {
        self.current.as_ref()
    }

    /// Number of snapshots on the undo history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Replace the active statement with a fresh extraction result.
    ///
    /// The history restarts at `[result]`.
    pub fn load(&mut self, result: StatementResult) {
        debug!("Loaded statement with {} transactions", result.transactions.len());
        self.history = vec![result.clone()];
        self.current = Some(result);
    }

    /// Change one cell of row `index`.
    pub fn edit_field(&mut self, index: usize, edit: FieldEdit) -> Result<()> {
        self.mutate(|result| {
            let len = result.transactions.len();
            let tx = result
                .transactions
                .get_mut(index)
                .ok_or(StoreError::IndexOutOfRange { index, len })?;
            edit.apply(tx);
            Ok(())
        })
    }

    /// Append a row dated today, returning its index.
    pub fn add_transaction(&mut self, draft: TransactionDraft) -> Result<usize> {
        let today = chrono::Local::now()
            .format(&self.config.date_format)
            .to_string();
        self.add_transaction_on(draft, &today)
    }

    /// Append a row using `today` as the default date, returning its index.
    pub fn add_transaction_on(&mut self, draft: TransactionDraft, today: &str) -> Result<usize> {
        let tx = draft.into_transaction(today, &self.config.placeholder_description);
        self.mutate(|result| {
            result.transactions.push(tx);
            Ok(result.transactions.len() - 1)
        })
    }

    /// Set or clear the opening or ending balance.
    pub fn set_balance(&mut self, kind: BalanceKind, value: Option<Decimal>) -> Result<()> {
        self.mutate(|result| {
            match kind {
                BalanceKind::Opening => result.opening_balance = value,
                BalanceKind::Ending => result.ending_balance = value,
            }
            Ok(())
        })
    }

    /// Apply an assistant-proposed edit.
    pub fn apply(&mut self, edit: StatementEdit) -> Result<()> {
        match edit {
            StatementEdit::SetField { row, edit } => self.edit_field(row, edit),
            StatementEdit::AddTransaction(draft) => self.add_transaction(draft).map(|_| ()),
            StatementEdit::SetBalance(kind, value) => self.set_balance(kind, value),
        }
    }

    /// Restore the previous snapshot.
    ///
    /// Returns `false` without changing anything when only the initial
    /// snapshot remains.
    pub fn undo(&mut self) -> bool {
        if self.history.len() <= 1 {
            return false;
        }
        self.current = self.history.pop();
        debug!("Undo, {} snapshots left", self.history.len());
        true
    }

    /// Totals and balance check of the active statement.
    pub fn reconciliation(&self) -> Option<Reconciliation> {
        self.current.as_ref().map(|r| {
            reconcile(r.opening_balance, &r.transactions, r.ending_balance)
        })
    }

    /// Balance mismatch warning for the active statement.
    pub fn mismatch(&self) -> Option<String> {
        self.reconciliation().and_then(|r| r.mismatch)
    }

    /// Apply `f` to a copy of the current result; on success, push the old
    /// result onto the history and install the copy.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut StatementResult) -> Result<T>) -> Result<T> {
        let current = self.current.as_mut().ok_or(StoreError::Empty)?;
        let mut next = current.clone();
        let out = f(&mut next)?;
        self.history.push(std::mem::replace(current, next));
        Ok(out)
    }
}

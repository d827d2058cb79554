//! WASM bindings for bank statement reconciliation and editing.
//!
//! The browser does its own file decoding and AI calls; this crate supplies
//! the amount parser, the balance check and the undoable result editor.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

use stmtx_core::models::config::StoreConfig;
use stmtx_core::{
    BalanceKind, FieldEdit, ResultStore, StatementEdit, StatementResult, Transaction, TransactionDraft,
};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js_error(e: impl ToString) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

/// Balance mismatch warning, or `undefined` when the balances agree.
///
/// `transactions_json` is a JSON array of transactions; amounts may be
/// numbers or formatted strings.
#[wasm_bindgen]
pub fn calculate_mismatch(
    opening_balance: Option<f64>,
    transactions_json: &str,
    ending_balance: Option<f64>,
) -> Result<Option<String>, JsValue> {
    let transactions: Vec<Transaction> = serde_json::from_str(transactions_json).map_err(to_js_error)?;

    Ok(stmtx_core::calculate_mismatch(
        to_decimal(opening_balance),
        &transactions,
        to_decimal(ending_balance),
    ))
}

/// Parse a formatted amount (e.g. "1,234.56", "1.234,56", "(12.50)").
#[wasm_bindgen]
pub fn parse_amount(amount: &str) -> Option<f64> {
    stmtx_core::parse_amount(amount).and_then(|d| d.to_f64())
}

/// Undoable editor over one statement result.
#[wasm_bindgen]
pub struct StatementEditor {
    store: ResultStore,
}

#[wasm_bindgen]
impl StatementEditor {
    /// Create an empty editor.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            store: ResultStore::new(StoreConfig::default()),
        }
    }

    /// Load an extraction result, resetting the history.
    #[wasm_bindgen]
    pub fn load(&mut self, result: JsValue) -> Result<(), JsValue> {
        let result: StatementResult = serde_wasm_bindgen::from_value(result).map_err(to_js_error)?;
        self.store.load(result);
        Ok(())
    }

    /// Change one cell of row `row` (0-based).
    #[wasm_bindgen(js_name = editField)]
    pub fn edit_field(&mut self, row: usize, field: &str, value: &str) -> Result<(), JsValue> {
        let edit = FieldEdit::parse(field, value).map_err(to_js_error)?;
        self.store.edit_field(row, edit).map_err(to_js_error)
    }

    /// Append a row; missing fields get defaults. Returns the new row index.
    #[wasm_bindgen(js_name = addTransaction)]
    pub fn add_transaction(&mut self, draft: JsValue) -> Result<usize, JsValue> {
        let draft: TransactionDraft = if draft.is_undefined() || draft.is_null() {
            TransactionDraft::default()
        } else {
            serde_wasm_bindgen::from_value(draft).map_err(to_js_error)?
        };
        self.store.add_transaction(draft).map_err(to_js_error)
    }

    /// Set `"opening"` or `"ending"` balance; `undefined` clears it.
    #[wasm_bindgen(js_name = setBalance)]
    pub fn set_balance(&mut self, kind: &str, value: Option<f64>) -> Result<(), JsValue> {
        let kind: BalanceKind = kind.parse().map_err(to_js_error)?;
        self.store
            .set_balance(kind, to_decimal(value))
            .map_err(to_js_error)
    }

    /// Apply edits proposed by an assistant, as a JSON array.
    #[wasm_bindgen(js_name = applyEdits)]
    pub fn apply_edits(&mut self, edits_json: &str) -> Result<usize, JsValue> {
        let edits: Vec<StatementEdit> = serde_json::from_str(edits_json).map_err(to_js_error)?;
        let count = edits.len();

        let mut staged = self.store.clone();
        for edit in edits {
            staged.apply(edit).map_err(to_js_error)?;
        }
        self.store = staged;
        Ok(count)
    }

    /// Revert the last change. Returns false when there is nothing to undo.
    #[wasm_bindgen]
    pub fn undo(&mut self) -> bool {
        self.store.undo()
    }

    /// Current result, or `null` before anything is loaded.
    #[wasm_bindgen]
    pub fn result(&self) -> Result<JsValue, JsValue> {
        match self.store.current() {
            Some(result) => serde_wasm_bindgen::to_value(result).map_err(to_js_error),
            None => Ok(JsValue::NULL),
        }
    }

    /// Column totals and computed ending balance.
    #[wasm_bindgen]
    pub fn reconciliation(&self) -> Result<JsValue, JsValue> {
        match self.store.reconciliation() {
            Some(summary) => serde_wasm_bindgen::to_value(&summary).map_err(to_js_error),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen]
    pub fn mismatch(&self) -> Option<String> {
        self.store.mismatch()
    }

    #[wasm_bindgen(js_name = historyLength)]
    pub fn history_length(&self) -> usize {
        self.store.history_len()
    }
}

impl Default for StatementEditor {
    fn default() -> Self {
        Self::new()
    }
}

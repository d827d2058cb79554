//! Edit operations accepted by the result store.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::amount::{deserialize_opt_amount, parse_amount};
use crate::models::statement::Transaction;

/// Numeric transaction columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AmountField {
    Debit,
    Credit,
    Fee,
    Vat,
}

/// Text transaction columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextField {
    TransactionCode,
    Date,
    Description,
}

/// Any editable transaction column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Amount(AmountField),
    Text(TextField),
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "debit" => Ok(Field::Amount(AmountField::Debit)),
            "credit" => Ok(Field::Amount(AmountField::Credit)),
            "fee" => Ok(Field::Amount(AmountField::Fee)),
            "vat" => Ok(Field::Amount(AmountField::Vat)),
            "transactioncode" | "code" => Ok(Field::Text(TextField::TransactionCode)),
            "date" => Ok(Field::Text(TextField::Date)),
            "description" => Ok(Field::Text(TextField::Description)),
            _ => Err(format!("unknown field: {}", s)),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Amount(AmountField::Debit) => "debit",
            Field::Amount(AmountField::Credit) => "credit",
            Field::Amount(AmountField::Fee) => "fee",
            Field::Amount(AmountField::Vat) => "vat",
            Field::Text(TextField::TransactionCode) => "transactionCode",
            Field::Text(TextField::Date) => "date",
            Field::Text(TextField::Description) => "description",
        };
        f.write_str(name)
    }
}

impl Field {
    /// Pair the column with a raw value, parsing amounts.
    pub fn with_value(self, value: &str) -> Result<FieldEdit, String> {
        match self {
            Field::Amount(field) => parse_amount(value)
                .map(|amount| FieldEdit::Amount(field, amount))
                .ok_or_else(|| format!("invalid amount for {}: {:?}", self, value)),
            Field::Text(field) => Ok(FieldEdit::Text(field, value.to_string())),
        }
    }
}

/// A single-cell change.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Amount(AmountField, Decimal),
    Text(TextField, String),
}

impl FieldEdit {
    /// Parse a `field`/`value` pair as typed by a user.
    pub fn parse(field: &str, value: &str) -> Result<Self, String> {
        field.parse::<Field>()?.with_value(value)
    }

    pub(crate) fn apply(self, tx: &mut Transaction) {
        match self {
            FieldEdit::Amount(AmountField::Debit, v) => tx.debit = v,
            FieldEdit::Amount(AmountField::Credit, v) => tx.credit = v,
            FieldEdit::Amount(AmountField::Fee, v) => tx.fee = Some(v),
            FieldEdit::Amount(AmountField::Vat, v) => tx.vat = Some(v),
            FieldEdit::Text(TextField::TransactionCode, v) => tx.transaction_code = v,
            FieldEdit::Text(TextField::Date, v) => tx.date = v,
            FieldEdit::Text(TextField::Description, v) => tx.description = v,
        }
    }
}

/// Statement-level balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BalanceKind {
    Opening,
    Ending,
}

impl FromStr for BalanceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "opening" | "openingbalance" => Ok(BalanceKind::Opening),
            "ending" | "endingbalance" | "closing" => Ok(BalanceKind::Ending),
            _ => Err(format!("unknown balance: {}", s)),
        }
    }
}

/// Partially specified row for insertion; absent fields get defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionDraft {
    pub transaction_code: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "deserialize_opt_amount")]
    pub debit: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_opt_amount")]
    pub credit: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_opt_amount")]
    pub fee: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_opt_amount")]
    pub vat: Option<Decimal>,
}

impl TransactionDraft {
    /// Set a column from a user-typed value.
    pub fn set(&mut self, field: Field, value: &str) -> Result<(), String> {
        match field.with_value(value)? {
            FieldEdit::Amount(AmountField::Debit, v) => self.debit = Some(v),
            FieldEdit::Amount(AmountField::Credit, v) => self.credit = Some(v),
            FieldEdit::Amount(AmountField::Fee, v) => self.fee = Some(v),
            FieldEdit::Amount(AmountField::Vat, v) => self.vat = Some(v),
            FieldEdit::Text(TextField::TransactionCode, v) => self.transaction_code = Some(v),
            FieldEdit::Text(TextField::Date, v) => self.date = Some(v),
            FieldEdit::Text(TextField::Description, v) => self.description = Some(v),
        }
        Ok(())
    }

    /// Build a row, filling gaps with an empty code, `today`, the
    /// placeholder description, and zero amounts.
    pub fn into_transaction(self, today: &str, placeholder_description: &str) -> Transaction {
        Transaction {
            transaction_code: self.transaction_code.unwrap_or_default(),
            date: self.date.unwrap_or_else(|| today.to_string()),
            description: self
                .description
                .unwrap_or_else(|| placeholder_description.to_string()),
            debit: self.debit.unwrap_or_default(),
            credit: self.credit.unwrap_or_default(),
            fee: Some(self.fee.unwrap_or_default()),
            vat: Some(self.vat.unwrap_or_default()),
        }
    }
}

/// Edit proposed by the chat assistant, applied through the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEdit")]
pub enum StatementEdit {
    SetField { row: usize, edit: FieldEdit },
    AddTransaction(TransactionDraft),
    SetBalance(BalanceKind, Option<Decimal>),
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum RawEdit {
    #[serde(rename_all = "camelCase")]
    SetField {
        row: usize,
        field: String,
        value: serde_json::Value,
    },
    AddTransaction {
        #[serde(default)]
        transaction: TransactionDraft,
    },
    SetBalance {
        balance: BalanceKind,
        #[serde(default, deserialize_with = "deserialize_opt_amount")]
        value: Option<Decimal>,
    },
}

impl TryFrom<RawEdit> for StatementEdit {
    type Error = String;

    fn try_from(raw: RawEdit) -> Result<Self, Self::Error> {
        match raw {
            RawEdit::SetField { row, field, value } => {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                let edit = FieldEdit::parse(&field, &value)?;
                Ok(StatementEdit::SetField { row, edit })
            }
            RawEdit::AddTransaction { transaction } => Ok(StatementEdit::AddTransaction(transaction)),
            RawEdit::SetBalance { balance, value } => Ok(StatementEdit::SetBalance(balance, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_field_names() {
        assert_eq!("debit".parse::<Field>(), Ok(Field::Amount(AmountField::Debit)));
        assert_eq!(
            "transaction_code".parse::<Field>(),
            Ok(Field::Text(TextField::TransactionCode))
        );
        assert_eq!(
            "transactionCode".parse::<Field>(),
            Ok(Field::Text(TextField::TransactionCode))
        );
        assert!("balance".parse::<Field>().is_err());
    }

    #[test]
    fn test_field_edit_parse() {
        assert_eq!(
            FieldEdit::parse("credit", "1,250.00"),
            Ok(FieldEdit::Amount(AmountField::Credit, Decimal::from(1250)))
        );
        assert_eq!(
            FieldEdit::parse("description", "ATM withdrawal"),
            Ok(FieldEdit::Text(TextField::Description, "ATM withdrawal".to_string()))
        );
        assert!(FieldEdit::parse("fee", "abc").is_err());
    }

    #[test]
    fn test_empty_draft_defaults() {
        let tx = TransactionDraft::default().into_transaction("01/02/2024", "New transaction");

        assert_eq!(tx.transaction_code, "");
        assert_eq!(tx.date, "01/02/2024");
        assert_eq!(tx.description, "New transaction");
        assert_eq!(tx.debit, Decimal::ZERO);
        assert_eq!(tx.credit, Decimal::ZERO);
        assert_eq!(tx.fee, Some(Decimal::ZERO));
        assert_eq!(tx.vat, Some(Decimal::ZERO));
    }

    #[test]
    fn test_deserialize_assistant_edits() {
        let edits: Vec<StatementEdit> = serde_json::from_str(
            r#"[
                { "op": "setField", "row": 2, "field": "debit", "value": 150 },
                { "op": "setField", "row": 0, "field": "description", "value": "Rent" },
                { "op": "addTransaction", "transaction": { "description": "Interest", "credit": "3.20" } },
                { "op": "setBalance", "balance": "ending", "value": "2,000" }
            ]"#,
        )
        .unwrap();

        assert_eq!(
            edits[0],
            StatementEdit::SetField {
                row: 2,
                edit: FieldEdit::Amount(AmountField::Debit, Decimal::from(150)),
            }
        );
        assert_eq!(
            edits[1],
            StatementEdit::SetField {
                row: 0,
                edit: FieldEdit::Text(TextField::Description, "Rent".to_string()),
            }
        );
        match &edits[2] {
            StatementEdit::AddTransaction(draft) => {
                assert_eq!(draft.description.as_deref(), Some("Interest"));
                assert_eq!(draft.credit, Some(Decimal::new(320, 2)));
            }
            other => panic!("unexpected edit {:?}", other),
        }
        assert_eq!(
            edits[3],
            StatementEdit::SetBalance(BalanceKind::Ending, Some(Decimal::from(2000)))
        );
    }

    #[test]
    fn test_reject_unknown_field() {
        let result: Result<StatementEdit, _> =
            serde_json::from_str(r#"{ "op": "setField", "row": 0, "field": "color", "value": "red" }"#);
        assert!(result.is_err());
    }
}

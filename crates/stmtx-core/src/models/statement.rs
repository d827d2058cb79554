//! Statement data models shared by extraction, editing, and output.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::amount::{deserialize_amount, deserialize_opt_amount};

/// A single statement line.
///
/// Rows have no stable id; they are addressed by position in
/// [`StatementResult::transactions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Bank reference or transaction code.
    #[serde(default)]
    pub transaction_code: String,

    /// Posting date as printed on the statement.
    #[serde(default)]
    pub date: String,

    #[serde(default)]
    pub description: String,

    /// Amount added to the balance.
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub debit: Decimal,

    /// Amount removed from the balance.
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub credit: Decimal,

    /// Bank fee charged on this line.
    #[serde(
        default,
        deserialize_with = "deserialize_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub fee: Option<Decimal>,

    /// VAT charged on the fee.
    #[serde(
        default,
        deserialize_with = "deserialize_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub vat: Option<Decimal>,
}

impl Transaction {
    /// Fee, treating an absent value as zero.
    pub fn fee_or_zero(&self) -> Decimal {
        self.fee.unwrap_or_default()
    }

    /// VAT, treating an absent value as zero.
    pub fn vat_or_zero(&self) -> Decimal {
        self.vat.unwrap_or_default()
    }
}

/// Account header printed on the statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_holder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,

    /// ISO currency code when the statement names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Statement period as printed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl AccountInfo {
    /// Check if no header field was recognized.
    pub fn is_empty(&self) -> bool {
        self.account_number.is_none()
            && self.account_holder.is_none()
            && self.bank_name.is_none()
            && self.currency.is_none()
            && self.period.is_none()
    }
}

/// Structured statement produced by AI extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResult {
    #[serde(default)]
    pub account_info: AccountInfo,

    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub opening_balance: Option<Decimal>,

    #[serde(default, deserialize_with = "deserialize_opt_amount")]
    pub ending_balance: Option<Decimal>,

    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// Page image handed to the AI for OCR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    /// MIME type of the encoded image (image/png for rendered PDF pages).
    pub mime_type: String,
    /// Base64 (standard alphabet) image bytes.
    pub data: String,
}

impl PageImage {
    /// Format as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

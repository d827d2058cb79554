//! The AI boundary: OCR of page images, structured extraction, and the
//! editing assistant.

#[cfg(feature = "native")]
mod client;
pub mod prompts;

#[cfg(feature = "native")]
pub use client::OpenAiCompatibleClient;

use std::future::Future;

use tracing::debug;

use crate::error::AiError;
use crate::models::statement::{PageImage, StatementResult};
use crate::store::StatementEdit;

/// Hosted model operations used by the session.
///
/// Implementations are stateless from the caller's side and never retry: a
/// failed call surfaces immediately as an [`AiError`].
pub trait StatementAi {
    /// Recover statement text from page images.
    fn text_from_images(
        &self,
        images: &[PageImage],
    ) -> impl Future<Output = Result<String, AiError>>;

    /// Turn reviewed statement text into a structured result.
    fn process_statement(&self, text: &str) -> impl Future<Output = Result<StatementResult, AiError>>;

    /// Propose edits to the current result for a natural-language request.
    fn propose_edits(
        &self,
        result: &StatementResult,
        instruction: &str,
    ) -> impl Future<Output = Result<Vec<StatementEdit>, AiError>>;
}

/// Extract a JSON object from a reply that may wrap it in markdown.
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if block.starts_with('{') {
            return Some(block);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Extract a JSON array from a reply that may wrap it in markdown.
pub fn extract_json_array(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if block.starts_with('[') {
            return Some(block);
        }
    }

    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

/// Contents of the first ``` block, without the language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let content_start = text[start..].find('\n').map(|i| start + i + 1)?;
    let end = text[content_start..].find("```")?;
    Some(text[content_start..content_start + end].trim())
}

/// Parse an extraction reply into a statement result.
pub fn parse_statement_reply(reply: &str) -> Result<StatementResult, AiError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| AiError::InvalidResponse("no JSON object in reply".to_string()))?;

    let result: StatementResult = serde_json::from_str(json)
        .map_err(|e| AiError::InvalidResponse(format!("statement JSON: {}", e)))?;

    debug!("Parsed statement with {} transactions", result.transactions.len());
    Ok(result)
}

/// Parse an assistant reply into edits.
///
/// A bare object is accepted as a single edit, and `{"edits": [...]}` as a
/// wrapped list.
pub fn parse_edits_reply(reply: &str) -> Result<Vec<StatementEdit>, AiError> {
    let invalid = |e: serde_json::Error| AiError::InvalidResponse(format!("edit JSON: {}", e));

    if let Some(json) = extract_json_array(reply) {
        match serde_json::from_str::<Vec<StatementEdit>>(json) {
            Ok(edits) => return Ok(edits),
            Err(e) if list_comes_first(reply) => return Err(invalid(e)),
            Err(_) => {}
        }
    }

    let json = extract_json_object(reply)
        .ok_or_else(|| AiError::InvalidResponse("no edits in reply".to_string()))?;
    let value: serde_json::Value = serde_json::from_str(json).map_err(invalid)?;

    match value.get("edits") {
        Some(edits) => serde_json::from_value(edits.clone()).map_err(invalid),
        None => serde_json::from_value(value).map(|edit| vec![edit]).map_err(invalid),
    }
}

/// Whether the reply opens a list before any object.
fn list_comes_first(reply: &str) -> bool {
    match (reply.find('['), reply.find('{')) {
        (Some(list), Some(object)) => list < object,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AmountField, BalanceKind, FieldEdit};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_object_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json_object(reply), Some("{\"a\": 1}"));
        assert_eq!(extract_json_object("result: {\"a\": {\"b\": 2}} ok"), Some("{\"a\": {\"b\": 2}}"));
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn test_parse_statement_reply_lenient_amounts() {
        let reply = r#"```json
{
  "accountInfo": {"bankName": "First Bank"},
  "openingBalance": "1,000.00",
  "endingBalance": 1500,
  "transactions": [
    {"transactionCode": "T1", "date": "05/03/2024", "description": "Salary", "debit": "500", "credit": null}
  ]
}
```"#;
        let result = parse_statement_reply(reply).unwrap();

        assert_eq!(result.account_info.bank_name.as_deref(), Some("First Bank"));
        assert_eq!(result.opening_balance, Some(dec("1000")));
        assert_eq!(result.ending_balance, Some(dec("1500")));
        assert_eq!(result.transactions[0].debit, dec("500"));
        assert_eq!(result.transactions[0].credit, dec("0"));
        assert_eq!(result.transactions[0].fee, None);
    }

    #[test]
    fn test_parse_statement_reply_without_json() {
        assert!(matches!(
            parse_statement_reply("I could not read the statement."),
            Err(AiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_edits_reply_shapes() {
        let list = r#"[{"op": "setField", "row": 1, "field": "debit", "value": "12.50"},
                       {"op": "setBalance", "balance": "ending", "value": 900}]"#;
        assert_eq!(
            parse_edits_reply(list).unwrap(),
            vec![
                StatementEdit::SetField {
                    row: 1,
                    edit: FieldEdit::Amount(AmountField::Debit, dec("12.50")),
                },
                StatementEdit::SetBalance(BalanceKind::Ending, Some(dec("900"))),
            ]
        );

        let wrapped = r#"{"edits": [{"op": "setBalance", "balance": "opening", "value": null}]}"#;
        assert_eq!(
            parse_edits_reply(wrapped).unwrap(),
            vec![StatementEdit::SetBalance(BalanceKind::Opening, None)]
        );

        let single = r#"{"op": "setBalance", "balance": "opening", "value": 10}"#;
        assert_eq!(parse_edits_reply(single).unwrap().len(), 1);

        assert_eq!(parse_edits_reply("[]").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_edits_reply_reports_bad_list_entry() {
        let reply = r#"```json
[{"op": "setField", "row": 0, "field": "debit", "value": 5},
 {"op": "setField", "row": 1, "field": "color", "value": "red"}]
```"#;

        let err = parse_edits_reply(reply).unwrap_err();
        assert!(err.to_string().contains("unknown field: color"), "{}", err);
    }
}

//! Prompts sent to the model.

/// System prompt for page-image OCR.
pub const OCR_SYSTEM: &str = "You transcribe scanned bank statements. \
Return the full text of every page in reading order, one line per printed line. \
Keep every number, date and reference exactly as printed. \
Do not summarize, translate or add commentary.";

/// Instruction accompanying the page images.
pub const OCR_USER: &str = "Transcribe these bank statement pages. \
Separate pages with a blank line.";

/// System prompt for structured extraction.
pub const EXTRACTION_SYSTEM: &str = r#"You convert bank statement text into JSON.

Reply with a single JSON object and nothing else:
{
  "accountInfo": {
    "accountNumber": "string or null",
    "accountHolder": "string or null",
    "bankName": "string or null",
    "currency": "ISO code or null",
    "period": "statement period as printed, or null"
  },
  "openingBalance": number or null,
  "endingBalance": number or null,
  "transactions": [
    {
      "transactionCode": "reference as printed, or empty",
      "date": "date as printed",
      "description": "narrative",
      "debit": number,
      "credit": number,
      "fee": number or null,
      "vat": number or null
    }
  ]
}

Rules:
- One entry per statement line, in statement order.
- Copy "debit" and "credit" from the statement's own debit and credit columns.
- Use 0 for an empty debit or credit column, never negative numbers.
- Bank charges go in "fee" and tax on charges in "vat" when printed separately.
- Amounts are plain numbers without thousands separators or currency symbols."#;

/// System prompt for the editing assistant.
pub const ASSISTANT_SYSTEM: &str = r#"You help correct a bank statement table.

You receive the current statement as JSON (rows are numbered from 0) and a user request.
Reply with a JSON array of edits and nothing else. Each edit is one of:
  {"op": "setField", "row": 0, "field": "debit|credit|fee|vat|date|description|transactionCode", "value": ...}
  {"op": "addTransaction", "transaction": {"date": "...", "description": "...", "debit": 0, "credit": 0}}
  {"op": "setBalance", "balance": "opening|ending", "value": number or null}

Reply with [] when no change is needed."#;

/// User message carrying statement text for extraction.
pub fn extraction_user(text: &str) -> String {
    format!("Statement text:\n\n{}", text)
}

/// User message carrying the current table and the request.
pub fn assistant_user(statement_json: &str, instruction: &str) -> String {
    format!(
        "Current statement:\n```json\n{}\n```\n\nRequest: {}",
        statement_json, instruction
    )
}

//! Plain text decoding.

use tracing::debug;

use super::{ExtractedContent, FileExtractor, Result, SourceFile};

/// Decodes plain text files as UTF-8.
pub struct TextExtractor;

impl FileExtractor for TextExtractor {
    fn extract(&self, file: &SourceFile) -> Result<ExtractedContent> {
        let decoded = String::from_utf8_lossy(&file.bytes);
        let text: &str = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);

        debug!("Read {} chars from {}", text.len(), file.name);
        Ok(ExtractedContent::from_text(text))
    }
}

/// Truncate to at most `max_len` bytes, preferring a paragraph, sentence, or
/// word boundary.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let truncated = &text[..end];

    if let Some(pos) = truncated.rfind("\n\n") {
        return truncated[..pos].to_string();
    }
    if let Some(pos) = truncated.rfind(". ") {
        return truncated[..=pos].to_string();
    }
    if let Some(pos) = truncated.rfind(' ') {
        return truncated[..pos].to_string();
    }

    truncated.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_bom_and_decodes_lossy() {
        let mut bytes = "\u{feff}Opening balance".as_bytes().to_vec();
        bytes.push(0xff);

        let content = TextExtractor
            .extract(&SourceFile::new("s.txt", bytes))
            .unwrap();
        let text = content.text.unwrap();

        assert!(text.starts_with("Opening balance"));
        assert!(content.images.is_empty());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("First. Second sentence", 12), "First.");
        assert_eq!(truncate_text("ąęśćż", 3), "ą");
    }
}

//! Word and Excel documents, decoded to text.

use std::io::Cursor;

use calamine::{Reader, Xlsx};
use tracing::debug;

use super::{ExtractedContent, FileExtractor, Result, SourceFile};
use crate::error::ExtractError;

/// Extracts paragraphs and table rows from .docx files.
pub struct DocxExtractor;

impl FileExtractor for DocxExtractor {
    fn extract(&self, file: &SourceFile) -> Result<ExtractedContent> {
        let doc = docx_rs::read_docx(&file.bytes)
            .map_err(|e| ExtractError::library(&file.name, e))?;

        let mut text = String::new();
        for child in &doc.document.children {
            push_document_child(child, &mut text);
        }

        debug!("DOCX {} yielded {} chars", file.name, text.len());
        Ok(ExtractedContent::from_text(text.trim_end()))
    }
}

fn push_document_child(element: &docx_rs::DocumentChild, output: &mut String) {
    match element {
        docx_rs::DocumentChild::Paragraph(para) => {
            push_paragraph(para, output);
            output.push('\n');
        }
        docx_rs::DocumentChild::Table(table) => {
            for row in &table.rows {
                let docx_rs::TableChild::TableRow(tr) = row;
                let mut cells = Vec::with_capacity(tr.cells.len());
                for cell in &tr.cells {
                    let docx_rs::TableRowChild::TableCell(tc) = cell;
                    let mut cell_text = String::new();
                    for content in &tc.children {
                        if let docx_rs::TableCellContent::Paragraph(para) = content {
                            if !cell_text.is_empty() {
                                cell_text.push(' ');
                            }
                            push_paragraph(para, &mut cell_text);
                        }
                    }
                    cells.push(cell_text.trim().to_string());
                }
                output.push_str(&cells.join(" | "));
                output.push('\n');
            }
        }
        _ => {}
    }
}

fn push_paragraph(para: &docx_rs::Paragraph, output: &mut String) {
    for child in &para.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run(run, output),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for inner in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = inner {
                        push_run(run, output);
                    }
                }
            }
            _ => {}
        }
    }
}

fn push_run(run: &docx_rs::Run, output: &mut String) {
    for run_child in &run.children {
        match run_child {
            docx_rs::RunChild::Text(text) => output.push_str(&text.text),
            docx_rs::RunChild::Tab(_) => output.push('\t'),
            _ => {}
        }
    }
}

/// Renders every sheet of an .xlsx workbook as CSV rows.
pub struct SpreadsheetExtractor;

impl FileExtractor for SpreadsheetExtractor {
    fn extract(&self, file: &SourceFile) -> Result<ExtractedContent> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(file.bytes.clone()))
            .map_err(|e| ExtractError::library(&file.name, e))?;

        let sheet_names = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(ExtractError::Empty(file.name.clone()));
        }

        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(vec![]);

        for sheet_name in &sheet_names {
            let range = workbook
                .worksheet_range(sheet_name)
                .map_err(|e| ExtractError::library(&file.name, format!("sheet {}: {}", sheet_name, e)))?;

            for row in range.rows() {
                let cells: Vec<String> = row.iter().map(|cell| cell.to_string()).collect();
                if cells.iter().all(|c| c.trim().is_empty()) {
                    continue;
                }
                wtr.write_record(&cells)
                    .map_err(|e| ExtractError::library(&file.name, e))?;
            }
            debug!("Sheet {} of {}: {} rows", sheet_name, file.name, range.height());
        }

        let data = wtr
            .into_inner()
            .map_err(|e| ExtractError::library(&file.name, e))?;
        let text = String::from_utf8(data).map_err(|e| ExtractError::library(&file.name, e))?;

        Ok(ExtractedContent::from_text(text.trim_end()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docx_bytes() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        docx_rs::Docx::new()
            .add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("Statement March 2024")),
            )
            .add_table(docx_rs::Table::new(vec![docx_rs::TableRow::new(vec![
                docx_rs::TableCell::new()
                    .add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("05/03"))),
                docx_rs::TableCell::new()
                    .add_paragraph(docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("Salary"))),
            ])]))
            .build()
            .pack(&mut buf)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_docx_paragraphs_and_tables() {
        let content = DocxExtractor
            .extract(&SourceFile::new("s.docx", docx_bytes()))
            .unwrap();
        let text = content.text.unwrap();

        assert!(text.contains("Statement March 2024"), "{}", text);
        assert!(text.contains("05/03 | Salary"), "{}", text);
    }

    #[test]
    fn test_invalid_docx_is_library_error() {
        let err = DocxExtractor
            .extract(&SourceFile::new("s.docx", b"not a zip".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Library { .. }));
    }

    #[test]
    fn test_xlsx_sheets_in_workbook_order() {
        let bytes = include_bytes!("../../tests/fixtures/two_sheets.xlsx").to_vec();
        let content = SpreadsheetExtractor
            .extract(&SourceFile::new("statement.xlsx", bytes))
            .unwrap();
        let text = content.text.unwrap();

        let positions: Vec<usize> = ["Salary", "Rent", "Groceries", "Refund"]
            .iter()
            .map(|label| text.find(label).unwrap_or_else(|| panic!("{} missing from {}", label, text)))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);
        assert!(text.contains("Salary,500"), "{}", text);
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_invalid_xlsx_is_library_error() {
        let err = SpreadsheetExtractor
            .extract(&SourceFile::new("s.xlsx", b"not a zip".to_vec()))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Library { .. }));
    }
}

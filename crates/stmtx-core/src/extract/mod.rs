//! Source file extraction: PDFs and images become page images, office and
//! text documents become text.

mod office;
mod pdf;
mod raster;
mod text;

pub use office::{DocxExtractor, SpreadsheetExtractor};
pub use pdf::PdfExtractor;
pub use raster::ImageExtractor;
pub use text::{truncate_text, TextExtractor};

use std::path::Path;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::models::config::StmtxConfig;
use crate::models::statement::PageImage;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Marker placed between the texts of consecutive files.
pub const FILE_SEPARATOR: &str = "\n\n--- NEXT FILE ---\n\n";

/// File extensions accepted for upload.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx", "txt", "png", "jpg", "jpeg", "bmp"];

/// Kind of source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Word,
    Spreadsheet,
    Text,
}

impl FileKind {
    /// Map an accepted extension (case-insensitive) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "png" | "jpg" | "jpeg" | "bmp" => Some(FileKind::Image),
            "docx" => Some(FileKind::Word),
            "xlsx" => Some(FileKind::Spreadsheet),
            "txt" => Some(FileKind::Text),
            _ => None,
        }
    }

    /// Map a declared media type to a kind.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(FileKind::Pdf),
            "image/png" | "image/jpeg" | "image/jpg" | "image/bmp" => Some(FileKind::Image),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(FileKind::Word)
            }
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(FileKind::Spreadsheet)
            }
            "text/plain" => Some(FileKind::Text),
            _ => None,
        }
    }
}

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name as shown to the user.
    pub name: String,
    /// Declared media type, if the source provided one.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: None,
            bytes,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Read a file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path).map_err(|e| ExtractError::file_read(&name, e))?;
        Ok(Self::new(name, bytes))
    }

    /// Determine the document kind from the media type, then the extension.
    pub fn kind(&self) -> Result<FileKind> {
        if let Some(kind) = self.media_type.as_deref().and_then(FileKind::from_media_type) {
            return Ok(kind);
        }

        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FileKind::from_extension)
            .ok_or_else(|| {
                ExtractError::file_read(
                    &self.name,
                    format!(
                        "unsupported file type (accepted: {})",
                        ACCEPTED_EXTENSIONS.join(", ")
                    ),
                )
            })
    }
}

/// Extracted content of one or more files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    /// Decoded text, when the source carried text.
    pub text: Option<String>,
    /// Page images in document order.
    pub images: Vec<PageImage>,
}

impl ExtractedContent {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            images: Vec::new(),
        }
    }

    pub fn from_images(images: Vec<PageImage>) -> Self {
        Self { text: None, images }
    }

    /// Merge per-file results: texts joined by [`FILE_SEPARATOR`] in order,
    /// images flattened in order.
    pub fn combine(contents: impl IntoIterator<Item = ExtractedContent>) -> Self {
        let mut texts = Vec::new();
        let mut images = Vec::new();

        for content in contents {
            if let Some(text) = content.text.filter(|t| !t.trim().is_empty()) {
                texts.push(text);
            }
            images.extend(content.images);
        }

        Self {
            text: (!texts.is_empty()).then(|| texts.join(FILE_SEPARATOR)),
            images,
        }
    }
}

/// Trait for per-format extractors.
pub trait FileExtractor {
    /// Extract text or page images from one file.
    fn extract(&self, file: &SourceFile) -> Result<ExtractedContent>;
}

/// Dispatches each file to the extractor for its kind.
pub struct DocumentExtractor {
    pdf: PdfExtractor,
    image: ImageExtractor,
    docx: DocxExtractor,
    spreadsheet: SpreadsheetExtractor,
    text: TextExtractor,
    max_text_length: usize,
}

impl DocumentExtractor {
    pub fn new(config: &StmtxConfig) -> Self {
        Self {
            pdf: PdfExtractor::new(config.pdf.clone()),
            image: ImageExtractor,
            docx: DocxExtractor,
            spreadsheet: SpreadsheetExtractor,
            text: TextExtractor,
            max_text_length: config.extraction.max_text_length,
        }
    }

    /// Extract a batch concurrently on the blocking pool.
    ///
    /// All-or-nothing: the first failure is returned and every partial
    /// result is discarded.
    pub async fn extract_batch(
        self: Arc<Self>,
        files: Vec<SourceFile>,
    ) -> std::result::Result<ExtractedContent, ExtractError> {
        info!("Extracting {} file(s)", files.len());

        let tasks = files.into_iter().map(|file| {
            let extractor = Arc::clone(&self);
            async move {
                tokio::task::spawn_blocking(move || extractor.extract(&file))
                    .await
                    .map_err(|e| ExtractError::Task(e.to_string()))?
            }
        });

        let contents = try_join_all(tasks).await?;
        let combined = ExtractedContent::combine(contents);

        debug!(
            "Batch produced {} chars of text and {} image(s)",
            combined.text.as_ref().map(|t| t.len()).unwrap_or(0),
            combined.images.len()
        );
        Ok(combined)
    }
}

impl FileExtractor for DocumentExtractor {
    fn extract(&self, file: &SourceFile) -> Result<ExtractedContent> {
        let kind = file.kind()?;
        debug!("Extracting {} as {:?} ({} bytes)", file.name, kind, file.bytes.len());

        let mut content = match kind {
            FileKind::Pdf => self.pdf.extract(file)?,
            FileKind::Image => self.image.extract(file)?,
            FileKind::Word => self.docx.extract(file)?,
            FileKind::Spreadsheet => self.spreadsheet.extract(file)?,
            FileKind::Text => self.text.extract(file)?,
        };

        if self.max_text_length > 0 {
            content.text = content.text.map(|text| {
                let kept = truncate_text(&text, self.max_text_length);
                if kept.len() < text.len() {
                    warn!(
                        "{} truncated to {} bytes, {} bytes dropped",
                        file.name,
                        kept.len(),
                        text.len() - kept.len()
                    );
                }
                kept
            });
        }
        Ok(content)
    }
}

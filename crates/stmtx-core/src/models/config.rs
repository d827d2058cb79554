//! Configuration structures for the statement pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the stmtx pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StmtxConfig {
    /// AI service configuration.
    pub ai: AiConfig,

    /// PDF rendering configuration.
    pub pdf: PdfConfig,

    /// File extraction configuration.
    pub extraction: ExtractionConfig,

    /// Result editing configuration.
    pub store: StoreConfig,

    /// Session persistence configuration.
    pub session: SessionConfig,
}

/// AI service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum tokens in a model reply.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Image detail hint sent with page images ("low", "high", "auto").
    pub image_detail: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 180,
            max_tokens: 16_000,
            temperature: 0.0,
            image_detail: "high".to_string(),
        }
    }
}

/// PDF rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Scale applied to page images before OCR.
    pub render_scale: f32,

    /// Longest side of a rendered page image, in pixels.
    pub max_image_dimension: u32,

    /// Maximum pages to render (0 = unlimited).
    pub max_pages: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            max_image_dimension: 4096,
            max_pages: 0,
        }
    }
}

/// File extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum bytes of text kept per file (0 = unlimited).
    pub max_text_length: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_text_length: 0,
        }
    }
}

/// Result editing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// chrono format string for the date of newly added rows.
    pub date_format: String,

    /// Description given to newly added rows.
    pub placeholder_description: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            date_format: "%d/%m/%Y".to_string(),
            placeholder_description: "New transaction".to_string(),
        }
    }
}

/// Session persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Remember the last file label and raw text between runs.
    pub persist: bool,

    /// Session file location (default: platform data dir).
    pub path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

impl StmtxConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

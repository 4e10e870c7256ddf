use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::gateway::ToolServerSettings;
use crate::resume::models::DocumentMode;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_OUTPUT_DIR: &str = ".cache/markdown2pdf";

/// Application configuration loaded from environment variables.
/// This is the only place the process environment is read; components get
/// their slice of it through their constructors.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub markitdown: ToolServerSettings,
    pub markdown2pdf: ToolServerSettings,
    /// Renderer scratch directory; relative paths resolve against the cwd.
    pub output_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub document_mode: DocumentMode,
    /// Enables the formatter endpoint when present.
    pub anthropic_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Config {
            port: read("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: read("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            markitdown: ToolServerSettings::from_lookup("MARKITDOWN", &lookup),
            markdown2pdf: ToolServerSettings::from_lookup("MARKDOWN2PDF", &lookup),
            output_dir: read("MARKDOWN2PDF_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            max_upload_bytes: read("MARKITDOWN_MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            document_mode: read("RESUME_DOCUMENT_MODE")
                .map(|v| v.parse::<DocumentMode>())
                .transpose()
                .context("RESUME_DOCUMENT_MODE must be 'markdown' or 'structured'")?
                .unwrap_or_default(),
            anthropic_api_key: read("ANTHROPIC_API_KEY"),
        })
    }
}

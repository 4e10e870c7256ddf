//! Bundled PDF text extraction, used when the converter service is unreachable.
//! Only PDFs have a local parser; every other format depends on the remote service.

use anyhow::{Context, Result};
use bytes::Bytes;

pub fn is_pdf(file_name: &str, content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"))
        || file_name.to_ascii_lowercase().ends_with(".pdf")
}

/// Extracts the PDF's text off the async runtime and tidies it into markdown paragraphs.
pub async fn extract_markdown(data: Bytes) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await
        .context("PDF extraction task panicked")?
        .context("Failed to extract text from PDF")?;
    Ok(text_to_markdown(&text))
}

/// Trims each line and collapses runs of blank lines into one paragraph break.
fn text_to_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank_run = 0;
    }
    out
}

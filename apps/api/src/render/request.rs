use serde::{Deserialize, Serialize};
use uuid::Uuid;

const WATERMARK_MAX_CHARS: usize = 15;
const FILE_NAME_MAX_CHARS: usize = 120;
const UNSAFE_FILENAME_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    Letter,
    A4,
    A3,
    A5,
    Legal,
    Tabloid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Margin {
    Narrow,
    #[default]
    Normal,
    Wide,
}

impl Margin {
    /// Border spacing handed to the renderer.
    pub fn border(self) -> &'static str {
        match self {
            Margin::Narrow => "12mm",
            Margin::Normal => "20mm",
            Margin::Wide => "25mm",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkScope {
    AllPages,
    FirstPage,
}

/// Body of `POST /api/resume-pdf`. Everything but `markdown` is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub markdown: String,
    #[serde(default)]
    pub page_size: Option<PageSize>,
    #[serde(default)]
    pub margin: Option<Margin>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub show_page_numbers: Option<bool>,
    #[serde(default)]
    pub watermark: Option<String>,
    #[serde(default)]
    pub watermark_scope: Option<WatermarkScope>,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl RenderRequest {
    /// Checks the caller-facing constraints and normalizes the watermark and
    /// filename in place. All problems are reported together, `; `-separated.
    pub fn validated(mut self) -> Result<Self, String> {
        let mut issues = Vec::new();

        if self.markdown.trim().is_empty() {
            issues.push("Provide the resume markdown to convert to PDF.".to_string());
        }

        self.watermark = self
            .watermark
            .take()
            .map(|w| w.trim().to_uppercase())
            .filter(|w| !w.is_empty());
        if let Some(watermark) = &self.watermark {
            if watermark.chars().count() > WATERMARK_MAX_CHARS {
                issues.push(format!(
                    "Watermark must be at most {WATERMARK_MAX_CHARS} characters."
                ));
            }
            if !watermark
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' ' || c == '-')
            {
                issues.push(
                    "Watermark may only include uppercase letters, digits, spaces, or dashes."
                        .to_string(),
                );
            }
        }

        if let Some(name) = self.file_name.take() {
            let name = name.trim().to_string();
            let len = name.chars().count();
            if len == 0 || len > FILE_NAME_MAX_CHARS {
                issues.push(format!(
                    "File name must be between 1 and {FILE_NAME_MAX_CHARS} characters."
                ));
            }
            self.file_name = Some(name);
        }

        if issues.is_empty() {
            Ok(self)
        } else {
            Err(issues.join("; "))
        }
    }

    pub fn normalize(&self) -> NormalizedOptions {
        NormalizedOptions {
            page_size: self.page_size.unwrap_or_default(),
            margin: self.margin.unwrap_or_default(),
            orientation: self.orientation.unwrap_or_default(),
            show_page_numbers: self.show_page_numbers.unwrap_or(false),
            watermark: self
                .watermark
                .as_deref()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string),
            watermark_scope: self.watermark_scope,
            file_name: self
                .file_name
                .as_deref()
                .map(sanitize_filename)
                .unwrap_or_else(generate_default_filename),
        }
    }
}

/// A request with every default filled in and a safe `.pdf` filename.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOptions {
    pub page_size: PageSize,
    pub margin: Margin,
    pub orientation: Orientation,
    pub show_page_numbers: bool,
    pub watermark: Option<String>,
    pub watermark_scope: Option<WatermarkScope>,
    pub file_name: String,
}

impl NormalizedOptions {
    pub fn layout(&self) -> RenderLayout {
        RenderLayout {
            page_size: self.page_size,
            margin: self.margin,
            orientation: self.orientation,
            show_page_numbers: self.show_page_numbers,
            watermark: self.watermark.clone(),
            watermark_scope: self.watermark_scope,
        }
    }
}

/// Layout echoed back with a rendered PDF.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderLayout {
    pub page_size: PageSize,
    pub margin: Margin,
    pub orientation: Orientation,
    pub show_page_numbers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_scope: Option<WatermarkScope>,
}

pub fn sanitize_filename(candidate: &str) -> String {
    let base: String = candidate
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    let base = base.trim();
    if base.is_empty() {
        return generate_default_filename();
    }
    if base.to_lowercase().ends_with(".pdf") {
        base.to_string()
    } else {
        format!("{base}.pdf")
    }
}

pub fn generate_default_filename() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("resume-{}.pdf", &id[..8])
}

/// `.md` name for the fallback download, derived from the PDF name.
pub fn ensure_markdown_extension(candidate: &str) -> String {
    let stem = strip_suffix_ignore_case(candidate, ".pdf").trim();
    if stem.is_empty() {
        return "resume.md".to_string();
    }
    if strip_suffix_ignore_case(stem, ".md").len() < stem.len() {
        stem.to_string()
    } else {
        format!("{stem}.md")
    }
}

fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> &'a str {
    let Some(split) = text.len().checked_sub(suffix.len()) else {
        return text;
    };
    match text.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(suffix) => &text[..split],
        _ => text,
    }
}

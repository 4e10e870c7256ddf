//! Rendering Gateway: markdown to PDF through the Markdown2PDF MCP server.
//!
//! `render` never fails. Any problem on the remote path (connection, missing
//! tool, unparseable log, file I/O) turns into a markdown download carrying
//! the original text, so the user always gets a usable artifact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gateway::normalize;
use crate::gateway::resolver::Launcher;
use crate::gateway::{
    Connector, GatewayClient, GatewayError, OutputDir, ServiceProfile, ToolServerSettings,
};
use crate::render::request::{
    ensure_markdown_extension, NormalizedOptions, RenderLayout, RenderRequest,
};

pub const RENDER_TOOL_ID: &str = "create_pdf_from_markdown";

pub static MARKDOWN2PDF: ServiceProfile = ServiceProfile {
    name: "markdown2pdf",
    env_prefix: "MARKDOWN2PDF",
    default_url: "http://127.0.0.1:3002/mcp",
    launcher: Some(Launcher {
        interpreter: "node",
        script: "scripts/start-markdown2pdf-mcp.mjs",
    }),
    fallback_command: "npx",
    fallback_args: &["-y", "markdown2pdf-mcp"],
    output_dir_env: Some("M2P_OUTPUT_DIR"),
};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const MARKDOWN_CONTENT_TYPE: &str = "text/markdown";

fn created_line() -> &'static Regex {
    static CREATED: OnceLock<Regex> = OnceLock::new();
    CREATED.get_or_init(|| {
        Regex::new(r"(?im)PDF file created successfully at:\s*(.+)$").expect("regex compile")
    })
}

/// Exactly one of these is returned per render.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RenderResult {
    Pdf(PdfArtifact),
    MarkdownDownload(MarkdownFallback),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfArtifact {
    #[serde(rename = "pdfBase64", serialize_with = "as_base64")]
    pub pdf: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
    pub byte_length: usize,
    pub layout: RenderLayout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownFallback {
    pub markdown: String,
    pub file_name: String,
    pub content_type: &'static str,
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MarkdownFallback {
    fn new(markdown: &str, pdf_file_name: &str, reason: String) -> Self {
        Self {
            markdown: markdown.to_string(),
            file_name: ensure_markdown_extension(pdf_file_name),
            content_type: MARKDOWN_CONTENT_TYPE,
            byte_length: markdown.len(),
            reason: Some(reason).filter(|r| !r.is_empty()),
        }
    }
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub struct RenderingGateway {
    client: GatewayClient,
    output_dir: Arc<OutputDir>,
}

impl RenderingGateway {
    pub fn new(
        settings: ToolServerSettings,
        output_dir: Arc<OutputDir>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            client: GatewayClient::new(
                &MARKDOWN2PDF,
                settings,
                RENDER_TOOL_ID,
                connector,
                Some(Arc::clone(&output_dir)),
            ),
            output_dir,
        }
    }

    /// Renders `request` to a PDF, or hands back its markdown when that fails.
    pub async fn render(&self, request: &RenderRequest) -> RenderResult {
        let options = request.normalize();

        match self.render_remote(request, &options).await {
            Ok(artifact) => {
                info!(
                    "Rendered '{}' ({} bytes)",
                    artifact.file_name, artifact.byte_length
                );
                RenderResult::Pdf(artifact)
            }
            Err(e) => {
                if e.is_configuration() {
                    error!("PDF rendering is misconfigured; returning markdown download: {e}");
                } else {
                    warn!("Remote conversion failed; returning markdown download. Reason: {e}");
                }
                RenderResult::MarkdownDownload(MarkdownFallback::new(
                    &request.markdown,
                    &options.file_name,
                    e.to_string(),
                ))
            }
        }
    }

    async fn render_remote(
        &self,
        request: &RenderRequest,
        options: &NormalizedOptions,
    ) -> Result<PdfArtifact, GatewayError> {
        let dir = self.output_dir.ensure().await?;
        // Unique scratch name so concurrent renders of the same file name never collide.
        let scratch = dir.join(format!("{}-{}", Uuid::new_v4().simple(), options.file_name));

        let response = self
            .client
            .call_tool(tool_arguments(&request.markdown, options, &scratch))
            .await?;

        let (log, path, pdf) = match collect_output(dir, &response).await {
            Ok(found) => found,
            Err(e) => {
                // The renderer may still have written the file we asked for.
                discard(&scratch).await;
                return Err(e);
            }
        };
        discard(&path).await;

        Ok(PdfArtifact {
            byte_length: pdf.len(),
            pdf,
            file_name: options.file_name.clone(),
            content_type: PDF_CONTENT_TYPE,
            layout: options.layout(),
            log: Some(log),
        })
    }
}

fn tool_arguments(markdown: &str, options: &NormalizedOptions, output: &Path) -> Value {
    let mut args = Map::new();
    args.insert("markdown".into(), Value::from(markdown));
    args.insert(
        "outputFilename".into(),
        Value::from(output.to_string_lossy().into_owned()),
    );
    args.insert("paperFormat".into(), enum_value(options.page_size));
    args.insert("paperOrientation".into(), enum_value(options.orientation));
    args.insert("paperBorder".into(), Value::from(options.margin.border()));
    args.insert("showPageNumbers".into(), Value::from(options.show_page_numbers));
    if let Some(watermark) = &options.watermark {
        args.insert("watermark".into(), Value::from(watermark.as_str()));
        if let Some(scope) = options.watermark_scope {
            args.insert("watermarkScope".into(), enum_value(scope));
        }
    }
    Value::Object(args)
}

fn enum_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Path from the last "created successfully" line of the renderer log.
fn reported_path(log: &str) -> Option<&str> {
    created_line()
        .captures_iter(log)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|p| !p.is_empty())
        .last()
}

/// Log text, canonical PDF path and PDF bytes from a renderer answer.
async fn collect_output(
    dir: &Path,
    response: &Value,
) -> Result<(String, PathBuf, Vec<u8>), GatewayError> {
    let log = normalize::extract_text(response)?;
    let reported = reported_path(&log).ok_or(GatewayError::RenderOutputNotFound)?;
    let path = contained_path(dir, reported).await?;
    let pdf = tokio::fs::read(&path).await?;
    Ok((log, path, pdf))
}

/// Canonical form of `reported`, refused unless it lies inside `dir`.
///
/// `dir` must already be canonical (see `OutputDir::ensure`).
async fn contained_path(dir: &Path, reported: &str) -> Result<PathBuf, GatewayError> {
    let candidate = Path::new(reported);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        dir.join(candidate)
    };

    let resolved = tokio::fs::canonicalize(&joined).await.map_err(|e| {
        GatewayError::MalformedResponse(format!(
            "renderer reported '{reported}', which cannot be opened: {e}"
        ))
    })?;
    if !resolved.starts_with(dir) {
        return Err(GatewayError::MalformedResponse(format!(
            "renderer reported '{reported}', which is outside the output directory"
        )));
    }
    Ok(resolved)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Unable to remove generated PDF '{}': {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::gateway::client::testing::{text_result, MockConnector};
    use crate::render::request::{Margin, Orientation, PageSize};

    fn request(value: Value) -> RenderRequest {
        serde_json::from_value(value).unwrap()
    }

    fn gateway(dir: &Path, connector: MockConnector) -> RenderingGateway {
        RenderingGateway::new(
            ToolServerSettings::default(),
            Arc::new(OutputDir::new(dir)),
            Arc::new(connector),
        )
    }

    /// A renderer that writes `pdf` to the requested path and logs it.
    fn writing_renderer(pdf: &'static [u8], seen: Arc<Mutex<Option<Value>>>) -> MockConnector {
        MockConnector::new(&["markdown2pdf_create_pdf_from_markdown"], move |args| {
            let target = args["outputFilename"].as_str().unwrap_or_default().to_string();
            std::fs::write(&target, pdf).map_err(GatewayError::Io)?;
            *seen.lock().unwrap() = Some(args.clone());
            Ok(text_result(&format!(
                "Rendering...\nPDF file created successfully at: {target}\n"
            )))
        })
    }

    #[tokio::test]
    async fn test_pdf_roundtrip_through_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let gateway = gateway(dir.path(), writing_renderer(b"%PDF-1.7 fake", Arc::clone(&seen)));

        let result = gateway
            .render(&request(json!({
                "markdown": "# Jane Doe",
                "pageSize": "a4",
                "margin": "wide",
                "orientation": "landscape",
                "showPageNumbers": true,
                "fileName": "jane-cv",
            })))
            .await;

        let RenderResult::Pdf(artifact) = result else {
            panic!("expected a PDF, got {result:?}");
        };
        assert_eq!(artifact.pdf, b"%PDF-1.7 fake");
        assert_eq!(artifact.byte_length, 13);
        assert_eq!(artifact.file_name, "jane-cv.pdf");
        assert_eq!(artifact.layout.page_size, PageSize::A4);
        assert_eq!(artifact.layout.margin, Margin::Wide);
        assert_eq!(artifact.layout.orientation, Orientation::Landscape);
        assert!(artifact.layout.show_page_numbers);
        assert!(artifact.log.unwrap().contains("created successfully"));

        let args = seen.lock().unwrap().clone().unwrap();
        assert_eq!(args["paperFormat"], "a4");
        assert_eq!(args["paperBorder"], "25mm");
        assert_eq!(args["paperOrientation"], "landscape");
        assert_eq!(args["showPageNumbers"], true);
        assert!(args.get("watermark").is_none());

        // Scratch file is gone once the bytes are captured.
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_watermark_scope_only_sent_with_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let gateway = gateway(dir.path(), writing_renderer(b"%PDF", Arc::clone(&seen)));

        gateway
            .render(&request(json!({
                "markdown": "# Jane",
                "watermark": "DRAFT",
                "watermarkScope": "first-page",
            })))
            .await;
        let args = seen.lock().unwrap().clone().unwrap();
        assert_eq!(args["watermark"], "DRAFT");
        assert_eq!(args["watermarkScope"], "first-page");

        gateway
            .render(&request(json!({"markdown": "# Jane", "watermarkScope": "all-pages"})))
            .await;
        let args = seen.lock().unwrap().clone().unwrap();
        assert!(args.get("watermarkScope").is_none());
    }

    #[tokio::test]
    async fn test_outage_falls_back_to_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = gateway(dir.path(), MockConnector::offline());

        let result = gateway
            .render(&request(json!({"markdown": "# Jöhn", "fileName": "cv.pdf"})))
            .await;

        let RenderResult::MarkdownDownload(fallback) = result else {
            panic!("expected fallback, got {result:?}");
        };
        assert_eq!(fallback.markdown, "# Jöhn");
        assert_eq!(fallback.file_name, "cv.md");
        assert_eq!(fallback.content_type, "text/markdown");
        assert_eq!(fallback.byte_length, "# Jöhn".len());
        assert!(fallback.reason.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_missing_log_line_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MockConnector::new(&["create_pdf_from_markdown"], |_| {
            Ok(text_result("Conversion queued"))
        });
        let result = gateway(dir.path(), connector)
            .render(&request(json!({"markdown": "# Jane"})))
            .await;

        match result {
            RenderResult::MarkdownDownload(fallback) => {
                assert!(fallback.reason.unwrap().contains("did not report an output path"));
                assert!(fallback.file_name.starts_with("resume-"));
                assert!(fallback.file_name.ends_with(".md"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_path_outside_output_dir_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let connector = MockConnector::new(&["create_pdf_from_markdown"], |args| {
            let target = args["outputFilename"].as_str().unwrap_or_default();
            std::fs::write(target, b"%PDF").map_err(GatewayError::Io)?;
            Ok(text_result("PDF file created successfully at: /etc/passwd"))
        });
        let result = gateway(dir.path(), connector)
            .render(&request(json!({"markdown": "# Jane"})))
            .await;

        match result {
            RenderResult::MarkdownDownload(fallback) => {
                assert!(fallback.reason.unwrap().contains("outside the output directory"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        // The file written to the requested scratch path is still cleaned up.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_output_dir_with_parent_segments_renders() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("app")).unwrap();
        let dir = root.path().join("app").join("..").join("cache");
        let seen = Arc::new(Mutex::new(None));
        let gateway = gateway(&dir, writing_renderer(b"%PDF-1.7", Arc::clone(&seen)));

        let result = gateway.render(&request(json!({"markdown": "# Jane"}))).await;

        assert!(matches!(result, RenderResult::Pdf(_)), "got {result:?}");
        assert_eq!(std::fs::read_dir(root.path().join("cache")).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_renderer_reporting_through_a_symlink_renders() {
        let root = tempfile::tempdir().unwrap();
        let real = root.path().join("real");
        let link = root.path().join("link");
        std::fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        // Writes where asked but reports the path through the other spelling.
        let report_via = real.clone();
        let connector = MockConnector::new(&["create_pdf_from_markdown"], move |args| {
            let target = PathBuf::from(args["outputFilename"].as_str().unwrap_or_default());
            std::fs::write(&target, b"%PDF-1.7").map_err(GatewayError::Io)?;
            let name = target.file_name().unwrap_or_default();
            Ok(text_result(&format!(
                "PDF file created successfully at: {}",
                report_via.join(name).display()
            )))
        });

        let result = gateway(&link, connector)
            .render(&request(json!({"markdown": "# Jane"})))
            .await;

        let RenderResult::Pdf(artifact) = result else {
            panic!("expected a PDF, got {result:?}");
        };
        assert_eq!(artifact.pdf, b"%PDF-1.7");
        assert_eq!(std::fs::read_dir(&real).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_misconfiguration_still_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ToolServerSettings {
            url: Some("not a url".into()),
            ..ToolServerSettings::default()
        };
        let gateway = RenderingGateway::new(
            settings,
            Arc::new(OutputDir::new(dir.path())),
            Arc::new(MockConnector::new(&["create_pdf_from_markdown"], |_| {
                Ok(Value::Null)
            })),
        );

        let result = gateway.render(&request(json!({"markdown": "# Jane"}))).await;
        match result {
            RenderResult::MarkdownDownload(fallback) => {
                assert!(fallback.reason.unwrap().contains("MARKDOWN2PDF_MCP_URL"));
            }
            other => panic!("expected fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_reported_path_uses_last_match() {
        let log = "pdf file created successfully at: /tmp/a.pdf\nretrying\nPDF file created successfully at:   /tmp/b.pdf  ";
        assert_eq!(reported_path(log), Some("/tmp/b.pdf"));
        assert_eq!(reported_path("nothing here"), None);
    }

    #[tokio::test]
    async fn test_contained_path() {
        let root = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(root.path()).unwrap();
        let dir = root.join("cache");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("x.pdf"), b"%PDF").unwrap();
        std::fs::write(root.join("secret.pdf"), b"%PDF").unwrap();

        let inside = dir.join("x.pdf");
        assert_eq!(
            contained_path(&dir, &inside.to_string_lossy()).await.unwrap(),
            inside
        );
        assert_eq!(contained_path(&dir, "x.pdf").await.unwrap(), inside);

        let escaping = dir.join("..").join("secret.pdf");
        assert!(contained_path(&dir, &escaping.to_string_lossy()).await.is_err());
        assert!(contained_path(&dir, "missing.pdf").await.is_err());
    }

    #[test]
    fn test_result_is_tagged_by_kind() {
        let fallback = RenderResult::MarkdownDownload(MarkdownFallback::new(
            "# Jane",
            "cv.pdf",
            String::new(),
        ));
        let body = serde_json::to_value(&fallback).unwrap();
        assert_eq!(body["kind"], "markdown-download");
        assert_eq!(body["fileName"], "cv.md");
        assert!(body.get("reason").is_none());

        let pdf = RenderResult::Pdf(PdfArtifact {
            pdf: b"hi".to_vec(),
            file_name: "cv.pdf".into(),
            content_type: PDF_CONTENT_TYPE,
            byte_length: 2,
            layout: request(json!({"markdown": "x"})).normalize().layout(),
            log: None,
        });
        let body = serde_json::to_value(&pdf).unwrap();
        assert_eq!(body["kind"], "pdf");
        assert_eq!(body["pdfBase64"], "aGk=");
        assert_eq!(body["contentType"], "application/pdf");
        assert_eq!(body["layout"]["pageSize"], "letter");
    }
}

use std::sync::Arc;

use crate::config::Config;
use crate::convert::ConversionGateway;
use crate::gateway::{Connector, OutputDir};
use crate::llm_client::Completion;
use crate::render::RenderingGateway;
use crate::resume::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub converter: Arc<ConversionGateway>,
    /// Renders PDFs; falls back to markdown downloads on its own.
    pub renderer: Arc<RenderingGateway>,
    pub resume: Arc<ResumeStore>,
    /// Formatter backend. `None` when no API key is configured.
    pub llm: Option<Arc<dyn Completion>>,
}

impl AppState {
    /// Wires both gateways to `connector`. Nothing connects until first use.
    pub fn new(
        config: Config,
        connector: Arc<dyn Connector>,
        llm: Option<Arc<dyn Completion>>,
    ) -> Self {
        let output_dir = Arc::new(OutputDir::new(config.output_dir.clone()));
        Self {
            converter: Arc::new(ConversionGateway::new(
                config.markitdown.clone(),
                Arc::clone(&connector),
            )),
            renderer: Arc::new(RenderingGateway::new(
                config.markdown2pdf.clone(),
                output_dir,
                connector,
            )),
            resume: Arc::new(ResumeStore::new(config.document_mode)),
            llm,
            config,
        }
    }
}

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::info;

use crate::gateway::GatewayError;

/// Process-wide scratch directory for renderer artifacts.
///
/// Created on first use and resolved to its canonical path, so `..` segments
/// and symlinks are gone before anything is compared against it. Concurrent first
/// callers share the same initialisation; a failed attempt leaves the cell
/// empty so the next caller retries.
#[derive(Debug)]
pub struct OutputDir {
    configured: PathBuf,
    resolved: OnceCell<PathBuf>,
}

impl OutputDir {
    pub fn new(configured: impl Into<PathBuf>) -> Self {
        Self {
            configured: configured.into(),
            resolved: OnceCell::new(),
        }
    }

    pub async fn ensure(&self) -> Result<&Path, GatewayError> {
        let path = self
            .resolved
            .get_or_try_init(|| async {
                let absolute = if self.configured.is_absolute() {
                    self.configured.clone()
                } else {
                    std::env::current_dir()?.join(&self.configured)
                };
                tokio::fs::create_dir_all(&absolute).await?;
                let canonical = tokio::fs::canonicalize(&absolute).await?;
                info!("Renderer output directory ready at {}", canonical.display());
                Ok::<_, GatewayError>(canonical)
            })
            .await?;
        Ok(path.as_path())
    }
}

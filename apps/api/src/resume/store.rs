use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::resume::merge::{merge_update, replace_document, MergeOutcome, UpdatePayload};
use crate::resume::models::{DocumentMode, ResumeDocument};

/// Point-in-time view of the shared document.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub document: Arc<ResumeDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Applied,
    Unchanged,
    Rejected,
}

/// What a caller learns about its update. `version` is the version after the attempt.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub outcome: OutcomeKind,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Holds the single canonical resume shared by the agent and the UI.
/// Version and change notification move only when an update is applied.
pub struct ResumeStore {
    current: RwLock<Snapshot>,
    changes: watch::Sender<u64>,
}

impl ResumeStore {
    pub fn new(mode: DocumentMode) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            current: RwLock::new(Snapshot {
                version: 0,
                document: Arc::new(ResumeDocument::initial(mode)),
            }),
            changes,
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.current.read().await.clone()
    }

    /// Receives the new version after every applied update.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Merges a partial agent update.
    pub async fn apply(&self, payload: UpdatePayload) -> UpdateReport {
        self.commit(|doc| merge_update(doc, payload)).await
    }

    /// Replaces the whole document from a direct edit.
    pub async fn replace(&self, document: Value) -> UpdateReport {
        self.commit(|doc| replace_document(doc, document)).await
    }

    async fn commit(&self, merge: impl FnOnce(&ResumeDocument) -> MergeOutcome) -> UpdateReport {
        let mut current = self.current.write().await;

        match merge(&current.document) {
            MergeOutcome::Applied(next) => {
                current.version += 1;
                current.document = Arc::new(next);
                self.changes.send_replace(current.version);
                info!(
                    "Resume ({:?}) updated to version {}",
                    current.document.mode(),
                    current.version
                );
                UpdateReport {
                    outcome: OutcomeKind::Applied,
                    version: current.version,
                    reason: None,
                }
            }
            MergeOutcome::Unchanged => {
                debug!("Resume update was a no-op at version {}", current.version);
                UpdateReport {
                    outcome: OutcomeKind::Unchanged,
                    version: current.version,
                    reason: None,
                }
            }
            MergeOutcome::Rejected(reason) => {
                warn!("Rejected resume update: {reason}");
                UpdateReport {
                    outcome: OutcomeKind::Rejected,
                    version: current.version,
                    reason: Some(reason),
                }
            }
        }
    }
}

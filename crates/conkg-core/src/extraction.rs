use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::ExtractionResult;
use crate::error::Result;

/// A loaded text document handed to extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Id of the Document entity this text belongs to.
    pub document_id: String,
    pub project_id: Option<String>,
    pub path: String,
    pub title: Option<String>,
    pub content: String,
    pub loaded_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl SourceDocument {
    pub fn new(
        document_id: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            project_id: None,
            path: path.into(),
            title: None,
            content: content.into(),
            loaded_at: Utc::now(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_project(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }
}

#[async_trait]
pub trait ExtractionPipeline: Send + Sync {
    async fn extract(&self, document: &SourceDocument) -> Result<ExtractionResult>;
    async fn extract_batch(&self, documents: &[SourceDocument]) -> Result<Vec<ExtractionResult>>;
}

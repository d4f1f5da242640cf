use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    ProjectInfo,
    People,
    Documents,
    Issues,
    Materials,
    Schedule,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::ProjectInfo => "project_info",
            QueryIntent::People => "people",
            QueryIntent::Documents => "documents",
            QueryIntent::Issues => "issues",
            QueryIntent::Materials => "materials",
            QueryIntent::Schedule => "schedule",
            QueryIntent::General => "general",
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    Hybrid,
    GraphOnly,
    VectorOnly,
}

impl RetrievalMode {
    pub fn uses_graph(&self) -> bool {
        !matches!(self, RetrievalMode::VectorOnly)
    }

    pub fn uses_vector(&self) -> bool {
        !matches!(self, RetrievalMode::GraphOnly)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaQuery {
    pub question: String,
    /// Restrict retrieval to one project (id or name).
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub mode: RetrievalMode,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QaQuery {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            project: None,
            mode: RetrievalMode::Hybrid,
            top_k: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalStep {
    pub description: String,
    pub query: Option<String>,
    pub result_summary: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Graph,
    Vector,
    Both,
}

/// One piece of fused evidence behind an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Entity id, or the document id for vector passages.
    pub key: String,
    pub kind: SourceKind,
    pub label: String,
    pub score: f64,
    pub graph_rank: Option<usize>,
    pub vector_rank: Option<usize>,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResponse {
    pub answer: String,
    pub intent: QueryIntent,
    pub confidence: f64,
    pub entities: Vec<Entity>,
    pub sources: Vec<Source>,
    pub steps: Vec<RetrievalStep>,
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait QaEngine: Send + Sync {
    async fn ask(&self, query: &QaQuery) -> Result<QaResponse>;
    fn sample_questions(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_from_json() {
        let q: QaQuery = serde_json::from_str(r#"{"question": "Who is the PM?"}"#).unwrap();
        assert_eq!(q.mode, RetrievalMode::Hybrid);
        assert!(q.project.is_none());

        let q: QaQuery =
            serde_json::from_str(r#"{"question": "x", "mode": "graph_only", "top_k": 3}"#).unwrap();
        assert_eq!(q.mode, RetrievalMode::GraphOnly);
        assert!(!q.mode.uses_vector());
        assert_eq!(q.top_k, Some(3));
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use conkg_core::entity::{Entity, EntityType};
use conkg_core::error::{ConkgError, Result};
use conkg_core::graph::GraphStore;
use conkg_core::qa::{QaEngine, QaQuery, QaResponse, QueryIntent, RetrievalStep, SourceKind};
use conkg_core::vector::{ChunkHit, Embedder, VectorFilter, VectorStore};
use conkg_core::AppConfig;

use crate::answer::{self, Passage, MAX_PASSAGES, SAMPLE_QUESTIONS};
use crate::fusion::{fuse, FusionWeights};
use crate::intent::{analyze, QuestionAnalysis};
use crate::recipes::{GraphItem, GraphRecipes, GraphRetrieval};

const MAX_TOP_K: usize = 50;

/// Answers questions from graph recipes and vector passages, fused by rank.
pub struct HybridQaEngine {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    min_vector_score: f32,
    weights: FusionWeights,
}

impl HybridQaEngine {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: &AppConfig,
    ) -> Self {
        Self {
            graph,
            vector,
            embedder,
            top_k: config.qa_top_k.clamp(1, MAX_TOP_K),
            min_vector_score: config.qa_min_vector_score,
            weights: FusionWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Find a project by id, exact name or alias.
    async fn resolve_project(&self, project: &str) -> Result<Entity> {
        let project = project.trim();
        if let Some(entity) = self.graph.get_entity(project).await? {
            if entity.entity_type == EntityType::Project {
                return Ok(entity);
            }
        }
        let hits = self
            .graph
            .search_entities(project, &[EntityType::Project], 5)
            .await?;
        hits.iter()
            .find(|h| h.entity.is_called(project))
            .or_else(|| hits.iter().find(|h| h.score >= 0.8))
            .map(|h| h.entity.clone())
            .ok_or_else(|| ConkgError::NotFound(format!("project '{project}'")))
    }

    async fn graph_side(
        &self,
        analysis: &QuestionAnalysis,
        project: Option<&Entity>,
        limit: usize,
    ) -> Result<GraphRetrieval> {
        let mut recipes = GraphRecipes::new(self.graph.as_ref(), limit);
        if let Some(p) = project {
            recipes = recipes.scoped_to(&p.id).await?;
        }
        recipes.run(analysis).await
    }

    async fn vector_side(
        &self,
        question: &str,
        project: Option<&Entity>,
        limit: usize,
    ) -> Result<Vec<ChunkHit>> {
        let embedding = self.embedder.embed(question).await?;
        let filter = project.map_or_else(VectorFilter::default, |p| VectorFilter::project(p.id.clone()));
        let mut hits = self.vector.search(&embedding, limit, &filter).await?;
        let found = hits.len();
        hits.retain(|h| h.score > self.min_vector_score);
        if hits.len() < found {
            debug!(
                dropped = found - hits.len(),
                min_score = self.min_vector_score,
                "Dropped weak passages"
            );
        }
        Ok(hits)
    }

    /// Display names for documents only the vector side found.
    async fn document_labels(&self, hits: &[ChunkHit]) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        for hit in hits {
            let doc = &hit.chunk.document_id;
            if labels.contains_key(doc) {
                continue;
            }
            let label = match self.graph.get_entity(doc).await {
                Ok(Some(entity)) => entity.name,
                Ok(None) => doc.clone(),
                Err(e) => {
                    debug!(document_id = %doc, error = %e, "could not label passage");
                    doc.clone()
                }
            };
            labels.insert(doc.clone(), label);
        }
        labels
    }
}

#[async_trait]
impl QaEngine for HybridQaEngine {
    #[instrument(skip(self), fields(question = %query.question))]
    async fn ask(&self, query: &QaQuery) -> Result<QaResponse> {
        let question = query.question.trim();
        if question.is_empty() {
            return Err(ConkgError::Validation("question must not be empty".into()));
        }
        let top_k = query.top_k.unwrap_or(self.top_k).clamp(1, MAX_TOP_K);
        let analysis = analyze(question);
        info!(intent = %analysis.intent, mode = ?query.mode, top_k, "answering question");

        let mut steps = vec![RetrievalStep {
            description: "Classified question".to_string(),
            query: None,
            result_summary: format!(
                "Intent {}; roles [{}]; kinds [{}]",
                analysis.intent,
                analysis.roles.join(", "),
                analysis.document_kinds.join(", ")
            ),
        }];

        let project = match query.project.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(p) => {
                let entity = self.resolve_project(p).await?;
                steps.push(RetrievalStep {
                    description: "Scoped to project".to_string(),
                    query: Some(p.to_string()),
                    result_summary: entity.id.clone(),
                });
                Some(entity)
            }
            None => None,
        };

        // ------------------------------------------------------------
        // Graph and vector retrieval, each allowed to fail alone
        // ------------------------------------------------------------
        let (graph_result, vector_result) = tokio::join!(
            async {
                if query.mode.uses_graph() {
                    Some(self.graph_side(&analysis, project.as_ref(), top_k).await)
                } else {
                    None
                }
            },
            async {
                if query.mode.uses_vector() {
                    Some(self.vector_side(question, project.as_ref(), top_k).await)
                } else {
                    None
                }
            }
        );

        let mut failures = Vec::new();
        let mut items: Vec<GraphItem> = Vec::new();
        match graph_result {
            Some(Ok(retrieval)) => {
                steps.extend(retrieval.steps);
                items = retrieval.items;
            }
            Some(Err(e)) => {
                warn!(error = %e, "graph retrieval failed; continuing without it");
                steps.push(RetrievalStep {
                    description: "Graph retrieval failed".to_string(),
                    query: None,
                    result_summary: e.to_string(),
                });
                failures.push(e);
            }
            None => {}
        }

        let mut hits: Vec<ChunkHit> = Vec::new();
        match vector_result {
            Some(Ok(found)) => {
                steps.push(RetrievalStep {
                    description: "Vector search over document chunks".to_string(),
                    query: Some(format!("top {top_k} via {}", self.embedder.name())),
                    result_summary: match found.first() {
                        Some(best) => format!("Found {} passages, best score {:.3}", found.len(), best.score),
                        None => "No passages".to_string(),
                    },
                });
                hits = found;
            }
            Some(Err(e)) => {
                warn!(error = %e, "vector retrieval failed; continuing without it");
                steps.push(RetrievalStep {
                    description: "Vector retrieval failed".to_string(),
                    query: None,
                    result_summary: e.to_string(),
                });
                failures.push(e);
            }
            None => {}
        }

        let attempted = usize::from(query.mode.uses_graph()) + usize::from(query.mode.uses_vector());
        if failures.len() == attempted {
            let reasons: Vec<String> = failures.iter().map(|e| e.to_string()).collect();
            return Err(ConkgError::Qa(format!("all retrieval failed: {}", reasons.join("; "))));
        }

        // ------------------------------------------------------------
        // Fusion
        // ------------------------------------------------------------
        let graph_entities: Vec<Entity> = items.iter().map(|i| i.entity.clone()).collect();
        let mut sources = fuse(&graph_entities, &hits, self.weights);
        let labels = self.document_labels(&hits).await;
        for source in sources.iter_mut().filter(|s| s.kind == SourceKind::Vector) {
            if let Some(label) = labels.get(&source.key) {
                source.label = label.clone();
            }
        }
        steps.push(RetrievalStep {
            description: "Fused graph and vector evidence".to_string(),
            query: Some(format!(
                "reciprocal rank, weights graph {} vector {}",
                self.weights.graph, self.weights.vector
            )),
            result_summary: format!("{} sources", sources.len()),
        });

        let position: HashMap<&str, usize> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.key.as_str(), i))
            .collect();
        if matches!(analysis.intent, QueryIntent::Documents | QueryIntent::General) {
            items.sort_by_key(|i| position.get(i.entity.id.as_str()).copied().unwrap_or(usize::MAX));
        }
        let mut entities = graph_entities;
        entities.sort_by_key(|e| position.get(e.id.as_str()).copied().unwrap_or(usize::MAX));

        let passages: Vec<Passage> = hits
            .iter()
            .take(MAX_PASSAGES)
            .map(|h| Passage {
                label: labels
                    .get(&h.chunk.document_id)
                    .cloned()
                    .unwrap_or_else(|| h.chunk.document_id.clone()),
                text: h.chunk.text.clone(),
            })
            .collect();

        let best_vector = hits.iter().map(|h| h.score).reduce(f32::max);
        let found_anything = !items.is_empty() || !hits.is_empty();
        let response = QaResponse {
            answer: answer::compose(analysis.intent, &items, &passages),
            intent: analysis.intent,
            confidence: answer::confidence(!items.is_empty(), best_vector),
            suggestions: answer::suggestions(
                analysis.intent,
                items.first().map(|i| &i.entity),
                found_anything,
            ),
            entities,
            sources: sources.into_iter().take(top_k).collect(),
            steps,
        };

        info!(
            intent = %response.intent,
            confidence = response.confidence,
            entities = response.entities.len(),
            sources = response.sources.len(),
            "answer ready"
        );
        Ok(response)
    }

    fn sample_questions(&self) -> Vec<String> {
        SAMPLE_QUESTIONS.iter().map(|q| q.to_string()).collect()
    }
}

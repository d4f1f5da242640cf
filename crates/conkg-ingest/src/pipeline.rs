use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use conkg_core::config::AppConfig;
use conkg_core::entity::{derive_id, Entity, EntityType, ExtractionResult, RelationType, Relationship};
use conkg_core::error::{ConkgError, Result};
use conkg_core::extraction::{ExtractionPipeline, SourceDocument};
use conkg_core::graph::{GraphStore, StoreSummary};
use conkg_core::vector::{EmbeddedChunk, Embedder, VectorStore};
use conkg_extraction::{
    parse_records, parse_records_value, validate, Gazetteer, PatternExtractor, ValidationReport, GAZETTEER_TYPES,
};

use crate::chunker::Chunker;
use crate::inventory::{describe_file, scan_directory, FileRecord, ScanOptions};
use crate::loader::{is_supported, load_text};
use crate::seed::sample_project;

const SOURCE: &str = "ingest";
const GAZETTEER_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Project id or name the ingested documents belong to.
    pub project_id: Option<String>,
    #[serde(default)]
    pub include_hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub root: String,
    pub project_id: Option<String>,
    pub files_seen: u64,
    pub files_ingested: u64,
    pub files_skipped: u64,
    pub chunks_stored: u64,
    pub store: StoreSummary,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of storing an extraction batch plus indexing its document contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub entities: u64,
    pub relationships: u64,
    pub chunks_stored: u64,
    pub summary: StoreSummary,
}

enum FileOutcome {
    Ingested { summary: StoreSummary, chunks: u64 },
    Skipped,
}

struct FileJob {
    record: FileRecord,
    relative: String,
    folder: String,
    project_id: Option<String>,
}

/// Drives files and record batches through extraction into both stores.
#[derive(Clone)]
pub struct IngestPipeline {
    graph: Arc<dyn GraphStore>,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    embed_batch_size: usize,
    concurrency: usize,
}

impl IngestPipeline {
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
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap),
            embed_batch_size: config.embed_batch_size.max(1),
            concurrency: config.ingest_concurrency.max(1),
        }
    }

    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    async fn prepare(&self) -> Result<()> {
        self.graph.ensure_schema().await?;
        self.vector.ensure_collection(self.embedder.dimension()).await
    }

    async fn gazetteer(&self) -> Result<Gazetteer> {
        let mut gazetteer = Gazetteer::new();
        for t in GAZETTEER_TYPES {
            for e in self.graph.entities_by_type(t, GAZETTEER_LIMIT).await? {
                gazetteer.add(&e);
            }
        }
        debug!(names = gazetteer.len(), "Gazetteer built");
        Ok(gazetteer)
    }

    /// Existing project matching `project` by id, name or alias; created when unknown.
    async fn resolve_project(&self, project: &str) -> Result<String> {
        if let Some(e) = self.graph.get_entity(project).await? {
            if e.entity_type == EntityType::Project {
                return Ok(e.id);
            }
        }
        let hits = self.graph.search_entities(project, &[EntityType::Project], 5).await?;
        if let Some(hit) = hits.into_iter().find(|m| m.entity.is_called(project)) {
            return Ok(hit.entity.id);
        }

        let name = project.strip_prefix("project:").unwrap_or(project);
        let entity = Entity::keyed(EntityType::Project, name, SOURCE);
        info!(project_id = %entity.id, "Creating project for ingestion");
        let id = entity.id.clone();
        let mut result = ExtractionResult::new(SOURCE);
        result.push_entity(entity);
        self.graph.store_extraction(&result).await?;
        Ok(id)
    }

    /// Inventory, load, extract, store and index every supported file under `path`.
    pub async fn ingest_path(&self, path: &Path, options: &IngestOptions) -> Result<IngestReport> {
        let started_at = Utc::now();
        let (root, records) = if path.is_file() {
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (root, vec![describe_file(path)?])
        } else {
            let scan = ScanOptions {
                include_hidden: options.include_hidden,
            };
            (path.to_path_buf(), scan_directory(path, &scan)?)
        };
        let root_abs = std::path::absolute(&root).unwrap_or(root);

        self.prepare().await?;
        let project_id = match options.project_id.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => Some(self.resolve_project(p).await?),
            _ => None,
        };
        let extractor = PatternExtractor::new(self.gazetteer().await?);

        info!(
            root = %root_abs.display(),
            files = records.len(),
            project_id = ?project_id,
            "Starting ingestion"
        );

        let mut report = IngestReport {
            root: root_abs.to_string_lossy().to_string(),
            project_id: project_id.clone(),
            files_seen: records.len() as u64,
            files_ingested: 0,
            files_skipped: 0,
            chunks_stored: 0,
            store: StoreSummary::default(),
            errors: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        let mut join_set = JoinSet::new();
        for record in records {
            if !is_supported(record.path()) {
                debug!(path = %record.full_path, "Skipping unsupported file type");
                report.files_skipped += 1;
                continue;
            }
            let job = FileJob {
                relative: relative_path(&root_abs, record.path()),
                folder: folder_name(&root_abs, record.path()),
                record,
                project_id: project_id.clone(),
            };
            let pipeline = self.clone();
            let extractor = extractor.clone();
            join_set.spawn(async move {
                let path = job.record.full_path.clone();
                (path, pipeline.ingest_file(&extractor, job).await)
            });
            if join_set.len() >= self.concurrency {
                if let Some(joined) = join_set.join_next().await {
                    Self::collect(&mut report, joined);
                }
            }
        }
        while let Some(joined) = join_set.join_next().await {
            Self::collect(&mut report, joined);
        }

        report.finished_at = Utc::now();
        if report.files_ingested == 0 && !report.errors.is_empty() {
            return Err(ConkgError::Ingest(format!(
                "All {} files failed: {}",
                report.errors.len(),
                report.errors.join("; ")
            )));
        }

        info!(
            files_ingested = report.files_ingested,
            files_skipped = report.files_skipped,
            chunks = report.chunks_stored,
            errors = report.errors.len(),
            "Ingestion complete"
        );
        Ok(report)
    }

    fn collect(
        report: &mut IngestReport,
        joined: std::result::Result<(String, Result<FileOutcome>), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((_, Ok(FileOutcome::Ingested { summary, chunks }))) => {
                report.files_ingested += 1;
                report.chunks_stored += chunks;
                report.store.absorb(summary);
            }
            Ok((_, Ok(FileOutcome::Skipped))) => report.files_skipped += 1,
            Ok((path, Err(e))) => {
                error!(path = %path, error = %e, "Failed to ingest file");
                report.errors.push(format!("{}: {}", path, e));
            }
            Err(join_err) => {
                error!(error = %join_err, "Ingestion task panicked");
                report.errors.push(format!("Task join error: {join_err}"));
            }
        }
    }

    async fn ingest_file(&self, extractor: &PatternExtractor, job: FileJob) -> Result<FileOutcome> {
        let content = match load_text(job.record.path()) {
            Ok(c) => c,
            Err(ConkgError::Unsupported(msg)) => {
                debug!(reason = %msg, "Skipping file");
                return Ok(FileOutcome::Skipped);
            }
            Err(e) => return Err(e),
        };
        if content.trim().is_empty() {
            debug!(path = %job.record.full_path, "Skipping empty file");
            return Ok(FileOutcome::Skipped);
        }

        let document_id = document_id(&job.relative);
        let mut result = ExtractionResult::new(job.record.full_path.clone());
        let document = Entity::new(EntityType::Document, document_id.clone(), job.record.filename.clone(), SOURCE)
            .with_property("filename", job.record.filename.clone())
            .with_property("file_path", job.relative.clone())
            .with_property("file_type", job.record.file_type.clone())
            .with_property("size", job.record.size_bytes)
            .with_property("created_date", job.record.created_date.clone())
            .with_property("modified_date", job.record.modified_date.clone());
        result.push_entity(document);

        let folder = Entity::keyed(EntityType::Folder, job.folder.clone(), SOURCE)
            .with_property("path", job.folder.clone());
        result.push_relationship(Relationship::new(
            folder.id.clone(),
            document_id.clone(),
            RelationType::Contains,
            SOURCE,
        ));
        result.push_entity(folder);
        if let Some(project_id) = &job.project_id {
            result.push_relationship(Relationship::new(
                document_id.clone(),
                project_id.clone(),
                RelationType::BelongsToProject,
                SOURCE,
            ));
        }

        let mut source = SourceDocument::new(document_id.clone(), job.relative.clone(), content)
            .with_project(job.project_id.clone());
        source.title = Some(job.record.filename.clone());
        result.extend(extractor.extract(&source).await?);

        let summary = self.graph.store_extraction(&result).await?;
        let chunks = self
            .index_text(&document_id, job.project_id.as_deref(), &source.content)
            .await?;
        debug!(
            document_id = %document_id,
            entities = summary.entities_stored(),
            chunks,
            "File ingested"
        );
        Ok(FileOutcome::Ingested { summary, chunks })
    }

    /// Replace the chunks of `document_id` with freshly embedded ones.
    async fn index_text(&self, document_id: &str, project_id: Option<&str>, text: &str) -> Result<u64> {
        self.vector.delete_document(document_id).await?;
        let chunks = self.chunker.split(document_id, project_id, text);
        let mut stored = 0u64;
        for batch in chunks.chunks(self.embed_batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(ConkgError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            let embedded: Vec<EmbeddedChunk> = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
                .collect();
            stored += self.vector.upsert(embedded).await? as u64;
        }
        Ok(stored)
    }

    /// Store an extraction batch and index the `content` of the documents the graph accepted.
    pub async fn store_batch(&self, result: &ExtractionResult) -> Result<BatchOutcome> {
        self.prepare().await?;
        let summary = self.graph.store_extraction(result).await?;

        let mut chunks_stored = 0;
        for doc in result.entities.iter().filter(|e| e.entity_type == EntityType::Document) {
            let Some(content) = doc.property_str("content") else {
                continue;
            };
            let accepted = !doc.name.trim().is_empty()
                && matches!(
                    self.graph.get_entity(&doc.id).await?,
                    Some(stored) if stored.entity_type == EntityType::Document
                );
            if !accepted {
                warn!(document_id = %doc.id, "Document was not stored, skipping its content");
                continue;
            }
            let project = result
                .relationships
                .iter()
                .find(|r| r.source_entity_id == doc.id && r.relation_type == RelationType::BelongsToProject)
                .map(|r| r.target_entity_id.as_str());
            chunks_stored += self.index_text(&doc.id, project, content).await?;
        }

        Ok(BatchOutcome {
            entities: summary.entities_stored(),
            relationships: summary.relationships_stored,
            chunks_stored,
            summary,
        })
    }

    /// Point relationship endpoints that name an existing entity at its id.
    /// Ids already in the batch or the graph are left alone; anything still
    /// unknown is left for the store to skip and count.
    async fn resolve_outside_endpoints(&self, result: &mut ExtractionResult) -> Result<()> {
        let batch_ids: HashSet<String> = result.entities.iter().map(|e| e.id.clone()).collect();
        let mut resolved: HashMap<String, String> = HashMap::new();

        for rel in result.relationships.iter_mut() {
            for endpoint in [&mut rel.source_entity_id, &mut rel.target_entity_id] {
                if batch_ids.contains(endpoint.as_str()) {
                    continue;
                }
                let key = endpoint.clone();
                let id = match resolved.get(&key) {
                    Some(id) => id.clone(),
                    None => {
                        let id = if self.graph.get_entity(&key).await?.is_some() {
                            key.clone()
                        } else {
                            self.graph
                                .search_entities(&key, &[], 5)
                                .await?
                                .into_iter()
                                .find(|m| m.entity.is_called(&key))
                                .map_or_else(|| key.clone(), |m| m.entity.id)
                        };
                        if id != key {
                            debug!(endpoint = %key, entity_id = %id, "Resolved endpoint against the graph");
                        }
                        resolved.insert(key, id.clone());
                        id
                    }
                };
                *endpoint = id;
            }
        }
        Ok(())
    }

    pub async fn ingest_records(&self, raw: &str, source: &str) -> Result<BatchOutcome> {
        let mut result = parse_records(raw, source)?;
        self.resolve_outside_endpoints(&mut result).await?;
        info!(
            source,
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            "Storing extraction records"
        );
        self.store_batch(&result).await
    }

    pub async fn ingest_records_value(&self, value: &serde_json::Value, source: &str) -> Result<BatchOutcome> {
        let mut result = parse_records_value(value, source)?;
        self.resolve_outside_endpoints(&mut result).await?;
        self.store_batch(&result).await
    }

    /// Validate a record batch against the graph without writing anything.
    pub async fn check_records(&self, raw: &str, source: &str) -> Result<ValidationReport> {
        let mut result = parse_records(raw, source)?;
        self.resolve_outside_endpoints(&mut result).await?;
        let mut existing = HashMap::new();
        let ids = result
            .entities
            .iter()
            .map(|e| &e.id)
            .chain(result.relationships.iter().flat_map(|r| [&r.source_entity_id, &r.target_entity_id]));
        for id in ids {
            if existing.contains_key(id) {
                continue;
            }
            if let Some(stored) = self.graph.get_entity(id).await? {
                existing.insert(id.clone(), stored.entity_type);
            }
        }
        let report = validate(&result, &existing);
        info!(
            source,
            valid_entities = report.valid_entities,
            valid_relationships = report.valid_relationships,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Checked extraction records"
        );
        Ok(report)
    }

    pub async fn ingest_records_file(&self, path: &Path) -> Result<BatchOutcome> {
        let raw = tokio::fs::read_to_string(path).await?;
        self.ingest_records(&raw, &path.to_string_lossy()).await
    }

    pub async fn seed(&self) -> Result<BatchOutcome> {
        let outcome = self.store_batch(&sample_project()).await?;
        if outcome.summary.entities_skipped > 0 {
            warn!(skipped = outcome.summary.entities_skipped, "Some sample entities were skipped");
        }
        Ok(outcome)
    }
}

/// Document id for a file path relative to the ingest root.
///
/// The slug alone folds case and punctuation, so a digest of the exact path
/// keeps `Site Report.txt` and `site-report.txt` apart.
pub fn document_id(relative: &str) -> String {
    let digest = Sha256::digest(relative.as_bytes());
    format!(
        "{}-{}",
        derive_id(EntityType::Document, relative),
        &hex::encode(digest)[..8]
    )
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()))
        .to_string_lossy()
        .replace('\\', "/")
}

/// Containing folder relative to the root; the root's own name for top-level files.
fn folder_name(root: &Path, path: &Path) -> String {
    let rel = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    if rel.is_empty() {
        root.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "root".to_string())
    } else {
        rel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conkg_graph::InMemoryGraphStore;
    use conkg_vector::{HashingEmbedder, InMemoryVectorStore};

    fn pipeline() -> (IngestPipeline, Arc<InMemoryGraphStore>, Arc<InMemoryVectorStore>) {
        let graph = Arc::new(InMemoryGraphStore::new());
        let vector = Arc::new(InMemoryVectorStore::new());
        let config = AppConfig::from_lookup(|k| match k {
            "CHUNK_SIZE" => Some("120".into()),
            "CHUNK_OVERLAP" => Some("20".into()),
            _ => None,
        });
        let p = IngestPipeline::new(graph.clone(), vector.clone(), Arc::new(HashingEmbedder::new(64)), &config);
        (p, graph, vector)
    }

    #[tokio::test]
    async fn test_ingest_path_stores_documents_and_chunks() {
        let (p, graph, vector) = pipeline();
        p.seed().await.unwrap();
        let seeded_chunks = vector.count().await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("rfis")).unwrap();
        std::fs::write(
            dir.path().join("rfis/rfi-12.txt"),
            "RFI 12 asks about the shaft shown on drawing A-201-3.\nJohn Smith approved CO 7.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("plan.pdf"), "%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   ").unwrap();

        let options = IngestOptions {
            project_id: Some("Microsoft Service Center".into()),
            include_hidden: false,
        };
        let report = p.ingest_path(dir.path(), &options).await.unwrap();
        assert_eq!(report.files_seen, 3);
        assert_eq!(report.files_ingested, 1);
        assert_eq!(report.files_skipped, 2);
        assert!(report.errors.is_empty());
        assert_eq!(report.project_id.as_deref(), Some("project:microsoft-service-center"));

        let doc = graph.get_entity(&document_id("rfis/rfi-12.txt")).await.unwrap().unwrap();
        assert_eq!(doc.property_str("file_type"), Some("txt"));
        assert!(graph.get_entity("issue:rfi-12").await.unwrap().is_some());
        assert!(graph.get_entity("folder:rfis").await.unwrap().is_some());

        let around = graph.get_neighbors(&doc.id, 1).await.unwrap();
        let ids: Vec<_> = around.neighbors.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"project:microsoft-service-center"));
        assert!(ids.contains(&"drawing:a-201-3"));

        let john = graph.get_neighbors("person:john-smith", 1).await.unwrap();
        assert!(john.relationships.iter().any(|r| r.relation_type == RelationType::Approved
            && r.target_entity_id == "change_order:co-7"));

        let after_first = vector.count().await.unwrap();
        assert!(after_first > seeded_chunks);
        p.ingest_path(dir.path(), &options).await.unwrap();
        assert_eq!(vector.count().await.unwrap(), after_first);
    }

    #[tokio::test]
    async fn test_ingest_records_resolves_names() {
        let (p, graph, _) = pipeline();
        let raw = r#"```json
        {
          "people": [{"name": "Ana Ruiz", "role": "Superintendent"}],
          "companies": [{"name": "Ruiz Concrete"}],
          "relationships": [
            {"source": "Ana Ruiz", "target": "Ruiz Concrete", "type": "employed_by"},
            {"source": "Ana Ruiz", "target": "Nobody", "type": "works_for"}
          ]
        }
        ```"#;
        let outcome = p.ingest_records(raw, "test").await.unwrap();
        assert_eq!(outcome.entities, 2);
        assert_eq!(outcome.relationships, 1);
        assert_eq!(outcome.summary.relationships_stored, 1);
        assert_eq!(graph.relationship_count().await.unwrap(), 1);
        assert!(p.ingest_records("not json", "test").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_project_is_created() {
        let (p, graph, _) = pipeline();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("log.md"), "Daily log for Area 3").unwrap();
        let options = IngestOptions {
            project_id: Some("project:harbor-tower".into()),
            include_hidden: false,
        };
        let report = p.ingest_path(dir.path(), &options).await.unwrap();
        assert_eq!(report.project_id.as_deref(), Some("project:harbor-tower"));
        let project = graph.get_entity("project:harbor-tower").await.unwrap().unwrap();
        assert_eq!(project.name, "harbor-tower");
    }

    #[tokio::test]
    async fn test_rejected_document_content_is_not_indexed() {
        let (p, graph, vector) = pipeline();
        p.seed().await.unwrap();
        let chunks_before = vector.count().await.unwrap();

        let raw = r#"{"documents": [
            {"id": "person:john-smith", "name": "Clash", "content": "Should never be searchable."},
            {"name": "Pour log", "content": "Level 2 pour finished at noon."}
        ]}"#;
        let outcome = p.ingest_records(raw, "test").await.unwrap();
        assert_eq!(outcome.summary.entities_skipped, 1);
        assert_eq!(outcome.entities, 1);
        assert_eq!(outcome.chunks_stored, 1);
        assert_eq!(vector.count().await.unwrap(), chunks_before + 1);

        let hits = vector
            .search(&HashingEmbedder::new(64).embed_text("Should never be searchable."), 50, &Default::default())
            .await
            .unwrap();
        assert!(hits.iter().all(|h| h.chunk.document_id != "person:john-smith"));
        let john = graph.get_entity("person:john-smith").await.unwrap().unwrap();
        assert_eq!(john.entity_type, EntityType::Person);
    }

    #[tokio::test]
    async fn test_records_link_to_existing_entities() {
        let (p, graph, _) = pipeline();
        p.seed().await.unwrap();
        let rels_before = graph.relationship_count().await.unwrap();

        let raw = r#"{
            "issues": [{"name": "Roof leak", "status": "open"}],
            "relationships": [
                {"source": "Roof leak", "target": "person:john-smith", "type": "assigned_to"},
                {"source": "Roof leak", "target": "sarah johnson", "type": "assigned_to"},
                {"source": "Roof leak", "target": "Nobody Inparticular", "type": "assigned_to"}
            ]
        }"#;
        let outcome = p.ingest_records(raw, "test").await.unwrap();
        assert_eq!(outcome.summary.relationships_stored, 2);
        assert_eq!(outcome.summary.relationships_skipped, 1);
        assert_eq!(graph.relationship_count().await.unwrap(), rels_before + 2);

        let leak = graph.get_neighbors("issue:roof-leak", 1).await.unwrap();
        let ids: Vec<_> = leak.neighbors.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"person:john-smith"));
        assert!(ids.contains(&"person:sarah-johnson"));
    }

    #[tokio::test]
    async fn test_check_records_does_not_write() {
        let (p, graph, _) = pipeline();
        p.seed().await.unwrap();
        let before = graph.entity_count().await.unwrap();

        let raw = r#"{
            "projects": [{"id": "person:john-smith", "name": "John Smith"}],
            "people": [{"name": "Ana Ruiz"}]
        }"#;
        let report = p.check_records(raw, "test").await.unwrap();
        assert!(!report.is_valid());
        assert_eq!(report.valid_entities, 1);
        assert!(report.errors[0].contains("person:john-smith"));
        assert_eq!(graph.entity_count().await.unwrap(), before);
    }

    #[test]
    fn test_document_ids_keep_similar_names_apart() {
        let a = document_id("Site Report.txt");
        let b = document_id("site-report.txt");
        assert_ne!(a, b);
        assert!(a.starts_with("document:site-report-txt-"));
        assert_eq!(a, document_id("Site Report.txt"));
    }

    #[tokio::test]
    async fn test_colliding_file_names_keep_both_documents() {
        let (p, graph, vector) = pipeline();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Site Report.txt"), "Crane inspection passed on level 4.").unwrap();
        std::fs::write(dir.path().join("site-report.txt"), "Concrete pour delayed by rain.").unwrap();

        let report = p.ingest_path(dir.path(), &IngestOptions::default()).await.unwrap();
        assert_eq!(report.files_ingested, 2);

        let docs = graph.entities_by_type(EntityType::Document, 10).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(vector.count().await.unwrap(), 2);
        for relative in ["Site Report.txt", "site-report.txt"] {
            let doc = graph.get_entity(&document_id(relative)).await.unwrap().unwrap();
            assert_eq!(doc.property_str("file_path"), Some(relative));
        }
    }

    #[test]
    fn test_relative_and_folder_names() {
        let root = Path::new("/data/msc");
        assert_eq!(relative_path(root, Path::new("/data/msc/rfis/rfi-12.txt")), "rfis/rfi-12.txt");
        assert_eq!(folder_name(root, Path::new("/data/msc/rfis/rfi-12.txt")), "rfis");
        assert_eq!(folder_name(root, Path::new("/data/msc/notes.md")), "msc");
        assert_eq!(relative_path(root, Path::new("/elsewhere/x.md")), "x.md");
    }
}

use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use conkg_core::entity::{Entity, EntityType, ExtractionResult, RelationType, Relationship};
use conkg_core::error::{ConkgError, Result};
use conkg_core::extraction::{ExtractionPipeline, SourceDocument};

use crate::gazetteer::{Gazetteer, MIN_SPAN_CHARS};

static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(PCO|RFI|SI|CO)\s*[#-]?\s*(\d+)").expect("valid code pattern")
});
static DRAWING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]-[A-Z0-9]+-\d+\b").expect("valid drawing pattern"));
static PHASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(phase|area|building)\s+(\d+)\b").expect("valid phase pattern")
});
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}[-/.]\d{1,2}[-/.]\d{1,2}\b").expect("valid date pattern"));
static COST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[\d,]+(?:\.\d+)?").expect("valid cost pattern"));

struct SentencePattern {
    regex: Regex,
    relation: RelationType,
}

static SENTENCE_PATTERNS: LazyLock<Vec<SentencePattern>> = LazyLock::new(|| {
    [
        (r"(?im)(.*?)\s+approved\s+(.*?)(?:\.|$)", RelationType::Approved),
        (r"(?im)(.*?)\s+submitted\s+(.*?)(?:\.|$)", RelationType::Submitted),
        (r"(?im)(.*?)\s+responsible\s+for\s+(.*?)(?:\.|$)", RelationType::ResponsibleFor),
        (r"(?im)(.*?)\s+assigned\s+to\s+(.*?)(?:\.|$)", RelationType::AssignedTo),
    ]
    .into_iter()
    .map(|(pattern, relation)| SentencePattern {
        regex: Regex::new(pattern).expect("valid sentence pattern"),
        relation,
    })
    .collect()
});

const REFERENCE_CONFIDENCE: f64 = 0.9;
const SENTENCE_CONFIDENCE: f64 = 0.6;
const CONTEXT_CHARS: usize = 200;

/// Deterministic extractor for construction references and simple relation sentences.
#[derive(Clone, Default)]
pub struct PatternExtractor {
    gazetteer: Arc<Gazetteer>,
}

impl PatternExtractor {
    pub fn new(gazetteer: Gazetteer) -> Self {
        Self {
            gazetteer: Arc::new(gazetteer),
        }
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    fn code_entity(kind: &str, number: &str, source: &str) -> Entity {
        let kind = kind.to_uppercase();
        let name = format!("{kind} {number}");
        match kind.as_str() {
            "RFI" => Entity::keyed(EntityType::Issue, name, source).with_property("kind", "rfi"),
            "SI" => Entity::keyed(EntityType::Document, name, source)
                .with_property("kind", "supplemental_instruction"),
            _ => Entity::keyed(EntityType::ChangeOrder, name, source)
                .with_property("kind", kind.to_lowercase())
                .with_property("number", number.to_string()),
        }
    }

    /// Construction references in `text`, deduplicated.
    pub fn references(text: &str, source: &str) -> Vec<Entity> {
        let mut result = ExtractionResult::new(source);

        for caps in CODE_RE.captures_iter(text) {
            result.push_entity(Self::code_entity(&caps[1], &caps[2], source));
        }
        for m in DRAWING_RE.find_iter(text) {
            result.push_entity(
                Entity::keyed(EntityType::Drawing, m.as_str(), source)
                    .with_property("drawing_number", m.as_str()),
            );
        }
        for caps in PHASE_RE.captures_iter(text) {
            let kind = caps[1].to_lowercase();
            let mut label = kind.clone();
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            let name = format!("{} {}", label, &caps[2]);
            result.push_entity(
                Entity::keyed(EntityType::Phase, name, source)
                    .with_property("kind", kind)
                    .with_property("phase_number", caps[2].to_string()),
            );
        }

        result.entities
    }

    fn document_facts(document: &SourceDocument, source: &str) -> Entity {
        let title = document.title.clone().unwrap_or_else(|| {
            Path::new(&document.path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| document.path.clone())
        });
        let mut doc = Entity::new(EntityType::Document, document.document_id.clone(), title, source);

        let mut dates: Vec<String> = DATE_RE.find_iter(&document.content).map(|m| m.as_str().to_string()).collect();
        dates.sort();
        dates.dedup();
        let mut amounts: Vec<String> = Vec::new();
        let mut total = 0.0;
        for m in COST_RE.find_iter(&document.content) {
            let raw = m.as_str();
            if let Ok(v) = raw.trim_start_matches('$').replace(',', "").parse::<f64>() {
                total += v;
            }
            if !amounts.iter().any(|a| a == raw) {
                amounts.push(raw.to_string());
            }
        }

        if !dates.is_empty() {
            doc.set_property("dates", dates);
        }
        if !amounts.is_empty() {
            doc.set_property("amounts", amounts);
            doc.set_property("total_amount", total);
        }
        doc
    }

    /// Entity named in `span`: the longest match among this document's references
    /// and the known-entity list, references winning ties.
    fn resolve_span<'a>(&'a self, span: &str, local: &'a Gazetteer) -> Option<&'a str> {
        let span = span.trim();
        if span.chars().count() < MIN_SPAN_CHARS {
            return None;
        }
        match (local.resolve_match(span), self.gazetteer.resolve_match(span)) {
            (Some(l), Some(g)) if g.matched_len > l.matched_len => Some(g.entity_id),
            (Some(l), _) => Some(l.entity_id),
            (None, Some(g)) => Some(g.entity_id),
            (None, None) => None,
        }
    }

    fn sentence_relations(&self, text: &str, local: &Gazetteer, source: &str) -> Vec<Relationship> {
        let mut out = Vec::new();
        for pattern in SENTENCE_PATTERNS.iter() {
            for caps in pattern.regex.captures_iter(text) {
                let (Some(subject), Some(object)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let (Some(src), Some(tgt)) = (
                    self.resolve_span(subject.as_str(), local),
                    self.resolve_span(object.as_str(), local),
                ) else {
                    continue;
                };
                if src == tgt {
                    continue;
                }
                let context: String = caps[0].trim().chars().take(CONTEXT_CHARS).collect();
                let mut rel = Relationship::new(src, tgt, pattern.relation, source)
                    .with_confidence(SENTENCE_CONFIDENCE);
                rel.properties = serde_json::json!({ "context": context });
                out.push(rel);
            }
        }
        out
    }

    pub fn extract_sync(&self, document: &SourceDocument) -> ExtractionResult {
        let source = document.path.as_str();
        let mut result = ExtractionResult::new(document.document_id.clone());

        result.push_entity(Self::document_facts(document, source));

        let references = Self::references(&document.content, source);
        let local = Gazetteer::from_entities(references.iter());
        for entity in references {
            if entity.id != document.document_id {
                let rel = Relationship::new(
                    document.document_id.clone(),
                    entity.id.clone(),
                    RelationType::References,
                    source,
                )
                .with_confidence(REFERENCE_CONFIDENCE);
                result.push_relationship(rel);
            }
            result.push_entity(entity);
        }

        for rel in self.sentence_relations(&document.content, &local, source) {
            result.push_relationship(rel);
        }
        result
    }
}

#[async_trait]
impl ExtractionPipeline for PatternExtractor {
    async fn extract(&self, document: &SourceDocument) -> Result<ExtractionResult> {
        let result = self.extract_sync(document);
        tracing::info!(
            document_id = %document.document_id,
            entities = result.entities.len(),
            relationships = result.relationships.len(),
            "Extraction complete"
        );
        Ok(result)
    }

    async fn extract_batch(&self, documents: &[SourceDocument]) -> Result<Vec<ExtractionResult>> {
        tracing::info!(count = documents.len(), "Starting batch extraction");

        let mut join_set = tokio::task::JoinSet::new();
        for (i, doc) in documents.iter().enumerate() {
            let extractor = self.clone();
            let doc = doc.clone();
            join_set.spawn(async move { (i, extractor.extract(&doc).await) });
        }

        let mut indexed = Vec::with_capacity(documents.len());
        let mut errors = Vec::new();

        while let Some(join_result) = join_set.join_next().await {
            match join_result {
                Ok((i, Ok(extraction))) => indexed.push((i, extraction)),
                Ok((i, Err(e))) => {
                    tracing::error!(
                        document_index = i,
                        document_id = %documents[i].document_id,
                        error = %e,
                        "Extraction failed for document in batch"
                    );
                    errors.push(format!("Document {} ({}): {}", i, documents[i].document_id, e));
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Task panicked during batch extraction");
                    errors.push(format!("Task join error: {join_err}"));
                }
            }
        }

        if indexed.is_empty() && !errors.is_empty() {
            return Err(ConkgError::Extraction(format!(
                "All documents failed extraction: {}",
                errors.join("; ")
            )));
        }
        if !errors.is_empty() {
            tracing::warn!(
                succeeded = indexed.len(),
                failed = errors.len(),
                "Batch extraction completed with partial failures"
            );
        }

        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed.into_iter().map(|(_, r)| r).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: &str) -> SourceDocument {
        SourceDocument::new("document:site-log", "/data/site_log.txt", content)
    }

    #[test]
    fn test_codes_are_normalised_and_typed() {
        let refs = PatternExtractor::references("See RFI #12, rfi-12 again, CO 3 and PCO-7; SI 4 issued.", "t");
        let ids: Vec<_> = refs.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["issue:rfi-12", "change_order:co-3", "change_order:pco-7", "document:si-4"]
        );
        assert_eq!(refs[0].name, "RFI 12");
        assert_eq!(refs[0].property_str("kind"), Some("rfi"));
        assert_eq!(refs[3].property_str("kind"), Some("supplemental_instruction"));
    }

    #[test]
    fn test_drawings_and_phases() {
        let refs = PatternExtractor::references("Refer to A-101-2 and S-2A-10 for phase 2 and Building 4.", "t");
        let names: Vec<_> = refs.iter().map(|e| (e.entity_type, e.name.as_str())).collect();
        assert!(names.contains(&(EntityType::Drawing, "A-101-2")));
        assert!(names.contains(&(EntityType::Drawing, "S-2A-10")));
        assert!(names.contains(&(EntityType::Phase, "Phase 2")));
        assert!(names.contains(&(EntityType::Phase, "Building 4")));
        let building = refs.iter().find(|e| e.name == "Building 4").unwrap();
        assert_eq!(building.property_str("kind"), Some("building"));
    }

    #[tokio::test]
    async fn test_document_facts_and_references() {
        let extractor = PatternExtractor::default();
        let result = extractor
            .extract(&doc("On 2024-03-15 CO 5 added $12,500.50 and $1,000 for RFI 9."))
            .await
            .unwrap();

        let document = result.entities.iter().find(|e| e.id == "document:site-log").unwrap();
        assert_eq!(document.name, "site_log.txt");
        assert_eq!(document.property("dates").unwrap()[0], "2024-03-15");
        assert_eq!(document.property("amounts").unwrap().as_array().unwrap().len(), 2);
        assert_eq!(document.property("total_amount").unwrap().as_f64(), Some(13500.5));

        let refs: Vec<_> = result
            .relationships
            .iter()
            .filter(|r| r.relation_type == RelationType::References)
            .map(|r| r.target_entity_id.as_str())
            .collect();
        assert_eq!(refs, vec!["change_order:co-5", "issue:rfi-9"]);
    }

    #[tokio::test]
    async fn test_sentence_relations_resolve_through_gazetteer() {
        let people = [
            Entity::keyed(EntityType::Person, "John Smith", "seed"),
            Entity::keyed(EntityType::Task, "Foundation Pour", "seed"),
            Entity::keyed(EntityType::Person, "Sarah Johnson", "seed"),
        ];
        let extractor = PatternExtractor::new(Gazetteer::from_entities(people.iter()));
        let text = "Yesterday John Smith approved CO 14.\nThe Foundation Pour was assigned to Sarah Johnson.\nBob approved it.";
        let result = extractor.extract(&doc(text)).await.unwrap();

        let approved = result
            .relationships
            .iter()
            .find(|r| r.relation_type == RelationType::Approved)
            .unwrap();
        assert_eq!(approved.source_entity_id, "person:john-smith");
        assert_eq!(approved.target_entity_id, "change_order:co-14");

        let assigned = result
            .relationships
            .iter()
            .find(|r| r.relation_type == RelationType::AssignedTo)
            .unwrap();
        assert_eq!(assigned.source_entity_id, "task:foundation-pour");
        assert_eq!(assigned.target_entity_id, "person:sarah-johnson");
        assert_eq!(
            result.relationships.iter().filter(|r| r.relation_type == RelationType::Approved).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_extract_batch_preserves_order() {
        let extractor = PatternExtractor::default();
        let docs = vec![
            SourceDocument::new("document:a", "a.txt", "RFI 1"),
            SourceDocument::new("document:b", "b.txt", "RFI 2"),
            SourceDocument::new("document:c", "c.txt", "nothing"),
        ];
        let results = extractor.extract_batch(&docs).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].raw_source, "document:b");
        assert_eq!(results[2].relationships.len(), 0);
    }
}

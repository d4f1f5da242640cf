use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType, ExtractionResult, Relationship};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNeighbors {
    pub entity: Entity,
    pub relationships: Vec<Relationship>,
    pub neighbors: Vec<Entity>,
}

/// A search hit with its match score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
    pub entity: Entity,
    pub score: f64,
}

/// Outcome of storing one extraction batch. Skips are data, not errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreSummary {
    pub entities_created: u64,
    pub entities_merged: u64,
    pub relationships_stored: u64,
    pub entities_skipped: u64,
    pub relationships_skipped: u64,
    pub warnings: Vec<String>,
}

impl StoreSummary {
    pub fn entities_stored(&self) -> u64 {
        self.entities_created + self.entities_merged
    }

    pub fn absorb(&mut self, other: StoreSummary) {
        self.entities_created += other.entities_created;
        self.entities_merged += other.entities_merged;
        self.relationships_stored += other.relationships_stored;
        self.entities_skipped += other.entities_skipped;
        self.relationships_skipped += other.relationships_skipped;
        self.warnings.extend(other.warnings);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeStat {
    pub entity_type: EntityType,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectOverview {
    /// Project the counts are scoped to; `None` for the whole graph.
    pub project: Option<String>,
    pub projects: u64,
    pub documents: u64,
    pub people: u64,
    pub companies: u64,
    pub issues: u64,
    pub tasks: u64,
}

impl ProjectOverview {
    pub fn is_empty(&self) -> bool {
        self.projects + self.documents + self.people + self.companies + self.issues + self.tasks == 0
    }
}

pub const MAX_NEIGHBOR_DEPTH: u32 = 3;

pub fn clamp_depth(depth: u32) -> u32 {
    depth.clamp(1, MAX_NEIGHBOR_DEPTH)
}

/// Score of `entity` against a lower-cased, trimmed query, or `None` if it does not match.
pub fn match_score(entity: &Entity, query_lower: &str) -> Option<f64> {
    if query_lower.is_empty() {
        return None;
    }
    let name = entity.name.to_lowercase();
    if name == query_lower {
        return Some(1.0);
    }
    if name.starts_with(query_lower) {
        return Some(0.8);
    }
    if name.contains(query_lower) {
        return Some(0.6);
    }
    if entity
        .aliases
        .iter()
        .any(|a| a.to_lowercase().contains(query_lower))
    {
        return Some(0.5);
    }
    if entity
        .description()
        .is_some_and(|d| d.to_lowercase().contains(query_lower))
    {
        return Some(0.3);
    }
    None
}

/// Order matches by descending score, then by name.
pub fn rank_matches(matches: &mut Vec<EntityMatch>, limit: usize) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity.name.cmp(&b.entity.name))
            .then_with(|| a.entity.id.cmp(&b.entity.id))
    });
    matches.truncate(limit);
}

/// Which parts of an extraction batch may be written, and why the rest may not.
#[derive(Debug, Clone, Default)]
pub struct BatchCheck {
    /// Indexes into `ExtractionResult::entities`.
    pub entities: Vec<usize>,
    /// Indexes into `ExtractionResult::relationships`.
    pub relationships: Vec<usize>,
    pub entity_errors: Vec<String>,
    pub relationship_errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl BatchCheck {
    /// Summary seeded with the skip counts; callers add what they wrote.
    pub fn skipped_summary(&self) -> StoreSummary {
        let mut warnings = self.entity_errors.clone();
        warnings.extend(self.relationship_errors.iter().cloned());
        warnings.extend(self.warnings.iter().cloned());
        StoreSummary {
            entities_skipped: self.entity_errors.len() as u64,
            relationships_skipped: self.relationship_errors.len() as u64,
            warnings,
            ..Default::default()
        }
    }
}

/// Check a batch against identity, required-field, referential and schema rules.
///
/// `existing` reports the stored type of an id already in the graph.
pub fn check_batch<F>(result: &ExtractionResult, existing: F) -> BatchCheck
where
    F: Fn(&str) -> Option<EntityType>,
{
    let mut check = BatchCheck::default();
    let mut batch_types: std::collections::HashMap<&str, EntityType> = std::collections::HashMap::new();

    for (i, entity) in result.entities.iter().enumerate() {
        if entity.id.trim().is_empty() || entity.name.trim().is_empty() {
            check.entity_errors.push(format!(
                "{} entity with empty id or name skipped",
                entity.entity_type.label()
            ));
            continue;
        }
        let prior = batch_types
            .get(entity.id.as_str())
            .copied()
            .or_else(|| existing(&entity.id));
        if let Some(stored) = prior {
            if stored != entity.entity_type {
                check.entity_errors.push(format!(
                    "entity {} is a {} and cannot become a {}",
                    entity.id,
                    stored.label(),
                    entity.entity_type.label()
                ));
                continue;
            }
        }
        batch_types.insert(entity.id.as_str(), entity.entity_type);
        check.entities.push(i);
    }

    for (i, rel) in result.relationships.iter().enumerate() {
        let resolve = |id: &str| batch_types.get(id).copied().or_else(|| existing(id));
        match (resolve(&rel.source_entity_id), resolve(&rel.target_entity_id)) {
            (Some(src), Some(tgt)) => {
                if !rel.relation_type.allows(src, tgt) {
                    check.warnings.push(format!(
                        "non-canonical {} from {} to {} ({} -> {})",
                        rel.relation_type.label(),
                        src.label(),
                        tgt.label(),
                        rel.source_entity_id,
                        rel.target_entity_id
                    ));
                }
                check.relationships.push(i);
            }
            (src, _) => {
                let missing = if src.is_none() {
                    &rel.source_entity_id
                } else {
                    &rel.target_entity_id
                };
                check.relationship_errors.push(format!(
                    "{} relationship skipped, endpoint {} does not exist",
                    rel.relation_type.label(),
                    missing
                ));
            }
        }
    }

    check
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Backend name for logs and health output.
    fn backend(&self) -> &'static str;
    fn is_connected(&self) -> bool;

    async fn ensure_schema(&self) -> Result<()>;
    async fn store_extraction(&self, result: &ExtractionResult) -> Result<StoreSummary>;
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;
    async fn search_entities(
        &self,
        query: &str,
        types: &[EntityType],
        limit: usize,
    ) -> Result<Vec<EntityMatch>>;
    async fn entities_by_type(&self, entity_type: EntityType, limit: usize) -> Result<Vec<Entity>>;
    async fn get_neighbors(&self, entity_id: &str, depth: u32) -> Result<GraphNeighbors>;
    async fn update_status(&self, entity_id: &str, status: &str) -> Result<Entity>;
    async fn overview(&self, project: Option<&str>) -> Result<ProjectOverview>;
    async fn type_counts(&self) -> Result<Vec<EntityTypeStat>>;
    async fn entity_count(&self) -> Result<u64>;
    async fn relationship_count(&self) -> Result<u64>;
    async fn clear(&self) -> Result<()>;
}

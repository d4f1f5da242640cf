use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use conkg_core::entity::{Entity, EntityType, ExtractionResult, RelationType, Relationship};
use conkg_core::error::{ConkgError, Result};
use conkg_core::graph::{
    check_batch, clamp_depth, match_score, rank_matches, EntityMatch, EntityTypeStat,
    GraphNeighbors, GraphStore, ProjectOverview, StoreSummary,
};
use conkg_core::lifecycle::check_transition;

#[derive(Default)]
struct GraphState {
    entities: HashMap<String, Entity>,
    relationships: HashMap<(String, RelationType, String), Relationship>,
}

impl GraphState {
    fn edges_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships
            .values()
            .filter(move |r| r.source_entity_id == id || r.target_entity_id == id)
    }

    /// Ids reachable from `root` within `depth` undirected hops, root included.
    fn reachable(&self, root: &str, depth: u32) -> (Vec<String>, Vec<Relationship>) {
        let mut seen: HashSet<String> = HashSet::from([root.to_string()]);
        let mut order = Vec::new();
        let mut rels = Vec::new();
        let mut seen_rels = HashSet::new();
        let mut queue = VecDeque::from([(root.to_string(), 0u32)]);

        while let Some((id, dist)) = queue.pop_front() {
            if dist >= depth {
                continue;
            }
            let mut edges: Vec<&Relationship> = self.edges_of(&id).collect();
            edges.sort_by(|a, b| a.key().cmp(&b.key()));
            for rel in edges {
                if seen_rels.insert(rel.id) {
                    rels.push(rel.clone());
                }
                let Some(other) = rel.other_end(&id) else { continue };
                if seen.insert(other.to_string()) {
                    order.push(other.to_string());
                    queue.push_back((other.to_string(), dist + 1));
                }
            }
        }
        (order, rels)
    }

    fn find_project(&self, project: &str) -> Option<&Entity> {
        self.entities.get(project).filter(|e| e.entity_type == EntityType::Project).or_else(|| {
            let mut candidates: Vec<&Entity> = self
                .entities
                .values()
                .filter(|e| e.entity_type == EntityType::Project && e.is_called(project))
                .collect();
            candidates.sort_by(|a, b| a.id.cmp(&b.id));
            candidates.into_iter().next()
        })
    }
}

/// Graph store held in process memory. Used by tests and whenever Neo4j is not available.
#[derive(Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn store_extraction(&self, result: &ExtractionResult) -> Result<StoreSummary> {
        let mut state = self.state.write().await;
        let check = check_batch(result, |id| state.entities.get(id).map(|e| e.entity_type));
        let mut summary = check.skipped_summary();

        for &i in &check.entities {
            let entity = &result.entities[i];
            match state.entities.get_mut(&entity.id) {
                Some(existing) => {
                    existing.merge_from(entity);
                    summary.entities_merged += 1;
                }
                None => {
                    state.entities.insert(entity.id.clone(), entity.clone());
                    summary.entities_created += 1;
                }
            }
            tracing::debug!(entity_id = %entity.id, entity_type = entity.entity_type.label(), "Stored entity");
        }

        for &i in &check.relationships {
            let rel = &result.relationships[i];
            match state.relationships.get_mut(&rel.key()) {
                Some(existing) => existing.merge_from(rel),
                None => {
                    state.relationships.insert(rel.key(), rel.clone());
                }
            }
            summary.relationships_stored += 1;
        }

        for warning in &summary.warnings {
            tracing::warn!(source = %result.raw_source, "{}", warning);
        }
        tracing::info!(
            entities = summary.entities_stored(),
            relationships = summary.relationships_stored,
            skipped_entities = summary.entities_skipped,
            skipped_relationships = summary.relationships_skipped,
            "Stored extraction result"
        );
        Ok(summary)
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.state.read().await.entities.get(id).cloned())
    }

    async fn search_entities(
        &self,
        query: &str,
        types: &[EntityType],
        limit: usize,
    ) -> Result<Vec<EntityMatch>> {
        let q = query.trim().to_lowercase();
        let state = self.state.read().await;
        let mut matches: Vec<EntityMatch> = state
            .entities
            .values()
            .filter(|e| types.is_empty() || types.contains(&e.entity_type))
            .filter_map(|e| {
                match_score(e, &q).map(|score| EntityMatch {
                    entity: e.clone(),
                    score,
                })
            })
            .collect();
        rank_matches(&mut matches, limit);
        Ok(matches)
    }

    async fn entities_by_type(&self, entity_type: EntityType, limit: usize) -> Result<Vec<Entity>> {
        let state = self.state.read().await;
        let mut out: Vec<Entity> = state
            .entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        out.truncate(limit);
        Ok(out)
    }

    async fn get_neighbors(&self, entity_id: &str, depth: u32) -> Result<GraphNeighbors> {
        let state = self.state.read().await;
        let root = state
            .entities
            .get(entity_id)
            .cloned()
            .ok_or_else(|| ConkgError::NotFound(format!("Entity {} not found", entity_id)))?;

        let (ids, relationships) = state.reachable(entity_id, clamp_depth(depth));
        let neighbors = ids
            .iter()
            .filter_map(|id| state.entities.get(id).cloned())
            .collect();

        Ok(GraphNeighbors {
            entity: root,
            relationships,
            neighbors,
        })
    }

    async fn update_status(&self, entity_id: &str, status: &str) -> Result<Entity> {
        let mut state = self.state.write().await;
        let entity = state
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| ConkgError::NotFound(format!("Entity {} not found", entity_id)))?;
        let next = check_transition(entity.entity_type, entity.status(), status)?;
        entity.set_property("status", next);
        entity.last_seen = chrono::Utc::now();
        Ok(entity.clone())
    }

    async fn overview(&self, project: Option<&str>) -> Result<ProjectOverview> {
        let state = self.state.read().await;

        let scoped: Vec<&Entity> = match project {
            None => state.entities.values().collect(),
            Some(p) => {
                let root = state
                    .find_project(p)
                    .ok_or_else(|| ConkgError::NotFound(format!("Project {} not found", p)))?;
                let (ids, _) = state.reachable(&root.id, 2);
                std::iter::once(root)
                    .chain(ids.iter().filter_map(|id| state.entities.get(id)))
                    .collect()
            }
        };

        let count = |t: EntityType| scoped.iter().filter(|e| e.entity_type == t).count() as u64;
        Ok(ProjectOverview {
            project: project.map(str::to_string),
            projects: count(EntityType::Project),
            documents: count(EntityType::Document),
            people: count(EntityType::Person),
            companies: count(EntityType::Company) + count(EntityType::Contractor),
            issues: count(EntityType::Issue),
            tasks: count(EntityType::Task),
        })
    }

    async fn type_counts(&self) -> Result<Vec<EntityTypeStat>> {
        let state = self.state.read().await;
        let mut counts: HashMap<EntityType, u64> = HashMap::new();
        for e in state.entities.values() {
            *counts.entry(e.entity_type).or_default() += 1;
        }
        Ok(EntityType::ALL
            .iter()
            .filter_map(|t| {
                counts.get(t).map(|&count| EntityTypeStat {
                    entity_type: *t,
                    count,
                })
            })
            .collect())
    }

    async fn entity_count(&self) -> Result<u64> {
        Ok(self.state.read().await.entities.len() as u64)
    }

    async fn relationship_count(&self) -> Result<u64> {
        Ok(self.state.read().await.relationships.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.entities.clear();
        state.relationships.clear();
        tracing::info!("Cleared in-memory graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str) -> Entity {
        Entity::keyed(EntityType::Person, name, "test")
    }

    fn batch(entities: Vec<Entity>, rels: Vec<Relationship>) -> ExtractionResult {
        let mut r = ExtractionResult::new("test");
        r.entities = entities;
        r.relationships = rels;
        r
    }

    async fn seeded() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        let project = Entity::keyed(EntityType::Project, "Service Center", "test");
        let company = Entity::keyed(EntityType::Company, "ABC Construction", "test");
        let jane = person("Jane Doe").with_property("role", "Project Manager");
        let doc = Entity::keyed(EntityType::Document, "minutes.txt", "test");
        let far = Entity::keyed(EntityType::Issue, "Leak on roof", "test");
        let rels = vec![
            Relationship::new(&jane.id, &company.id, RelationType::WorksFor, "test"),
            Relationship::new(&jane.id, &project.id, RelationType::Manages, "test"),
            Relationship::new(&doc.id, &project.id, RelationType::BelongsToProject, "test"),
            Relationship::new(&far.id, &company.id, RelationType::AssignedTo, "test"),
        ];
        store
            .store_extraction(&batch(vec![project, company, jane, doc, far], rels))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_store_and_merge() {
        let store = InMemoryGraphStore::new();
        let first = store.store_extraction(&batch(vec![person("Jane Doe")], vec![])).await.unwrap();
        assert_eq!(first.entities_created, 1);

        let again = person("Jane Doe").with_aliases(["JD"]).with_property("email", "jd@x.com");
        let second = store.store_extraction(&batch(vec![again], vec![])).await.unwrap();
        assert_eq!(second.entities_merged, 1);
        assert_eq!(store.entity_count().await.unwrap(), 1);

        let stored = store.get_entity("person:jane-doe").await.unwrap().unwrap();
        assert_eq!(stored.aliases, vec!["JD".to_string()]);
        assert_eq!(stored.property_str("email"), Some("jd@x.com"));
    }

    #[tokio::test]
    async fn test_type_change_and_dangling_are_skipped() {
        let store = InMemoryGraphStore::new();
        store.store_extraction(&batch(vec![person("Sam")], vec![])).await.unwrap();

        let clash = Entity::new(EntityType::Company, "person:sam", "Sam", "test");
        let dangling = Relationship::new("person:sam", "company:nowhere", RelationType::WorksFor, "test");
        let summary = store.store_extraction(&batch(vec![clash], vec![dangling])).await.unwrap();
        assert_eq!(summary.entities_skipped, 1);
        assert_eq!(summary.relationships_skipped, 1);
        assert_eq!(store.relationship_count().await.unwrap(), 0);
        let sam = store.get_entity("person:sam").await.unwrap().unwrap();
        assert_eq!(sam.entity_type, EntityType::Person);
    }

    #[tokio::test]
    async fn test_relationship_uniqueness_keeps_higher_confidence() {
        let store = seeded().await;
        let before = store.relationship_count().await.unwrap();
        let rel = Relationship::new("person:jane-doe", "company:abc-construction", RelationType::WorksFor, "again")
            .with_confidence(0.4);
        store.store_extraction(&batch(vec![], vec![rel])).await.unwrap();
        assert_eq!(store.relationship_count().await.unwrap(), before);

        let n = store.get_neighbors("person:jane-doe", 1).await.unwrap();
        let works_for = n
            .relationships
            .iter()
            .find(|r| r.relation_type == RelationType::WorksFor)
            .unwrap();
        assert_eq!(works_for.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_search_scoring_and_type_filter() {
        let store = seeded().await;
        let hits = store.search_entities("jane", &[], 10).await.unwrap();
        assert_eq!(hits[0].entity.name, "Jane Doe");
        assert_eq!(hits[0].score, 0.8);

        let hits = store.search_entities("construction", &[EntityType::Person], 10).await.unwrap();
        assert!(hits.is_empty());
        let hits = store.search_entities("construction", &[], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.6);
    }

    #[tokio::test]
    async fn test_neighbor_depth() {
        let store = seeded().await;
        let one = store.get_neighbors("person:jane-doe", 1).await.unwrap();
        assert_eq!(one.neighbors.len(), 2);
        assert!(one.neighbors.iter().all(|e| e.id != "person:jane-doe"));

        let two = store.get_neighbors("person:jane-doe", 2).await.unwrap();
        let ids: HashSet<_> = two.neighbors.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains("document:minutes-txt"));
        assert!(ids.contains("issue:leak-on-roof"));

        let clamped = store.get_neighbors("person:jane-doe", 0).await.unwrap();
        assert_eq!(clamped.neighbors.len(), 2);
        assert!(matches!(
            store.get_neighbors("person:ghost", 1).await,
            Err(ConkgError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_overview_scoping() {
        let store = seeded().await;
        store
            .store_extraction(&batch(vec![Entity::keyed(EntityType::Project, "Other Job", "t")], vec![]))
            .await
            .unwrap();

        let all = store.overview(None).await.unwrap();
        assert_eq!(all.projects, 2);

        let scoped = store.overview(Some("service center")).await.unwrap();
        assert_eq!(scoped.projects, 1);
        assert_eq!(scoped.people, 1);
        assert_eq!(scoped.documents, 1);
        assert_eq!(scoped.companies, 1);
        assert_eq!(scoped.issues, 0);

        assert!(matches!(store.overview(Some("Atlantis")).await, Err(ConkgError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_status_enforces_lifecycle() {
        let store = seeded().await;
        let issue = store.update_status("issue:leak-on-roof", "in progress").await.unwrap();
        assert_eq!(issue.status(), Some("in_progress"));
        assert!(matches!(
            store.update_status("issue:leak-on-roof", "closed").await,
            Err(ConkgError::Validation(_))
        ));
        assert!(matches!(
            store.update_status("person:jane-doe", "open").await,
            Err(ConkgError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_type_counts_and_clear() {
        let store = seeded().await;
        let counts = store.type_counts().await.unwrap();
        assert_eq!(counts[0].entity_type, EntityType::Project);
        assert_eq!(counts.iter().map(|c| c.count).sum::<u64>(), 5);

        store.clear().await.unwrap();
        assert_eq!(store.entity_count().await.unwrap(), 0);
        assert_eq!(store.relationship_count().await.unwrap(), 0);
    }
}

use std::collections::{HashMap, HashSet};

use tracing::debug;

use conkg_core::entity::{Entity, EntityType, RelationType};
use conkg_core::error::Result;
use conkg_core::graph::{EntityMatch, GraphStore};
use conkg_core::qa::{QueryIntent, RetrievalStep};

use crate::intent::QuestionAnalysis;

/// Search hits at or above this score become anchors.
pub const ANCHOR_MIN_SCORE: f64 = 0.5;
const MAX_ANCHORS: usize = 5;
const POOL_LIMIT: usize = 200;

const DOCUMENT_TYPES: [EntityType; 5] = [
    EntityType::Document,
    EntityType::Drawing,
    EntityType::Specification,
    EntityType::Email,
    EntityType::Meeting,
];

#[derive(Debug, Clone)]
pub struct Link {
    pub relation: RelationType,
    pub outgoing: bool,
    pub entity: Entity,
}

/// A retrieved entity with its direct relationships.
#[derive(Debug, Clone)]
pub struct GraphItem {
    pub entity: Entity,
    pub links: Vec<Link>,
}

impl GraphItem {
    pub fn linked(&self, relation: RelationType, outgoing: bool) -> impl Iterator<Item = &Entity> {
        self.links
            .iter()
            .filter(move |l| l.relation == relation && l.outgoing == outgoing)
            .map(|l| &l.entity)
    }

    pub fn first_linked(&self, relation: RelationType, outgoing: bool, types: &[EntityType]) -> Option<&Entity> {
        self.linked(relation, outgoing)
            .find(|e| types.is_empty() || types.contains(&e.entity_type))
    }
}

#[derive(Debug, Default)]
pub struct GraphRetrieval {
    pub anchors: Vec<EntityMatch>,
    pub items: Vec<GraphItem>,
    pub steps: Vec<RetrievalStep>,
}

/// Fixed graph lookups per question intent.
pub struct GraphRecipes<'a> {
    graph: &'a dyn GraphStore,
    limit: usize,
    scope: Option<HashSet<String>>,
}

fn push_new(out: &mut Vec<Entity>, seen: &mut HashSet<String>, entity: Entity) {
    if seen.insert(entity.id.clone()) {
        out.push(entity);
    }
}

fn priority_rank(entity: &Entity) -> u8 {
    match entity.property_str("priority").map(str::to_lowercase).as_deref() {
        Some("critical") | Some("urgent") => 0,
        Some("high") => 1,
        Some("medium") | Some("normal") => 2,
        Some("low") => 3,
        _ => 4,
    }
}

fn is_closed(entity: &Entity) -> bool {
    matches!(
        entity.status().map(str::to_lowercase).as_deref(),
        Some("closed") | Some("resolved") | Some("complete") | Some("approved")
    )
}

/// Earliest known date of a phase or task, as written.
pub fn schedule_date(entity: &Entity) -> Option<String> {
    ["start_date", "due_date", "end_date", "date"]
        .iter()
        .find_map(|k| entity.property_text(k))
}

fn matches_role(entity: &Entity, roles: &[String]) -> bool {
    let role = entity.property_str("role").unwrap_or_default().to_lowercase();
    roles.iter().any(|r| role.contains(r.as_str()))
}

fn matches_kind(entity: &Entity, kinds: &[String]) -> bool {
    let mut haystack = format!("{} {}", entity.entity_type.as_str(), entity.name.to_lowercase());
    for key in ["kind", "file_type", "type"] {
        if let Some(v) = entity.property_str(key) {
            haystack.push(' ');
            haystack.push_str(&v.to_lowercase());
        }
    }
    kinds.iter().any(|k| haystack.contains(k.as_str()))
}

impl<'a> GraphRecipes<'a> {
    pub fn new(graph: &'a dyn GraphStore, limit: usize) -> Self {
        Self {
            graph,
            limit: limit.max(1),
            scope: None,
        }
    }

    /// Restrict every result to entities within two hops of `project_id`.
    pub async fn scoped_to(mut self, project_id: &str) -> Result<Self> {
        let around = self.graph.get_neighbors(project_id, 2).await?;
        let mut ids: HashSet<String> = around.neighbors.into_iter().map(|e| e.id).collect();
        ids.insert(project_id.to_string());
        self.scope = Some(ids);
        Ok(self)
    }

    fn in_scope(&self, entity: &Entity) -> bool {
        self.scope.as_ref().map_or(true, |s| s.contains(&entity.id))
    }

    pub async fn find_anchors(&self, analysis: &QuestionAnalysis) -> Result<Vec<EntityMatch>> {
        let mut best: HashMap<String, EntityMatch> = HashMap::new();
        for phrase in &analysis.phrases {
            for hit in self.graph.search_entities(phrase, &[], MAX_ANCHORS).await? {
                if hit.score < ANCHOR_MIN_SCORE || !self.in_scope(&hit.entity) {
                    continue;
                }
                match best.get(&hit.entity.id) {
                    Some(existing) if existing.score >= hit.score => {}
                    _ => {
                        best.insert(hit.entity.id.clone(), hit);
                    }
                }
            }
        }
        let mut anchors: Vec<EntityMatch> = best.into_values().collect();
        conkg_core::graph::rank_matches(&mut anchors, MAX_ANCHORS);
        Ok(anchors)
    }

    /// Entities of `types` (any type when empty) among the anchors and within `depth` of them.
    async fn around_anchors(&self, anchors: &[EntityMatch], types: &[EntityType], depth: u32) -> Result<Vec<Entity>> {
        let wanted = |e: &Entity| types.is_empty() || types.contains(&e.entity_type);
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for a in anchors.iter().filter(|a| wanted(&a.entity)) {
            push_new(&mut out, &mut seen, a.entity.clone());
        }
        for a in anchors {
            let around = self.graph.get_neighbors(&a.entity.id, depth).await?;
            for e in around.neighbors.into_iter().filter(|e| wanted(e)) {
                push_new(&mut out, &mut seen, e);
            }
        }
        Ok(out)
    }

    async fn keyword_search(&self, analysis: &QuestionAnalysis, types: &[EntityType]) -> Result<Vec<Entity>> {
        let mut hits = Vec::new();
        for kw in &analysis.keywords {
            hits.extend(self.graph.search_entities(kw, types, self.limit).await?);
        }
        conkg_core::graph::rank_matches(&mut hits, usize::MAX);
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for h in hits {
            push_new(&mut out, &mut seen, h.entity);
        }
        Ok(out)
    }

    async fn all_of(&self, types: &[EntityType]) -> Result<Vec<Entity>> {
        let mut out = Vec::new();
        for t in types {
            out.extend(self.graph.entities_by_type(*t, POOL_LIMIT).await?);
        }
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    /// Anchors and their surroundings, else keyword hits, else every entity of `types`.
    async fn pool(
        &self,
        analysis: &QuestionAnalysis,
        anchors: &[EntityMatch],
        types: &[EntityType],
        depth: u32,
    ) -> Result<(Vec<Entity>, &'static str)> {
        let mut found = self.around_anchors(anchors, types, depth).await?;
        let mut how = "anchors and neighbours";
        if found.is_empty() {
            found = self.keyword_search(analysis, types).await?;
            how = "keyword search";
        }
        if found.is_empty() && !types.is_empty() {
            found = self.all_of(types).await?;
            how = "all entities of type";
        }
        found.retain(|e| self.in_scope(e));
        Ok((found, how))
    }

    pub async fn run(&self, analysis: &QuestionAnalysis) -> Result<GraphRetrieval> {
        let mut retrieval = GraphRetrieval::default();
        let anchors = self.find_anchors(analysis).await?;
        retrieval.steps.push(RetrievalStep {
            description: "Detected anchor entities".to_string(),
            query: Some(analysis.phrases.join(" | ")),
            result_summary: if anchors.is_empty() {
                "No anchors".to_string()
            } else {
                anchors
                    .iter()
                    .map(|a| format!("{} ({:.1})", a.entity.id, a.score))
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        });

        let intent = analysis.intent;
        let (types, depth): (&[EntityType], u32) = match intent {
            QueryIntent::People => (&[EntityType::Person], 2),
            QueryIntent::ProjectInfo => (&[EntityType::Project], 2),
            QueryIntent::Documents => (&DOCUMENT_TYPES, 1),
            QueryIntent::Issues => (&[EntityType::Issue, EntityType::ChangeOrder], 2),
            QueryIntent::Materials => (&[EntityType::Material, EntityType::Equipment, EntityType::CostItem], 2),
            QueryIntent::Schedule => (&[EntityType::Phase, EntityType::Task], 2),
            QueryIntent::General => (&[], 1),
        };
        let (mut found, how) = self.pool(analysis, &anchors, types, depth).await?;
        let mut notes = vec![how.to_string()];

        match intent {
            QueryIntent::People if !analysis.roles.is_empty() => {
                let filtered: Vec<Entity> = found.iter().filter(|e| matches_role(e, &analysis.roles)).cloned().collect();
                if filtered.is_empty() {
                    notes.push(format!("no one matched role {}", analysis.roles.join("/")));
                } else {
                    notes.push(format!("role filter {}", analysis.roles.join("/")));
                    found = filtered;
                }
            }
            QueryIntent::Documents if !analysis.document_kinds.is_empty() => {
                let filtered: Vec<Entity> = found
                    .iter()
                    .filter(|e| matches_kind(e, &analysis.document_kinds))
                    .cloned()
                    .collect();
                if !filtered.is_empty() {
                    notes.push(format!("kind filter {}", analysis.document_kinds.join("/")));
                    found = filtered;
                }
            }
            QueryIntent::Issues => {
                found.sort_by(|a, b| {
                    is_closed(a)
                        .cmp(&is_closed(b))
                        .then_with(|| priority_rank(a).cmp(&priority_rank(b)))
                        .then_with(|| a.name.cmp(&b.name))
                });
                notes.push("ordered by priority".to_string());
            }
            QueryIntent::Schedule => {
                found.sort_by(|a, b| match (schedule_date(a), schedule_date(b)) {
                    (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.name.cmp(&b.name),
                });
                notes.push("ordered by date".to_string());
            }
            _ => {}
        }
        found.truncate(self.limit);

        retrieval.steps.push(RetrievalStep {
            description: format!("Graph recipe: {}", intent),
            query: Some(notes.join("; ")),
            result_summary: format!("Found {} entities", found.len()),
        });

        for entity in found {
            let links = self.links(&entity).await;
            retrieval.items.push(GraphItem { entity, links });
        }
        retrieval.anchors = anchors;
        Ok(retrieval)
    }

    async fn links(&self, entity: &Entity) -> Vec<Link> {
        let around = match self.graph.get_neighbors(&entity.id, 1).await {
            Ok(n) => n,
            Err(e) => {
                debug!(entity_id = %entity.id, error = %e, "could not load relationships");
                return Vec::new();
            }
        };
        let by_id: HashMap<&str, &Entity> = around.neighbors.iter().map(|e| (e.id.as_str(), e)).collect();
        around
            .relationships
            .iter()
            .filter_map(|r| {
                let other = r.other_end(&entity.id)?;
                let target = by_id.get(other)?;
                Some(Link {
                    relation: r.relation_type,
                    outgoing: r.source_entity_id == entity.id,
                    entity: (*target).clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_ordering_helpers() {
        let open_high = Entity::keyed(EntityType::Issue, "Leak", "t")
            .with_property("priority", "High")
            .with_property("status", "open");
        let closed_critical = Entity::keyed(EntityType::Issue, "Crack", "t")
            .with_property("priority", "critical")
            .with_property("status", "closed");
        assert_eq!(priority_rank(&open_high), 1);
        assert_eq!(priority_rank(&closed_critical), 0);
        assert!(is_closed(&closed_critical));
        assert!(!is_closed(&open_high));
    }

    #[test]
    fn test_role_and_kind_matching() {
        let pm = Entity::keyed(EntityType::Person, "John Smith", "t").with_property("role", "Project Manager");
        assert!(matches_role(&pm, &["manager".to_string()]));
        assert!(!matches_role(&pm, &["engineer".to_string()]));

        let dwg = Entity::keyed(EntityType::Drawing, "A-201-3", "t");
        assert!(matches_kind(&dwg, &["drawing".to_string()]));
        let spec = Entity::keyed(EntityType::Specification, "Section 14 21 00", "t");
        assert!(matches_kind(&spec, &["spec".to_string()]));
    }
}

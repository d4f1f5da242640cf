use std::collections::{HashMap, HashSet};
use std::future::Future;

use async_trait::async_trait;
use neo4rs::{query, Graph, Node, Query};
use tokio::sync::Mutex;
use uuid::Uuid;

use conkg_core::config::AppConfig;
use conkg_core::entity::{Entity, EntityType, ExtractionResult, RelationType, Relationship};
use conkg_core::error::{ConkgError, Result};
use conkg_core::graph::{
    check_batch, clamp_depth, match_score, rank_matches, EntityMatch, EntityTypeStat,
    GraphNeighbors, GraphStore, ProjectOverview, StoreSummary,
};
use conkg_core::lifecycle::check_transition;

/// Timeout for all Neo4j operations (seconds).
const NEO4J_TIMEOUT_SECS: u64 = 5;

/// Upper bound on candidates pulled back for in-process scoring. The query
/// orders them so the strongest matches survive the cut.
const SEARCH_CANDIDATES: i64 = 500;

/// Candidates come back best first: exact name or alias, then name prefix,
/// then name substring, then alias or description matches.
const SEARCH_CYPHER: &str = "MATCH (n) \
     WHERE (size($labels) = 0 OR any(l IN labels(n) WHERE l IN $labels)) \
       AND (toLower(n.name) CONTAINS $query \
         OR toLower(coalesce(n.aliases, '')) CONTAINS $query \
         OR toLower(coalesce(n.description, '')) CONTAINS $query) \
     WITH n, toLower(n.name) AS lname, toLower(coalesce(n.aliases, '')) AS laliases \
     WITH n, CASE \
         WHEN lname = $query OR laliases CONTAINS ('\"' + $query + '\"') THEN 0 \
         WHEN lname STARTS WITH $query THEN 1 \
         WHEN lname CONTAINS $query THEN 2 \
         ELSE 3 END AS rank \
     RETURN n, rank ORDER BY rank, size(n.name), n.id LIMIT $limit";

pub struct Neo4jGraphStore {
    graph: Option<Graph>,
    /// Held across each read-merge-write so concurrent batches see each other's merges.
    write_lock: Mutex<()>,
}

impl Neo4jGraphStore {
    /// Connect, falling back to a disconnected store when Neo4j is unreachable.
    pub async fn connect(config: &AppConfig) -> Self {
        let attempt = timed(Graph::new(
            &config.neo4j_uri,
            &config.neo4j_user,
            &config.neo4j_password,
        ))
        .await;
        match attempt {
            Ok(Ok(graph)) => {
                tracing::info!(uri = %config.neo4j_uri, "Connected to Neo4j");
                Self::with_graph(Some(graph))
            }
            Ok(Err(e)) => {
                tracing::warn!(uri = %config.neo4j_uri, error = %e, "Failed to connect to Neo4j, running in degraded mode");
                Self::disconnected()
            }
            Err(e) => {
                tracing::warn!(uri = %config.neo4j_uri, error = %e, "Neo4j connection attempt timed out");
                Self::disconnected()
            }
        }
    }

    pub fn disconnected() -> Self {
        Self::with_graph(None)
    }

    fn with_graph(graph: Option<Graph>) -> Self {
        Self {
            graph,
            write_lock: Mutex::new(()),
        }
    }

    fn graph(&self) -> Result<&Graph> {
        self.graph
            .as_ref()
            .ok_or_else(|| ConkgError::Graph("Neo4j not connected".into()))
    }

    async fn fetch_nodes(&self, q: Query, what: &str) -> Result<Vec<Entity>> {
        let mut stream = timed(self.graph()?.execute(q))
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to {}: {}", what, e)))?;

        let mut entities = Vec::new();
        loop {
            match stream.next().await {
                Ok(Some(row)) => {
                    let node: Node = row
                        .get("n")
                        .map_err(|e| ConkgError::Graph(format!("Failed to deserialize node: {}", e)))?;
                    match node_to_entity(&node) {
                        Ok(entity) => entities.push(entity),
                        Err(e) => tracing::warn!(error = %e, "Skipping malformed entity node"),
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(ConkgError::Graph(format!("Failed to {}: {}", what, e))),
            }
        }
        Ok(entities)
    }

    async fn label_counts(&self, q: Query) -> Result<HashMap<EntityType, u64>> {
        let mut stream = timed(self.graph()?.execute(q))
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to count labels: {}", e)))?;

        let mut counts = HashMap::new();
        loop {
            match stream.next().await {
                Ok(Some(row)) => {
                    let label: String = row
                        .get("label")
                        .map_err(|e| ConkgError::Graph(format!("Missing label column: {}", e)))?;
                    let cnt: i64 = row
                        .get("cnt")
                        .map_err(|e| ConkgError::Graph(format!("Missing count column: {}", e)))?;
                    if let Some(t) = EntityType::from_label(&label) {
                        *counts.entry(t).or_default() += cnt.max(0) as u64;
                    }
                }
                Ok(None) => break,
                Err(e) => return Err(ConkgError::Graph(format!("Error counting labels: {}", e))),
            }
        }
        Ok(counts)
    }

    async fn single_count(&self, cypher: &str) -> Result<u64> {
        let mut stream = timed(self.graph()?.execute(query(cypher)))
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to count: {}", e)))?;

        match stream.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get("cnt")
                    .map_err(|e| ConkgError::Graph(format!("Failed to get count: {}", e)))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(ConkgError::Graph(format!("Error counting: {}", e))),
        }
    }

    async fn nodes_by_id(&self, ids: Vec<String>) -> Result<HashMap<String, Entity>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let q = query("MATCH (n) WHERE n.id IN $ids RETURN n").param("ids", ids);
        Ok(self
            .fetch_nodes(q, "load existing nodes")
            .await?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect())
    }

    async fn resolve_project(&self, project: &str) -> Result<Option<String>> {
        let q = query(
            "MATCH (n:Project) WHERE n.id = $p OR toLower(n.name) = toLower($p) \
             RETURN n ORDER BY n.id LIMIT 1",
        )
        .param("p", project.to_string());
        Ok(self
            .fetch_nodes(q, "resolve project")
            .await?
            .into_iter()
            .next()
            .map(|e| e.id))
    }
}

/// Wrap any async operation with a timeout, converting timeout to ConkgError::Graph.
async fn timed<T, F: Future<Output = T>>(op: F) -> std::result::Result<T, ConkgError> {
    tokio::time::timeout(std::time::Duration::from_secs(NEO4J_TIMEOUT_SECS), op)
        .await
        .map_err(|_| {
            tracing::warn!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS);
            ConkgError::Graph(format!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS))
        })
}

fn parse_time(value: Option<String>) -> chrono::DateTime<chrono::Utc> {
    value
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now)
}

fn node_to_entity(node: &Node) -> Result<Entity> {
    let id: String = node
        .get("id")
        .map_err(|e| ConkgError::Graph(format!("Missing id on node: {}", e)))?;

    let entity_type = node
        .labels()
        .iter()
        .find_map(|l| EntityType::from_label(l))
        .ok_or_else(|| ConkgError::Graph(format!("Node {} has no known label", id)))?;

    let name: String = node
        .get("name")
        .map_err(|e| ConkgError::Graph(format!("Missing name on node: {}", e)))?;

    let aliases_json: String = node.get("aliases").unwrap_or_else(|_| "[]".to_string());
    let aliases: Vec<String> = serde_json::from_str(&aliases_json).unwrap_or_default();

    let properties_json: String = node.get("properties").unwrap_or_else(|_| "{}".to_string());
    let properties: serde_json::Value = serde_json::from_str(&properties_json)
        .unwrap_or(serde_json::Value::Object(Default::default()));

    Ok(Entity {
        id,
        entity_type,
        name,
        aliases,
        properties,
        source: node.get("source").unwrap_or_default(),
        confidence: node.get("confidence").unwrap_or(1.0),
        first_seen: parse_time(node.get("first_seen").ok()),
        last_seen: parse_time(node.get("last_seen").ok()),
    })
}

fn entity_query(entity: &Entity) -> Result<Query> {
    let label = entity.entity_type.label();
    let aliases_json = serde_json::to_string(&entity.aliases)
        .map_err(|e| ConkgError::Graph(format!("Failed to serialize aliases: {}", e)))?;
    let properties_json = serde_json::to_string(&entity.properties)
        .map_err(|e| ConkgError::Graph(format!("Failed to serialize properties: {}", e)))?;

    // status, priority and description are lifted out of the JSON blob so the
    // indexes and text search can see them.
    let cypher = format!(
        "MERGE (n:{label} {{id: $id}}) \
         SET n.name = $name, n.aliases = $aliases, n.properties = $properties, \
           n.source = $source, n.confidence = $confidence, \
           n.first_seen = $first_seen, n.last_seen = $last_seen, \
           n.status = $status, n.priority = $priority, n.description = $description"
    );

    Ok(query(&cypher)
        .param("id", entity.id.clone())
        .param("name", entity.name.clone())
        .param("aliases", aliases_json)
        .param("properties", properties_json)
        .param("source", entity.source.clone())
        .param("confidence", entity.confidence)
        .param("first_seen", entity.first_seen.to_rfc3339())
        .param("last_seen", entity.last_seen.to_rfc3339())
        .param("status", entity.property_text("status").unwrap_or_default())
        .param("priority", entity.property_text("priority").unwrap_or_default())
        .param("description", entity.description().unwrap_or_default().to_string()))
}

fn relationship_query(rel: &Relationship) -> Result<Query> {
    let properties_json = serde_json::to_string(&rel.properties).map_err(|e| {
        ConkgError::Graph(format!("Failed to serialize relationship properties: {}", e))
    })?;
    let timestamp_str = rel.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default();

    let cypher = format!(
        "MATCH (a {{id: $source_id}}) \
         MATCH (b {{id: $target_id}}) \
         MERGE (a)-[r:{}]->(b) \
         ON CREATE SET r.id = $rel_id, r.properties = $properties, r.source = $source, \
           r.confidence = $confidence, r.timestamp = $timestamp \
         ON MATCH SET r.properties = CASE WHEN $properties <> '{{}}' THEN $properties ELSE r.properties END, \
           r.confidence = CASE WHEN $confidence > r.confidence THEN $confidence ELSE r.confidence END, \
           r.timestamp = CASE WHEN $timestamp <> '' THEN $timestamp ELSE r.timestamp END",
        rel.relation_type.label()
    );

    Ok(query(&cypher)
        .param("source_id", rel.source_entity_id.clone())
        .param("target_id", rel.target_entity_id.clone())
        .param("rel_id", rel.id.to_string())
        .param("properties", properties_json)
        .param("confidence", rel.confidence)
        .param("source", rel.source.clone())
        .param("timestamp", timestamp_str))
}

fn constraint_name(label: &str, suffix: &str) -> String {
    format!("{}_{}", label.to_lowercase(), suffix)
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    fn backend(&self) -> &'static str {
        "neo4j"
    }

    fn is_connected(&self) -> bool {
        self.graph.is_some()
    }

    async fn ensure_schema(&self) -> Result<()> {
        let graph = self.graph()?;
        for t in EntityType::ALL {
            let label = t.label();
            let mut statements = vec![format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.id IS UNIQUE",
                constraint_name(label, "id"),
                label
            )];
            for prop in t.indexed_properties() {
                statements.push(format!(
                    "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.{})",
                    constraint_name(label, prop),
                    label,
                    prop
                ));
            }
            for stmt in statements {
                timed(graph.run(query(&stmt)))
                    .await?
                    .map_err(|e| ConkgError::Graph(format!("Failed to apply schema ({}): {}", stmt, e)))?;
            }
        }
        tracing::info!(labels = EntityType::ALL.len(), "Neo4j constraints and indexes ensured");
        Ok(())
    }

    async fn store_extraction(&self, result: &ExtractionResult) -> Result<StoreSummary> {
        let _write = self.write_lock.lock().await;
        let mut ids: HashSet<String> = result.entities.iter().map(|e| e.id.clone()).collect();
        for rel in &result.relationships {
            ids.insert(rel.source_entity_id.clone());
            ids.insert(rel.target_entity_id.clone());
        }
        let existing = self.nodes_by_id(ids.into_iter().collect()).await?;

        let check = check_batch(result, |id| existing.get(id).map(|e| e.entity_type));
        let mut summary = check.skipped_summary();

        // Merge in process so re-ingest keeps alias unions and first/last seen.
        let mut pending: Vec<Entity> = Vec::new();
        for &i in &check.entities {
            let incoming = &result.entities[i];
            if let Some(slot) = pending.iter_mut().find(|e| e.id == incoming.id) {
                slot.merge_from(incoming);
                summary.entities_merged += 1;
                continue;
            }
            match existing.get(&incoming.id) {
                Some(stored) => {
                    let mut merged = stored.clone();
                    merged.merge_from(incoming);
                    pending.push(merged);
                    summary.entities_merged += 1;
                }
                None => {
                    pending.push(incoming.clone());
                    summary.entities_created += 1;
                }
            }
        }

        let mut txn = timed(self.graph()?.start_txn())
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to start transaction: {}", e)))?;

        for entity in &pending {
            txn.run(entity_query(entity)?)
                .await
                .map_err(|e| ConkgError::Graph(format!("Failed to store entity {}: {}", entity.id, e)))?;
            tracing::debug!(
                entity_id = %entity.id,
                entity_name = %entity.name,
                entity_type = entity.entity_type.label(),
                "Stored entity"
            );
        }

        for &i in &check.relationships {
            let rel = &result.relationships[i];
            txn.run(relationship_query(rel)?)
                .await
                .map_err(|e| ConkgError::Graph(format!("Failed to store relationship {}: {}", rel.id, e)))?;
            summary.relationships_stored += 1;
        }

        timed(txn.commit())
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to commit transaction: {}", e)))?;

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
        let q = query("MATCH (n {id: $id}) RETURN n").param("id", id.to_string());
        Ok(self.fetch_nodes(q, "query entity").await?.into_iter().next())
    }

    async fn search_entities(
        &self,
        query_str: &str,
        types: &[EntityType],
        limit: usize,
    ) -> Result<Vec<EntityMatch>> {
        let q_lower = query_str.trim().to_lowercase();
        if q_lower.is_empty() {
            return Ok(Vec::new());
        }
        let labels: Vec<String> = types.iter().map(|t| t.label().to_string()).collect();
        let q = query(SEARCH_CYPHER)
            .param("labels", labels)
            .param("query", q_lower.clone())
            .param("limit", SEARCH_CANDIDATES);

        let mut matches: Vec<EntityMatch> = self
            .fetch_nodes(q, "search entities")
            .await?
            .into_iter()
            .filter_map(|entity| {
                match_score(&entity, &q_lower).map(|score| EntityMatch { entity, score })
            })
            .collect();
        rank_matches(&mut matches, limit);

        tracing::debug!(query = query_str, results = matches.len(), "Entity search completed");
        Ok(matches)
    }

    async fn entities_by_type(&self, entity_type: EntityType, limit: usize) -> Result<Vec<Entity>> {
        let cypher = format!(
            "MATCH (n:{}) RETURN n ORDER BY n.name, n.id LIMIT $limit",
            entity_type.label()
        );
        let q = query(&cypher).param("limit", limit as i64);
        self.fetch_nodes(q, "list entities").await
    }

    async fn get_neighbors(&self, entity_id: &str, depth: u32) -> Result<GraphNeighbors> {
        let root_entity = self
            .get_entity(entity_id)
            .await?
            .ok_or_else(|| ConkgError::NotFound(format!("Entity {} not found", entity_id)))?;

        let depth = clamp_depth(depth);
        let cypher = format!(
            "MATCH (root {{id: $id}})-[rs*1..{}]-(m) \
             WHERE m.id <> $id \
             UNWIND rs AS r \
             WITH DISTINCT m, r \
             RETURN m, type(r) AS rel_type, startNode(r).id AS rel_source, \
                    endNode(r).id AS rel_target, r.id AS rel_id, \
                    r.properties AS rel_props, r.confidence AS rel_confidence, \
                    r.source AS rel_origin, r.timestamp AS rel_timestamp",
            depth
        );
        let q = query(&cypher).param("id", entity_id.to_string());

        let mut stream = timed(self.graph()?.execute(q))
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to get neighbors: {}", e)))?;

        let mut neighbors = Vec::new();
        let mut relationships = Vec::new();
        let mut seen_neighbor_ids = HashSet::new();
        let mut seen_rel_keys = HashSet::new();

        loop {
            let row = match stream.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(ConkgError::Graph(format!("Error reading neighbors: {}", e))),
            };

            let neighbor_node: Node = match row.get("m") {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse neighbor node");
                    continue;
                }
            };
            match node_to_entity(&neighbor_node) {
                Ok(neighbor) => {
                    if seen_neighbor_ids.insert(neighbor.id.clone()) {
                        neighbors.push(neighbor);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed neighbor node");
                    continue;
                }
            }

            let rel_type: String = row.get("rel_type").unwrap_or_default();
            let Some(relation_type) = RelationType::from_label(&rel_type) else {
                tracing::warn!(rel_type = %rel_type, "Skipping relationship with unknown type");
                continue;
            };
            let source_entity_id: String = row.get("rel_source").unwrap_or_default();
            let target_entity_id: String = row.get("rel_target").unwrap_or_default();
            if !seen_rel_keys.insert((source_entity_id.clone(), relation_type, target_entity_id.clone())) {
                continue;
            }

            let rel_id: String = row.get("rel_id").unwrap_or_default();
            let props: String = row.get("rel_props").unwrap_or_else(|_| "{}".to_string());
            let timestamp = row
                .get::<String>("rel_timestamp")
                .ok()
                .filter(|s| !s.is_empty())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc));

            relationships.push(Relationship {
                id: Uuid::parse_str(&rel_id).unwrap_or_else(|_| Uuid::new_v4()),
                source_entity_id,
                target_entity_id,
                relation_type,
                properties: serde_json::from_str(&props)
                    .unwrap_or(serde_json::Value::Object(Default::default())),
                confidence: row.get("rel_confidence").unwrap_or(1.0),
                source: row.get("rel_origin").unwrap_or_default(),
                timestamp,
            });
        }

        tracing::debug!(
            entity_id = %entity_id,
            depth = depth,
            neighbor_count = neighbors.len(),
            relationship_count = relationships.len(),
            "Fetched neighbors"
        );

        Ok(GraphNeighbors {
            entity: root_entity,
            relationships,
            neighbors,
        })
    }

    async fn update_status(&self, entity_id: &str, status: &str) -> Result<Entity> {
        let _write = self.write_lock.lock().await;
        let mut entity = self
            .get_entity(entity_id)
            .await?
            .ok_or_else(|| ConkgError::NotFound(format!("Entity {} not found", entity_id)))?;
        let next = check_transition(entity.entity_type, entity.status(), status)?;
        entity.set_property("status", next.clone());
        entity.last_seen = chrono::Utc::now();

        let properties_json = serde_json::to_string(&entity.properties)?;
        let q = query(
            "MATCH (n {id: $id}) SET n.status = $status, n.properties = $properties, n.last_seen = $last_seen",
        )
        .param("id", entity_id.to_string())
        .param("status", next)
        .param("properties", properties_json)
        .param("last_seen", entity.last_seen.to_rfc3339());
        timed(self.graph()?.run(q))
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to update status of {}: {}", entity_id, e)))?;

        tracing::info!(entity_id = %entity_id, status = ?entity.status(), "Updated status");
        Ok(entity)
    }

    async fn overview(&self, project: Option<&str>) -> Result<ProjectOverview> {
        let counts = match project {
            None => {
                self.label_counts(query(
                    "MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS cnt",
                ))
                .await?
            }
            Some(p) => {
                let project_id = self
                    .resolve_project(p)
                    .await?
                    .ok_or_else(|| ConkgError::NotFound(format!("Project {} not found", p)))?;
                let q = query(
                    "MATCH (p:Project {id: $id}) \
                     OPTIONAL MATCH (p)-[*1..2]-(m) \
                     WITH p, collect(DISTINCT m) AS near \
                     UNWIND near + [p] AS n \
                     WITH DISTINCT n \
                     UNWIND labels(n) AS label \
                     RETURN label, count(*) AS cnt",
                )
                .param("id", project_id);
                self.label_counts(q).await?
            }
        };

        let count = |t: EntityType| counts.get(&t).copied().unwrap_or(0);
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
        let counts = self
            .label_counts(query("MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS cnt"))
            .await?;
        Ok(EntityType::ALL
            .iter()
            .filter_map(|t| counts.get(t).map(|&count| EntityTypeStat { entity_type: *t, count }))
            .collect())
    }

    async fn entity_count(&self) -> Result<u64> {
        self.single_count("MATCH (n) RETURN count(n) AS cnt").await
    }

    async fn relationship_count(&self) -> Result<u64> {
        self.single_count("MATCH ()-[r]->() RETURN count(r) AS cnt").await
    }

    async fn clear(&self) -> Result<()> {
        timed(self.graph()?.run(query("MATCH (n) DETACH DELETE n")))
            .await?
            .map_err(|e| ConkgError::Graph(format!("Failed to clear graph: {}", e)))?;
        tracing::info!("Cleared Neo4j graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disconnected_store_reports_graph_errors() {
        let store = Neo4jGraphStore::disconnected();
        assert!(!store.is_connected());
        assert!(matches!(store.entity_count().await, Err(ConkgError::Graph(_))));
        assert!(matches!(store.get_entity("project:x").await, Err(ConkgError::Graph(_))));
        assert!(matches!(
            store.store_extraction(&ExtractionResult::new("t")).await,
            Ok(_) | Err(ConkgError::Graph(_))
        ));
    }

    #[tokio::test]
    async fn test_writes_wait_for_each_other() {
        let store = Neo4jGraphStore::disconnected();
        let mut batch = ExtractionResult::new("t");
        batch.entities.push(Entity::keyed(EntityType::Issue, "Roof leak", "t"));

        let held = store.write_lock.lock().await;
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            store.store_extraction(&batch),
        )
        .await;
        assert!(blocked.is_err());
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            store.update_status("issue:roof-leak", "resolved"),
        )
        .await;
        assert!(blocked.is_err());

        drop(held);
        assert!(matches!(store.store_extraction(&batch).await, Err(ConkgError::Graph(_))));
    }

    #[test]
    fn test_search_orders_candidates_before_limit() {
        let order = SEARCH_CYPHER.find("ORDER BY rank").unwrap();
        let limit = SEARCH_CYPHER.find("LIMIT $limit").unwrap();
        assert!(order < limit);
        let exact = SEARCH_CYPHER.find("lname = $query").unwrap();
        let prefix = SEARCH_CYPHER.find("lname STARTS WITH $query").unwrap();
        let contains = SEARCH_CYPHER.find("lname CONTAINS $query").unwrap();
        assert!(exact < prefix && prefix < contains);
    }

    #[test]
    fn test_constraint_names() {
        assert_eq!(constraint_name("Change_Order", "id"), "change_order_id");
        assert_eq!(constraint_name("Issue", "priority"), "issue_priority");
    }

    #[tokio::test]
    #[ignore = "requires a running Neo4j instance"]
    async fn test_live_roundtrip() {
        let store = Neo4jGraphStore::connect(&AppConfig::from_env()).await;
        store.ensure_schema().await.unwrap();
        let mut batch = ExtractionResult::new("live-test");
        batch.entities.push(Entity::keyed(EntityType::Project, "Live Test Project", "live"));
        let summary = store.store_extraction(&batch).await.unwrap();
        assert_eq!(summary.entities_stored(), 1);
        let found = store.get_entity("project:live-test-project").await.unwrap();
        assert!(found.is_some());
    }
}

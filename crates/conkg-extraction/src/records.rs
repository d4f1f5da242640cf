use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;

use conkg_core::entity::{derive_id, Entity, EntityType, ExtractionResult, RelationType, Relationship};
use conkg_core::error::{ConkgError, Result};

/// Fields lifted out of a record; everything else becomes a property.
const RESERVED: [&str; 4] = ["id", "name", "aliases", "confidence"];

/// Fallback keys used as the display name when a record has no `name`.
const NAME_FALLBACKS: [&str; 6] = ["title", "filename", "number", "subject", "drawing_number", "description"];

#[derive(Debug, Deserialize)]
struct RecordRelationship {
    source: String,
    target: String,
    #[serde(rename = "type")]
    relation_type: String,
    #[serde(default)]
    properties: serde_json::Value,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let cleaned = raw.trim();
    if cleaned.starts_with("```") {
        let start = cleaned.find('{').unwrap_or(0);
        let end = cleaned.rfind('}').map(|i| i + 1).unwrap_or(cleaned.len());
        if start < end {
            return &cleaned[start..end];
        }
    }
    cleaned
}

fn value_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn record_to_entity(
    entity_type: EntityType,
    record: &serde_json::Map<String, serde_json::Value>,
    source: &str,
) -> Option<Entity> {
    let name = record
        .get("name")
        .and_then(value_text)
        .or_else(|| NAME_FALLBACKS.iter().find_map(|k| record.get(*k).and_then(value_text)))
        .or_else(|| record.get("id").and_then(value_text))?;

    let id = record
        .get("id")
        .and_then(value_text)
        .unwrap_or_else(|| derive_id(entity_type, &name));

    let mut entity = Entity::new(entity_type, id, name, source);
    if let Some(aliases) = record.get("aliases").and_then(|a| a.as_array()) {
        entity.aliases = aliases.iter().filter_map(value_text).collect();
    }
    if let Some(c) = record.get("confidence").and_then(|c| c.as_f64()) {
        entity.confidence = c.clamp(0.0, 1.0);
    }
    for (k, v) in record {
        if !RESERVED.contains(&k.as_str()) && !v.is_null() {
            entity.set_property(k, v.clone());
        }
    }
    Some(entity)
}

/// Parse an extraction-record batch: collection keys (`projects`, `people`, ...)
/// holding entity objects, plus `relationships` wiring them by id, name or alias.
pub fn parse_records(raw: &str, source: &str) -> Result<ExtractionResult> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value = serde_json::from_str(cleaned).map_err(|e| {
        tracing::error!(source = %source, error = %e, "Failed to parse extraction records");
        ConkgError::Extraction(format!("Failed to parse extraction records: {e}"))
    })?;
    parse_records_value(&value, source)
}

pub fn parse_records_value(value: &serde_json::Value, source: &str) -> Result<ExtractionResult> {
    let root = value.as_object().ok_or_else(|| {
        ConkgError::Extraction("Extraction records must be a JSON object".into())
    })?;

    let now = Utc::now();
    let mut result = ExtractionResult::new(source);
    let mut lookup: HashMap<String, String> = HashMap::new();

    for (key, items) in root {
        if key == "relationships" {
            continue;
        }
        let Some(entity_type) = EntityType::from_collection(key) else {
            tracing::warn!(collection = %key, "Ignoring unknown collection in extraction records");
            continue;
        };
        let Some(items) = items.as_array() else {
            tracing::warn!(collection = %key, "Collection is not an array, ignoring");
            continue;
        };

        for item in items {
            let Some(record) = item.as_object() else {
                tracing::warn!(collection = %key, "Skipping non-object record");
                continue;
            };
            let Some(mut entity) = record_to_entity(entity_type, record, source) else {
                tracing::warn!(collection = %key, "Skipping record without a name or id");
                continue;
            };
            entity.first_seen = now;
            entity.last_seen = now;

            lookup.insert(entity.id.to_lowercase(), entity.id.clone());
            lookup.entry(entity.name.to_lowercase()).or_insert_with(|| entity.id.clone());
            for alias in &entity.aliases {
                lookup.entry(alias.to_lowercase()).or_insert_with(|| entity.id.clone());
            }
            result.push_entity(entity);
        }
    }

    let rels: Vec<RecordRelationship> = match root.get("relationships") {
        Some(v) if !v.is_null() => serde_json::from_value(v.clone()).map_err(|e| {
            ConkgError::Extraction(format!("Malformed relationships in extraction records: {e}"))
        })?,
        _ => Vec::new(),
    };

    for rec in &rels {
        let source_name = rec.source.trim();
        let target_name = rec.target.trim();
        if source_name.is_empty() || target_name.is_empty() {
            tracing::warn!(
                relation_type = %rec.relation_type,
                "Skipping relationship with a blank endpoint"
            );
            continue;
        }
        // Endpoints outside the batch pass through as raw references for the
        // caller to resolve against stored entities.
        let resolve = |name: &str| {
            lookup.get(&name.to_lowercase()).cloned().unwrap_or_else(|| {
                tracing::debug!(endpoint = %name, "Relationship endpoint not in batch");
                name.to_string()
            })
        };

        let mut rel = Relationship::new(
            resolve(source_name),
            resolve(target_name),
            RelationType::parse_or_related(&rec.relation_type),
            source,
        )
        .with_confidence(rec.confidence);
        if rec.properties.is_object() {
            rel.properties = rec.properties.clone();
        }
        rel.timestamp = Some(now);
        result.push_relationship(rel);
    }

    tracing::info!(
        source = %source,
        entities = result.entities.len(),
        relationships = result.relationships.len(),
        "Parsed extraction records"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_valid() {
        let json = r#"{
            "projects": [
                {"id": "MSC_001", "name": "Microsoft Service Center", "status": "Active", "budget": 50000000}
            ],
            "people": [
                {"name": "John Smith", "role": "Project Manager", "aliases": ["J. Smith"], "confidence": 0.9}
            ],
            "companies": [
                {"name": "ABC Construction", "type": "General Contractor"}
            ],
            "relationships": [
                {"source": "John Smith", "target": "ABC Construction", "type": "works_for"},
                {"source": "j. smith", "target": "MSC_001", "type": "MANAGES", "properties": {"since": "2024"}}
            ]
        }"#;

        let result = parse_records(json, "records.json").unwrap();
        assert_eq!(result.entities.len(), 3);
        assert_eq!(result.relationships.len(), 2);

        let project = result.entities.iter().find(|e| e.entity_type == EntityType::Project).unwrap();
        assert_eq!(project.id, "MSC_001");
        assert_eq!(project.property_text("budget").as_deref(), Some("50000000"));

        let person = result.entities.iter().find(|e| e.entity_type == EntityType::Person).unwrap();
        assert_eq!(person.id, "person:john-smith");
        assert_eq!(person.confidence, 0.9);
        assert!(person.property("aliases").is_none());

        let company = result.entities.iter().find(|e| e.entity_type == EntityType::Company).unwrap();
        assert_eq!(company.property_str("type"), Some("General Contractor"));

        assert_eq!(result.relationships[0].relation_type, RelationType::WorksFor);
        assert_eq!(result.relationships[0].source_entity_id, "person:john-smith");
        assert_eq!(result.relationships[1].relation_type, RelationType::Manages);
        assert_eq!(result.relationships[1].target_entity_id, "MSC_001");
        assert_eq!(result.relationships[1].properties["since"], "2024");
    }

    #[test]
    fn test_parse_records_with_code_fences() {
        let json = "```json\n{\"issues\": [{\"id\": \"ISS-1\", \"description\": \"Water intrusion at level 2\"}]}\n```";
        let result = parse_records(json, "t").unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].entity_type, EntityType::Issue);
        assert_eq!(result.entities[0].name, "Water intrusion at level 2");
        assert_eq!(result.entities[0].id, "ISS-1");
    }

    #[test]
    fn test_endpoint_outside_batch_kept_as_reference() {
        let json = r#"{
            "companies": [{"name": "Alpha Builders"}],
            "relationships": [
                {"source": "Alpha Builders", "target": " person:john-smith ", "type": "pays"},
                {"source": "Alpha Builders", "target": "  ", "type": "pays"}
            ]
        }"#;
        let result = parse_records(json, "t").unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].source_entity_id, "company:alpha-builders");
        assert_eq!(result.relationships[0].target_entity_id, "person:john-smith");
    }

    #[test]
    fn test_unknown_collection_and_relation_type() {
        let json = r#"{
            "spaceships": [{"name": "Enterprise"}],
            "people": [{"name": "Ann Lee"}],
            "tasks": [{"name": "Pour slab"}],
            "relationships": [{"source": "Pour slab", "target": "Ann Lee", "type": "supervised by"}]
        }"#;
        let result = parse_records(json, "t").unwrap();
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.relationships[0].relation_type, RelationType::RelatedTo);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(parse_records("not json at all", "t").is_err());
        assert!(parse_records("[1, 2, 3]", "t").is_err());
    }

    #[test]
    fn test_record_without_name_or_id_skipped() {
        let json = r#"{"materials": [{"quantity": 4}, {"name": "Rebar #5"}]}"#;
        let result = parse_records(json, "t").unwrap();
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].id, "material:rebar-5");
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use conkg_core::entity::{EntityType, ExtractionResult};
use conkg_core::graph::check_batch;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid_entities: usize,
    pub valid_relationships: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a batch before storing it. `existing` maps ids already in the graph to their type.
pub fn validate(result: &ExtractionResult, existing: &HashMap<String, EntityType>) -> ValidationReport {
    let check = check_batch(result, |id| existing.get(id).copied());
    let mut errors = check.entity_errors;
    errors.extend(check.relationship_errors);
    ValidationReport {
        valid_entities: check.entities.len(),
        valid_relationships: check.relationships.len(),
        errors,
        warnings: check.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::parse_records;

    #[test]
    fn test_validate_reports_errors_and_warnings() {
        let batch = parse_records(
            r#"{
                "people": [{"name": "Dana Ruiz"}],
                "projects": [{"name": "Harbor Clinic"}],
                "relationships": [
                    {"source": "Dana Ruiz", "target": "Harbor Clinic", "type": "works_for"}
                ]
            }"#,
            "t",
        )
        .unwrap();

        let clean = validate(&batch, &HashMap::new());
        assert!(clean.is_valid());
        assert_eq!(clean.valid_entities, 2);
        assert_eq!(clean.warnings.len(), 1);

        let existing = HashMap::from([("person:dana-ruiz".to_string(), EntityType::Contractor)]);
        let clash = validate(&batch, &existing);
        assert!(!clash.is_valid());
        assert_eq!(clash.valid_entities, 1);
        // The relationship still resolves against the stored contractor.
        assert_eq!(clash.valid_relationships, 1);
    }
}

use serde::{Deserialize, Serialize};

use crate::entity::{EntityType, RelationType};

use EntityType as E;

impl EntityType {
    /// Documented properties for this node type.
    pub fn properties(&self) -> &'static [&'static str] {
        match self {
            E::Project => &["id", "name", "status", "start_date", "end_date", "budget", "description"],
            E::Phase => &["id", "name", "phase_number", "start_date", "end_date", "status", "kind"],
            E::Task => &["id", "name", "description", "start_date", "end_date", "status", "priority"],
            E::Person => &["name", "email", "phone", "role", "department"],
            E::Company => &["name", "type", "address", "contact_info"],
            E::Contractor => &["name", "trade", "license_number", "contact_info"],
            E::Document => &[
                "filename",
                "file_path",
                "file_type",
                "size",
                "created_date",
                "content",
            ],
            E::Meeting => &["id", "title", "date", "location", "agenda", "minutes"],
            E::Email => &["id", "subject", "sender", "recipients", "date", "body"],
            E::ChangeOrder => &["id", "number", "description", "amount", "status", "date"],
            E::Drawing => &["id", "drawing_number", "title", "revision", "discipline", "date"],
            E::Specification => &["id", "section", "title", "description"],
            E::Material => &["name", "type", "quantity", "unit", "supplier"],
            E::Equipment => &["name", "type", "model", "status"],
            E::Issue => &["id", "description", "priority", "status", "reported_by", "created_date"],
            E::Inspection => &["id", "date", "inspector", "type", "result", "notes"],
            E::TestResult => &["id", "test_type", "date", "result", "value", "unit"],
            E::CostItem => &["id", "description", "amount", "category", "date"],
            E::Invoice => &["id", "number", "amount", "date", "status"],
            E::Payment => &["id", "amount", "date", "method"],
            E::Folder => &["path", "name", "file_count"],
        }
    }

    /// Properties that carry an index in the graph store.
    pub fn indexed_properties(&self) -> &'static [&'static str] {
        match self {
            E::Project | E::Task | E::ChangeOrder | E::Invoice => &["name", "status"],
            E::Issue => &["status", "priority"],
            _ => &["name"],
        }
    }

    /// Whether this type carries a status lifecycle.
    pub fn has_lifecycle(&self) -> bool {
        matches!(self, E::Issue | E::Task)
    }
}

impl RelationType {
    /// Canonical (source types, target types). Empty slices mean any type.
    pub fn endpoints(&self) -> (&'static [EntityType], &'static [EntityType]) {
        match self {
            RelationType::HasPhase => (&[E::Project], &[E::Phase]),
            RelationType::ContainsTask => (&[E::Phase, E::Project], &[E::Task]),
            RelationType::AssignedTo => (
                &[E::Task, E::Issue, E::ChangeOrder, E::Inspection],
                &[E::Person, E::Contractor, E::Company],
            ),
            RelationType::DependsOn => (&[E::Task, E::Phase], &[E::Task, E::Phase]),
            RelationType::BelongsToProject => (&[], &[E::Project]),
            RelationType::CreatedBy => (
                &[E::Document, E::Drawing, E::Specification, E::Email, E::ChangeOrder, E::Issue],
                &[E::Person, E::Company, E::Contractor],
            ),
            RelationType::References => (
                &[E::Document, E::Email, E::Meeting, E::Drawing, E::Specification, E::ChangeOrder],
                &[],
            ),
            RelationType::Discusses => (&[E::Meeting, E::Email, E::Document], &[]),
            RelationType::WorksFor => (&[E::Person], &[E::Company, E::Contractor]),
            RelationType::Attended => (&[E::Person], &[E::Meeting]),
            RelationType::ResponsibleFor => (&[E::Person, E::Company, E::Contractor], &[]),
            RelationType::Shows => (&[E::Drawing], &[]),
            RelationType::Covers => (&[E::Specification], &[E::Material, E::Equipment, E::Task, E::Phase]),
            RelationType::FoundIn => (&[E::Issue], &[E::Inspection, E::TestResult, E::Document, E::Phase, E::Drawing]),
            RelationType::Affects => (&[E::Issue, E::ChangeOrder], &[]),
            RelationType::ForProject => (
                &[E::Invoice, E::Payment, E::CostItem, E::ChangeOrder, E::Inspection],
                &[E::Project],
            ),
            RelationType::PartOf => (&[], &[]),
            RelationType::Pays => (&[E::Payment, E::Company], &[E::Invoice, E::Contractor, E::Company]),
            RelationType::Manages => (&[E::Person], &[E::Project, E::Phase, E::Task]),
            RelationType::ContractedTo => (&[E::Project], &[E::Company, E::Contractor]),
            RelationType::Contains => (&[E::Folder], &[E::Document, E::Folder]),
            RelationType::Approved => (&[E::Person, E::Company], &[]),
            RelationType::Submitted => (&[E::Person, E::Company, E::Contractor], &[]),
            RelationType::RelatedTo => (&[], &[]),
        }
    }

    pub fn allows(&self, source: EntityType, target: EntityType) -> bool {
        let (sources, targets) = self.endpoints();
        (sources.is_empty() || sources.contains(&source))
            && (targets.is_empty() || targets.contains(&target))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTypeSchema {
    pub label: String,
    pub wire_name: String,
    pub collection: String,
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationTypeSchema {
    pub label: String,
    pub source_labels: Vec<String>,
    pub target_labels: Vec<String>,
}

/// Printable description of the graph schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescription {
    pub node_types: Vec<NodeTypeSchema>,
    pub relationship_types: Vec<RelationTypeSchema>,
}

impl SchemaDescription {
    pub fn current() -> Self {
        let labels = |types: &[EntityType]| types.iter().map(|t| t.label().to_string()).collect();
        Self {
            node_types: EntityType::ALL
                .iter()
                .map(|t| NodeTypeSchema {
                    label: t.label().to_string(),
                    wire_name: t.as_str().to_string(),
                    collection: t.collection().to_string(),
                    properties: t.properties().iter().map(|p| p.to_string()).collect(),
                })
                .collect(),
            relationship_types: RelationType::ALL
                .iter()
                .map(|r| {
                    let (src, tgt) = r.endpoints();
                    RelationTypeSchema {
                        label: r.label().to_string(),
                        source_labels: labels(src),
                        target_labels: labels(tgt),
                    }
                })
                .collect(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::from("Node types:\n");
        for node in &self.node_types {
            out.push_str(&format!("  {}: {}\n", node.label, node.properties.join(", ")));
        }
        out.push_str("\nRelationship types:\n");
        for rel in &self.relationship_types {
            let side = |labels: &[String]| {
                if labels.is_empty() {
                    "*".to_string()
                } else {
                    labels.join("|")
                }
            };
            out.push_str(&format!(
                "  ({})-[:{}]->({})\n",
                side(&rel.source_labels),
                rel.label,
                side(&rel.target_labels)
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_endpoints() {
        assert!(RelationType::WorksFor.allows(E::Person, E::Company));
        assert!(RelationType::WorksFor.allows(E::Person, E::Contractor));
        assert!(!RelationType::WorksFor.allows(E::Company, E::Person));
        assert!(RelationType::BelongsToProject.allows(E::Document, E::Project));
        assert!(!RelationType::BelongsToProject.allows(E::Document, E::Task));
        assert!(RelationType::RelatedTo.allows(E::Payment, E::Meeting));
        assert!(RelationType::Contains.allows(E::Folder, E::Document));
    }

    #[test]
    fn test_schema_description_lists_everything() {
        let schema = SchemaDescription::current();
        assert_eq!(schema.node_types.len(), EntityType::ALL.len());
        assert_eq!(schema.relationship_types.len(), RelationType::ALL.len());

        let project = &schema.node_types[0];
        assert_eq!(project.label, "Project");
        assert!(project.properties.contains(&"budget".to_string()));

        let text = schema.render_text();
        assert!(text.contains("Change_Order"));
        assert!(text.contains("(Person)-[:WORKS_FOR]->(Company|Contractor)"));
        assert!(text.contains("(*)-[:RELATED_TO]->(*)"));
    }

    #[test]
    fn test_lifecycle_types() {
        let with: Vec<_> = EntityType::ALL.iter().filter(|t| t.has_lifecycle()).collect();
        assert_eq!(with, vec![&E::Task, &E::Issue]);
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConkgError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Phase,
    Task,
    Person,
    Company,
    Contractor,
    Document,
    Meeting,
    Email,
    ChangeOrder,
    Drawing,
    Specification,
    Material,
    Equipment,
    Issue,
    Inspection,
    TestResult,
    CostItem,
    Invoice,
    Payment,
    Folder,
}

impl EntityType {
    pub const ALL: [EntityType; 21] = [
        EntityType::Project,
        EntityType::Phase,
        EntityType::Task,
        EntityType::Person,
        EntityType::Company,
        EntityType::Contractor,
        EntityType::Document,
        EntityType::Meeting,
        EntityType::Email,
        EntityType::ChangeOrder,
        EntityType::Drawing,
        EntityType::Specification,
        EntityType::Material,
        EntityType::Equipment,
        EntityType::Issue,
        EntityType::Inspection,
        EntityType::TestResult,
        EntityType::CostItem,
        EntityType::Invoice,
        EntityType::Payment,
        EntityType::Folder,
    ];

    /// Node label used in the graph store.
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Project => "Project",
            EntityType::Phase => "Phase",
            EntityType::Task => "Task",
            EntityType::Person => "Person",
            EntityType::Company => "Company",
            EntityType::Contractor => "Contractor",
            EntityType::Document => "Document",
            EntityType::Meeting => "Meeting",
            EntityType::Email => "Email",
            EntityType::ChangeOrder => "Change_Order",
            EntityType::Drawing => "Drawing",
            EntityType::Specification => "Specification",
            EntityType::Material => "Material",
            EntityType::Equipment => "Equipment",
            EntityType::Issue => "Issue",
            EntityType::Inspection => "Inspection",
            EntityType::TestResult => "Test_Result",
            EntityType::CostItem => "Cost_Item",
            EntityType::Invoice => "Invoice",
            EntityType::Payment => "Payment",
            EntityType::Folder => "Folder",
        }
    }

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::Phase => "phase",
            EntityType::Task => "task",
            EntityType::Person => "person",
            EntityType::Company => "company",
            EntityType::Contractor => "contractor",
            EntityType::Document => "document",
            EntityType::Meeting => "meeting",
            EntityType::Email => "email",
            EntityType::ChangeOrder => "change_order",
            EntityType::Drawing => "drawing",
            EntityType::Specification => "specification",
            EntityType::Material => "material",
            EntityType::Equipment => "equipment",
            EntityType::Issue => "issue",
            EntityType::Inspection => "inspection",
            EntityType::TestResult => "test_result",
            EntityType::CostItem => "cost_item",
            EntityType::Invoice => "invoice",
            EntityType::Payment => "payment",
            EntityType::Folder => "folder",
        }
    }

    /// Plural key used for this type in extraction records.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::Project => "projects",
            EntityType::Phase => "phases",
            EntityType::Task => "tasks",
            EntityType::Person => "people",
            EntityType::Company => "companies",
            EntityType::Contractor => "contractors",
            EntityType::Document => "documents",
            EntityType::Meeting => "meetings",
            EntityType::Email => "emails",
            EntityType::ChangeOrder => "change_orders",
            EntityType::Drawing => "drawings",
            EntityType::Specification => "specifications",
            EntityType::Material => "materials",
            EntityType::Equipment => "equipment",
            EntityType::Issue => "issues",
            EntityType::Inspection => "inspections",
            EntityType::TestResult => "test_results",
            EntityType::CostItem => "cost_items",
            EntityType::Invoice => "invoices",
            EntityType::Payment => "payments",
            EntityType::Folder => "folders",
        }
    }

    pub fn from_label(label: &str) -> Option<EntityType> {
        Self::ALL.iter().copied().find(|t| t.label() == label)
    }

    pub fn from_collection(key: &str) -> Option<EntityType> {
        let key = key.trim().to_lowercase();
        Self::ALL.iter().copied().find(|t| t.collection() == key)
    }

    /// Lenient parse accepting labels, wire names, collection names and a few
    /// common synonyms found in construction paperwork.
    pub fn parse(s: &str) -> Option<EntityType> {
        let norm = s.trim().to_lowercase().replace([' ', '-'], "_");
        if let Some(t) = Self::ALL.iter().copied().find(|t| t.as_str() == norm) {
            return Some(t);
        }
        if let Some(t) = Self::from_collection(&norm) {
            return Some(t);
        }
        let t = match norm.as_str() {
            "people" | "employee" | "staff" | "individual" => EntityType::Person,
            "organization" | "organisation" | "org" | "owner" | "vendor" | "supplier" => {
                EntityType::Company
            }
            "subcontractor" | "sub" | "gc" | "general_contractor" => EntityType::Contractor,
            "file" | "report" | "submittal" | "contract" | "letter" => EntityType::Document,
            "rfi" | "problem" | "defect" | "punch_item" => EntityType::Issue,
            "co" | "pco" | "change" => EntityType::ChangeOrder,
            "plan" | "sheet" | "blueprint" => EntityType::Drawing,
            "spec" => EntityType::Specification,
            "test" => EntityType::TestResult,
            "cost" | "budget_item" => EntityType::CostItem,
            "directory" => EntityType::Folder,
            "milestone" | "activity" => EntityType::Task,
            _ => return None,
        };
        Some(t)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EntityType {
    type Err = ConkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::parse(s)
            .ok_or_else(|| ConkgError::Validation(format!("unknown entity type '{s}'")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default = "empty_object")]
    pub properties: serde_json::Value,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_confidence() -> f64 {
    1.0
}

impl Entity {
    pub fn new(
        entity_type: EntityType,
        id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            entity_type,
            name: name.into(),
            aliases: Vec::new(),
            properties: empty_object(),
            source: source.into(),
            confidence: 1.0,
            first_seen: now,
            last_seen: now,
        }
    }

    /// Entity whose id is derived from its type and name.
    pub fn keyed(entity_type: EntityType, name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        let id = derive_id(entity_type, &name);
        Self::new(entity_type, id, name, source)
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        if !self.properties.is_object() {
            self.properties = empty_object();
        }
        if let Some(map) = self.properties.as_object_mut() {
            map.insert(key.to_string(), value.into());
        }
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.as_object().and_then(|m| m.get(key))
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(|v| v.as_str())
    }

    /// Property rendered as display text regardless of its JSON type.
    pub fn property_text(&self, key: &str) -> Option<String> {
        match self.property(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.property_str("description")
    }

    pub fn status(&self) -> Option<&str> {
        self.property_str("status")
    }

    /// Fold a re-observation of the same entity into this one.
    pub fn merge_from(&mut self, other: &Entity) {
        if !other.name.trim().is_empty() {
            self.name = other.name.clone();
        }
        for alias in &other.aliases {
            if !self.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
                self.aliases.push(alias.clone());
            }
        }
        if let Some(incoming) = other.properties.as_object() {
            for (k, v) in incoming {
                self.set_property(k, v.clone());
            }
        }
        if !other.source.is_empty() {
            self.source = other.source.clone();
        }
        self.confidence = self.confidence.max(other.confidence);
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
    }

    /// Whether the query text matches the name or any alias, case-insensitively.
    pub fn is_called(&self, text: &str) -> bool {
        let text = text.trim();
        self.name.eq_ignore_ascii_case(text) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(text))
    }
}

/// Lower-case, dash separated form of a name usable inside ids.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn derive_id(entity_type: EntityType, name: &str) -> String {
    format!("{}:{}", entity_type.as_str(), slugify(name))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    HasPhase,
    ContainsTask,
    AssignedTo,
    DependsOn,
    BelongsToProject,
    CreatedBy,
    References,
    Discusses,
    WorksFor,
    Attended,
    ResponsibleFor,
    Shows,
    Covers,
    FoundIn,
    Affects,
    ForProject,
    PartOf,
    Pays,
    Manages,
    ContractedTo,
    Contains,
    Approved,
    Submitted,
    RelatedTo,
}

impl RelationType {
    pub const ALL: [RelationType; 24] = [
        RelationType::HasPhase,
        RelationType::ContainsTask,
        RelationType::AssignedTo,
        RelationType::DependsOn,
        RelationType::BelongsToProject,
        RelationType::CreatedBy,
        RelationType::References,
        RelationType::Discusses,
        RelationType::WorksFor,
        RelationType::Attended,
        RelationType::ResponsibleFor,
        RelationType::Shows,
        RelationType::Covers,
        RelationType::FoundIn,
        RelationType::Affects,
        RelationType::ForProject,
        RelationType::PartOf,
        RelationType::Pays,
        RelationType::Manages,
        RelationType::ContractedTo,
        RelationType::Contains,
        RelationType::Approved,
        RelationType::Submitted,
        RelationType::RelatedTo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RelationType::HasPhase => "HAS_PHASE",
            RelationType::ContainsTask => "CONTAINS_TASK",
            RelationType::AssignedTo => "ASSIGNED_TO",
            RelationType::DependsOn => "DEPENDS_ON",
            RelationType::BelongsToProject => "BELONGS_TO_PROJECT",
            RelationType::CreatedBy => "CREATED_BY",
            RelationType::References => "REFERENCES",
            RelationType::Discusses => "DISCUSSES",
            RelationType::WorksFor => "WORKS_FOR",
            RelationType::Attended => "ATTENDED",
            RelationType::ResponsibleFor => "RESPONSIBLE_FOR",
            RelationType::Shows => "SHOWS",
            RelationType::Covers => "COVERS",
            RelationType::FoundIn => "FOUND_IN",
            RelationType::Affects => "AFFECTS",
            RelationType::ForProject => "FOR_PROJECT",
            RelationType::PartOf => "PART_OF",
            RelationType::Pays => "PAYS",
            RelationType::Manages => "MANAGES",
            RelationType::ContractedTo => "CONTRACTED_TO",
            RelationType::Contains => "CONTAINS",
            RelationType::Approved => "APPROVED",
            RelationType::Submitted => "SUBMITTED",
            RelationType::RelatedTo => "RELATED_TO",
        }
    }

    pub fn from_label(label: &str) -> Option<RelationType> {
        Self::ALL.iter().copied().find(|t| t.label() == label)
    }

    /// Lenient parse; `None` when nothing matches.
    pub fn parse(s: &str) -> Option<RelationType> {
        let norm = s.trim().to_uppercase().replace([' ', '-'], "_");
        if let Some(t) = Self::from_label(&norm) {
            return Some(t);
        }
        let t = match norm.as_str() {
            "EMPLOYED_BY" | "EMPLOYEE_OF" | "WORKS_AT" => RelationType::WorksFor,
            "ASSIGNED" | "OWNED_BY" => RelationType::AssignedTo,
            "MANAGED_BY" | "PROJECT_MANAGER_OF" | "LEADS" => RelationType::Manages,
            "CONTRACTOR_FOR" | "CONTRACTED_WITH" | "HAS_CONTRACTOR" => RelationType::ContractedTo,
            "BELONGS_TO" | "IN_PROJECT" | "HAS_DOCUMENT" => RelationType::BelongsToProject,
            "AUTHORED_BY" | "WRITTEN_BY" | "PREPARED_BY" => RelationType::CreatedBy,
            "MENTIONS" | "REFERS_TO" | "CITES" => RelationType::References,
            "DEPENDS" | "BLOCKED_BY" | "PRECEDED_BY" => RelationType::DependsOn,
            "PAID" | "PAYS_FOR" => RelationType::Pays,
            "APPROVES" => RelationType::Approved,
            "SUBMITS" => RelationType::Submitted,
            "RESPONSIBLE" | "OWNS" => RelationType::ResponsibleFor,
            "ATTENDS" | "PARTICIPATED_IN" => RelationType::Attended,
            "MEMBER_OF" | "SUBSIDIARY_OF" | "WITHIN" => RelationType::PartOf,
            "ASSOCIATED_WITH" | "RELATED" => RelationType::RelatedTo,
            _ => return None,
        };
        Some(t)
    }

    /// Lenient parse falling back to `RelatedTo`.
    pub fn parse_or_related(s: &str) -> RelationType {
        match Self::parse(s) {
            Some(t) => t,
            None => {
                tracing::warn!(relation_type = %s, "Unknown relation type, defaulting to RELATED_TO");
                RelationType::RelatedTo
            }
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub relation_type: RelationType,
    #[serde(default = "empty_object")]
    pub properties: serde_json::Value,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub source: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Relationship {
    pub fn new(
        source_entity_id: impl Into<String>,
        target_entity_id: impl Into<String>,
        relation_type: RelationType,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_entity_id: source_entity_id.into(),
            target_entity_id: target_entity_id.into(),
            relation_type,
            properties: empty_object(),
            confidence: 1.0,
            source: source.into(),
            timestamp: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Identity of the edge: at most one per (source, type, target).
    pub fn key(&self) -> (String, RelationType, String) {
        (
            self.source_entity_id.clone(),
            self.relation_type,
            self.target_entity_id.clone(),
        )
    }

    pub fn merge_from(&mut self, other: &Relationship) {
        if let Some(incoming) = other.properties.as_object() {
            if !self.properties.is_object() {
                self.properties = empty_object();
            }
            if let Some(map) = self.properties.as_object_mut() {
                for (k, v) in incoming {
                    map.insert(k.clone(), v.clone());
                }
            }
        }
        self.confidence = self.confidence.max(other.confidence);
        if other.timestamp.is_some() {
            self.timestamp = other.timestamp;
        }
    }

    /// The endpoint on the other side of `entity_id`, if this edge touches it.
    pub fn other_end(&self, entity_id: &str) -> Option<&str> {
        if self.source_entity_id == entity_id {
            Some(&self.target_entity_id)
        } else if self.target_entity_id == entity_id {
            Some(&self.source_entity_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub raw_source: String,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn new(raw_source: impl Into<String>) -> Self {
        Self {
            entities: Vec::new(),
            relationships: Vec::new(),
            raw_source: raw_source.into(),
            extracted_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }

    /// Add an entity, merging into an earlier one with the same id.
    pub fn push_entity(&mut self, entity: Entity) {
        match self.entities.iter_mut().find(|e| e.id == entity.id) {
            Some(existing) => existing.merge_from(&entity),
            None => self.entities.push(entity),
        }
    }

    /// Add a relationship unless an identical edge is already present.
    pub fn push_relationship(&mut self, rel: Relationship) {
        let key = rel.key();
        match self.relationships.iter_mut().find(|r| r.key() == key) {
            Some(existing) => existing.merge_from(&rel),
            None => self.relationships.push(rel),
        }
    }

    pub fn extend(&mut self, other: ExtractionResult) {
        for entity in other.entities {
            self.push_entity(entity);
        }
        for rel in other.relationships {
            self.push_relationship(rel);
        }
    }
}

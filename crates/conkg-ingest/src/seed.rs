use serde_json::json;

use conkg_core::entity::{Entity, EntityType, ExtractionResult, RelationType, Relationship};

const SOURCE: &str = "sample_data";

fn link(result: &mut ExtractionResult, source: &Entity, relation: RelationType, target: &Entity) {
    result.push_relationship(Relationship::new(
        source.id.clone(),
        target.id.clone(),
        relation,
        SOURCE,
    ));
}

/// The Microsoft Service Center sample project.
pub fn sample_project() -> ExtractionResult {
    let mut result = ExtractionResult::new(SOURCE);

    let project = Entity::keyed(EntityType::Project, "Microsoft Service Center", SOURCE)
        .with_aliases(["Microsoft project", "MSC"])
        .with_property("status", "active")
        .with_property("start_date", "2019-01-01")
        .with_property("end_date", "2020-06-30")
        .with_property("budget", 50_000_000)
        .with_property("description", "Construction of Microsoft Service Center facility");

    let john = Entity::keyed(EntityType::Person, "John Smith", SOURCE)
        .with_property("email", "j.smith@contractor.com")
        .with_property("role", "Project Manager")
        .with_property("department", "Construction");
    let sarah = Entity::keyed(EntityType::Person, "Sarah Johnson", SOURCE)
        .with_property("email", "s.johnson@msft.com")
        .with_property("role", "Owner Representative")
        .with_property("department", "Facilities");
    let mike = Entity::keyed(EntityType::Person, "Mike Chen", SOURCE)
        .with_property("email", "m.chen@architect.com")
        .with_property("role", "Senior Architect")
        .with_property("department", "Design");

    let contractor = Entity::keyed(EntityType::Company, "McGuire and Hester", SOURCE)
        .with_aliases(["McGuire & Hester"])
        .with_property("type", "General Contractor")
        .with_property("specialization", "Commercial Construction");
    let owner = Entity::keyed(EntityType::Company, "Microsoft Corporation", SOURCE)
        .with_aliases(["Microsoft"])
        .with_property("type", "Owner")
        .with_property("specialization", "Technology");

    let phase = Entity::keyed(EntityType::Phase, "Phase 1", SOURCE)
        .with_property("kind", "phase")
        .with_property("phase_number", "1")
        .with_property("start_date", "2019-01-15")
        .with_property("end_date", "2019-09-30");
    let foundation = Entity::keyed(EntityType::Task, "Foundation pour", SOURCE)
        .with_property("status", "complete")
        .with_property("due_date", "2019-03-01");
    let elevator = Entity::keyed(EntityType::Task, "Elevator installation", SOURCE)
        .with_property("status", "in_progress")
        .with_property("due_date", "2019-08-15");
    let issue = Entity::keyed(EntityType::Issue, "Elevator shaft dimension conflict", SOURCE)
        .with_property("status", "open")
        .with_property("priority", "high")
        .with_property("created_date", "2019-05-02")
        .with_property(
            "description",
            "Shaft width on the architectural drawings does not match the elevator submittal",
        );
    let change_order = Entity::keyed(EntityType::ChangeOrder, "CO 7", SOURCE)
        .with_property("kind", "co")
        .with_property("number", "7")
        .with_property("amount", 48_500)
        .with_property("status", "pending")
        .with_property("description", "Widen elevator shaft by 4 inches");
    let report = Entity::keyed(EntityType::Document, "Elevator coordination report", SOURCE)
        .with_property("filename", "elevator_coordination_report.txt")
        .with_property("file_type", "txt")
        .with_property("kind", "report")
        .with_property(
            "content",
            "Elevator coordination meeting 2019-05-06. John Smith reviewed the shaft conflict \
             with Mike Chen. The elevator supplier requires a wider shaft than shown on drawing \
             A-201-3. McGuire and Hester submitted CO 7 for $48,500 to widen the shaft. \
             Sarah Johnson will review the change order for the owner.",
        );

    for e in [
        &project, &john, &sarah, &mike, &contractor, &owner, &phase, &foundation, &elevator, &issue,
        &change_order, &report,
    ] {
        result.push_entity(e.clone());
    }

    link(&mut result, &john, RelationType::WorksFor, &contractor);
    link(&mut result, &mike, RelationType::WorksFor, &contractor);
    link(&mut result, &sarah, RelationType::WorksFor, &owner);
    link(&mut result, &john, RelationType::Manages, &project);
    link(&mut result, &project, RelationType::ContractedTo, &contractor);
    link(&mut result, &project, RelationType::HasPhase, &phase);
    link(&mut result, &phase, RelationType::ContainsTask, &foundation);
    link(&mut result, &phase, RelationType::ContainsTask, &elevator);
    link(&mut result, &elevator, RelationType::AssignedTo, &mike);
    link(&mut result, &issue, RelationType::AssignedTo, &john);
    link(&mut result, &issue, RelationType::BelongsToProject, &project);
    link(&mut result, &issue, RelationType::Affects, &elevator);
    link(&mut result, &change_order, RelationType::ForProject, &project);
    link(&mut result, &contractor, RelationType::Submitted, &change_order);
    link(&mut result, &report, RelationType::BelongsToProject, &project);
    link(&mut result, &report, RelationType::Discusses, &issue);
    link(&mut result, &report, RelationType::References, &change_order);

    if let Some(rel) = result.relationships.iter_mut().find(|r| {
        r.relation_type == RelationType::Manages && r.source_entity_id == john.id
    }) {
        rel.properties = json!({ "since": "2019-01-01" });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use conkg_core::graph::check_batch;

    #[test]
    fn test_sample_project_is_consistent() {
        let sample = sample_project();
        assert_eq!(sample.entities.len(), 12);
        let check = check_batch(&sample, |_| None);
        assert!(check.entity_errors.is_empty());
        assert!(check.relationship_errors.is_empty());
        assert!(check.warnings.is_empty(), "{:?}", check.warnings);
        assert_eq!(check.relationships.len(), sample.relationships.len());
    }

    #[test]
    fn test_sample_ids_are_derived() {
        let sample = sample_project();
        let ids: Vec<_> = sample.entities.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"project:microsoft-service-center"));
        assert!(ids.contains(&"person:john-smith"));
        assert!(ids.contains(&"company:mcguire-and-hester"));
        assert!(ids.contains(&"change_order:co-7"));
    }
}

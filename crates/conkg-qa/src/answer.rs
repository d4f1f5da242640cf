use conkg_core::entity::{Entity, EntityType, RelationType};
use conkg_core::qa::QueryIntent;

use crate::recipes::{schedule_date, GraphItem};

pub const SAMPLE_QUESTIONS: [&str; 8] = [
    "Who is the project manager for the Microsoft project?",
    "What documents are related to the elevator system?",
    "What's the current status of the project?",
    "Show me all pending tasks",
    "What companies are involved in this project?",
    "Find all files related to electrical work",
    "When is the project scheduled to complete?",
    "What issues need immediate attention?",
];

pub const NO_EVIDENCE_ANSWER: &str = "I couldn't find any information related to your question. \
Could you try rephrasing it or asking about a specific project, person, or document?";

pub const MAX_PASSAGES: usize = 3;
pub const PASSAGE_CHARS: usize = 240;

const LIST_LIMIT: usize = 10;
const ORGANISATIONS: [EntityType; 2] = [EntityType::Company, EntityType::Contractor];

/// A text chunk quoted under the answer.
#[derive(Debug, Clone)]
pub struct Passage {
    pub label: String,
    pub text: String,
}

/// Collapse whitespace and cut to at most [`PASSAGE_CHARS`] characters.
pub fn clip_passage(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PASSAGE_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(PASSAGE_CHARS - 3).collect();
    if let Some(space) = cut.rfind(' ') {
        if space > PASSAGE_CHARS / 2 {
            cut.truncate(space);
        }
    }
    cut.push_str("...");
    cut
}

/// Integers get thousands separators; anything else is shown as written.
pub fn format_amount(value: &serde_json::Value) -> String {
    let digits = match value {
        serde_json::Value::Number(n) if n.as_i64().is_some() => n.to_string(),
        serde_json::Value::Number(n) => return format!("{:.2}", n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => return s.clone(),
        other => return other.to_string(),
    };
    let (sign, digits) = digits.strip_prefix('-').map_or(("", digits.as_str()), |d| ("-", d));
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}")
}

fn names<'a>(entities: impl Iterator<Item = &'a Entity>) -> String {
    entities.map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
}

fn company_of(item: &GraphItem) -> Option<&Entity> {
    item.first_linked(RelationType::WorksFor, true, &ORGANISATIONS)
}

fn project_of(item: &GraphItem) -> Option<&Entity> {
    let projects = [EntityType::Project];
    item.first_linked(RelationType::Manages, true, &projects)
        .or_else(|| item.first_linked(RelationType::BelongsToProject, true, &projects))
        .or_else(|| item.first_linked(RelationType::ForProject, true, &projects))
        .or_else(|| item.first_linked(RelationType::AssignedTo, true, &projects))
}

fn people(items: &[GraphItem]) -> String {
    if let [item] = items {
        let person = &item.entity;
        let role = person.property_str("role").unwrap_or("team member");
        let mut answer = format!("**{}** is the {}", person.name, role);
        if let Some(project) = project_of(item) {
            answer.push_str(&format!(" for the {} project", project.name));
        }
        if let Some(email) = person.property_str("email") {
            answer.push_str(&format!(". You can reach them at {email}"));
        }
        if let Some(company) = company_of(item) {
            answer.push_str(&format!(". They work for {}", company.name));
        }
        answer.push('.');
        return answer;
    }
    let mut answer = format!("I found {} people:\n\n", items.len());
    for item in items.iter().take(LIST_LIMIT) {
        let role = item.entity.property_str("role").unwrap_or("Team member");
        answer.push_str(&format!("• **{}** - {}", item.entity.name, role));
        if let Some(company) = company_of(item) {
            answer.push_str(&format!(" at {}", company.name));
        }
        answer.push('\n');
    }
    answer
}

fn project_info(items: &[GraphItem]) -> String {
    let Some(item) = items.first() else {
        return String::new();
    };
    let project = &item.entity;
    let mut answer = format!("**{}**\n\n", project.name);
    answer.push_str(&format!(
        "• **Status**: {}\n",
        project.status().unwrap_or("Unknown")
    ));
    if let Some(budget) = project.property("budget").filter(|v| !v.is_null()) {
        answer.push_str(&format!("• **Budget**: ${}\n", format_amount(budget)));
    }
    answer.push_str(&format!(
        "• **Start Date**: {}\n",
        project.property_text("start_date").unwrap_or_else(|| "Unknown".to_string())
    ));
    if let Some(end) = project.property_text("end_date") {
        answer.push_str(&format!("• **End Date**: {end}\n"));
    }
    let contractors = names(item.linked(RelationType::ContractedTo, true));
    if !contractors.is_empty() {
        answer.push_str(&format!("• **Contractor**: {contractors}\n"));
    }
    let managers = names(item.linked(RelationType::Manages, false));
    if !managers.is_empty() {
        answer.push_str(&format!("• **Managers**: {managers}\n"));
    }
    if let Some(description) = project.description() {
        answer.push_str(&format!("• **Description**: {description}\n"));
    }
    if items.len() > 1 {
        answer.push_str(&format!(
            "\nOther projects: {}\n",
            names(items[1..].iter().map(|i| &i.entity))
        ));
    }
    answer
}

fn documents(items: &[GraphItem]) -> String {
    let mut answer = format!("I found {} documents:\n\n", items.len());
    for item in items.iter().take(LIST_LIMIT) {
        let doc = &item.entity;
        answer.push_str(&format!("• **{}**", doc.name));
        let kind = doc
            .property_str("file_type")
            .unwrap_or_else(|| doc.entity_type.label());
        answer.push_str(&format!(" ({kind})"));
        if let Some(project) = project_of(item) {
            answer.push_str(&format!(" - {}", project.name));
        }
        answer.push('\n');
    }
    answer
}

fn issues(items: &[GraphItem]) -> String {
    let mut answer = format!("I found {} issues and change orders:\n\n", items.len());
    for item in items.iter().take(LIST_LIMIT) {
        let e = &item.entity;
        answer.push_str(&format!("• **{}**", e.name));
        let mut tags = Vec::new();
        if let Some(priority) = e.property_str("priority") {
            tags.push(format!("priority {priority}"));
        }
        if let Some(status) = e.status() {
            tags.push(status.to_string());
        }
        if let Some(amount) = e.property("amount").filter(|v| !v.is_null()) {
            tags.push(format!("${}", format_amount(amount)));
        }
        if !tags.is_empty() {
            answer.push_str(&format!(" [{}]", tags.join(", ")));
        }
        let assignee = item
            .first_linked(RelationType::AssignedTo, true, &[EntityType::Person])
            .map(|p| p.name.clone());
        if let Some(assignee) = assignee {
            answer.push_str(&format!(" - assigned to {assignee}"));
        }
        if let Some(description) = e.description() {
            answer.push_str(&format!(": {description}"));
        }
        answer.push('\n');
    }
    answer
}

fn schedule(items: &[GraphItem]) -> String {
    let mut answer = "Here is the schedule:\n\n".to_string();
    for item in items.iter().take(LIST_LIMIT) {
        let e = &item.entity;
        answer.push_str(&format!("• **{}** ({})", e.name, e.entity_type.label()));
        match (e.property_text("start_date"), e.property_text("end_date")) {
            (Some(start), Some(end)) => answer.push_str(&format!(" {start} to {end}")),
            _ => {
                if let Some(date) = schedule_date(e) {
                    answer.push_str(&format!(" due {date}"));
                }
            }
        }
        if let Some(status) = e.status() {
            answer.push_str(&format!(" - {status}"));
        }
        answer.push('\n');
    }
    answer
}

fn general(items: &[GraphItem], header: &str) -> String {
    let mut answer = format!("{header}\n\n");
    for item in items.iter().take(LIST_LIMIT) {
        let e = &item.entity;
        answer.push_str(&format!("• **{}** ({})", e.name, e.entity_type.label()));
        if let Some(detail) = e.description().or_else(|| e.status()) {
            answer.push_str(&format!(" - {detail}"));
        }
        answer.push('\n');
    }
    answer
}

/// Render the answer text for graph items and supporting passages.
pub fn compose(intent: QueryIntent, items: &[GraphItem], passages: &[Passage]) -> String {
    if items.is_empty() && passages.is_empty() {
        return NO_EVIDENCE_ANSWER.to_string();
    }

    let mut answer = if items.is_empty() {
        "I didn't find matching entities in the knowledge graph, but these passages look relevant:\n"
            .to_string()
    } else {
        match intent {
            QueryIntent::People => people(items),
            QueryIntent::ProjectInfo => project_info(items),
            QueryIntent::Documents => documents(items),
            QueryIntent::Issues => issues(items),
            QueryIntent::Schedule => schedule(items),
            QueryIntent::Materials => general(items, "Materials and costs I found:"),
            QueryIntent::General => general(items, "Here's what I found:"),
        }
    };

    let shown: Vec<&Passage> = passages.iter().take(MAX_PASSAGES).collect();
    if !shown.is_empty() {
        if !items.is_empty() {
            answer = answer.trim_end().to_string();
            answer.push_str("\n\n**Supporting passages**\n");
        }
        for p in shown {
            answer.push_str(&format!("\n> {} ({})\n", clip_passage(&p.text), p.label));
        }
    }
    answer.trim_end().to_string()
}

pub fn confidence(graph_evidence: bool, best_vector_score: Option<f32>) -> f64 {
    if !graph_evidence && best_vector_score.is_none() {
        return 0.1;
    }
    let graph = if graph_evidence { 0.3 } else { 0.0 };
    let vector = best_vector_score.map_or(0.0, |s| f64::from(s).clamp(0.0, 1.0));
    (0.5 + graph + 0.2 * vector).min(0.95)
}

pub fn suggestions(intent: QueryIntent, top: Option<&Entity>, found_anything: bool) -> Vec<String> {
    if !found_anything {
        return SAMPLE_QUESTIONS.iter().take(3).map(|q| q.to_string()).collect();
    }
    let subject = top.map_or("this project".to_string(), |e| e.name.clone());
    let mut out = vec![format!("Show me more details about {subject}")];
    let follow_ups = [
        (QueryIntent::People, "Who else is involved in this project?".to_string()),
        (QueryIntent::Documents, format!("What documents are related to {subject}?")),
        (QueryIntent::Issues, "Are there any issues or concerns?".to_string()),
        (QueryIntent::Schedule, "When is the project scheduled to complete?".to_string()),
    ];
    for (for_intent, question) in follow_ups {
        if for_intent != intent {
            out.push(question);
        }
    }
    out.truncate(4);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::Link;

    fn item(entity: Entity, links: Vec<(RelationType, bool, Entity)>) -> GraphItem {
        GraphItem {
            entity,
            links: links
                .into_iter()
                .map(|(relation, outgoing, entity)| Link {
                    relation,
                    outgoing,
                    entity,
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_person_sentence() {
        let project = Entity::keyed(EntityType::Project, "Microsoft Service Center", "t");
        let company = Entity::keyed(EntityType::Company, "McGuire and Hester", "t");
        let john = Entity::keyed(EntityType::Person, "John Smith", "t")
            .with_property("role", "Project Manager")
            .with_property("email", "j.smith@contractor.com");
        let items = vec![item(
            john,
            vec![
                (RelationType::Manages, true, project),
                (RelationType::WorksFor, true, company),
            ],
        )];
        let answer = compose(QueryIntent::People, &items, &[]);
        assert_eq!(
            answer,
            "**John Smith** is the Project Manager for the Microsoft Service Center project. \
             You can reach them at j.smith@contractor.com. They work for McGuire and Hester."
        );
    }

    #[test]
    fn test_project_card_formats_budget() {
        let project = Entity::keyed(EntityType::Project, "MSC", "t")
            .with_property("status", "active")
            .with_property("budget", 50_000_000)
            .with_property("start_date", "2019-01-01");
        let contractor = Entity::keyed(EntityType::Company, "McGuire and Hester", "t");
        let items = vec![item(project, vec![(RelationType::ContractedTo, true, contractor)])];
        let answer = compose(QueryIntent::ProjectInfo, &items, &[]);
        assert!(answer.contains("• **Budget**: $50,000,000"));
        assert!(answer.contains("• **Contractor**: McGuire and Hester"));
        assert!(answer.contains("• **Start Date**: 2019-01-01"));
    }

    #[test]
    fn test_amounts_and_passages() {
        assert_eq!(format_amount(&serde_json::json!(48500)), "48,500");
        assert_eq!(format_amount(&serde_json::json!(-1234567)), "-1,234,567");
        assert_eq!(format_amount(&serde_json::json!(999)), "999");
        assert_eq!(format_amount(&serde_json::json!("TBD")), "TBD");

        let long = "word ".repeat(100);
        let clipped = clip_passage(&long);
        assert!(clipped.chars().count() <= PASSAGE_CHARS);
        assert!(clipped.ends_with("..."));
        assert_eq!(clip_passage("  short\n text "), "short text");
    }

    #[test]
    fn test_no_evidence_answer_and_suggestions() {
        assert_eq!(compose(QueryIntent::General, &[], &[]), NO_EVIDENCE_ANSWER);
        let s = suggestions(QueryIntent::General, None, false);
        assert_eq!(s.len(), 3);
        assert_eq!(s[0], SAMPLE_QUESTIONS[0]);

        let top = Entity::keyed(EntityType::Issue, "Leak", "t");
        let s = suggestions(QueryIntent::Issues, Some(&top), true);
        assert_eq!(s[0], "Show me more details about Leak");
        assert!(!s.iter().any(|q| q == "Are there any issues or concerns?"));
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(confidence(false, None), 0.1);
        assert!((confidence(true, None) - 0.8).abs() < 1e-9);
        assert!((confidence(false, Some(0.5)) - 0.6).abs() < 1e-9);
        assert_eq!(confidence(true, Some(1.0)), 0.95);
        assert!((confidence(true, Some(-0.4)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_passages_only_answer() {
        let passages = vec![Passage {
            label: "report.txt".to_string(),
            text: "The shaft is too narrow.".to_string(),
        }];
        let answer = compose(QueryIntent::Documents, &[], &passages);
        assert!(answer.starts_with("I didn't find matching entities"));
        assert!(answer.ends_with("> The shaft is too narrow. (report.txt)"));
    }
}

use conkg_core::entity::{Entity, EntityType};

#[derive(Debug, Clone)]
struct GazetteerEntry {
    needle: String,
    entity_id: String,
    entity_type: EntityType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GazetteerMatch<'a> {
    pub entity_id: &'a str,
    pub entity_type: EntityType,
    pub matched_len: usize,
}

/// Known entity names used to link free-text spans to graph entities.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

/// Types whose names are worth looking for in document text.
pub const GAZETTEER_TYPES: [EntityType; 8] = [
    EntityType::Person,
    EntityType::Company,
    EntityType::Contractor,
    EntityType::Project,
    EntityType::Task,
    EntityType::Issue,
    EntityType::ChangeOrder,
    EntityType::Drawing,
];

/// Spans and names shorter than this are ignored.
pub const MIN_SPAN_CHARS: usize = 4;

impl Gazetteer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities<'a, I>(entities: I) -> Self
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut g = Self::new();
        for e in entities {
            g.add(e);
        }
        g
    }

    pub fn add(&mut self, entity: &Entity) {
        for name in std::iter::once(&entity.name).chain(entity.aliases.iter()) {
            let needle = name.trim().to_lowercase();
            if needle.chars().count() < MIN_SPAN_CHARS {
                continue;
            }
            if self
                .entries
                .iter()
                .any(|e| e.needle == needle && e.entity_id == entity.id)
            {
                continue;
            }
            self.entries.push(GazetteerEntry {
                needle,
                entity_id: entity.id.clone(),
                entity_type: entity.entity_type,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Longest known name occurring in `span` as whole words, case-insensitively.
    pub fn resolve(&self, span: &str) -> Option<(&str, EntityType)> {
        self.resolve_match(span).map(|m| (m.entity_id, m.entity_type))
    }

    pub fn resolve_match(&self, span: &str) -> Option<GazetteerMatch<'_>> {
        let hay = span.to_lowercase();
        self.entries
            .iter()
            .filter(|e| contains_word(&hay, &e.needle))
            .max_by(|a, b| {
                a.needle
                    .len()
                    .cmp(&b.needle.len())
                    .then_with(|| b.entity_id.cmp(&a.entity_id))
            })
            .map(|e| GazetteerMatch {
                entity_id: e.entity_id.as_str(),
                entity_type: e.entity_type,
                matched_len: e.needle.len(),
            })
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `needle` occurs in `hay` with non-word characters (or the ends) on both sides.
pub fn contains_word(hay: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = hay[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = hay[..start].chars().next_back().map_or(true, |c| !is_word_char(c));
        let after_ok = hay[end..].chars().next().map_or(true, |c| !is_word_char(c));
        if before_ok && after_ok {
            return true;
        }
        from = start + needle.chars().next().map_or(1, char::len_utf8);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_word() {
        assert!(contains_word("john smith approved it", "john smith"));
        assert!(contains_word("(acme corp)", "acme corp"));
        assert!(!contains_word("johnsmith approved", "john"));
        assert!(!contains_word("reacme", "acme"));
        assert!(contains_word("reacme and acme", "acme"));
    }

    #[test]
    fn test_resolve_prefers_longest_name() {
        let g = Gazetteer::from_entities(&[
            Entity::keyed(EntityType::Company, "Acme", "t"),
            Entity::keyed(EntityType::Company, "Acme Steel Erectors", "t"),
            Entity::keyed(EntityType::Person, "Bo", "t"),
        ]);
        assert_eq!(g.len(), 2);
        let (id, t) = g.resolve("Yesterday Acme Steel Erectors submitted").unwrap();
        assert_eq!(id, "company:acme-steel-erectors");
        assert_eq!(t, EntityType::Company);
        assert!(g.resolve("Nothing relevant here").is_none());
    }

    #[test]
    fn test_aliases_are_indexed() {
        let person = Entity::keyed(EntityType::Person, "Jonathan Smith", "t").with_aliases(["John Smith"]);
        let g = Gazetteer::from_entities([&person]);
        assert_eq!(g.resolve("john smith approved").map(|r| r.0), Some("person:jonathan-smith"));
    }
}

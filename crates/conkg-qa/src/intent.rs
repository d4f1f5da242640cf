use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use conkg_core::qa::QueryIntent;
use conkg_extraction::PatternExtractor;

/// Keyword lists in tie-break order: an earlier intent wins an equal score.
const INTENT_KEYWORDS: [(QueryIntent, &[&str]); 6] = [
    (
        QueryIntent::ProjectInfo,
        &[
            "project", "budget", "timeline", "status", "schedule", "start date", "end date",
            "completion", "progress",
        ],
    ),
    (
        QueryIntent::People,
        &[
            "manager", "contractor", "team", "contact", "responsible", "assigned", "who is",
            "who does", "person", "employee",
        ],
    ),
    (
        QueryIntent::Documents,
        &[
            "document", "file", "drawing", "specification", "contract", "submittal", "rfi", "plan",
            "blueprint", "report",
        ],
    ),
    (
        QueryIntent::Issues,
        &[
            "problem", "issue", "delay", "conflict", "risk", "discrepancy", "change order", "concern",
        ],
    ),
    (
        QueryIntent::Materials,
        &[
            "material", "equipment", "supply", "vendor", "cost", "procurement", "delivery",
            "installation",
        ],
    ),
    (
        QueryIntent::Schedule,
        &[
            "when", "deadline", "milestone", "phase", "task", "due date", "completion date", "schedule",
        ],
    ),
];

pub const ROLE_WORDS: [&str; 6] = ["manager", "contractor", "superintendent", "engineer", "architect", "inspector"];

pub const DOCUMENT_KINDS: [&str; 7] = ["drawing", "spec", "contract", "rfi", "submittal", "plan", "report"];

/// Capitalised words that open questions rather than name things.
const LEADING_WORDS: [&str; 22] = [
    "who", "what", "when", "where", "which", "why", "how", "show", "list", "find", "give", "tell",
    "are", "is", "does", "do", "can", "i", "me", "the", "a", "an",
];

const STOPWORDS: [&str; 24] = [
    "about", "with", "from", "that", "this", "these", "those", "there", "their", "have", "what",
    "which", "where", "when", "does", "need", "needs", "show", "tell", "list", "related", "all",
    "any", "for",
];

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“]([^"”]{2,})["”]"#).expect("valid quote pattern"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionAnalysis {
    pub intent: QueryIntent,
    /// Candidate entity names: quoted text, capitalised phrases, construction codes.
    pub phrases: Vec<String>,
    pub roles: Vec<String>,
    pub document_kinds: Vec<String>,
    /// Lower-cased content words used for fallback searches.
    pub keywords: Vec<String>,
}

pub fn classify(question: &str) -> QueryIntent {
    let q = question.to_lowercase();
    let mut best = (QueryIntent::General, 0);
    for (intent, keywords) in INTENT_KEYWORDS {
        let score = keywords.iter().filter(|k| q.contains(*k)).count();
        if score > best.1 {
            best = (intent, score);
        }
    }
    best.0
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        out.push(value);
    }
}

fn clean_token(token: &str) -> &str {
    let t = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '&');
    t.strip_suffix("'s").or_else(|| t.strip_suffix("’s")).unwrap_or(t)
}

fn capitalised_phrases(question: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let flush = |current: &mut Vec<&str>, phrases: &mut Vec<String>| {
        if !current.is_empty() {
            let phrase = current.join(" ");
            if phrase.chars().count() >= 3 {
                push_unique(phrases, phrase);
            }
            current.clear();
        }
    };

    for (i, raw) in question.split_whitespace().enumerate() {
        let token = clean_token(raw);
        let capitalised = token.chars().next().is_some_and(char::is_uppercase);
        let connector = !current.is_empty() && matches!(token, "&" | "and" | "of");
        let numeric = !current.is_empty() && !token.is_empty() && token.chars().all(|c| c.is_ascii_digit());
        let leading = i == 0 || LEADING_WORDS.contains(&token.to_lowercase().as_str());

        if capitalised && !(leading && current.is_empty()) {
            current.push(token);
        } else if connector || numeric {
            current.push(token);
        } else {
            flush(&mut current, &mut phrases);
        }
        // a phrase never runs across punctuation
        if raw.ends_with(|c: char| matches!(c, ',' | '.' | '?' | '!' | ';' | ':')) {
            flush(&mut current, &mut phrases);
        }
    }
    flush(&mut current, &mut phrases);

    phrases
        .into_iter()
        .map(|p| {
            p.trim_end_matches(" and")
                .trim_end_matches(" of")
                .trim_end_matches(" &")
                .to_string()
        })
        .collect()
}

pub fn analyze(question: &str) -> QuestionAnalysis {
    let lower = question.to_lowercase();
    let mut phrases = Vec::new();

    for caps in QUOTED_RE.captures_iter(question) {
        push_unique(&mut phrases, caps[1].trim().to_string());
    }
    for entity in PatternExtractor::references(question, "question") {
        push_unique(&mut phrases, entity.name);
    }
    for phrase in capitalised_phrases(question) {
        push_unique(&mut phrases, phrase);
    }

    let roles = ROLE_WORDS
        .iter()
        .filter(|r| lower.contains(*r))
        .map(|r| r.to_string())
        .collect();
    let document_kinds = DOCUMENT_KINDS
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| k.to_string())
        .collect();

    let intent_words: Vec<&str> = INTENT_KEYWORDS
        .iter()
        .flat_map(|(_, kws)| kws.iter().copied())
        .collect();
    let mut keywords = Vec::new();
    for word in lower.split(|c: char| !c.is_alphanumeric()) {
        if word.chars().count() >= 4
            && !STOPWORDS.contains(&word)
            && !intent_words.iter().any(|k| k.starts_with(word) || word.starts_with(k))
        {
            push_unique(&mut keywords, word.to_string());
        }
    }

    QuestionAnalysis {
        intent: classify(question),
        phrases,
        roles,
        document_kinds,
        keywords,
    }
}

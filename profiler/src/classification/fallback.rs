//! Deterministic classification built without the classifier
//!
//! Terms from the visitor's most recent answer are matched against recorded
//! page text. Matching passages become the relevant sections; when nothing
//! matches, a fixed generic classification is used instead.

use super::QualityGate;
use crate::model::{Classification, ClassificationDraft, ClassificationSource};

/// Shortest term from the answer used as a keyword
const MIN_KEYWORD_CHARS: usize = 3;

/// Passages must be longer than this to be used
const MIN_PASSAGE_CHARS: usize = 50;

/// Passages are cut to this many chars
const MAX_PASSAGE_CHARS: usize = 200;

const GENERIC_SECTIONS: &[&str] = &[
    "Latest features include advanced performance capabilities and innovative technology integrations.",
    "Comprehensive functionality offering enhanced user experience and productivity improvements.",
    "Flexible plans and onboarding resources help new customers get started quickly and confidently.",
    "Dedicated help channels and detailed documentation support customers throughout their journey.",
];

/// Lowercased terms of `answer` long enough to be meaningful
pub fn keywords(answer: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in answer.split_whitespace() {
        let term = term
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if term.chars().count() >= MIN_KEYWORD_CHARS && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Longest passage kept before cutting, never below the gate's minimum
fn max_passage_chars(gate: &QualityGate) -> usize {
    MAX_PASSAGE_CHARS.max(gate.min_section_length)
}

fn truncate(passage: &str, max_chars: usize) -> String {
    if passage.chars().count() <= max_chars {
        return passage.to_string();
    }
    let cut: String = passage.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Passages from `candidates` mentioning any keyword, in candidate order
fn matching_passages(keywords: &[String], candidates: &[String], gate: &QualityGate) -> Vec<String> {
    if keywords.is_empty() {
        return Vec::new();
    }
    let mut matches: Vec<String> = Vec::new();
    for candidate in candidates {
        let passage = candidate.trim();
        if passage.chars().count() <= MIN_PASSAGE_CHARS || gate.banned_phrase_in(passage).is_some()
        {
            continue;
        }
        let lower = passage.to_lowercase();
        if keywords.iter().any(|k| lower.contains(k.as_str())) {
            let truncated = truncate(passage, max_passage_chars(gate));
            if truncated.chars().count() < gate.min_section_length {
                continue;
            }
            if !matches.contains(&truncated) {
                matches.push(truncated);
            }
        }
        if matches.len() >= gate.min_relevant_sections {
            break;
        }
    }
    matches
}

/// Generic sentences joined until the passage meets `min_chars`
fn generic_passage(start: usize, min_chars: usize) -> String {
    let mut passage = String::new();
    for sentence in GENERIC_SECTIONS.iter().cycle().skip(start) {
        if !passage.is_empty() {
            passage.push(' ');
        }
        passage.push_str(sentence);
        if passage.chars().count() >= min_chars {
            break;
        }
    }
    passage
}

fn pad_with_generic(sections: &mut Vec<String>, gate: &QualityGate) {
    let required = gate.min_relevant_sections.max(1);
    let mut start = 0;
    while sections.len() < required {
        sections.push(generic_passage(start, gate.min_section_length));
        start = (start + 1) % GENERIC_SECTIONS.len();
    }
}

/// Build a fallback classification for a session
///
/// `candidates` is the page text to search, most specific first.
pub fn heuristic_classification(
    session_id: &str,
    latest_answer: Option<&str>,
    candidates: &[String],
    gate: &QualityGate,
) -> Classification {
    let answer = latest_answer.map(str::trim).filter(|a| !a.is_empty());
    let terms = answer.map(keywords).unwrap_or_default();
    let mut sections = matching_passages(&terms, candidates, gate);

    let interests = match answer {
        Some(answer) if !sections.is_empty() => vec![format!(
            "Focused interest in {} and its specific capabilities",
            answer
        )],
        Some(answer) => vec![format!(
            "Interest in {} features and functionality",
            answer
        )],
        None => vec!["Interest in specific product features and capabilities".to_string()],
    };

    pad_with_generic(&mut sections, gate);

    Classification::from_draft(
        session_id,
        ClassificationDraft {
            interests,
            relevant_sections: sections,
        },
        ClassificationSource::Fallback,
    )
}

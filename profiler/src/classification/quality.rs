//! Quality gate for generated classifications

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ClassificationDraft;

/// Why a classification draft was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    #[error("no interests")]
    NoInterests,

    #[error("{found} relevant sections, at least {required} required")]
    TooFewSections { found: usize, required: usize },

    #[error("relevant section {index} has {length} chars, at least {required} required")]
    SectionTooShort {
        index: usize,
        length: usize,
        required: usize,
    },

    #[error("relevant section {index} contains boilerplate phrase '{phrase}'")]
    BannedPhrase { index: usize, phrase: String },
}

/// Acceptance rules for classifier output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGate {
    pub min_relevant_sections: usize,
    pub min_section_length: usize,
    /// Matched case-insensitively
    pub banned_phrases: Vec<String>,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            min_relevant_sections: 2,
            min_section_length: 50,
            banned_phrases: vec![
                "the website provides".to_string(),
                "information about".to_string(),
                "contains information".to_string(),
            ],
        }
    }
}

impl QualityGate {
    pub fn check(&self, draft: &ClassificationDraft) -> Result<(), QualityIssue> {
        if draft.interests.iter().all(|i| i.trim().is_empty()) {
            return Err(QualityIssue::NoInterests);
        }
        if draft.relevant_sections.len() < self.min_relevant_sections {
            return Err(QualityIssue::TooFewSections {
                found: draft.relevant_sections.len(),
                required: self.min_relevant_sections,
            });
        }
        for (index, section) in draft.relevant_sections.iter().enumerate() {
            let length = section.trim().chars().count();
            if length < self.min_section_length {
                return Err(QualityIssue::SectionTooShort {
                    index,
                    length,
                    required: self.min_section_length,
                });
            }
            if let Some(phrase) = self.banned_phrase_in(section) {
                return Err(QualityIssue::BannedPhrase {
                    index,
                    phrase: phrase.to_string(),
                });
            }
        }
        Ok(())
    }

    /// First banned phrase found in `text`, if any
    pub fn banned_phrase_in(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.banned_phrases
            .iter()
            .find(|phrase| lower.contains(&phrase.to_lowercase()))
            .map(String::as_str)
    }
}

//! Quiz answer grading.
//!
//! Grading is binary: a question awards either its full `point` value or
//! nothing. Choice questions need the exact set of correct options, free-text
//! questions need at least half of the configured keywords as whole words.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Text,
    ImageText,
    /// Anything stored that this build does not know how to grade.
    #[serde(other)]
    Unknown,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleChoice => "single_choice",
            Self::MultipleChoice => "multiple_choice",
            Self::Text => "text",
            Self::ImageText => "image_text",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&str> for QuestionType {
    fn from(value: &str) -> Self {
        match value {
            "single_choice" => Self::SingleChoice,
            "multiple_choice" => Self::MultipleChoice,
            "text" => Self::Text,
            "image_text" => Self::ImageText,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to grade one question, detached from storage.
#[derive(Debug, Clone)]
pub struct QuestionRule {
    pub kind: QuestionType,
    pub point: i32,
    pub correct_options: HashSet<Uuid>,
    pub keywords: Vec<String>,
}

/// Points awarded for one submitted answer.
pub fn score(rule: &QuestionRule, selected: Option<&[Uuid]>, text: Option<&str>) -> i32 {
    let awarded = match rule.kind {
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            let submitted: HashSet<Uuid> = selected.unwrap_or_default().iter().copied().collect();
            submitted == rule.correct_options
        }
        QuestionType::Text | QuestionType::ImageText => match text {
            Some(text) if !text.is_empty() && !rule.keywords.is_empty() => {
                keyword_ratio_reached(text, &rule.keywords)
            }
            _ => false,
        },
        QuestionType::Unknown => false,
    };

    if awarded { rule.point } else { 0 }
}

/// Presence check used outside of scoring: every keyword must appear as a
/// case-insensitive substring of `text`. Only image questions qualify.
pub fn check_answer(rule: &QuestionRule, text: &str) -> bool {
    if rule.kind != QuestionType::ImageText || text.is_empty() {
        return false;
    }

    let answer = text.to_lowercase();
    rule.keywords
        .iter()
        .all(|kw| answer.contains(&kw.to_lowercase()))
}

fn keyword_ratio_reached(text: &str, keywords: &[String]) -> bool {
    let lowered = text.to_lowercase();
    let words: HashSet<&str> = lowered
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .filter(|w| !w.is_empty())
        .collect();

    // duplicates in the keyword list count once per occurrence
    let found = keywords
        .iter()
        .filter(|kw| words.contains(kw.to_lowercase().as_str()))
        .count();

    // found / len >= 0.5 without going through floats
    found * 2 >= keywords.len()
}

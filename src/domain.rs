//! Domain models: challenge parameters, generated questions, grading
//! results, solutions, and persisted attempt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Difficulty levels for practice challenges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        };
        f.write_str(s)
    }
}

/// What kind of question the user asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionTypePreference {
    Coding,
    Conceptual,
    Both,
}

/// What the gateway actually generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionTypeGenerated {
    Coding,
    Conceptual,
    Both,
}

/// Which half of a generated question is currently shown/answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveDisplayType {
    Coding,
    Conceptual,
}

impl std::fmt::Display for ActiveDisplayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ActiveDisplayType::Coding => "coding",
            ActiveDisplayType::Conceptual => "conceptual",
        })
    }
}

/// Parameters fixed for the lifetime of one practice session.
/// Changing any field means starting a new session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeParameters {
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_type_preference: QuestionTypePreference,
}

impl ChallengeParameters {
    /// All three fields must be present and the topic non-empty before any
    /// gateway call is attempted.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.topic.trim().is_empty() {
            return Err(AppError::MissingParameters(
                "topic must be a non-empty string".into(),
            ));
        }
        Ok(())
    }
}

/// A generated question payload. The field matching
/// `question_type_generated` (or both, for `both`) must be present;
/// the contract layer rejects anything else before it reaches here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_question: Option<String>,
    /// Ordered least to most revealing, 1..=3 entries when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_hints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conceptual_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conceptual_hints: Option<Vec<String>>,
    pub question_type_generated: QuestionTypeGenerated,
}

impl GeneratedQuestion {
    /// The display type a fresh question opens with: coding whenever a
    /// coding half exists, conceptual otherwise.
    pub fn default_display_type(&self) -> ActiveDisplayType {
        match self.question_type_generated {
            QuestionTypeGenerated::Coding | QuestionTypeGenerated::Both => {
                ActiveDisplayType::Coding
            }
            QuestionTypeGenerated::Conceptual => ActiveDisplayType::Conceptual,
        }
    }

    /// True only for `both`-type questions, which support switching halves.
    pub fn supports_switching(&self) -> bool {
        self.question_type_generated == QuestionTypeGenerated::Both
    }

    pub fn question_for(&self, display: ActiveDisplayType) -> Option<&str> {
        match display {
            ActiveDisplayType::Coding => self.coding_question.as_deref(),
            ActiveDisplayType::Conceptual => self.conceptual_question.as_deref(),
        }
    }
}

/// Verdict for one submitted attempt. `passed` is the single authority
/// downstream; the contract layer has already checked it against `score`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GradingResult {
    pub score: u8,
    pub feedback: String,
    pub passed: bool,
}

/// Reference solution, only fetched after a failed attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedSolution {
    pub solution: String,
    pub explanation: String,
}

/// One persisted attempt. Append-only: never mutated or deleted here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_type: ActiveDisplayType,
    pub question: String,
    pub user_solution: String,
    pub grading_result: GradingResult,
    pub generated_solution: Option<GeneratedSolution>,
    pub created_at: DateTime<Utc>,
}

/// An attempt record as handed to the store; `id` and `created_at` are
/// assigned at write time.
#[derive(Clone, Debug)]
pub struct NewHistoryEntry {
    pub user_id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub question_type: ActiveDisplayType,
    pub question: String,
    pub user_solution: String,
    pub grading_result: GradingResult,
    pub generated_solution: Option<GeneratedSolution>,
}

/// History query filter. Absent fields match everything; present fields
/// are combined with logical AND.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub question_type: Option<ActiveDisplayType>,
}

impl HistoryFilter {
    pub fn passed_only() -> Self {
        HistoryFilter {
            passed: Some(true),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &ChallengeHistoryEntry) -> bool {
        if let Some(topic) = &self.topic {
            if &entry.topic != topic {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if entry.difficulty != difficulty {
                return false;
            }
        }
        if let Some(passed) = self.passed {
            if entry.grading_result.passed != passed {
                return false;
            }
        }
        if let Some(question_type) = self.question_type {
            if entry.question_type != question_type {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(topic: &str, difficulty: Difficulty, passed: bool) -> ChallengeHistoryEntry {
        ChallengeHistoryEntry {
            id: "e1".into(),
            user_id: "u1".into(),
            topic: topic.into(),
            difficulty,
            question_type: ActiveDisplayType::Coding,
            question: "q".into(),
            user_solution: "s".into(),
            grading_result: GradingResult {
                score: if passed { 80 } else { 40 },
                feedback: "f".into(),
                passed,
            },
            generated_solution: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_topic_is_rejected() {
        let params = ChallengeParameters {
            topic: "   ".into(),
            difficulty: Difficulty::Beginner,
            question_type_preference: QuestionTypePreference::Coding,
        };
        assert!(matches!(
            params.validate(),
            Err(AppError::MissingParameters(_))
        ));
    }

    #[test]
    fn default_display_prefers_coding() {
        let q = GeneratedQuestion {
            coding_question: Some("write a closure".into()),
            coding_hints: Some(vec!["h1".into()]),
            conceptual_question: Some("what is a closure".into()),
            conceptual_hints: Some(vec!["h1".into()]),
            question_type_generated: QuestionTypeGenerated::Both,
        };
        assert_eq!(q.default_display_type(), ActiveDisplayType::Coding);
        assert!(q.supports_switching());
    }

    #[test]
    fn filter_fields_combine_with_and() {
        let filter = HistoryFilter {
            topic: Some("Closures".into()),
            passed: Some(true),
            ..Default::default()
        };
        assert!(filter.matches(&entry("Closures", Difficulty::Beginner, true)));
        assert!(!filter.matches(&entry("Closures", Difficulty::Beginner, false)));
        assert!(!filter.matches(&entry("Borrowing", Difficulty::Beginner, true)));
    }

    #[test]
    fn absent_filter_matches_all() {
        let filter = HistoryFilter::default();
        assert!(filter.matches(&entry("Anything", Difficulty::Advanced, false)));
    }
}

//! Request/response contracts for each AI operation.
//!
//! Inputs are validated before the gateway issues a network call; a bad
//! input is a `MissingParameters` failure and never reaches the backend.
//! Outputs are validated after the call; a malformed payload is a
//! `SchemaViolation` and never reaches the rest of the system. This is the
//! only defense against a non-deterministic backend drifting off shape.

use serde::{Deserialize, Serialize};

use crate::domain::{
    ActiveDisplayType, Difficulty, GeneratedQuestion, GeneratedSolution, GradingResult,
    QuestionTypeGenerated, QuestionTypePreference,
};
use crate::error::AppError;
use crate::interview::{ConversationMessage, InterviewDifficulty};
use crate::util::is_blank;

/// Hints per question: at least one, at most three.
pub const MAX_HINTS: usize = 3;
/// Scores at or above this are a pass. Enforced against `passed` below.
pub const PASS_THRESHOLD: u8 = 60;

fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if is_blank(value) {
        return Err(AppError::MissingParameters(format!(
            "{field} must be a non-empty string"
        )));
    }
    Ok(())
}

fn schema_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if is_blank(value) {
        return Err(AppError::SchemaViolation(format!("{field} is empty")));
    }
    Ok(())
}

// ---- generate_question ----

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGenerationInput {
    pub topic: String,
    pub difficulty: Difficulty,
    pub preferred_question_type: QuestionTypePreference,
}

impl QuestionGenerationInput {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.topic, "topic")
    }
}

fn check_question_half(
    question: Option<&String>,
    hints: Option<&Vec<String>>,
    label: &str,
) -> Result<(), AppError> {
    let q = question.ok_or_else(|| {
        AppError::SchemaViolation(format!("{label} question missing for generated type"))
    })?;
    schema_non_empty(q, label)?;
    let hints = hints.ok_or_else(|| {
        AppError::SchemaViolation(format!("{label} hints missing for generated type"))
    })?;
    if hints.is_empty() || hints.len() > MAX_HINTS {
        return Err(AppError::SchemaViolation(format!(
            "{label} hints must contain 1..={MAX_HINTS} entries, got {}",
            hints.len()
        )));
    }
    for (i, hint) in hints.iter().enumerate() {
        schema_non_empty(hint, &format!("{label} hint #{}", i + 1))?;
    }
    Ok(())
}

/// The invariant from the question contract: the half matching
/// `question_type_generated` (or both halves) must be present and complete.
pub fn validate_generated_question(q: &GeneratedQuestion) -> Result<(), AppError> {
    match q.question_type_generated {
        QuestionTypeGenerated::Coding => {
            check_question_half(q.coding_question.as_ref(), q.coding_hints.as_ref(), "coding")
        }
        QuestionTypeGenerated::Conceptual => check_question_half(
            q.conceptual_question.as_ref(),
            q.conceptual_hints.as_ref(),
            "conceptual",
        ),
        QuestionTypeGenerated::Both => {
            check_question_half(q.coding_question.as_ref(), q.coding_hints.as_ref(), "coding")?;
            check_question_half(
                q.conceptual_question.as_ref(),
                q.conceptual_hints.as_ref(),
                "conceptual",
            )
        }
    }
}

// ---- grade_code / grade_answer ----

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCodeInput {
    pub code: String,
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

impl GradeCodeInput {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.code, "code")?;
        require_non_empty(&self.topic, "topic")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerGradingInput {
    pub question: String,
    pub user_answer: String,
    pub topic: String,
    pub difficulty: Difficulty,
}

impl AnswerGradingInput {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.question, "question")?;
        require_non_empty(&self.user_answer, "userAnswer")?;
        require_non_empty(&self.topic, "topic")
    }
}

/// Grading payload checks: score bounds, non-empty feedback, and the
/// pass-threshold policy. A result where `passed` disagrees with the
/// score never escapes the contract layer.
pub fn validate_grading_result(r: &GradingResult) -> Result<(), AppError> {
    if r.score > 100 {
        return Err(AppError::SchemaViolation(format!(
            "score {} outside 0..=100",
            r.score
        )));
    }
    schema_non_empty(&r.feedback, "feedback")?;
    let expected = r.score >= PASS_THRESHOLD;
    if r.passed != expected {
        return Err(AppError::SchemaViolation(format!(
            "passed={} inconsistent with score={} (threshold {PASS_THRESHOLD})",
            r.passed, r.score
        )));
    }
    Ok(())
}

// ---- generate_solution ----

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionGenerationInput {
    pub topic: String,
    pub difficulty: Difficulty,
    pub question: String,
    pub question_type: ActiveDisplayType,
}

impl SolutionGenerationInput {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.topic, "topic")?;
        require_non_empty(&self.question, "question")
    }
}

pub fn validate_generated_solution(s: &GeneratedSolution) -> Result<(), AppError> {
    schema_non_empty(&s.solution, "solution")?;
    schema_non_empty(&s.explanation, "explanation")
}

// ---- generate_topic ----

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicGenerationInput {
    pub difficulty: Difficulty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicGenerationOutput {
    pub topic: String,
}

pub fn validate_topic_output(t: &TopicGenerationOutput) -> Result<(), AppError> {
    schema_non_empty(&t.topic, "topic")
}

// ---- explain_topic ----

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopicExplainerInput {
    pub topic: String,
}

impl TopicExplainerInput {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.topic, "topic")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodeExample {
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicExplainerOutput {
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_examples: Option<Vec<CodeExample>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_concepts: Option<Vec<String>>,
}

pub fn validate_explainer_output(out: &TopicExplainerOutput) -> Result<(), AppError> {
    schema_non_empty(&out.explanation, "explanation")?;
    if let Some(examples) = &out.code_examples {
        for (i, ex) in examples.iter().enumerate() {
            schema_non_empty(&ex.language, &format!("codeExamples[{i}].language"))?;
            schema_non_empty(&ex.code, &format!("codeExamples[{i}].code"))?;
        }
    }
    Ok(())
}

// ---- conduct_interview_turn ----

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewTurnInput {
    pub topic: String,
    pub difficulty: InterviewDifficulty,
    pub conversation_history: Vec<ConversationMessage>,
}

impl InterviewTurnInput {
    pub fn validate(&self) -> Result<(), AppError> {
        require_non_empty(&self.topic, "topic")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewTurnOutput {
    pub ai_response_text: String,
}

pub fn validate_interview_output(out: &InterviewTurnOutput) -> Result<(), AppError> {
    schema_non_empty(&out.ai_response_text, "aiResponseText")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grading(score: u8, passed: bool) -> GradingResult {
        GradingResult {
            score,
            feedback: "detailed feedback".into(),
            passed,
        }
    }

    #[test]
    fn passed_must_track_score_threshold() {
        assert!(validate_grading_result(&grading(60, true)).is_ok());
        assert!(validate_grading_result(&grading(59, false)).is_ok());
        // Policy violations are schema violations, not silently accepted.
        assert!(matches!(
            validate_grading_result(&grading(80, false)),
            Err(AppError::SchemaViolation(_))
        ));
        assert!(matches!(
            validate_grading_result(&grading(45, true)),
            Err(AppError::SchemaViolation(_))
        ));
    }

    #[test]
    fn score_above_range_is_rejected() {
        assert!(matches!(
            validate_grading_result(&grading(101, true)),
            Err(AppError::SchemaViolation(_))
        ));
    }

    #[test]
    fn both_question_requires_both_halves() {
        let q = GeneratedQuestion {
            coding_question: Some("implement debounce".into()),
            coding_hints: Some(vec!["think timers".into()]),
            conceptual_question: None,
            conceptual_hints: None,
            question_type_generated: QuestionTypeGenerated::Both,
        };
        assert!(matches!(
            validate_generated_question(&q),
            Err(AppError::SchemaViolation(_))
        ));
    }

    #[test]
    fn hint_count_is_bounded() {
        let q = GeneratedQuestion {
            coding_question: Some("implement debounce".into()),
            coding_hints: Some(vec!["a".into(), "b".into(), "c".into(), "d".into()]),
            conceptual_question: None,
            conceptual_hints: None,
            question_type_generated: QuestionTypeGenerated::Coding,
        };
        assert!(validate_generated_question(&q).is_err());
    }

    #[test]
    fn empty_code_rejected_before_any_call() {
        let input = GradeCodeInput {
            code: "   ".into(),
            topic: "JavaScript Closures".into(),
            difficulty: Difficulty::Beginner,
            expected_output: None,
        };
        assert!(matches!(
            input.validate(),
            Err(AppError::MissingParameters(_))
        ));
    }
}

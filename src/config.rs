//! Loading prompt configuration from TOML.
//!
//! Every AI operation reads its system prompt and user template from
//! `Prompts`. Compiled-in defaults work out of the box; a TOML file pointed
//! at by PROMPT_CONFIG_PATH can override any of them to tune tone/structure.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptConfig {
    #[serde(default)]
    pub prompts: Prompts,
}

/// Prompts used by the AI gateway. Templates use `{key}` placeholders
/// filled by `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
    // Question generation (one call per question type; "both" fans out).
    pub question_system: String,
    pub question_user_template: String,
    // Grading
    pub grade_code_system: String,
    pub grade_code_user_template: String,
    pub grade_answer_system: String,
    pub grade_answer_user_template: String,
    // Reference solution after a failed attempt
    pub solution_system: String,
    pub solution_user_template: String,
    // Topic suggestion + explainer
    pub topic_system: String,
    pub topic_user_template: String,
    pub explain_system: String,
    pub explain_user_template: String,
    // Mock interview
    pub interview_system: String,
    pub interview_user_template: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            question_system: "You are an expert generator of programming practice questions. Respond ONLY with strict JSON.".into(),
            question_user_template: "Generate one {question_type} question about '{topic}' at difficulty '{difficulty}', plus 1-3 hints ordered least to most revealing. Hints must not give away the solution or contain code. Return JSON: {\"question\": string, \"hints\": [string]}.".into(),

            grade_code_system: "You are an AI code reviewer. Grade code for correctness, efficiency, and style. Respond ONLY with strict JSON.".into(),
            grade_code_user_template: "Topic: {topic}\nDifficulty: {difficulty}\nCode:\n```\n{code}\n```\n{expected_output_section}Return JSON {\"score\": integer 0-100, \"feedback\": string, \"passed\": boolean}. passed MUST be true exactly when score >= 60. Feedback must be constructive. Consider edge cases, error handling, and overall quality.".into(),

            grade_answer_system: "You are an AI teaching assistant evaluating conceptual answers. Respond ONLY with strict JSON.".into(),
            grade_answer_user_template: "Topic: {topic}\nDifficulty: {difficulty}\nQuestion:\n{question}\n\nUser's answer:\n{user_answer}\n\nScore for correctness, clarity, and completeness. Return JSON {\"score\": integer 0-100, \"feedback\": string, \"passed\": boolean}. passed MUST be true exactly when score >= 60.".into(),

            solution_system: "You are an expert programming tutor writing reference solutions. Respond ONLY with strict JSON.".into(),
            solution_user_template: "Topic: {topic}\nDifficulty: {difficulty}\nQuestion type: {question_type}\nQuestion:\n{question}\n\nFor coding questions the solution field holds only runnable code; for conceptual questions a thorough textual answer. The explanation field summarizes the key concepts or steps. Return JSON {\"solution\": string, \"explanation\": string}.".into(),

            topic_system: "You are a programming tutor. Suggest one concrete, specific practice topic. Respond ONLY with strict JSON.".into(),
            topic_user_template: "Suggest a single programming topic suitable for difficulty '{difficulty}'. Prefer narrow topics ('JavaScript Array methods like .map()') over broad ones ('JavaScript Arrays'). Return JSON {\"topic\": string}.".into(),

            explain_system: "You are an expert educator and technical writer. Respond ONLY with strict JSON.".into(),
            explain_user_template: "Explain the topic '{topic}' for a learner new to it. Return JSON {\"explanation\": string, \"codeExamples\": [{\"language\": string, \"code\": string, \"title\": string?}]?, \"diagramDescription\": string?, \"keyConcepts\": [string]?}. Include 1-2 short code examples when the topic is programming-related, a textual description of a simple conceptual diagram when one helps, and 2-4 key takeaways.".into(),

            interview_system: "You are an expert AI interviewer for the topic '{topic}' at the '{difficulty}' level. Ask one clear, concise question at a time. If the conversation history is empty, open with an appropriate greeting question; never greet again once history exists. Do not give feedback during the interview. Respond ONLY with strict JSON.".into(),
            interview_user_template: "Conversation so far:\n{history}\n\nBased on the candidate's answers, ask the next question. Return JSON {\"aiResponseText\": string}.".into(),
        }
    }
}

/// Attempt to load `PromptConfig` from PROMPT_CONFIG_PATH. On any
/// parsing/IO error, returns None and the defaults stay in effect.
pub fn load_prompt_config_from_env() -> Option<PromptConfig> {
    let path = std::env::var("PROMPT_CONFIG_PATH").ok()?;
    match std::fs::read_to_string(&path) {
        Ok(s) => match toml::from_str::<PromptConfig>(&s) {
            Ok(cfg) => {
                info!(target: "codecrafter_backend", %path, "Loaded prompt config (TOML)");
                Some(cfg)
            }
            Err(e) => {
                error!(target: "codecrafter_backend", %path, error = %e, "Failed to parse TOML config");
                None
            }
        },
        Err(e) => {
            error!(target: "codecrafter_backend", %path, error = %e, "Failed to read TOML config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_override_keeps_defaults_for_unset_fields() {
        let cfg: PromptConfig = toml::from_str(
            r#"
[prompts]
topic_system = "Suggest topics tersely."
"#,
        )
        .unwrap();
        assert_eq!(cfg.prompts.topic_system, "Suggest topics tersely.");
        assert!(!cfg.prompts.question_system.is_empty());
        assert!(cfg.prompts.grade_code_user_template.contains("{code}"));
    }
}

//! Minimal OpenAI client for our use-cases.
//!
//! Every operation requests a strict JSON object from chat.completions and
//! validates it against its contract before anything downstream sees it.
//! Calls are instrumented and log model names, latencies, and sizes (not
//! contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Prompts;
use crate::contracts::{
    self, AnswerGradingInput, GradeCodeInput, InterviewTurnInput, InterviewTurnOutput,
    QuestionGenerationInput, SolutionGenerationInput, TopicExplainerInput, TopicExplainerOutput,
    TopicGenerationInput, TopicGenerationOutput,
};
use crate::domain::{
    ActiveDisplayType, GeneratedQuestion, GeneratedSolution, GradingResult, QuestionTypeGenerated,
    QuestionTypePreference,
};
use crate::error::AppError;
use crate::interview::{InterviewGateway, Role};
use crate::session::ChallengeGateway;
use crate::util::fill_template;

#[derive(Clone)]
pub struct OpenAI {
    client: reqwest::Client,
    api_key: String,
    pub base_url: String,
    pub fast_model: String,
    pub strong_model: String,
    prompts: Prompts,
}

/// Shape of one single-type question generation call; the public
/// `GeneratedQuestion` is assembled from one or two of these.
#[derive(Deserialize)]
struct SingleQuestionOut {
    question: String,
    hints: Vec<String>,
}

impl OpenAI {
    /// Construct the client if we find OPENAI_API_KEY; otherwise None.
    pub fn from_env(prompts: Prompts) -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let fast_model =
            std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        let strong_model = std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .ok()?;

        Some(Self {
            client,
            api_key,
            base_url,
            fast_model,
            strong_model,
            prompts,
        })
    }

    /// JSON-object chat completion. Generic over the target type T.
    #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
    async fn chat_json<T: DeserializeOwned>(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<T, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        let req = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessageReq {
                    role: "system".into(),
                    content: system.into(),
                },
                ChatMessageReq {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
            temperature,
            response_format: Some(ResponseFormat {
                r#type: "json_object".into(),
            }),
        };

        let start = std::time::Instant::now();
        let res = self
            .client
            .post(&url)
            .header(USER_AGENT, "codecrafter-backend/0.1")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await
            .map_err(|e| AppError::UpstreamError(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &body));
        }

        let body: ChatCompletionResponse = res
            .json()
            .await
            .map_err(|e| AppError::UpstreamError(format!("undecodable completion envelope: {e}")))?;
        if let Some(usage) = &body.usage {
            info!(
                prompt_tokens = ?usage.prompt_tokens,
                completion_tokens = ?usage.completion_tokens,
                total_tokens = ?usage.total_tokens,
                elapsed = ?start.elapsed(),
                "OpenAI usage"
            );
        }
        let text = body
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(AppError::SchemaViolation("empty completion content".into()));
        }

        serde_json::from_str::<T>(&text)
            .map_err(|e| AppError::SchemaViolation(format!("JSON parse error: {e}")))
    }

    // --- High-level operations ---

    async fn single_question(
        &self,
        topic: &str,
        difficulty: &str,
        question_type: ActiveDisplayType,
    ) -> Result<SingleQuestionOut, AppError> {
        let user = fill_template(
            &self.prompts.question_user_template,
            &[
                ("topic", topic),
                ("difficulty", difficulty),
                ("question_type", &question_type.to_string()),
            ],
        );
        self.chat_json(&self.strong_model, &self.prompts.question_system, &user, 0.9)
            .await
    }

    #[instrument(level = "info", skip(self, input), fields(topic_len = input.topic.len(), difficulty = %input.difficulty))]
    pub async fn generate_question_impl(
        &self,
        input: &QuestionGenerationInput,
    ) -> Result<GeneratedQuestion, AppError> {
        input.validate()?;
        let difficulty = input.difficulty.to_string();

        let question = match input.preferred_question_type {
            QuestionTypePreference::Coding => {
                let out = self
                    .single_question(&input.topic, &difficulty, ActiveDisplayType::Coding)
                    .await?;
                GeneratedQuestion {
                    coding_question: Some(out.question),
                    coding_hints: Some(out.hints),
                    conceptual_question: None,
                    conceptual_hints: None,
                    question_type_generated: QuestionTypeGenerated::Coding,
                }
            }
            QuestionTypePreference::Conceptual => {
                let out = self
                    .single_question(&input.topic, &difficulty, ActiveDisplayType::Conceptual)
                    .await?;
                GeneratedQuestion {
                    coding_question: None,
                    coding_hints: None,
                    conceptual_question: Some(out.question),
                    conceptual_hints: Some(out.hints),
                    question_type_generated: QuestionTypeGenerated::Conceptual,
                }
            }
            QuestionTypePreference::Both => {
                // Issued concurrently and joined: either failure fails the
                // whole fetch, a partial question is never surfaced.
                let (coding, conceptual) = tokio::join!(
                    self.single_question(&input.topic, &difficulty, ActiveDisplayType::Coding),
                    self.single_question(&input.topic, &difficulty, ActiveDisplayType::Conceptual),
                );
                let coding = coding?;
                let conceptual = conceptual?;
                GeneratedQuestion {
                    coding_question: Some(coding.question),
                    coding_hints: Some(coding.hints),
                    conceptual_question: Some(conceptual.question),
                    conceptual_hints: Some(conceptual.hints),
                    question_type_generated: QuestionTypeGenerated::Both,
                }
            }
        };

        contracts::validate_generated_question(&question)?;
        Ok(question)
    }

    #[instrument(level = "info", skip(self, input), fields(code_len = input.code.len(), difficulty = %input.difficulty))]
    pub async fn grade_code_impl(&self, input: &GradeCodeInput) -> Result<GradingResult, AppError> {
        input.validate()?;
        let expected_output_section = match &input.expected_output {
            Some(expected) => format!("Expected output:\n```\n{expected}\n```\n"),
            None => String::new(),
        };
        let user = fill_template(
            &self.prompts.grade_code_user_template,
            &[
                ("topic", &input.topic),
                ("difficulty", &input.difficulty.to_string()),
                ("code", &input.code),
                ("expected_output_section", &expected_output_section),
            ],
        );
        let result: GradingResult = self
            .chat_json(&self.strong_model, &self.prompts.grade_code_system, &user, 0.2)
            .await?;
        contracts::validate_grading_result(&result)?;
        Ok(result)
    }

    #[instrument(level = "info", skip(self, input), fields(answer_len = input.user_answer.len(), difficulty = %input.difficulty))]
    pub async fn grade_answer_impl(
        &self,
        input: &AnswerGradingInput,
    ) -> Result<GradingResult, AppError> {
        input.validate()?;
        let user = fill_template(
            &self.prompts.grade_answer_user_template,
            &[
                ("topic", &input.topic),
                ("difficulty", &input.difficulty.to_string()),
                ("question", &input.question),
                ("user_answer", &input.user_answer),
            ],
        );
        let result: GradingResult = self
            .chat_json(&self.strong_model, &self.prompts.grade_answer_system, &user, 0.2)
            .await?;
        contracts::validate_grading_result(&result)?;
        Ok(result)
    }

    #[instrument(level = "info", skip(self, input), fields(question_len = input.question.len(), question_type = %input.question_type))]
    pub async fn generate_solution_impl(
        &self,
        input: &SolutionGenerationInput,
    ) -> Result<GeneratedSolution, AppError> {
        input.validate()?;
        let user = fill_template(
            &self.prompts.solution_user_template,
            &[
                ("topic", &input.topic),
                ("difficulty", &input.difficulty.to_string()),
                ("question", &input.question),
                ("question_type", &input.question_type.to_string()),
            ],
        );
        let solution: GeneratedSolution = self
            .chat_json(&self.strong_model, &self.prompts.solution_system, &user, 0.3)
            .await?;
        contracts::validate_generated_solution(&solution)?;
        Ok(solution)
    }

    #[instrument(level = "info", skip(self, input))]
    pub async fn generate_topic(
        &self,
        input: &TopicGenerationInput,
    ) -> Result<TopicGenerationOutput, AppError> {
        let user = fill_template(
            &self.prompts.topic_user_template,
            &[("difficulty", &input.difficulty.to_string())],
        );
        let out: TopicGenerationOutput = self
            .chat_json(&self.fast_model, &self.prompts.topic_system, &user, 0.7)
            .await?;
        contracts::validate_topic_output(&out)?;
        Ok(out)
    }

    #[instrument(level = "info", skip(self, input), fields(topic_len = input.topic.len()))]
    pub async fn explain_topic(
        &self,
        input: &TopicExplainerInput,
    ) -> Result<TopicExplainerOutput, AppError> {
        input.validate()?;
        let user = fill_template(&self.prompts.explain_user_template, &[("topic", &input.topic)]);
        let out: TopicExplainerOutput = self
            .chat_json(&self.strong_model, &self.prompts.explain_system, &user, 0.4)
            .await?;
        contracts::validate_explainer_output(&out)?;
        Ok(out)
    }

    #[instrument(level = "info", skip(self, input), fields(history_len = input.conversation_history.len()))]
    pub async fn conduct_interview_turn_impl(
        &self,
        input: &InterviewTurnInput,
    ) -> Result<InterviewTurnOutput, AppError> {
        input.validate()?;
        let system = fill_template(
            &self.prompts.interview_system,
            &[
                ("topic", &input.topic),
                ("difficulty", &input.difficulty.to_string()),
            ],
        );
        let history = render_history(input);
        let user = fill_template(&self.prompts.interview_user_template, &[("history", &history)]);
        let out: InterviewTurnOutput = self
            .chat_json(&self.fast_model, &system, &user, 0.6)
            .await?;
        contracts::validate_interview_output(&out)?;
        Ok(out)
    }
}

/// Render the transcript for the prompt, in order, one line per message.
fn render_history(input: &InterviewTurnInput) -> String {
    if input.conversation_history.is_empty() {
        return "(No conversation history yet. This is the start of the interview.)".into();
    }
    input
        .conversation_history
        .iter()
        .map(|msg| {
            let speaker = match msg.role {
                Role::Model => "Interviewer",
                Role::User => "Candidate",
            };
            format!("{speaker}: {}", msg.text())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl ChallengeGateway for OpenAI {
    async fn generate_question(
        &self,
        input: &QuestionGenerationInput,
    ) -> Result<GeneratedQuestion, AppError> {
        self.generate_question_impl(input).await
    }

    async fn grade_code(&self, input: &GradeCodeInput) -> Result<GradingResult, AppError> {
        self.grade_code_impl(input).await
    }

    async fn grade_answer(&self, input: &AnswerGradingInput) -> Result<GradingResult, AppError> {
        self.grade_answer_impl(input).await
    }

    async fn generate_solution(
        &self,
        input: &SolutionGenerationInput,
    ) -> Result<GeneratedSolution, AppError> {
        self.generate_solution_impl(input).await
    }
}

impl InterviewGateway for OpenAI {
    async fn conduct_interview_turn(
        &self,
        input: &InterviewTurnInput,
    ) -> Result<InterviewTurnOutput, AppError> {
        self.conduct_interview_turn_impl(input).await
    }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessageReq>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq {
    role: String,
    content: String,
}
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
    content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

/// 503s, rate limits, and "overloaded" error bodies are the transient
/// class the user may retry; everything else is a hard backend failure.
fn classify_http_failure(status: StatusCode, body: &str) -> AppError {
    let msg = extract_api_error(body).unwrap_or_else(|| body.to_string());
    let overloaded = status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::TOO_MANY_REQUESTS
        || msg.to_lowercase().contains("overloaded");
    if overloaded {
        AppError::UpstreamUnavailable(format!("HTTP {status}: {msg}"))
    } else {
        AppError::UpstreamError(format!("HTTP {status}: {msg}"))
    }
}

/// Try to extract a clean error message from an API error body.
fn extract_api_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct EWrap {
        error: EObj,
    }
    #[derive(Deserialize)]
    struct EObj {
        message: String,
    }
    serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::{ConversationMessage, InterviewDifficulty};

    #[test]
    fn service_unavailable_is_retryable() {
        let err = classify_http_failure(StatusCode::SERVICE_UNAVAILABLE, "{}");
        assert!(err.is_retryable());
        let err = classify_http_failure(StatusCode::TOO_MANY_REQUESTS, "{}");
        assert!(err.is_retryable());
    }

    #[test]
    fn overloaded_body_is_retryable_even_on_500() {
        let body = r#"{"error":{"message":"The engine is currently overloaded"}}"#;
        let err = classify_http_failure(StatusCode::INTERNAL_SERVER_ERROR, body);
        assert!(err.is_retryable());
    }

    #[test]
    fn other_failures_are_hard_errors() {
        let body = r#"{"error":{"message":"invalid api key"}}"#;
        let err = classify_http_failure(StatusCode::UNAUTHORIZED, body);
        assert!(matches!(err, AppError::UpstreamError(_)));
    }

    #[test]
    fn history_renders_in_order_with_roles() {
        let input = InterviewTurnInput {
            topic: "Rust".into(),
            difficulty: InterviewDifficulty::Advanced,
            conversation_history: vec![
                ConversationMessage::model("What is ownership?"),
                ConversationMessage::user("A move-based resource model."),
            ],
        };
        let rendered = render_history(&input);
        assert_eq!(
            rendered,
            "Interviewer: What is ownership?\nCandidate: A move-based resource model."
        );
    }

    #[test]
    fn empty_history_gets_the_start_marker() {
        let input = InterviewTurnInput {
            topic: "Rust".into(),
            difficulty: InterviewDifficulty::Beginner,
            conversation_history: vec![],
        };
        assert!(render_history(&input).contains("start of the interview"));
    }
}

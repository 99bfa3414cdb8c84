//! HTTP endpoint handlers. These are thin wrappers that forward to core
//! logic; failures map to status codes via `AppError::into_response`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use tracing::{info, instrument};

use crate::achievements::{self, AchievementStore, UserAchievement};
use crate::contracts::{
    InterviewTurnInput, InterviewTurnOutput, TopicExplainerInput, TopicExplainerOutput,
    TopicGenerationInput, TopicGenerationOutput,
};
use crate::domain::{ChallengeHistoryEntry, HistoryFilter};
use crate::error::AppError;
use crate::history::HistoryStore;
use crate::interview::{self, Transcript};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(difficulty = %body.difficulty))]
pub async fn http_generate_topic(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TopicGenerationInput>,
) -> Result<Json<TopicGenerationOutput>, AppError> {
    let out = state.openai.generate_topic(&body).await?;
    info!(target: "codecrafter_backend", topic = %out.topic, "Topic suggested");
    Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(topic_len = body.topic.len()))]
pub async fn http_explain_topic(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TopicExplainerInput>,
) -> Result<Json<TopicExplainerOutput>, AppError> {
    let out = state.openai.explain_topic(&body).await?;
    Ok(Json(out))
}

/// Stateless interview turn: the client owns the transcript and sends the
/// whole thing with every request.
#[instrument(level = "info", skip(state, body), fields(history_len = body.conversation_history.len()))]
pub async fn http_interview_turn(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InterviewTurnInput>,
) -> Result<Json<InterviewTurnOutput>, AppError> {
    let transcript = Transcript::from_messages(body.conversation_history);
    let text = interview::next_turn(&state.openai, &body.topic, body.difficulty, &transcript).await?;
    Ok(Json(InterviewTurnOutput {
        ai_response_text: text,
    }))
}

#[instrument(level = "info", skip(state, q), fields(user_id = %q.user_id))]
pub async fn http_history(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<ChallengeHistoryEntry>>, AppError> {
    let filter = HistoryFilter {
        topic: q.topic,
        difficulty: q.difficulty,
        passed: q.passed,
        question_type: q.question_type,
    };
    let entries = state.history.query(&q.user_id, &filter).await?;
    info!(target: "challenge", count = entries.len(), "History served");
    Ok(Json(entries))
}

#[instrument(level = "info")]
pub async fn http_achievement_catalog() -> impl IntoResponse {
    Json(achievements::CATALOG)
}

#[instrument(level = "info", skip(state, q), fields(user_id = %q.user_id))]
pub async fn http_earned_achievements(
    State(state): State<Arc<AppState>>,
    Query(q): Query<EarnedQuery>,
) -> Result<Json<Vec<UserAchievement>>, AppError> {
    let earned = state.achievements.earned_by(&q.user_id).await?;
    Ok(Json(earned))
}

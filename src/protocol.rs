//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::achievements::UserAchievement;
use crate::domain::{
    ActiveDisplayType, Difficulty, GeneratedQuestion, QuestionTypePreference,
};
use crate::error::AppError;
use crate::interview::InterviewDifficulty;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartChallenge {
        topic: String,
        difficulty: Difficulty,
        #[serde(rename = "questionType")]
        question_type: QuestionTypePreference,
    },
    SwitchQuestionType {
        #[serde(rename = "questionType")]
        question_type: ActiveDisplayType,
    },
    SubmitSolution {
        solution: String,
    },
    RestartChallenge,
    StartInterview {
        topic: String,
        difficulty: InterviewDifficulty,
    },
    InterviewAnswer {
        text: String,
    },
    EndInterview,
}

/// Messages the server sends back over WebSocket. One submission can fan
/// out into several of these (Graded, then Solution/SolutionError, then
/// AttemptSaved/SaveError, then one AchievementUnlocked per new badge).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Question {
        question: QuestionOut,
    },
    Graded {
        score: u8,
        feedback: String,
        passed: bool,
    },
    Solution {
        solution: String,
        explanation: String,
    },
    SolutionError {
        message: String,
    },
    AttemptSaved {
        #[serde(rename = "entryId")]
        entry_id: String,
    },
    SaveError {
        message: String,
    },
    AchievementUnlocked {
        achievement: UserAchievement,
    },
    InterviewerTurn {
        text: String,
    },
    InterviewEnded,
    Error {
        message: String,
    },
}

/// DTO for question delivery: the generated payload plus which half is
/// currently active.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    #[serde(flatten)]
    pub question: GeneratedQuestion,
    pub active_display_type: ActiveDisplayType,
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

/// Query for `/api/v1/history`: the user plus the optional AND-combined
/// filter dimensions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default)]
    pub question_type: Option<ActiveDisplayType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarnedQuery {
    pub user_id: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MissingParameters(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UpstreamError(_) | AppError::SchemaViolation(_) => StatusCode::BAD_GATEWAY,
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

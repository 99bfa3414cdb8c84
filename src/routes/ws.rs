//! WebSocket upgrade + message loop. One challenge session (and at most
//! one interview) lives per connection; closing the socket discards both,
//! so a late gateway response dies with the task that awaited it.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use crate::domain::ChallengeParameters;
use crate::interview::{self, InterviewDifficulty, Transcript};
use crate::protocol::{ClientWsMessage, QuestionOut, ServerWsMessage};
use crate::session::ChallengeSession;
use crate::state::AppState;

/// The user identity arrives with the connection; auth itself is an
/// external collaborator in front of this service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub user_id: String,
}

/// An in-progress interview on this connection.
struct InterviewState {
    topic: String,
    difficulty: InterviewDifficulty,
    transcript: Transcript,
}

#[instrument(level = "info", skip(ws, state), fields(user_id = %q.user_id))]
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
) -> impl IntoResponse {
    info!(target: "codecrafter_backend", "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_ws(socket, state, q.user_id))
}

#[instrument(level = "info", skip(socket, state), fields(%user_id))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user_id: String) {
    info!(target: "codecrafter_backend", "WebSocket connected");
    let mut session = ChallengeSession::new(user_id);
    let mut interview: Option<InterviewState> = None;

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(txt) => {
                // Parse, dispatch, serialize replies. One client message may
                // produce several server messages, sent in order.
                let replies = match serde_json::from_str::<ClientWsMessage>(&txt) {
                    Ok(incoming) => {
                        debug!(target: "codecrafter_backend", "WS received: {:?}", &incoming);
                        handle_client_ws(incoming, &state, &mut session, &mut interview).await
                    }
                    Err(e) => vec![ServerWsMessage::Error {
                        message: format!("Invalid JSON: {}", e),
                    }],
                };

                let mut send_failed = false;
                for reply in replies {
                    let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
                        serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) })
                            .to_string()
                    });
                    if let Err(e) = socket.send(Message::Text(out)).await {
                        error!(target: "codecrafter_backend", error = %e, "WS send error");
                        send_failed = true;
                        break;
                    }
                }
                if send_failed {
                    break;
                }
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    info!(target: "codecrafter_backend", "WebSocket disconnected");
}

fn question_reply(session: &ChallengeSession) -> ServerWsMessage {
    match (session.question(), session.active_display_type()) {
        (Some(question), Some(active)) => ServerWsMessage::Question {
            question: QuestionOut {
                question: question.clone(),
                active_display_type: active,
            },
        },
        _ => ServerWsMessage::Error {
            message: "No question loaded.".into(),
        },
    }
}

#[instrument(level = "info", skip_all)]
async fn handle_client_ws(
    msg: ClientWsMessage,
    state: &AppState,
    session: &mut ChallengeSession,
    interview: &mut Option<InterviewState>,
) -> Vec<ServerWsMessage> {
    match msg {
        ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

        ClientWsMessage::StartChallenge {
            topic,
            difficulty,
            question_type,
        } => {
            let params = ChallengeParameters {
                topic,
                difficulty,
                question_type_preference: question_type,
            };
            match session.fetch_question(&state.openai, params).await {
                Ok(_) => vec![question_reply(session)],
                Err(e) => vec![ServerWsMessage::Error {
                    message: e.to_string(),
                }],
            }
        }

        ClientWsMessage::SwitchQuestionType { question_type } => {
            match session.switch_display_type(question_type) {
                Ok(()) => vec![question_reply(session)],
                Err(e) => vec![ServerWsMessage::Error {
                    message: e.to_string(),
                }],
            }
        }

        ClientWsMessage::RestartChallenge => match session.restart(&state.openai).await {
            Ok(_) => vec![question_reply(session)],
            Err(e) => vec![ServerWsMessage::Error {
                message: e.to_string(),
            }],
        },

        ClientWsMessage::SubmitSolution { solution } => {
            let outcome = match session
                .submit(&state.openai, &state.history, &state.achievements, &solution)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    return vec![ServerWsMessage::Error {
                        message: e.to_string(),
                    }]
                }
            };

            let mut replies = vec![ServerWsMessage::Graded {
                score: outcome.grading.score,
                feedback: outcome.grading.feedback.clone(),
                passed: outcome.grading.passed,
            }];
            if let Some(solution) = outcome.solution {
                replies.push(ServerWsMessage::Solution {
                    solution: solution.solution,
                    explanation: solution.explanation,
                });
            }
            if let Some(e) = outcome.solution_error {
                replies.push(ServerWsMessage::SolutionError {
                    message: e.to_string(),
                });
            }
            match (outcome.entry_id, outcome.persist_error) {
                (Some(entry_id), _) => replies.push(ServerWsMessage::AttemptSaved { entry_id }),
                (None, Some(e)) => replies.push(ServerWsMessage::SaveError {
                    message: e.to_string(),
                }),
                (None, None) => {}
            }
            for achievement in outcome.new_achievements {
                replies.push(ServerWsMessage::AchievementUnlocked { achievement });
            }
            if let Some(e) = outcome.achievement_error {
                replies.push(ServerWsMessage::Error {
                    message: e.to_string(),
                });
            }
            replies
        }

        ClientWsMessage::StartInterview { topic, difficulty } => {
            // A fresh start discards any previous transcript.
            let mut fresh = InterviewState {
                topic,
                difficulty,
                transcript: Transcript::new(),
            };
            match interview::next_turn(
                &state.openai,
                &fresh.topic,
                fresh.difficulty,
                &fresh.transcript,
            )
            .await
            {
                Ok(text) => {
                    fresh.transcript.push_model(&text);
                    *interview = Some(fresh);
                    vec![ServerWsMessage::InterviewerTurn { text }]
                }
                Err(e) => vec![ServerWsMessage::Error {
                    message: e.to_string(),
                }],
            }
        }

        ClientWsMessage::InterviewAnswer { text } => {
            let Some(active) = interview.as_mut() else {
                return vec![ServerWsMessage::Error {
                    message: "No interview in progress.".into(),
                }];
            };
            active.transcript.push_user(&text);
            match interview::next_turn(
                &state.openai,
                &active.topic,
                active.difficulty,
                &active.transcript,
            )
            .await
            {
                Ok(reply) => {
                    active.transcript.push_model(&reply);
                    vec![ServerWsMessage::InterviewerTurn { text: reply }]
                }
                Err(e) => vec![ServerWsMessage::Error {
                    message: e.to_string(),
                }],
            }
        }

        ClientWsMessage::EndInterview => {
            *interview = None;
            vec![ServerWsMessage::InterviewEnded]
        }
    }
}

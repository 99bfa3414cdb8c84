//! Mock-interview turn sequencing.
//!
//! The sequencer holds no state of its own: the caller owns the transcript,
//! appends turns as they happen, and passes the whole thing back in for the
//! next interviewer message.

use serde::{Deserialize, Serialize};

use crate::contracts::{InterviewTurnInput, InterviewTurnOutput};
use crate::error::AppError;

/// Interview difficulty adds an Expert tier on top of the challenge levels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewDifficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl std::fmt::Display for InterviewDifficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            InterviewDifficulty::Beginner => "Beginner",
            InterviewDifficulty::Intermediate => "Intermediate",
            InterviewDifficulty::Advanced => "Advanced",
            InterviewDifficulty::Expert => "Expert",
        })
    }
}

/// Who produced a transcript message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePart {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        ConversationMessage {
            role: Role::User,
            parts: vec![MessagePart { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        ConversationMessage {
            role: Role::Model,
            parts: vec![MessagePart { text: text.into() }],
        }
    }

    /// Concatenated text of all parts, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Append-only conversation log for one interview session. Dropped whole
/// when the session ends or restarts.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    messages: Vec<ConversationMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Transcript::default()
    }

    /// Rehydrate a transcript a client accumulated on its side.
    pub fn from_messages(messages: Vec<ConversationMessage>) -> Self {
        Transcript { messages }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ConversationMessage::user(text));
    }

    pub fn push_model(&mut self, text: impl Into<String>) {
        self.messages.push(ConversationMessage::model(text));
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }
}

/// The one gateway operation the sequencer needs.
pub trait InterviewGateway {
    fn conduct_interview_turn(
        &self,
        input: &InterviewTurnInput,
    ) -> impl std::future::Future<Output = Result<InterviewTurnOutput, AppError>> + Send;
}

/// Request the next interviewer message given the transcript so far.
/// The full transcript is passed through in order, unmodified; the prompt
/// contract makes the model open with a greeting only on an empty one.
pub async fn next_turn<G: InterviewGateway>(
    gateway: &G,
    topic: &str,
    difficulty: InterviewDifficulty,
    transcript: &Transcript,
) -> Result<String, AppError> {
    let input = InterviewTurnInput {
        topic: topic.to_string(),
        difficulty,
        conversation_history: transcript.messages().to_vec(),
    };
    input.validate()?;
    let out = gateway.conduct_interview_turn(&input).await?;
    Ok(out.ai_response_text)
}

//! The tutor conversation engine.
//!
//! The conversation is an append-only log. Asking a question appends the
//! user's message before the gateway answers, and a failed answer retracts
//! exactly that message again. The pair is exposed as
//! [`TutorEngine::begin_ask`] / [`TutorEngine::complete_ask`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GatewayResult, GenerationKind, Result, StudyError};
use crate::gateway::{SharedGateway, TutoringInput, TutoringOutput};
use crate::model::{require_min_chars, StudentLevel};

/// Minimum topic length in characters.
pub const MIN_TOPIC_CHARS: usize = 3;

/// Minimum question length in characters.
pub const MIN_QUESTION_CHARS: usize = 5;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The student.
    User,
    /// The tutor.
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Identifier of a conversation message.
///
/// Derived from the creation time in milliseconds and bumped when needed so
/// ids are strictly increasing within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    /// Unique, increasing id.
    pub id: MessageId,

    /// Author.
    pub role: Role,

    /// The question, or the tutor's explanation.
    pub content: String,

    /// Topic, on user messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Academic level, on user messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<StudentLevel>,

    /// When the message was appended.
    pub created_at: DateTime<Utc>,
}

/// A question for the tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorQuestion {
    /// Topic the question is about.
    pub topic: String,

    /// The question itself.
    pub question: String,

    /// Academic level to pitch the answer at.
    #[serde(default)]
    pub student_level: StudentLevel,
}

impl TutorQuestion {
    /// Creates a new question.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        question: impl Into<String>,
        student_level: StudentLevel,
    ) -> Self {
        Self {
            topic: topic.into(),
            question: question.into(),
            student_level,
        }
    }

    /// Checks the minimum lengths of topic and question.
    pub fn validate(&self) -> Result<()> {
        require_min_chars(
            "topic",
            &self.topic,
            MIN_TOPIC_CHARS,
            "Topic must be at least 3 characters.",
        )?;
        require_min_chars(
            "question",
            &self.question,
            MIN_QUESTION_CHARS,
            "Question must be at least 5 characters.",
        )
    }

    fn to_input(&self) -> TutoringInput {
        TutoringInput {
            topic: self.topic.clone(),
            question: self.question.clone(),
            student_level: self.student_level,
        }
    }
}

/// Handle for a question whose answer is still outstanding.
///
/// Returned by [`TutorEngine::begin_ask`] and consumed by
/// [`TutorEngine::complete_ask`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending turn must be completed or the engine stays loading"]
pub struct PendingTurn {
    message_id: MessageId,
    input: TutoringInput,
}

impl PendingTurn {
    /// Id of the speculatively appended user message.
    #[must_use]
    pub const fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// The gateway input for this turn.
    #[must_use]
    pub const fn input(&self) -> &TutoringInput {
        &self.input
    }
}

/// Keeps the conversation log and the loading flag.
pub struct TutorEngine {
    gateway: SharedGateway,
    messages: Vec<ConversationMessage>,
    pending: Option<MessageId>,
}

impl std::fmt::Debug for TutorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TutorEngine")
            .field("messages", &self.messages.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl TutorEngine {
    /// Creates an engine with an empty conversation.
    #[must_use]
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            messages: Vec::new(),
            pending: None,
        }
    }

    /// The conversation in order.
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Returns `true` while an answer is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns a handle to the gateway this engine uses.
    #[must_use]
    pub fn gateway(&self) -> SharedGateway {
        Arc::clone(&self.gateway)
    }

    /// Validates the question, appends it and marks the engine loading.
    pub fn begin_ask(&mut self, question: TutorQuestion) -> Result<PendingTurn> {
        if self.is_loading() {
            warn!("Tutor question rejected while a previous one is pending");
            return Err(StudyError::EngineBusy { engine: "tutor" });
        }
        question.validate()?;

        let input = question.to_input();
        let id = self.next_id();
        self.messages.push(ConversationMessage {
            id,
            role: Role::User,
            content: question.question,
            topic: Some(question.topic),
            level: Some(question.student_level),
            created_at: Utc::now(),
        });
        self.pending = Some(id);

        info!(
            message_id = %id,
            topic = %input.topic,
            level = %input.student_level,
            "Asking tutor"
        );
        Ok(PendingTurn {
            message_id: id,
            input,
        })
    }

    /// Commits or retracts a pending turn.
    ///
    /// On success the explanation is appended as an assistant message. On
    /// failure the user message of this turn is removed and
    /// [`StudyError::GenerationFailed`] is returned. The engine stops
    /// loading either way.
    pub fn complete_ask(
        &mut self,
        turn: PendingTurn,
        outcome: GatewayResult<TutoringOutput>,
    ) -> Result<&ConversationMessage> {
        if self.pending != Some(turn.message_id) {
            return Err(StudyError::invalid_transition(
                "tutor idle",
                format!("complete message {}", turn.message_id),
            ));
        }
        self.pending = None;

        match outcome {
            Ok(output) => {
                let id = self.next_id();
                debug!(message_id = %id, "Tutor answered");
                self.messages.push(ConversationMessage {
                    id,
                    role: Role::Assistant,
                    content: output.explanation,
                    topic: None,
                    level: None,
                    created_at: Utc::now(),
                });
                self.messages
                    .last()
                    .ok_or_else(|| StudyError::invalid_transition("tutor", "answered"))
            }
            Err(error) => {
                warn!(
                    message_id = %turn.message_id,
                    error = %error,
                    "Tutor request failed, retracting question"
                );
                if let Some(pos) = self
                    .messages
                    .iter()
                    .rposition(|m| m.id == turn.message_id)
                {
                    self.messages.remove(pos);
                }
                Err(StudyError::GenerationFailed(GenerationKind::Tutoring))
            }
        }
    }

    /// Asks a question and waits for the answer.
    pub async fn ask(&mut self, question: TutorQuestion) -> Result<&ConversationMessage> {
        let turn = self.begin_ask(question)?;
        let gateway = self.gateway();
        let outcome = gateway.get_tutoring(turn.input()).await;
        self.complete_ask(turn, outcome)
    }

    fn next_id(&self) -> MessageId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let next = self
            .messages
            .last()
            .map_or(now, |m| now.max(m.id.0.saturating_add(1)));
        MessageId(next)
    }
}

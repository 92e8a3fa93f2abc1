//! The adaptive quiz session engine.
//!
//! A [`QuizEngine`] owns one quiz attempt at a time and moves it through
//! `Idle -> Generating -> Active -> Finished`. Generation is split into
//! [`QuizEngine::begin_quiz`] and [`QuizEngine::complete_quiz`] so a caller
//! holding the engine behind a lock can release it while the gateway call is
//! in flight; [`QuizEngine::request_quiz`] runs both phases in one call.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use studymate_report::{QuestionReview, QuizReport};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult, GenerationKind, Result, StudyError};
use crate::gateway::{QuizInput, QuizOutput, SharedGateway};
use crate::model::{require_min_chars, QuizQuestion};

pub use studymate_report::ReportTier as ScoreTier;

/// Minimum topic length in characters.
pub const MIN_TOPIC_CHARS: usize = 3;

/// Minimum length of the understanding description in characters.
pub const MIN_UNDERSTANDING_CHARS: usize = 10;

/// Quiz lengths the generator accepts.
pub const GENERATION_QUIZ_LENGTHS: RangeInclusive<u8> = 1..=20;

/// Quiz lengths offered to students by the forms.
pub const FORM_QUIZ_LENGTHS: RangeInclusive<u8> = 3..=10;

/// Quiz length used when a request does not name one.
pub const DEFAULT_QUIZ_LENGTH: u8 = 5;

const fn default_quiz_length() -> u8 {
    DEFAULT_QUIZ_LENGTH
}

// ============================================================================
// QuizState
// ============================================================================

/// Lifecycle state of a [`QuizEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    /// No quiz; ready for a request.
    #[default]
    Idle,
    /// Waiting for the gateway.
    Generating,
    /// Questions are being answered.
    Active,
    /// The last question has been advanced past and the score is final.
    Finished,
}

impl QuizState {
    /// Returns `true` if a new quiz may be requested from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use studymate_core::QuizState;
    ///
    /// assert!(QuizState::Idle.accepts_request());
    /// assert!(QuizState::Finished.accepts_request());
    /// assert!(!QuizState::Active.accepts_request());
    /// ```
    #[must_use]
    pub const fn accepts_request(&self) -> bool {
        matches!(self, Self::Idle | Self::Finished)
    }
}

impl std::fmt::Display for QuizState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Generating => write!(f, "generating"),
            Self::Active => write!(f, "active"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

// ============================================================================
// QuizRequest
// ============================================================================

/// A request for a new quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    /// Topic of the quiz.
    pub topic: String,

    /// What the student already knows about the topic.
    pub student_understanding: String,

    /// Number of questions.
    #[serde(default = "default_quiz_length")]
    pub quiz_length: u8,
}

impl QuizRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        student_understanding: impl Into<String>,
        quiz_length: u8,
    ) -> Self {
        Self {
            topic: topic.into(),
            student_understanding: student_understanding.into(),
            quiz_length,
        }
    }

    /// Validates the request against the generation contract.
    pub fn validate(&self) -> Result<()> {
        require_min_chars(
            "topic",
            &self.topic,
            MIN_TOPIC_CHARS,
            "Topic must be at least 3 characters.",
        )?;
        require_min_chars(
            "studentUnderstanding",
            &self.student_understanding,
            MIN_UNDERSTANDING_CHARS,
            "Please describe your understanding in at least 10 characters.",
        )?;
        Self::check_length(&GENERATION_QUIZ_LENGTHS, self.quiz_length)
    }

    /// Validates the request against the form contract, which only offers
    /// 3 to 10 questions.
    pub fn validate_form(&self) -> Result<()> {
        self.validate()?;
        Self::check_length(&FORM_QUIZ_LENGTHS, self.quiz_length)
    }

    fn check_length(range: &RangeInclusive<u8>, length: u8) -> Result<()> {
        if range.contains(&length) {
            Ok(())
        } else {
            Err(StudyError::validation(
                "quizLength",
                format!(
                    "Quiz length must be between {} and {} questions.",
                    range.start(),
                    range.end()
                ),
            ))
        }
    }

    fn to_input(&self) -> QuizInput {
        QuizInput {
            topic: self.topic.clone(),
            student_understanding: self.student_understanding.clone(),
            quiz_length: self.quiz_length,
        }
    }
}

// ============================================================================
// QuizSession
// ============================================================================

/// One generated quiz and the answers given so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    /// Topic the quiz was generated for.
    pub topic: String,

    /// Questions in order; fixed once generated.
    pub questions: Vec<QuizQuestion>,

    /// Index of the question being answered. Never decreases.
    pub current_index: usize,

    /// Chosen option per answered question index.
    pub answers: BTreeMap<usize, String>,

    /// Final score, present once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
}

impl QuizSession {
    fn new(topic: String, questions: Vec<QuizQuestion>) -> Self {
        Self {
            topic,
            questions,
            current_index: 0,
            answers: BTreeMap::new(),
            score: None,
        }
    }

    /// Number of questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Returns `true` if the session has no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question currently being answered.
    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        self.questions.get(self.current_index)
    }

    /// Returns the answer recorded for `index`, if any.
    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    /// Returns `true` if `index` is the last question.
    #[must_use]
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.questions.len()
    }

    /// Returns whether the answer at `index` is correct, or `None` if the
    /// question is unanswered or out of range.
    #[must_use]
    pub fn is_correct(&self, index: usize) -> Option<bool> {
        let question = self.questions.get(index)?;
        self.answer(index).map(|answer| question.is_correct(answer))
    }

    /// Counts the answers that match their question's correct answer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn count_correct(&self) -> u32 {
        self.questions
            .iter()
            .enumerate()
            .filter(|(i, q)| self.answer(*i).is_some_and(|a| q.is_correct(a)))
            .count() as u32
    }
}

// ============================================================================
// QuizResult and Advance
// ============================================================================

/// Score summary of a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    /// Number of correct answers.
    pub score: u32,
    /// Number of questions.
    pub total: u32,
    /// Score as a percentage.
    pub percentage: f64,
    /// Feedback tier.
    pub tier: ScoreTier,
    /// Whether the score reached 80%.
    pub celebrate: bool,
}

impl QuizResult {
    /// Builds the summary for `score` out of `total`.
    ///
    /// # Examples
    ///
    /// ```
    /// use studymate_core::{QuizResult, ScoreTier};
    ///
    /// let result = QuizResult::new(8, 10);
    /// assert!(result.celebrate);
    /// assert_eq!(result.tier, ScoreTier::Excellent);
    ///
    /// let result = QuizResult::new(7, 10);
    /// assert!(!result.celebrate);
    /// assert_eq!(result.tier, ScoreTier::Good);
    /// ```
    #[must_use]
    pub fn new(score: u32, total: u32) -> Self {
        Self {
            score,
            total,
            percentage: studymate_report::percentage(score, total),
            tier: ScoreTier::from_score(score, total),
            celebrate: studymate_report::celebrates(score, total),
        }
    }
}

/// Outcome of [`QuizEngine::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Advance {
    /// Moved on to the question at this index.
    Next(usize),
    /// The quiz is over.
    Finished(QuizResult),
}

// ============================================================================
// QuizEngine
// ============================================================================

/// Owns the lifecycle of one quiz attempt.
pub struct QuizEngine {
    gateway: SharedGateway,
    state: QuizState,
    session: Option<QuizSession>,
    pending: Option<QuizRequest>,
}

impl std::fmt::Debug for QuizEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizEngine")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl QuizEngine {
    /// Creates an idle engine backed by `gateway`.
    #[must_use]
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            state: QuizState::Idle,
            session: None,
            pending: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> QuizState {
        self.state
    }

    /// Returns the session, present while Active or Finished.
    #[must_use]
    pub const fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    /// Returns the request being generated, present while Generating.
    #[must_use]
    pub const fn pending_request(&self) -> Option<&QuizRequest> {
        self.pending.as_ref()
    }

    /// Returns a handle to the gateway this engine uses.
    #[must_use]
    pub fn gateway(&self) -> SharedGateway {
        Arc::clone(&self.gateway)
    }

    /// Returns the question currently being answered while Active.
    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.state {
            QuizState::Active => self.session.as_ref()?.current_question(),
            _ => None,
        }
    }

    /// Returns the answer selected for the current question while Active.
    #[must_use]
    pub fn selected_answer(&self) -> Option<&str> {
        match self.state {
            QuizState::Active => {
                let session = self.session.as_ref()?;
                session.answer(session.current_index)
            }
            _ => None,
        }
    }

    /// Progress through the quiz as `(current_index + 1) / len * 100`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> Option<f64> {
        let session = self.session.as_ref()?;
        if session.is_empty() {
            return None;
        }
        Some((session.current_index + 1) as f64 / session.len() as f64 * 100.0)
    }

    /// Returns whether the answer at `index` is correct.
    #[must_use]
    pub fn is_correct(&self, index: usize) -> Option<bool> {
        self.session.as_ref()?.is_correct(index)
    }

    /// Returns the final score, only once Finished.
    #[must_use]
    pub fn score(&self) -> Option<u32> {
        match self.state {
            QuizState::Finished => self.session.as_ref()?.score,
            _ => None,
        }
    }

    /// Returns the score summary, only once Finished.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn result(&self) -> Option<QuizResult> {
        let score = self.score()?;
        let total = self.session.as_ref()?.len() as u32;
        Some(QuizResult::new(score, total))
    }

    /// Returns `true` once Finished with at least 80% correct.
    #[must_use]
    pub fn should_celebrate(&self) -> bool {
        self.result().is_some_and(|r| r.celebrate)
    }

    /// Builds the review report of a finished quiz.
    #[must_use]
    pub fn report(&self) -> Option<QuizReport> {
        if self.state != QuizState::Finished {
            return None;
        }
        let session = self.session.as_ref()?;
        let reviews = session
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| QuestionReview {
                number: i + 1,
                question: q.question.clone(),
                options: q.options.clone(),
                selected: session.answer(i).map(ToString::to_string),
                correct_answer: q.correct_answer.clone(),
                explanation: q.explanation.clone(),
            });
        Some(QuizReport::builder(session.topic.clone()).questions(reviews).build())
    }

    // ------------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------------

    /// First phase of a quiz request: validates and enters Generating.
    ///
    /// Returns the gateway input to send. Valid only from Idle or Finished;
    /// a previous session is discarded.
    pub fn begin_quiz(&mut self, request: QuizRequest) -> Result<QuizInput> {
        match self.state {
            QuizState::Generating => {
                return Err(StudyError::EngineBusy {
                    engine: "quiz engine",
                })
            }
            QuizState::Active => {
                return Err(StudyError::invalid_transition(
                    self.state,
                    QuizState::Generating,
                ))
            }
            QuizState::Idle | QuizState::Finished => {}
        }

        request.validate()?;

        let input = request.to_input();
        info!(
            topic = %request.topic,
            quiz_length = request.quiz_length,
            "Generating quiz"
        );

        self.session = None;
        self.pending = Some(request);
        self.state = QuizState::Generating;
        Ok(input)
    }

    /// Second phase of a quiz request: applies the gateway outcome.
    ///
    /// On success the engine becomes Active with a fresh session. On failure,
    /// including output that breaks the question invariants, it returns to
    /// Idle with [`StudyError::GenerationFailed`].
    pub fn complete_quiz(&mut self, outcome: GatewayResult<QuizOutput>) -> Result<&QuizSession> {
        if self.state != QuizState::Generating {
            return Err(StudyError::invalid_transition(self.state, QuizState::Active));
        }
        let Some(request) = self.pending.take() else {
            return Err(StudyError::invalid_transition(self.state, QuizState::Active));
        };

        let checked = outcome.and_then(|output| check_output(&request, output));
        match checked {
            Ok(questions) => {
                info!(
                    topic = %request.topic,
                    questions = questions.len(),
                    "Quiz ready"
                );
                self.state = QuizState::Active;
                Ok(&*self
                    .session
                    .insert(QuizSession::new(request.topic, questions)))
            }
            Err(error) => {
                warn!(
                    topic = %request.topic,
                    error = %error,
                    "Quiz generation failed"
                );
                self.state = QuizState::Idle;
                Err(StudyError::GenerationFailed(GenerationKind::Quiz))
            }
        }
    }

    /// Requests a quiz and waits for the gateway.
    pub async fn request_quiz(&mut self, request: QuizRequest) -> Result<&QuizSession> {
        let input = self.begin_quiz(request)?;
        let gateway = self.gateway();
        let outcome = gateway.generate_quiz(&input).await;
        self.complete_quiz(outcome)
    }

    // ------------------------------------------------------------------------
    // Answering
    // ------------------------------------------------------------------------

    /// Records `option` as the answer to the current question.
    ///
    /// Re-selecting overwrites the previous choice. Options that are not
    /// listed for the current question are rejected.
    pub fn select_answer(&mut self, option: &str) -> Result<()> {
        let session = self.active_session_mut("select an answer")?;
        let index = session.current_index;
        let Some(question) = session.questions.get(index) else {
            return Err(StudyError::invalid_transition("active", "answered"));
        };

        if !question.has_option(option) {
            return Err(StudyError::validation(
                "option",
                format!("'{option}' is not one of the options for this question."),
            ));
        }

        debug!(index, option, "Answer selected");
        session.answers.insert(index, option.to_string());
        Ok(())
    }

    /// Moves past the current question.
    ///
    /// Rejected without any change while the current question is unanswered.
    /// Advancing past the last question computes the score and finishes.
    pub fn advance(&mut self) -> Result<Advance> {
        let session = self.active_session_mut("advance")?;
        let index = session.current_index;

        if session.answer(index).is_none() {
            warn!(index, "Cannot advance past an unanswered question");
            return Err(StudyError::UnansweredQuestion { index });
        }

        if !session.is_last(index) {
            session.current_index += 1;
            debug!(index = session.current_index, "Advanced to next question");
            return Ok(Advance::Next(session.current_index));
        }

        let score = session.count_correct();
        session.score = Some(score);
        self.state = QuizState::Finished;

        let result = self
            .result()
            .ok_or_else(|| StudyError::invalid_transition(QuizState::Active, QuizState::Finished))?;
        info!(
            score = result.score,
            total = result.total,
            tier = %result.tier,
            celebrate = result.celebrate,
            "Quiz finished"
        );
        Ok(Advance::Finished(result))
    }

    /// Discards the session and returns to Idle.
    ///
    /// Valid from Idle or Finished.
    pub fn restart(&mut self) -> Result<()> {
        if !self.state.accepts_request() {
            return Err(StudyError::invalid_transition(self.state, QuizState::Idle));
        }
        self.session = None;
        self.pending = None;
        self.state = QuizState::Idle;
        debug!("Quiz restarted");
        Ok(())
    }

    fn active_session_mut(&mut self, action: &str) -> Result<&mut QuizSession> {
        if self.state != QuizState::Active {
            return Err(StudyError::invalid_transition(
                self.state,
                format!("{action} (requires active)"),
            ));
        }
        self.session
            .as_mut()
            .ok_or_else(|| StudyError::invalid_transition(QuizState::Active, action))
    }
}

/// Checks a generated quiz against the request and the question invariants.
fn check_output(
    request: &QuizRequest,
    output: QuizOutput,
) -> std::result::Result<Vec<QuizQuestion>, GatewayError> {
    let questions = output.quiz_questions;

    if questions.len() != usize::from(request.quiz_length) {
        return Err(GatewayError::malformed(format!(
            "expected {} questions, got {}",
            request.quiz_length,
            questions.len()
        )));
    }

    for question in &questions {
        question.check().map_err(GatewayError::malformed)?;
    }

    Ok(questions)
}

// ============================================================================
// Tests
// ============================================================================

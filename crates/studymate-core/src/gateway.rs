//! The generation gateway: the boundary to the language model.
//!
//! Engines never talk to a model directly. They hold a [`SharedGateway`]
//! handed to them at construction and only ever see a conforming result or a
//! [`GatewayError`]. Shape conformance of the model output is the gateway's
//! job; the quiz engine additionally re-checks the question invariants.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayErrorKind, GatewayResult};
use crate::model::{QuizQuestion, StudentLevel};

/// A gateway shared between engines and in-flight requests.
pub type SharedGateway = Arc<dyn GenerationGateway>;

/// Input of the quiz generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizInput {
    /// Topic of the quiz.
    pub topic: String,
    /// The student's own description of what they already know.
    pub student_understanding: String,
    /// Number of questions to generate (1..=20).
    pub quiz_length: u8,
}

/// Output of the quiz generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOutput {
    /// The generated questions.
    pub quiz_questions: Vec<QuizQuestion>,
}

/// Input of the study-plan generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanInput {
    /// Exam date as `YYYY-MM-DD`.
    pub exam_date: String,
    /// Subjects to cover.
    pub subjects: Vec<String>,
    /// Hours available per day.
    pub available_study_time: f64,
    /// Academic level of the student.
    pub student_level: StudentLevel,
}

/// Output of the study-plan generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanOutput {
    /// The plan as markdown.
    pub study_plan: String,
}

/// Input of the tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutoringInput {
    /// Topic the question is about.
    pub topic: String,
    /// The student's question.
    pub question: String,
    /// Academic level of the student.
    pub student_level: StudentLevel,
}

/// Output of the tutor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutoringOutput {
    /// The explanation, usually markdown.
    pub explanation: String,
}

/// Asynchronous access to the three generation entry points.
///
/// Implementations must resolve every call exactly once, with either a
/// conforming output or an error.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Generates an adaptive quiz.
    async fn generate_quiz(&self, input: &QuizInput) -> GatewayResult<QuizOutput>;

    /// Generates a personalized study plan.
    async fn generate_study_plan(&self, input: &StudyPlanInput) -> GatewayResult<StudyPlanOutput>;

    /// Explains a topic in answer to a student's question.
    async fn get_tutoring(&self, input: &TutoringInput) -> GatewayResult<TutoringOutput>;
}

// ============================================================================
// ScriptedGateway
// ============================================================================

/// A call recorded by [`ScriptedGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    /// `generate_quiz` was called.
    Quiz(QuizInput),
    /// `generate_study_plan` was called.
    StudyPlan(StudyPlanInput),
    /// `get_tutoring` was called.
    Tutoring(TutoringInput),
}

/// An in-memory gateway that replays queued responses in order.
///
/// Used as the test double for the engines and the HTTP API. A call with no
/// queued response fails with [`GatewayErrorKind::Other`].
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    quizzes: Mutex<VecDeque<GatewayResult<QuizOutput>>>,
    plans: Mutex<VecDeque<GatewayResult<StudyPlanOutput>>>,
    tutoring: Mutex<VecDeque<GatewayResult<TutoringOutput>>>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl ScriptedGateway {
    /// Creates a gateway with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the response of the next `generate_quiz` call.
    pub fn push_quiz(&self, response: GatewayResult<QuizOutput>) {
        lock(&self.quizzes).push_back(response);
    }

    /// Queues the response of the next `generate_study_plan` call.
    pub fn push_study_plan(&self, response: GatewayResult<StudyPlanOutput>) {
        lock(&self.plans).push_back(response);
    }

    /// Queues the response of the next `get_tutoring` call.
    pub fn push_tutoring(&self, response: GatewayResult<TutoringOutput>) {
        lock(&self.tutoring).push_back(response);
    }

    /// Returns every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: GatewayCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next_response<T>(queue: &Mutex<VecDeque<GatewayResult<T>>>, entry: &str) -> GatewayResult<T> {
    lock(queue).pop_front().unwrap_or_else(|| {
        Err(GatewayError::new(
            GatewayErrorKind::Other,
            format!("no scripted response for {entry}"),
        ))
    })
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate_quiz(&self, input: &QuizInput) -> GatewayResult<QuizOutput> {
        self.record(GatewayCall::Quiz(input.clone()));
        next_response(&self.quizzes, "generate_quiz")
    }

    async fn generate_study_plan(&self, input: &StudyPlanInput) -> GatewayResult<StudyPlanOutput> {
        self.record(GatewayCall::StudyPlan(input.clone()));
        next_response(&self.plans, "generate_study_plan")
    }

    async fn get_tutoring(&self, input: &TutoringInput) -> GatewayResult<TutoringOutput> {
        self.record(GatewayCall::Tutoring(input.clone()));
        next_response(&self.tutoring, "get_tutoring")
    }
}

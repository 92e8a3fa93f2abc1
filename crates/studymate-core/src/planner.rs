//! The study-plan request engine.
//!
//! Holds only the most recent outcome: a plan, or the error message of the
//! last failed request. A new request always discards the previous outcome.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GatewayResult, GenerationKind, Result, StudyError};
use crate::gateway::{SharedGateway, StudyPlanInput, StudyPlanOutput};
use crate::model::StudentLevel;

/// Smallest accepted daily study time in hours.
pub const MIN_STUDY_HOURS: f64 = 0.5;

/// Largest accepted daily study time in hours.
pub const MAX_STUDY_HOURS: f64 = 16.0;

/// Wire format of the exam date.
pub const EXAM_DATE_FORMAT: &str = "%Y-%m-%d";

/// State of a [`PlannerEngine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlannerState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// Waiting for the gateway.
    Loading,
    /// The last request produced a plan.
    Result {
        /// The plan as markdown.
        #[serde(rename = "studyPlan")]
        study_plan: String,
    },
    /// The last request failed.
    Error {
        /// Message for the student.
        message: String,
    },
}

impl std::fmt::Display for PlannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Result { .. } => write!(f, "result"),
            Self::Error { .. } => write!(f, "error"),
        }
    }
}

/// A request for a study plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlanRequest {
    /// Date of the exam. Past dates are accepted.
    pub exam_date: NaiveDate,

    /// Subjects to cover. Duplicates are kept.
    pub subjects: Vec<String>,

    /// Hours available per day.
    pub available_study_time: f64,

    /// Academic level of the student.
    #[serde(default)]
    pub student_level: StudentLevel,
}

impl StudyPlanRequest {
    /// Checks the subject list and the study time.
    pub fn validate(&self) -> Result<()> {
        if self.subjects.is_empty() {
            return Err(StudyError::validation(
                "subjects",
                "Please add at least one subject.",
            ));
        }
        if self.subjects.iter().any(|s| s.trim().is_empty()) {
            return Err(StudyError::validation(
                "subjects",
                "Subjects cannot be empty.",
            ));
        }

        let hours = self.available_study_time;
        if !hours.is_finite() || !(MIN_STUDY_HOURS..=MAX_STUDY_HOURS).contains(&hours) {
            return Err(StudyError::validation(
                "availableStudyTime",
                "Study time must be between 0.5 and 16 hours per day.",
            ));
        }
        Ok(())
    }

    fn to_input(&self) -> StudyPlanInput {
        StudyPlanInput {
            exam_date: self.exam_date.format(EXAM_DATE_FORMAT).to_string(),
            subjects: self.subjects.iter().map(|s| s.trim().to_string()).collect(),
            available_study_time: self.available_study_time,
            student_level: self.student_level,
        }
    }
}

/// Requests study plans and keeps the latest outcome.
pub struct PlannerEngine {
    gateway: SharedGateway,
    state: PlannerState,
}

impl std::fmt::Debug for PlannerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerEngine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PlannerEngine {
    /// Creates an idle engine.
    #[must_use]
    pub fn new(gateway: SharedGateway) -> Self {
        Self {
            gateway,
            state: PlannerState::Idle,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &PlannerState {
        &self.state
    }

    /// Returns `true` while a request is outstanding.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, PlannerState::Loading)
    }

    /// The latest plan, if the last request succeeded.
    #[must_use]
    pub fn study_plan(&self) -> Option<&str> {
        match &self.state {
            PlannerState::Result { study_plan } => Some(study_plan),
            _ => None,
        }
    }

    /// The error message, if the last request failed.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            PlannerState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Returns a handle to the gateway this engine uses.
    #[must_use]
    pub fn gateway(&self) -> SharedGateway {
        Arc::clone(&self.gateway)
    }

    /// Validates the request and enters Loading.
    ///
    /// Invalid input leaves the state untouched, so a previous plan stays
    /// visible.
    pub fn begin_generate(&mut self, request: &StudyPlanRequest) -> Result<StudyPlanInput> {
        if self.is_loading() {
            warn!("Study plan request rejected while a previous one is pending");
            return Err(StudyError::EngineBusy { engine: "planner" });
        }
        request.validate()?;

        let input = request.to_input();
        info!(
            exam_date = %input.exam_date,
            subjects = input.subjects.len(),
            hours = input.available_study_time,
            level = %input.student_level,
            "Generating study plan"
        );
        self.state = PlannerState::Loading;
        Ok(input)
    }

    /// Applies the gateway outcome of a request started with
    /// [`begin_generate`](Self::begin_generate).
    pub fn complete_generate(
        &mut self,
        outcome: GatewayResult<StudyPlanOutput>,
    ) -> Result<&str> {
        if !self.is_loading() {
            return Err(StudyError::invalid_transition(&self.state, "result"));
        }

        match outcome {
            Ok(output) => {
                info!(chars = output.study_plan.len(), "Study plan ready");
                self.state = PlannerState::Result {
                    study_plan: output.study_plan,
                };
                self.study_plan()
                    .ok_or_else(|| StudyError::invalid_transition("loading", "result"))
            }
            Err(error) => {
                warn!(error = %error, "Study plan generation failed");
                let kind = GenerationKind::StudyPlan;
                self.state = PlannerState::Error {
                    message: kind.failure_message().to_string(),
                };
                Err(StudyError::GenerationFailed(kind))
            }
        }
    }

    /// Requests a plan and waits for the gateway.
    pub async fn generate(&mut self, request: &StudyPlanRequest) -> Result<&str> {
        let input = self.begin_generate(request)?;
        let gateway = self.gateway();
        let outcome = gateway.generate_study_plan(&input).await;
        self.complete_generate(outcome)
    }
}

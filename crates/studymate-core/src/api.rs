//! HTTP API for the StudyMate engines.
//!
//! Every browser session gets its own quiz, tutor and planner engine, kept
//! in memory and addressed by a UUID. Handlers release the session lock
//! while a gateway call is in flight, so a concurrent request to the same
//! engine sees it loading and is rejected with `409 Conflict`. The call and
//! its completion run on a spawned task, so a dropped request never leaves
//! an engine loading. Sessions unused for `sessionIdleSecs` are evicted
//! whenever a new session is created.
//!
//! # Endpoints
//!
//! - `GET /api/health` - Liveness check
//! - `POST /api/sessions` - Create a session
//! - `DELETE /api/sessions/:id` - Drop a session
//! - `GET|POST /api/sessions/:id/quiz` - Quiz view / request a quiz
//! - `POST /api/sessions/:id/quiz/answer` - Select an option
//! - `POST /api/sessions/:id/quiz/advance` - Next question or finish
//! - `POST /api/sessions/:id/quiz/restart` - Back to idle
//! - `GET /api/sessions/:id/quiz/report` - Review of a finished quiz
//! - `GET|POST /api/sessions/:id/tutor` - Conversation / ask a question
//! - `GET|POST /api/sessions/:id/planner` - Plan view / request a plan
//! - `GET /api/library` - Resource catalog
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use studymate_core::{create_router, AppState, Config, ScriptedGateway};
//!
//! # async fn example() {
//! let state = AppState::new(Config::default(), Arc::new(ScriptedGateway::new()));
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use studymate_report::{json::JsonGenerator, render_markdown, MarkdownGenerator, ReportError};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::StudyError;
use crate::gateway::SharedGateway;
use crate::library::{self, Resource, ResourceType, Subject};
use crate::planner::{PlannerEngine, PlannerState, StudyPlanRequest};
use crate::quiz::{QuizEngine, QuizRequest, QuizResult, QuizState};
use crate::tutor::{ConversationMessage, TutorEngine, TutorQuestion};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response body of the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
}

/// Response body of session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    /// Id to use in every session route.
    pub session_id: Uuid,
}

/// Request body for a new quiz; `quizLength` falls back to the configured
/// default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizForm {
    /// Topic of the quiz.
    pub topic: String,
    /// What the student already knows.
    pub student_understanding: String,
    /// Number of questions, 3 to 10.
    #[serde(default)]
    pub quiz_length: Option<u8>,
}

/// Request body for answer selection.
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    /// The chosen option, verbatim.
    pub option: String,
}

/// Output format of the quiz report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// `text/markdown`.
    #[default]
    Markdown,
    /// `application/json`.
    Json,
}

/// Query string of the report endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    /// Requested format.
    #[serde(default)]
    pub format: ReportFormat,
}

/// Query string of the library endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryQuery {
    /// Subject filter, e.g. `Science` or `computer-science`.
    pub subject: Option<String>,
    /// Type filter: `notes`, `article` or `video`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

/// A question as shown while it is being answered.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    /// The question text.
    pub question: String,
    /// Options in display order.
    pub options: Vec<String>,
}

/// Feedback on the selected answer of the current question.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    /// Whether the selection is right.
    pub is_correct: bool,
    /// `Correct!` or `Incorrect`.
    pub title: &'static str,
    /// Why the correct option is correct.
    pub explanation: String,
}

/// Final score with its tier message.
#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    /// Score summary.
    #[serde(flatten)]
    pub result: QuizResult,
    /// Tier message for the student.
    pub message: &'static str,
}

/// Snapshot of a quiz engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    /// Lifecycle state.
    pub state: QuizState,
    /// Topic of the current or pending quiz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// One-based number of the current question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_number: Option<usize>,
    /// Number of questions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<usize>,
    /// Progress in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    /// The current question, without its answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<QuestionView>,
    /// Option selected for the current question.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_answer: Option<String>,
    /// Feedback once an option is selected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackView>,
    /// Whether the current question is the last one.
    pub is_last_question: bool,
    /// Score summary once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultView>,
}

impl QuizView {
    fn from_engine(engine: &QuizEngine) -> Self {
        let session = engine.session();
        let current = engine.current_question();
        let selected = engine.selected_answer();

        let feedback = current.zip(selected).map(|(question, answer)| {
            let is_correct = question.is_correct(answer);
            FeedbackView {
                is_correct,
                title: if is_correct { "Correct!" } else { "Incorrect" },
                explanation: question.explanation.clone(),
            }
        });

        let topic = session
            .map(|s| s.topic.clone())
            .or_else(|| engine.pending_request().map(|r| r.topic.clone()));

        let active = engine.state() == QuizState::Active;

        Self {
            state: engine.state(),
            topic,
            question_number: session.filter(|_| active).map(|s| s.current_index + 1),
            total_questions: session.map(crate::quiz::QuizSession::len),
            progress_percent: engine.progress_percent().filter(|_| active),
            current_question: current.map(|q| QuestionView {
                question: q.question.clone(),
                options: q.options.clone(),
            }),
            selected_answer: selected.map(ToString::to_string),
            feedback,
            is_last_question: active && session.is_some_and(|s| s.is_last(s.current_index)),
            result: engine.result().map(|result| ResultView {
                message: result.tier.message(),
                result,
            }),
        }
    }
}

/// A conversation entry with its rendered form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    /// The stored message.
    #[serde(flatten)]
    pub message: ConversationMessage,
    /// Sanitized HTML of assistant messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Snapshot of a tutor engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorView {
    /// Whether an answer is outstanding.
    pub is_loading: bool,
    /// The conversation in order.
    pub messages: Vec<MessageView>,
}

impl TutorView {
    fn from_engine(engine: &TutorEngine) -> Self {
        let messages = engine
            .messages()
            .iter()
            .map(|m| MessageView {
                html: (m.role == crate::tutor::Role::Assistant).then(|| render_markdown(&m.content)),
                message: m.clone(),
            })
            .collect();
        Self {
            is_loading: engine.is_loading(),
            messages,
        }
    }
}

/// Snapshot of a planner engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerView {
    /// The planner state.
    #[serde(flatten)]
    pub state: PlannerState,
    /// Sanitized HTML of the plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_plan_html: Option<String>,
}

impl PlannerView {
    fn from_engine(engine: &PlannerEngine) -> Self {
        Self {
            state: engine.state().clone(),
            study_plan_html: engine.study_plan().map(render_markdown),
        }
    }
}

// ============================================================================
// Application State
// ============================================================================

/// The engines of one browser session.
#[derive(Debug)]
pub struct Session {
    /// Quiz engine.
    pub quiz: QuizEngine,
    /// Tutor engine.
    pub tutor: TutorEngine,
    /// Planner engine.
    pub planner: PlannerEngine,
}

impl Session {
    /// Creates a session whose engines share `gateway`.
    #[must_use]
    pub fn new(gateway: &SharedGateway) -> Self {
        Self {
            quiz: QuizEngine::new(Arc::clone(gateway)),
            tutor: TutorEngine::new(Arc::clone(gateway)),
            planner: PlannerEngine::new(Arc::clone(gateway)),
        }
    }
}

type SessionHandle = Arc<Mutex<Session>>;

/// A live session and when it was last used.
#[derive(Debug, Clone)]
pub struct SessionSlot {
    handle: SessionHandle,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When a request last looked the session up.
    pub last_used: DateTime<Utc>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        let now = Utc::now();
        Self {
            handle: Arc::new(Mutex::new(session)),
            created_at: now,
            last_used: now,
        }
    }

    /// Whole seconds since the last lookup, zero if the clock went back.
    fn idle_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.last_used).num_seconds()).unwrap_or(0)
    }
}

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Gateway handed to every new session.
    pub gateway: SharedGateway,
    /// Live sessions by id.
    pub sessions: Arc<Mutex<HashMap<Uuid, SessionSlot>>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Creates a state with no sessions.
    #[must_use]
    pub fn new(config: Config, gateway: SharedGateway) -> Self {
        Self {
            config,
            gateway,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn session(&self, id: Uuid) -> Result<SessionHandle, ApiError> {
        let mut sessions = self.sessions.lock().await;
        let slot = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
        slot.last_used = Utc::now();
        Ok(Arc::clone(&slot.handle))
    }

    /// Drops sessions unused for at least `sessionIdleSecs`.
    fn evict_idle(&self, sessions: &mut HashMap<Uuid, SessionSlot>, now: DateTime<Utc>) -> usize {
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let idle = slot.idle_secs(now);
            let expired = idle >= self.config.session_idle_secs;
            if expired {
                info!(
                    session_id = %id,
                    idle_secs = idle,
                    age_secs = (now - slot.created_at).num_seconds(),
                    "Session expired"
                );
            }
            !expired
        });
        before - sessions.len()
    }
}

/// Finishes a gateway call on its own task.
///
/// The task owns a session handle, so the engine always leaves its loading
/// state even if the request that started the call is dropped.
async fn complete_detached<T, F>(work: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, StudyError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(ApiError::Task)?
        .map_err(ApiError::from)
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// No session with this id.
    SessionNotFound(Uuid),
    /// `maxSessions` reached.
    AtCapacity(usize),
    /// Malformed query parameter.
    BadRequest(String),
    /// Engine error.
    Study(StudyError),
    /// Report rendering failed.
    Report(ReportError),
    /// The task finishing a gateway call panicked or was aborted.
    Task(tokio::task::JoinError),
}

impl From<StudyError> for ApiError {
    fn from(error: StudyError) -> Self {
        Self::Study(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::SessionNotFound(id) => (StatusCode::NOT_FOUND, format!("Session {id} not found")),
            Self::AtCapacity(max) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Session limit of {max} reached, try again later"),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Study(error) => (status_for(&error), error.to_string()),
            Self::Report(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            Self::Task(error) => {
                warn!(error = %error, "Generation task did not finish");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Generation task did not finish".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

const fn status_for(error: &StudyError) -> StatusCode {
    match error {
        StudyError::Validation { .. } => StatusCode::BAD_REQUEST,
        StudyError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
        StudyError::InvalidStateTransition { .. }
        | StudyError::EngineBusy { .. }
        | StudyError::UnansweredQuestion { .. } => StatusCode::CONFLICT,
        StudyError::ConfigParseError { .. }
        | StudyError::ConfigValidationError { .. }
        | StudyError::Io(_)
        | StudyError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// All routes live under `/api`, with permissive CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handle_health))
        .route("/library", get(handle_library))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/:id", delete(handle_delete_session))
        .route("/sessions/:id/quiz", get(handle_quiz_view).post(handle_quiz_request))
        .route("/sessions/:id/quiz/answer", post(handle_quiz_answer))
        .route("/sessions/:id/quiz/advance", post(handle_quiz_advance))
        .route("/sessions/:id/quiz/restart", post(handle_quiz_restart))
        .route("/sessions/:id/quiz/report", get(handle_quiz_report))
        .route("/sessions/:id/tutor", get(handle_tutor_view).post(handle_tutor_ask))
        .route(
            "/sessions/:id/planner",
            get(handle_planner_view).post(handle_planner_generate),
        );

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn handle_library(
    Query(query): Query<LibraryQuery>,
) -> Result<Json<Vec<&'static Resource>>, ApiError> {
    let subject = query
        .subject
        .as_deref()
        .map(str::parse::<Subject>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let kind = query
        .kind
        .as_deref()
        .map(str::parse::<ResourceType>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(library::filter(subject, kind)))
}

async fn handle_create_session(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let mut sessions = state.sessions.lock().await;
    let evicted = state.evict_idle(&mut sessions, Utc::now());
    if evicted > 0 {
        debug!(evicted, "Evicted idle sessions");
    }
    if sessions.len() >= state.config.max_sessions {
        warn!(
            sessions = sessions.len(),
            max = state.config.max_sessions,
            "Session limit reached"
        );
        return Err(ApiError::AtCapacity(state.config.max_sessions));
    }

    let id = Uuid::new_v4();
    sessions.insert(id, SessionSlot::new(Session::new(&state.gateway)));
    info!(session_id = %id, active = sessions.len(), "Session created");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id: id }),
    ))
}

async fn handle_delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .lock()
        .await
        .remove(&id)
        .ok_or(ApiError::SessionNotFound(id))?;
    info!(session_id = %id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Quiz
// ----------------------------------------------------------------------------

async fn handle_quiz_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let handle = state.session(id).await?;
    let session = handle.lock().await;
    Ok(Json(QuizView::from_engine(&session.quiz)))
}

async fn handle_quiz_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(form): Json<QuizForm>,
) -> Result<Json<QuizView>, ApiError> {
    let request = QuizRequest::new(
        form.topic,
        form.student_understanding,
        form.quiz_length.unwrap_or(state.config.default_quiz_length),
    );
    request.validate_form()?;

    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    let input = session.quiz.begin_quiz(request)?;
    let gateway = session.quiz.gateway();
    drop(session);

    let view = complete_detached(async move {
        let outcome = gateway.generate_quiz(&input).await;
        let mut session = handle.lock().await;
        session.quiz.complete_quiz(outcome)?;
        Ok::<_, StudyError>(QuizView::from_engine(&session.quiz))
    })
    .await?;
    Ok(Json(view))
}

async fn handle_quiz_answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<QuizView>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    session.quiz.select_answer(&request.option)?;
    Ok(Json(QuizView::from_engine(&session.quiz)))
}

async fn handle_quiz_advance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    session.quiz.advance()?;
    Ok(Json(QuizView::from_engine(&session.quiz)))
}

async fn handle_quiz_restart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    session.quiz.restart()?;
    Ok(Json(QuizView::from_engine(&session.quiz)))
}

async fn handle_quiz_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    let handle = state.session(id).await?;
    let session = handle.lock().await;
    let report = session.quiz.report().ok_or_else(|| {
        StudyError::invalid_transition(session.quiz.state(), "report (requires finished)")
    })?;

    match query.format {
        ReportFormat::Markdown => {
            let body = MarkdownGenerator::new(&report).generate();
            Ok((
                [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
                body,
            )
                .into_response())
        }
        ReportFormat::Json => {
            let body = JsonGenerator::new(&report)
                .generate()
                .map_err(ApiError::Report)?;
            Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
        }
    }
}

// ----------------------------------------------------------------------------
// Tutor
// ----------------------------------------------------------------------------

async fn handle_tutor_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TutorView>, ApiError> {
    let handle = state.session(id).await?;
    let session = handle.lock().await;
    Ok(Json(TutorView::from_engine(&session.tutor)))
}

async fn handle_tutor_ask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(question): Json<TutorQuestion>,
) -> Result<Json<TutorView>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    let turn = session.tutor.begin_ask(question)?;
    let gateway = session.tutor.gateway();
    drop(session);

    let view = complete_detached(async move {
        let outcome = gateway.get_tutoring(turn.input()).await;
        let mut session = handle.lock().await;
        session.tutor.complete_ask(turn, outcome)?;
        Ok::<_, StudyError>(TutorView::from_engine(&session.tutor))
    })
    .await?;
    Ok(Json(view))
}

// ----------------------------------------------------------------------------
// Planner
// ----------------------------------------------------------------------------

async fn handle_planner_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlannerView>, ApiError> {
    let handle = state.session(id).await?;
    let session = handle.lock().await;
    Ok(Json(PlannerView::from_engine(&session.planner)))
}

async fn handle_planner_generate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<StudyPlanRequest>,
) -> Result<Json<PlannerView>, ApiError> {
    let handle = state.session(id).await?;
    let mut session = handle.lock().await;
    let input = session.planner.begin_generate(&request)?;
    let gateway = session.planner.gateway();
    drop(session);

    let view = complete_detached(async move {
        let outcome = gateway.generate_study_plan(&input).await;
        let mut session = handle.lock().await;
        session.planner.complete_generate(outcome)?;
        Ok::<_, StudyError>(PlannerView::from_engine(&session.planner))
    })
    .await?;
    Ok(Json(view))
}

// ============================================================================
// Tests
// ============================================================================

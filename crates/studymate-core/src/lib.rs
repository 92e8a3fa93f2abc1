//! StudyMate Core
//!
//! Quiz, tutor and planner engines driven by a generation gateway, plus the
//! HTTP API that serves them.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod library;
pub mod model;
pub mod planner;
pub mod quiz;
pub mod tutor;

pub use api::{create_router, AppState, ErrorResponse, QuizForm, Session};
pub use config::{Config, CONFIG_FILE_NAME};
pub use error::{
    GatewayError, GatewayErrorKind, GatewayResult, GenerationKind, Result, StudyError,
};
pub use gateway::{
    GatewayCall, GenerationGateway, QuizInput, QuizOutput, ScriptedGateway, SharedGateway,
    StudyPlanInput, StudyPlanOutput, TutoringInput, TutoringOutput,
};
pub use library::{Resource, ResourceType, Subject};
pub use model::{QuizQuestion, StudentLevel};
pub use planner::{PlannerEngine, PlannerState, StudyPlanRequest};
pub use quiz::{
    Advance, QuizEngine, QuizRequest, QuizResult, QuizSession, QuizState, ScoreTier,
    DEFAULT_QUIZ_LENGTH,
};
pub use tutor::{ConversationMessage, MessageId, PendingTurn, Role, TutorEngine, TutorQuestion};

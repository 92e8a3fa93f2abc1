//! End-to-end scenarios for the StudyMate engines.
//!
//! Every engine is driven through a scripted in-memory gateway, so these
//! tests need no network access and no API key.

use std::sync::Arc;

use chrono::NaiveDate;
use studymate_core::{
    Advance, GatewayCall, GatewayError, GatewayErrorKind, PlannerEngine, PlannerState,
    QuizEngine, QuizOutput, QuizQuestion, QuizRequest, QuizState, Role, ScoreTier,
    ScriptedGateway, SharedGateway, StudentLevel, StudyPlanOutput, StudyPlanRequest, StudyError,
    TutorEngine, TutorQuestion, TutoringOutput,
};
use studymate_report::{MarkdownGenerator, ReportTier};

fn scripted() -> (Arc<ScriptedGateway>, SharedGateway) {
    let gateway = Arc::new(ScriptedGateway::new());
    let shared: SharedGateway = Arc::clone(&gateway) as SharedGateway;
    (gateway, shared)
}

fn photosynthesis_quiz() -> QuizOutput {
    let question = |q: &str, options: [&str; 3], answer: &str, why: &str| QuizQuestion {
        question: q.to_string(),
        options: options.iter().map(ToString::to_string).collect(),
        correct_answer: answer.to_string(),
        explanation: why.to_string(),
    };

    QuizOutput {
        quiz_questions: vec![
            question(
                "Which gas do plants take in for photosynthesis?",
                ["Oxygen", "Carbon dioxide", "Nitrogen"],
                "Carbon dioxide",
                "CO2 is fixed into sugars in the Calvin cycle.",
            ),
            question(
                "Where do the light reactions take place?",
                ["Thylakoid membrane", "Stroma", "Cytoplasm"],
                "Thylakoid membrane",
                "Photosystems sit in the thylakoid membranes.",
            ),
            question(
                "Which pigment absorbs most of the light?",
                ["Carotene", "Chlorophyll", "Melanin"],
                "Chlorophyll",
                "Chlorophyll a and b absorb red and blue light.",
            ),
        ],
    }
}

/// Tests the full quiz journey: request, answer everything right, finish.
#[test]
fn test_photosynthesis_quiz_end_to_end() {
    let (gateway, shared) = scripted();
    gateway.push_quiz(Ok(photosynthesis_quiz()));
    let mut engine = QuizEngine::new(shared);

    let request = QuizRequest::new("Photosynthesis", "I know the basics", 3);
    tokio_test::block_on(engine.request_quiz(request)).expect("quiz should generate");
    assert_eq!(engine.state(), QuizState::Active);

    let mut finished = None;
    for _ in 0..3 {
        let answer = engine
            .current_question()
            .map(|q| q.correct_answer.clone())
            .expect("active quiz has a current question");
        engine.select_answer(&answer).expect("answer is a listed option");
        if let Advance::Finished(result) = engine.advance().expect("answered question advances") {
            finished = Some(result);
        }
    }

    let result = finished.expect("quiz should finish after three answers");
    assert_eq!(engine.state(), QuizState::Finished);
    assert_eq!(result.score, 3);
    assert_eq!(result.tier, ScoreTier::Excellent);
    assert_eq!(result.tier.to_string(), "excellent");
    assert!(engine.should_celebrate());

    let report = engine.report().expect("finished quiz has a report");
    assert_eq!(report.tier, ReportTier::Excellent);
    let markdown = MarkdownGenerator::new(&report).generate();
    assert!(markdown.contains("# Quiz Review: Photosynthesis"));
    assert!(markdown.contains("Carbon dioxide"));

    assert_eq!(gateway.calls().len(), 1);
}

/// Tests that a restarted quiz starts from a clean session.
#[test]
fn test_quiz_restart_then_new_quiz_is_clean() {
    let (gateway, shared) = scripted();
    gateway.push_quiz(Ok(photosynthesis_quiz()));
    gateway.push_quiz(Ok(photosynthesis_quiz()));
    let mut engine = QuizEngine::new(shared);

    tokio_test::block_on(engine.request_quiz(QuizRequest::new(
        "Photosynthesis",
        "I know the basics",
        3,
    )))
    .expect("first quiz");
    for _ in 0..3 {
        let wrong = engine
            .current_question()
            .and_then(|q| q.options.iter().find(|o| **o != q.correct_answer).cloned())
            .expect("every question has a wrong option");
        engine.select_answer(&wrong).expect("wrong option is still listed");
        engine.advance().expect("answered");
    }
    assert_eq!(engine.score(), Some(0));

    engine.restart().expect("restart from finished");
    tokio_test::block_on(engine.request_quiz(QuizRequest::new(
        "Photosynthesis",
        "I know the basics",
        3,
    )))
    .expect("second quiz");

    let session = engine.session().expect("active session");
    assert_eq!(session.current_index, 0);
    assert!(session.answers.is_empty());
    assert!(session.score.is_none());
    assert!(engine.score().is_none());
}

/// Tests that a failed quiz request returns to idle and can be retried.
#[test]
fn test_quiz_failure_then_retry() {
    let (gateway, shared) = scripted();
    gateway.push_quiz(Err(GatewayError::new(GatewayErrorKind::Network, "reset")));
    gateway.push_quiz(Ok(photosynthesis_quiz()));
    let mut engine = QuizEngine::new(shared);
    let request = QuizRequest::new("Photosynthesis", "I know the basics", 3);

    let err = tokio_test::block_on(engine.request_quiz(request.clone())).expect_err("first call fails");
    assert!(matches!(err, StudyError::GenerationFailed(_)));
    assert!(err.is_retryable());
    assert_eq!(engine.state(), QuizState::Idle);

    tokio_test::block_on(engine.request_quiz(request)).expect("retry succeeds");
    assert_eq!(engine.state(), QuizState::Active);
}

/// Tests a tutor conversation with one failed turn in the middle.
#[test]
fn test_tutor_conversation_with_rollback() {
    let (gateway, shared) = scripted();
    gateway.push_tutoring(Ok(TutoringOutput {
        explanation: "Mitochondria make ATP.".to_string(),
    }));
    gateway.push_tutoring(Err(GatewayError::new(GatewayErrorKind::Server, "500")));
    gateway.push_tutoring(Ok(TutoringOutput {
        explanation: "Ribosomes build proteins.".to_string(),
    }));
    let mut engine = TutorEngine::new(shared);
    let ask = |q: &str| TutorQuestion::new("Cell biology", q, StudentLevel::HighSchool);

    tokio_test::block_on(engine.ask(ask("What do mitochondria do?"))).expect("first answer");
    let err = tokio_test::block_on(engine.ask(ask("What does the nucleus do?"))).expect_err("fails");
    assert_eq!(err.to_string(), "Failed to get response from tutor.");
    assert_eq!(engine.messages().len(), 2);

    tokio_test::block_on(engine.ask(ask("What do ribosomes do?"))).expect("third answer");

    let transcript: Vec<(Role, &str)> = engine
        .messages()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        transcript,
        vec![
            (Role::User, "What do mitochondria do?"),
            (Role::Assistant, "Mitochondria make ATP."),
            (Role::User, "What do ribosomes do?"),
            (Role::Assistant, "Ribosomes build proteins."),
        ]
    );
    assert!(!engine.is_loading());
}

/// Tests that resubmitting a plan that then fails shows the error, not the old plan.
#[test]
fn test_planner_resubmission_failure_shows_error() {
    let (gateway, shared) = scripted();
    gateway.push_study_plan(Ok(StudyPlanOutput {
        study_plan: "## Monday\n- Algebra".to_string(),
    }));
    gateway.push_study_plan(Err(GatewayError::malformed("missing studyPlan")));
    let mut engine = PlannerEngine::new(shared);

    let request = StudyPlanRequest {
        exam_date: NaiveDate::from_ymd_opt(2026, 11, 30).expect("valid date"),
        subjects: vec!["Math".to_string(), "Math".to_string()],
        available_study_time: 0.5,
        student_level: StudentLevel::College,
    };

    tokio_test::block_on(engine.generate(&request)).expect("first plan");
    assert!(matches!(engine.state(), PlannerState::Result { .. }));

    tokio_test::block_on(engine.generate(&request)).expect_err("second plan fails");
    assert_eq!(
        engine.state(),
        &PlannerState::Error {
            message: "Failed to generate study plan.".to_string()
        }
    );

    let calls = gateway.calls();
    assert_eq!(calls.len(), 2);
    let GatewayCall::StudyPlan(input) = &calls[1] else {
        panic!("expected a study plan call, got {:?}", calls[1]);
    };
    assert_eq!(input.exam_date, "2026-11-30");
    assert_eq!(input.subjects.len(), 2);
}

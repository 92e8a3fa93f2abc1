//! HTTP API integration tests.
//!
//! Drives the router with `tower::ServiceExt::oneshot`. The concurrency
//! tests use a gateway that parks every call until released, so a second
//! request can be sent while the first one is in flight, or so a request
//! can be dropped mid-call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use studymate_core::{
    create_router, AppState, Config, GatewayError, GatewayErrorKind, GatewayResult,
    GenerationGateway, QuizInput, QuizOutput,
    QuizQuestion, ScriptedGateway, StudyPlanInput, StudyPlanOutput, TutoringInput,
    TutoringOutput,
};
use tokio::sync::Notify;
use tower::util::ServiceExt;

/// A gateway that signals when a call starts and waits for a release.
#[derive(Default)]
struct GatedGateway {
    started: Notify,
    release: Notify,
    inner: ScriptedGateway,
}

impl GatedGateway {
    async fn park(&self) {
        self.started.notify_one();
        self.release.notified().await;
    }
}

#[async_trait]
impl GenerationGateway for GatedGateway {
    async fn generate_quiz(&self, input: &QuizInput) -> GatewayResult<QuizOutput> {
        self.park().await;
        self.inner.generate_quiz(input).await
    }

    async fn generate_study_plan(&self, input: &StudyPlanInput) -> GatewayResult<StudyPlanOutput> {
        self.park().await;
        self.inner.generate_study_plan(input).await
    }

    async fn get_tutoring(&self, input: &TutoringInput) -> GatewayResult<TutoringOutput> {
        self.park().await;
        self.inner.get_tutoring(input).await
    }
}

fn quiz_output(n: usize) -> QuizOutput {
    QuizOutput {
        quiz_questions: (0..n)
            .map(|i| QuizQuestion {
                question: format!("Question {i}"),
                options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                correct_answer: "A".to_string(),
                explanation: "A is right.".to_string(),
            })
            .collect(),
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn create_session(router: &Router) -> String {
    let (status, body) = send(router, Method::POST, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["sessionId"]
        .as_str()
        .expect("sessionId is a string")
        .to_string()
}

/// Polls `uri` until `done` accepts the view.
async fn wait_for_view(router: &Router, uri: &str, done: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..200 {
        let (_, view) = send(router, Method::GET, uri, None).await;
        if done(&view) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("view at {uri} never settled");
}

fn quiz_form() -> Value {
    json!({
        "topic": "Photosynthesis",
        "studentUnderstanding": "I know the basics",
        "quizLength": 3
    })
}

/// Tests that a second quiz request during generation is rejected with 409.
#[tokio::test]
async fn test_concurrent_quiz_request_is_rejected() {
    let gateway = Arc::new(GatedGateway::default());
    gateway.inner.push_quiz(Ok(quiz_output(3)));
    let router = create_router(AppState::new(Config::default(), gateway.clone()));
    let id = create_session(&router).await;
    let uri = format!("/api/sessions/{id}/quiz");

    let first = {
        let router = router.clone();
        let uri = uri.clone();
        tokio::spawn(async move { send(&router, Method::POST, &uri, Some(quiz_form())).await })
    };
    gateway.started.notified().await;

    let (status, view) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "generating");
    assert_eq!(view["topic"], "Photosynthesis");

    let (status, body) = send(&router, Method::POST, &uri, Some(quiz_form())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().expect("error message").contains("still waiting"));

    gateway.release.notify_one();
    let (status, view) = first.await.expect("first request task");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "active");
    assert_eq!(gateway.inner.calls().len(), 1);
}

/// Tests that the tutor shows the pending question while loading.
#[tokio::test]
async fn test_tutor_loading_is_visible() {
    let gateway = Arc::new(GatedGateway::default());
    gateway.inner.push_tutoring(Ok(TutoringOutput {
        explanation: "Because of gravity.".to_string(),
    }));
    let router = create_router(AppState::new(Config::default(), gateway.clone()));
    let id = create_session(&router).await;
    let uri = format!("/api/sessions/{id}/tutor");
    let question = json!({ "topic": "Physics", "question": "Why do apples fall?" });

    let pending = {
        let router = router.clone();
        let uri = uri.clone();
        let question = question.clone();
        tokio::spawn(async move { send(&router, Method::POST, &uri, Some(question)).await })
    };
    gateway.started.notified().await;

    let (_, view) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(view["isLoading"], true);
    assert_eq!(view["messages"].as_array().map(Vec::len), Some(1));

    let (status, _) = send(&router, Method::POST, &uri, Some(question)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    gateway.release.notify_one();
    let (status, view) = pending.await.expect("tutor task");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["isLoading"], false);
    assert_eq!(view["messages"].as_array().map(Vec::len), Some(2));
}

/// Tests that sessions do not share engine state.
#[tokio::test]
async fn test_sessions_are_isolated() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_quiz(Ok(quiz_output(3)));
    let router = create_router(AppState::new(Config::default(), gateway.clone()));

    let first = create_session(&router).await;
    let second = create_session(&router).await;
    assert_ne!(first, second);

    let (status, _) = send(
        &router,
        Method::POST,
        &format!("/api/sessions/{first}/quiz"),
        Some(quiz_form()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, view) = send(&router, Method::GET, &format!("/api/sessions/{second}/quiz"), None).await;
    assert_eq!(view["state"], "idle");
}

/// Tests a whole quiz over HTTP including the markdown report.
#[tokio::test]
async fn test_quiz_over_http_with_markdown_report() {
    let gateway = Arc::new(ScriptedGateway::new());
    gateway.push_quiz(Ok(quiz_output(3)));
    let router = create_router(AppState::new(Config::default(), gateway.clone()));
    let id = create_session(&router).await;
    let base = format!("/api/sessions/{id}/quiz");

    send(&router, Method::POST, &base, Some(quiz_form())).await;
    for _ in 0..3 {
        let (status, _) = send(
            &router,
            Method::POST,
            &format!("{base}/answer"),
            Some(json!({ "option": "A" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        send(&router, Method::POST, &format!("{base}/advance"), None).await;
    }

    let (_, view) = send(&router, Method::GET, &base, None).await;
    assert_eq!(view["state"], "finished");
    assert_eq!(view["result"]["score"], 3);
    assert_eq!(view["result"]["celebrate"], true);
    assert_eq!(view["result"]["message"], "Excellent work!");

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("{base}/report"))
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("Router is infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/markdown; charset=utf-8"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let markdown = String::from_utf8(bytes.to_vec()).expect("utf-8 body");
    assert!(markdown.contains("# Quiz Review: Photosynthesis"));

    let (status, view) = send(&router, Method::POST, &format!("{base}/restart"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "idle");
}

/// Tests that a quiz request dropped mid-generation still finishes the quiz.
#[tokio::test]
async fn test_timed_out_quiz_request_still_completes() {
    let gateway = Arc::new(GatedGateway::default());
    gateway.inner.push_quiz(Ok(quiz_output(3)));
    let router = create_router(AppState::new(Config::default(), gateway.clone()));
    let id = create_session(&router).await;
    let uri = format!("/api/sessions/{id}/quiz");

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        send(&router, Method::POST, &uri, Some(quiz_form())),
    )
    .await;
    assert!(timed_out.is_err());
    gateway.started.notified().await;

    gateway.release.notify_one();
    let view = wait_for_view(&router, &uri, |view| view["state"] != "generating").await;
    assert_eq!(view["state"], "active");
    assert_eq!(view["totalQuestions"], 3);

    let (status, _) = send(
        &router,
        Method::POST,
        &format!("{uri}/answer"),
        Some(json!({ "option": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Tests that a tutor question dropped mid-call is rolled back and can be resent.
#[tokio::test]
async fn test_timed_out_tutor_question_can_be_resent() {
    let gateway = Arc::new(GatedGateway::default());
    gateway
        .inner
        .push_tutoring(Err(GatewayError::new(GatewayErrorKind::Network, "reset")));
    gateway.inner.push_tutoring(Ok(TutoringOutput {
        explanation: "Because of gravity.".to_string(),
    }));
    let router = create_router(AppState::new(Config::default(), gateway.clone()));
    let id = create_session(&router).await;
    let uri = format!("/api/sessions/{id}/tutor");
    let question = json!({ "topic": "Physics", "question": "Why do apples fall?" });

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        send(&router, Method::POST, &uri, Some(question.clone())),
    )
    .await;
    assert!(timed_out.is_err());
    gateway.started.notified().await;

    gateway.release.notify_one();
    let view = wait_for_view(&router, &uri, |view| view["isLoading"] == false).await;
    assert_eq!(view["messages"].as_array().map(Vec::len), Some(0));

    let resent = {
        let router = router.clone();
        let uri = uri.clone();
        tokio::spawn(async move { send(&router, Method::POST, &uri, Some(question)).await })
    };
    gateway.started.notified().await;
    gateway.release.notify_one();
    let (status, view) = resent.await.expect("resent question task");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["isLoading"], false);
    assert_eq!(view["messages"].as_array().map(Vec::len), Some(2));
}

/// Tests that a plan request dropped mid-generation still lands its result.
#[tokio::test]
async fn test_timed_out_plan_request_still_completes() {
    let gateway = Arc::new(GatedGateway::default());
    gateway.inner.push_study_plan(Ok(StudyPlanOutput {
        study_plan: "## Monday\n- Algebra".to_string(),
    }));
    let router = create_router(AppState::new(Config::default(), gateway.clone()));
    let id = create_session(&router).await;
    let uri = format!("/api/sessions/{id}/planner");
    let form = json!({
        "examDate": "2026-11-30",
        "subjects": ["Math"],
        "availableStudyTime": 2.0,
        "studentLevel": "college"
    });

    let timed_out = tokio::time::timeout(
        Duration::from_millis(50),
        send(&router, Method::POST, &uri, Some(form)),
    )
    .await;
    assert!(timed_out.is_err());
    gateway.started.notified().await;

    gateway.release.notify_one();
    let view = wait_for_view(&router, &uri, |view| view["status"] != "loading").await;
    assert_eq!(view["status"], "result");
    assert_eq!(view["studyPlan"], "## Monday\n- Algebra");
}

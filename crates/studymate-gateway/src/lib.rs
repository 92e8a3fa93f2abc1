//! StudyMate Gemini Gateway
//!
//! Implements [`GenerationGateway`] against the Gemini `generateContent`
//! REST endpoint. Every call sends one prompt, asks for a JSON response and
//! parses the first candidate's text into the typed output.

pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use studymate_core::{
    Config, GatewayError, GatewayErrorKind, GatewayResult, GenerationGateway, QuizInput,
    QuizOutput, StudyPlanInput, StudyPlanOutput, TutoringInput, TutoringOutput,
};
use thiserror::Error;
use tracing::{debug, warn};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Longest provider body excerpt kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Errors while constructing a [`GeminiGateway`].
#[derive(Debug, Error)]
pub enum SetupError {
    /// The configured API key variable is unset or empty.
    #[error("environment variable {var} is not set\n\nSuggestion: export {var}=<your Gemini API key>")]
    MissingApiKey {
        /// Name of the variable.
        var: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

impl GenerateContentRequest {
    fn new(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        }
    }
}

// ============================================================================
// GeminiGateway
// ============================================================================

/// A [`GenerationGateway`] backed by the Gemini API.
#[derive(Clone)]
pub struct GeminiGateway {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GeminiGateway {
    /// Creates a gateway for `model` at `api_base_url`.
    pub fn new(
        api_base_url: &str,
        model: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SetupError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!(
            "{}/v1beta/models/{model}:generateContent",
            api_base_url.trim_end_matches('/')
        );
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Creates a gateway from the configuration, reading the API key from
    /// the environment variable named by `apiKeyEnv`.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SetupError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;

        Self::new(
            &config.api_base_url,
            &config.model,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// The full `generateContent` URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn generate<T: DeserializeOwned + Send>(&self, entry: &str, prompt: String) -> GatewayResult<T> {
        debug!(entry, prompt_chars = prompt.len(), "Calling Gemini");

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&GenerateContentRequest::new(prompt))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(&e))?;

        if !status.is_success() {
            let error = status_error(status, &body);
            warn!(entry, status = status.as_u16(), kind = %error.kind, "Gemini returned an error status");
            return Err(error);
        }

        let text = candidate_text(&body)?;
        let output = parse_output(&text);
        if let Err(error) = &output {
            warn!(entry, error = %error, "Gemini output did not match the expected shape");
        }
        output
    }
}

#[async_trait]
impl GenerationGateway for GeminiGateway {
    async fn generate_quiz(&self, input: &QuizInput) -> GatewayResult<QuizOutput> {
        self.generate("generate_quiz", prompt::quiz(input)).await
    }

    async fn generate_study_plan(&self, input: &StudyPlanInput) -> GatewayResult<StudyPlanOutput> {
        self.generate("generate_study_plan", prompt::study_plan(input))
            .await
    }

    async fn get_tutoring(&self, input: &TutoringInput) -> GatewayResult<TutoringOutput> {
        self.generate("get_tutoring", prompt::tutoring(input)).await
    }
}

// ============================================================================
// Response Handling
// ============================================================================

fn transport_error(error: &reqwest::Error) -> GatewayError {
    let message = if error.is_timeout() {
        format!("request timed out: {error}")
    } else {
        error.to_string()
    };
    GatewayError::new(GatewayErrorKind::Network, message)
}

/// Maps a non-success status to a gateway error.
fn status_error(status: StatusCode, body: &str) -> GatewayError {
    let kind = match status.as_u16() {
        401 | 403 => GatewayErrorKind::Authentication,
        429 => GatewayErrorKind::RateLimit,
        500..=599 => GatewayErrorKind::Server,
        _ => GatewayErrorKind::Other,
    };
    let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
    GatewayError::new(kind, format!("HTTP {status}: {excerpt}"))
}

/// Extracts the text of the first candidate.
fn candidate_text(body: &str) -> GatewayResult<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::malformed(format!("invalid response envelope: {e}")))?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::malformed("response has no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        return Err(GatewayError::malformed(format!(
            "candidate has no text (finish reason: {reason})"
        )));
    }
    Ok(text)
}

/// Parses model text into `T`, tolerating a markdown code fence around it.
fn parse_output<T: DeserializeOwned>(text: &str) -> GatewayResult<T> {
    let trimmed = strip_code_fence(text.trim());
    serde_json::from_str(trimmed)
        .map_err(|e| GatewayError::malformed(format!("output does not match schema: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

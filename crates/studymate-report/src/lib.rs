//! StudyMate Report Generation
//!
//! This crate turns finished quiz attempts into review reports and renders
//! generated markdown into HTML that is safe to embed in a page.
//!
//! # Types
//!
//! - [`QuizReport`] - Review of one finished quiz attempt
//! - [`QuestionReview`] - Per-question outcome inside a report
//! - [`ReportTier`] - Feedback tier the score falls into
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON reports with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown reports
//! - [`render_markdown`] - Convert untrusted markdown into sanitized HTML
//!
//! # Example
//!
//! ```rust
//! use studymate_report::{MarkdownGenerator, QuestionReview, QuizReport, ReportTier};
//!
//! let report = QuizReport::builder("Photosynthesis")
//!     .question(QuestionReview {
//!         number: 1,
//!         question: "What gas do plants absorb?".to_string(),
//!         options: vec!["Oxygen".to_string(), "Carbon dioxide".to_string()],
//!         selected: Some("Carbon dioxide".to_string()),
//!         correct_answer: "Carbon dioxide".to_string(),
//!         explanation: "Plants fix CO2 during the Calvin cycle.".to_string(),
//!     })
//!     .build();
//!
//! assert_eq!(report.score, 1);
//! assert_eq!(report.tier, ReportTier::Excellent);
//!
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("# Quiz Review: Photosynthesis"));
//! ```

pub mod json;
mod markdown;
mod render;

pub use markdown::MarkdownGenerator;
pub use render::render_markdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the report to JSON.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write report files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// Scoring
// ============================================================================

/// Score as a percentage in `[0, 100]`. A quiz with no questions scores 0.
#[must_use]
pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(score) / f64::from(total) * 100.0
    }
}

/// Whether `score` out of `total` reaches the celebration threshold of 80%.
///
/// ```
/// assert!(studymate_report::celebrates(8, 10));
/// assert!(!studymate_report::celebrates(7, 10));
/// assert!(!studymate_report::celebrates(0, 0));
/// ```
#[must_use]
pub fn celebrates(score: u32, total: u32) -> bool {
    total > 0 && u64::from(score) * 10 >= u64::from(total) * 8
}

/// Feedback tier of a finished quiz.
///
/// The quiz engine and the reports both classify scores with this type.
/// Lower bounds are inclusive: 80% is `Excellent`, 60% is `Good`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportTier {
    /// At least 80% of answers correct.
    Excellent,
    /// At least 60% but below 80%.
    Good,
    /// Below 60%.
    #[default]
    NeedsReview,
}

impl ReportTier {
    /// Classifies `score` out of `total` into a tier.
    ///
    /// Uses integer arithmetic so the boundaries are exact. A quiz with no
    /// questions is classified as `NeedsReview`.
    ///
    /// # Examples
    ///
    /// ```
    /// use studymate_report::ReportTier;
    ///
    /// assert_eq!(ReportTier::from_score(8, 10), ReportTier::Excellent);
    /// assert_eq!(ReportTier::from_score(6, 10), ReportTier::Good);
    /// assert_eq!(ReportTier::from_score(5, 10), ReportTier::NeedsReview);
    /// ```
    #[must_use]
    pub fn from_score(score: u32, total: u32) -> Self {
        if total == 0 {
            return Self::NeedsReview;
        }
        let scaled = u64::from(score) * 100;
        let total = u64::from(total);
        if scaled >= 80 * total {
            Self::Excellent
        } else if scaled >= 60 * total {
            Self::Good
        } else {
            Self::NeedsReview
        }
    }

    /// Returns the feedback line shown to the student.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent work!",
            Self::Good => "Good effort! A little more practice will help.",
            Self::NeedsReview => "Keep trying! Review the material and try again.",
        }
    }
}

impl std::fmt::Display for ReportTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::NeedsReview => write!(f, "needs-review"),
        }
    }
}

// ============================================================================
// QuizReport
// ============================================================================

/// Review of one finished quiz attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizReport {
    /// Topic the quiz was generated for.
    pub topic: String,

    /// Number of correctly answered questions.
    pub score: u32,

    /// Number of questions in the quiz.
    pub total: u32,

    /// Score as a percentage in `[0, 100]`.
    pub percentage: f64,

    /// Feedback tier of the score.
    pub tier: ReportTier,

    /// Whether the score reached the celebration threshold (80%).
    pub celebrate: bool,

    /// Per-question review, in quiz order.
    pub questions: Vec<QuestionReview>,

    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

impl QuizReport {
    /// Creates a new report builder for the given topic.
    #[must_use]
    pub fn builder(topic: impl Into<String>) -> QuizReportBuilder {
        QuizReportBuilder::new(topic)
    }

    /// Returns the reviews of incorrectly answered questions.
    #[must_use]
    pub fn missed(&self) -> Vec<&QuestionReview> {
        self.questions.iter().filter(|q| !q.is_correct()).collect()
    }
}

/// Outcome of a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionReview {
    /// 1-indexed position in the quiz.
    pub number: usize,

    /// Question text.
    pub question: String,

    /// Answer options in display order.
    pub options: Vec<String>,

    /// Option the student picked, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<String>,

    /// The correct option.
    pub correct_answer: String,

    /// Why the correct option is correct.
    pub explanation: String,
}

impl QuestionReview {
    /// Returns `true` if the selected option matches the correct answer.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.selected.as_deref() == Some(self.correct_answer.as_str())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for constructing [`QuizReport`] instances.
///
/// Score, percentage, tier and celebration flag are derived from the added
/// questions when [`build`](Self::build) is called.
#[derive(Debug, Clone)]
pub struct QuizReportBuilder {
    topic: String,
    questions: Vec<QuestionReview>,
    generated_at: Option<DateTime<Utc>>,
}

impl QuizReportBuilder {
    fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            questions: Vec::new(),
            generated_at: None,
        }
    }

    /// Appends a question review.
    #[must_use]
    pub fn question(mut self, review: QuestionReview) -> Self {
        self.questions.push(review);
        self
    }

    /// Appends several question reviews.
    #[must_use]
    pub fn questions(mut self, reviews: impl IntoIterator<Item = QuestionReview>) -> Self {
        self.questions.extend(reviews);
        self
    }

    /// Overrides the generation timestamp (defaults to now).
    #[must_use]
    pub const fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Builds the report, deriving the score fields.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(self) -> QuizReport {
        let total = self.questions.len() as u32;
        let score = self.questions.iter().filter(|q| q.is_correct()).count() as u32;

        QuizReport {
            topic: self.topic,
            score,
            total,
            percentage: percentage(score, total),
            tier: ReportTier::from_score(score, total),
            celebrate: celebrates(score, total),
            questions: self.questions,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Markdown report generation for finished quizzes.
//!
//! This module provides the [`MarkdownGenerator`] struct for converting a [`QuizReport`]
//! into a human-readable Markdown document. The generated report includes:
//!
//! - A summary table with score, percentage and tier
//! - The feedback line for the tier
//! - A per-question review with the chosen answer and the explanation
//!
//! # Example
//!
//! ```rust
//! use studymate_report::{MarkdownGenerator, QuizReport};
//!
//! let report = QuizReport::builder("Ancient Rome").build();
//! let markdown = MarkdownGenerator::new(&report).generate();
//! assert!(markdown.contains("## Summary"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{QuestionReview, QuizReport};

/// Generates Markdown reports from finished quizzes.
pub struct MarkdownGenerator<'a> {
    report: &'a QuizReport,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given report.
    #[must_use]
    pub const fn new(report: &'a QuizReport) -> Self {
        Self { report }
    }

    /// Generates the complete Markdown report.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_summary(&mut output);
        self.write_questions(&mut output);
        self.write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# Quiz Review: {}\n",
            escape_markdown(&self.report.topic)
        );
    }

    fn write_summary(&self, output: &mut String) {
        let report = self.report;

        let _ = writeln!(output, "## Summary\n");
        let _ = writeln!(output, "| Metric | Value |");
        let _ = writeln!(output, "|--------|-------|");
        let _ = writeln!(output, "| Score | {} / {} |", report.score, report.total);
        let _ = writeln!(output, "| Percentage | {:.0}% |", report.percentage);
        let _ = writeln!(output, "| Tier | {} |", report.tier);
        let _ = writeln!(output);

        let celebration = if report.celebrate { " &#127881;" } else { "" };
        let _ = writeln!(output, "**{}**{celebration}\n", report.tier.message());
    }

    fn write_questions(&self, output: &mut String) {
        let _ = writeln!(output, "## Questions\n");

        if self.report.questions.is_empty() {
            let _ = writeln!(output, "_No questions were answered._\n");
            return;
        }

        for review in &self.report.questions {
            Self::write_question(output, review);
        }
    }

    fn write_question(output: &mut String, review: &QuestionReview) {
        let mark = if review.is_correct() {
            "&#9989;"
        } else {
            "&#10060;"
        };

        let _ = writeln!(
            output,
            "### {}. {} {mark}\n",
            review.number,
            escape_markdown(&review.question)
        );

        for option in &review.options {
            let _ = writeln!(output, "- {}", escape_markdown(option));
        }
        let _ = writeln!(output);

        let selected = review
            .selected
            .as_deref()
            .map_or_else(|| "_not answered_".to_string(), escape_markdown);
        let _ = writeln!(output, "**Your answer:** {selected}  ");
        let _ = writeln!(
            output,
            "**Correct answer:** {}\n",
            escape_markdown(&review.correct_answer)
        );

        for line in review.explanation.lines() {
            let _ = writeln!(output, "> {}", escape_markdown(line));
        }
        let _ = writeln!(output);
    }

    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---\n");
        let _ = writeln!(
            output,
            "*Generated by StudyMate on {}*",
            format_timestamp(&self.report.generated_at)
        );
    }
}

/// Formats a timestamp as "YYYY-MM-DD HH:MM:SS UTC".
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes special Markdown characters in text.
///
/// Generated content is untrusted, so it must not be able to inject
/// formatting or raw HTML into the report.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '(' | ')' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' => result.push(' '),
            _ => result.push(ch),
        }
    }

    result
}

//! JSON report generation for StudyMate.
//!
//! This module provides [`JsonGenerator`] for serializing quiz reports to JSON format.
//! Reports can be generated as compact single-line JSON or pretty-printed for human readability.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{QuizReport, ReportError, Result};

/// JSON report generator.
///
/// Wraps a [`QuizReport`] reference and provides methods for serializing it to JSON
/// in various formats.
///
/// # Example
///
/// ```rust
/// use studymate_report::{QuizReport, json::JsonGenerator};
///
/// let report = QuizReport::builder("Cells").build();
/// let generator = JsonGenerator::new(&report);
///
/// let json = generator.generate_pretty().unwrap();
/// assert!(json.contains("\"topic\": \"Cells\""));
/// ```
pub struct JsonGenerator<'a> {
    report: &'a QuizReport,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given report.
    #[must_use]
    pub const fn new(report: &'a QuizReport) -> Self {
        Self { report }
    }

    /// Generates compact JSON output (single line, no extra whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.report).map_err(ReportError::from)
    }

    /// Generates pretty-printed JSON output with indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(ReportError::from)
    }

    /// Writes the JSON report directly to a file.
    ///
    /// Creates or overwrites the file at `path`. Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    /// Returns [`ReportError::Io`] if file creation or writing fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

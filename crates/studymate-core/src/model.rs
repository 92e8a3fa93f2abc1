//! Shared domain types: academic levels and quiz questions.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

// ============================================================================
// StudentLevel
// ============================================================================

/// Academic level of the student, used to pitch generated content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StudentLevel {
    /// Secondary school.
    HighSchool,
    /// Undergraduate (default).
    #[default]
    College,
    /// Graduate and beyond.
    PostGraduate,
}

impl StudentLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 3] = [Self::HighSchool, Self::College, Self::PostGraduate];

    /// Returns the wire form (`high-school`, `college`, `post-graduate`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HighSchool => "high-school",
            Self::College => "college",
            Self::PostGraduate => "post-graduate",
        }
    }

    /// Returns the display label (`High School`, `College`, `Post-Graduate`).
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::HighSchool => "High School",
            Self::College => "College",
            Self::PostGraduate => "Post-Graduate",
        }
    }
}

impl std::fmt::Display for StudentLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StudentLevel {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| {
                StudyError::validation(
                    "studentLevel",
                    format!(
                        "Invalid academic level '{s}': expected one of 'high-school', 'college', 'post-graduate'."
                    ),
                )
            })
    }
}

// ============================================================================
// QuizQuestion
// ============================================================================

/// One multiple-choice question as produced by the quiz generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    /// The question text.
    pub question: String,

    /// Answer options in display order.
    pub options: Vec<String>,

    /// The correct option; must be one of `options`.
    pub correct_answer: String,

    /// Why the correct option is correct.
    pub explanation: String,
}

impl QuizQuestion {
    /// Returns `true` if `option` is one of this question's options.
    #[must_use]
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// Returns `true` if `answer` is the correct answer.
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }

    /// Checks the structural invariants of a generated question.
    ///
    /// A question needs at least two options and its correct answer must be
    /// one of them. Returns a description of the first violation.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.options.len() < 2 {
            return Err(format!(
                "question '{}' has {} option(s), expected at least 2",
                self.question,
                self.options.len()
            ));
        }
        if !self.has_option(&self.correct_answer) {
            return Err(format!(
                "correct answer '{}' is not among the options of '{}'",
                self.correct_answer, self.question
            ));
        }
        Ok(())
    }
}

/// Counts characters the way a form length check does.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Rejects `value` when it is shorter than `min` characters.
pub(crate) fn require_min_chars(
    field: &'static str,
    value: &str,
    min: usize,
    message: &str,
) -> Result<()> {
    if char_len(value) < min {
        return Err(StudyError::validation(field, message));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn question() -> QuizQuestion {
        QuizQuestion {
            question: "What do plants release?".to_string(),
            options: vec!["Oxygen".to_string(), "Methane".to_string()],
            correct_answer: "Oxygen".to_string(),
            explanation: "Photolysis of water releases oxygen.".to_string(),
        }
    }

    #[test]
    fn test_student_level_serialization() {
        assert_eq!(
            serde_json::to_string(&StudentLevel::HighSchool).unwrap(),
            r#""high-school""#
        );
        assert_eq!(
            serde_json::to_string(&StudentLevel::PostGraduate).unwrap(),
            r#""post-graduate""#
        );
        let level: StudentLevel = serde_json::from_str(r#""college""#).unwrap();
        assert_eq!(level, StudentLevel::College);
    }

    #[test]
    fn test_student_level_rejects_unknown() {
        assert!(serde_json::from_str::<StudentLevel>(r#""kindergarten""#).is_err());
        assert!("kindergarten".parse::<StudentLevel>().is_err());
    }

    #[test]
    fn test_student_level_from_str_is_lenient() {
        assert_eq!(
            "High School".parse::<StudentLevel>().unwrap(),
            StudentLevel::HighSchool
        );
        assert_eq!(
            "post_graduate".parse::<StudentLevel>().unwrap(),
            StudentLevel::PostGraduate
        );
        assert_eq!(" COLLEGE ".parse::<StudentLevel>().unwrap(), StudentLevel::College);
    }

    #[test]
    fn test_student_level_default_is_college() {
        assert_eq!(StudentLevel::default(), StudentLevel::College);
        assert_eq!(StudentLevel::College.label(), "College");
    }

    #[test]
    fn test_quiz_question_wire_format() {
        let json = r#"{
            "question": "2 + 2?",
            "options": ["3", "4"],
            "correctAnswer": "4",
            "explanation": "Basic addition."
        }"#;
        let q: QuizQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(q.correct_answer, "4");
        assert!(q.check().is_ok());
    }

    #[test]
    fn test_check_accepts_valid_question() {
        assert!(question().check().is_ok());
        assert!(question().is_correct("Oxygen"));
        assert!(!question().is_correct("Methane"));
    }

    #[test]
    fn test_check_rejects_answer_outside_options() {
        let mut q = question();
        q.correct_answer = "Nitrogen".to_string();
        let err = q.check().unwrap_err();
        assert!(err.contains("Nitrogen"));
    }

    #[test]
    fn test_check_rejects_single_option() {
        let mut q = question();
        q.options = vec!["Oxygen".to_string()];
        assert!(q.check().is_err());
    }

    #[test]
    fn test_char_len_counts_characters() {
        assert_eq!(char_len("été"), 3);
        assert!(require_min_chars("topic", "ab", 3, "too short").is_err());
        assert!(require_min_chars("topic", "abc", 3, "too short").is_ok());
    }
}

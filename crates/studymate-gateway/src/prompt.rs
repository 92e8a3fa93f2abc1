//! Prompt templates for the three generation entry points.
//!
//! Each prompt states the task and ends with the exact JSON shape the
//! response must have, since the reply is parsed straight into the typed
//! gateway output.

use studymate_core::{QuizInput, StudyPlanInput, TutoringInput};

const QUIZ_SHAPE: &str = r#"{"quizQuestions": [{"question": string, "options": [string, ...], "correctAnswer": string, "explanation": string}]}"#;

const STUDY_PLAN_SHAPE: &str = r#"{"studyPlan": string}"#;

const TUTORING_SHAPE: &str = r#"{"explanation": string}"#;

fn shape_instruction(shape: &str) -> String {
    format!("Respond only with a JSON object of exactly this shape:\n{shape}")
}

/// Builds the quiz generation prompt.
pub fn quiz(input: &QuizInput) -> String {
    format!(
        "You write multiple-choice quizzes pitched at what a student already knows.\n\
         \n\
         Write a quiz of exactly {length} questions.\n\
         \n\
         Topic: {topic}\n\
         Student understanding: {understanding}\n\
         \n\
         Rules:\n\
         - Every question has at least two distinct options.\n\
         - correctAnswer is copied verbatim from one of the options.\n\
         - explanation says why the correct answer is right.\n\
         - Stay on the topic and aim slightly above the student's current level.\n\
         \n\
         {shape}",
        length = input.quiz_length,
        topic = input.topic,
        understanding = input.student_understanding,
        shape = shape_instruction(QUIZ_SHAPE),
    )
}

/// Builds the study plan prompt.
pub fn study_plan(input: &StudyPlanInput) -> String {
    format!(
        "You plan exam preparation for {level} students.\n\
         \n\
         Exam date: {date}\n\
         Subjects: {subjects}\n\
         Available study time: {hours} hours per day\n\
         \n\
         Cover every listed subject, order topics by difficulty and weight in the exam, \
         and lay out a day-by-day schedule up to the exam date. \
         Write the plan as markdown inside the studyPlan field.\n\
         \n\
         {shape}",
        level = input.student_level.label(),
        date = input.exam_date,
        subjects = input.subjects.join(", "),
        hours = input.available_study_time,
        shape = shape_instruction(STUDY_PLAN_SHAPE),
    )
}

/// Builds the tutoring prompt.
pub fn tutoring(input: &TutoringInput) -> String {
    format!(
        "You are a patient tutor. Answer the student's question with a clear explanation \
         that shows the reasoning step by step, pitched at their academic level. \
         Markdown is allowed inside the explanation field.\n\
         \n\
         Topic: {topic}\n\
         Question: {question}\n\
         Student level: {level}\n\
         \n\
         {shape}",
        topic = input.topic,
        question = input.question,
        level = input.student_level.label(),
        shape = shape_instruction(TUTORING_SHAPE),
    )
}

use serde::{Deserialize, Serialize};

use crate::models::domain::question::{Question, StudentQuestion};

/// An exam with answer keys. Only the grading side holds this.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamDefinition {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub duration: u32, // minutes
    #[serde(default)]
    pub shuffle_questions: bool,
    pub questions: Vec<Question>,
}

/// Student-safe projection of an exam, read-only for the session's lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentExam {
    pub id: String,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub duration: u32,
    #[serde(default)]
    pub shuffle_questions: bool,
    pub questions: Vec<StudentQuestion>,
}

impl ExamDefinition {
    pub fn student_view(&self) -> StudentExam {
        StudentExam {
            id: self.id.clone(),
            code: self.code.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            duration: self.duration,
            shuffle_questions: self.shuffle_questions,
            questions: self.questions.iter().map(Question::student_view).collect(),
        }
    }

    pub fn find_question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

impl StudentExam {
    pub fn find_question(&self, id: &str) -> Option<&StudentQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn duration_ms(&self) -> i64 {
        i64::from(self.duration) * 60 * 1000
    }

    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

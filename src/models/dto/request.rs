use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::{Answer, QuestionType, StudentQuestion};

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdentity {
    #[validate(length(min = 2, max = 100, message = "Name is required"))]
    pub student_name: String,
}

impl StudentIdentity {
    pub fn new(student_name: &str) -> Self {
        StudentIdentity {
            student_name: student_name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    #[validate(length(min = 2, max = 100, message = "Name is required"))]
    pub student_name: String,
    pub answers: Vec<AnswerEntry>,
    #[serde(default)]
    pub strikes: u32,
    #[serde(default)]
    pub elapsed_ms: i64,
}

/// One answer on the wire. Exactly one payload field is set, chosen by the
/// question type; an entry with none set grades as incorrect.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerEntry {
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_choice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_choice_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boolean_answer: Option<bool>,
    /// JSON-encoded list of gap entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_answer: Option<serde_json::Value>,
}

impl AnswerEntry {
    pub fn from_answer(question: &StudentQuestion, answer: &Answer) -> Self {
        let mut entry = AnswerEntry {
            question_id: question.id.clone(),
            ..AnswerEntry::default()
        };

        match (question.question_type(), answer) {
            (QuestionType::MultipleChoice, Answer::Single(id)) => {
                entry.selected_choice_id = Some(id.clone());
            }
            (QuestionType::MultiSelect, Answer::List(ids)) => {
                entry.selected_choice_ids = Some(ids.clone());
            }
            (QuestionType::TrueFalse, Answer::Boolean(value)) => {
                entry.boolean_answer = Some(*value);
            }
            (QuestionType::FillBlank | QuestionType::FillBlankClue, Answer::List(blanks)) => {
                entry.text_answer = serde_json::to_string(blanks).ok();
            }
            (QuestionType::Matching, Answer::Mapping(matches)) => {
                entry.matching_answer = serde_json::to_value(matches).ok();
            }
            (question_type, _) => {
                log::debug!(
                    "Answer shape does not fit {:?} question {}, sending it empty",
                    question_type,
                    question.id
                );
            }
        }

        entry
    }
}

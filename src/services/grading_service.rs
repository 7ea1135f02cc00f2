use std::collections::{HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use crate::models::domain::{AttemptRecord, ExamDefinition, GradedAnswer, Question, QuestionBody};
use crate::models::dto::{AnswerEntry, SubmitAttemptRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeResult {
    pub is_correct: bool,
    pub points_awarded: u32,
}

pub struct GradingService;

impl GradingService {
    /// Grade a submitted attempt against the full exam definition.
    ///
    /// Entries for unknown questions are skipped and each question is graded
    /// at most once; questions without an entry score nothing.
    pub fn grade_attempt(exam: &ExamDefinition, request: &SubmitAttemptRequest) -> AttemptRecord {
        let question_map: HashMap<&str, &Question> =
            exam.questions.iter().map(|q| (q.id.as_str(), q)).collect();

        let mut graded: HashSet<&str> = HashSet::new();
        let mut score: u32 = 0;
        let mut answers = Vec::new();

        for entry in &request.answers {
            let Some(question) = question_map.get(entry.question_id.as_str()) else {
                log::debug!(
                    "Skipping answer for unknown question {} in exam {}",
                    entry.question_id,
                    exam.code
                );
                continue;
            };
            if !graded.insert(question.id.as_str()) {
                continue;
            }

            let result = Self::grade_question(question, entry);
            score += result.points_awarded;

            answers.push(GradedAnswer {
                question_id: question.id.clone(),
                is_correct: result.is_correct,
                points_awarded: result.points_awarded,
            });
        }

        AttemptRecord {
            id: Uuid::new_v4().to_string(),
            exam_id: exam.id.clone(),
            student_name: request.student_name.clone(),
            score,
            total_possible: exam.total_points(),
            strikes: request.strikes,
            elapsed_ms: request.elapsed_ms,
            answers,
            finished_at: Utc::now(),
        }
    }

    /// Grade one answer. Never fails: malformed input is simply incorrect.
    pub fn grade_question(question: &Question, entry: &AnswerEntry) -> GradeResult {
        let is_correct = match &question.body {
            QuestionBody::MultipleChoice { choices } => entry
                .selected_choice_id
                .as_deref()
                .and_then(|selected| choices.iter().find(|c| c.id == selected))
                .is_some_and(|choice| choice.is_correct),
            QuestionBody::MultiSelect { choices } => match &entry.selected_choice_ids {
                // Exact set equality, no partial credit
                Some(selected) => {
                    let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
                    let correct: HashSet<&str> = choices
                        .iter()
                        .filter(|c| c.is_correct)
                        .map(|c| c.id.as_str())
                        .collect();
                    selected == correct
                }
                None => false,
            },
            QuestionBody::TrueFalse { correct } => entry.boolean_answer == Some(*correct),
            QuestionBody::FillBlank { answers } | QuestionBody::FillBlankClue { answers, .. } => {
                Self::blanks_match(entry.text_answer.as_deref(), answers)
            }
            QuestionBody::Matching { pairs } => match &entry.matching_answer {
                Some(serde_json::Value::Object(matches)) => pairs.iter().all(|pair| {
                    matches.get(&pair.id).and_then(|v| v.as_str()) == Some(pair.id.as_str())
                }),
                _ => false,
            },
        };

        GradeResult {
            is_correct,
            points_awarded: if is_correct { question.points } else { 0 },
        }
    }

    fn blanks_match(text_answer: Option<&str>, expected: &[String]) -> bool {
        let submitted: Vec<String> = match serde_json::from_str(text_answer.unwrap_or("[]")) {
            Ok(blanks) => blanks,
            Err(err) => {
                log::debug!("Unparsable fill-blank answer graded as incorrect: {}", err);
                return false;
            }
        };

        submitted.len() == expected.len()
            && submitted
                .iter()
                .zip(expected)
                .all(|(given, wanted)| given.trim().to_lowercase() == wanted.trim().to_lowercase())
    }
}

use serde::{Deserialize, Serialize};

/// Marker for a gap in fill-in-the-blank question text.
pub const GAP_MARKER: &str = "[]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice, // One correct choice
    MultiSelect,    // Several correct choices, graded as a set
    TrueFalse,
    FillBlank,
    FillBlankClue, // Fill blank with a word bank
    Matching,
}

/// A question as stored on the grading side, answer keys included.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub points: u32,
    #[serde(flatten)]
    pub body: QuestionBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum QuestionBody {
    MultipleChoice { choices: Vec<Choice> },
    MultiSelect { choices: Vec<Choice> },
    TrueFalse { correct: bool },
    FillBlank { answers: Vec<String> },
    FillBlankClue { answers: Vec<String>, clue: String },
    Matching { pairs: Vec<Pair> },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// The right-hand option of a pair carries the pair's own id, so a correct
/// match maps a left id onto itself.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub id: String,
    pub left_text: String,
    pub right_text: String,
}

/// What the student receives. Nothing in here reveals a correct answer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StudentQuestion {
    pub id: String,
    pub text: String,
    pub points: u32,
    #[serde(flatten)]
    pub body: StudentQuestionBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum StudentQuestionBody {
    MultipleChoice { choices: Vec<StudentChoice> },
    MultiSelect { choices: Vec<StudentChoice> },
    TrueFalse,
    FillBlank { gaps: usize },
    FillBlankClue { gaps: usize, clue: String },
    Matching { pairs: Vec<Pair> },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StudentChoice {
    pub id: String,
    pub text: String,
}

impl From<&Choice> for StudentChoice {
    fn from(choice: &Choice) -> Self {
        StudentChoice {
            id: choice.id.clone(),
            text: choice.text.clone(),
        }
    }
}

/// Number of gap markers in `text`, left to right.
pub fn gap_count(text: &str) -> usize {
    text.matches(GAP_MARKER).count()
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        match self.body {
            QuestionBody::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionBody::MultiSelect { .. } => QuestionType::MultiSelect,
            QuestionBody::TrueFalse { .. } => QuestionType::TrueFalse,
            QuestionBody::FillBlank { .. } => QuestionType::FillBlank,
            QuestionBody::FillBlankClue { .. } => QuestionType::FillBlankClue,
            QuestionBody::Matching { .. } => QuestionType::Matching,
        }
    }

    pub fn student_view(&self) -> StudentQuestion {
        let body = match &self.body {
            QuestionBody::MultipleChoice { choices } => StudentQuestionBody::MultipleChoice {
                choices: choices.iter().map(StudentChoice::from).collect(),
            },
            QuestionBody::MultiSelect { choices } => StudentQuestionBody::MultiSelect {
                choices: choices.iter().map(StudentChoice::from).collect(),
            },
            QuestionBody::TrueFalse { .. } => StudentQuestionBody::TrueFalse,
            QuestionBody::FillBlank { .. } => StudentQuestionBody::FillBlank {
                gaps: gap_count(&self.text),
            },
            QuestionBody::FillBlankClue { clue, .. } => StudentQuestionBody::FillBlankClue {
                gaps: gap_count(&self.text),
                clue: clue.clone(),
            },
            QuestionBody::Matching { pairs } => StudentQuestionBody::Matching {
                pairs: pairs.clone(),
            },
        };

        StudentQuestion {
            id: self.id.clone(),
            text: self.text.clone(),
            points: self.points,
            body,
        }
    }
}

impl StudentQuestion {
    pub fn question_type(&self) -> QuestionType {
        match self.body {
            StudentQuestionBody::MultipleChoice { .. } => QuestionType::MultipleChoice,
            StudentQuestionBody::MultiSelect { .. } => QuestionType::MultiSelect,
            StudentQuestionBody::TrueFalse => QuestionType::TrueFalse,
            StudentQuestionBody::FillBlank { .. } => QuestionType::FillBlank,
            StudentQuestionBody::FillBlankClue { .. } => QuestionType::FillBlankClue,
            StudentQuestionBody::Matching { .. } => QuestionType::Matching,
        }
    }

    /// Word-bank entries of a clue question; empty for every other type.
    pub fn clue_words(&self) -> Vec<String> {
        match &self.body {
            StudentQuestionBody::FillBlankClue { clue, .. } => clue
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

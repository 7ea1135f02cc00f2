pub mod answer;
pub mod attempt;
pub mod exam;
pub mod question;
pub mod snapshot;
pub mod stage;
pub use answer::Answer;
pub use attempt::{AttemptRecord, GradedAnswer};
pub use exam::{ExamDefinition, StudentExam};
pub use question::{Question, QuestionBody, QuestionType, StudentQuestion, StudentQuestionBody};
pub use snapshot::Snapshot;
pub use stage::{BootReason, ExamStage};

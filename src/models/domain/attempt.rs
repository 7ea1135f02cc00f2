use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A graded attempt as recorded by the scoring endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: String,
    pub exam_id: String,
    pub student_name: String,
    pub score: u32,
    pub total_possible: u32,
    pub strikes: u32,
    pub elapsed_ms: i64,
    pub answers: Vec<GradedAnswer>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_id: String,
    pub is_correct: bool,
    pub points_awarded: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_attempt(score: u32, total_possible: u32) -> AttemptRecord {
        AttemptRecord {
            id: "attempt-1".to_string(),
            exam_id: "exam-1".to_string(),
            student_name: "Ada".to_string(),
            score,
            total_possible,
            strikes: 1,
            elapsed_ms: 60_000,
            answers: vec![GradedAnswer {
                question_id: "q-1".to_string(),
                is_correct: score > 0,
                points_awarded: score,
            }],
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn attempt_serialization_preserves_grading_fields() {
        let attempt = make_attempt(4, 5);

        let json = serde_json::to_string(&attempt).expect("attempt should serialize");
        let parsed: AttemptRecord = serde_json::from_str(&json).expect("attempt should deserialize");

        assert_eq!(parsed.score, 4);
        assert_eq!(parsed.total_possible, 5);
        assert_eq!(parsed.strikes, 1);
        assert!(parsed.answers[0].is_correct);
    }

    #[test]
    fn attempt_can_represent_zero_score() {
        let attempt = make_attempt(0, 5);

        assert!(!attempt.answers[0].is_correct);
        assert_eq!(attempt.answers[0].points_awarded, 0);
    }
}

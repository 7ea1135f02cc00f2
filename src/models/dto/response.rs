use serde::{Deserialize, Serialize};

use crate::models::domain::{BootReason, ExamStage};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubmitAttemptResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    pub score: u32,
}

fn default_success() -> bool {
    true
}

/// Final summary screen for a terminated session. Never carries question content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub stage: ExamStage,
    pub exam_title: String,
    pub student_name: String,
    pub score: Option<u32>,
    pub total_points: u32,
    pub strikes: u32,
    pub boot_reason: Option<BootReason>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_defaults_success() {
        let parsed: SubmitAttemptResponse =
            serde_json::from_str(r#"{"score": 7}"#).expect("response should parse");
        assert!(parsed.success);
        assert_eq!(parsed.score, 7);
    }

    #[test]
    fn summary_serializes_camel_case() {
        let summary = SessionSummary {
            stage: ExamStage::Booted,
            exam_title: "Geography".to_string(),
            student_name: "Ada".to_string(),
            score: None,
            total_points: 10,
            strikes: 3,
            boot_reason: Some(BootReason::StrikeLimit),
        };

        let json = serde_json::to_value(&summary).expect("summary should serialize");
        assert_eq!(json["stage"], "booted");
        assert_eq!(json["bootReason"], "strike_limit");
        assert!(json["score"].is_null());
    }
}

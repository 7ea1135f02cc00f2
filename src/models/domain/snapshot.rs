use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::domain::answer::Answer;

/// In-progress attempt state kept in the local store, keyed by exam code.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    /// Epoch milliseconds at which the exam time runs out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_end_time: Option<i64>,
    #[serde(default)]
    pub answers: BTreeMap<String, Answer>,
    #[serde(default)]
    pub strikes: u32,
}

impl Snapshot {
    pub fn welcome(student_name: &str) -> Self {
        Snapshot {
            student_name: Some(student_name.to_string()),
            ..Snapshot::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let mut answers = BTreeMap::new();
        answers.insert("q1".to_string(), Answer::Single("c1".to_string()));
        let snapshot = Snapshot {
            student_name: Some("Ada".to_string()),
            target_end_time: Some(1_700_000_000_000),
            answers,
            strikes: 1,
        };

        let json = serde_json::to_value(&snapshot).expect("snapshot should serialize");
        assert_eq!(json["studentName"], "Ada");
        assert_eq!(json["targetEndTime"], 1_700_000_000_000_i64);
        assert_eq!(json["answers"]["q1"], "c1");
    }

    #[test]
    fn partial_snapshot_fills_defaults() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"studentName":"Ada"}"#).expect("snapshot should parse");

        assert_eq!(snapshot, Snapshot::welcome("Ada"));
        assert_eq!(snapshot.strikes, 0);
        assert!(snapshot.target_end_time.is_none());
    }
}

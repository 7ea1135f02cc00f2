use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The student's current answer to one question.
///
/// The shape depends on the question type: a choice id for multiple choice,
/// a list of choice ids (multi select) or of gap entries (fill blank), a
/// boolean for true/false, and a left id → right id mapping for matching.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Boolean(bool),
    Single(String),
    List(Vec<String>),
    Mapping(BTreeMap<String, String>),
}

impl Answer {
    /// Whether the answer counts towards progress. A boolean counts as soon as
    /// it is set; text needs non-whitespace content.
    pub fn is_answered(&self) -> bool {
        match self {
            Answer::Boolean(_) => true,
            Answer::Single(value) => !value.trim().is_empty(),
            Answer::List(values) => values.iter().any(|v| !v.trim().is_empty()),
            Answer::Mapping(matches) => !matches.is_empty(),
        }
    }
}

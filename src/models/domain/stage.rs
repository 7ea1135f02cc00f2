use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStage {
    #[default]
    Welcome,
    Active,
    Submitted,
    Booted,
}

impl ExamStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExamStage::Submitted | ExamStage::Booted)
    }
}

impl fmt::Display for ExamStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExamStage::Welcome => "welcome",
            ExamStage::Active => "active",
            ExamStage::Submitted => "submitted",
            ExamStage::Booted => "booted",
        };
        f.write_str(name)
    }
}

/// Why a session was forcibly terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootReason {
    StrikeLimit,
    WarningIgnored,
    AwayTooLong,
    ExpiredWhileAway,
}

impl fmt::Display for BootReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            BootReason::StrikeLimit => "Maximum number of violations reached.",
            BootReason::WarningIgnored => "Violation warning was not acknowledged in time.",
            BootReason::AwayTooLong => "Left the exam for too long.",
            BootReason::ExpiredWhileAway => "Exam time ran out while the session was closed.",
        };
        f.write_str(message)
    }
}

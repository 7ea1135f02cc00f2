use serde::Serialize;

use crate::models::domain::BootReason;
use crate::services::environment::EnvironmentSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProctorPolicy {
    pub max_strikes: u32,
    /// Time to acknowledge a warning before the session is booted.
    pub violation_grace_ms: i64,
    /// Time the student may stay away before the session is booted.
    pub away_limit_ms: i64,
}

impl Default for ProctorPolicy {
    fn default() -> Self {
        ProctorPolicy {
            max_strikes: 3,
            violation_grace_ms: 10_000,
            away_limit_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProctorState {
    Clean,
    Violating,
    Booted,
}

/// The warning currently shown to the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub reason: String,
    pub seconds_remaining: u32,
    pub away_timer_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorOutcome {
    Quiet,
    Warning,
    Boot(BootReason),
}

/// Strike accounting with two independent countdowns: one to acknowledge a
/// warning, one to come back after leaving the page. Time is passed in as
/// epoch milliseconds so the detector itself owns no timers.
#[derive(Debug)]
pub struct ViolationDetector {
    policy: ProctorPolicy,
    armed: bool,
    finalizing: bool,
    booted: bool,
    strikes: u32,
    reason: Option<String>,
    warning_deadline: Option<i64>,
    away_since: Option<i64>,
}

impl ViolationDetector {
    pub fn new(policy: ProctorPolicy) -> Self {
        ViolationDetector {
            policy,
            armed: false,
            finalizing: false,
            booted: false,
            strikes: 0,
            reason: None,
            warning_deadline: None,
            away_since: None,
        }
    }

    pub fn policy(&self) -> ProctorPolicy {
        self.policy
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Start monitoring, carrying over strikes from a restored session.
    pub fn arm(&mut self, strikes: u32) {
        self.strikes = strikes;
        self.armed = true;
        self.booted = false;
        self.finalizing = false;
        self.clear_timers();
    }

    /// Stop monitoring and drop every pending countdown. Strikes are kept.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.finalizing = false;
        self.clear_timers();
    }

    /// While an automatic submission is finalizing, signals are ignored.
    pub fn set_finalizing(&mut self, finalizing: bool) {
        self.finalizing = finalizing;
    }

    pub fn state(&self) -> ProctorState {
        if self.booted {
            ProctorState::Booted
        } else if self.warning_deadline.is_some() {
            ProctorState::Violating
        } else {
            ProctorState::Clean
        }
    }

    pub fn violation(&self, now: i64) -> Option<Violation> {
        let deadline = self.warning_deadline?;
        let remaining_ms = (deadline - now).max(0);
        Some(Violation {
            reason: self.reason.clone().unwrap_or_default(),
            seconds_remaining: ((remaining_ms + 999) / 1000) as u32,
            away_timer_running: self.away_since.is_some(),
        })
    }

    pub fn handle(
        &mut self,
        signal: EnvironmentSignal,
        now: i64,
        fullscreen_active: bool,
    ) -> DetectorOutcome {
        log::debug!("Handling environment signal {:?} at {}", signal, now);
        match signal {
            EnvironmentSignal::TabHidden
            | EnvironmentSignal::WindowBlur
            | EnvironmentSignal::PageHidden => self.away_started(signal.reason(), now),
            EnvironmentSignal::TabVisible | EnvironmentSignal::WindowFocus => self.returned(now),
            EnvironmentSignal::FullscreenChanged if !fullscreen_active => {
                self.record_strike(signal.reason(), now)
            }
            EnvironmentSignal::FullscreenChanged => DetectorOutcome::Quiet,
        }
    }

    pub fn record_strike(&mut self, reason: &str, now: i64) -> DetectorOutcome {
        if !self.is_listening() {
            return DetectorOutcome::Quiet;
        }

        self.strikes += 1;
        self.reason = Some(reason.to_string());
        log::warn!(
            "Violation recorded ({}/{}): {}",
            self.strikes,
            self.policy.max_strikes,
            reason
        );

        // No grace period for the final strike
        if self.strikes >= self.policy.max_strikes {
            return self.boot(BootReason::StrikeLimit);
        }

        if self.warning_deadline.is_none() {
            self.warning_deadline = Some(now + self.policy.violation_grace_ms);
        }
        DetectorOutcome::Warning
    }

    pub fn away_started(&mut self, reason: &str, now: i64) -> DetectorOutcome {
        if !self.is_listening() {
            return DetectorOutcome::Quiet;
        }

        let outcome = self.record_strike(reason, now);
        if !self.booted && self.away_since.is_none() {
            self.away_since = Some(now);
        }
        outcome
    }

    pub fn returned(&mut self, now: i64) -> DetectorOutcome {
        if !self.armed || self.booted {
            return DetectorOutcome::Quiet;
        }

        match self.away_since.take() {
            Some(since) if now - since > self.policy.away_limit_ms => {
                self.boot(BootReason::AwayTooLong)
            }
            _ => DetectorOutcome::Quiet,
        }
    }

    /// Clears the warning countdown. The strike itself stays, and a running
    /// away timer keeps running.
    pub fn acknowledge(&mut self) -> bool {
        if !self.armed || self.booted || self.warning_deadline.is_none() {
            return false;
        }
        self.warning_deadline = None;
        self.reason = None;
        true
    }

    /// Checks both countdowns against `now`.
    pub fn poll(&mut self, now: i64) -> DetectorOutcome {
        if !self.armed || self.booted {
            return DetectorOutcome::Quiet;
        }

        if self.warning_deadline.is_some_and(|deadline| now >= deadline) {
            return self.boot(BootReason::WarningIgnored);
        }
        if self
            .away_since
            .is_some_and(|since| now - since >= self.policy.away_limit_ms)
        {
            return self.boot(BootReason::AwayTooLong);
        }
        DetectorOutcome::Quiet
    }

    fn is_listening(&self) -> bool {
        self.armed && !self.booted && !self.finalizing
    }

    fn boot(&mut self, reason: BootReason) -> DetectorOutcome {
        log::warn!("Proctoring boot: {}", reason);
        self.booted = true;
        self.clear_timers();
        DetectorOutcome::Boot(reason)
    }

    fn clear_timers(&mut self) {
        self.reason = None;
        self.warning_deadline = None;
        self.away_since = None;
    }
}

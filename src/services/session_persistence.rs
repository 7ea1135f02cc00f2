use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    errors::AppResult,
    models::domain::{Answer, BootReason, Snapshot},
    repositories::SnapshotRepository,
};

/// What a (re)loaded page should do with the stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoredSession {
    /// Nothing stored.
    Fresh,
    /// Name entered, exam not started yet.
    Welcome { student_name: String },
    /// Exam in progress with time left.
    Active {
        student_name: String,
        target_end_time: i64,
        remaining_ms: i64,
        answers: BTreeMap<String, Answer>,
        strikes: u32,
    },
    /// The stored attempt can no longer be resumed.
    Booted { reason: BootReason, strikes: u32 },
}

/// Snapshot/restore of the in-progress attempt for one exam code. Once
/// sealed (terminal stage reached) no further writes happen.
pub struct SessionPersistence {
    store: Arc<dyn SnapshotRepository>,
    exam_code: String,
    sealed: bool,
}

impl SessionPersistence {
    pub fn new(store: Arc<dyn SnapshotRepository>, exam_code: &str) -> Self {
        Self {
            store,
            exam_code: exam_code.to_string(),
            sealed: false,
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Reads the snapshot once at page load and decides where to resume.
    /// An unreadable snapshot is treated as absent.
    pub async fn restore(&self, now: i64, max_strikes: u32) -> RestoredSession {
        let snapshot = match self.store.read(&self.exam_code).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return RestoredSession::Fresh,
            Err(err) => {
                log::warn!(
                    "Ignoring unreadable snapshot for exam '{}': {}",
                    self.exam_code,
                    err
                );
                return RestoredSession::Fresh;
            }
        };

        let decision = Self::decide(snapshot, now, max_strikes);
        log::info!(
            "Restore decision for exam '{}': {}",
            self.exam_code,
            match &decision {
                RestoredSession::Fresh => "fresh",
                RestoredSession::Welcome { .. } => "welcome",
                RestoredSession::Active { .. } => "active",
                RestoredSession::Booted { .. } => "booted",
            }
        );
        decision
    }

    fn decide(snapshot: Snapshot, now: i64, max_strikes: u32) -> RestoredSession {
        if snapshot.strikes >= max_strikes {
            return RestoredSession::Booted {
                reason: BootReason::StrikeLimit,
                strikes: snapshot.strikes,
            };
        }

        match snapshot.target_end_time {
            Some(target) if target <= now => RestoredSession::Booted {
                reason: BootReason::ExpiredWhileAway,
                strikes: snapshot.strikes,
            },
            Some(target) => RestoredSession::Active {
                student_name: snapshot.student_name.unwrap_or_default(),
                target_end_time: target,
                remaining_ms: target - now,
                answers: snapshot.answers,
                strikes: snapshot.strikes,
            },
            None => match snapshot.student_name {
                Some(name) if !name.trim().is_empty() => {
                    RestoredSession::Welcome { student_name: name }
                }
                _ => RestoredSession::Fresh,
            },
        }
    }

    pub async fn save(&self, snapshot: &Snapshot) -> AppResult<()> {
        if self.sealed {
            log::debug!("Snapshot for exam '{}' is sealed, skipping write", self.exam_code);
            return Ok(());
        }
        self.store.write(&self.exam_code, snapshot).await
    }

    /// Stops all future writes and deletes the stored snapshot.
    pub async fn seal_and_clear(&mut self) -> AppResult<()> {
        self.sealed = true;
        self.store.clear(&self.exam_code).await
    }
}

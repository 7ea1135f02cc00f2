use std::time::Duration;

use futures::future::OptionFuture;
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{Answer, ExamStage},
        dto::SubmitAttemptResponse,
    },
    services::{
        environment::EnvironmentSignal,
        exam_session::{ExamSession, PendingSubmission, SubmitKind},
        violation_detector::Violation,
    },
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 32;

/// Student actions forwarded to a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetName(String),
    Start,
    Answer { question_id: String, answer: Answer },
    Acknowledge,
    Resume,
    Submit,
    Shutdown,
}

/// What the UI renders, republished after every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub stage: ExamStage,
    pub time_left: String,
    pub time_left_secs: i64,
    pub strikes: u32,
    pub violation: Option<Violation>,
    pub progress: f64,
    pub submitting: bool,
    pub awaiting_resume: bool,
    pub score: Option<u32>,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> AppResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AppError::InternalError("Session driver has stopped".to_string()))
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Waits until the published status satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionStatus) -> bool,
    ) -> AppResult<SessionStatus> {
        let status = self
            .status
            .wait_for(predicate)
            .await
            .map_err(|_| AppError::InternalError("Session driver has stopped".to_string()))?;
        Ok(status.clone())
    }
}

type InFlight = (SubmitKind, JoinHandle<AppResult<SubmitAttemptResponse>>);

/// Owns an [`ExamSession`] and feeds it ticks, environment signals and
/// student commands from one task.
pub struct SessionDriver {
    session: ExamSession,
    commands: mpsc::Receiver<SessionCommand>,
    signals: mpsc::UnboundedReceiver<EnvironmentSignal>,
    status: watch::Sender<SessionStatus>,
    last_error: Option<AppError>,
}

impl SessionDriver {
    pub fn new(mut session: ExamSession) -> AppResult<(Self, SessionHandle)> {
        let signals = session.take_signal_receiver().ok_or_else(|| {
            AppError::InternalError("Session is already driven elsewhere".to_string())
        })?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status_rx) = watch::channel(Self::status_of(&session, None));

        let driver = SessionDriver {
            session,
            commands: command_rx,
            signals,
            status: status_tx,
            last_error: None,
        };
        let handle = SessionHandle {
            commands: command_tx,
            status: status_rx,
        };
        Ok((driver, handle))
    }

    pub fn spawn(session: ExamSession) -> AppResult<(JoinHandle<ExamSession>, SessionHandle)> {
        let (driver, handle) = Self::new(session)?;
        Ok((tokio::spawn(driver.run()), handle))
    }

    /// Runs until the session reaches a terminal stage or is shut down, and
    /// hands the session back.
    pub async fn run(mut self) -> ExamSession {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<InFlight> = None;

        log::info!("Driving exam session '{}'", self.session.code());

        loop {
            self.publish();
            if self.session.stage().is_terminal() && in_flight.is_none() {
                break;
            }

            tokio::select! {
                Some(joined) = OptionFuture::from(in_flight.as_mut().map(|(_, handle)| handle)) => {
                    let kind = in_flight.take().map(|(kind, _)| kind).unwrap_or(SubmitKind::Manual);
                    let result = joined.unwrap_or_else(|err| {
                        Err(AppError::InternalError(format!("Submission task failed: {}", err)))
                    });
                    self.finish_submission(kind, result).await;
                }
                _ = ticker.tick() => {
                    if let Some(pending) = self.session.tick().await {
                        in_flight = Some(self.dispatch(pending));
                    }
                }
                Some(signal) = self.signals.recv() => {
                    self.session.handle_signal(signal).await;
                }
                command = self.commands.recv() => match command {
                    None | Some(SessionCommand::Shutdown) => {
                        if let Some((kind, handle)) = in_flight.take() {
                            log::info!("Waiting for pending submission before shutdown");
                            let result = handle.await.unwrap_or_else(|err| {
                                Err(AppError::InternalError(format!("Submission task failed: {}", err)))
                            });
                            self.finish_submission(kind, result).await;
                        }
                        break;
                    }
                    Some(command) => self.apply(command, &mut in_flight).await,
                },
            }
        }

        self.publish();
        log::info!(
            "Stopped driving exam session '{}' in stage {}",
            self.session.code(),
            self.session.stage()
        );
        self.session
    }

    async fn apply(&mut self, command: SessionCommand, in_flight: &mut Option<InFlight>) {
        log::debug!("Session command: {:?}", command);

        let result = match command {
            SessionCommand::SetName(name) => self.session.set_student_name(&name).await,
            SessionCommand::Start => self.session.start().await,
            SessionCommand::Answer {
                question_id,
                answer,
            } => self.session.set_answer(&question_id, answer).await,
            SessionCommand::Acknowledge => {
                self.session.acknowledge().await;
                Ok(())
            }
            SessionCommand::Resume => self.session.resume().await,
            SessionCommand::Submit => {
                if let Some(pending) = self.session.begin_submission(SubmitKind::Manual) {
                    *in_flight = Some(self.dispatch(pending));
                }
                Ok(())
            }
            SessionCommand::Shutdown => Ok(()),
        };

        match result {
            Ok(()) => self.last_error = None,
            Err(err) => {
                log::warn!("Session command failed: {}", err);
                self.last_error = Some(err);
            }
        }
    }

    /// Sends the submission from its own task so ticks and signals keep
    /// flowing while the request is pending.
    fn dispatch(&self, pending: PendingSubmission) -> InFlight {
        let exams = self.session.exam_repository();
        let code = self.session.code().to_string();
        let kind = pending.kind;
        let handle =
            tokio::spawn(async move { exams.submit_attempt(&code, &pending.request).await });
        (kind, handle)
    }

    async fn finish_submission(&mut self, kind: SubmitKind, result: AppResult<SubmitAttemptResponse>) {
        match self.session.complete_submission(kind, result).await {
            Ok(_) => self.last_error = None,
            Err(err) => self.last_error = Some(err),
        }
    }

    fn publish(&self) {
        self.status
            .send_replace(Self::status_of(&self.session, self.last_error.as_ref()));
    }

    fn status_of(session: &ExamSession, last_error: Option<&AppError>) -> SessionStatus {
        SessionStatus {
            stage: session.stage(),
            time_left: session.format_time_left(),
            time_left_secs: session.time_left_secs(),
            strikes: session.strikes(),
            violation: session.violation(),
            progress: session.progress(),
            submitting: session.is_submitting(),
            awaiting_resume: session.awaiting_resume(),
            score: session.score(),
            last_error: last_error
                .or_else(|| session.last_error())
                .map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repositories::{InMemoryExamRepository, InMemorySnapshotRepository};
    use crate::services::{
        clock::ManualClock,
        exam_session::{SessionDeps, SessionOptions},
    };
    use crate::test_utils::{
        fakes::FakeEnvironment,
        fixtures::{sample_exam, START_MS},
    };

    struct Running {
        task: JoinHandle<ExamSession>,
        handle: SessionHandle,
        environment: Arc<FakeEnvironment>,
        clock: Arc<ManualClock>,
        exams: Arc<InMemoryExamRepository>,
    }

    async fn running() -> Running {
        let exam = sample_exam();
        let environment = Arc::new(FakeEnvironment::new());
        let clock = Arc::new(ManualClock::new(START_MS));
        let exams = Arc::new(InMemoryExamRepository::with_exam(exam.clone()));
        let deps = SessionDeps {
            exams: exams.clone(),
            snapshots: Arc::new(InMemorySnapshotRepository::new()),
            environment: environment.clone(),
            clock: clock.clone(),
        };
        let session = ExamSession::new(&exam.code, exam.student_view(), deps, SessionOptions::default());
        let (task, mut handle) = SessionDriver::spawn(session).expect("driver should start");

        handle
            .send(SessionCommand::SetName("Ada".to_string()))
            .await
            .expect("send");
        handle.send(SessionCommand::Start).await.expect("send");
        handle
            .wait_for(|s| s.stage == ExamStage::Active)
            .await
            .expect("session should become active");

        Running {
            task,
            handle,
            environment,
            clock,
            exams,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_submits_exactly_once() {
        let mut r = running().await;

        r.clock.advance_secs(30 * 60);
        r.handle.send(SessionCommand::Submit).await.expect("send");
        let status = r
            .handle
            .wait_for(|s| s.stage.is_terminal())
            .await
            .expect("session should finish");

        assert_eq!(status.stage, ExamStage::Submitted);
        assert_eq!(status.score, Some(0));
        assert_eq!(r.exams.attempts().await.len(), 1);

        let session = r.task.await.expect("driver task");
        assert_eq!(session.stage(), ExamStage::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn environment_signals_reach_the_detector() {
        let mut r = running().await;
        r.environment.set_fullscreen(false);

        for _ in 0..3 {
            assert!(r.environment.emit(EnvironmentSignal::FullscreenChanged));
            tokio::task::yield_now().await;
        }
        let status = r
            .handle
            .wait_for(|s| s.stage == ExamStage::Booted)
            .await
            .expect("session should be booted");

        assert_eq!(status.strikes, 3);
        assert_eq!(r.environment.active_subscriptions(), 0);
        assert!(r.exams.attempts().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn answers_and_errors_show_up_in_status() {
        let mut r = running().await;

        r.handle
            .send(SessionCommand::Answer {
                question_id: "q-tf".to_string(),
                answer: Answer::Boolean(false),
            })
            .await
            .expect("send");
        let status = r
            .handle
            .wait_for(|s| s.progress > 0.0)
            .await
            .expect("progress should update");
        assert!(status.last_error.is_none());

        r.handle
            .send(SessionCommand::Answer {
                question_id: "ghost".to_string(),
                answer: Answer::Boolean(true),
            })
            .await
            .expect("send");
        let status = r
            .handle
            .wait_for(|s| s.last_error.is_some())
            .await
            .expect("error should be published");
        assert_eq!(status.stage, ExamStage::Active);

        r.handle.send(SessionCommand::Shutdown).await.expect("send");
        let session = r.task.await.expect("driver task");
        assert_eq!(session.stage(), ExamStage::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_advances_with_the_clock() {
        let mut r = running().await;
        assert_eq!(r.handle.status().time_left, "30:00");

        r.clock.advance_secs(90);
        let status = r
            .handle
            .wait_for(|s| s.time_left_secs <= 28 * 60 + 30)
            .await
            .expect("countdown should move");
        assert_eq!(status.time_left, "28:30");
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tokio::sync::mpsc;
use validator::Validate;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::{
        domain::{Answer, BootReason, ExamStage, Snapshot, StudentExam, StudentQuestion},
        dto::{AnswerEntry, SessionSummary, StudentIdentity, SubmitAttemptRequest, SubmitAttemptResponse},
    },
    repositories::{ExamRepository, SnapshotRepository},
    services::{
        clock::Clock,
        environment::{EnvironmentSignal, ProctorEnvironment, SignalSink, Subscription},
        session_persistence::{RestoredSession, SessionPersistence},
        violation_detector::{DetectorOutcome, ProctorPolicy, ProctorState, Violation, ViolationDetector},
    },
};

/// Collaborators injected into a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub exams: Arc<dyn ExamRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub environment: Arc<dyn ProctorEnvironment>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub policy: ProctorPolicy,
    /// Fixed seed for the question shuffle; random when absent.
    pub shuffle_seed: Option<u64>,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        SessionOptions {
            policy: config.proctor_policy(),
            shuffle_seed: config.shuffle_seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitKind {
    Manual,
    Auto,
}

/// A submission that holds the single-flight slot until it is completed.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub kind: SubmitKind,
    pub request: SubmitAttemptRequest,
}

/// One student's exam-taking session: stage machine, countdown, proctoring
/// and persistence wired together.
pub struct ExamSession {
    code: String,
    exam: StudentExam,
    deps: SessionDeps,
    persistence: SessionPersistence,
    detector: ViolationDetector,
    shuffle_seed: Option<u64>,
    stage: ExamStage,
    student_name: String,
    answers: BTreeMap<String, Answer>,
    target_end_time: Option<i64>,
    display_order: Vec<usize>,
    subscription: Option<Subscription>,
    signal_sink: SignalSink,
    signal_receiver: Option<mpsc::UnboundedReceiver<EnvironmentSignal>>,
    in_flight: Option<SubmitKind>,
    deferred_boot: Option<BootReason>,
    /// Request built when time ran out. Retries resend it unchanged.
    expired_request: Option<SubmitAttemptRequest>,
    awaiting_resume: bool,
    score: Option<u32>,
    boot_reason: Option<BootReason>,
    last_error: Option<AppError>,
}

impl ExamSession {
    /// Fetches the exam and restores any stored attempt for it.
    pub async fn open(code: &str, deps: SessionDeps, options: SessionOptions) -> AppResult<Self> {
        let exam = deps.exams.fetch_exam(code).await?;
        let mut session = Self::new(code, exam, deps, options);
        session.restore().await;
        Ok(session)
    }

    pub fn new(code: &str, exam: StudentExam, deps: SessionDeps, options: SessionOptions) -> Self {
        let (signal_sink, signal_receiver) = mpsc::unbounded_channel();
        let persistence = SessionPersistence::new(deps.snapshots.clone(), code);
        let display_order = (0..exam.questions.len()).collect();

        ExamSession {
            code: code.to_string(),
            exam,
            deps,
            persistence,
            detector: ViolationDetector::new(options.policy),
            shuffle_seed: options.shuffle_seed,
            stage: ExamStage::Welcome,
            student_name: String::new(),
            answers: BTreeMap::new(),
            target_end_time: None,
            display_order,
            subscription: None,
            signal_sink,
            signal_receiver: Some(signal_receiver),
            in_flight: None,
            deferred_boot: None,
            expired_request: None,
            awaiting_resume: false,
            score: None,
            boot_reason: None,
            last_error: None,
        }
    }

    /// Applies the stored snapshot, if any. Called once per page load.
    pub async fn restore(&mut self) {
        let now = self.now();
        let max_strikes = self.detector.policy().max_strikes;

        match self.persistence.restore(now, max_strikes).await {
            RestoredSession::Fresh => {}
            RestoredSession::Welcome { student_name } => {
                self.student_name = student_name;
            }
            RestoredSession::Booted { reason, strikes } => {
                self.detector.arm(strikes);
                self.enter_booted(reason).await;
            }
            RestoredSession::Active {
                student_name,
                target_end_time,
                answers,
                strikes,
                ..
            } => {
                self.student_name = student_name;
                self.answers = answers;
                self.target_end_time = Some(target_end_time);
                self.activate(strikes);

                if let Err(err) = self.deps.environment.request_fullscreen().await {
                    log::warn!(
                        "Could not re-enter fullscreen for exam '{}', waiting for manual resume: {}",
                        self.code,
                        err
                    );
                    self.awaiting_resume = true;
                    self.last_error = Some(err);
                }
            }
        }
    }

    pub async fn set_student_name(&mut self, name: &str) -> AppResult<()> {
        if self.stage != ExamStage::Welcome {
            return Err(AppError::InvalidState(
                "The name can only be changed before the exam starts".to_string(),
            ));
        }
        self.student_name = name.trim().to_string();
        self.persist().await;
        Ok(())
    }

    /// `welcome → active`. Requires a valid name and a proctored (fullscreen)
    /// environment; on failure the session stays in `welcome`.
    pub async fn start(&mut self) -> AppResult<()> {
        if self.stage != ExamStage::Welcome {
            return Err(AppError::InvalidState(format!(
                "Cannot start an exam in stage {}",
                self.stage
            )));
        }
        StudentIdentity::new(&self.student_name).validate()?;

        if let Err(err) = self.deps.environment.request_fullscreen().await {
            log::warn!("Fullscreen request denied for exam '{}': {}", self.code, err);
            self.last_error = Some(err.clone());
            return Err(err);
        }

        self.target_end_time = Some(self.now() + self.exam.duration_ms());
        self.activate(0);
        self.last_error = None;
        self.persist().await;

        log::info!(
            "Exam '{}' started by {} ({} minutes)",
            self.code,
            self.student_name,
            self.exam.duration
        );
        Ok(())
    }

    pub async fn set_answer(&mut self, question_id: &str, answer: Answer) -> AppResult<()> {
        if self.stage != ExamStage::Active || self.awaiting_resume {
            return Err(AppError::InvalidState(
                "Answers can only be changed during an active exam".to_string(),
            ));
        }
        if self.is_expired() {
            return Err(AppError::InvalidState(
                "Time is up, answers can no longer be changed".to_string(),
            ));
        }
        if self.exam.find_question(question_id).is_none() {
            return Err(AppError::NotFound(format!("Question '{}' not found", question_id)));
        }

        self.answers.insert(question_id.to_string(), answer);
        self.persist().await;
        Ok(())
    }

    pub async fn handle_signal(&mut self, signal: EnvironmentSignal) {
        if self.stage != ExamStage::Active {
            log::debug!("Ignoring {:?} outside an active exam", signal);
            return;
        }

        let strikes_before = self.detector.strikes();
        let fullscreen = self.deps.environment.is_fullscreen_active();
        let outcome = self.detector.handle(signal, self.now(), fullscreen);
        self.apply(outcome).await;

        if self.stage == ExamStage::Active && self.detector.strikes() != strikes_before {
            self.persist().await;
        }
    }

    /// The student confirmed the warning. Fullscreen is re-requested if it
    /// was lost.
    pub async fn acknowledge(&mut self) -> bool {
        if self.stage != ExamStage::Active {
            return false;
        }

        let cleared = self.detector.acknowledge();
        if !self.deps.environment.is_fullscreen_active() {
            if let Err(err) = self.deps.environment.request_fullscreen().await {
                log::warn!("Fullscreen re-request after warning failed: {}", err);
            }
        }
        cleared
    }

    /// Leaves the resume gate shown after a reload that could not re-enter
    /// fullscreen by itself.
    pub async fn resume(&mut self) -> AppResult<()> {
        if !self.awaiting_resume {
            return Ok(());
        }

        if let Err(err) = self.deps.environment.request_fullscreen().await {
            self.last_error = Some(err.clone());
            return Err(err);
        }
        self.awaiting_resume = false;
        self.last_error = None;
        log::info!("Exam '{}' resumed by {}", self.code, self.student_name);
        Ok(())
    }

    /// Once-per-second step. Checks the proctoring countdowns and, when time
    /// is up, claims the submission slot for the automatic submission.
    pub async fn tick(&mut self) -> Option<PendingSubmission> {
        if self.stage != ExamStage::Active {
            return None;
        }

        let now = self.now();
        let outcome = self.detector.poll(now);
        self.apply(outcome).await;
        if self.stage != ExamStage::Active {
            return None;
        }

        if self.is_expired() {
            return self.begin_submission(SubmitKind::Auto);
        }
        None
    }

    /// Runs [`ExamSession::tick`] and performs the automatic submission inline.
    pub async fn advance(&mut self) -> AppResult<()> {
        if let Some(pending) = self.tick().await {
            let result = self.dispatch(&pending).await;
            self.complete_submission(pending.kind, result).await?;
        }
        Ok(())
    }

    /// Claims the single-flight slot. A second caller gets `None` and is
    /// dropped, not queued.
    pub fn begin_submission(&mut self, kind: SubmitKind) -> Option<PendingSubmission> {
        if self.stage != ExamStage::Active || self.in_flight.is_some() {
            log::debug!("Dropping {:?} submission for exam '{}'", kind, self.code);
            return None;
        }

        self.in_flight = Some(kind);
        if kind == SubmitKind::Auto {
            self.detector.set_finalizing(true);
        }
        self.last_error = None;

        let request = match (&self.expired_request, self.is_expired()) {
            (Some(frozen), _) => frozen.clone(),
            (None, true) => {
                let request = self.build_request();
                self.expired_request = Some(request.clone());
                request
            }
            (None, false) => self.build_request(),
        };

        log::info!("Submitting exam '{}' ({:?})", self.code, kind);
        Some(PendingSubmission { kind, request })
    }

    pub async fn dispatch(&self, pending: &PendingSubmission) -> AppResult<SubmitAttemptResponse> {
        self.deps
            .exams
            .submit_attempt(&self.code, &pending.request)
            .await
    }

    /// Releases the single-flight slot with the endpoint's answer.
    pub async fn complete_submission(
        &mut self,
        kind: SubmitKind,
        result: AppResult<SubmitAttemptResponse>,
    ) -> AppResult<u32> {
        if self.in_flight != Some(kind) {
            log::warn!("Completing a {:?} submission that was not in flight", kind);
        }
        self.in_flight = None;
        self.detector.set_finalizing(false);

        match result {
            Ok(response) => {
                self.score = Some(response.score);
                if let Some(reason) = self.deferred_boot.take() {
                    log::info!("Submission succeeded before boot took effect ({})", reason);
                }
                if !self.stage.is_terminal() {
                    self.enter_terminal(ExamStage::Submitted).await;
                }
                Ok(response.score)
            }
            Err(err) => {
                log::error!("Submission for exam '{}' failed: {}", self.code, err);
                if !self.stage.is_terminal() {
                    self.last_error = Some(err.clone());
                    if let Some(reason) = self.deferred_boot.take() {
                        self.enter_booted(reason).await;
                    }
                }
                Err(err)
            }
        }
    }

    /// Manual submission. `Ok(None)` when another submission holds the slot.
    pub async fn submit(&mut self) -> AppResult<Option<u32>> {
        let Some(pending) = self.begin_submission(SubmitKind::Manual) else {
            return Ok(None);
        };
        let result = self.dispatch(&pending).await;
        self.complete_submission(pending.kind, result).await.map(Some)
    }

    /// Forced termination. Repeated boots are no-ops; while a submission is
    /// in flight the boot waits for its outcome.
    pub async fn boot(&mut self, reason: BootReason) {
        if self.stage.is_terminal() {
            return;
        }
        if self.in_flight.is_some() {
            if self.deferred_boot.is_none() {
                log::info!("Deferring boot ({}) until the pending submission resolves", reason);
                self.deferred_boot = Some(reason);
            }
            return;
        }
        self.enter_booted(reason).await;
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn exam_title(&self) -> &str {
        &self.exam.title
    }

    pub fn exam_repository(&self) -> Arc<dyn ExamRepository> {
        self.deps.exams.clone()
    }

    pub fn stage(&self) -> ExamStage {
        self.stage
    }

    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    pub fn answers(&self) -> &BTreeMap<String, Answer> {
        &self.answers
    }

    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    pub fn strikes(&self) -> u32 {
        self.detector.strikes()
    }

    pub fn max_strikes(&self) -> u32 {
        self.detector.policy().max_strikes
    }

    pub fn proctor_state(&self) -> ProctorState {
        self.detector.state()
    }

    pub fn violation(&self) -> Option<Violation> {
        self.detector.violation(self.now())
    }

    pub fn score(&self) -> Option<u32> {
        self.score
    }

    pub fn boot_reason(&self) -> Option<BootReason> {
        self.boot_reason
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn awaiting_resume(&self) -> bool {
        self.awaiting_resume
    }

    pub fn is_monitoring(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    pub fn target_end_time(&self) -> Option<i64> {
        self.target_end_time
    }

    pub fn time_left_ms(&self) -> i64 {
        match self.target_end_time {
            Some(target) => (target - self.now()).max(0),
            None => self.exam.duration_ms(),
        }
    }

    pub fn time_left_secs(&self) -> i64 {
        (self.time_left_ms() + 999) / 1000
    }

    /// Remaining time as `MM:SS`.
    pub fn format_time_left(&self) -> String {
        let secs = self.time_left_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    /// Fraction of questions with a non-empty answer, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        let total = self.exam.questions.len();
        if total == 0 {
            return 0.0;
        }
        let answered = self
            .exam
            .questions
            .iter()
            .filter(|q| self.answers.get(&q.id).is_some_and(Answer::is_answered))
            .count();
        answered as f64 / total as f64
    }

    /// Questions in display order. Empty outside an active, proctored exam.
    pub fn display_questions(&self) -> Vec<&StudentQuestion> {
        if self.stage != ExamStage::Active || self.awaiting_resume {
            return Vec::new();
        }
        self.display_order
            .iter()
            .filter_map(|&index| self.exam.questions.get(index))
            .collect()
    }

    pub fn summary(&self) -> Option<SessionSummary> {
        if !self.stage.is_terminal() {
            return None;
        }
        Some(SessionSummary {
            stage: self.stage,
            exam_title: self.exam.title.clone(),
            student_name: self.student_name.clone(),
            score: self.score,
            total_points: self.exam.total_points(),
            strikes: self.detector.strikes(),
            boot_reason: self.boot_reason,
        })
    }

    /// Receiving end of the environment signal channel, handed out once to
    /// whoever drives the session.
    pub fn take_signal_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<EnvironmentSignal>> {
        self.signal_receiver.take()
    }

    fn now(&self) -> i64 {
        self.deps.clock.now_ms()
    }

    fn is_expired(&self) -> bool {
        self.target_end_time.is_some_and(|target| self.now() >= target)
    }

    fn activate(&mut self, strikes: u32) {
        self.stage = ExamStage::Active;
        self.display_order = self.shuffled_order();
        self.subscription = Some(self.deps.environment.subscribe(self.signal_sink.clone()));
        self.detector.arm(strikes);
    }

    fn shuffled_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.exam.questions.len()).collect();
        if self.exam.shuffle_questions {
            let mut rng = match self.shuffle_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            order.shuffle(&mut rng);
        }
        order
    }

    async fn apply(&mut self, outcome: DetectorOutcome) {
        if let DetectorOutcome::Boot(reason) = outcome {
            self.boot(reason).await;
        }
    }

    fn build_request(&self) -> SubmitAttemptRequest {
        let answers = self
            .exam
            .questions
            .iter()
            .filter_map(|q| {
                self.answers
                    .get(&q.id)
                    .map(|answer| AnswerEntry::from_answer(q, answer))
            })
            .collect();

        let duration_ms = self.exam.duration_ms();
        let elapsed_ms = self
            .target_end_time
            .map(|target| (self.now() - (target - duration_ms)).clamp(0, duration_ms))
            .unwrap_or(0);

        SubmitAttemptRequest {
            student_name: self.student_name.clone(),
            answers,
            strikes: self.detector.strikes(),
            elapsed_ms,
        }
    }

    async fn persist(&mut self) {
        let snapshot = match self.stage {
            ExamStage::Welcome => Snapshot::welcome(&self.student_name),
            ExamStage::Active => Snapshot {
                student_name: Some(self.student_name.clone()),
                target_end_time: self.target_end_time,
                answers: self.answers.clone(),
                strikes: self.detector.strikes(),
            },
            ExamStage::Submitted | ExamStage::Booted => return,
        };

        if let Err(err) = self.persistence.save(&snapshot).await {
            log::warn!("Failed to save snapshot for exam '{}': {}", self.code, err);
        }
    }

    async fn enter_booted(&mut self, reason: BootReason) {
        self.boot_reason = Some(reason);
        self.enter_terminal(ExamStage::Booted).await;
    }

    async fn enter_terminal(&mut self, stage: ExamStage) {
        self.stage = stage;
        self.teardown();

        if let Err(err) = self.persistence.seal_and_clear().await {
            log::warn!("Failed to clear snapshot for exam '{}': {}", self.code, err);
        }
        if self.deps.environment.is_fullscreen_active() {
            if let Err(err) = self.deps.environment.exit_fullscreen().await {
                log::warn!("Failed to exit fullscreen: {}", err);
            }
        }

        match self.boot_reason {
            Some(reason) if stage == ExamStage::Booted => {
                log::warn!("Exam '{}' booted: {}", self.code, reason)
            }
            _ => log::info!("Exam '{}' entered stage {}", self.code, stage),
        }
    }

    /// Unregisters listeners and drops every pending countdown.
    fn teardown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.detector.disarm();
        self.awaiting_resume = false;
    }
}

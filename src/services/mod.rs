pub mod clock;
pub mod environment;
pub mod exam_session;
pub mod grading_service;
pub mod session_driver;
pub mod session_persistence;
pub mod violation_detector;

pub use clock::{Clock, ManualClock, SystemClock};
pub use environment::{EnvironmentSignal, ProctorEnvironment, SignalSink, Subscription};
pub use exam_session::{ExamSession, PendingSubmission, SessionDeps, SessionOptions, SubmitKind};
pub use grading_service::GradingService;
pub use session_driver::{SessionCommand, SessionDriver, SessionHandle, SessionStatus};
pub use session_persistence::{RestoredSession, SessionPersistence};
pub use violation_detector::{DetectorOutcome, ProctorPolicy, ProctorState, Violation, ViolationDetector};

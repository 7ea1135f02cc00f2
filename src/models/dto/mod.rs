pub mod request;
pub mod response;
pub use request::{AnswerEntry, StudentIdentity, SubmitAttemptRequest};
pub use response::{SessionSummary, SubmitAttemptResponse};

pub mod exam_repository;
pub mod snapshot_repository;

pub use exam_repository::{ExamRepository, HttpExamRepository, InMemoryExamRepository};
pub use snapshot_repository::{FileSnapshotRepository, InMemorySnapshotRepository, SnapshotRepository};

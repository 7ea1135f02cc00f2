use std::{
    collections::HashMap,
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{errors::AppResult, models::domain::Snapshot};

/// Durable local store for in-progress attempts, one slot per exam code.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn read(&self, exam_code: &str) -> AppResult<Option<Snapshot>>;
    async fn write(&self, exam_code: &str, snapshot: &Snapshot) -> AppResult<()>;
    async fn clear(&self, exam_code: &str) -> AppResult<()>;
}

/// Stores each snapshot as a JSON file under a directory.
pub struct FileSnapshotRepository {
    dir: PathBuf,
}

impl FileSnapshotRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the snapshot for `exam_code`. The code is hex-encoded so
    /// distinct codes never share a file.
    pub fn path_for(&self, exam_code: &str) -> PathBuf {
        let key: String = exam_code.bytes().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("exam-{}.json", key))
    }
}

#[async_trait]
impl SnapshotRepository for FileSnapshotRepository {
    async fn read(&self, exam_code: &str) -> AppResult<Option<Snapshot>> {
        let path = self.path_for(exam_code);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let snapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot))
    }

    async fn write(&self, exam_code: &str, snapshot: &Snapshot) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(exam_code);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(snapshot)?;

        // Write then rename so a crash never leaves a half-written snapshot
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self, exam_code: &str) -> AppResult<()> {
        match tokio::fs::remove_file(self.path_for(exam_code)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Default)]
pub struct InMemorySnapshotRepository {
    snapshots: Arc<RwLock<HashMap<String, Snapshot>>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, exam_code: &str) -> bool {
        self.snapshots.read().await.contains_key(exam_code)
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn read(&self, exam_code: &str) -> AppResult<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(exam_code).cloned())
    }

    async fn write(&self, exam_code: &str, snapshot: &Snapshot) -> AppResult<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(exam_code.to_string(), snapshot.clone());
        Ok(())
    }

    async fn clear(&self, exam_code: &str) -> AppResult<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.remove(exam_code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_for_stays_inside_dir() {
        let repo = FileSnapshotRepository::new("/tmp/snapshots");
        let path = repo.path_for("../AB");

        assert_eq!(path, PathBuf::from("/tmp/snapshots/exam-2e2e2f4142.json"));
    }

    #[test]
    fn distinct_codes_get_distinct_files() {
        let repo = FileSnapshotRepository::new("/tmp/snapshots");
        let paths: std::collections::HashSet<PathBuf> = ["AB C1", "AB.C1", "AB_C1", "AB-C1"]
            .iter()
            .map(|code| repo.path_for(code))
            .collect();

        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn test_repositories_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FileSnapshotRepository>();
        assert_send_sync::<InMemorySnapshotRepository>();
    }

    #[tokio::test]
    async fn in_memory_clear_removes_slot() {
        let repo = InMemorySnapshotRepository::new();
        repo.write("ABC123", &Snapshot::welcome("Ada"))
            .await
            .expect("write should succeed");
        assert!(repo.contains("ABC123").await);

        repo.clear("ABC123").await.expect("clear should succeed");
        assert!(!repo.contains("ABC123").await);
        assert!(repo.read("ABC123").await.expect("read").is_none());
    }
}

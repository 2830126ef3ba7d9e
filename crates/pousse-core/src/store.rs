//! File-backed task store
//!
//! Each task is a single JSON file named by its id, living in exactly one
//! of three bucket directories (`waiting`, `success`, `dead`) under the
//! data directory.

use std::path::{Path, PathBuf};

use crate::error::EngineResult;
use crate::task::{Bucket, Task};

#[derive(Debug, Clone)]
pub struct TaskStore {
    base: PathBuf,
}

impl TaskStore {
    /// Open the store, creating the bucket directories if needed.
    pub async fn open(base: &Path) -> EngineResult<Self> {
        for bucket in Bucket::ALL {
            tokio::fs::create_dir_all(base.join(bucket.as_str())).await?;
        }
        Ok(Self { base: base.to_path_buf() })
    }

    fn path(&self, bucket: Bucket, id: &str) -> PathBuf {
        self.base.join(bucket.as_str()).join(id)
    }

    /// Write the task's JSON encoding into the given bucket.
    pub async fn put(&self, task: &Task, bucket: Bucket) -> EngineResult<()> {
        let encoded = serde_json::to_vec(task)?;
        tokio::fs::write(self.path(bucket, &task.id), encoded).await?;
        Ok(())
    }

    /// Unlink a task file. A missing file is an error to the caller.
    pub async fn remove(&self, id: &str, bucket: Bucket) -> EngineResult<()> {
        tokio::fs::remove_file(self.path(bucket, id)).await?;
        Ok(())
    }

    /// Move a task between buckets: write the destination first, then
    /// unlink the source. An interrupted move can leave a duplicate but
    /// never loses the task.
    pub async fn transfer(&self, task: &Task, from: Bucket, to: Bucket) -> EngineResult<()> {
        self.put(task, to).await?;
        self.remove(&task.id, from).await
    }

    /// Decode every task in a bucket, in directory order.
    pub async fn list(&self, bucket: Bucket) -> EngineResult<Vec<Task>> {
        let mut entries = tokio::fs::read_dir(self.base.join(bucket.as_str())).await?;
        let mut tasks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let content = tokio::fs::read(entry.path()).await?;
            tasks.push(serde_json::from_slice(&content)?);
        }
        Ok(tasks)
    }

    /// Drop the oldest entries (by `last_run`) from the success archive so
    /// that at most `keep` remain. Runs at boot only; the live success path
    /// writes without trimming.
    pub async fn trim_success(&self, keep: usize) -> EngineResult<usize> {
        let mut archived = self.list(Bucket::Success).await?;
        if archived.len() <= keep {
            return Ok(0);
        }
        archived.sort_by(|a, b| b.last_run.cmp(&a.last_run));
        let stale = archived.split_off(keep);
        for task in &stale {
            self.remove(&task.id, Bucket::Success).await?;
        }
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, next_run: i64) -> Task {
        Task {
            id: id.into(),
            url: "http://callback/t".into(),
            payload: b"p".to_vec(),
            expected: 200,
            schedule: String::new(),
            next_scheduled_run: next_run,
            next_run,
            tries: 0,
            last_run: 0,
            last_error_body: Vec::new(),
            last_error_status_code: 0,
        }
    }

    #[tokio::test]
    async fn put_list_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();

        store.put(&task("a", 1), Bucket::Waiting).await.unwrap();
        store.put(&task("b", 2), Bucket::Waiting).await.unwrap();

        let mut listed = store.list(Bucket::Waiting).await.unwrap();
        listed.sort_by(|x, y| x.id.cmp(&y.id));
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a");

        store.remove("a", Bucket::Waiting).await.unwrap();
        assert_eq!(store.list(Bucket::Waiting).await.unwrap().len(), 1);

        // Removing twice surfaces the missing file.
        assert!(store.remove("a", Bucket::Waiting).await.is_err());
    }

    #[tokio::test]
    async fn transfer_moves_between_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();

        let t = task("t", 1);
        store.put(&t, Bucket::Waiting).await.unwrap();
        store.transfer(&t, Bucket::Waiting, Bucket::Success).await.unwrap();

        assert!(store.list(Bucket::Waiting).await.unwrap().is_empty());
        assert_eq!(store.list(Bucket::Success).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn trim_success_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::open(dir.path()).await.unwrap();

        for i in 0..5 {
            let mut t = task(&format!("t{i}"), 0);
            t.last_run = i;
            store.put(&t, Bucket::Success).await.unwrap();
        }

        let removed = store.trim_success(3).await.unwrap();
        assert_eq!(removed, 2);

        let kept = store.list(Bucket::Success).await.unwrap();
        assert_eq!(kept.len(), 3);
        // The two oldest (last_run 0 and 1) are gone.
        assert!(kept.iter().all(|t| t.last_run >= 2));
    }
}

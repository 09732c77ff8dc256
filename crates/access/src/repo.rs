//! Durable access store.
//!
//! One JSON table keyed by user id, loaded fully into memory at startup and
//! rewritten wholesale on every mutation. Writers are serialized in-process
//! behind a `tokio::sync::Mutex`, so single-writer-per-process is the
//! enforced invariant; the trait hides the mechanism so a per-key store can
//! replace the whole-file rewrite later.

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use {async_trait::async_trait, tokio::sync::Mutex, tracing::warn};

use crate::{
    error::{Error, Result},
    record::AccessRecord,
};

/// Persistent per-user access records.
#[async_trait]
pub trait AccessRepository: Send + Sync {
    /// Fetch a user's record, or a default locked record if none is stored.
    async fn get(&self, user_id: u64) -> Result<AccessRecord>;

    /// Atomically replace a user's record.
    async fn put(&self, user_id: u64, record: AccessRecord) -> Result<()>;

    /// Whether the user currently passes the gate.
    async fn has_access(&self, user_id: u64) -> Result<bool>;
}

/// JSON-file backed repository.
///
/// Acceptable at this scale because the table is small; an unreadable or
/// corrupt file degrades to an empty table instead of failing startup.
pub struct JsonAccessRepository {
    path: PathBuf,
    table: Mutex<HashMap<u64, AccessRecord>>,
}

impl JsonAccessRepository {
    /// Load the table from `path` (missing or corrupt file → empty table).
    pub async fn open(path: PathBuf) -> Result<Self> {
        let load_path = path.clone();
        let table = tokio::task::spawn_blocking(move || load_table(&load_path)).await?;
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }
}

#[async_trait]
impl AccessRepository for JsonAccessRepository {
    async fn get(&self, user_id: u64) -> Result<AccessRecord> {
        let table = self.table.lock().await;
        Ok(table.get(&user_id).cloned().unwrap_or_default())
    }

    async fn put(&self, user_id: u64, record: AccessRecord) -> Result<()> {
        // The guard is held across the file write so that concurrent puts
        // cannot interleave their whole-table rewrites.
        let mut table = self.table.lock().await;
        table.insert(user_id, record);
        let json = serde_json::to_string_pretty(&*table)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || persist_table(&path, &json)).await??;
        Ok(())
    }

    async fn has_access(&self, user_id: u64) -> Result<bool> {
        let table = self.table.lock().await;
        Ok(table.get(&user_id).is_some_and(|r| r.granted))
    }
}

fn load_table(path: &Path) -> HashMap<u64, AccessRecord> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read access table, starting empty");
            return HashMap::new();
        },
    };
    match serde_json::from_str(&raw) {
        Ok(table) => table,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "access table corrupt, starting empty");
            HashMap::new()
        },
    }
}

fn persist_table(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io("create data dir", e))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::io("open access table", e))?;
    let mut lock = fd_lock::RwLock::new(file);
    let mut guard = lock
        .write()
        .map_err(|e| Error::io("lock access table", e))?;
    guard
        .write_all(json.as_bytes())
        .map_err(|e| Error::io("write access table", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("access.json")
    }

    #[tokio::test]
    async fn get_returns_default_for_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonAccessRepository::open(table_path(&dir)).await.unwrap();
        let record = repo.get(42).await.unwrap();
        assert!(!record.granted);
        assert!(record.channels.is_empty());
        assert!(!repo.has_access(42).await.unwrap());
    }

    #[tokio::test]
    async fn put_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = table_path(&dir);

        let repo = JsonAccessRepository::open(path.clone()).await.unwrap();
        let mut record = repo.get(42).await.unwrap();
        record.mark_member(-100, 1);
        record.grant(2);
        repo.put(42, record).await.unwrap();

        // Fresh load from disk, as after a process restart.
        let reopened = JsonAccessRepository::open(path).await.unwrap();
        assert!(reopened.has_access(42).await.unwrap());
        let record = reopened.get(42).await.unwrap();
        assert_eq!(
            record.status_of(-100),
            crate::record::ChannelStatus::Member
        );
    }

    #[tokio::test]
    async fn corrupt_table_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = table_path(&dir);
        fs::write(&path, "{not json").unwrap();

        let repo = JsonAccessRepository::open(path.clone()).await.unwrap();
        assert!(!repo.has_access(42).await.unwrap());

        // The store is usable again after the first write.
        let mut record = repo.get(42).await.unwrap();
        record.grant(1);
        repo.put(42, record).await.unwrap();
        let reopened = JsonAccessRepository::open(path).await.unwrap();
        assert!(reopened.has_access(42).await.unwrap());
    }

    #[tokio::test]
    async fn put_replaces_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonAccessRepository::open(table_path(&dir)).await.unwrap();

        let mut record = repo.get(1).await.unwrap();
        record.mark_requested(-5, 1);
        repo.put(1, record).await.unwrap();

        let mut record = repo.get(1).await.unwrap();
        record.channels.clear();
        repo.put(1, record).await.unwrap();

        assert!(repo.get(1).await.unwrap().channels.is_empty());
    }
}

//! Code → file-id catalog with the same whole-file JSON persistence as the
//! access store: small table, in-memory copy, wholesale rewrite per
//! mutation, corrupt file degrades to empty.

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use {async_trait::async_trait, tokio::sync::Mutex, tracing::warn};

use crate::error::{Error, Result};

/// Keyed lookup from a content code to a platform file reference.
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// The Telegram file id stored under `code`, if any.
    async fn get(&self, code: &str) -> Result<Option<String>>;

    /// Store (or replace) the file id for `code`.
    async fn put(&self, code: &str, file_id: &str) -> Result<()>;

    /// Remove a code. Returns whether it existed.
    async fn remove(&self, code: &str) -> Result<bool>;

    /// All stored codes, sorted.
    async fn codes(&self) -> Result<Vec<String>>;
}

/// JSON-file backed catalog.
pub struct JsonMediaCatalog {
    path: PathBuf,
    table: Mutex<BTreeMap<String, String>>,
}

impl JsonMediaCatalog {
    /// Load the catalog from `path` (missing or corrupt file → empty).
    pub async fn open(path: PathBuf) -> Result<Self> {
        let load_path = path.clone();
        let table = tokio::task::spawn_blocking(move || load_table(&load_path)).await?;
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    async fn persist(&self, table: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(table)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || persist_table(&path, &json)).await?
    }
}

#[async_trait]
impl MediaCatalog for JsonMediaCatalog {
    async fn get(&self, code: &str) -> Result<Option<String>> {
        Ok(self.table.lock().await.get(code).cloned())
    }

    async fn put(&self, code: &str, file_id: &str) -> Result<()> {
        let mut table = self.table.lock().await;
        table.insert(code.to_string(), file_id.to_string());
        self.persist(&table).await
    }

    async fn remove(&self, code: &str) -> Result<bool> {
        let mut table = self.table.lock().await;
        let existed = table.remove(code).is_some();
        if existed {
            self.persist(&table).await?;
        }
        Ok(existed)
    }

    async fn codes(&self) -> Result<Vec<String>> {
        Ok(self.table.lock().await.keys().cloned().collect())
    }
}

fn load_table(path: &Path) -> BTreeMap<String, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read media catalog, starting empty");
            return BTreeMap::new();
        },
    };
    match serde_json::from_str(&raw) {
        Ok(table) => table,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "media catalog corrupt, starting empty");
            BTreeMap::new()
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
        .map_err(|e| Error::io("open media catalog", e))?;
    let mut lock = fd_lock::RwLock::new(file);
    let mut guard = lock
        .write()
        .map_err(|e| Error::io("lock media catalog", e))?;
    guard
        .write_all(json.as_bytes())
        .map_err(|e| Error::io("write media catalog", e))?;
    Ok(())
}

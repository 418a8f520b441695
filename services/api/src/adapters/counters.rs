//! services/api/src/adapters/counters.rs
//!
//! A `CounterStore` backed by a JSON file, for deployments without Postgres.
//!
//! The whole map is rewritten on every increment: written to a sibling temp file,
//! then renamed over the original. Writers in this process are serialized by a
//! mutex; the file must not be shared between processes.

use async_trait::async_trait;
use procurement_core::domain::IdKind;
use procurement_core::ports::{CounterStore, PortError, PortResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

pub struct FileCounterStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> PortResult<BTreeMap<String, u64>> {
        let mut counters = match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                PortError::Unexpected(format!("corrupt counter file {}: {e}", self.path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(io_error(&self.path, e)),
        };
        for kind in IdKind::ALL {
            counters.entry(kind.counter_key().to_string()).or_insert(0);
        }
        Ok(counters)
    }

    async fn write(&self, counters: &BTreeMap<String, u64>) -> PortResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| io_error(dir, e))?;
        }
        let raw = serde_json::to_vec_pretty(counters)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await.map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, e))
    }
}

fn io_error(path: &Path, e: std::io::Error) -> PortError {
    PortError::Unexpected(format!("counter file {}: {e}", path.display()))
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn increment(&self, key: &str) -> PortResult<u64> {
        let _guard = self.lock.lock().await;
        let mut counters = self.read().await?;
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        let value = *counter;
        self.write(&counters).await?;
        debug!(key = %key, value, "Incremented counter");
        Ok(value)
    }
}

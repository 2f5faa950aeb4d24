use bytes::Bytes;
use onscale_core::job::JobId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{OnscaleError, Result};
use crate::fs::atomic_write;

/// Persistent map from idempotency key to the job created for it.
///
/// A submission whose key is already recorded reuses that job instead of creating another.
#[derive(Debug)]
pub struct SubmissionLedger {
    path: PathBuf,
    entries: BTreeMap<String, JobId>,
}

impl SubmissionLedger {
    /// Loads the ledger at `path`. A missing file is an empty ledger.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| OnscaleError::Ledger(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(OnscaleError::Ledger(format!("{}: {e}", path.display()))),
        };
        Ok(Self { path, entries })
    }

    pub fn get(&self, key: &str) -> Option<&JobId> {
        self.entries.get(key)
    }

    /// Records `key` and persists the ledger before returning.
    pub async fn record(&mut self, key: &str, job_id: &JobId) -> Result<()> {
        self.entries.insert(key.to_string(), job_id.clone());
        let json = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| OnscaleError::Ledger(e.to_string()))?;
        atomic_write(&self.path, Bytes::from(json))
            .await
            .map_err(|e| OnscaleError::Ledger(format!("{}: {e}", self.path.display())))?;
        debug!(key, %job_id, "recorded submission");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

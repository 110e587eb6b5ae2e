//! Persisted job ledger: next job id and the set of processed files.
//!
//! The ledger is the crash-resume boundary. It is recorded and persisted
//! only after a work unit's compute and publish steps both succeed, and
//! always before the next unit is planned, so a crash loses at most one
//! unit's progress. Re-running that unit is safe because the compute job
//! and the output layout overwrite their destination by job id.

use crate::error::Result;
use crate::storage::Storage;
use gleaner_protocol::paths::ledger_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// On-disk ledger record. Written as one JSON document, full overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerState {
    next_job_id: u64,
    processed: BTreeSet<String>,
}

/// Durable record of assigned job ids and processed input files.
pub struct JobLedger {
    storage: Arc<dyn Storage>,
    path: PathBuf,
    state: LedgerState,
}

impl JobLedger {
    /// Load the ledger for a root path; a missing record is a fresh ledger.
    pub fn load(storage: Arc<dyn Storage>, root: &Path) -> Result<Self> {
        let path = ledger_path(root);
        let state = match storage.read_to_string(&path)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => LedgerState::default(),
        };
        info!(
            path = %path.display(),
            next_job_id = state.next_job_id,
            processed = state.processed.len(),
            "Loaded job ledger"
        );
        Ok(Self {
            storage,
            path,
            state,
        })
    }

    /// The id the next work unit will be assigned. Strictly increases
    /// across process lifetimes and is never reused.
    pub fn next_job_id(&self) -> u64 {
        self.state.next_job_id
    }

    pub fn processed(&self) -> &BTreeSet<String> {
        &self.state.processed
    }

    /// Record a completed work unit. Idempotent: re-recording the same
    /// files adds nothing, and the job-id high-water mark never moves
    /// backwards.
    pub fn record(&mut self, job_id: u64, files: &[String]) {
        for file in files {
            self.state.processed.insert(file.clone());
        }
        self.state.next_job_id = self.state.next_job_id.max(job_id + 1);
    }

    /// Atomically write the full ledger record (temp file + rename).
    pub fn persist(&self) -> Result<()> {
        let raw = serde_json::to_vec(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");
        self.storage.write(&tmp, &raw)?;
        self.storage.rename(&tmp, &self.path)?;
        Ok(())
    }
}

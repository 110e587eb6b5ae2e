//! Publishing of compute-job outputs.
//!
//! Stream mode forwards one file per logical partition to the
//! partition-manifest store. Block mode renames outputs into the canonical
//! block layout, moves the directory to its partition path, and commits a
//! DataSource record plus an already-synced partition manifest (block mode
//! is a terminal export).

use crate::compute::RetryPolicy;
use crate::error::{GleanerError, Result};
use crate::kvstore::MetaStore;
use crate::storage::{clear_dir, Storage};
use gleaner_protocol::naming::{
    encode_block_filename, encode_block_meta_filename, is_marker_file, partition_repr,
};
use gleaner_protocol::paths::{
    data_source_master_key, partition_manifest_key, publish_finished_key, publish_next_seq_key,
    publish_partition_key,
};
use gleaner_protocol::{DataSource, JobType, PartitionManifest};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Backoff between directory-clear retries.
const CLEAR_RETRY_INTERVAL_SECS: u64 = 10;

/// Publishes compute-job outputs and commits metadata records.
pub struct OutputPublisher {
    storage: Arc<dyn Storage>,
    kvstore: Arc<dyn MetaStore>,
    data_source_name: String,
    publish_dir: String,
    output_partition_num: u64,
    clear_retry: RetryPolicy,
}

impl OutputPublisher {
    pub fn new(
        storage: Arc<dyn Storage>,
        kvstore: Arc<dyn MetaStore>,
        data_source_name: &str,
        publish_dir: &str,
        output_partition_num: u64,
    ) -> Self {
        Self {
            storage,
            kvstore,
            data_source_name: data_source_name.to_string(),
            publish_dir: publish_dir.to_string(),
            output_partition_num,
            // storage contention is assumed to clear eventually
            clear_retry: RetryPolicy::new(Duration::from_secs(CLEAR_RETRY_INTERVAL_SECS), None),
        }
    }

    /// Override clear-retry pacing (tests inject zero-wait policies).
    pub fn with_clear_retry(mut self, policy: RetryPolicy) -> Self {
        self.clear_retry = policy;
        self
    }

    /// Forward the partition files of a completed stream job to the
    /// partition-manifest store. Partitions are assigned by sorted filename
    /// order; a count mismatch is fatal and nothing is published.
    pub fn publish_stream(&self, job_id: u64, output_dir: &Path, job_type: JobType) -> Result<()> {
        let mut fnames: Vec<String> = self
            .storage
            .list(output_dir)?
            .into_iter()
            .filter(|n| !is_marker_file(n))
            .collect();
        if fnames.len() as u64 != self.output_partition_num {
            return Err(GleanerError::PartitionCountMismatch {
                expected: self.output_partition_num,
                actual: fnames,
            });
        }
        fnames.sort();

        let mut published = Vec::with_capacity(fnames.len());
        for (partition_id, fname) in fnames.iter().enumerate() {
            let partition_id = partition_id as u64;
            let file_path = output_dir.join(fname).to_string_lossy().into_owned();
            let seq = self.next_publish_seq(partition_id)?;
            self.kvstore
                .set(
                    &publish_partition_key(&self.publish_dir, partition_id, seq),
                    file_path.as_bytes(),
                )
                .map_err(|e| GleanerError::Kv(format!("publish partition failed: {}", e)))?;
            self.kvstore
                .set(
                    &publish_next_seq_key(&self.publish_dir, partition_id),
                    (seq + 1).to_string().as_bytes(),
                )
                .map_err(|e| GleanerError::Kv(format!("publish sequence bump failed: {}", e)))?;
            if job_type.is_one_shot() {
                self.kvstore
                    .set(&publish_finished_key(&self.publish_dir, partition_id), b"")
                    .map_err(|e| GleanerError::Kv(format!("finish partition failed: {}", e)))?;
            }
            published.push(file_path);
        }

        info!(
            job_id,
            files = published.len(),
            "Published stream partitions"
        );
        for (seq, fpath) in published.iter().enumerate() {
            info!("{}. {}", seq, fpath);
        }
        Ok(())
    }

    /// Cut a block-mode job's temporary output into canonically named
    /// blocks, move it to the partition path, and commit the DataSource and
    /// partition-manifest records.
    pub fn publish_blocks(
        &self,
        job_id: u64,
        data_source: &DataSource,
        temp_dir: &Path,
        base_dir: &Path,
        start_time: &str,
        end_time: &str,
    ) -> Result<()> {
        let mut block_id = 0u64;
        for filename in self.storage.list(temp_dir)? {
            if is_marker_file(&filename) {
                continue;
            }
            let block_name = encode_block_filename(
                &self.data_source_name,
                job_id,
                block_id,
                start_time,
                end_time,
            );
            let meta_name = encode_block_meta_filename(&self.data_source_name, job_id, block_id);
            self.storage
                .rename(&temp_dir.join(&filename), &temp_dir.join(&block_name))?;
            self.storage.write(&temp_dir.join(&meta_name), b"")?;
            block_id += 1;
        }

        let output_path = base_dir.join(partition_repr(job_id));
        clear_dir(self.storage.as_ref(), &output_path, &self.clear_retry)?;
        info!(
            from = %temp_dir.display(),
            to = %output_path.display(),
            blocks = block_id,
            "Moving block output to partition path"
        );
        self.storage.rename(temp_dir, &output_path)?;

        self.write_manifest(&PartitionManifest::finished(job_id))?;
        self.commit_data_source(data_source)?;
        Ok(())
    }

    /// Sequence of the next publish into a partition; successive jobs
    /// append rather than overwrite.
    fn next_publish_seq(&self, partition_id: u64) -> Result<u64> {
        let key = publish_next_seq_key(&self.publish_dir, partition_id);
        let raw = self
            .kvstore
            .get(&key)
            .map_err(|e| GleanerError::Kv(format!("publish sequence read failed: {}", e)))?;
        match raw {
            None => Ok(0),
            Some(bytes) => String::from_utf8(bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| GleanerError::Kv(format!("corrupt publish sequence at {}", key))),
        }
    }

    fn write_manifest(&self, manifest: &PartitionManifest) -> Result<()> {
        let key = partition_manifest_key(&self.data_source_name, manifest.partition_id);
        let value = serde_json::to_vec(manifest)?;
        self.kvstore
            .set(&key, &value)
            .map_err(|e| GleanerError::Kv(format!("manifest commit failed: {}", e)))
    }

    fn commit_data_source(&self, data_source: &DataSource) -> Result<()> {
        let key = data_source_master_key(&self.data_source_name);
        if self
            .kvstore
            .get(&key)
            .map_err(|e| GleanerError::Kv(format!("data source read failed: {}", e)))?
            .is_some()
        {
            info!(name = %self.data_source_name, "Data source exists, overriding");
        }
        let value = serde_json::to_vec(data_source)?;
        self.kvstore
            .set(&key, &value)
            .map_err(|e| GleanerError::Kv(format!("data source commit failed: {}", e)))?;
        info!(name = %self.data_source_name, "Committed data source");
        Ok(())
    }
}

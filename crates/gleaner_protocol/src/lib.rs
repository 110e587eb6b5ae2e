//! Shared protocol types for the Gleaner batch-orchestration pipeline.
//!
//! This crate is the single source of truth for the enums, records, and
//! naming conventions shared by the orchestrator, the compute-job config
//! files it uploads, and the metadata-store records it commits.

pub mod naming;
pub mod paths;
pub mod types;

// Re-export types for convenience
pub use types::{
    CompressionType,
    ComputeJobStatus,
    DataSource,
    DataSourceState,
    DriverSpec,
    ExecutorSpec,
    FileFormat,
    JobFileConfig,
    JobSpec,
    JobType,
    JoinState,
    OutputMode,
    PartitionManifest,
    SyncState,
};

pub use naming::{
    compute_task_name, encode_block_filename, encode_block_meta_filename, is_marker_file,
    partition_repr, BLOCK_SUFFIX, READY_MARKER,
};

pub use paths::{
    block_partition_dir, data_block_dir, data_source_master_key, ledger_path,
    partition_manifest_key, publish_finished_key, publish_next_seq_key, publish_partition_key,
};

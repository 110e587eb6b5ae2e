//! Canonical enums and records shared across the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Canonical Enums (used across all crates)
// ============================================================================

/// On-disk file format for job inputs and outputs.
/// This is the CANONICAL allow-list - anything else is rejected before a
/// job is planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Comma-separated values with a header row
    Csv,
    /// TFRecord framing (default for the join pipeline)
    #[default]
    TfRecord,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::TfRecord => "tfrecord",
        }
    }

    /// All accepted format names, for error messages.
    pub fn allowed() -> &'static [&'static str] {
        &["csv", "tfrecord"]
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "tfrecord" => Ok(FileFormat::TfRecord),
            _ => Err(format!(
                "Invalid file format: '{}'. Expected one of: {}",
                s,
                FileFormat::allowed().join(", ")
            )),
        }
    }
}

/// Kind of join the downstream consumer performs on published partitions.
///
/// A `Psi` job is a one-shot join: partitions are marked finished as soon as
/// they are published. A `Streaming` job keeps partitions open for more data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    #[default]
    Streaming,
    Psi,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Streaming => "streaming",
            JobType::Psi => "psi",
        }
    }

    /// One-shot joins finish their partitions at publish time.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, JobType::Psi)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "streaming" => Ok(JobType::Streaming),
            "psi" => Ok(JobType::Psi),
            _ => Err(format!("Invalid job type: '{}'. Expected: streaming or psi", s)),
        }
    }
}

/// How a compute job lays out its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One file per logical partition, forwarded to the partition-manifest
    /// store for a downstream consumer.
    #[default]
    Stream,
    /// Fixed-size blocks renamed into a canonical layout and committed as a
    /// terminal DataSource export.
    Block,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Stream => "stream",
            OutputMode::Block => "block",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stream" => Ok(OutputMode::Stream),
            "block" => Ok(OutputMode::Block),
            _ => Err(format!("Invalid output mode: '{}'. Expected: stream or block", s)),
        }
    }
}

/// Lifecycle status reported by the external compute-job scheduler.
///
/// `Unknown` is a real state on the wire: the scheduler may race its own
/// bookkeeping right after a create call and report it transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComputeJobStatus {
    #[default]
    Unknown,
    Running,
    Completed,
    Failed,
}

impl ComputeJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeJobStatus::Unknown => "UNKNOWN",
            ComputeJobStatus::Running => "RUNNING",
            ComputeJobStatus::Completed => "COMPLETED",
            ComputeJobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ComputeJobStatus::Completed | ComputeJobStatus::Failed)
    }
}

impl fmt::Display for ComputeJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ComputeJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UNKNOWN" => Ok(ComputeJobStatus::Unknown),
            "RUNNING" => Ok(ComputeJobStatus::Running),
            "COMPLETED" => Ok(ComputeJobStatus::Completed),
            "FAILED" => Ok(ComputeJobStatus::Failed),
            _ => Err(format!("Invalid compute job status: '{}'", s)),
        }
    }
}

/// Output compression passed through to the compute job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    None,
    Gzip,
}

impl CompressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Gzip => "gzip",
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CompressionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(CompressionType::None),
            "gzip" => Ok(CompressionType::Gzip),
            _ => Err(format!("Invalid compression type: '{}'. Expected: none or gzip", s)),
        }
    }
}

// ============================================================================
// Metadata-store records
// ============================================================================

/// Lifecycle of a committed DataSource record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DataSourceState {
    #[default]
    Init,
    Processing,
    Finished,
    Failed,
}

/// Per-partition sync progress, mocked as already-synced for block exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SyncState {
    #[default]
    Unsynced,
    Synced,
}

/// Per-partition join progress, mocked as already-joined for block exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JoinState {
    #[default]
    Unjoined,
    Joined,
}

/// Named, versioned record describing a set of output partitions.
///
/// Committed (full overwrite) to the metadata store when a block-mode job
/// publishes its partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub partition_num: u64,
    pub output_base_dir: String,
    pub state: DataSourceState,
    /// The orchestrator side owns the export.
    pub role: String,
}

impl DataSource {
    pub fn new(name: &str, partition_num: u64, output_base_dir: &str) -> Self {
        Self {
            name: name.to_string(),
            partition_num,
            output_base_dir: output_base_dir.to_string(),
            state: DataSourceState::Init,
            role: "leader".to_string(),
        }
    }
}

/// Per-partition sync/join state record keyed by (data source, partition id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub partition_id: u64,
    pub sync_state: SyncState,
    pub join_state: JoinState,
    /// Rank of the peer that synced this partition; -1 when mocked.
    pub sync_rank_id: i64,
    /// Rank of the peer that joined this partition; -1 when mocked.
    pub join_rank_id: i64,
}

impl PartitionManifest {
    /// Manifest for a terminal block export: nothing left to sync or join.
    pub fn finished(partition_id: u64) -> Self {
        Self {
            partition_id,
            sync_state: SyncState::Synced,
            join_state: JoinState::Joined,
            sync_rank_id: -1,
            join_rank_id: -1,
        }
    }
}

// ============================================================================
// Compute-job submission payloads
// ============================================================================

/// Per-job configuration document uploaded for the compute job to read.
///
/// The compute engine treats this as its only input: a list of files, the
/// formats, and where to put the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: u64,
    pub input_files: Vec<String>,
    pub input_format: FileFormat,
    pub job_type: JobType,
    pub output_mode: OutputMode,
    pub output_format: FileFormat,
    pub output_path: String,
    #[serde(default)]
    pub output_partition_num: u64,
    #[serde(default)]
    pub data_block_threshold: u64,
    #[serde(default)]
    pub compression: CompressionType,
    /// When set, the compute job validates required columns before writing.
    #[serde(default)]
    pub validation: bool,
}

/// Driver resources requested from the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSpec {
    pub cores: u32,
    pub memory: String,
}

impl Default for DriverSpec {
    fn default() -> Self {
        Self {
            cores: 1,
            memory: "2g".to_string(),
        }
    }
}

/// Executor resources requested from the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub cores: u32,
    pub memory: String,
    pub instances: u32,
}

impl Default for ExecutorSpec {
    fn default() -> Self {
        Self {
            cores: 2,
            memory: "4g".to_string(),
            instances: 2,
        }
    }
}

/// Files handed to the scheduler for one submission: the engine image, the
/// entry point it runs, the uploaded [`JobSpec`] path, and an optional
/// dependency bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFileConfig {
    pub image: String,
    pub entry_point: String,
    pub config_path: String,
    #[serde(default)]
    pub dependent_package: String,
}

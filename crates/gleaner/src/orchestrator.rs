//! Top-level orchestration loop.
//!
//! Ties discovery, planning, the compute-job lifecycle, publishing, and the
//! ledger together. Work units are processed strictly sequentially, job id
//! ascending; the ledger is recorded and persisted after each unit before
//! the next one is planned.

use crate::catalog::{CatalogConfig, FileCatalog};
use crate::compute::{ComputeJobRunner, RetryPolicy, SchedulerClient};
use crate::error::{GleanerError, Result};
use crate::kvstore::MetaStore;
use crate::ledger::JobLedger;
use crate::planner::{BatchPlanner, BatchPolicy, PlannedBatch};
use crate::publisher::OutputPublisher;
use crate::storage::{clear_dir, Storage};
use chrono::NaiveDate;
use gleaner_protocol::naming::{compute_task_name, READY_MARKER};
use gleaner_protocol::paths::data_block_dir;
use gleaner_protocol::{
    CompressionType, DataSource, DriverSpec, ExecutorSpec, FileFormat, JobFileConfig, JobSpec,
    JobType, OutputMode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Wait between discovery passes in long-running mode.
const SCAN_INTERVAL_SECS: u64 = 60;

/// Backoff between directory-clear retries.
const CLEAR_RETRY_INTERVAL_SECS: u64 = 10;

/// Date format expected of block-mode input folders.
const FOLDER_DATE_FORMAT: &str = "%Y%m%d";

/// External scheduler connection and submission resources.
#[derive(Debug, Clone, Default)]
pub struct SchedulerSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Compute engine image the scheduler runs.
    pub image: String,
    /// Entry point inside the image.
    pub entry_point: String,
    /// Optional dependency bundle shipped with the job.
    pub dependent_package: String,
    pub driver: DriverSpec,
    pub executor: ExecutorSpec,
    /// Use the fake scheduler client (harness runs).
    pub use_fake: bool,
}

/// Orchestrator configuration. One instance per job name and root path.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Job name; doubles as the data-source name for block exports.
    pub job_name: String,
    /// Root path owning the ledger and all output layouts.
    pub root_path: PathBuf,
    /// Where per-job compute config documents are uploaded.
    pub upload_dir: PathBuf,
    pub job_type: JobType,
    pub output_mode: OutputMode,
    /// Expected partition count of stream-mode output.
    pub output_partition_num: u64,
    /// Partition-manifest store prefix for stream publishing.
    pub publish_dir: String,
    /// Records per block; 0 lets the compute job pick a single block.
    pub data_block_threshold: u64,
    pub compression: CompressionType,
    /// Require a ready marker next to input files.
    pub check_ready_marker: bool,
    /// Optional glob on full input paths.
    pub wildcard: Option<String>,
    /// One folder per work unit.
    pub single_folder: bool,
    /// Bounded-batch limit on files per work unit.
    pub files_per_job_limit: Option<usize>,
    /// Keep polling for new inputs instead of exiting after one pass.
    pub long_running: bool,
    /// Ask the compute job to validate required columns.
    pub validation: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub scheduler: SchedulerSettings,
}

/// The orchestration loop. Single-writer over its root path's ledger;
/// running two instances against the same root is unsupported.
pub struct Orchestrator {
    config: OrchestratorConfig,
    storage: Arc<dyn Storage>,
    client: Arc<dyn SchedulerClient>,
    catalog: FileCatalog,
    planner: BatchPlanner,
    ledger: JobLedger,
    runner: ComputeJobRunner,
    publisher: OutputPublisher,
    clear_retry: RetryPolicy,
    scan_wait: RetryPolicy,
    num_allocated: u64,
    num_processing: usize,
}

impl Orchestrator {
    pub fn new(
        mut config: OrchestratorConfig,
        storage: Arc<dyn Storage>,
        kvstore: Arc<dyn MetaStore>,
        client: Arc<dyn SchedulerClient>,
    ) -> Result<Self> {
        // block output publishes one dated partition per job
        if config.output_mode == OutputMode::Block {
            config.single_folder = true;
        }

        let catalog = FileCatalog::new(
            storage.clone(),
            CatalogConfig {
                wildcard: config.wildcard.clone(),
                require_ready_marker: config.check_ready_marker,
                start_date: config.start_date,
                end_date: config.end_date,
            },
        )?;
        let planner = BatchPlanner::new(BatchPolicy {
            single_folder: config.single_folder,
            files_per_job_limit: config.files_per_job_limit,
        });
        let ledger = JobLedger::load(storage.clone(), &config.root_path)?;
        let runner = ComputeJobRunner::new(client.clone());
        let publisher = OutputPublisher::new(
            storage.clone(),
            kvstore,
            &config.job_name,
            &config.publish_dir,
            config.output_partition_num,
        );

        Ok(Self {
            config,
            storage,
            client,
            catalog,
            planner,
            ledger,
            runner,
            publisher,
            clear_retry: RetryPolicy::new(Duration::from_secs(CLEAR_RETRY_INTERVAL_SECS), None),
            scan_wait: RetryPolicy::new(Duration::from_secs(SCAN_INTERVAL_SECS), None),
            num_allocated: 0,
            num_processing: 0,
        })
    }

    /// Override every pacing policy at once (tests inject zero waits).
    pub fn with_zero_wait(mut self) -> Self {
        self.runner = ComputeJobRunner::with_policies(
            self.client.clone(),
            RetryPolicy::no_wait(),
            RetryPolicy::no_wait_bounded(5),
        );
        self.publisher = self.publisher.with_clear_retry(RetryPolicy::no_wait());
        self.clear_retry = RetryPolicy::no_wait();
        self.scan_wait = RetryPolicy::no_wait();
        self
    }

    /// Run the orchestration loop over a comma-joined list of input roots.
    ///
    /// Both formats are validated against the allow-list before any work
    /// happens; an invalid format is fatal.
    pub fn run(&mut self, input_paths: &str, input_format: &str, output_format: &str) -> Result<()> {
        let input_format: FileFormat =
            input_format
                .parse()
                .map_err(|message| GleanerError::InvalidFormat {
                    role: "input",
                    message,
                })?;
        let output_format: FileFormat =
            output_format
                .parse()
                .map_err(|message| GleanerError::InvalidFormat {
                    role: "output",
                    message,
                })?;

        let roots: Vec<String> = input_paths
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if roots.is_empty() {
            return Err(GleanerError::Config("no input paths given".to_string()));
        }

        loop {
            let mut groups = self.catalog.list(&roots, self.ledger.processed())?;
            self.num_allocated = self.ledger.processed().len() as u64;

            let mut planned_any = false;
            while let Some(batch) = self.planner.next_unit(&mut groups) {
                planned_any = true;
                let job_id = self.ledger.next_job_id();
                self.num_processing = batch.files.len();
                self.num_allocated += batch.files.len() as u64;

                let started = Instant::now();
                self.run_unit(job_id, &batch, input_format, output_format)?;
                info!(
                    job_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Work unit finished"
                );

                self.ledger.record(job_id, &batch.files);
                self.ledger.persist()?;
                self.num_processing = 0;
            }

            if !self.config.long_running {
                return Ok(());
            }
            if !planned_any {
                info!("No new files to process, waiting {}s", SCAN_INTERVAL_SECS);
                self.scan_wait.sleep();
            }
        }
    }

    fn run_unit(
        &self,
        job_id: u64,
        batch: &PlannedBatch,
        input_format: FileFormat,
        output_format: FileFormat,
    ) -> Result<()> {
        info!(
            job_id,
            folder = %batch.folder_label,
            files = batch.files.len(),
            "Processing work unit"
        );
        match self.config.output_mode {
            OutputMode::Stream => self.run_stream_unit(job_id, batch, input_format, output_format),
            OutputMode::Block => self.run_block_unit(job_id, batch, input_format, output_format),
        }
    }

    fn run_stream_unit(
        &self,
        job_id: u64,
        batch: &PlannedBatch,
        input_format: FileFormat,
        output_format: FileFormat,
    ) -> Result<()> {
        let output_path = self.config.root_path.join(job_id.to_string());
        clear_dir(self.storage.as_ref(), &output_path, &self.clear_retry)?;

        let spec = JobSpec {
            job_id,
            input_files: batch.files.clone(),
            input_format,
            job_type: self.config.job_type,
            output_mode: OutputMode::Stream,
            output_format,
            output_path: output_path.to_string_lossy().into_owned(),
            output_partition_num: self.config.output_partition_num,
            data_block_threshold: 0,
            compression: self.config.compression,
            validation: self.config.validation,
        };
        let config_path = self.write_job_spec(&spec)?;
        self.launch_compute_job(job_id, &config_path)?;

        if !self.storage.exists(&output_path.join(READY_MARKER))? {
            warn!(job_id, "Encountered empty inputs, nothing to publish");
            return Ok(());
        }
        self.publisher
            .publish_stream(job_id, &output_path, self.config.job_type)
    }

    fn run_block_unit(
        &self,
        job_id: u64,
        batch: &PlannedBatch,
        input_format: FileFormat,
        output_format: FileFormat,
    ) -> Result<()> {
        let data_source = DataSource::new(
            &self.config.job_name,
            job_id + 1,
            &self.config.root_path.to_string_lossy(),
        );
        let base_dir = data_block_dir(&self.config.root_path);
        let temp_dir = base_dir.join(job_id.to_string());
        clear_dir(self.storage.as_ref(), &temp_dir, &self.clear_retry)?;

        let spec = JobSpec {
            job_id,
            input_files: batch.files.clone(),
            input_format,
            job_type: self.config.job_type,
            output_mode: OutputMode::Block,
            output_format,
            output_path: temp_dir.to_string_lossy().into_owned(),
            output_partition_num: 0,
            data_block_threshold: self.config.data_block_threshold,
            compression: self.config.compression,
            validation: self.config.validation,
        };
        let config_path = self.write_job_spec(&spec)?;
        self.launch_compute_job(job_id, &config_path)?;

        if !self.storage.exists(&temp_dir.join(READY_MARKER))? {
            warn!(job_id, "Encountered empty inputs, no blocks generated");
            return Ok(());
        }

        let date = NaiveDate::parse_from_str(&batch.folder_label, FOLDER_DATE_FORMAT).map_err(
            |_| GleanerError::MalformedDateFolder {
                folder: batch.folder_label.clone(),
                expected: FOLDER_DATE_FORMAT,
            },
        )?;
        let start_time = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is a valid time")
            .format("%Y%m%d%H%M%S")
            .to_string();
        let end_time = date
            .and_hms_opt(23, 59, 59)
            .expect("end of day is a valid time")
            .format("%Y%m%d%H%M%S")
            .to_string();

        self.publisher.publish_blocks(
            job_id,
            &data_source,
            &temp_dir,
            &base_dir,
            &start_time,
            &end_time,
        )
    }

    /// Upload the per-job compute config document; the external job reads
    /// it as its only input.
    fn write_job_spec(&self, spec: &JobSpec) -> Result<PathBuf> {
        let path = self
            .config
            .upload_dir
            .join(format!("job_{}.json", spec.job_id));
        self.storage.write(&path, &serde_json::to_vec_pretty(spec)?)?;
        Ok(path)
    }

    fn launch_compute_job(&self, job_id: u64, config_path: &Path) -> Result<()> {
        let task_name = compute_task_name(&self.config.job_name, job_id);
        let scheduler = &self.config.scheduler;
        let file_config = JobFileConfig {
            image: scheduler.image.clone(),
            entry_point: scheduler.entry_point.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            dependent_package: scheduler.dependent_package.clone(),
        };
        self.runner.run(
            &task_name,
            &file_config,
            &scheduler.driver,
            &scheduler.executor,
            &|| self.progress(),
        )
    }

    /// Progress summary logged while a compute job runs.
    fn progress(&self) -> String {
        let total = self.catalog.total_matched();
        let processed = self.num_allocated.saturating_sub(self.num_processing as u64);
        format!(
            "Input files processed: {}/{}, Processing: {}",
            processed, total, self.num_processing
        )
    }
}

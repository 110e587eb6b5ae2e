//! Gleaner launcher.
//!
//! `gleaner run` drives the batch-orchestration loop; `gleaner sense`
//! blocks until an input location is ready (for outer schedulers to gate
//! on).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gleaner::{
    sensor, FakeSchedulerClient, FileMetaStore, LocalStorage, MetaStore, Orchestrator,
    OrchestratorConfig, RestSchedulerClient, RetryPolicy, SchedulerClient, SchedulerSettings,
};
use gleaner_logging::{init_logging, LogConfig};
use gleaner_protocol::{CompressionType, DriverSpec, ExecutorSpec, JobType, OutputMode};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Poll interval of the readiness sensor.
const SENSE_INTERVAL_SECS: u64 = 10;

/// Date format of --start-date/--end-date.
const DATE_FORMAT: &str = "%Y%m%d";

#[derive(Parser, Debug)]
#[command(name = "gleaner", about = "Batch orchestrator for the federated-data-join pipeline")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Also write logs to a daily-rotated file under the Gleaner home
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover new inputs, run one compute job per batch, publish outputs
    Run {
        /// Comma-joined list of input root locations
        #[arg(long)]
        input: String,

        /// Input file format (csv, tfrecord)
        #[arg(long, default_value = "tfrecord")]
        input_format: String,

        /// Output file format (csv, tfrecord)
        #[arg(long, default_value = "tfrecord")]
        output_format: String,

        /// Job name; doubles as the data-source name for block exports
        #[arg(long)]
        job_name: String,

        /// Root path owning the ledger and output layouts
        #[arg(long)]
        root_path: PathBuf,

        /// Where per-job compute configs are uploaded (default: {root}/upload)
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        /// Directory backing the metadata store (default: {root}/meta/kvstore)
        #[arg(long)]
        metadata_dir: Option<PathBuf>,

        /// Join kind of the downstream consumer (streaming, psi)
        #[arg(long, default_value = "streaming")]
        job_type: String,

        /// Output layout (stream, block)
        #[arg(long, default_value = "stream")]
        output_mode: String,

        /// Expected partition count of stream-mode output
        #[arg(long, default_value_t = 1)]
        output_partition_num: u64,

        /// Partition-manifest store prefix for stream publishing
        #[arg(long, default_value = "portal_publish_dir")]
        publish_dir: String,

        /// Records per block (0 = single block per job)
        #[arg(long, default_value_t = 0)]
        data_block_threshold: u64,

        /// Output compression (none, gzip)
        #[arg(long, default_value = "none")]
        compression: String,

        /// Skip the ready-marker requirement on input folders
        #[arg(long)]
        no_ready_marker_check: bool,

        /// Glob applied to full input paths (e.g. "*.gz")
        #[arg(long)]
        wildcard: Option<String>,

        /// Process exactly one folder per job
        #[arg(long)]
        single_folder: bool,

        /// Bound on files per job when batching folders
        #[arg(long)]
        files_per_job_limit: Option<usize>,

        /// Keep polling for new inputs instead of exiting after one pass
        #[arg(long)]
        long_running: bool,

        /// Ask the compute job to validate required columns
        #[arg(long)]
        validation: bool,

        /// Keep only folders dated on or after this day (YYYYMMDD)
        #[arg(long)]
        start_date: Option<String>,

        /// Keep only folders dated before this day (YYYYMMDD, exclusive)
        #[arg(long)]
        end_date: Option<String>,

        /// Compute platform console URL
        #[arg(long, default_value = "")]
        scheduler_url: String,

        /// Console account
        #[arg(long, default_value = "")]
        scheduler_username: String,

        /// Console password
        #[arg(long, env = "GLEANER_SCHEDULER_PASSWORD", default_value = "")]
        scheduler_password: String,

        /// Compute engine image
        #[arg(long, default_value = "")]
        image: String,

        /// Entry point the engine runs inside the image
        #[arg(long, default_value = "")]
        entry_point: String,

        /// Optional dependency bundle shipped with the job
        #[arg(long, default_value = "")]
        dependent_package: String,

        #[arg(long, default_value_t = 1)]
        driver_cores: u32,

        #[arg(long, default_value = "2g")]
        driver_memory: String,

        #[arg(long, default_value_t = 2)]
        executor_cores: u32,

        #[arg(long, default_value = "4g")]
        executor_memory: String,

        #[arg(long, default_value_t = 2)]
        executor_instances: u32,

        /// Use the fake scheduler client (harness runs)
        #[arg(long)]
        use_fake_scheduler: bool,
    },

    /// Block until an input location is ready
    Sense {
        /// Input location to wait on
        #[arg(long)]
        input_path: PathBuf,

        /// Wait for the {input}/{today - N days} partition instead
        #[arg(long)]
        date_offset: Option<i64>,

        /// Wait for the folder itself rather than its ready marker
        #[arg(long)]
        no_ready_marker_check: bool,
    },
}

fn parse_date(value: &Option<String>, flag: &str) -> Result<Option<chrono::NaiveDate>> {
    match value {
        None => Ok(None),
        Some(raw) => chrono::NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Some)
            .with_context(|| format!("{} must be {}, got '{}'", flag, DATE_FORMAT, raw)),
    }
}

fn run_orchestrator(cli_run: Commands) -> Result<()> {
    let Commands::Run {
        input,
        input_format,
        output_format,
        job_name,
        root_path,
        upload_dir,
        metadata_dir,
        job_type,
        output_mode,
        output_partition_num,
        publish_dir,
        data_block_threshold,
        compression,
        no_ready_marker_check,
        wildcard,
        single_folder,
        files_per_job_limit,
        long_running,
        validation,
        start_date,
        end_date,
        scheduler_url,
        scheduler_username,
        scheduler_password,
        image,
        entry_point,
        dependent_package,
        driver_cores,
        driver_memory,
        executor_cores,
        executor_memory,
        executor_instances,
        use_fake_scheduler,
    } = cli_run
    else {
        unreachable!("dispatched on Run");
    };

    let job_type: JobType = job_type.parse().map_err(anyhow::Error::msg)?;
    let output_mode: OutputMode = output_mode.parse().map_err(anyhow::Error::msg)?;
    let compression: CompressionType = compression.parse().map_err(anyhow::Error::msg)?;
    let start_date = parse_date(&start_date, "--start-date")?;
    let end_date = parse_date(&end_date, "--end-date")?;

    if !use_fake_scheduler && scheduler_url.is_empty() {
        bail!("--scheduler-url is required unless --use-fake-scheduler is set");
    }

    let storage = Arc::new(LocalStorage);
    let metadata_dir = metadata_dir.unwrap_or_else(|| root_path.join("meta").join("kvstore"));
    let kvstore: Arc<dyn MetaStore> = Arc::new(FileMetaStore::new(storage.clone(), metadata_dir));
    let client: Arc<dyn SchedulerClient> = if use_fake_scheduler {
        Arc::new(FakeSchedulerClient::new())
    } else {
        Arc::new(RestSchedulerClient::new(
            &scheduler_url,
            &scheduler_username,
            &scheduler_password,
        )?)
    };

    let config = OrchestratorConfig {
        job_name,
        upload_dir: upload_dir.unwrap_or_else(|| root_path.join("upload")),
        root_path,
        job_type,
        output_mode,
        output_partition_num,
        publish_dir,
        data_block_threshold,
        compression,
        check_ready_marker: !no_ready_marker_check,
        wildcard,
        single_folder,
        files_per_job_limit,
        long_running,
        validation,
        start_date,
        end_date,
        scheduler: SchedulerSettings {
            url: scheduler_url,
            username: scheduler_username,
            password: scheduler_password,
            image,
            entry_point,
            dependent_package,
            driver: DriverSpec {
                cores: driver_cores,
                memory: driver_memory,
            },
            executor: ExecutorSpec {
                cores: executor_cores,
                memory: executor_memory,
                instances: executor_instances,
            },
            use_fake: use_fake_scheduler,
        },
    };

    let mut orchestrator = Orchestrator::new(config, storage, kvstore, client)?;
    orchestrator.run(&input, &input_format, &output_format)?;
    Ok(())
}

fn run_sensor(input_path: PathBuf, date_offset: Option<i64>, no_ready_marker_check: bool) -> Result<()> {
    let config = sensor::SensorConfig {
        input_path,
        date_offset_days: date_offset,
        check_ready_marker: !no_ready_marker_check,
    };
    let policy = RetryPolicy::new(Duration::from_secs(SENSE_INTERVAL_SECS), None);
    let target = sensor::wait_for_input(&LocalStorage, &config, &policy)?;
    info!(target = %target.display(), "Ready");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "gleaner",
        verbose: cli.verbose,
        log_to_file: cli.log_file,
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        run @ Commands::Run { .. } => run_orchestrator(run),
        Commands::Sense {
            input_path,
            date_offset,
            no_ready_marker_check,
        } => run_sensor(input_path, date_offset, no_ready_marker_check),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

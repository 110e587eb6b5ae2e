//! Integration tests for the Gleaner orchestration loop.
//!
//! Drives the full pipeline: discovery, planning, a stand-in compute
//! engine, publishing, and the persisted ledger.

use gleaner::{
    JobLedger, LocalStorage, MemoryMetaStore, MetaStore, Orchestrator, OrchestratorConfig,
    SchedulerClient, SchedulerSettings,
};
use gleaner_protocol::{
    ComputeJobStatus, DataSource, DataSourceState, DriverSpec, ExecutorSpec, JobFileConfig,
    JobSpec, JobType, OutputMode,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Stand-in for the external compute engine: on create it reads the
/// uploaded job config, writes output files plus the ready marker into the
/// configured output path, and reports completion on the first poll.
struct EngineClient {
    /// Files written for a block-mode job.
    blocks_per_job: usize,
    /// Override the partition count a stream job actually produces
    /// (simulates a compute-layer bug).
    stream_partitions_override: Option<usize>,
    /// Skip writing outputs and the marker (simulates empty inputs).
    produce_output: bool,
    created: Mutex<Vec<String>>,
}

impl EngineClient {
    fn new() -> Self {
        Self {
            blocks_per_job: 1,
            stream_partitions_override: None,
            produce_output: true,
            created: Mutex::new(Vec::new()),
        }
    }

    fn created_jobs(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl SchedulerClient for EngineClient {
    fn create(
        &self,
        name: &str,
        file_config: &JobFileConfig,
        _driver: &DriverSpec,
        _executor: &ExecutorSpec,
    ) -> gleaner::Result<bool> {
        self.created.lock().unwrap().push(name.to_string());

        let raw = std::fs::read_to_string(&file_config.config_path).unwrap();
        let spec: JobSpec = serde_json::from_str(&raw).unwrap();
        let out = Path::new(&spec.output_path);
        std::fs::create_dir_all(out).unwrap();

        if self.produce_output {
            let count = match spec.output_mode {
                OutputMode::Stream => self
                    .stream_partitions_override
                    .unwrap_or(spec.output_partition_num as usize),
                OutputMode::Block => self.blocks_per_job,
            };
            for i in 0..count {
                std::fs::write(out.join(format!("part-{:05}", i)), "data").unwrap();
            }
            std::fs::write(out.join("_SUCCESS"), "").unwrap();
        }
        Ok(true)
    }

    fn get(&self, _name: &str) -> gleaner::Result<(ComputeJobStatus, String)> {
        Ok((ComputeJobStatus::Completed, "done".to_string()))
    }

    fn delete(&self, _name: &str) -> gleaner::Result<bool> {
        Ok(true)
    }

    fn fetch_logs(&self, _name: &str) -> gleaner::Result<String> {
        Ok(String::new())
    }
}

fn write_input(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn config(root: &Path, output_mode: OutputMode, output_partition_num: u64) -> OrchestratorConfig {
    OrchestratorConfig {
        job_name: "events".to_string(),
        root_path: root.to_path_buf(),
        upload_dir: root.join("upload"),
        job_type: JobType::Streaming,
        output_mode,
        output_partition_num,
        publish_dir: "portal_publish_dir".to_string(),
        data_block_threshold: 0,
        compression: Default::default(),
        check_ready_marker: true,
        wildcard: None,
        single_folder: false,
        files_per_job_limit: None,
        long_running: false,
        validation: false,
        start_date: None,
        end_date: None,
        scheduler: SchedulerSettings::default(),
    }
}

fn orchestrator(
    config: OrchestratorConfig,
    kvstore: Arc<MemoryMetaStore>,
    client: Arc<EngineClient>,
) -> Orchestrator {
    Orchestrator::new(config, Arc::new(LocalStorage), kvstore, client)
        .unwrap()
        .with_zero_wait()
}

#[test]
fn test_stream_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    write_input(&input, "20240101/a.txt", "a");
    write_input(&input, "20240101/b.txt", "b");
    write_input(&input, "20240101/_SUCCESS", "");

    let kvstore = Arc::new(MemoryMetaStore::new());
    let client = Arc::new(EngineClient::new());
    let mut orch = orchestrator(config(&root, OutputMode::Stream, 2), kvstore.clone(), client.clone());
    orch.run(&input.to_string_lossy(), "csv", "tfrecord").unwrap();

    // one compute job, deterministic handle name
    assert_eq!(client.created_jobs(), vec!["raw-data-events-0"]);

    // both partitions published, sorted order
    let part0 = kvstore
        .get("portal_publish_dir/partition_0000/00000000")
        .unwrap()
        .unwrap();
    assert!(String::from_utf8(part0).unwrap().ends_with("part-00000"));
    assert!(kvstore
        .get("portal_publish_dir/partition_0001/00000000")
        .unwrap()
        .is_some());

    // ledger persisted: both inputs processed, next id advanced
    let ledger = JobLedger::load(Arc::new(LocalStorage), &root).unwrap();
    assert_eq!(ledger.next_job_id(), 1);
    assert_eq!(ledger.processed().len(), 2);
}

#[test]
fn test_no_double_processing_across_restarts() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    write_input(&input, "20240101/a.txt", "a");
    write_input(&input, "20240101/_SUCCESS", "");

    let kvstore = Arc::new(MemoryMetaStore::new());
    let client = Arc::new(EngineClient::new());
    let mut orch = orchestrator(config(&root, OutputMode::Stream, 1), kvstore.clone(), client.clone());
    orch.run(&input.to_string_lossy(), "csv", "csv").unwrap();
    assert_eq!(client.created_jobs().len(), 1);

    // a fresh orchestrator over the same root sees nothing new
    let client2 = Arc::new(EngineClient::new());
    let mut orch2 = orchestrator(config(&root, OutputMode::Stream, 1), kvstore, client2.clone());
    orch2.run(&input.to_string_lossy(), "csv", "csv").unwrap();
    assert!(client2.created_jobs().is_empty());
}

#[test]
fn test_job_ids_increase_across_restarts() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    write_input(&input, "20240101/a.txt", "a");
    write_input(&input, "20240101/_SUCCESS", "");

    let kvstore = Arc::new(MemoryMetaStore::new());
    let client = Arc::new(EngineClient::new());
    let mut orch = orchestrator(config(&root, OutputMode::Stream, 1), kvstore.clone(), client.clone());
    orch.run(&input.to_string_lossy(), "csv", "csv").unwrap();
    assert_eq!(client.created_jobs(), vec!["raw-data-events-0"]);

    // new inputs arrive; a restarted orchestrator must not reuse job id 0
    write_input(&input, "20240102/c.txt", "c");
    write_input(&input, "20240102/_SUCCESS", "");
    let client2 = Arc::new(EngineClient::new());
    let mut orch2 = orchestrator(config(&root, OutputMode::Stream, 1), kvstore, client2.clone());
    orch2.run(&input.to_string_lossy(), "csv", "csv").unwrap();
    assert_eq!(client2.created_jobs(), vec!["raw-data-events-1"]);
}

#[test]
fn test_block_mode_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    write_input(&input, "20240115/a.dat", "a");
    write_input(&input, "20240115/b.dat", "b");
    write_input(&input, "20240115/_SUCCESS", "");

    let kvstore = Arc::new(MemoryMetaStore::new());
    let client = Arc::new(EngineClient::new());
    let mut orch = orchestrator(config(&root, OutputMode::Block, 0), kvstore.clone(), client.clone());
    orch.run(&input.to_string_lossy(), "tfrecord", "tfrecord")
        .unwrap();

    let partition = root.join("data_source/data_block/partition_0000");
    assert!(partition
        .join("events.partition_0000.00000000.20240115000000-20240115235959.data")
        .exists());
    assert!(partition.join("events.partition_0000.00000000.meta").exists());

    let master: DataSource =
        serde_json::from_slice(&kvstore.get("data_source/events/master").unwrap().unwrap())
            .unwrap();
    assert_eq!(master.state, DataSourceState::Init);
    assert_eq!(master.partition_num, 1);

    assert!(kvstore
        .get("data_source/events/partition_manifest/partition_0000")
        .unwrap()
        .is_some());
}

#[test]
fn test_invalid_format_is_fatal_before_any_work() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    write_input(&input, "20240101/a.txt", "a");
    write_input(&input, "20240101/_SUCCESS", "");

    let kvstore = Arc::new(MemoryMetaStore::new());
    let client = Arc::new(EngineClient::new());
    let mut orch = orchestrator(config(&root, OutputMode::Stream, 1), kvstore, client.clone());

    let err = orch
        .run(&input.to_string_lossy(), "parquet", "csv")
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(client.created_jobs().is_empty());
    // nothing was persisted either
    assert!(!root.join("meta/ledger.json").exists());
}

#[test]
fn test_partition_mismatch_aborts_before_ledger_update() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    write_input(&input, "20240101/a.txt", "a");
    write_input(&input, "20240101/_SUCCESS", "");

    let kvstore = Arc::new(MemoryMetaStore::new());
    let mut client = EngineClient::new();
    client.stream_partitions_override = Some(3);
    let client = Arc::new(client);

    // expects 4 partitions, the engine produced 3
    let mut orch = orchestrator(config(&root, OutputMode::Stream, 4), kvstore.clone(), client);
    let err = orch
        .run(&input.to_string_lossy(), "csv", "csv")
        .unwrap_err();
    assert!(err.is_fatal());
    // no partial publish, no progress recorded
    assert!(kvstore.keys().is_empty());
    assert!(!root.join("meta/ledger.json").exists());
}

#[test]
fn test_empty_output_skips_publish_but_records_progress() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    write_input(&input, "20240101/a.txt", "a");
    write_input(&input, "20240101/_SUCCESS", "");

    let kvstore = Arc::new(MemoryMetaStore::new());
    let mut client = EngineClient::new();
    client.produce_output = false;
    let client = Arc::new(client);

    let mut orch = orchestrator(config(&root, OutputMode::Stream, 1), kvstore.clone(), client);
    orch.run(&input.to_string_lossy(), "csv", "csv").unwrap();

    // not an error: nothing published, but the inputs count as processed
    assert!(kvstore.keys().is_empty());
    let ledger = JobLedger::load(Arc::new(LocalStorage), &root).unwrap();
    assert_eq!(ledger.processed().len(), 1);
    assert_eq!(ledger.next_job_id(), 1);
}

#[test]
fn test_bounded_batching_splits_folders_into_jobs() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let root = tmp.path().join("portal");
    for day in ["20240101", "20240102", "20240103"] {
        write_input(&input, &format!("{}/a.txt", day), "a");
        write_input(&input, &format!("{}/b.txt", day), "b");
        write_input(&input, &format!("{}/_SUCCESS", day), "");
    }

    let kvstore = Arc::new(MemoryMetaStore::new());
    let client = Arc::new(EngineClient::new());
    let mut cfg = config(&root, OutputMode::Stream, 1);
    cfg.files_per_job_limit = Some(4);
    let mut orch = orchestrator(cfg, kvstore, client.clone());
    orch.run(&input.to_string_lossy(), "csv", "csv").unwrap();

    // 6 files with a limit of 4: two folders in job 0, one in job 1
    assert_eq!(
        client.created_jobs(),
        vec!["raw-data-events-0", "raw-data-events-1"]
    );
    let ledger = JobLedger::load(Arc::new(LocalStorage), &root).unwrap();
    assert_eq!(ledger.processed().len(), 6);
    assert_eq!(ledger.next_job_id(), 2);
}

//! Gleaner - Core Library
//!
//! Recurring batch orchestration for the federated-data-join pipeline:
//! discovers newly arrived input files, batches them into bounded work
//! units, drives an external compute job per unit, publishes the output
//! partitions, and durably records progress in a job ledger.

pub mod catalog;
pub mod compute;
pub mod error;
pub mod kvstore;
pub mod ledger;
pub mod orchestrator;
pub mod planner;
pub mod publisher;
pub mod sensor;
pub mod storage;

pub use catalog::{CatalogConfig, FileCatalog};
pub use compute::{
    ComputeJobRunner, FakeSchedulerClient, RestSchedulerClient, RetryPolicy, SchedulerClient,
};
pub use error::{GleanerError, Result};
pub use kvstore::{FileMetaStore, MemoryMetaStore, MetaStore};
pub use ledger::JobLedger;
pub use orchestrator::{Orchestrator, OrchestratorConfig, SchedulerSettings};
pub use planner::{BatchPlanner, BatchPolicy, PlannedBatch};
pub use publisher::OutputPublisher;
pub use storage::{clear_dir, LocalStorage, Storage};

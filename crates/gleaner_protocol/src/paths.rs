//! Path and metadata-store key derivation.
//!
//! Filesystem layout under a job's root path:
//!
//! ```text
//! {root}/meta/ledger.json                  persisted job ledger
//! {root}/{job_id}/                         stream-mode job output
//! {root}/data_source/data_block/           block-mode output base
//!     {partition_repr}/                    canonical partition directory
//! ```
//!
//! Metadata-store keys are hierarchical strings scoped by data-source name
//! and partition id.

use crate::naming::partition_repr;
use std::path::{Path, PathBuf};

/// Persisted ledger location for a root path.
pub fn ledger_path(root: &Path) -> PathBuf {
    root.join("meta").join("ledger.json")
}

/// Base directory for block-mode output partitions.
pub fn data_block_dir(root: &Path) -> PathBuf {
    root.join("data_source").join("data_block")
}

/// Canonical directory for one published block partition.
pub fn block_partition_dir(root: &Path, partition_id: u64) -> PathBuf {
    data_block_dir(root).join(partition_repr(partition_id))
}

/// Key holding the DataSource master record.
pub fn data_source_master_key(data_source_name: &str) -> String {
    format!("data_source/{}/master", data_source_name)
}

/// Key holding one partition's manifest record.
pub fn partition_manifest_key(data_source_name: &str, partition_id: u64) -> String {
    format!(
        "data_source/{}/partition_manifest/{}",
        data_source_name,
        partition_repr(partition_id)
    )
}

/// Key publishing one output file of a stream partition. `seq` orders
/// multiple publishes into the same partition.
pub fn publish_partition_key(publish_dir: &str, partition_id: u64, seq: u64) -> String {
    format!("{}/{}/{:08}", publish_dir, partition_repr(partition_id), seq)
}

/// Sentinel key marking a stream partition as finished (one-shot joins).
pub fn publish_finished_key(publish_dir: &str, partition_id: u64) -> String {
    format!("{}/{}/_FINISHED", publish_dir, partition_repr(partition_id))
}

/// Counter key holding the next publish sequence for a partition.
pub fn publish_next_seq_key(publish_dir: &str, partition_id: u64) -> String {
    format!("{}/{}/_NEXT", publish_dir, partition_repr(partition_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_path_under_meta() {
        assert_eq!(
            ledger_path(Path::new("/data/portal")),
            PathBuf::from("/data/portal/meta/ledger.json")
        );
    }

    #[test]
    fn block_partition_layout() {
        assert_eq!(
            block_partition_dir(Path::new("/data/portal"), 2),
            PathBuf::from("/data/portal/data_source/data_block/partition_0002")
        );
    }

    #[test]
    fn kvstore_keys_are_scoped() {
        assert_eq!(data_source_master_key("events"), "data_source/events/master");
        assert_eq!(
            partition_manifest_key("events", 5),
            "data_source/events/partition_manifest/partition_0005"
        );
        assert_eq!(
            publish_partition_key("portal/publish", 1, 0),
            "portal/publish/partition_0001/00000000"
        );
        assert_eq!(
            publish_finished_key("portal/publish", 1),
            "portal/publish/partition_0001/_FINISHED"
        );
        assert_eq!(
            publish_next_seq_key("portal/publish", 1),
            "portal/publish/partition_0001/_NEXT"
        );
    }
}

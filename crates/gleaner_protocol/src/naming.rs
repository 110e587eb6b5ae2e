//! Canonical names for partitions, blocks, and compute tasks.

/// Sentinel file signaling that all sibling files in a directory are
/// complete and safe to read.
pub const READY_MARKER: &str = "_SUCCESS";

/// Suffix for data block files.
pub const BLOCK_SUFFIX: &str = ".data";

/// Suffix for data block companion metadata markers.
pub const BLOCK_META_SUFFIX: &str = ".meta";

/// Canonical partition directory representation: `partition_0007`.
pub fn partition_repr(partition_id: u64) -> String {
    format!("partition_{:04}", partition_id)
}

/// External compute task name for one work unit. Deterministic so a crashed
/// orchestrator resubmits under the same handle and clears stale state.
pub fn compute_task_name(job_name: &str, job_id: u64) -> String {
    format!("raw-data-{}-{}", job_name, job_id)
}

/// Canonical data block filename:
/// `{name}.{partition_repr}.{block_id:08}.{start}-{end}.data`
/// where start/end are `YYYYMMDDHHMMSS`.
pub fn encode_block_filename(
    data_source_name: &str,
    partition_id: u64,
    block_id: u64,
    start_time: &str,
    end_time: &str,
) -> String {
    format!(
        "{}.{}.{:08}.{}-{}{}",
        data_source_name,
        partition_repr(partition_id),
        block_id,
        start_time,
        end_time,
        BLOCK_SUFFIX
    )
}

/// Companion metadata-marker filename for a block.
pub fn encode_block_meta_filename(
    data_source_name: &str,
    partition_id: u64,
    block_id: u64,
) -> String {
    format!(
        "{}.{}.{:08}{}",
        data_source_name,
        partition_repr(partition_id),
        block_id,
        BLOCK_META_SUFFIX
    )
}

/// Marker/tmp files (ready markers, hidden files) are never data.
pub fn is_marker_file(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_repr_pads_to_four() {
        assert_eq!(partition_repr(0), "partition_0000");
        assert_eq!(partition_repr(42), "partition_0042");
        assert_eq!(partition_repr(12345), "partition_12345");
    }

    #[test]
    fn block_filename_layout() {
        let name = encode_block_filename("events", 3, 0, "20240115000000", "20240115235959");
        assert_eq!(
            name,
            "events.partition_0003.00000000.20240115000000-20240115235959.data"
        );
    }

    #[test]
    fn block_meta_filename_layout() {
        let name = encode_block_meta_filename("events", 3, 1);
        assert_eq!(name, "events.partition_0003.00000001.meta");
    }

    #[test]
    fn task_name_is_deterministic() {
        assert_eq!(compute_task_name("events", 9), "raw-data-events-9");
        assert_eq!(compute_task_name("events", 9), compute_task_name("events", 9));
    }

    #[test]
    fn marker_files() {
        assert!(is_marker_file("_SUCCESS"));
        assert!(is_marker_file(".hidden"));
        assert!(!is_marker_file("part-00000"));
    }
}

//! Batching of discovered folder groups into bounded work units.
//!
//! Folders are consumed in lexicographic order. The planner drains the
//! group map handed to it; a fresh catalog pass is required to restart.

use std::collections::BTreeMap;
use tracing::info;

/// Batching policy.
#[derive(Debug, Clone, Default)]
pub struct BatchPolicy {
    /// Emit exactly one folder per unit (block-mode output requires this).
    pub single_folder: bool,
    /// Bounded-batch limit on files per unit. `None` batches everything
    /// remaining into one unit.
    pub files_per_job_limit: Option<usize>,
}

/// One planned batch: the folder label (comma-joined when folders are
/// merged) and the files to process. The orchestrator assigns the job id.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBatch {
    pub folder_label: String,
    pub files: Vec<String>,
}

/// Consumes folder groups and yields bounded-size batches.
pub struct BatchPlanner {
    policy: BatchPolicy,
}

impl BatchPlanner {
    pub fn new(policy: BatchPolicy) -> Self {
        Self { policy }
    }

    /// Take the next batch out of `groups`, or `None` when the pass is
    /// exhausted.
    pub fn next_unit(
        &self,
        groups: &mut BTreeMap<String, Vec<String>>,
    ) -> Option<PlannedBatch> {
        if groups.is_empty() {
            return None;
        }

        if self.policy.single_folder {
            // lexicographically smallest remaining folder
            let folder = groups.keys().next().cloned()?;
            let files = groups.remove(&folder)?;
            info!(folder = %folder, files = files.len(), "Planning single-folder unit");
            return Some(PlannedBatch {
                folder_label: folder,
                files,
            });
        }

        let mut folders = Vec::new();
        let mut files = Vec::new();
        for (folder, group) in groups.iter() {
            if let Some(limit) = self.policy.files_per_job_limit {
                // at least one folder always goes in, even oversized
                if !files.is_empty() && files.len() + group.len() > limit {
                    break;
                }
            }
            folders.push(folder.clone());
            files.extend(group.iter().cloned());
        }
        for folder in &folders {
            groups.remove(folder);
        }
        let folder_label = folders.join(",");
        info!(folders = %folder_label, files = files.len(), "Planning batched unit");
        Some(PlannedBatch {
            folder_label,
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(spec: &[(&str, usize)]) -> BTreeMap<String, Vec<String>> {
        spec.iter()
            .map(|(folder, n)| {
                let files = (0..*n)
                    .map(|i| format!("/in/{}/part-{}", folder, i))
                    .collect();
                (folder.to_string(), files)
            })
            .collect()
    }

    #[test]
    fn test_single_folder_policy_in_lexicographic_order() {
        let planner = BatchPlanner::new(BatchPolicy {
            single_folder: true,
            files_per_job_limit: None,
        });
        let mut g = groups(&[("20240103", 1), ("20240101", 2), ("20240102", 1)]);

        let first = planner.next_unit(&mut g).unwrap();
        assert_eq!(first.folder_label, "20240101");
        assert_eq!(first.files.len(), 2);

        let second = planner.next_unit(&mut g).unwrap();
        assert_eq!(second.folder_label, "20240102");

        let third = planner.next_unit(&mut g).unwrap();
        assert_eq!(third.folder_label, "20240103");

        assert!(planner.next_unit(&mut g).is_none());
    }

    #[test]
    fn test_bounded_batch_respects_limit() {
        let planner = BatchPlanner::new(BatchPolicy {
            single_folder: false,
            files_per_job_limit: Some(100),
        });
        let mut g = groups(&[("a", 60), ("b", 30), ("c", 30)]);

        let first = planner.next_unit(&mut g).unwrap();
        assert_eq!(first.folder_label, "a,b");
        assert_eq!(first.files.len(), 90);

        let second = planner.next_unit(&mut g).unwrap();
        assert_eq!(second.folder_label, "c");
        assert_eq!(second.files.len(), 30);

        assert!(planner.next_unit(&mut g).is_none());
    }

    #[test]
    fn test_oversized_folder_never_starves() {
        let planner = BatchPlanner::new(BatchPolicy {
            single_folder: false,
            files_per_job_limit: Some(10),
        });
        let mut g = groups(&[("big", 50), ("small", 5)]);

        let first = planner.next_unit(&mut g).unwrap();
        assert_eq!(first.folder_label, "big");
        assert_eq!(first.files.len(), 50);

        let second = planner.next_unit(&mut g).unwrap();
        assert_eq!(second.folder_label, "small");
    }

    #[test]
    fn test_no_limit_merges_everything() {
        let planner = BatchPlanner::new(BatchPolicy::default());
        let mut g = groups(&[("a", 2), ("b", 3)]);

        let unit = planner.next_unit(&mut g).unwrap();
        assert_eq!(unit.folder_label, "a,b");
        assert_eq!(unit.files.len(), 5);
        assert!(planner.next_unit(&mut g).is_none());
    }

    #[test]
    fn test_all_folders_eventually_emitted() {
        let planner = BatchPlanner::new(BatchPolicy {
            single_folder: false,
            files_per_job_limit: Some(3),
        });
        let mut g = groups(&[("a", 2), ("b", 2), ("c", 2), ("d", 2)]);

        let mut seen = Vec::new();
        while let Some(unit) = planner.next_unit(&mut g) {
            assert!(unit.files.len() <= 3 || unit.folder_label.split(',').count() == 1);
            seen.extend(
                unit.folder_label
                    .split(',')
                    .map(|s| s.to_string()),
            );
        }
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }
}

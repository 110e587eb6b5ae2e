//! Input readiness sensor.
//!
//! Blocks until an input location is ready: optionally appends a
//! date-suffixed folder (`today - offset` days) and the ready marker, then
//! polls existence at a fixed interval. Outer schedulers run this as a gate
//! before launching the orchestrator.

use crate::compute::RetryPolicy;
use crate::error::{GleanerError, Result};
use crate::storage::Storage;
use chrono::{Duration as ChronoDuration, Local};
use gleaner_protocol::naming::READY_MARKER;
use std::path::PathBuf;
use tracing::info;

/// Date format of date-suffixed input folders.
const FOLDER_DATE_FORMAT: &str = "%Y%m%d";

/// Sensor configuration.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub input_path: PathBuf,
    /// When set, wait for `{input_path}/{today - offset days}`. Offsets
    /// below one day clamp to one (yesterday's partition).
    pub date_offset_days: Option<i64>,
    /// Wait for the folder's ready marker instead of the folder itself.
    pub check_ready_marker: bool,
}

/// Resolve the path the sensor waits on.
pub fn resolve_target(config: &SensorConfig) -> PathBuf {
    let mut path = config.input_path.clone();
    if let Some(offset) = config.date_offset_days {
        let day = Local::now().date_naive() - ChronoDuration::days(offset.max(1));
        path = path.join(day.format(FOLDER_DATE_FORMAT).to_string());
    }
    if config.check_ready_marker {
        path = path.join(READY_MARKER);
    }
    path
}

/// Block until the target exists. Returns the resolved path.
pub fn wait_for_input(
    storage: &dyn Storage,
    config: &SensorConfig,
    policy: &RetryPolicy,
) -> Result<PathBuf> {
    let target = resolve_target(config);
    let mut attempts = 0usize;
    loop {
        if storage.exists(&target)? {
            info!(target = %target.display(), "Input is ready");
            return Ok(target);
        }
        attempts += 1;
        if policy.exhausted(attempts) {
            return Err(GleanerError::Storage(format!(
                "{} still missing after {} checks",
                target.display(),
                attempts
            )));
        }
        info!(
            target = %target.display(),
            "Input not ready, sleeping {}s",
            policy.interval.as_secs()
        );
        policy.sleep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    #[test]
    fn test_resolves_date_and_marker_suffixes() {
        let config = SensorConfig {
            input_path: PathBuf::from("/in"),
            date_offset_days: Some(1),
            check_ready_marker: true,
        };
        let target = resolve_target(&config);
        let expected_day = (Local::now().date_naive() - ChronoDuration::days(1))
            .format(FOLDER_DATE_FORMAT)
            .to_string();
        assert_eq!(target, PathBuf::from("/in").join(expected_day).join("_SUCCESS"));
    }

    #[test]
    fn test_zero_offset_clamps_to_yesterday() {
        let config = SensorConfig {
            input_path: PathBuf::from("/in"),
            date_offset_days: Some(0),
            check_ready_marker: false,
        };
        let expected_day = (Local::now().date_naive() - ChronoDuration::days(1))
            .format(FOLDER_DATE_FORMAT)
            .to_string();
        assert_eq!(resolve_target(&config), PathBuf::from("/in").join(expected_day));
    }

    #[test]
    fn test_returns_when_input_present() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("_SUCCESS"), "").unwrap();

        let config = SensorConfig {
            input_path: tmp.path().to_path_buf(),
            date_offset_days: None,
            check_ready_marker: true,
        };
        let target =
            wait_for_input(&LocalStorage, &config, &RetryPolicy::no_wait_bounded(3)).unwrap();
        assert!(target.ends_with("_SUCCESS"));
    }

    #[test]
    fn test_bounded_policy_gives_up() {
        let tmp = TempDir::new().unwrap();
        let config = SensorConfig {
            input_path: tmp.path().join("never"),
            date_offset_days: None,
            check_ready_marker: false,
        };
        let err =
            wait_for_input(&LocalStorage, &config, &RetryPolicy::no_wait_bounded(2)).unwrap_err();
        assert!(matches!(err, GleanerError::Storage(_)));
    }
}

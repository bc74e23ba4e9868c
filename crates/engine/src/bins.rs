//! Media-pool bin lifecycle.
//!
//! Every job imports its clips into a fresh, prefixed bin. Bins left by
//! previous runs are purged before replacement work starts so the host's
//! asset pool does not grow without bound across hundreds of jobs.

use chrono::Utc;

use conform_common::error::ConformResult;
use conform_host::HostBackend;

/// Name for this job's import bin: prefix, job id, UTC timestamp.
pub fn job_bin_name(prefix: &str, job_id: &str) -> String {
    format!("{prefix}_{job_id}_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Delete root-level bins carrying the configured prefix. Individual
/// deletion failures are logged and skipped; a purge miss degrades the
/// pool, it does not fail the job.
pub fn purge_stale_bins(host: &mut dyn HostBackend, prefix: &str) -> ConformResult<u32> {
    let mut purged = 0;
    for name in host.pool_bins()? {
        if !name.starts_with(prefix) {
            continue;
        }
        match host.delete_bin(&name) {
            Ok(()) => {
                tracing::info!(bin = %name, "Purged stale bin from previous run");
                purged += 1;
            }
            Err(e) => {
                tracing::warn!(bin = %name, error = %e, "Could not purge stale bin");
            }
        }
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;

    #[test]
    fn test_purges_only_prefixed_bins() {
        let mut host = MockHost::new();
        host.bins = vec![
            "Conform_job-a_20250101_000000".to_string(),
            "Stock Footage".to_string(),
            "Conform_job-b_20250102_090000".to_string(),
        ];

        let purged = purge_stale_bins(&mut host, "Conform").unwrap();
        assert_eq!(purged, 2);
        assert_eq!(host.bins, vec!["Stock Footage".to_string()]);
    }

    #[test]
    fn test_no_bins_is_a_noop() {
        let mut host = MockHost::new();
        assert_eq!(purge_stale_bins(&mut host, "Conform").unwrap(), 0);
    }

    #[test]
    fn test_bin_name_carries_prefix_and_job_id() {
        let name = job_bin_name("Conform", "job-123");
        assert!(name.starts_with("Conform_job-123_"));
    }
}

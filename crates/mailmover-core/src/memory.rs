//! Resident memory probe used to enforce the configured memory ceiling.

/// Resident set size of this process in MiB, if the platform exposes it.
///
/// On Linux reads `/proc/self/statm` (pages) and scales by the page size from
/// `sysconf`; elsewhere returns `None` and the ceiling is never enforced.
pub fn resident_mb() -> Option<f64> {
    #[cfg(unix)]
    {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let pages = parse_statm_resident(&statm)?;
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if page_size <= 0 {
            tracing::debug!(page_size, "sysconf(_SC_PAGESIZE) failed");
            return None;
        }
        Some(pages as f64 * page_size as f64 / (1024.0 * 1024.0))
    }
    #[cfg(not(unix))]
    {
        None
    }
}

/// Second field of statm: resident pages.
fn parse_statm_resident(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

/// True when resident memory is known and at or above `limit_mb`.
pub fn above_limit(limit_mb: u64) -> bool {
    matches!(resident_mb(), Some(mb) if mb >= limit_mb as f64)
}

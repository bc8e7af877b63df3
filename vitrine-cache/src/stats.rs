//! Diagnostic statistics over the cache.
//!
//! Everything here is read-only. Numbers are snapshots and the size is the
//! store's advisory heuristic, formatted for display.

use serde::Serialize;
use std::sync::Arc;

use vitrine_core::CacheError;

use crate::store::CacheStore;

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Read counters kept by the retriever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_fallbacks: u64,
}

impl ReadStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Store summary for diagnostics surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    /// Approximate size, e.g. `"512 bytes"` or `"1.50 KB"`.
    pub total_size: String,
}

/// Produces [`CacheReport`]s without touching the store's contents.
#[derive(Debug, Clone)]
pub struct StatsReporter {
    store: Arc<CacheStore>,
}

impl StatsReporter {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    pub fn stats(&self) -> Result<CacheReport, CacheError> {
        let stats = self.store.stats()?;
        Ok(CacheReport {
            total_entries: stats.total,
            valid_entries: stats.valid,
            expired_entries: stats.expired,
            total_size: format_size(stats.approx_size_bytes),
        })
    }
}

/// Format a byte count as bytes, KB or MB with two decimals.
pub fn format_size(bytes: usize) -> String {
    if bytes < KIB {
        format!("{bytes} bytes")
    } else if bytes < MIB {
        format!("{:.2} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKey;
    use std::time::Duration;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 bytes");
        assert_eq!(format_size(1023), "1023 bytes");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(MIB), "1.00 MB");
        assert_eq!(format_size(5 * MIB + MIB / 4), "5.25 MB");
    }

    #[test]
    fn test_read_stats_hit_rate() {
        let stats = ReadStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = ReadStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_report_matches_store() {
        let store = Arc::new(CacheStore::new());
        store
            .set(&CacheKey::from_raw("/a"), &"x", Duration::from_secs(60))
            .unwrap();
        store.set(&CacheKey::from_raw("/b"), &"y", Duration::ZERO).unwrap();

        let report = StatsReporter::new(store.clone()).stats().unwrap();
        assert_eq!(report.total_entries, 2);
        assert_eq!(report.valid_entries, 1);
        assert_eq!(report.expired_entries, 1);
        // ("/a" + "\"x\"") * 2 twice
        assert_eq!(report.total_size, "20 bytes");
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = StatsReporter::new(Arc::new(CacheStore::new())).stats().unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalEntries"], 0);
        assert_eq!(json["totalSize"], "0 bytes");
    }
}

//! Run statistics
//!
//! Per-unit-kind success/soft-fail/hard-fail counters, shared across all
//! concurrent workers. Soft failures are per-unit problems (a deleted or
//! unfetchable page); hard failures are known systemic issues. Neither
//! aborts the run.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct KindStats {
    success: AtomicU64,
    soft_failed: AtomicU64,
    hard_failed: AtomicU64,
}

impl KindStats {
    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_soft_failure(&self) {
        self.soft_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hard_failure(&self) {
        self.hard_failed.fetch_add(1, Ordering::Relaxed);
    }

    fn counts(&self) -> (u64, u64, u64) {
        (
            self.success.load(Ordering::Relaxed),
            self.soft_failed.load(Ordering::Relaxed),
            self.hard_failed.load(Ordering::Relaxed),
        )
    }
}

/// Counters for one run, updated concurrently
#[derive(Debug, Default)]
pub struct RunStats {
    pub articles: KindStats,
    pub media: KindStats,
    pub redirects: AtomicU64,
}

/// Immutable snapshot of the counters at run end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub articles_ok: u64,
    pub articles_soft_failed: u64,
    pub articles_hard_failed: u64,
    pub media_ok: u64,
    pub media_soft_failed: u64,
    pub media_hard_failed: u64,
    pub redirects: u64,
}

impl RunStats {
    pub fn record_redirect(&self) {
        self.redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunSummary {
        let (articles_ok, articles_soft_failed, articles_hard_failed) = self.articles.counts();
        let (media_ok, media_soft_failed, media_hard_failed) = self.media.counts();
        RunSummary {
            articles_ok,
            articles_soft_failed,
            articles_hard_failed,
            media_ok,
            media_soft_failed,
            media_hard_failed,
            redirects: self.redirects.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let summary = self.snapshot();
        info!(
            articles_ok = summary.articles_ok,
            articles_soft_failed = summary.articles_soft_failed,
            articles_hard_failed = summary.articles_hard_failed,
            media_ok = summary.media_ok,
            media_soft_failed = summary.media_soft_failed,
            media_hard_failed = summary.media_hard_failed,
            redirects = summary.redirects,
            "run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_independently() {
        let stats = RunStats::default();
        stats.articles.record_success();
        stats.articles.record_success();
        stats.articles.record_soft_failure();
        stats.media.record_hard_failure();
        stats.record_redirect();

        let summary = stats.snapshot();
        assert_eq!(summary.articles_ok, 2);
        assert_eq!(summary.articles_soft_failed, 1);
        assert_eq!(summary.articles_hard_failed, 0);
        assert_eq!(summary.media_hard_failed, 1);
        assert_eq!(summary.redirects, 1);
    }
}

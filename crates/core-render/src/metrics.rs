//! Render path metrics.
//!
//! Distinct from `RenderDeltaMetrics` (scheduler), which counts what was
//! asked for. These counters record what the compositor actually did: which
//! path ran, how many rows were written or reused, and how often a cheap path
//! had to escalate.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RenderPathMetrics {
    pub full_relayouts: AtomicU64,
    pub stack_relayouts: AtomicU64,
    /// Panels repainted in place through `rerender`.
    pub panel_repaints: AtomicU64,
    pub primary_scrolls: AtomicU64,
    pub stack_scrolls: AtomicU64,
    /// Scroll requests that moved nothing because they hit a content edge.
    pub clamped_scrolls: AtomicU64,
    /// Buffer moves of the secondary column issued by stack scrolls.
    pub column_moves: AtomicU64,
    pub rows_written: AtomicU64,
    /// Rows skipped because the screen already showed them.
    pub rows_reused: AtomicU64,
    /// Paints that blanked a panel after its content source failed.
    pub render_failures: AtomicU64,
    /// Width mismatches and stack width changes that forced a full relayout.
    pub width_escalations: AtomicU64,
    /// Stack panel height mismatches that forced a stack relayout.
    pub height_escalations: AtomicU64,
    /// Cheap paths aborted because the terminal size changed underneath them.
    pub resize_races: AtomicU64,
    pub status_repaints: AtomicU64,
    pub status_skipped: AtomicU64,
    /// Cursor placements re-derived from current layout after a stale geometry.
    pub cursor_rederived: AtomicU64,
    /// Passes skipped while the terminal is below the minimum size.
    pub blocked_passes: AtomicU64,
    pub last_pass_ns: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderPathMetricsSnapshot {
    pub full_relayouts: u64,
    pub stack_relayouts: u64,
    pub panel_repaints: u64,
    pub primary_scrolls: u64,
    pub stack_scrolls: u64,
    pub clamped_scrolls: u64,
    pub column_moves: u64,
    pub rows_written: u64,
    pub rows_reused: u64,
    pub render_failures: u64,
    pub width_escalations: u64,
    pub height_escalations: u64,
    pub resize_races: u64,
    pub status_repaints: u64,
    pub status_skipped: u64,
    pub cursor_rederived: u64,
    pub blocked_passes: u64,
    pub last_pass_ns: u64,
}

impl RenderPathMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RenderPathMetricsSnapshot {
        RenderPathMetricsSnapshot {
            full_relayouts: self.full_relayouts.load(Ordering::Relaxed),
            stack_relayouts: self.stack_relayouts.load(Ordering::Relaxed),
            panel_repaints: self.panel_repaints.load(Ordering::Relaxed),
            primary_scrolls: self.primary_scrolls.load(Ordering::Relaxed),
            stack_scrolls: self.stack_scrolls.load(Ordering::Relaxed),
            clamped_scrolls: self.clamped_scrolls.load(Ordering::Relaxed),
            column_moves: self.column_moves.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_reused: self.rows_reused.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            width_escalations: self.width_escalations.load(Ordering::Relaxed),
            height_escalations: self.height_escalations.load(Ordering::Relaxed),
            resize_races: self.resize_races.load(Ordering::Relaxed),
            status_repaints: self.status_repaints.load(Ordering::Relaxed),
            status_skipped: self.status_skipped.load(Ordering::Relaxed),
            cursor_rederived: self.cursor_rederived.load(Ordering::Relaxed),
            blocked_passes: self.blocked_passes.load(Ordering::Relaxed),
            last_pass_ns: self.last_pass_ns.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let m = RenderPathMetrics::default();
        RenderPathMetrics::incr(&m.full_relayouts);
        RenderPathMetrics::add(&m.rows_written, 7);
        m.last_pass_ns.store(1234, Ordering::Relaxed);
        let s = m.snapshot();
        assert_eq!((s.full_relayouts, s.rows_written, s.last_pass_ns), (1, 7, 1234));
        assert_eq!(s.stack_relayouts, 0);
    }
}

//! Redraw scheduler.
//!
//! Producers report invalidation intents (`RenderDelta`) via `mark` while an
//! input event is being handled. At the end of the event the loop calls
//! `consume`, which collapses everything queued into one [`RedrawPlan`], so
//! all mutations caused by one event are rendered in a single pass.
//!
//! Merge semantics:
//! - `Full` anywhere in the queue makes the plan a full relayout. Panel and
//!   stack requests are subsumed (counted in `suppressed_panels`).
//! - `Stack` keeps explicit `Panel` marks: a stack panel whose placement did
//!   not change may still have new content.
//! - `Panel(id)` marks are deduplicated, first-mark order preserved.
//! - `Scroll` marks are summed per target. Under `Full` the summed distances
//!   are applied as state changes before the relayout instead of as buffer
//!   moves.
//! - `Status` and `Cursor` are flags.
//!
//! The state view (`state()`) reports the most expensive pending work:
//! `NeedsFullRelayout` > `NeedsStackRelayout` > `NeedsPanelRepaint` > `Stable`.

use core_events::PanelId;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollTarget {
    Primary,
    Stack,
}

/// Invalidation intents produced by content, layout and navigation changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderDelta {
    /// Terminal resized, primary panel swapped or a width mismatch.
    Full,
    /// Stack membership or a stack panel's height changed.
    Stack,
    /// Content changed but size did not.
    Panel(PanelId),
    /// Scroll by `lines` rows (positive: forward).
    Scroll { target: ScrollTarget, lines: i64 },
    /// Status/input line text changed.
    Status,
    /// Only the cursor needs repositioning.
    Cursor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawState {
    Stable,
    NeedsFullRelayout,
    NeedsStackRelayout,
    NeedsPanelRepaint(PanelId),
}

/// Collapsed work for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedrawPlan {
    pub full: bool,
    pub stack: bool,
    pub panels: Vec<PanelId>,
    pub primary_scroll: i64,
    pub stack_scroll: i64,
    pub status: bool,
    pub cursor: bool,
}

impl RedrawPlan {
    pub fn state(&self) -> RedrawState {
        if self.full {
            RedrawState::NeedsFullRelayout
        } else if self.stack {
            RedrawState::NeedsStackRelayout
        } else if let Some(id) = self.panels.first() {
            RedrawState::NeedsPanelRepaint(*id)
        } else {
            RedrawState::Stable
        }
    }

    pub fn has_scroll(&self) -> bool {
        self.primary_scroll != 0 || self.stack_scroll != 0
    }
}

#[derive(Debug, Default)]
pub struct RenderScheduler {
    pending: Vec<RenderDelta>,
    metrics: RenderDeltaMetrics,
}

/// Frequency of collapsed plan shapes.
#[derive(Debug, Default)]
pub struct RenderDeltaMetrics {
    full: AtomicU64,
    stack: AtomicU64,
    panel: AtomicU64,
    scroll: AtomicU64,
    status: AtomicU64,
    cursor_only: AtomicU64,
    collapsed_scroll: AtomicU64,
    /// Panel/stack marks swallowed by a full relayout in the same pass.
    suppressed_panels: AtomicU64,
    semantic_frames: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderDeltaMetricsSnapshot {
    pub full: u64,
    pub stack: u64,
    pub panel: u64,
    pub scroll: u64,
    pub status: u64,
    pub cursor_only: u64,
    pub collapsed_scroll: u64,
    pub suppressed_panels: u64,
    pub semantic_frames: u64,
}

impl RenderDeltaMetrics {
    pub fn snapshot(&self) -> RenderDeltaMetricsSnapshot {
        RenderDeltaMetricsSnapshot {
            full: self.full.load(Relaxed),
            stack: self.stack.load(Relaxed),
            panel: self.panel.load(Relaxed),
            scroll: self.scroll.load(Relaxed),
            status: self.status.load(Relaxed),
            cursor_only: self.cursor_only.load(Relaxed),
            collapsed_scroll: self.collapsed_scroll.load(Relaxed),
            suppressed_panels: self.suppressed_panels.load(Relaxed),
            semantic_frames: self.semantic_frames.load(Relaxed),
        }
    }

    fn record(&self, plan: &RedrawPlan) {
        self.semantic_frames.fetch_add(1, Relaxed);
        match plan.state() {
            RedrawState::NeedsFullRelayout => self.full.fetch_add(1, Relaxed),
            RedrawState::NeedsStackRelayout => self.stack.fetch_add(1, Relaxed),
            RedrawState::NeedsPanelRepaint(_) => self.panel.fetch_add(1, Relaxed),
            RedrawState::Stable if plan.has_scroll() => self.scroll.fetch_add(1, Relaxed),
            RedrawState::Stable if plan.status => self.status.fetch_add(1, Relaxed),
            RedrawState::Stable => self.cursor_only.fetch_add(1, Relaxed),
        };
    }
}

impl RenderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics_snapshot(&self) -> RenderDeltaMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Record a new delta. Multiple calls accumulate until `consume()`.
    pub fn mark(&mut self, delta: RenderDelta) {
        tracing::trace!(target: "render.scheduler", ?delta, "render_mark");
        self.pending.push(delta);
    }

    pub fn mark_status(&mut self) {
        self.mark(RenderDelta::Status);
    }

    pub fn mark_cursor(&mut self) {
        self.mark(RenderDelta::Cursor);
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Most expensive work currently queued.
    pub fn state(&self) -> RedrawState {
        if self.pending.is_empty() {
            return RedrawState::Stable;
        }
        self.collapse().0.state()
    }

    /// Collapse queued deltas into the plan for this pass.
    pub fn consume(&mut self) -> Option<RedrawPlan> {
        if self.pending.is_empty() {
            return None;
        }
        let (plan, scroll_events) = self.collapse();
        self.pending.clear();
        if scroll_events > 1 {
            self.metrics
                .collapsed_scroll
                .fetch_add(scroll_events - 1, Relaxed);
        }
        if plan.full {
            let swallowed = plan.panels.len() as u64 + u64::from(plan.stack);
            self.metrics.suppressed_panels.fetch_add(swallowed, Relaxed);
        }
        self.metrics.record(&plan);
        tracing::trace!(target: "render.scheduler", ?plan, "render_delta_collapse");
        Some(plan)
    }

    /// The merged plan plus the number of scroll marks folded into it.
    fn collapse(&self) -> (RedrawPlan, u64) {
        let mut plan = RedrawPlan::default();
        let mut scroll_events = 0u64;
        for d in &self.pending {
            match d {
                RenderDelta::Full => plan.full = true,
                RenderDelta::Stack => plan.stack = true,
                RenderDelta::Panel(id) => {
                    if !plan.panels.contains(id) {
                        plan.panels.push(*id);
                    }
                }
                RenderDelta::Scroll { target, lines } => {
                    scroll_events += 1;
                    match target {
                        ScrollTarget::Primary => plan.primary_scroll += lines,
                        ScrollTarget::Stack => plan.stack_scroll += lines,
                    }
                }
                RenderDelta::Status => plan.status = true,
                RenderDelta::Cursor => plan.cursor = true,
            }
        }
        (plan, scroll_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_marks_dedup_in_order() {
        let mut s = RenderScheduler::new();
        s.mark(RenderDelta::Panel(PanelId(3)));
        s.mark(RenderDelta::Panel(PanelId(1)));
        s.mark(RenderDelta::Panel(PanelId(3)));
        let plan = s.consume().unwrap();
        assert_eq!(plan.panels, vec![PanelId(3), PanelId(1)]);
        assert_eq!(plan.state(), RedrawState::NeedsPanelRepaint(PanelId(3)));
    }

    #[test]
    fn full_outranks_stack_and_panels() {
        let mut s = RenderScheduler::new();
        s.mark(RenderDelta::Panel(PanelId(1)));
        s.mark(RenderDelta::Stack);
        assert_eq!(s.state(), RedrawState::NeedsStackRelayout);
        s.mark(RenderDelta::Full);
        assert_eq!(s.state(), RedrawState::NeedsFullRelayout);
        let plan = s.consume().unwrap();
        assert!(plan.full);
        assert_eq!(s.metrics_snapshot().suppressed_panels, 2);
    }

    #[test]
    fn scrolls_sum_per_target() {
        let mut s = RenderScheduler::new();
        s.mark(RenderDelta::Scroll {
            target: ScrollTarget::Primary,
            lines: 10,
        });
        s.mark(RenderDelta::Scroll {
            target: ScrollTarget::Stack,
            lines: -3,
        });
        s.mark(RenderDelta::Scroll {
            target: ScrollTarget::Primary,
            lines: -4,
        });
        let plan = s.consume().unwrap();
        assert_eq!((plan.primary_scroll, plan.stack_scroll), (6, -3));
        assert_eq!(plan.state(), RedrawState::Stable);
        let snap = s.metrics_snapshot();
        assert_eq!(snap.collapsed_scroll, 2);
        assert_eq!(snap.scroll, 1);
    }

    #[test]
    fn status_and_cursor_are_flags() {
        let mut s = RenderScheduler::new();
        s.mark_cursor();
        s.mark_status();
        s.mark_cursor();
        let plan = s.consume().unwrap();
        assert!(plan.status && plan.cursor);
        assert!(s.consume().is_none(), "second consume empty");
        assert_eq!(s.metrics_snapshot().status, 1);
        assert_eq!(s.metrics_snapshot().semantic_frames, 1);
    }
}

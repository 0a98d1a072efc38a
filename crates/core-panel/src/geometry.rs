//! Placement records and window arithmetic.
//!
//! Two coordinate systems meet here:
//! * screen rows: `0..terminal_height`, what the surface addresses;
//! * canvas rows: the primary panel's content rows. The terminal window shows
//!   canvas rows `window_top..window_top + rows`; the secondary stack is anchored
//!   in canvas rows so paging the primary panel and repositioning the stack are
//!   described by the same distance.
//!
//! The functions below are pure so the scroll/move bookkeeping can be tested
//! without a terminal.

use std::ops::Range;

/// Where the engine wants a panel drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub top: u16,
    pub left: u16,
    pub width: u16,
    /// Visible rows (may be smaller than the panel's content when clipped).
    pub height: u16,
    /// First content row shown at `top`.
    pub start_line: usize,
    /// Canvas row of content row 0.
    pub anchor: i64,
    /// Screen row of content row 0 (negative when scrolled/clipped above).
    pub virtual_top: i64,
    /// Layout generation the placement was computed under.
    pub generation: u64,
}

impl Placement {
    /// Placement for a panel occupying a fixed rectangle, showing content
    /// from `start_line` (the primary panel).
    pub fn fixed(
        top: u16,
        left: u16,
        width: u16,
        height: u16,
        start_line: usize,
        generation: u64,
    ) -> Self {
        let virtual_top = top as i64 - start_line as i64;
        Self {
            top,
            left,
            width,
            height,
            start_line,
            anchor: 0,
            virtual_top,
            generation,
        }
    }

    /// Visible slice of a stack panel whose content row 0 sits at screen row
    /// `virtual_top`, clipped to the first `budget` screen rows.
    pub fn clipped(
        anchor: i64,
        virtual_top: i64,
        full_height: usize,
        left: u16,
        width: u16,
        budget: u16,
        generation: u64,
    ) -> Self {
        let vis = visible_span(virtual_top, full_height, budget);
        Self {
            top: vis.start as u16,
            left,
            width,
            height: (vis.end - vis.start) as u16,
            start_line: (vis.start - virtual_top).max(0) as usize,
            anchor,
            virtual_top,
            generation,
        }
    }
}

/// Geometry recorded on every successful draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub top: u16,
    pub left: u16,
    pub width: u16,
    pub height: u16,
    pub start_line: usize,
    /// `full_height()` at the time of the draw.
    pub full_height: usize,
    pub anchor: i64,
    pub virtual_top: i64,
    pub generation: u64,
}

impl Geometry {
    pub fn from_placement(p: &Placement, full_height: usize) -> Self {
        Self {
            top: p.top,
            left: p.left,
            width: p.width,
            height: p.height,
            start_line: p.start_line,
            full_height,
            anchor: p.anchor,
            virtual_top: p.virtual_top,
            generation: p.generation,
        }
    }

    /// Canvas row shown at screen row 0 when this geometry was recorded.
    pub fn window_top(&self) -> i64 {
        self.anchor - self.virtual_top
    }

    /// Screen rows covered, half-open.
    pub fn screen_rows(&self) -> Range<i64> {
        self.top as i64..self.top as i64 + self.height as i64
    }

    /// Drawn smaller than the content because the screen clipped it.
    pub fn is_clipped(&self) -> bool {
        (self.height as usize) < self.full_height
    }
}

/// Screen rows a panel of `full_height` rows whose row 0 sits at screen row
/// `virtual_top` occupies inside `[0, budget)`.
pub fn visible_span(virtual_top: i64, full_height: usize, budget: u16) -> Range<i64> {
    let budget = budget as i64;
    let start = virtual_top.clamp(0, budget);
    let end = (virtual_top + full_height as i64).clamp(0, budget);
    start..end.max(start)
}

fn intersect(a: &Range<i64>, b: &Range<i64>) -> Range<i64> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    start..end.max(start)
}

/// Rows of `new_window` not already covered by `old_window`, clipped to
/// `bounds`. Returns at most two ascending, disjoint, non-empty ranges.
///
/// Used for both content rows (panel scroll) and screen rows (stack move):
/// whatever survives from the old window was moved into place by a buffer
/// move, everything else must be rendered.
pub fn compute_exposed_range(
    old_window: Range<i64>,
    new_window: Range<i64>,
    bounds: Range<i64>,
) -> Vec<Range<i64>> {
    let new = intersect(&new_window, &bounds);
    if new.is_empty() {
        return Vec::new();
    }
    let old = intersect(&old_window, &new);
    if old.is_empty() {
        return vec![new];
    }
    let mut out = Vec::with_capacity(2);
    if new.start < old.start {
        out.push(new.start..old.start);
    }
    if old.end < new.end {
        out.push(old.end..new.end);
    }
    out
}

/// A block copy inside a rectangle of `height` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShift {
    /// First source row, relative to the rectangle top.
    pub src_offset: u16,
    /// First destination row, relative to the rectangle top.
    pub dst_offset: u16,
    pub rows: u16,
}

/// Plan the buffer move that realizes "content moved up by `delta` rows"
/// (negative: down) inside a `height`-row rectangle. `None` when nothing
/// survives and the whole rectangle must be redrawn.
pub fn plan_shift(delta: i64, height: u16) -> Option<BlockShift> {
    let abs = delta.unsigned_abs();
    if delta == 0 || abs >= height as u64 {
        return None;
    }
    let abs = abs as u16;
    let rows = height - abs;
    Some(if delta > 0 {
        BlockShift {
            src_offset: abs,
            dst_offset: 0,
            rows,
        }
    } else {
        BlockShift {
            src_offset: 0,
            dst_offset: abs,
            rows,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_scroll_exposes_bottom_rows() {
        assert_eq!(compute_exposed_range(0..20, 5..25, 0..40), vec![20..25]);
    }

    #[test]
    fn backward_scroll_exposes_top_rows() {
        assert_eq!(compute_exposed_range(10..30, 4..24, 0..40), vec![4..10]);
    }

    #[test]
    fn disjoint_windows_expose_everything_in_bounds() {
        assert_eq!(compute_exposed_range(0..5, 10..30, 0..25), vec![10..25]);
    }

    #[test]
    fn growing_window_exposes_both_sides() {
        assert_eq!(
            compute_exposed_range(5..8, 3..10, 0..100),
            vec![3..5, 8..10]
        );
    }

    #[test]
    fn plan_shift_up_and_down() {
        assert_eq!(
            plan_shift(3, 10),
            Some(BlockShift {
                src_offset: 3,
                dst_offset: 0,
                rows: 7
            })
        );
        assert_eq!(
            plan_shift(-2, 10),
            Some(BlockShift {
                src_offset: 0,
                dst_offset: 2,
                rows: 8
            })
        );
        assert_eq!(plan_shift(10, 10), None);
        assert_eq!(plan_shift(0, 10), None);
    }

    #[test]
    fn clipped_placement_above_screen() {
        // 5 content rows starting two rows above the screen, 20-row budget.
        let p = Placement::clipped(100, -2, 5, 65, 25, 20, 1);
        assert_eq!((p.top, p.height, p.start_line), (0, 3, 2));
        // Entirely below the budget.
        let p = Placement::clipped(100, 25, 5, 65, 25, 20, 1);
        assert_eq!(p.height, 0);
    }
}

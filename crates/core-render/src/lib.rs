//! Screen composition: layout, scrolling, redraw scheduling and cursor
//! ownership for one primary panel plus a bottom-aligned secondary stack.
//!
//! Screen shape (terminal `W x H`):
//! - rows `0..H-1`: the primary column on the left, a one-column vertical
//!   separator, the secondary column on the right;
//! - row `H-1`: the status/input line.
//!
//! Invariants:
//! - Only a full relayout clears the terminal.
//! - The primary column is `W - max(stack min widths) - 1` wide; stack panels
//!   all share the secondary column's width.
//! - Stack panels are placed bottom-up from the stack reference row with one
//!   separator row between consecutive panels of nonzero height. Separators
//!   and blank rows belong to the compositor, never to a panel.
//! - The window top equals the primary panel's start line. Paging the primary
//!   panel moves the stack reference by the actual (clamped) distance.
//! - At most one party owns the hardware cursor: the input line or the edit
//!   target. A cached placement from an older layout generation is never used
//!   to position the cursor.
//!
//! Exposed Components:
//! - `compositor`: the collaborator API and the render pass.
//! - `scheduler`: collapses queued `RenderDelta`s into one `RedrawPlan` per
//!   input event and reports the `RedrawState`.
//! - `layout` / `stack`: column split arithmetic, bottom-up stack placement
//!   and per-row ownership of the secondary column (`ColumnMap`).
//! - `cursor`: `CursorArbiter` plus the pure `resolve` translation.
//! - `status`: the status/input line with its own editing cursor.
//! - `store`: `PanelStore`, the owner of every panel of the active screen.
//! - `metrics`: execution path counters, separate from scheduler metrics.
//!
//! Render Pass:
//! 1. `consume` the scheduler; nothing queued means no pass.
//! 2. Full relayout if requested; otherwise stack relayout, then primary
//!    scroll, then stack scroll, then panel repaints. Any step may escalate:
//!    width mismatch, stack width change or a resize race go to a full
//!    relayout, a stack panel's height mismatch to a stack relayout.
//! 3. Scrolls that escalation prevented are applied as window state before
//!    the full relayout, never as buffer moves.
//! 4. Status line (skipped when unchanged), cursor placement, one flush.
//!
//! Metrics Taxonomy (`RenderPathMetrics`):
//! - Volume: `full_relayouts`, `stack_relayouts`, `panel_repaints`,
//!   `primary_scrolls`, `stack_scrolls`.
//! - Reuse: `rows_written` against `rows_reused`; `column_moves`.
//! - Escalation & Env: `width_escalations`, `height_escalations`,
//!   `resize_races`, `blocked_passes`.
//! - Failure: `render_failures` (panels painted blank after a source error).
//! - Timing: `last_pass_ns` (point sample).

pub mod compositor;
pub mod cursor;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod scheduler;
pub mod stack;
pub mod status;
pub mod store;

pub use compositor::{Compositor, CompositorOptions};
pub use cursor::{CursorArbiter, CursorOwner};
pub use error::LayoutError;
pub use layout::{ColumnSplit, STATUS_ROWS, column_split, required_size};
pub use metrics::{RenderPathMetrics, RenderPathMetricsSnapshot};
pub use scheduler::{
    RedrawPlan, RedrawState, RenderDelta, RenderDeltaMetricsSnapshot, RenderScheduler,
    ScrollTarget,
};
pub use stack::{ColumnMap, RowOwner, StackPlan};
pub use status::{StatusLine, StatusOutcome};
pub use store::PanelStore;

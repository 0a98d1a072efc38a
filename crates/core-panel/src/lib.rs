//! Panel contract and panel kinds.
//!
//! A panel knows its minimum size, its current content height and where it
//! was last drawn. It paints itself through an explicit [`TerminalSurface`]
//! handle passed by the compositor; it never decides its own placement.
//!
//! Window arithmetic used by scrolling and stack moves lives in
//! [`geometry`] as pure functions.
//!
//! [`TerminalSurface`]: core_terminal::TerminalSurface

pub mod content;
pub mod geometry;
pub mod panel;
pub mod row_cache;
pub mod text;

pub use content::{EditBuffer, EditOutcome, ListSource, SaveCallback, TextCursor};
pub use geometry::{BlockShift, Geometry, Placement, compute_exposed_range, plan_shift, visible_span};
pub use panel::{PaintStats, Panel, PanelKind, RenderError, Rerender, RowFormatter};
pub use row_cache::{RowCache, RowHash};

//! Hardware cursor ownership.
//!
//! Exactly one party owns the hardware cursor: the status/input line
//! (`NoEditTarget`) or a single editable stack panel (`Editing`). The arbiter
//! only tracks who; translating a panel's local text cursor to a screen cell
//! is [`resolve`], kept pure so the stale-geometry rule can be tested alone.

use core_events::PanelId;
use core_panel::Geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorOwner {
    #[default]
    NoEditTarget,
    Editing(PanelId),
}

#[derive(Debug, Default)]
pub struct CursorArbiter {
    state: CursorOwner,
}

impl CursorArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CursorOwner {
        self.state
    }

    pub fn target(&self) -> Option<PanelId> {
        match self.state {
            CursorOwner::Editing(id) => Some(id),
            CursorOwner::NoEditTarget => None,
        }
    }

    pub fn is_editing(&self, id: PanelId) -> bool {
        self.state == CursorOwner::Editing(id)
    }

    pub fn begin(&mut self, id: PanelId) {
        tracing::debug!(target: "render.cursor", %id, "edit_begin");
        self.state = CursorOwner::Editing(id);
    }

    /// Return ownership to the input line. Returns the previous target.
    pub fn end(&mut self) -> Option<PanelId> {
        let prev = self.target();
        if let Some(id) = prev {
            tracing::debug!(target: "render.cursor", %id, "edit_end");
        }
        self.state = CursorOwner::NoEditTarget;
        prev
    }
}

/// Screen cell for local cursor `(col, row)` inside a panel.
///
/// `cached` is the geometry the panel last drew with; it is trusted only when
/// its generation equals the current layout `generation`. Otherwise the
/// geometry is re-derived through `rederive` (the panel's current placement).
/// The result is always inside the geometry's rectangle; a panel with no
/// visible rows yields `None`.
pub fn resolve(
    local: (usize, usize),
    cached: Option<Geometry>,
    generation: u64,
    rederive: impl FnOnce() -> Option<Geometry>,
) -> Option<(u16, u16)> {
    let g = match cached {
        Some(g) if g.generation == generation => g,
        _ => {
            tracing::trace!(target: "render.cursor", generation, "cursor_geometry_rederived");
            rederive()?
        }
    };
    if g.width == 0 || g.height == 0 {
        return None;
    }
    let (col, row) = local;
    let x = g.left as usize + col.min(g.width as usize - 1);
    let top = g.top as i64;
    let bottom = top + g.height as i64 - 1;
    let y = (g.virtual_top + row as i64).clamp(top, bottom);
    Some((x as u16, y as u16))
}

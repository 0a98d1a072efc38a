//! Terminal surface abstraction and its two implementations.
//!
//! Everything that draws goes through an explicit [`TerminalSurface`] handle:
//! there is no ambient global cursor or attribute state. The surface is a
//! fixed `width x height` grid of cells supporting four primitives the
//! compositor relies on:
//!
//! * positioned styled writes (`write_at`), clipped to the grid,
//! * block copies of a rectangle to a new origin (`move_block`, the
//!   "buffer move" used by scrolling to reuse already rendered rows),
//! * a whole-screen clear (only the full relayout path calls it),
//! * hardware cursor placement (`set_cursor`).
//!
//! Implementations:
//! * [`HeadlessSurface`]: in-memory grid with write/move/clear counters. Used
//!   by tests and headless runs; row text can be read back exactly.
//! * [`CrosstermSurface`]: keeps a shadow [`Grid`] mirroring what the real
//!   terminal shows, queues crossterm commands and emits them on `flush`.
//!
//! Writes never wrap: text reaching the right edge is truncated. A wide
//! grapheme cluster that does not fit in the remaining columns is replaced by
//! blanks so no half-cluster reaches the terminal.

use anyhow::Result;
use bitflags::bitflags;

pub mod backend;
pub mod capabilities;
pub mod crossterm_surface;
pub mod grid;
pub mod headless;

pub use backend::{CrosstermBackend, TerminalBackend, TerminalGuard};
pub use capabilities::TerminalCapabilities;
pub use crossterm_surface::CrosstermSurface;
pub use grid::{Cell, Grid};
pub use headless::{HeadlessSurface, SurfaceCounters};

bitflags! {
    /// Text attributes applied to written cells. Colors are deliberately absent.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellStyle: u8 {
        const BOLD    = 0b0000_0001;
        const DIM     = 0b0000_0010;
        const REVERSE = 0b0000_0100;
    }
}

/// Axis-aligned rectangle in cell coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Clip against a `width x height` grid anchored at the origin.
    pub fn clip_to(&self, width: u16, height: u16) -> Rect {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Rect {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }
}

/// The drawing handle every render call receives.
///
/// Coordinates are absolute cell positions. Out-of-range writes are clipped
/// rather than rejected; geometry mistakes surface as visual artifacts in
/// tests, not as IO errors in production.
pub trait TerminalSurface {
    /// Current `(width, height)` of the terminal. May change between calls when
    /// the user resizes the window.
    fn size(&self) -> (u16, u16);

    /// Ask the terminal to grow to at least `width x height`. Callers re-read
    /// [`TerminalSurface::size`] afterwards; a terminal may refuse.
    fn resize(&mut self, width: u16, height: u16) -> Result<()>;

    /// Blank every cell.
    fn clear(&mut self) -> Result<()>;

    /// Write `text` starting at `(x, y)`, truncated at the right edge.
    fn write_at(&mut self, x: u16, y: u16, text: &str, style: CellStyle) -> Result<()>;

    /// Copy the cells inside `src` so its top-left lands on `(dst_x, dst_y)`.
    /// Overlapping source and destination are handled. Cells of `src` not
    /// covered by the destination keep their previous content.
    fn move_block(&mut self, src: Rect, dst_x: u16, dst_y: u16) -> Result<()>;

    /// Position (`Some`) or hide (`None`) the hardware cursor.
    fn set_cursor(&mut self, pos: Option<(u16, u16)>) -> Result<()>;

    /// Push queued output to the terminal.
    fn flush(&mut self) -> Result<()>;
}

impl<T: TerminalSurface + ?Sized> TerminalSurface for &mut T {
    fn size(&self) -> (u16, u16) {
        (**self).size()
    }
    fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        (**self).resize(width, height)
    }
    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
    fn write_at(&mut self, x: u16, y: u16, text: &str, style: CellStyle) -> Result<()> {
        (**self).write_at(x, y, text, style)
    }
    fn move_block(&mut self, src: Rect, dst_x: u16, dst_y: u16) -> Result<()> {
        (**self).move_block(src, dst_x, dst_y)
    }
    fn set_cursor(&mut self, pos: Option<(u16, u16)>) -> Result<()> {
        (**self).set_cursor(pos)
    }
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_clip_trims_to_grid() {
        let r = Rect::new(70, 20, 20, 10).clip_to(80, 24);
        assert_eq!(r, Rect::new(70, 20, 10, 4));
        assert!(Rect::new(90, 0, 5, 5).clip_to(80, 24).is_empty());
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(2, 3, 4, 2);
        assert!(r.contains(2, 3));
        assert!(r.contains(5, 4));
        assert!(!r.contains(6, 4));
        assert!(!r.contains(5, 5));
    }
}

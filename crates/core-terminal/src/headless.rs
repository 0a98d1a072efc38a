//! In-memory terminal surface.
//!
//! Mirrors every primitive onto a [`Grid`] and counts the calls so tests can
//! assert on write volume (a repeated rerender must add zero writes) as well as
//! on the exact screen contents.

use crate::{CellStyle, Grid, Rect, TerminalSurface};
use anyhow::Result;

/// Call counters. `cells_written` counts columns actually changed by writes
/// (clipped output excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurfaceCounters {
    pub writes: u64,
    pub cells_written: u64,
    pub moves: u64,
    pub clears: u64,
    pub resizes: u64,
    pub flushes: u64,
}

#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    grid: Grid,
    cursor: Option<(u16, u16)>,
    /// Upper bound honoured by `resize`; `None` grows without limit.
    max_size: Option<(u16, u16)>,
    counters: SurfaceCounters,
    /// `(x, y)` origin of every write since the last counter reset.
    write_log: Vec<(u16, u16)>,
}

impl HeadlessSurface {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            grid: Grid::new(width, height),
            cursor: None,
            max_size: None,
            counters: SurfaceCounters::default(),
            write_log: Vec::new(),
        }
    }

    /// Surface that refuses to grow past `(width, height)`.
    pub fn with_max_size(mut self, width: u16, height: u16) -> Self {
        self.max_size = Some((width, height));
        self
    }

    /// Simulate the user resizing the window (content kept top-left).
    pub fn set_size(&mut self, width: u16, height: u16) {
        self.grid.resize(width, height);
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn row_text(&self, y: u16) -> String {
        self.grid.row_text(y)
    }

    /// Full screen as one string per row.
    pub fn snapshot(&self) -> Vec<String> {
        (0..self.grid.height()).map(|y| self.grid.row_text(y)).collect()
    }

    pub fn span_text(&self, x: u16, y: u16, width: u16) -> String {
        self.grid.span_text(x, y, width)
    }

    pub fn cursor(&self) -> Option<(u16, u16)> {
        self.cursor
    }

    pub fn counters(&self) -> SurfaceCounters {
        self.counters
    }

    /// Origins of the writes recorded since the last [`reset_counters`].
    ///
    /// [`reset_counters`]: HeadlessSurface::reset_counters
    pub fn write_origins(&self) -> &[(u16, u16)] {
        &self.write_log
    }

    pub fn reset_counters(&mut self) {
        self.counters = SurfaceCounters::default();
        self.write_log.clear();
    }
}

impl TerminalSurface for HeadlessSurface {
    fn size(&self) -> (u16, u16) {
        (self.grid.width(), self.grid.height())
    }

    fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        self.counters.resizes += 1;
        let (width, height) = match self.max_size {
            Some((mw, mh)) => (width.min(mw), height.min(mh)),
            None => (width, height),
        };
        let (cw, ch) = self.size();
        self.grid.resize(width.max(cw), height.max(ch));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.counters.clears += 1;
        self.grid.clear();
        Ok(())
    }

    fn write_at(&mut self, x: u16, y: u16, text: &str, style: CellStyle) -> Result<()> {
        self.counters.writes += 1;
        self.write_log.push((x, y));
        let cols = self.grid.put_str(x, y, text, style);
        self.counters.cells_written += cols as u64;
        Ok(())
    }

    fn move_block(&mut self, src: Rect, dst_x: u16, dst_y: u16) -> Result<()> {
        self.counters.moves += 1;
        self.grid.copy_block(src, dst_x, dst_y);
        Ok(())
    }

    fn set_cursor(&mut self, pos: Option<(u16, u16)>) -> Result<()> {
        self.cursor = pos;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.counters.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_surface_grows_only_to_limit() {
        let mut s = HeadlessSurface::new(80, 24).with_max_size(100, 30);
        s.resize(120, 28).unwrap();
        assert_eq!(s.size(), (100, 28));
        s.resize(10, 10).unwrap();
        assert_eq!(s.size(), (100, 28), "resize never shrinks");
    }

    #[test]
    fn counters_track_primitives() {
        let mut s = HeadlessSurface::new(10, 3);
        s.write_at(0, 0, "hello", CellStyle::empty()).unwrap();
        s.move_block(Rect::new(0, 0, 10, 1), 0, 1).unwrap();
        s.clear().unwrap();
        let c = s.counters();
        assert_eq!((c.writes, c.cells_written, c.moves, c.clears), (1, 5, 1, 1));
    }
}

//! The panel contract.
//!
//! A [`Panel`] is one renderable region. The variant tag ([`PanelKind`]) is
//! fixed at construction; behavior differences live in the content value and
//! in the injected row formatter, not in a type hierarchy.
//!
//! Drawing flows through three entry points used by the compositor:
//! * [`Panel::draw`] paints a fresh [`Placement`] and records its geometry;
//! * [`Panel::rerender`] repaints at the recorded geometry or reports why it
//!   cannot ([`Rerender`]);
//! * [`Panel::scroll`] / [`Panel::move_by`] shift the visible window and paint
//!   only rows the preceding buffer move could not supply.
//!
//! All three paint through the row cache: a row whose text matches what the
//! cache says is already on that screen row is not written again.

use crate::content::{
    EditBuffer, EditOutcome, ListContent, ListSource, SaveCallback, TextContent,
};
use crate::geometry::{Geometry, Placement, compute_exposed_range, plan_shift, visible_span};
use crate::row_cache::{RowCache, RowHash};
use crate::text::fit_to_width;
use core_events::KeyEvent;
use core_terminal::{CellStyle, Rect, TerminalSurface};
use std::borrow::Cow;
use std::ops::Range;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Render strategy for one content row: `(row index, raw text) -> shown text`.
pub type RowFormatter = Box<dyn Fn(usize, &str) -> String + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelKind {
    Text,
    List,
    EditableText,
}

impl PanelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelKind::Text => "text",
            PanelKind::List => "list",
            PanelKind::EditableText => "editable_text",
        }
    }
}

/// Result of repainting at the cached geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rerender {
    Ok,
    /// The space last given is narrower than the minimum (or there is none).
    WidthMismatch,
    /// Content height changed since the cached draw, or the cached height no
    /// longer satisfies the minimum.
    HeightMismatch,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("content source failed: {0}")]
    Source(String),
    #[error(transparent)]
    Surface(#[from] anyhow::Error),
}

/// Row write counters accumulated between compositor drains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PaintStats {
    pub written: u64,
    pub skipped: u64,
    pub failed: u64,
}

enum Content {
    Text(TextContent),
    List(ListContent),
    Editable(EditBuffer),
}

impl Content {
    fn rows(&self) -> usize {
        match self {
            Content::Text(t) => t.len(),
            Content::List(l) => l.len(),
            Content::Editable(e) => e.len(),
        }
    }

    fn row(&self, idx: usize) -> Option<&str> {
        match self {
            Content::Text(t) => t.row(idx),
            Content::List(l) => l.row(idx),
            Content::Editable(e) => e.row(idx),
        }
    }

    fn failure(&self) -> Option<&str> {
        match self {
            Content::List(l) => l.failure(),
            _ => None,
        }
    }
}

pub struct Panel {
    name: String,
    kind: PanelKind,
    min_width: u16,
    min_height: u16,
    content: Content,
    formatter: Option<RowFormatter>,
    style: CellStyle,
    geometry: Option<Geometry>,
    cache: RowCache,
    stats: PaintStats,
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("min", &(self.min_width, self.min_height))
            .field("rows", &self.content.rows())
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl Panel {
    fn with_content(name: &str, kind: PanelKind, min_width: u16, min_height: u16, content: Content) -> Self {
        Self {
            name: name.to_string(),
            kind,
            min_width,
            min_height,
            content,
            formatter: None,
            style: CellStyle::empty(),
            geometry: None,
            cache: RowCache::new(),
            stats: PaintStats::default(),
        }
    }

    pub fn text(name: &str, min_width: u16, min_height: u16) -> Self {
        Self::with_content(name, PanelKind::Text, min_width, min_height, Content::Text(TextContent::default()))
    }

    /// List panel; the source is pulled once immediately and again on every
    /// [`Panel::refresh`].
    pub fn list(name: &str, min_width: u16, min_height: u16, source: ListSource) -> Self {
        let mut panel = Self::with_content(
            name,
            PanelKind::List,
            min_width,
            min_height,
            Content::List(ListContent::new(source)),
        );
        panel.refresh();
        panel
    }

    pub fn editable(name: &str, min_width: u16, min_height: u16) -> Self {
        Self::with_content(
            name,
            PanelKind::EditableText,
            min_width,
            min_height,
            Content::Editable(EditBuffer::new()),
        )
    }

    pub fn with_formatter(mut self, f: RowFormatter) -> Self {
        self.formatter = Some(f);
        self
    }

    /// Ignored for non-editable panels.
    pub fn with_save_callback(mut self, cb: SaveCallback) -> Self {
        if let Content::Editable(buf) = &mut self.content {
            buf.set_save_callback(cb);
        }
        self
    }

    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = style;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PanelKind {
        self.kind
    }

    pub fn is_editable(&self) -> bool {
        self.kind == PanelKind::EditableText
    }

    pub fn min_width(&self) -> u16 {
        self.min_width
    }

    pub fn min_height(&self) -> u16 {
        self.min_height
    }

    /// Changing minimums must be followed by a relayout request.
    pub fn set_min_size(&mut self, width: u16, height: u16) {
        self.min_width = width;
        self.min_height = height;
    }

    /// Logical content length, never below the minimum height.
    pub fn full_height(&self) -> usize {
        self.content.rows().max(self.min_height as usize)
    }

    /// Number of real content rows.
    pub fn content_rows(&self) -> usize {
        self.content.rows()
    }

    pub fn last_geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.content.failure()
    }

    pub fn take_stats(&mut self) -> PaintStats {
        std::mem::take(&mut self.stats)
    }

    /// Raw row text (unformatted).
    pub fn row(&self, idx: usize) -> Option<&str> {
        self.content.row(idx)
    }

    // ---- content mutation ------------------------------------------------

    /// Append a row to a text panel. Returns `false` for other kinds.
    pub fn append_line(&mut self, line: impl Into<String>) -> bool {
        match &mut self.content {
            Content::Text(t) => {
                t.push(line.into());
                true
            }
            _ => false,
        }
    }

    /// Replace all rows. For an editable panel this loads the buffer.
    pub fn set_lines(&mut self, lines: Vec<String>) -> bool {
        match &mut self.content {
            Content::Text(t) => {
                t.replace(lines);
                true
            }
            Content::Editable(e) => {
                e.load(&lines.join("\n"));
                true
            }
            Content::List(_) => false,
        }
    }

    pub fn clear_lines(&mut self) {
        match &mut self.content {
            Content::Text(t) => t.clear(),
            Content::Editable(e) => e.load(""),
            Content::List(_) => {}
        }
    }

    /// Re-pull a list panel's source. Failures are logged here and surface
    /// as a blank panel on the next paint.
    pub fn refresh(&mut self) {
        if let Content::List(list) = &mut self.content {
            match list.pull() {
                Ok(rows) => trace!(target: "panel", name = %self.name, rows, "list_refreshed"),
                Err(error) => {
                    warn!(target: "panel", name = %self.name, error, "list_source_failed")
                }
            }
        }
    }

    // ---- editing ---------------------------------------------------------

    pub fn handle_edit_key(&mut self, key: &KeyEvent) -> EditOutcome {
        match &mut self.content {
            Content::Editable(e) => e.handle_key(key),
            _ => EditOutcome::Ignored,
        }
    }

    pub fn insert_str(&mut self, s: &str) -> bool {
        match &mut self.content {
            Content::Editable(e) => {
                e.insert_str(s);
                true
            }
            _ => false,
        }
    }

    /// Run the save callback if the buffer has unsaved changes.
    pub fn commit(&mut self) -> bool {
        match &mut self.content {
            Content::Editable(e) => e.commit(),
            _ => false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(&self.content, Content::Editable(e) if e.is_dirty())
    }

    /// Whole buffer text of an editable panel.
    pub fn edit_text(&self) -> Option<String> {
        match &self.content {
            Content::Editable(e) => Some(e.text()),
            _ => None,
        }
    }

    /// Text cursor as `(column, content row)`; `None` for non-editable kinds.
    pub fn local_cursor(&self) -> Option<(usize, usize)> {
        match &self.content {
            Content::Editable(e) => Some(e.local_cursor()),
            _ => None,
        }
    }

    // ---- rendering -------------------------------------------------------

    fn shaped_row(&self, idx: usize, width: u16) -> Option<String> {
        let raw = self.content.row(idx)?;
        let shown: Cow<'_, str> = match &self.formatter {
            Some(f) => Cow::Owned(f(idx, raw)),
            None => Cow::Borrowed(raw),
        };
        Some(fit_to_width(&shown, width))
    }

    /// Write up to `area.height` content rows starting at `start_line`, each
    /// exactly `area.width` columns. Rows past the end of content are left to
    /// the caller. Returns the number of rows written.
    pub fn render<S: TerminalSurface + ?Sized>(
        &self,
        surface: &mut S,
        area: Rect,
        start_line: usize,
    ) -> Result<usize, RenderError> {
        if let Some(msg) = self.content.failure() {
            return Err(RenderError::Source(msg.to_string()));
        }
        let mut written = 0;
        for r in 0..area.height {
            let Some(row) = self.shaped_row(start_line + r as usize, area.width) else {
                break;
            };
            surface.write_at(area.x, area.y + r, &row, self.style)?;
            written += 1;
        }
        Ok(written)
    }

    /// Paint the given screen rows of geometry `g`, skipping rows the cache
    /// already holds. Content failures paint blanks and are counted.
    fn paint<S: TerminalSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        g: &Geometry,
        rows: impl IntoIterator<Item = i64>,
    ) -> anyhow::Result<()> {
        let failed = self.content.failure().is_some();
        for y in rows {
            let Ok(y) = u16::try_from(y) else { continue };
            let content_idx = y as i64 - g.virtual_top;
            let text = if failed || content_idx < 0 {
                None
            } else {
                self.shaped_row(content_idx as usize, g.width)
            };
            let text = text.unwrap_or_else(|| crate::text::blank(g.width));
            let hash = RowHash::of(&text);
            if self.cache.get(y) == Some(hash) {
                self.stats.skipped += 1;
                continue;
            }
            surface.write_at(g.left, y, &text, self.style)?;
            self.cache.set(y, hash);
            self.stats.written += 1;
        }
        Ok(())
    }

    /// Screen rows of `g` that need painting after a buffer move: the exposed
    /// screen rows plus any row the cache holds nothing for.
    fn rows_after_move(&self, g: &Geometry, exposed: &[Range<i64>]) -> Vec<i64> {
        g.screen_rows()
            .filter(|y| {
                exposed.iter().any(|r| r.contains(y))
                    || u16::try_from(*y).is_ok_and(|y| self.cache.get(y).is_none())
            })
            .collect()
    }

    fn note_failure(&mut self) {
        if let Some(error) = self.content.failure() {
            warn!(target: "panel", name = %self.name, error, "render_blank_after_source_failure");
            self.stats.failed += 1;
        }
    }

    /// Paint at a placement and record it as the last geometry.
    ///
    /// Drawing into the same screen rectangle as last time keeps the row cache,
    /// so redrawing in place only writes rows whose text changed.
    pub fn draw<S: TerminalSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        placement: &Placement,
    ) -> anyhow::Result<()> {
        let g = Geometry::from_placement(placement, self.full_height());
        let same_rect = self.geometry.is_some_and(|old| {
            (old.top, old.left, old.width, old.height) == (g.top, g.left, g.width, g.height)
        });
        if !same_rect || self.cache.len() != g.height as usize {
            self.cache.reset(g.top, g.height);
        }
        self.note_failure();
        self.paint(surface, &g, g.screen_rows())?;
        debug!(
            target: "panel",
            name = %self.name,
            top = g.top,
            left = g.left,
            width = g.width,
            height = g.height,
            start_line = g.start_line,
            "panel_drawn"
        );
        self.geometry = Some(g);
        Ok(())
    }

    /// Repaint at the cached geometry.
    pub fn rerender<S: TerminalSurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> anyhow::Result<Rerender> {
        let Some(g) = self.geometry else {
            return Ok(Rerender::WidthMismatch);
        };
        if g.width < self.min_width {
            return Ok(Rerender::WidthMismatch);
        }
        if self.full_height() != g.full_height
            || (g.height < self.min_height && !g.is_clipped())
        {
            return Ok(Rerender::HeightMismatch);
        }
        self.note_failure();
        self.paint(surface, &g, g.screen_rows())?;
        Ok(Rerender::Ok)
    }

    /// Shift the visible window by up to `lines` rows (positive: forward),
    /// clamped to the content. Rows still visible are carried by a buffer
    /// move; only rows entering the window are painted. Returns the distance
    /// actually moved.
    pub fn scroll<S: TerminalSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        lines: i64,
    ) -> anyhow::Result<i64> {
        let Some(mut g) = self.geometry else {
            return Ok(0);
        };
        let full = self.full_height() as i64;
        let max_start = (full - g.height as i64).max(0);
        let old_start = g.start_line as i64;
        let new_start = (old_start + lines).clamp(0, max_start);
        let delta = new_start - old_start;
        if delta == 0 {
            trace!(target: "panel", name = %self.name, lines, "scroll_clamped");
            return Ok(0);
        }
        match plan_shift(delta, g.height) {
            Some(shift) => {
                surface.move_block(
                    Rect::new(g.left, g.top + shift.src_offset, g.width, shift.rows),
                    g.left,
                    g.top + shift.dst_offset,
                )?;
                self.cache.shift(delta);
            }
            None => self.cache.invalidate_all(),
        }
        let exposed = compute_exposed_range(
            old_start..old_start + g.height as i64,
            new_start..new_start + g.height as i64,
            0..full,
        );
        g.start_line = new_start as usize;
        g.virtual_top = g.top as i64 - new_start;
        g.full_height = self.full_height();
        // Content rows to screen rows.
        let exposed: Vec<Range<i64>> = exposed
            .into_iter()
            .map(|r| r.start + g.virtual_top..r.end + g.virtual_top)
            .collect();
        let rows = self.rows_after_move(&g, &exposed);
        self.note_failure();
        self.paint(surface, &g, rows.iter().copied())?;
        trace!(
            target: "panel",
            name = %self.name,
            delta,
            exposed_rows = exposed.iter().map(|r| r.end - r.start).sum::<i64>(),
            painted = rows.len(),
            "panel_scrolled"
        );
        self.geometry = Some(g);
        Ok(delta)
    }

    /// Reposition a stack panel after the terminal window moved `lines` canvas
    /// rows, with content row 0 now anchored at canvas row `reference`.
    ///
    /// The caller has already carried surviving rows to their new screen
    /// position with a buffer move; this paints exactly the rows that became
    /// visible inside the first `budget` screen rows. Returns the new visible
    /// height.
    pub fn move_by<S: TerminalSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        lines: i64,
        reference: i64,
        budget: u16,
    ) -> anyhow::Result<u16> {
        let Some(mut g) = self.geometry else {
            return Ok(0);
        };
        let new_window_top = g.window_top() + lines;
        let new_virtual = reference - new_window_top;
        let screen_shift = new_virtual - g.virtual_top;
        // Content height as laid out; growth since then is a stack relayout's job.
        let full = g.full_height;
        let old_rows = g.screen_rows();
        let carried = old_rows.start + screen_shift..old_rows.end + screen_shift;
        let span = visible_span(new_virtual, full, budget);
        let exposed = compute_exposed_range(carried, span.clone(), 0..budget as i64);

        self.cache
            .rebase(span.start as u16, (span.end - span.start) as u16, screen_shift);
        let p = Placement::clipped(reference, new_virtual, full, g.left, g.width, budget, g.generation);
        g = Geometry::from_placement(&p, full);
        let rows = self.rows_after_move(&g, &exposed);
        if !rows.is_empty() {
            self.note_failure();
        }
        self.paint(surface, &g, rows.iter().copied())?;
        trace!(
            target: "panel",
            name = %self.name,
            lines,
            screen_shift,
            exposed = exposed.len(),
            painted = rows.len(),
            height = g.height,
            "panel_moved"
        );
        self.geometry = Some(g);
        Ok(g.height)
    }

    /// Forget the placement (panel closed or screen torn down).
    pub fn unplace(&mut self) {
        self.geometry = None;
        self.cache.clear();
    }

    /// Screen contents under this panel are unknown (terminal cleared or
    /// overwritten by a neighbor).
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::KeyCode;
    use core_terminal::HeadlessSurface;
    use pretty_assertions::assert_eq;

    fn log_panel(rows: usize) -> Panel {
        let mut p = Panel::text("log", 10, 3);
        for i in 0..rows {
            p.append_line(format!("line {i}"));
        }
        p
    }

    #[test]
    fn full_height_respects_minimum() {
        let mut p = Panel::text("log", 10, 3);
        assert_eq!(p.full_height(), 3);
        for i in 0..5 {
            p.append_line(format!("{i}"));
        }
        assert_eq!(p.full_height(), 5);
    }

    #[test]
    fn render_writes_only_existing_rows() {
        let p = log_panel(2);
        let mut s = HeadlessSurface::new(20, 5);
        let n = p.render(&mut s, Rect::new(0, 0, 10, 4), 0).unwrap();
        assert_eq!(n, 2);
        assert_eq!(s.row_text(0).trim_end(), "line 0");
        assert_eq!(s.counters().writes, 2);
    }

    #[test]
    fn draw_pads_and_records_geometry() {
        let mut p = log_panel(2);
        let mut s = HeadlessSurface::new(12, 5);
        p.draw(&mut s, &Placement::fixed(0, 0, 10, 4, 0, 1)).unwrap();
        let g = p.last_geometry().copied().unwrap();
        assert_eq!((g.height, g.full_height, g.generation), (4, 3, 1));
        assert_eq!(s.counters().writes, 4, "padding rows are written too");
    }

    #[test]
    fn rerender_twice_writes_nothing_new() {
        let mut p = log_panel(3);
        let mut s = HeadlessSurface::new(12, 5);
        p.draw(&mut s, &Placement::fixed(0, 0, 10, 4, 0, 1)).unwrap();
        let before = s.counters().writes;
        assert_eq!(p.rerender(&mut s).unwrap(), Rerender::Ok);
        assert_eq!(s.counters().writes, before);
    }

    #[test]
    fn rerender_reports_mismatches() {
        let mut p = log_panel(3);
        let mut s = HeadlessSurface::new(12, 5);
        assert_eq!(p.rerender(&mut s).unwrap(), Rerender::WidthMismatch);
        p.draw(&mut s, &Placement::fixed(0, 0, 10, 3, 0, 1)).unwrap();
        p.append_line("more");
        assert_eq!(p.rerender(&mut s).unwrap(), Rerender::HeightMismatch);
        p.draw(&mut s, &Placement::fixed(0, 0, 10, 3, 0, 2)).unwrap();
        p.set_min_size(11, 3);
        assert_eq!(p.rerender(&mut s).unwrap(), Rerender::WidthMismatch);
    }

    #[test]
    fn list_failure_renders_blank_and_counts() {
        let mut ok = true;
        let mut p = Panel::list(
            "players",
            8,
            2,
            Box::new(move || {
                if ok {
                    ok = false;
                    Ok(vec!["ann".into(), "bob".into()])
                } else {
                    anyhow::bail!("gone")
                }
            }),
        );
        let mut s = HeadlessSurface::new(8, 3);
        p.draw(&mut s, &Placement::fixed(0, 0, 8, 2, 0, 1)).unwrap();
        assert_eq!(s.row_text(1).trim_end(), "bob");
        p.refresh();
        assert!(matches!(
            p.render(&mut s, Rect::new(0, 0, 8, 2), 0),
            Err(RenderError::Source(_))
        ));
        assert_eq!(p.rerender(&mut s).unwrap(), Rerender::Ok);
        assert_eq!(s.row_text(1).trim_end(), "");
        assert_eq!(p.take_stats().failed, 1);
    }

    #[test]
    fn formatter_shapes_rows() {
        let mut p = Panel::text("log", 6, 1).with_formatter(Box::new(|i, s| format!("{i}:{s}")));
        p.append_line("ab");
        let mut s = HeadlessSurface::new(6, 1);
        p.draw(&mut s, &Placement::fixed(0, 0, 6, 1, 0, 1)).unwrap();
        assert_eq!(s.row_text(0), "0:ab  ");
    }

    #[test]
    fn editing_only_affects_editable_panels() {
        let mut log = log_panel(1);
        assert_eq!(log.handle_edit_key(&KeyEvent::plain(KeyCode::Char('x'))), EditOutcome::Ignored);
        let mut notes = Panel::editable("notes", 10, 2);
        assert_eq!(notes.handle_edit_key(&KeyEvent::plain(KeyCode::Char('x'))), EditOutcome::Changed);
        assert_eq!(notes.local_cursor(), Some((1, 0)));
        assert!(notes.is_dirty());
        assert!(!notes.append_line("no"));
    }
}

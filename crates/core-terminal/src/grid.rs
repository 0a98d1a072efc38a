//! Cell grid shared by the headless surface and the crossterm shadow buffer.
//!
//! `Cell` stores a full grapheme cluster for leader cells along with its visual
//! width; continuation cells (width == 0) occupy the remaining columns of a
//! multi-column cluster and never print text.
//!
//! Invariants:
//! - Leader: width >= 1, `cluster` non-empty.
//! - Continuation: width == 0, `cluster` empty, immediately right of its leader.
//! - Overwriting any column of a wide cluster blanks the rest of that cluster.

use crate::{CellStyle, Rect};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    cluster: String,
    width: u8,
    style: CellStyle,
}

impl Cell {
    #[inline]
    pub fn leader(cluster: &str, width: u16, style: CellStyle) -> Self {
        Self {
            cluster: cluster.to_string(),
            width: width.clamp(1, u8::MAX as u16) as u8,
            style,
        }
    }

    #[inline]
    pub fn continuation(style: CellStyle) -> Self {
        Self {
            cluster: String::new(),
            width: 0,
            style,
        }
    }

    #[inline]
    pub fn is_leader(&self) -> bool {
        self.width > 0
    }

    #[inline]
    pub fn visual_width(&self) -> u16 {
        self.width as u16
    }

    #[inline]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    #[inline]
    pub fn style(&self) -> CellStyle {
        self.style
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::leader(" ", 1, CellStyle::empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Blank every cell.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// Change dimensions, keeping the overlapping top-left region.
    pub fn resize(&mut self, width: u16, height: u16) {
        if width == self.width && height == self.height {
            return;
        }
        let mut next = Grid::new(width, height);
        let keep = Rect::new(0, 0, self.width.min(width), self.height.min(height));
        for y in 0..keep.height {
            for x in 0..keep.width {
                if let (Some(src), Some(dst)) = (self.index(x, y), next.index(x, y)) {
                    next.cells[dst] = self.cells[src].clone();
                }
            }
        }
        for y in 0..keep.height {
            next.repair_row_edges(y);
        }
        *self = next;
    }

    /// Write `text` at `(x, y)` without wrapping. Returns the number of
    /// columns written (may be less than the text's width when truncated).
    pub fn put_str(&mut self, x: u16, y: u16, text: &str, style: CellStyle) -> u16 {
        if y >= self.height || x >= self.width {
            return 0;
        }
        let mut col = x;
        for g in text.graphemes(true) {
            if col >= self.width {
                break;
            }
            let w = UnicodeWidthStr::width(g) as u16;
            if w == 0 {
                // Zero-width clusters (stray combining marks, controls) are dropped.
                continue;
            }
            if col + w > self.width {
                // Cluster does not fit: pad the tail with blanks instead.
                while col < self.width {
                    self.set_cluster(col, y, " ", 1, style);
                    col += 1;
                }
                break;
            }
            self.set_cluster(col, y, g, w, style);
            col += w;
        }
        col - x
    }

    /// Place one cluster, blanking any wide cluster it partially overwrites.
    fn set_cluster(&mut self, x: u16, y: u16, cluster: &str, width: u16, style: CellStyle) {
        self.break_cluster_at(x, y);
        let end = (x + width).min(self.width);
        for cx in x + 1..end {
            self.break_cluster_at(cx, y);
        }
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = Cell::leader(cluster, width, style);
        }
        for cx in x + 1..end {
            if let Some(idx) = self.index(cx, y) {
                self.cells[idx] = Cell::continuation(style);
            }
        }
    }

    /// If `(x, y)` belongs to a multi-column cluster, replace that whole
    /// cluster with blanks so a later write cannot leave half of it behind.
    fn break_cluster_at(&mut self, x: u16, y: u16) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        let cell = &self.cells[idx];
        if cell.is_leader() && cell.visual_width() == 1 {
            return;
        }
        let mut lead = x;
        while lead > 0 && !self.cells[self.index(lead, y).unwrap_or(idx)].is_leader() {
            lead -= 1;
        }
        let Some(lead_idx) = self.index(lead, y) else {
            return;
        };
        let span = self.cells[lead_idx].visual_width().max(1);
        let style = self.cells[lead_idx].style;
        for cx in lead..(lead + span).min(self.width) {
            if let Some(i) = self.index(cx, y) {
                self.cells[i] = Cell::leader(" ", 1, style);
            }
        }
    }

    /// After a block copy or resize the row edges may hold orphaned
    /// continuation cells or leaders whose continuations were cut off.
    fn repair_row_edges(&mut self, y: u16) {
        let mut x = 0u16;
        while x < self.width {
            let Some(idx) = self.index(x, y) else {
                return;
            };
            let cell = &self.cells[idx];
            if !cell.is_leader() {
                self.cells[idx] = Cell::default();
                x += 1;
                continue;
            }
            let w = cell.visual_width();
            let fits = x + w <= self.width
                && (1..w).all(|dx| {
                    self.index(x + dx, y)
                        .is_some_and(|i| !self.cells[i].is_leader())
                });
            if !fits {
                self.cells[idx] = Cell::default();
                x += 1;
                continue;
            }
            x += w;
        }
    }

    /// Copy `src` so its top-left lands on `(dst_x, dst_y)`. Both rectangles
    /// are clipped to the grid; overlapping regions copy correctly.
    pub fn copy_block(&mut self, src: Rect, dst_x: u16, dst_y: u16) {
        let src = src.clip_to(self.width, self.height);
        if src.is_empty() {
            return;
        }
        let width = src.width.min(self.width.saturating_sub(dst_x));
        let height = src.height.min(self.height.saturating_sub(dst_y));
        if width == 0 || height == 0 {
            return;
        }
        let snapshot: Vec<Vec<Cell>> = (0..height)
            .map(|dy| {
                (0..width)
                    .map(|dx| {
                        self.cell(src.x + dx, src.y + dy)
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();
        for (dy, row) in snapshot.into_iter().enumerate() {
            let y = dst_y + dy as u16;
            for (dx, cell) in row.into_iter().enumerate() {
                if let Some(idx) = self.index(dst_x + dx as u16, y) {
                    self.cells[idx] = cell;
                }
            }
            self.repair_row_edges(y);
        }
    }

    /// Iterate leader cells of a row, yielding `(cluster, width, style, x)`.
    pub fn row_leaders(&self, y: u16) -> impl Iterator<Item = (&str, u16, CellStyle, u16)> + '_ {
        let width = self.width;
        let start = y as usize * width as usize;
        let mut x = if y < self.height { 0u16 } else { width };
        std::iter::from_fn(move || {
            while x < width {
                let cell = &self.cells[start + x as usize];
                if cell.is_leader() {
                    let w = cell.visual_width();
                    let out = (cell.cluster(), w, cell.style, x);
                    x = x.saturating_add(w);
                    return Some(out);
                }
                x += 1;
            }
            None
        })
    }

    /// Text of a full row (leaders concatenated).
    pub fn row_text(&self, y: u16) -> String {
        self.row_leaders(y).map(|(c, _, _, _)| c).collect()
    }

    /// Text of the columns `[x, x + width)` of a row.
    pub fn span_text(&self, x: u16, y: u16, width: u16) -> String {
        let end = x.saturating_add(width);
        self.row_leaders(y)
            .filter(|(_, _, _, cx)| *cx >= x && *cx < end)
            .map(|(c, _, _, _)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn put_str_truncates_at_right_edge() {
        let mut g = Grid::new(5, 1);
        let written = g.put_str(2, 0, "abcdef", CellStyle::empty());
        assert_eq!(written, 3);
        assert_eq!(g.row_text(0), "  abc");
    }

    #[test]
    fn wide_cluster_that_does_not_fit_is_blanked() {
        let mut g = Grid::new(4, 1);
        g.put_str(0, 0, "ab漢", CellStyle::empty());
        assert_eq!(g.row_text(0), "ab漢");
        let mut g = Grid::new(3, 1);
        g.put_str(0, 0, "ab漢", CellStyle::empty());
        assert_eq!(g.row_text(0), "ab ");
    }

    #[test]
    fn overwriting_half_a_wide_cluster_blanks_the_rest() {
        let mut g = Grid::new(4, 1);
        g.put_str(0, 0, "漢字", CellStyle::empty());
        g.put_str(1, 0, "x", CellStyle::empty());
        assert_eq!(g.row_text(0), " x字");
    }

    #[test]
    fn copy_block_handles_downward_overlap() {
        let mut g = Grid::new(3, 4);
        for (y, s) in ["aaa", "bbb", "ccc", "ddd"].iter().enumerate() {
            g.put_str(0, y as u16, s, CellStyle::empty());
        }
        g.copy_block(Rect::new(0, 0, 3, 3), 0, 1);
        let rows: Vec<String> = (0..4).map(|y| g.row_text(y)).collect();
        assert_eq!(rows, vec!["aaa", "aaa", "bbb", "ccc"]);
    }

    #[test]
    fn copy_block_handles_upward_overlap() {
        let mut g = Grid::new(3, 4);
        for (y, s) in ["aaa", "bbb", "ccc", "ddd"].iter().enumerate() {
            g.put_str(0, y as u16, s, CellStyle::empty());
        }
        g.copy_block(Rect::new(0, 2, 3, 2), 0, 0);
        let rows: Vec<String> = (0..4).map(|y| g.row_text(y)).collect();
        assert_eq!(rows, vec!["ccc", "ddd", "ccc", "ddd"]);
    }

    #[test]
    fn resize_keeps_top_left_region() {
        let mut g = Grid::new(4, 2);
        g.put_str(0, 0, "abcd", CellStyle::empty());
        g.resize(6, 3);
        assert_eq!(g.row_text(0), "abcd  ");
        assert_eq!(g.row_text(2), "      ");
        g.resize(2, 1);
        assert_eq!(g.row_text(0), "ab");
    }

    #[test]
    fn span_text_extracts_columns() {
        let mut g = Grid::new(8, 1);
        g.put_str(0, 0, "left|rgt", CellStyle::empty());
        assert_eq!(g.span_text(5, 0, 3), "rgt");
    }
}

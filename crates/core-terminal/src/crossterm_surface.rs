//! Crossterm-backed terminal surface.
//!
//! Keeps a shadow [`Grid`] of what the terminal shows. Primitives update the
//! shadow immediately and append to a command queue; nothing reaches the
//! output until `flush`, so one render pass produces one contiguous write.
//!
//! Buffer moves:
//! * Full-width blocks on terminals with scroll-region support are shifted with
//!   `ESC[top;bottom r` + `ESC[n S` / `ESC[n T`, then the region rows the shift
//!   blanked but the copy semantics keep are re-emitted from the shadow.
//! * Anything else re-emits the destination rows from the shadow grid. This is
//!   still cheaper than asking the panel to render again and keeps the
//!   terminal and the shadow identical.
//!
//! Batching rule: consecutive cells sharing a style are emitted as one
//! `Print`; a style change flushes the run.

use crate::{CellStyle, Grid, Rect, TerminalCapabilities, TerminalSurface};
use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{self, Clear, ClearType, SetSize},
};
use std::io::{Stdout, Write, stdout};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    MoveTo(u16, u16),
    Style(CellStyle),
    Print(String),
    /// Raw escape sequence (scroll region control).
    Raw(String),
    ClearAll,
    SetSize(u16, u16),
}

pub struct CrosstermSurface<W: Write = Stdout> {
    out: W,
    shadow: Grid,
    cmds: Vec<Command>,
    caps: TerminalCapabilities,
    cursor: Option<(u16, u16)>,
    /// Query the real terminal size in `size()`; off for captured writers.
    live_size: bool,
    /// Style the terminal is currently in, as far as queued commands go.
    pen: CellStyle,
}

impl CrosstermSurface<Stdout> {
    /// Surface writing to stdout, sized from the current terminal.
    pub fn stdout(caps: TerminalCapabilities) -> Result<Self> {
        let (w, h) = terminal::size()?;
        let mut s = Self::with_writer(stdout(), w, h, caps);
        s.live_size = true;
        Ok(s)
    }
}

impl<W: Write> CrosstermSurface<W> {
    /// Surface over an arbitrary writer with a fixed initial size.
    pub fn with_writer(out: W, width: u16, height: u16, caps: TerminalCapabilities) -> Self {
        Self {
            out,
            shadow: Grid::new(width, height),
            cmds: Vec::new(),
            caps,
            cursor: None,
            live_size: false,
            pen: CellStyle::empty(),
        }
    }

    pub fn shadow(&self) -> &Grid {
        &self.shadow
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn sync_shadow_size(&mut self) {
        if self.live_size
            && let Ok((w, h)) = terminal::size()
        {
            self.shadow.resize(w, h);
        }
    }

    fn set_pen(&mut self, style: CellStyle) {
        if style != self.pen {
            self.cmds.push(Command::Style(style));
            self.pen = style;
        }
    }

    /// Queue the shadow content of columns `[x, x + width)` on row `y`.
    fn emit_span(&mut self, x: u16, y: u16, width: u16) {
        let end = x.saturating_add(width);
        let mut runs: Vec<(CellStyle, String, u16)> = Vec::new();
        for (cluster, _, style, cx) in self.shadow.row_leaders(y) {
            if cx < x || cx >= end {
                continue;
            }
            match runs.last_mut() {
                Some((s, text, _)) if *s == style => text.push_str(cluster),
                _ => runs.push((style, cluster.to_string(), cx)),
            }
        }
        if let Some((_, _, first_x)) = runs.first() {
            self.cmds.push(Command::MoveTo(*first_x, y));
        }
        for (style, text, _) in runs {
            self.set_pen(style);
            self.cmds.push(Command::Print(text));
        }
    }

    fn scroll_region_shift(&mut self, src: Rect, dst_y: u16) {
        let top = src.y.min(dst_y);
        let bottom = src.bottom().max(dst_y + src.height);
        let shift = src.y as i32 - dst_y as i32;
        self.cmds
            .push(Command::Raw(format!("\x1b[{};{}r", top + 1, bottom)));
        if shift > 0 {
            self.cmds.push(Command::Raw(format!("\x1b[{}S", shift)));
        } else {
            self.cmds.push(Command::Raw(format!("\x1b[{}T", -shift)));
        }
        self.cmds.push(Command::Raw("\x1b[r".to_string()));
        // The terminal blanked the rows vacated by the shift; copy semantics
        // keep the old content there, so put it back.
        let dst = top..bottom;
        let moved = dst_y..dst_y + src.height;
        for y in dst.filter(|y| !moved.contains(y)) {
            self.emit_span(0, y, self.shadow.width());
        }
        tracing::trace!(target: "terminal.surface", top, bottom, shift, "scroll_region_shift");
    }
}

impl<W: Write> TerminalSurface for CrosstermSurface<W> {
    fn size(&self) -> (u16, u16) {
        if self.live_size
            && let Ok(size) = terminal::size()
        {
            return size;
        }
        (self.shadow.width(), self.shadow.height())
    }

    fn resize(&mut self, width: u16, height: u16) -> Result<()> {
        let (cw, ch) = self.size();
        let (w, h) = (width.max(cw), height.max(ch));
        if (w, h) != (cw, ch) {
            self.cmds.push(Command::SetSize(w, h));
            tracing::info!(target: "terminal.surface", from_w = cw, from_h = ch, w, h, "grow_request");
            // Flush now so the size query that follows sees the outcome.
            self.flush()?;
        }
        self.sync_shadow_size();
        if !self.live_size {
            self.shadow.resize(w, h);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.sync_shadow_size();
        self.shadow.clear();
        self.cmds.push(Command::ClearAll);
        Ok(())
    }

    fn write_at(&mut self, x: u16, y: u16, text: &str, style: CellStyle) -> Result<()> {
        let cols = self.shadow.put_str(x, y, text, style);
        if cols > 0 {
            self.emit_span(x, y, cols);
        }
        Ok(())
    }

    fn move_block(&mut self, src: Rect, dst_x: u16, dst_y: u16) -> Result<()> {
        let (w, h) = (self.shadow.width(), self.shadow.height());
        let src = src.clip_to(w, h);
        if src.is_empty() || (src.x == dst_x && src.y == dst_y) {
            return Ok(());
        }
        self.shadow.copy_block(src, dst_x, dst_y);
        let full_width = src.x == 0 && dst_x == 0 && src.width == w;
        let fits = dst_y.saturating_add(src.height) <= h;
        if full_width && fits && self.caps.supports_scroll_region {
            self.scroll_region_shift(src, dst_y);
        } else {
            let rows = src.height.min(h.saturating_sub(dst_y));
            let cols = src.width.min(w.saturating_sub(dst_x));
            for y in dst_y..dst_y + rows {
                self.emit_span(dst_x, y, cols);
            }
        }
        Ok(())
    }

    fn set_cursor(&mut self, pos: Option<(u16, u16)>) -> Result<()> {
        self.cursor = pos;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for c in self.cmds.drain(..) {
            match c {
                Command::MoveTo(x, y) => queue!(self.out, MoveTo(x, y))?,
                Command::Style(style) => {
                    queue!(self.out, SetAttribute(Attribute::Reset))?;
                    if style.contains(CellStyle::BOLD) {
                        queue!(self.out, SetAttribute(Attribute::Bold))?;
                    }
                    if style.contains(CellStyle::DIM) {
                        queue!(self.out, SetAttribute(Attribute::Dim))?;
                    }
                    if style.contains(CellStyle::REVERSE) {
                        queue!(self.out, SetAttribute(Attribute::Reverse))?;
                    }
                }
                Command::Print(s) => queue!(self.out, Print(s))?,
                Command::Raw(seq) => self.out.write_all(seq.as_bytes())?,
                Command::ClearAll => queue!(self.out, Clear(ClearType::All))?,
                Command::SetSize(w, h) => queue!(self.out, SetSize(w, h))?,
            }
        }
        match self.cursor {
            Some((x, y)) => queue!(self.out, MoveTo(x, y), Show)?,
            None => queue!(self.out, Hide)?,
        }
        self.out.flush()?;
        Ok(())
    }
}

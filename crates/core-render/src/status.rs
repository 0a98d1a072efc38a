//! Status/input line on the last terminal row.
//!
//! The row has two halves: the command input (prompt plus the buffer being
//! typed) on the left and the collaborator-supplied status text right-aligned
//! after it. When the input outgrows the row its head scrolls out of view so
//! the editing cursor stays visible; the status text gives way first.
//!
//! `draw` remembers what it last wrote and skips the write when the composed
//! row is unchanged.

use core_events::{KeyCode, KeyEvent, KeyModifiers};
use core_panel::text::{display_width, fit_to_width, next_boundary, prefix_width, prev_boundary};
use core_terminal::{CellStyle, TerminalSurface};

/// Outcome of feeding a key to the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Changed,
    /// Enter pressed on a non-empty buffer; the buffer is handed over and
    /// cleared.
    Submitted(String),
    Ignored,
}

#[derive(Debug, Clone)]
pub struct StatusLine {
    text: String,
    prompt: String,
    input: String,
    /// Byte offset into `input`, always on a grapheme boundary.
    cursor: usize,
    last_drawn: Option<(u16, String)>,
}

impl StatusLine {
    pub fn new(prompt: &str) -> Self {
        Self {
            text: String::new(),
            prompt: prompt.to_string(),
            input: String::new(),
            cursor: 0,
            last_drawn: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns `false` when the text is unchanged.
    pub fn set_text(&mut self, text: &str) -> bool {
        let clean = text.replace(['\n', '\r'], " ");
        if clean == self.text {
            return false;
        }
        self.text = clean;
        true
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> StatusOutcome {
        if key.mods.intersects(KeyModifiers::CTRL | KeyModifiers::ALT) {
            return StatusOutcome::Ignored;
        }
        match key.code {
            KeyCode::Char(c) => {
                self.input.insert(self.cursor, c);
                self.cursor += c.len_utf8();
            }
            KeyCode::Backspace => {
                if self.cursor == 0 {
                    return StatusOutcome::Ignored;
                }
                let start = prev_boundary(&self.input, self.cursor);
                self.input.replace_range(start..self.cursor, "");
                self.cursor = start;
            }
            KeyCode::Delete => {
                if self.cursor >= self.input.len() {
                    return StatusOutcome::Ignored;
                }
                let end = next_boundary(&self.input, self.cursor);
                self.input.replace_range(self.cursor..end, "");
            }
            KeyCode::Left if self.cursor > 0 => {
                self.cursor = prev_boundary(&self.input, self.cursor);
            }
            KeyCode::Right if self.cursor < self.input.len() => {
                self.cursor = next_boundary(&self.input, self.cursor);
            }
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.len(),
            KeyCode::Enter => {
                if self.input.trim().is_empty() {
                    return StatusOutcome::Ignored;
                }
                self.cursor = 0;
                return StatusOutcome::Submitted(std::mem::take(&mut self.input));
            }
            _ => return StatusOutcome::Ignored,
        }
        StatusOutcome::Changed
    }

    /// Insert pasted text at the cursor; line breaks become spaces.
    pub fn insert_str(&mut self, s: &str) {
        let clean = s.replace("\r\n", " ").replace(['\n', '\r'], " ");
        self.input.insert_str(self.cursor, &clean);
        self.cursor += clean.len();
    }

    /// Byte offset where the visible part of the input starts for `width`.
    fn input_skip(&self, width: u16) -> usize {
        let room = (width as usize)
            .saturating_sub(display_width(&self.prompt))
            .saturating_sub(1);
        let mut skip = 0;
        while prefix_width(&self.input, self.cursor) - prefix_width(&self.input, skip) > room {
            skip = next_boundary(&self.input, skip);
        }
        skip
    }

    /// The row as it should appear, exactly `width` columns.
    pub fn compose(&self, width: u16) -> String {
        let skip = self.input_skip(width);
        let left = format!("{}{}", self.prompt, &self.input[skip..]);
        let left_w = display_width(&left);
        let text_w = display_width(&self.text);
        let width_us = width as usize;
        if !self.text.is_empty() && left_w + 1 + text_w <= width_us {
            let gap = width_us - left_w - text_w;
            let row = format!("{left}{}{}", " ".repeat(gap), self.text);
            return fit_to_width(&row, width);
        }
        fit_to_width(&left, width)
    }

    /// Column of the hardware cursor while the input line owns it.
    pub fn cursor_col(&self, width: u16) -> u16 {
        let skip = self.input_skip(width);
        let col = display_width(&self.prompt) + prefix_width(&self.input[skip..], self.cursor - skip);
        col.min(width.saturating_sub(1) as usize) as u16
    }

    /// Write the row at screen row `y` unless it already shows the same text.
    /// Returns whether anything was written.
    pub fn draw<S: TerminalSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        width: u16,
        y: u16,
    ) -> anyhow::Result<bool> {
        let row = self.compose(width);
        if self
            .last_drawn
            .as_ref()
            .is_some_and(|(last_y, last)| *last_y == y && *last == row)
        {
            return Ok(false);
        }
        surface.write_at(0, y, &row, CellStyle::empty())?;
        self.last_drawn = Some((y, row));
        Ok(true)
    }

    /// Forget what is on screen (after a clear).
    pub fn invalidate(&mut self) {
        self.last_drawn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_terminal::HeadlessSurface;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::plain(code)
    }

    fn typed(s: &str) -> StatusLine {
        let mut line = StatusLine::new("> ");
        for c in s.chars() {
            line.handle_key(&key(KeyCode::Char(c)));
        }
        line
    }

    #[test]
    fn status_text_is_right_aligned() {
        let mut line = typed("hi");
        line.set_text("lobby");
        assert_eq!(line.compose(12), "> hi   lobby");
        assert_eq!(line.cursor_col(12), 4);
    }

    #[test]
    fn long_input_scrolls_and_hides_status() {
        let mut line = typed("abcdefghij");
        line.set_text("status");
        let row = line.compose(8);
        assert_eq!(row, "> fghij ");
        assert_eq!(line.cursor_col(8), 7);
    }

    #[test]
    fn editing_keys_and_submit() {
        let mut line = typed("helo");
        line.handle_key(&key(KeyCode::Left));
        line.handle_key(&key(KeyCode::Char('l')));
        assert_eq!(line.input(), "hello");
        line.handle_key(&key(KeyCode::Home));
        line.handle_key(&key(KeyCode::Delete));
        assert_eq!(line.input(), "ello");
        assert_eq!(
            line.handle_key(&key(KeyCode::Enter)),
            StatusOutcome::Submitted("ello".into())
        );
        assert_eq!(line.input(), "");
        assert_eq!(line.handle_key(&key(KeyCode::Enter)), StatusOutcome::Ignored);
        assert_eq!(line.handle_key(&key(KeyCode::Backspace)), StatusOutcome::Ignored);
    }

    #[test]
    fn paste_flattens_newlines() {
        let mut line = StatusLine::new("> ");
        line.insert_str("a\nb\r\nc");
        assert_eq!(line.input(), "a b c");
    }

    #[test]
    fn unchanged_row_is_not_rewritten() {
        let mut s = HeadlessSurface::new(20, 3);
        let mut line = StatusLine::new("> ");
        line.set_text("ready");
        assert!(line.draw(&mut s, 20, 2).unwrap());
        assert!(!line.draw(&mut s, 20, 2).unwrap());
        assert_eq!(s.counters().writes, 1);
        assert!(!line.set_text("ready"));
        line.invalidate();
        assert!(line.draw(&mut s, 20, 2).unwrap());
        let row = s.row_text(2);
        assert!(row.starts_with("> ") && row.ends_with("ready"), "{row:?}");
    }
}

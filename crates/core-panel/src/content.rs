//! Content behind the three panel kinds.
//!
//! * [`TextContent`]: rows appended or replaced by collaborators (logs).
//! * [`ListContent`]: rows pulled from an injected source closure; the pull
//!   result (or its failure) is kept until the next `refresh`.
//! * [`EditBuffer`]: multi-line text with a grapheme-aware cursor, a dirty
//!   flag and an optional save callback.

use crate::text::{byte_for_col, next_boundary, prefix_width, prev_boundary};
use core_events::{KeyCode, KeyEvent, KeyModifiers};

/// Source closure of a list panel.
pub type ListSource = Box<dyn FnMut() -> anyhow::Result<Vec<String>> + Send>;

/// Save callback of an editable panel; receives the whole buffer text.
pub type SaveCallback = Box<dyn FnMut(&str) + Send>;

#[derive(Debug, Default, Clone)]
pub struct TextContent {
    lines: Vec<String>,
}

impl TextContent {
    pub fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn replace(&mut self, lines: Vec<String>) {
        self.lines = lines;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }
}

pub struct ListContent {
    source: ListSource,
    rows: Vec<String>,
    failure: Option<String>,
}

impl std::fmt::Debug for ListContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListContent")
            .field("rows", &self.rows.len())
            .field("failure", &self.failure)
            .finish()
    }
}

impl ListContent {
    pub fn new(source: ListSource) -> Self {
        Self {
            source,
            rows: Vec::new(),
            failure: None,
        }
    }

    /// Pull rows from the source. On failure the previous rows are dropped so
    /// the panel renders blank until a later pull succeeds.
    pub fn pull(&mut self) -> Result<usize, &str> {
        match (self.source)() {
            Ok(rows) => {
                self.rows = rows;
                self.failure = None;
                Ok(self.rows.len())
            }
            Err(e) => {
                self.rows.clear();
                self.failure = Some(format!("{e:#}"));
                Err(self.failure.as_deref().unwrap_or_default())
            }
        }
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&str> {
        self.rows.get(idx).map(String::as_str)
    }
}

/// Text cursor: line index and byte offset on a grapheme boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextCursor {
    pub line: usize,
    pub byte: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Buffer text changed.
    Changed,
    /// Only the cursor moved.
    Moved,
    /// Key has no meaning for the buffer.
    Ignored,
}

pub struct EditBuffer {
    lines: Vec<String>,
    cursor: TextCursor,
    /// Display column kept across vertical motions.
    sticky_col: Option<usize>,
    dirty: bool,
    on_save: Option<SaveCallback>,
}

impl std::fmt::Debug for EditBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditBuffer")
            .field("lines", &self.lines.len())
            .field("cursor", &self.cursor)
            .field("dirty", &self.dirty)
            .field("has_save", &self.on_save.is_some())
            .finish()
    }
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EditBuffer {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor: TextCursor::default(),
            sticky_col: None,
            dirty: false,
            on_save: None,
        }
    }

    pub fn set_save_callback(&mut self, cb: SaveCallback) {
        self.on_save = Some(cb);
    }

    /// Replace the text without marking the buffer dirty (initial load).
    pub fn load(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
        self.cursor = TextCursor::default();
        self.sticky_col = None;
        self.dirty = false;
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<&str> {
        self.lines.get(idx).map(String::as_str)
    }

    pub fn cursor(&self) -> TextCursor {
        self.cursor
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Cursor as `(display column, line)` relative to the content origin.
    pub fn local_cursor(&self) -> (usize, usize) {
        let line = &self.lines[self.cursor.line];
        (prefix_width(line, self.cursor.byte), self.cursor.line)
    }

    /// Invoke the save callback if there are unsaved changes. Returns whether
    /// it ran; a second call without further edits is a no-op.
    pub fn commit(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        match self.on_save.as_mut() {
            Some(cb) => {
                let text = self.lines.join("\n");
                cb(&text);
                true
            }
            None => false,
        }
    }

    /// Insert `s` at the cursor. Newlines split the current line.
    pub fn insert_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        let mut parts = s.split('\n');
        if let Some(first) = parts.next() {
            let line = &mut self.lines[self.cursor.line];
            line.insert_str(self.cursor.byte, first);
            self.cursor.byte += first.len();
        }
        for part in parts {
            self.split_line();
            let line = &mut self.lines[self.cursor.line];
            line.insert_str(0, part);
            self.cursor.byte = part.len();
        }
        self.sticky_col = None;
        self.dirty = true;
    }

    fn split_line(&mut self) {
        let tail = self.lines[self.cursor.line].split_off(self.cursor.byte);
        self.lines.insert(self.cursor.line + 1, tail);
        self.cursor.line += 1;
        self.cursor.byte = 0;
    }

    fn backspace(&mut self) -> EditOutcome {
        let TextCursor { line, byte } = self.cursor;
        if byte == 0 {
            if line == 0 {
                return EditOutcome::Ignored;
            }
            let removed = self.lines.remove(line);
            let prev = &mut self.lines[line - 1];
            self.cursor = TextCursor {
                line: line - 1,
                byte: prev.len(),
            };
            prev.push_str(&removed);
        } else {
            let cur = &mut self.lines[line];
            let start = prev_boundary(cur, byte);
            cur.replace_range(start..byte, "");
            self.cursor.byte = start;
        }
        self.dirty = true;
        EditOutcome::Changed
    }

    fn delete(&mut self) -> EditOutcome {
        let TextCursor { line, byte } = self.cursor;
        if byte >= self.lines[line].len() {
            if line + 1 >= self.lines.len() {
                return EditOutcome::Ignored;
            }
            let next = self.lines.remove(line + 1);
            self.lines[line].push_str(&next);
        } else {
            let cur = &mut self.lines[line];
            let end = next_boundary(cur, byte);
            cur.replace_range(byte..end, "");
        }
        self.dirty = true;
        EditOutcome::Changed
    }

    fn vertical(&mut self, down: bool) -> EditOutcome {
        let target = if down {
            self.cursor.line + 1
        } else {
            match self.cursor.line.checked_sub(1) {
                Some(l) => l,
                None => return EditOutcome::Ignored,
            }
        };
        if target >= self.lines.len() {
            return EditOutcome::Ignored;
        }
        let col = *self.sticky_col.get_or_insert_with(|| {
            prefix_width(&self.lines[self.cursor.line], self.cursor.byte)
        });
        self.cursor = TextCursor {
            line: target,
            byte: byte_for_col(&self.lines[target], col),
        };
        EditOutcome::Moved
    }

    /// Apply an editing key.
    pub fn handle_key(&mut self, key: &KeyEvent) -> EditOutcome {
        if key.mods.intersects(KeyModifiers::CTRL | KeyModifiers::ALT) {
            return EditOutcome::Ignored;
        }
        if !matches!(key.code, KeyCode::Up | KeyCode::Down) {
            self.sticky_col = None;
        }
        let line_len = self.lines[self.cursor.line].len();
        match key.code {
            KeyCode::Char(c) => {
                let mut buf = [0u8; 4];
                self.insert_str(c.encode_utf8(&mut buf));
                EditOutcome::Changed
            }
            KeyCode::Tab => {
                self.insert_str("    ");
                EditOutcome::Changed
            }
            KeyCode::Enter => {
                self.split_line();
                self.dirty = true;
                EditOutcome::Changed
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => {
                if self.cursor.byte > 0 {
                    self.cursor.byte = prev_boundary(&self.lines[self.cursor.line], self.cursor.byte);
                } else if self.cursor.line > 0 {
                    self.cursor.line -= 1;
                    self.cursor.byte = self.lines[self.cursor.line].len();
                } else {
                    return EditOutcome::Ignored;
                }
                EditOutcome::Moved
            }
            KeyCode::Right => {
                if self.cursor.byte < line_len {
                    self.cursor.byte = next_boundary(&self.lines[self.cursor.line], self.cursor.byte);
                } else if self.cursor.line + 1 < self.lines.len() {
                    self.cursor.line += 1;
                    self.cursor.byte = 0;
                } else {
                    return EditOutcome::Ignored;
                }
                EditOutcome::Moved
            }
            KeyCode::Up => self.vertical(false),
            KeyCode::Down => self.vertical(true),
            KeyCode::Home => {
                self.cursor.byte = 0;
                EditOutcome::Moved
            }
            KeyCode::End => {
                self.cursor.byte = line_len;
                EditOutcome::Moved
            }
            _ => EditOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::plain(code)
    }

    fn type_str(buf: &mut EditBuffer, s: &str) {
        for c in s.chars() {
            buf.handle_key(&key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typing_and_enter_build_lines() {
        let mut b = EditBuffer::new();
        type_str(&mut b, "ab");
        b.handle_key(&key(KeyCode::Enter));
        type_str(&mut b, "cd");
        assert_eq!(b.text(), "ab\ncd");
        assert_eq!(b.local_cursor(), (2, 1));
        assert!(b.is_dirty());
    }

    #[test]
    fn backspace_joins_lines_and_respects_clusters() {
        let mut b = EditBuffer::new();
        b.insert_str("x\n漢e\u{301}");
        b.handle_key(&key(KeyCode::Backspace));
        assert_eq!(b.text(), "x\n漢");
        b.handle_key(&key(KeyCode::Home));
        b.handle_key(&key(KeyCode::Backspace));
        assert_eq!(b.text(), "x漢");
        assert_eq!(b.local_cursor(), (1, 0));
    }

    #[test]
    fn delete_at_line_end_pulls_next_line() {
        let mut b = EditBuffer::new();
        b.load("ab\ncd");
        b.handle_key(&key(KeyCode::End));
        assert_eq!(b.handle_key(&key(KeyCode::Delete)), EditOutcome::Changed);
        assert_eq!(b.text(), "abcd");
    }

    #[test]
    fn vertical_motion_keeps_column() {
        let mut b = EditBuffer::new();
        b.load("abcdef\nab\nabcdef");
        b.handle_key(&key(KeyCode::End));
        b.handle_key(&key(KeyCode::Down));
        assert_eq!(b.local_cursor(), (2, 1));
        b.handle_key(&key(KeyCode::Down));
        assert_eq!(b.local_cursor(), (6, 2));
        assert_eq!(b.handle_key(&key(KeyCode::Down)), EditOutcome::Ignored);
        assert!(!b.is_dirty(), "motions do not dirty the buffer");
    }

    #[test]
    fn commit_runs_once_per_dirty_period() {
        let saved = Arc::new(Mutex::new(Vec::new()));
        let sink = saved.clone();
        let mut b = EditBuffer::new();
        b.set_save_callback(Box::new(move |t| sink.lock().unwrap().push(t.to_string())));
        assert!(!b.commit());
        type_str(&mut b, "hi");
        assert!(b.commit());
        assert!(!b.commit());
        assert_eq!(*saved.lock().unwrap(), vec!["hi".to_string()]);
    }

    #[test]
    fn list_failure_clears_rows() {
        let mut fail = false;
        let mut list = ListContent::new(Box::new(move || {
            if fail {
                anyhow::bail!("source offline");
            }
            fail = true;
            Ok(vec!["one".into(), "two".into()])
        }));
        assert_eq!(list.pull(), Ok(2));
        assert!(list.pull().is_err());
        assert!(list.is_empty());
        assert_eq!(list.failure(), Some("source offline"));
    }
}

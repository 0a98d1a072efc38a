//! Per-panel cache of what was last written on each screen row.
//!
//! Every row a panel writes is exactly `width` columns, so a `(hash, len)`
//! pair of the fitted text identifies the row's screen content. A cached
//! paint compares the row it is about to write with the entry for that screen
//! row and skips the write on a match; this is what makes a repeated
//! `rerender` free.
//!
//! Entries are keyed by absolute screen row (`origin + index`). A buffer move
//! carries rows to new screen positions, so the cache is shifted with it;
//! rows that were not carried become `None` and are painted on the next pass.

use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// Hash metadata for one written row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowHash {
    pub hash: u64,
    pub len: usize,
}

impl RowHash {
    pub fn of(text: &str) -> Self {
        let mut hasher = AHasher::default();
        text.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            len: text.len(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RowCache {
    /// Screen row represented by `rows[0]`.
    origin: u16,
    rows: Vec<Option<RowHash>>,
}

impl RowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cold cache covering `len` screen rows starting at `origin`.
    pub fn reset(&mut self, origin: u16, len: u16) {
        self.origin = origin;
        self.rows.clear();
        self.rows.resize(len as usize, None);
    }

    pub fn clear(&mut self) {
        self.origin = 0;
        self.rows.clear();
    }

    pub fn origin(&self) -> u16 {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn slot(&self, y: i64) -> Option<usize> {
        let idx = y - self.origin as i64;
        (idx >= 0 && (idx as usize) < self.rows.len()).then_some(idx as usize)
    }

    pub fn get(&self, y: u16) -> Option<RowHash> {
        self.slot(y as i64).and_then(|i| self.rows[i])
    }

    pub fn set(&mut self, y: u16, entry: RowHash) {
        if let Some(i) = self.slot(y as i64) {
            self.rows[i] = Some(entry);
        }
    }

    pub fn invalidate(&mut self, y: u16) {
        if let Some(i) = self.slot(y as i64) {
            self.rows[i] = None;
        }
    }

    /// Mark every row unknown while keeping the covered span.
    pub fn invalidate_all(&mut self) {
        self.rows.iter_mut().for_each(|r| *r = None);
    }

    /// Follow an in-place block move of the covered span: content moved up by
    /// `delta` rows (negative: down). Rows entering the span become `None`.
    pub fn shift(&mut self, delta: i64) {
        let len = self.rows.len();
        let abs = delta.unsigned_abs() as usize;
        if delta == 0 {
            return;
        }
        if abs >= len {
            self.invalidate_all();
            return;
        }
        if delta > 0 {
            self.rows.copy_within(abs..len, 0);
            self.rows[len - abs..].iter_mut().for_each(|r| *r = None);
        } else {
            self.rows.copy_within(0..len - abs, abs);
            self.rows[..abs].iter_mut().for_each(|r| *r = None);
        }
    }

    /// Re-home the cache on a new span after the panel was carried by
    /// `screen_shift` rows (positive: down). Entries whose row landed inside
    /// the new span survive at their new position.
    pub fn rebase(&mut self, new_origin: u16, new_len: u16, screen_shift: i64) {
        let mut next = vec![None; new_len as usize];
        for (i, slot) in next.iter_mut().enumerate() {
            let y = new_origin as i64 + i as i64;
            if let Some(j) = self.slot(y - screen_shift) {
                *slot = self.rows[j];
            }
        }
        self.origin = new_origin;
        self.rows = next;
    }
}

//! Width-aware row shaping.
//!
//! Panels hand the surface rows that are exactly `width` columns wide: long
//! rows are cut at a grapheme boundary, short rows are padded with spaces so
//! a shrinking row never leaves stale characters behind.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width of a single grapheme cluster. Control characters render as
/// one blank column (see [`sanitize`]).
#[inline]
pub fn grapheme_width(g: &str) -> usize {
    if g.chars().any(char::is_control) {
        return 1;
    }
    UnicodeWidthStr::width(g)
}

/// Display width of `s` in terminal columns.
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).map(grapheme_width).sum()
}

/// Replace control characters (tabs, stray escapes) with spaces so they can
/// never reach the terminal as commands.
pub fn sanitize(s: &str) -> std::borrow::Cow<'_, str> {
    if s.chars().any(char::is_control) {
        std::borrow::Cow::Owned(
            s.chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
        )
    } else {
        std::borrow::Cow::Borrowed(s)
    }
}

/// Truncate or pad `s` to exactly `width` columns.
pub fn fit_to_width(s: &str, width: u16) -> String {
    let width = width as usize;
    let clean = sanitize(s);
    let mut out = String::with_capacity(width);
    let mut used = 0usize;
    for g in clean.graphemes(true) {
        let w = UnicodeWidthStr::width(g);
        if w == 0 {
            // Combining marks glued to nothing; keep them attached if a
            // previous cluster exists, otherwise drop.
            if used > 0 {
                out.push_str(g);
            }
            continue;
        }
        if used + w > width {
            break;
        }
        out.push_str(g);
        used += w;
    }
    out.extend(std::iter::repeat_n(' ', width - used));
    out
}

/// A row of `width` blanks.
pub fn blank(width: u16) -> String {
    " ".repeat(width as usize)
}

/// Previous grapheme boundary before `byte` (0 at the start).
pub fn prev_boundary(line: &str, byte: usize) -> usize {
    line.grapheme_indices(true)
        .map(|(i, _)| i)
        .take_while(|&i| i < byte)
        .last()
        .unwrap_or(0)
}

/// Next grapheme boundary after `byte` (`line.len()` at the end).
pub fn next_boundary(line: &str, byte: usize) -> usize {
    line.grapheme_indices(true)
        .map(|(i, _)| i)
        .find(|&i| i > byte)
        .unwrap_or(line.len())
}

/// Byte offset of the grapheme boundary closest to display column `col`
/// without passing it, clamped to the line end.
pub fn byte_for_col(line: &str, col: usize) -> usize {
    let mut used = 0usize;
    for (idx, g) in line.grapheme_indices(true) {
        let w = grapheme_width(g);
        if used + w > col {
            return idx;
        }
        used += w;
    }
    line.len()
}

/// Display width of the prefix of `s` ending at byte offset `byte_idx`.
pub fn prefix_width(s: &str, byte_idx: usize) -> usize {
    let end = byte_idx.min(s.len());
    s.get(..end).map(display_width).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_pads_short_rows() {
        assert_eq!(fit_to_width("ab", 5), "ab   ");
    }

    #[test]
    fn fit_truncates_at_grapheme_boundary() {
        assert_eq!(fit_to_width("héllo wörld", 5), "héllo");
        // Wide cluster that would straddle the edge is replaced by padding.
        assert_eq!(fit_to_width("ab漢", 3), "ab ");
        assert_eq!(display_width(&fit_to_width("漢字かな", 5)), 5);
    }

    #[test]
    fn control_characters_become_spaces() {
        assert_eq!(fit_to_width("a\tb\x1b[2J", 6), "a b [2");
    }

    #[test]
    fn prefix_width_counts_columns() {
        let s = "a漢b";
        assert_eq!(prefix_width(s, 1), 1);
        assert_eq!(prefix_width(s, 4), 3);
        assert_eq!(prefix_width(s, 99), 4);
    }

    #[test]
    fn boundaries_step_over_clusters() {
        let s = "ae\u{301}漢";
        assert_eq!(next_boundary(s, 0), 1);
        assert_eq!(next_boundary(s, 1), 4);
        assert_eq!(prev_boundary(s, 4), 1);
        assert_eq!(prev_boundary(s, 0), 0);
        assert_eq!(next_boundary(s, s.len()), s.len());
        assert_eq!(byte_for_col(s, 2), 4);
        assert_eq!(byte_for_col(s, 3), 4);
        assert_eq!(byte_for_col(s, 50), s.len());
    }
}

//! Column split arithmetic.
//!
//! The screen is one primary column on the left, a one-column vertical
//! separator, and the secondary column on the right; the last row belongs to
//! the status/input line:
//!
//! ```text
//! 0           split  split+1                 W
//! | primary    |  │  | secondary stack        |
//! | ...        |  │  | ...                    |
//! | status / input line (row H-1)             |
//! ```

/// Rows reserved below the panels.
pub const STATUS_ROWS: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnSplit {
    /// Width of the primary column; also the separator's column index.
    pub primary_width: u16,
    pub separator_col: u16,
    pub secondary_left: u16,
    pub secondary_width: u16,
}

/// Split a `width`-column terminal for a stack whose widest minimum is
/// `stack_min_width` (`0` for an empty stack).
pub fn column_split(width: u16, stack_min_width: u16) -> ColumnSplit {
    let primary_width = width.saturating_sub(stack_min_width).saturating_sub(1);
    ColumnSplit {
        primary_width,
        separator_col: primary_width,
        secondary_left: primary_width.saturating_add(1).min(width),
        secondary_width: width.saturating_sub(primary_width + 1),
    }
}

/// Smallest terminal satisfying every minimum: the primary column plus the
/// separator plus the widest stack panel, and the primary height plus the
/// status row.
pub fn required_size(primary_min: (u16, u16), stack_min_width: u16) -> (u16, u16) {
    (
        primary_min
            .0
            .saturating_add(stack_min_width)
            .saturating_add(1),
        primary_min.1.saturating_add(STATUS_ROWS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_for_reference_layout() {
        let s = column_split(90, 25);
        assert_eq!(s.primary_width, 64);
        assert_eq!(s.separator_col, 64);
        assert_eq!(s.secondary_left, 65);
        assert_eq!(s.secondary_width, 25);
        assert_eq!(required_size((60, 20), 25), (86, 21));
    }

    #[test]
    fn empty_stack_keeps_separator_column() {
        let s = column_split(80, 0);
        assert_eq!(s.primary_width, 79);
        assert_eq!(s.secondary_width, 0);
        assert_eq!(s.secondary_left, 80);
    }
}

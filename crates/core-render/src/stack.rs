//! Secondary stack placement.
//!
//! Stack positions are canvas rows (see `core_panel::geometry`). The stack is
//! bottom-aligned on `bottom`, an exclusive canvas row: offsets are computed
//! from the bottom-most panel upwards, accumulating each panel's full height
//! and one separator row between consecutive panels of nonzero height.
//! Panels with zero height take no rows and get no separator.
//!
//! [`ColumnMap`] records which screen row of the secondary column belongs to
//! which panel or separator, so a relayout or stack scroll can tell exactly
//! which separator and blank rows must be written.

use core_events::PanelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSlot {
    pub id: PanelId,
    /// Canvas row of the panel's content row 0.
    pub anchor: i64,
    pub full_height: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackPlan {
    /// In stack order: first entry is the top-most panel.
    pub slots: Vec<StackSlot>,
    /// Canvas rows holding a separator.
    pub separators: Vec<i64>,
    pub top: i64,
    pub bottom: i64,
}

impl StackPlan {
    /// Place `entries` (stack order, `(id, full_height)`) above `bottom`.
    pub fn compute(entries: &[(PanelId, usize)], bottom: i64) -> Self {
        let mut slots = Vec::with_capacity(entries.len());
        let mut separators = Vec::new();
        let mut cursor = bottom;
        let mut below_nonzero = false;
        for &(id, full_height) in entries.iter().rev() {
            if full_height > 0 {
                if below_nonzero {
                    cursor -= 1;
                    separators.push(cursor);
                }
                cursor -= full_height as i64;
                below_nonzero = true;
            }
            slots.push(StackSlot {
                id,
                anchor: cursor,
                full_height,
            });
        }
        slots.reverse();
        separators.reverse();
        Self {
            slots,
            separators,
            top: cursor,
            bottom,
        }
    }

    /// Rows the whole stack occupies, separators included.
    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn slot(&self, id: PanelId) -> Option<&StackSlot> {
        self.slots.iter().find(|s| s.id == id)
    }
}

/// Rows of stack that do not fit in `budget` screen rows.
pub fn overflow(stack_height: i64, budget: u16) -> i64 {
    (stack_height - budget as i64).max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOwner {
    Blank,
    Separator,
    Panel(PanelId),
}

/// Owner of each screen row `0..budget` of the secondary column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    rows: Vec<RowOwner>,
}

impl ColumnMap {
    pub fn blank(budget: u16) -> Self {
        Self {
            rows: vec![RowOwner::Blank; budget as usize],
        }
    }

    pub fn from_plan(plan: &StackPlan, window_top: i64, budget: u16) -> Self {
        let mut map = Self::blank(budget);
        for slot in &plan.slots {
            let start = slot.anchor - window_top;
            for y in start..start + slot.full_height as i64 {
                map.set(y, RowOwner::Panel(slot.id));
            }
        }
        for &sep in &plan.separators {
            map.set(sep - window_top, RowOwner::Separator);
        }
        map
    }

    fn set(&mut self, y: i64, owner: RowOwner) {
        if y >= 0 && (y as usize) < self.rows.len() {
            self.rows[y as usize] = owner;
        }
    }

    pub fn get(&self, y: i64) -> Option<RowOwner> {
        if y < 0 {
            return None;
        }
        self.rows.get(y as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, RowOwner)> + '_ {
        self.rows.iter().enumerate().map(|(y, o)| (y as u16, *o))
    }

    /// Separator and blank rows of `self` that differ from what `previous`
    /// left on screen after its rows were carried down by `shift` rows.
    pub fn chrome_changes(&self, previous: &ColumnMap, shift: i64) -> Vec<(u16, RowOwner)> {
        self.iter()
            .filter(|(y, owner)| {
                !matches!(owner, RowOwner::Panel(_))
                    && previous.get(*y as i64 - shift) != Some(*owner)
            })
            .collect()
    }
}

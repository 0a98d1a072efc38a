//! Errors surfaced by the compositor's collaborator API.
//!
//! Geometry mismatches are not errors (they are [`core_panel::Rerender`]
//! values that drive relayout). What remains are caller contract violations,
//! which are rejected before any state changes, and surface IO failures.

use core_events::PanelId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("unknown panel {0}")]
    UnknownPanel(PanelId),
    #[error("{0} is the primary panel and cannot join the secondary stack")]
    PrimaryInStack(PanelId),
    #[error("{0} is not an editable panel")]
    NotEditable(PanelId),
    #[error("{0} is the active primary panel and cannot be removed")]
    PrimaryRemoval(PanelId),
    #[error("terminal is {have_w}x{have_h} but the layout needs at least {need_w}x{need_h}")]
    TerminalTooSmall {
        need_w: u16,
        need_h: u16,
        have_w: u16,
        have_h: u16,
    },
    #[error(transparent)]
    Surface(#[from] anyhow::Error),
}

impl LayoutError {
    /// Contract violations are the caller's bug; everything else is environmental.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            LayoutError::UnknownPanel(_)
                | LayoutError::PrimaryInStack(_)
                | LayoutError::NotEditable(_)
                | LayoutError::PrimaryRemoval(_)
        )
    }
}

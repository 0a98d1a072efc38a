//! Requests collaborators send to the rendering core.
//!
//! The protocol and command layers never hold the compositor. They post
//! `UiRequest`s through a [`UiHandle`]; the input loop drains them in order
//! and runs one redraw pass per drained event, so a burst of mutations caused
//! by one inbound message cannot interleave partial screen writes.

use crate::{CHANNEL_SEND_FAILURES, CHANNEL_SENDS, Event, PanelId};
use std::sync::atomic::Ordering;
use tokio::sync::mpsc::{Sender, error::TrySendError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiRequest {
    /// Append one row to a text panel.
    AppendLine { panel: PanelId, line: String },
    /// Replace all rows of a text panel.
    SetLines { panel: PanelId, lines: Vec<String> },
    /// Re-pull a list panel's source.
    Refresh(PanelId),
    RequestRepaint(PanelId),
    RequestRelayout,
    SetPrimary(PanelId),
    OpenSecondary(PanelId),
    CloseSecondary(PanelId),
    SetStatusLine(String),
    BeginEdit(PanelId),
    EndEdit { close: bool },
}

impl UiRequest {
    /// Short label for logs (payloads stay out of the log).
    pub fn kind(&self) -> &'static str {
        match self {
            UiRequest::AppendLine { .. } => "append_line",
            UiRequest::SetLines { .. } => "set_lines",
            UiRequest::Refresh(_) => "refresh",
            UiRequest::RequestRepaint(_) => "request_repaint",
            UiRequest::RequestRelayout => "request_relayout",
            UiRequest::SetPrimary(_) => "set_primary",
            UiRequest::OpenSecondary(_) => "open_secondary",
            UiRequest::CloseSecondary(_) => "close_secondary",
            UiRequest::SetStatusLine(_) => "set_status_line",
            UiRequest::BeginEdit(_) => "begin_edit",
            UiRequest::EndEdit { .. } => "end_edit",
        }
    }
}

/// Cloneable sender wrapper handed to collaborators.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: Sender<Event>,
}

impl UiHandle {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx }
    }

    /// Queue a request, waiting for channel capacity. Returns `false` once the
    /// loop has gone away.
    pub async fn send(&self, req: UiRequest) -> bool {
        let kind = req.kind();
        match self.tx.send(Event::Ui(req)).await {
            Ok(()) => {
                CHANNEL_SENDS.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: "runtime.events", kind, "ui_request_dropped_closed");
                false
            }
        }
    }

    /// Non-blocking variant for synchronous callers.
    pub fn try_send(&self, req: UiRequest) -> bool {
        let kind = req.kind();
        match self.tx.try_send(Event::Ui(req)) {
            Ok(()) => {
                CHANNEL_SENDS.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(target: "runtime.events", kind, "ui_request_dropped_full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub async fn append_line(&self, panel: PanelId, line: impl Into<String>) -> bool {
        self.send(UiRequest::AppendLine {
            panel,
            line: line.into(),
        })
        .await
    }

    pub async fn request_repaint(&self, panel: PanelId) -> bool {
        self.send(UiRequest::RequestRepaint(panel)).await
    }

    pub async fn set_status_line(&self, text: impl Into<String>) -> bool {
        self.send(UiRequest::SetStatusLine(text.into())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn handle_preserves_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let ui = UiHandle::new(tx);
        assert!(ui.append_line(PanelId(1), "a").await);
        assert!(ui.request_repaint(PanelId(1)).await);
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, Event::Ui(UiRequest::AppendLine { .. })));
        assert!(matches!(
            second,
            Event::Ui(UiRequest::RequestRepaint(PanelId(1)))
        ));
    }

    #[test]
    fn try_send_reports_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let ui = UiHandle::new(tx);
        assert!(ui.try_send(UiRequest::RequestRelayout));
        assert!(!ui.try_send(UiRequest::RequestRelayout));
    }

    #[tokio::test]
    async fn send_after_loop_exit_returns_false() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let ui = UiHandle::new(tx);
        assert!(!ui.set_status_line("gone").await);
    }
}

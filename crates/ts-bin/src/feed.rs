//! Demo feed: a background producer that appends lines to the active log.
//!
//! Stands in for the protocol layer. It never touches the compositor; every
//! line travels through the event queue as a `UiRequest`, and the loop
//! redraws once per drained request.

use core_events::{AsyncEventSource, Event, PanelId, UiHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

const LINES: &[&str] = &[
    "amber waves from the fountain",
    "birch asks if anyone has seen the cat",
    "cedar: the market opens at noon",
    "dune is looking for a fourth player",
    "ember posted a new riddle on the board",
    "fjord: bells ring twice for the vote",
];

/// Panel the feed writes to; the runtime repoints it on every screen switch.
#[derive(Debug, Clone, Default)]
pub struct FeedTarget(Arc<AtomicU32>);

impl FeedTarget {
    pub fn set(&self, panel: Option<PanelId>) {
        self.0.store(panel.map_or(0, |p| p.0), Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<PanelId> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            n => Some(PanelId(n)),
        }
    }
}

pub struct DemoFeed {
    target: FeedTarget,
    period: Duration,
    /// Stop after this many lines; `None` runs until the loop goes away.
    limit: Option<usize>,
}

impl DemoFeed {
    pub fn new(target: FeedTarget, period: Duration) -> Self {
        Self {
            target,
            period,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl AsyncEventSource for DemoFeed {
    fn name(&self) -> &'static str {
        "demo_feed"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let ui = UiHandle::new(tx);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(
                tokio::time::Instant::now() + self.period,
                self.period,
            );
            let mut sent = 0usize;
            for line in LINES.iter().cycle() {
                if self.limit.is_some_and(|limit| sent >= limit) {
                    break;
                }
                interval.tick().await;
                let Some(panel) = self.target.get() else {
                    continue;
                };
                if !ui.append_line(panel, *line).await {
                    break;
                }
                sent += 1;
            }
            tracing::debug!(target: "runtime.events", sent, "demo_feed_stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::UiRequest;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn feed_appends_to_current_target() {
        let target = FeedTarget::default();
        target.set(Some(PanelId(7)));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = Box::new(DemoFeed::new(target, Duration::from_millis(1)).with_limit(2)).spawn(tx);
        handle.await.unwrap();

        let mut panels = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let Event::Ui(UiRequest::AppendLine { panel, .. }) = ev {
                panels.push(panel);
            }
        }
        assert_eq!(panels, vec![PanelId(7), PanelId(7)]);
    }

    #[tokio::test]
    async fn feed_stops_when_loop_is_gone() {
        let target = FeedTarget::default();
        target.set(Some(PanelId(1)));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = Box::new(DemoFeed::new(target, Duration::from_millis(1))).spawn(tx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("feed exits on closed channel")
            .unwrap();
    }

    #[test]
    fn target_round_trips() {
        let t = FeedTarget::default();
        assert_eq!(t.get(), None);
        t.set(Some(PanelId(3)));
        assert_eq!(t.get(), Some(PanelId(3)));
        t.set(None);
        assert_eq!(t.get(), None);
    }
}

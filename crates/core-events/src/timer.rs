//! Named countdown timers.
//!
//! Each countdown is a tokio task that sends one [`TimerTick`] per period
//! until it reaches zero. Timers never touch panels or the terminal: the loop
//! receives the tick, checks it with [`CountdownTimers::accept`], mutates the
//! bound panel and requests a repaint.
//!
//! Generation rule: every `start` and `cancel` bumps the timer's generation and
//! aborts the previous task. A tick already sitting in the channel from an
//! older task carries the old generation and `accept` drops it, so a restarted
//! countdown can never be overwritten by its predecessor's last tick.

use crate::{Event, PanelId, TIMER_TICKS_SENT, TIMER_TICKS_STALE};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTick {
    pub name: String,
    pub generation: u64,
    /// Seconds (periods) left after this tick; `0` on the final tick.
    pub remaining: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    bound: Option<PanelId>,
    remaining: u32,
}

impl Slot {
    fn abort(&mut self) {
        if let Some(h) = self.handle.take() {
            h.abort();
        }
    }
}

#[derive(Debug)]
pub struct CountdownTimers {
    slots: HashMap<String, Slot>,
    period: Duration,
}

impl Default for CountdownTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownTimers {
    pub fn new() -> Self {
        Self::with_period(Duration::from_secs(1))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            slots: HashMap::new(),
            period,
        }
    }

    /// Start (or restart) `name` counting down from `secs`. `bound` ties the
    /// timer to a panel so closing that panel cancels it. Must be called from
    /// within a tokio runtime. Returns the new generation.
    pub fn start(
        &mut self,
        name: &str,
        secs: u32,
        bound: Option<PanelId>,
        tx: Sender<Event>,
    ) -> u64 {
        let slot = self.slots.entry(name.to_string()).or_insert(Slot {
            generation: 0,
            handle: None,
            bound: None,
            remaining: 0,
        });
        slot.abort();
        slot.generation += 1;
        slot.bound = bound;
        slot.remaining = secs;
        let generation = slot.generation;
        let period = self.period;
        let task_name = name.to_string();
        slot.handle = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            let mut remaining = secs;
            while remaining > 0 {
                interval.tick().await;
                remaining -= 1;
                let tick = TimerTick {
                    name: task_name.clone(),
                    generation,
                    remaining,
                };
                if tx.send(Event::Timer(tick)).await.is_err() {
                    break;
                }
                TIMER_TICKS_SENT.fetch_add(1, Ordering::Relaxed);
            }
        }));
        tracing::debug!(target: "timers", name, secs, generation, bound = ?bound, "countdown_started");
        generation
    }

    /// Stop `name`; late ticks already queued become stale.
    pub fn cancel(&mut self, name: &str) -> bool {
        match self.slots.get_mut(name) {
            Some(slot) if slot.handle.is_some() || slot.remaining > 0 => {
                slot.abort();
                slot.generation += 1;
                slot.remaining = 0;
                slot.bound = None;
                tracing::debug!(target: "timers", name, generation = slot.generation, "countdown_cancelled");
                true
            }
            _ => false,
        }
    }

    /// Cancel every timer bound to `panel`. Returns the cancelled names.
    pub fn cancel_bound_to(&mut self, panel: PanelId) -> Vec<String> {
        let names: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, s)| s.bound == Some(panel) && (s.handle.is_some() || s.remaining > 0))
            .map(|(n, _)| n.clone())
            .collect();
        for n in &names {
            self.cancel(n);
        }
        names
    }

    /// Validate a tick against the current generation and record its value.
    pub fn accept(&mut self, tick: &TimerTick) -> bool {
        match self.slots.get_mut(&tick.name) {
            Some(slot) if slot.generation == tick.generation => {
                slot.remaining = tick.remaining;
                if tick.remaining == 0 {
                    slot.handle = None;
                    slot.bound = None;
                }
                true
            }
            _ => {
                TIMER_TICKS_STALE.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "timers", name = %tick.name, generation = tick.generation, "stale_tick_dropped");
                false
            }
        }
    }

    pub fn generation(&self, name: &str) -> Option<u64> {
        self.slots.get(name).map(|s| s.generation)
    }

    pub fn remaining(&self, name: &str) -> Option<u32> {
        self.slots.get(name).map(|s| s.remaining)
    }

    pub fn bound_panel(&self, name: &str) -> Option<PanelId> {
        self.slots.get(name).and_then(|s| s.bound)
    }

    /// Number of countdowns still running.
    pub fn active(&self) -> usize {
        self.slots
            .values()
            .filter(|s| s.handle.is_some() && s.remaining > 0)
            .count()
    }

    /// Abort everything (runtime shutdown).
    pub fn shutdown(&mut self) {
        for slot in self.slots.values_mut() {
            slot.abort();
            slot.generation += 1;
            slot.remaining = 0;
        }
    }
}

impl Drop for CountdownTimers {
    fn drop(&mut self) {
        for slot in self.slots.values_mut() {
            slot.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    async fn drain_for(rx: &mut mpsc::Receiver<Event>, wait: Duration) -> Vec<TimerTick> {
        let mut out = Vec::new();
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            match timeout(left, rx.recv()).await {
                Ok(Some(Event::Timer(t))) => out.push(t),
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
        out
    }

    #[tokio::test]
    async fn countdown_emits_until_zero() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut timers = CountdownTimers::with_period(Duration::from_millis(5));
        let generation = timers.start("phase", 3, None, tx);
        let ticks = drain_for(&mut rx, Duration::from_millis(150)).await;
        let remaining: Vec<u32> = ticks.iter().map(|t| t.remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);
        assert!(ticks.iter().all(|t| t.generation == generation));
        for t in &ticks {
            assert!(timers.accept(t));
        }
        assert_eq!(timers.active(), 0);
    }

    #[tokio::test]
    async fn restart_drops_ticks_from_previous_generation() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut timers = CountdownTimers::with_period(Duration::from_millis(5));
        let old = timers.start("phase", 50, None, tx.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let new = timers.start("phase", 2, None, tx);
        assert!(new > old);
        let ticks = drain_for(&mut rx, Duration::from_millis(150)).await;
        let accepted: Vec<&TimerTick> = ticks.iter().filter(|t| timers.accept(t)).collect();
        assert!(!accepted.is_empty());
        assert!(accepted.iter().all(|t| t.generation == new));
        assert_eq!(timers.remaining("phase"), Some(0));
    }

    #[tokio::test]
    async fn closing_bound_panel_cancels_timer() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut timers = CountdownTimers::with_period(Duration::from_millis(5));
        timers.start("vote", 100, Some(PanelId(4)), tx.clone());
        timers.start("phase", 100, Some(PanelId(9)), tx);
        let cancelled = timers.cancel_bound_to(PanelId(4));
        assert_eq!(cancelled, vec!["vote".to_string()]);
        assert_eq!(timers.active(), 1);
        let ticks = drain_for(&mut rx, Duration::from_millis(40)).await;
        assert!(
            ticks
                .iter()
                .filter(|t| t.name == "vote")
                .all(|t| !timers.accept(t)),
            "vote ticks after cancel are stale"
        );
        timers.shutdown();
        assert_eq!(timers.active(), 0);
    }
}

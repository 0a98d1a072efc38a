//! Event dispatch for one townsquare session.
//!
//! `App` owns the compositor and everything that mutates panels. Each
//! `handle` call applies one event; the caller runs one render pass after it,
//! so mutations caused by a single event never reach the screen half done.

use crate::commands::{Command, CommandError};
use crate::feed::FeedTarget;
use crate::keys::{KeyRoute, route};
use crate::screens::{self, ActiveScreen, NOTES, NotesStore, Screen, TIMER, format_countdown};
use anyhow::Result;
use core_config::{Config, ConfigContext};
use core_events::{
    CountdownTimers, Event, InputEvent, KeyEvent, PanelId, TimerTick, UiRequest,
};
use core_render::{Compositor, CursorOwner, LayoutError, STATUS_ROWS, StatusOutcome};
use core_terminal::TerminalSurface;
use std::fmt;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, trace, warn};

const ROUND_TIMER: &str = "round";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    CtrlC,
    CommandQuit,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::CtrlC => "ctrl_c",
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Break(ShutdownReason),
}

pub struct App<S: TerminalSurface> {
    compositor: Compositor<S>,
    config: Config,
    active: ActiveScreen,
    notes: NotesStore,
    feed_target: FeedTarget,
    timers: CountdownTimers,
    /// Handed to countdown tasks.
    tx: Sender<Event>,
}

impl<S: TerminalSurface> App<S> {
    pub fn new(
        mut compositor: Compositor<S>,
        config: Config,
        screen: Screen,
        feed_target: FeedTarget,
        tx: Sender<Event>,
    ) -> Result<Self> {
        let notes = NotesStore::default();
        let active = screens::enter(&mut compositor, screen, &notes)?;
        let app = Self {
            compositor,
            config,
            active,
            notes,
            feed_target,
            timers: CountdownTimers::new(),
            tx,
        };
        app.point_feed();
        Ok(app)
    }

    pub fn compositor(&self) -> &Compositor<S> {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut Compositor<S> {
        &mut self.compositor
    }

    pub fn screen(&self) -> Screen {
        self.active.screen
    }

    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }

    pub fn timers(&self) -> &CountdownTimers {
        &self.timers
    }

    pub fn handle(&mut self, event: Event) -> LoopControl {
        let control = match event {
            Event::Input(input) => self.handle_input(input),
            Event::Ui(req) => {
                self.handle_ui(req);
                LoopControl::Continue
            }
            Event::Timer(tick) => {
                self.handle_tick(&tick);
                LoopControl::Continue
            }
            Event::Shutdown => LoopControl::Break(ShutdownReason::ShutdownEvent),
        };
        self.release_closed();
        control
    }

    /// Timers bound to a panel stop when the panel closes, whichever path
    /// closed it.
    fn release_closed(&mut self) {
        for id in self.compositor.take_closed() {
            let cancelled = self.timers.cancel_bound_to(id);
            if cancelled.is_empty() {
                continue;
            }
            debug!(target: "timers", %id, cancelled = cancelled.len(), "timers_released_with_panel");
            if self.compositor.panel(id).is_some() {
                let result = self.compositor.set_lines(id, vec![format_countdown(None)]);
                self.log_layout(result.map(drop));
            }
        }
    }

    /// One redraw pass. Layout errors were logged where they arose.
    pub fn render(&mut self) {
        match self.compositor.render_pass() {
            Ok(()) => {}
            Err(LayoutError::TerminalTooSmall { .. }) => {}
            Err(e) => error!(target: "runtime", error = %e, "render_failed"),
        }
    }

    /// Save any edit in progress and stop the timers.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.compositor.end_edit(false) {
            warn!(target: "runtime.shutdown", error = %e, "edit_save_failed");
        }
        self.timers.shutdown();
        let m = self.compositor.metrics();
        info!(
            target: "runtime.shutdown",
            full_relayouts = m.full_relayouts,
            stack_relayouts = m.stack_relayouts,
            panel_repaints = m.panel_repaints,
            rows_written = m.rows_written,
            rows_reused = m.rows_reused,
            "render_totals"
        );
    }

    fn handle_input(&mut self, input: InputEvent) -> LoopControl {
        match input {
            InputEvent::Key(key) => return self.handle_key(&key),
            InputEvent::Resize(width, height) => self.handle_resize(width, height),
            InputEvent::Paste(text) => self.compositor.paste(&text),
            InputEvent::CtrlC => {
                info!(target: "runtime", "ctrl_c");
                return LoopControl::Break(ShutdownReason::CtrlC);
            }
        }
        LoopControl::Continue
    }

    fn handle_key(&mut self, key: &KeyEvent) -> LoopControl {
        let editing = matches!(self.compositor.cursor_owner(), CursorOwner::Editing(_));
        match route(key, editing) {
            KeyRoute::EndEdit => {
                let result = self.compositor.end_edit(false);
                self.log_layout(result.map(drop));
            }
            KeyRoute::Edit => {
                self.compositor.edit_key(key);
            }
            KeyRoute::EditNotes => self.begin_notes_edit(),
            KeyRoute::Page(forward) => self.compositor.page_primary(forward),
            KeyRoute::Stack(forward) => self.compositor.step_stack(forward),
            KeyRoute::Input => {
                if let StatusOutcome::Submitted(line) = self.compositor.input_key(key) {
                    return self.submit(&line);
                }
            }
        }
        LoopControl::Continue
    }

    fn handle_resize(&mut self, width: u16, height: u16) {
        self.compositor.handle_resize(width, height);
        let ctx = ConfigContext::new(width, height, STATUS_ROWS);
        if let Some(overlap) = self.config.recompute_with_context(ctx) {
            self.compositor.set_page_overlap(overlap);
        }
    }

    fn handle_ui(&mut self, req: UiRequest) {
        let result = self.compositor.apply(req);
        self.log_layout(result);
    }

    fn handle_tick(&mut self, tick: &TimerTick) {
        let bound = self.timers.bound_panel(&tick.name);
        if !self.timers.accept(tick) {
            return;
        }
        trace!(target: "timers", name = %tick.name, remaining = tick.remaining, "tick_accepted");
        if let Some(panel) = bound {
            let result = self
                .compositor
                .set_lines(panel, vec![format_countdown(Some(tick.remaining))]);
            self.log_layout(result.map(drop));
        }
        if tick.remaining == 0 {
            let result = self
                .compositor
                .append_line(self.active.log, format!("* {} timer finished", tick.name));
            self.log_layout(result.map(drop));
        }
    }

    fn submit(&mut self, line: &str) -> LoopControl {
        match Command::parse(line) {
            Ok(cmd) => {
                debug!(target: "runtime", command = cmd.name(), len = line.len(), "command");
                self.execute(cmd)
            }
            Err(e) => {
                self.reject(&e);
                LoopControl::Continue
            }
        }
    }

    fn reject(&mut self, e: &CommandError) {
        debug!(target: "runtime", error = %e, "command_rejected");
        self.compositor.set_status_line(&e.to_string());
    }

    fn execute(&mut self, cmd: Command) -> LoopControl {
        match cmd {
            Command::Open(name) => self.open(&name),
            Command::Close(name) => self.close(&name),
            Command::Screen(screen) => self.switch_screen(screen),
            Command::Edit => self.begin_notes_edit(),
            Command::Timer(secs) => self.start_timer(secs),
            Command::Status(text) => self.compositor.set_status_line(&text),
            Command::Quit => return LoopControl::Break(ShutdownReason::CommandQuit),
            Command::Say(text) => {
                if !text.is_empty() {
                    let result = self.compositor.append_line(self.active.log, format!("you: {text}"));
                    self.log_layout(result.map(drop));
                }
            }
        }
        LoopControl::Continue
    }

    /// Id of a panel the active screen allows, or a status message why not.
    fn allowed_panel(&mut self, name: &str) -> Option<PanelId> {
        let found = self
            .active
            .screen
            .allows(name)
            .then(|| self.compositor.find_panel(name))
            .flatten();
        if found.is_none() {
            let screen = self.active.screen;
            self.compositor
                .set_status_line(&format!("no panel '{name}' on {screen}"));
        }
        found
    }

    fn open(&mut self, name: &str) {
        if let Some(id) = self.allowed_panel(name) {
            let result = self.compositor.open_secondary(id);
            self.log_layout(result);
        }
    }

    fn close(&mut self, name: &str) {
        let Some(id) = self.allowed_panel(name) else {
            return;
        };
        let result = self.compositor.close_secondary(id);
        self.log_layout(result.map(drop));
    }

    fn switch_screen(&mut self, screen: Screen) {
        if screen == self.active.screen {
            return;
        }
        self.feed_target.set(None);
        for id in self.compositor.teardown() {
            self.timers.cancel_bound_to(id);
        }
        match screens::enter(&mut self.compositor, screen, &self.notes) {
            Ok(active) => {
                self.active = active;
                self.point_feed();
            }
            Err(e) => error!(target: "runtime", screen = screen.as_str(), error = %e, "screen_build_failed"),
        }
    }

    fn point_feed(&self) {
        let target = (self.active.screen == Screen::Home).then_some(self.active.log);
        self.feed_target.set(target);
    }

    fn begin_notes_edit(&mut self) {
        if let Some(id) = self.allowed_panel(NOTES) {
            let result = self.compositor.begin_edit(id);
            self.log_layout(result);
        }
    }

    fn start_timer(&mut self, secs: Option<u32>) {
        let Some(id) = self.allowed_panel(TIMER) else {
            return;
        };
        let secs = secs.unwrap_or_else(|| self.config.default_countdown_secs());
        let opened = self.compositor.open_secondary(id);
        self.log_layout(opened);
        let shown = self.compositor.set_lines(id, vec![format_countdown(Some(secs))]);
        self.log_layout(shown.map(drop));
        self.timers.start(ROUND_TIMER, secs, Some(id), self.tx.clone());
    }

    /// Contract violations are already logged by the compositor.
    fn log_layout(&self, result: Result<(), LayoutError>) {
        if let Err(e) = result
            && !e.is_contract_violation()
        {
            warn!(target: "runtime", error = %e, "layout_request_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{KeyCode, KeyModifiers};
    use core_render::CompositorOptions;
    use core_terminal::HeadlessSurface;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn app(screen: Screen) -> (App<HeadlessSurface>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(64);
        let compositor = Compositor::new(HeadlessSurface::new(90, 24), CompositorOptions::default());
        let app = App::new(compositor, Config::default(), screen, FeedTarget::default(), tx).unwrap();
        (app, rx)
    }

    fn key(code: KeyCode) -> Event {
        Event::Input(InputEvent::Key(KeyEvent::plain(code)))
    }

    fn type_line(app: &mut App<HeadlessSurface>, text: &str) -> LoopControl {
        for ch in text.chars() {
            app.handle(key(KeyCode::Char(ch)));
        }
        let control = app.handle(key(KeyCode::Enter));
        app.render();
        control
    }

    fn stack_names(app: &App<HeadlessSurface>) -> Vec<String> {
        let c = app.compositor();
        c.stack()
            .iter()
            .map(|id| c.panel(*id).unwrap().name().to_string())
            .collect()
    }

    #[tokio::test]
    async fn open_and_close_follow_the_screen() {
        let (mut app, _rx) = app(Screen::Home);
        app.render();
        assert_eq!(stack_names(&app), vec!["help"]);
        type_line(&mut app, "/open notes");
        assert_eq!(stack_names(&app), vec!["help", "notes"]);
        type_line(&mut app, "/close help");
        assert_eq!(stack_names(&app), vec!["notes"]);
        type_line(&mut app, "/open timer");
        assert_eq!(stack_names(&app), vec!["notes"]);
        assert!(app.compositor().surface().row_text(23).contains("no panel 'timer' on home"));
    }

    #[tokio::test]
    async fn chat_lands_in_the_log() {
        let (mut app, _rx) = app(Screen::Lobby);
        type_line(&mut app, "hello square");
        let log = app.compositor().find_panel(screens::LOG).unwrap();
        let panel = app.compositor().panel(log).unwrap();
        assert_eq!(panel.row(1), Some("you: hello square"));
        assert_eq!(app.compositor().status_input(), "");
    }

    #[tokio::test]
    async fn f2_edits_and_escape_saves() {
        let (mut app, _rx) = app(Screen::Home);
        app.handle(key(KeyCode::F(2)));
        assert!(matches!(app.compositor().cursor_owner(), CursorOwner::Editing(_)));
        for ch in "plan".chars() {
            app.handle(key(KeyCode::Char(ch)));
        }
        assert_eq!(app.compositor().status_input(), "", "keys went to the notes");
        app.handle(key(KeyCode::Esc));
        app.render();
        assert_eq!(app.notes().text(), "plan");
        assert_eq!(app.compositor().cursor_owner(), CursorOwner::NoEditTarget);
        assert_eq!(stack_names(&app), vec!["help", "notes"], "left open");
    }

    #[tokio::test]
    async fn screen_switch_rebuilds_panels_and_cancels_timers() {
        let (mut app, _rx) = app(Screen::Game);
        type_line(&mut app, "/timer 30");
        assert_eq!(app.timers().active(), 1);
        let timer = app.compositor().find_panel(TIMER).unwrap();
        assert_eq!(app.compositor().panel(timer).unwrap().row(0), Some("round 00:30"));

        type_line(&mut app, "/screen home");
        assert_eq!(app.screen(), Screen::Home);
        assert_eq!(app.timers().active(), 0);
        assert!(app.compositor().find_panel(TIMER).is_none());
        assert_eq!(stack_names(&app), vec!["help"]);
    }

    #[tokio::test]
    async fn stale_ticks_do_not_touch_the_panel() {
        let (mut app, _rx) = app(Screen::Game);
        type_line(&mut app, "/timer 30");
        let generation = app.timers().generation(ROUND_TIMER).unwrap();
        type_line(&mut app, "/timer 10");
        let timer = app.compositor().find_panel(TIMER).unwrap();

        app.handle(Event::Timer(TimerTick {
            name: ROUND_TIMER.into(),
            generation,
            remaining: 29,
        }));
        assert_eq!(app.compositor().panel(timer).unwrap().row(0), Some("round 00:10"));

        app.handle(Event::Timer(TimerTick {
            name: ROUND_TIMER.into(),
            generation: generation + 1,
            remaining: 9,
        }));
        assert_eq!(app.compositor().panel(timer).unwrap().row(0), Some("round 00:09"));
    }

    fn tick(generation: u64, remaining: u32) -> Event {
        Event::Timer(TimerTick {
            name: ROUND_TIMER.into(),
            generation,
            remaining,
        })
    }

    #[tokio::test]
    async fn closing_the_timer_panel_by_request_stops_its_countdown() {
        let (mut app, _rx) = app(Screen::Game);
        type_line(&mut app, "/timer 30");
        let timer = app.compositor().find_panel(TIMER).unwrap();
        let generation = app.timers().generation(ROUND_TIMER).unwrap();

        app.handle(Event::Ui(UiRequest::CloseSecondary(timer)));
        app.render();
        assert_eq!(stack_names(&app), vec!["players"]);
        assert_eq!(app.timers().active(), 0);

        app.handle(tick(generation, 29));
        assert_eq!(app.compositor().panel(timer).unwrap().row(0), Some("round --:--"));
    }

    #[tokio::test]
    async fn close_command_and_removal_share_the_release_path() {
        let (mut app, _rx) = app(Screen::Game);
        type_line(&mut app, "/timer 30");
        type_line(&mut app, "/close timer");
        assert_eq!(app.timers().active(), 0);

        type_line(&mut app, "/timer 20");
        assert_eq!(app.timers().active(), 1);
        let timer = app.compositor().find_panel(TIMER).unwrap();
        app.compositor_mut().remove_panel(timer).unwrap();
        app.handle(Event::Ui(UiRequest::RequestRelayout));
        assert_eq!(app.timers().active(), 0);
    }

    #[tokio::test]
    async fn quit_paths_break_the_loop() {
        let (mut app, _rx) = app(Screen::Home);
        assert_eq!(type_line(&mut app, "/quit"), LoopControl::Break(ShutdownReason::CommandQuit));
        let ctrl_c = Event::Input(InputEvent::CtrlC);
        assert_eq!(app.handle(ctrl_c), LoopControl::Break(ShutdownReason::CtrlC));
        let alt_down = Event::Input(InputEvent::Key(KeyEvent::new(KeyCode::Down, KeyModifiers::ALT)));
        assert_eq!(app.handle(alt_down), LoopControl::Continue);
    }

    #[tokio::test]
    async fn bad_commands_report_on_the_status_line() {
        let (mut app, _rx) = app(Screen::Home);
        type_line(&mut app, "/timer soon");
        assert!(app.compositor().surface().row_text(23).contains("'soon' is not a number"));
    }
}

//! Townsquare entrypoint.
mod app;
mod commands;
mod feed;
mod keys;
mod screens;

use anyhow::Result;
use app::{App, LoopControl, ShutdownReason};
use clap::Parser;
use core_config::{Config, ConfigContext, load_from};
use core_events::{
    CHANNEL_SEND_FAILURES, CHANNEL_SENDS, EVENT_CHANNEL_CAP, Event, EventSourceRegistry,
    KEYPRESS_TOTAL, PASTE_BYTES, TIMER_TICKS_SENT, TIMER_TICKS_STALE,
};
use core_render::{Compositor, CompositorOptions, STATUS_ROWS};
use core_terminal::{
    CrosstermBackend, CrosstermSurface, TerminalCapabilities, TerminalGuard, TerminalSurface,
};
use feed::{DemoFeed, FeedTarget};
use screens::Screen;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE: &str = "townsquare.log";
const FEED_PERIOD: Duration = Duration::from_secs(4);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "townsquare", version, about = "Townsquare terminal client")]
struct Args {
    /// Configuration file path (overrides discovery of `townsquare.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Screen shown at startup.
    #[arg(long = "screen", default_value = "home", value_parser = parse_screen)]
    pub screen: Screen,
}

fn parse_screen(s: &str) -> Result<Screen, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

struct RuntimeContext<'a> {
    app: App<CrosstermSurface>,
    terminal_guard: TerminalGuard<'a>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn run<'a>(
        &'a mut self,
        tx: mpsc::Sender<Event>,
        feed_target: FeedTarget,
    ) -> Result<RuntimeContext<'a>> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");

        let args = Args::parse();
        let config_override = args.config.is_some();
        let mut config = load_from(args.config)?;

        let guard = self.backend.enter_guard("townsquare")?;
        let surface = CrosstermSurface::stdout(TerminalCapabilities::detect())?;
        let (width, height) = surface.size();
        config.apply_context(ConfigContext::new(width, height, STATUS_ROWS));
        let options = compositor_options(&config);
        info!(
            target: "runtime.startup",
            width,
            height,
            screen = args.screen.as_str(),
            config_override,
            page_overlap = options.page_overlap,
            stack_step = options.stack_step,
            "bootstrap_complete"
        );

        let compositor = Compositor::new(surface, options);
        let app = App::new(compositor, config, args.screen, feed_target, tx)?;
        Ok(RuntimeContext {
            app,
            terminal_guard: guard,
        })
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // A global subscriber is already installed; dropping the guard stops our writer.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn compositor_options(config: &Config) -> CompositorOptions {
    CompositorOptions {
        page_overlap: config.effective_page_overlap,
        stack_step: config.stack_step(),
        prompt: config.prompt().to_string(),
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

/// Single consumer of the event channel; the only owner of the terminal.
struct Runtime<'a> {
    app: App<CrosstermSurface>,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
    input_task: Option<tokio::task::JoinHandle<()>>,
    input_shutdown: Option<core_input::AsyncInputShutdown>,
    // Declared last: the terminal is restored after everything above is dropped.
    _terminal_guard: TerminalGuard<'a>,
}

impl<'a> Runtime<'a> {
    fn new(
        context: RuntimeContext<'a>,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
        input_task: tokio::task::JoinHandle<()>,
        input_shutdown: core_input::AsyncInputShutdown,
        source_handles: Vec<tokio::task::JoinHandle<()>>,
    ) -> Self {
        let RuntimeContext {
            app,
            terminal_guard,
        } = context;
        Self {
            app,
            rx,
            tx: Some(tx),
            source_handles,
            input_task: Some(input_task),
            input_shutdown: Some(input_shutdown),
            _terminal_guard: terminal_guard,
        }
    }

    async fn run(&mut self) -> Result<()> {
        self.app.render();

        let loop_span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = loop_span.enter();

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            match self.app.handle(event) {
                LoopControl::Break(reason) => {
                    shutdown_reason = reason;
                    break;
                }
                LoopControl::Continue => self.app.render(),
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason).await;
        Ok(())
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        self.app.shutdown();
        self.app.render();

        if let Some(tx) = self.tx.take() {
            trace!(target: "runtime.shutdown", reason = reason.as_str(), "dropping_runtime_sender");
            drop(tx);
        }

        while let Some(handle) = self.source_handles.pop() {
            handle.abort();
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        if let Some(shutdown) = self.input_shutdown.take() {
            trace!(target: "runtime.shutdown", reason = reason.as_str(), "input_task_shutdown_signal");
            shutdown.signal();
        }

        if let Some(handle) = self.input_task.take() {
            match handle.await {
                Ok(_) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "input_task_joined"
                ),
                Err(err) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "input_task_cancelled"
                ),
                Err(err) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "input_task_join_failed"
                ),
            }
        }

        info!(
            target: "runtime.shutdown",
            sends = CHANNEL_SENDS.load(Ordering::Relaxed),
            send_failures = CHANNEL_SEND_FAILURES.load(Ordering::Relaxed),
            keypresses = KEYPRESS_TOTAL.load(Ordering::Relaxed),
            paste_bytes = PASTE_BYTES.load(Ordering::Relaxed),
            timer_ticks = TIMER_TICKS_SENT.load(Ordering::Relaxed),
            stale_ticks = TIMER_TICKS_STALE.load(Ordering::Relaxed),
            "channel_totals"
        );
        log_shutdown_stage(reason, "complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let feed_target = FeedTarget::default();
    let mut startup = AppStartup::new();
    let context = startup.run(tx.clone(), feed_target.clone())?;

    let (input_task, input_shutdown) = core_input::spawn_async_input(tx.clone());
    let mut registry = EventSourceRegistry::new();
    registry.register(DemoFeed::new(feed_target, FEED_PERIOD));
    let source_handles = registry.spawn_all(&tx);

    let mut runtime = Runtime::new(context, tx, rx, input_task, input_shutdown, source_handles);
    runtime.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_defaults_to_home() {
        let args = Args::try_parse_from(["townsquare"]).unwrap();
        assert_eq!(args.screen, Screen::Home);
        assert!(args.config.is_none());
    }

    #[test]
    fn cli_rejects_unknown_screen() {
        assert!(Args::try_parse_from(["townsquare", "--screen", "arena"]).is_err());
        let args = Args::try_parse_from(["townsquare", "--screen", "game", "--config", "x.toml"]).unwrap();
        assert_eq!(args.screen, Screen::Game);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn options_follow_clamped_config() {
        let mut config = Config::default();
        config.file.scroll.page_overlap = 50;
        config.apply_context(ConfigContext::new(80, 10, STATUS_ROWS));
        let options = compositor_options(&config);
        assert_eq!(options.page_overlap, 8);
        assert_eq!(options.stack_step, 3);
        assert_eq!(options.prompt, "> ");
    }

    #[tokio::test]
    async fn bounded_channel_parks_producers() {
        let (tx, mut rx) = mpsc::channel::<Event>(1);
        tx.send(Event::Shutdown).await.unwrap();
        let send_fut = tokio::spawn(async move { tx.send(Event::Shutdown).await });
        tokio::task::yield_now().await;
        assert!(matches!(rx.recv().await, Some(Event::Shutdown)));
        send_fut.await.unwrap().unwrap();
        assert!(matches!(rx.recv().await, Some(Event::Shutdown)));
    }
}

//! Demo screens.
//!
//! A screen owns a fixed set of panels built when it is entered and torn
//! down when it is left. The command shell may only open or close panels the
//! active screen lists.

use anyhow::{Result, bail};
use core_events::PanelId;
use core_panel::Panel;
use core_render::Compositor;
use core_terminal::TerminalSurface;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub const LOG: &str = "log";
pub const HELP: &str = "help";
pub const NOTES: &str = "notes";
pub const PLAYERS: &str = "players";
pub const TIMER: &str = "timer";

const HELP_LINES: &[&str] = &[
    "/open <panel>  /close <panel>",
    "/screen home|lobby|game",
    "/edit  (F2)  Esc saves",
    "/timer [secs]  /status <text>",
    "PgUp/PgDn log, Alt+Up/Down stack",
    "/quit  (Ctrl+C)",
];

const SEAT_NAMES: &[&str] = &["amber", "birch", "cedar", "dune", "ember", "fjord"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Lobby,
    Game,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Home => "home",
            Screen::Lobby => "lobby",
            Screen::Game => "game",
        }
    }

    /// Secondary panels this screen builds, in stack order.
    pub fn secondary_panels(&self) -> &'static [&'static str] {
        match self {
            Screen::Home => &[HELP, NOTES],
            Screen::Lobby => &[PLAYERS, HELP, NOTES],
            Screen::Game => &[PLAYERS, TIMER, NOTES],
        }
    }

    /// Panels opened when the screen is entered.
    fn opened_on_entry(&self) -> &'static [&'static str] {
        match self {
            Screen::Home => &[HELP],
            Screen::Lobby => &[PLAYERS],
            Screen::Game => &[PLAYERS, TIMER],
        }
    }

    pub fn allows(&self, panel: &str) -> bool {
        self.secondary_panels().contains(&panel)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Screen {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "home" => Ok(Screen::Home),
            "lobby" => Ok(Screen::Lobby),
            "game" => Ok(Screen::Game),
            other => bail!("unknown screen '{other}'"),
        }
    }
}

/// Notes text that outlives the panels showing it.
#[derive(Debug, Clone, Default)]
pub struct NotesStore {
    text: Arc<Mutex<String>>,
}

impl NotesStore {
    pub fn text(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn save(&self, text: &str) {
        if let Ok(mut slot) = self.text.lock() {
            slot.clear();
            slot.push_str(text);
        }
        tracing::debug!(target: "runtime", len = text.len(), "notes_saved");
    }
}

/// The built screen: which panel is primary.
#[derive(Debug, Clone, Copy)]
pub struct ActiveScreen {
    pub screen: Screen,
    pub log: PanelId,
}

/// Build `screen`'s panels and arrange them. The compositor must be empty.
pub fn enter<S: TerminalSurface>(
    compositor: &mut Compositor<S>,
    screen: Screen,
    notes: &NotesStore,
) -> Result<ActiveScreen> {
    let log = compositor.insert_panel(Panel::text(LOG, 40, 10));
    compositor.set_primary(log)?;
    compositor.append_line(log, format!("-- {screen} --"))?;

    for name in screen.secondary_panels() {
        let panel = match *name {
            HELP => {
                let mut p = Panel::text(HELP, 34, 1);
                p.set_lines(HELP_LINES.iter().map(|l| l.to_string()).collect());
                p
            }
            NOTES => {
                let sink = notes.clone();
                let mut p = Panel::editable(NOTES, 34, 3)
                    .with_save_callback(Box::new(move |text: &str| sink.save(text)));
                let saved = notes.text();
                if !saved.is_empty() {
                    p.set_lines(saved.split('\n').map(str::to_string).collect());
                }
                p
            }
            PLAYERS => {
                let seats = seats_for(screen);
                Panel::list(PLAYERS, 24, 2, Box::new(move || Ok(seats.clone())))
                    .with_formatter(Box::new(|idx, name| format!("{:>2}. {name}", idx + 1)))
            }
            TIMER => {
                let mut p = Panel::text(TIMER, 16, 1);
                p.set_lines(vec![format_countdown(None)]);
                p
            }
            other => bail!("screen {screen} lists unknown panel '{other}'"),
        };
        compositor.insert_panel(panel);
    }
    for name in screen.opened_on_entry() {
        if let Some(id) = compositor.find_panel(name) {
            compositor.open_secondary(id)?;
        }
    }
    compositor.set_status_line(screen.as_str());
    tracing::info!(target: "runtime", screen = screen.as_str(), "screen_entered");
    Ok(ActiveScreen { screen, log })
}

fn seats_for(screen: Screen) -> Vec<String> {
    let taken = match screen {
        Screen::Game => 4,
        _ => SEAT_NAMES.len(),
    };
    SEAT_NAMES[..taken].iter().map(|s| s.to_string()).collect()
}

/// `mm:ss` line for the timer panel; `None` when idle.
pub fn format_countdown(remaining: Option<u32>) -> String {
    match remaining {
        Some(secs) => format!("round {:02}:{:02}", secs / 60, secs % 60),
        None => "round --:--".to_string(),
    }
}

//! Command shell for the input line.
//!
//! Lines starting with `/` are commands; anything else is chat text for the
//! primary log. Parsing is pure; the runtime executes the result.

use crate::screens::Screen;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(String),
    Close(String),
    Screen(Screen),
    Edit,
    /// Countdown length; `None` uses the configured default.
    Timer(Option<u32>),
    Status(String),
    Quit,
    Say(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command /{0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("unknown screen '{0}'")]
    BadScreen(String),
    #[error("'{0}' is not a number of seconds")]
    BadSeconds(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };
        let (verb, arg) = match rest.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (rest, ""),
        };
        match verb {
            "open" => single_word(arg, "/open <panel>").map(Command::Open),
            "close" => single_word(arg, "/close <panel>").map(Command::Close),
            "screen" => {
                let name = single_word(arg, "/screen home|lobby|game")?;
                name.parse()
                    .map(Command::Screen)
                    .map_err(|_| CommandError::BadScreen(name))
            }
            "edit" => Ok(Command::Edit),
            "timer" if arg.is_empty() => Ok(Command::Timer(None)),
            "timer" => match arg.parse::<u32>() {
                Ok(secs) if secs > 0 => Ok(Command::Timer(Some(secs))),
                _ => Err(CommandError::BadSeconds(arg.to_string())),
            },
            "status" => Ok(Command::Status(arg.to_string())),
            "quit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Open(_) => "open",
            Command::Close(_) => "close",
            Command::Screen(_) => "screen",
            Command::Edit => "edit",
            Command::Timer(_) => "timer",
            Command::Status(_) => "status",
            Command::Quit => "quit",
            Command::Say(_) => "say",
        }
    }
}

fn single_word(arg: &str, usage: &'static str) -> Result<String, CommandError> {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        return Err(CommandError::Usage(usage));
    }
    Ok(arg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(Command::parse("  hello all "), Ok(Command::Say("hello all".into())));
    }

    #[test]
    fn panel_commands_take_one_name() {
        assert_eq!(Command::parse("/open notes"), Ok(Command::Open("notes".into())));
        assert_eq!(Command::parse("/close  players"), Ok(Command::Close("players".into())));
        assert_eq!(
            Command::parse("/open"),
            Err(CommandError::Usage("/open <panel>"))
        );
        assert!(matches!(Command::parse("/close a b"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn screen_and_timer_arguments_are_checked() {
        assert_eq!(Command::parse("/screen game"), Ok(Command::Screen(Screen::Game)));
        assert_eq!(
            Command::parse("/screen arena"),
            Err(CommandError::BadScreen("arena".into()))
        );
        assert_eq!(Command::parse("/timer"), Ok(Command::Timer(None)));
        assert_eq!(Command::parse("/timer 90"), Ok(Command::Timer(Some(90))));
        assert_eq!(
            Command::parse("/timer 0"),
            Err(CommandError::BadSeconds("0".into()))
        );
        assert_eq!(
            Command::parse("/timer soon"),
            Err(CommandError::BadSeconds("soon".into()))
        );
    }

    #[test]
    fn status_keeps_its_whole_argument() {
        assert_eq!(
            Command::parse("/status away for 5"),
            Ok(Command::Status("away for 5".into()))
        );
        assert_eq!(Command::parse("/status"), Ok(Command::Status(String::new())));
    }

    #[test]
    fn unknown_verbs_are_errors() {
        assert_eq!(Command::parse("/dance"), Err(CommandError::Unknown("dance".into())));
        assert_eq!(Command::parse("/quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("/edit"), Ok(Command::Edit));
    }
}

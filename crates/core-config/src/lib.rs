//! Configuration loading and parsing.
//!
//! Parses `townsquare.toml` (or an override path provided by the binary).
//! Every field has a default so a missing file, a missing table or a parse
//! error all yield a usable `Config`. Unknown fields are ignored.
//!
//! `page_overlap` depends on the viewport: it is clamped to
//! `primary_rows - 1` so a page scroll always advances by at least one row.
//! The raw value is retained so a later resize can re-clamp upwards again.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Viewport facts the clamp depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigContext {
    pub viewport_columns: u16,
    pub viewport_rows: u16,
    /// Rows reserved below the panels (status/input line).
    pub status_rows: u16,
}

impl ConfigContext {
    pub fn new(viewport_columns: u16, viewport_rows: u16, status_rows: u16) -> Self {
        Self {
            viewport_columns,
            viewport_rows,
            status_rows,
        }
    }

    /// Rows available to the primary panel.
    pub fn primary_rows(&self) -> u16 {
        self.viewport_rows.saturating_sub(self.status_rows)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrollConfig {
    #[serde(default = "ScrollConfig::default_page_overlap")]
    pub page_overlap: u16,
    #[serde(default = "ScrollConfig::default_stack_step")]
    pub stack_step: u16,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            page_overlap: Self::default_page_overlap(),
            stack_step: Self::default_stack_step(),
        }
    }
}

impl ScrollConfig {
    const fn default_page_overlap() -> u16 {
        1
    }
    const fn default_stack_step() -> u16 {
        3
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "StatusConfig::default_prompt")]
    pub prompt: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            prompt: Self::default_prompt(),
        }
    }
}

impl StatusConfig {
    fn default_prompt() -> String {
        "> ".to_string()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimersConfig {
    #[serde(default = "TimersConfig::default_countdown_secs")]
    pub default_countdown_secs: u32,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            default_countdown_secs: Self::default_countdown_secs(),
        }
    }
}

impl TimersConfig {
    const fn default_countdown_secs() -> u32 {
        60
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub timers: TimersConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub raw: Option<String>,
    pub file: ConfigFile,
    /// `page_overlap` after clamping against the current viewport.
    pub effective_page_overlap: u16,
}

impl Default for Config {
    fn default() -> Self {
        let file = ConfigFile::default();
        Self {
            raw: None,
            effective_page_overlap: file.scroll.page_overlap,
            file,
        }
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("townsquare.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("townsquare").join("townsquare.toml");
    }
    PathBuf::from("townsquare.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_missing_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            let effective_page_overlap = file.scroll.page_overlap;
            Ok(Config {
                raw: Some(content),
                file,
                effective_page_overlap,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Clamp `page_overlap` for the given viewport. Returns the effective value.
    pub fn apply_context(&mut self, ctx: ConfigContext) -> u16 {
        let raw = self.file.scroll.page_overlap;
        let rows = ctx.primary_rows();
        let max = rows.saturating_sub(1);
        let clamped = raw.min(max);
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                max,
                primary_rows = rows,
                viewport_rows = ctx.viewport_rows,
                status_rows = ctx.status_rows,
                "page_overlap_clamped"
            );
        }
        self.effective_page_overlap = clamped;
        clamped
    }

    /// Re-clamp after a viewport change. `Some(new)` when the effective value changed.
    pub fn recompute_with_context(&mut self, ctx: ConfigContext) -> Option<u16> {
        let prev = self.effective_page_overlap;
        let current = self.apply_context(ctx);
        if current != prev { Some(current) } else { None }
    }

    pub fn prompt(&self) -> &str {
        &self.file.status.prompt
    }

    pub fn stack_step(&self) -> u16 {
        self.file.scroll.stack_step.max(1)
    }

    pub fn default_countdown_secs(&self) -> u32 {
        self.file.timers.default_countdown_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
    use tracing::Level;
    use tracing::subscriber::with_default;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct BufferWriter {
        inner: Arc<Mutex<Vec<u8>>>,
    }

    impl BufferWriter {
        fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
            let buf = Arc::new(Mutex::new(Vec::new()));
            (Self { inner: buf.clone() }, buf)
        }
    }

    struct LockedWriter<'a> {
        guard: MutexGuard<'a, Vec<u8>>,
    }

    impl Write for LockedWriter<'_> {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for BufferWriter {
        type Writer = LockedWriter<'a>;

        fn make_writer(&'a self) -> Self::Writer {
            LockedWriter {
                guard: self.inner.lock().expect("log buffer poisoned"),
            }
        }
    }

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        tmp
    }

    #[test]
    fn defaults_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file.scroll.page_overlap, 1);
        assert_eq!(cfg.stack_step(), 3);
        assert_eq!(cfg.prompt(), "> ");
        assert_eq!(cfg.default_countdown_secs(), 60);
    }

    #[test]
    fn parses_all_sections() {
        let tmp = write_config(
            "[scroll]\npage_overlap = 4\nstack_step = 5\n[status]\nprompt = \"$ \"\n[timers]\ndefault_countdown_secs = 90\n",
        );
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.scroll.page_overlap, 4);
        assert_eq!(cfg.effective_page_overlap, 4);
        assert_eq!(cfg.stack_step(), 5);
        assert_eq!(cfg.prompt(), "$ ");
        assert_eq!(cfg.default_countdown_secs(), 90);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let tmp = write_config("[scroll]\nstack_step = 0\nunknown = true\n");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.scroll.page_overlap, 1);
        assert_eq!(cfg.stack_step(), 1, "zero step is raised to one");
    }

    #[test]
    fn parse_error_falls_back_to_defaults() {
        let tmp = write_config("[scroll\npage_overlap = ");
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(cfg.raw.is_none());
        assert_eq!(cfg.file.scroll.page_overlap, 1);
    }

    #[test]
    fn clamps_overlap_to_viewport() {
        let tmp = write_config("[scroll]\npage_overlap = 30\n");
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        // 24 rows minus the input line -> 23 primary rows -> max overlap 22
        assert_eq!(cfg.apply_context(ConfigContext::new(80, 24, 1)), 22);
        let changed = cfg.recompute_with_context(ConfigContext::new(80, 10, 1));
        assert_eq!(changed, Some(8));
        assert_eq!(cfg.recompute_with_context(ConfigContext::new(90, 10, 1)), None);
        assert_eq!(cfg.recompute_with_context(ConfigContext::new(80, 60, 1)), Some(30));
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = write_config("[scroll]\npage_overlap = 8\n");
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        with_default(subscriber, || {
            cfg.apply_context(ConfigContext::new(80, 5, 1));
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("page_overlap_clamped"));
        assert_eq!(cfg.effective_page_overlap, 3);
    }
}

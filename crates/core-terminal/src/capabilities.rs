//! Terminal capability probing.
//!
//! Records the few booleans the surface consults when choosing between the
//! scroll-region fast path and re-emitting rows from the shadow grid.
//! Detection runs once at startup and must be cheap: no round-trip probe is
//! sent. `TOWNSQUARE_NO_SCROLL_REGION=1` forces the fallback path, which is
//! the escape hatch for terminals (or multiplexers) that mangle `DECSTBM`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TerminalCapabilities {
    pub supports_scroll_region: bool,
}

impl TerminalCapabilities {
    pub const fn new(supports_scroll_region: bool) -> Self {
        Self {
            supports_scroll_region,
        }
    }

    pub fn detect() -> Self {
        Self::from_env_flag(std::env::var("TOWNSQUARE_NO_SCROLL_REGION").ok().as_deref())
    }

    fn from_env_flag(flag: Option<&str>) -> Self {
        let disabled = matches!(flag, Some(v) if v != "0" && !v.is_empty());
        let caps = Self::new(!disabled);
        tracing::debug!(target: "terminal.caps", supports_scroll_region = caps.supports_scroll_region, "detected");
        caps
    }
}

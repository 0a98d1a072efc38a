#![allow(dead_code)]

use core_panel::Panel;
use core_render::{Compositor, CompositorOptions};
use core_terminal::HeadlessSurface;

pub type TestCompositor = Compositor<HeadlessSurface>;

pub fn compositor(width: u16, height: u16) -> TestCompositor {
    Compositor::new(HeadlessSurface::new(width, height), CompositorOptions::default())
}

/// Text panel holding `rows` lines named `{prefix}{i}`.
pub fn numbered(prefix: &str, rows: usize, min_width: u16, min_height: u16) -> Panel {
    let mut p = Panel::text(prefix, min_width, min_height);
    for i in 0..rows {
        p.append_line(format!("{prefix}{i}"));
    }
    p
}

/// Trimmed text of the secondary column at row `y` for the reference split.
pub fn side(c: &TestCompositor, y: u16) -> String {
    let split = c.split();
    c.surface()
        .span_text(split.secondary_left, y, split.secondary_width)
        .trim_end()
        .to_string()
}

pub fn primary_row(c: &TestCompositor, y: u16) -> String {
    c.surface()
        .span_text(0, y, c.split().primary_width)
        .trim_end()
        .to_string()
}

//! Primary paging, stack scrolling and their interaction with the stack.

mod common;

use common::{TestCompositor, compositor, numbered, primary_row, side};
use core_events::PanelId;
use pretty_assertions::assert_eq;

/// 90x24 terminal, `log_rows` lines in the primary, one 3-line stack panel.
fn with_stack(log_rows: usize) -> (TestCompositor, PanelId, PanelId) {
    let mut c = compositor(90, 24);
    let log = c.insert_panel(numbered("log", log_rows, 60, 20));
    let a = c.insert_panel(numbered("a", 3, 25, 1));
    c.set_primary(log).unwrap();
    c.open_secondary(a).unwrap();
    c.render_pass().unwrap();
    (c, log, a)
}

fn anchor(c: &TestCompositor, id: PanelId) -> i64 {
    c.panel(id).unwrap().last_geometry().unwrap().anchor
}

#[test]
fn scroll_round_trip_restores_view() {
    let (mut c, _, _) = with_stack(100);
    let before = c.surface().snapshot();
    c.scroll_primary(7);
    c.render_pass().unwrap();
    assert_eq!(c.window_top(), 7);
    assert_eq!(primary_row(&c, 0), "log7");
    c.scroll_primary(-7);
    c.render_pass().unwrap();
    assert_eq!(c.window_top(), 0);
    assert_eq!(c.surface().snapshot(), before);
}

#[test]
fn paging_moves_only_the_primary_column() {
    let (mut c, log, a) = with_stack(100);
    let a_before = anchor(&c, a);
    c.surface_mut().reset_counters();

    c.page_primary(true);
    c.render_pass().unwrap();

    // 23 panel rows, one row of overlap.
    assert_eq!(c.window_top(), 22);
    assert_eq!(c.panel(log).unwrap().last_geometry().unwrap().start_line, 22);
    assert_eq!(primary_row(&c, 0), "log22");
    let counters = c.surface().counters();
    assert_eq!(counters.moves, 1);
    assert_eq!(counters.writes, 22);
    assert!(c.surface().write_origins().iter().all(|&(x, _)| x == 0));
    // The stack reference moved with the window; the panel stayed put on screen.
    assert_eq!(anchor(&c, a) - a_before, 22);
    assert_eq!(c.panel(a).unwrap().last_geometry().unwrap().top, 20);
    assert_eq!(side(&c, 20), "a0");
}

#[test]
fn partially_clamped_page_carries_stack_by_actual_distance() {
    let (mut c, _, a) = with_stack(30);
    let a_before = anchor(&c, a);
    c.page_primary(true);
    c.render_pass().unwrap();
    assert_eq!(c.window_top(), 7);
    assert_eq!(anchor(&c, a) - a_before, 7);
}

#[test]
fn clamped_scroll_moves_nothing() {
    let (mut c, _, a) = with_stack(100);
    let a_before = anchor(&c, a);
    c.surface_mut().reset_counters();

    c.scroll_primary(-5);
    c.render_pass().unwrap();

    let counters = c.surface().counters();
    assert_eq!((counters.moves, counters.writes), (0, 0));
    assert_eq!(c.window_top(), 0);
    assert_eq!(anchor(&c, a), a_before);
    assert_eq!(c.metrics().clamped_scrolls, 1);
}

#[test]
fn resize_during_scroll_escalates_to_full_relayout() {
    let (mut c, _, _) = with_stack(100);
    c.surface_mut().set_size(100, 30);
    c.scroll_primary(3);
    c.render_pass().unwrap();

    let m = c.metrics();
    assert_eq!(m.resize_races, 1);
    assert_eq!(m.full_relayouts, 2);
    assert_eq!(m.primary_scrolls, 0, "no buffer move for a stale size");
    assert_eq!(c.window_top(), 3);
    assert_eq!(c.split().primary_width, 74);
    assert_eq!(primary_row(&c, 0), "log3");
}

#[test]
fn stack_scroll_reveals_clipped_upper_panel() {
    let mut c = compositor(90, 24);
    let log = c.insert_panel(numbered("log", 10, 60, 20));
    let a = c.insert_panel(numbered("a", 15, 25, 1));
    let b = c.insert_panel(numbered("b", 15, 25, 1));
    c.set_primary(log).unwrap();
    c.open_secondary(a).unwrap();
    c.open_secondary(b).unwrap();
    c.render_pass().unwrap();

    // 31 stack rows in 23: the top of the upper panel is clipped.
    assert_eq!(side(&c, 0), "a8");
    assert_eq!(side(&c, 7), "─".repeat(25));
    assert_eq!(side(&c, 8), "b0");

    c.surface_mut().reset_counters();
    c.scroll_stack(-8);
    c.render_pass().unwrap();

    assert_eq!(c.displacement(), 8);
    assert_eq!(side(&c, 0), "a0");
    assert_eq!(side(&c, 14), "a14");
    assert_eq!(side(&c, 15), "─".repeat(25));
    assert_eq!(side(&c, 16), "b0");
    assert_eq!(side(&c, 22), "b6");
    let counters = c.surface().counters();
    assert_eq!(counters.moves, 1);
    assert_eq!(counters.writes, 8, "only the revealed rows");
    assert!(c.surface().write_origins().iter().all(|&(x, _)| x == 65));
    assert_eq!(primary_row(&c, 0), "log0");

    c.scroll_stack(-5);
    c.render_pass().unwrap();
    assert_eq!(c.displacement(), 8);
    assert_eq!(c.metrics().clamped_scrolls, 1);

    c.scroll_stack(8);
    c.render_pass().unwrap();
    assert_eq!(c.displacement(), 0);
    assert_eq!(side(&c, 0), "a8");
    assert_eq!(side(&c, 8), "b0");
    assert_eq!(side(&c, 22), "b14");
}

#[test]
fn scrolls_queued_with_a_relayout_become_state() {
    let (mut c, _, _) = with_stack(100);
    c.scroll_primary(4);
    c.scroll_primary(6);
    c.request_relayout();
    c.render_pass().unwrap();
    assert_eq!(c.window_top(), 10);
    assert_eq!(c.metrics().primary_scrolls, 0);
    assert_eq!(primary_row(&c, 0), "log10");
    assert_eq!(c.scheduler_metrics().collapsed_scroll, 1);
}

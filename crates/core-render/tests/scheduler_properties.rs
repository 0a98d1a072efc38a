//! Property-based tests for RenderScheduler merge semantics.

use core_events::PanelId;
use core_render::scheduler::{RedrawState, RenderDelta, RenderScheduler, ScrollTarget};
use proptest::prelude::*;

fn delta() -> impl Strategy<Value = RenderDelta> {
    prop_oneof![
        1 => Just(RenderDelta::Full),
        2 => Just(RenderDelta::Stack),
        4 => (1u32..6).prop_map(|n| RenderDelta::Panel(PanelId(n))),
        4 => (any::<bool>(), -30i64..30).prop_map(|(primary, lines)| RenderDelta::Scroll {
            target: if primary { ScrollTarget::Primary } else { ScrollTarget::Stack },
            lines,
        }),
        2 => Just(RenderDelta::Status),
        2 => Just(RenderDelta::Cursor),
    ]
}

proptest! {
    // Full anywhere in the batch wins.
    #[test]
    fn full_dominates(before in prop::collection::vec(delta(), 0..12), after in prop::collection::vec(delta(), 0..12)) {
        let mut s = RenderScheduler::new();
        for d in before { s.mark(d); }
        s.mark(RenderDelta::Full);
        for d in after { s.mark(d); }
        prop_assert_eq!(s.state(), RedrawState::NeedsFullRelayout);
        let plan = s.consume().unwrap();
        prop_assert!(plan.full);
    }

    // Scroll distances add up per target, independent of interleaving.
    #[test]
    fn scrolls_are_summed(batch in prop::collection::vec(delta(), 1..24)) {
        let (mut primary, mut stack) = (0i64, 0i64);
        let mut s = RenderScheduler::new();
        for d in &batch {
            if let RenderDelta::Scroll { target, lines } = d {
                match target {
                    ScrollTarget::Primary => primary += lines,
                    ScrollTarget::Stack => stack += lines,
                }
            }
            s.mark(d.clone());
        }
        let plan = s.consume().unwrap();
        prop_assert_eq!(plan.primary_scroll, primary);
        prop_assert_eq!(plan.stack_scroll, stack);
    }

    // Panel repaints are deduplicated in first-mark order.
    #[test]
    fn panels_dedup_in_first_mark_order(ids in prop::collection::vec(1u32..6, 1..20)) {
        let mut s = RenderScheduler::new();
        let mut expected: Vec<PanelId> = Vec::new();
        for n in ids {
            let id = PanelId(n);
            if !expected.contains(&id) { expected.push(id); }
            s.mark(RenderDelta::Panel(id));
        }
        let plan = s.consume().unwrap();
        prop_assert_eq!(s.state(), RedrawState::Stable);
        prop_assert_eq!(plan.state(), RedrawState::NeedsPanelRepaint(expected[0]));
        prop_assert_eq!(plan.panels, expected);
    }

    // Every consume counts one frame; an empty queue counts nothing.
    #[test]
    fn one_frame_per_consume(batches in prop::collection::vec(prop::collection::vec(delta(), 0..5), 1..8)) {
        let mut s = RenderScheduler::new();
        let mut frames = 0u64;
        for batch in batches {
            let empty = batch.is_empty();
            for d in batch { s.mark(d); }
            let plan = s.consume();
            prop_assert_eq!(plan.is_none(), empty);
            if !empty { frames += 1; }
        }
        prop_assert_eq!(s.metrics_snapshot().semantic_frames, frames);
    }
}

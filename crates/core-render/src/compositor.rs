//! The compositor: layout engine, scroll engine and redraw driver.
//!
//! Owns the terminal surface, the panel store and the screen arrangement (one
//! primary panel, an ordered secondary stack, the status/input line). Every
//! mutation entry point only records intent in the [`RenderScheduler`];
//! [`Compositor::render_pass`] then runs the cheapest path that covers what
//! was queued and escalates when a panel reports a geometry mismatch:
//!
//! * panel repaint: `rerender` at the cached geometry;
//! * stack relayout: re-place stack panels bottom-up, redraw only panels
//!   whose placement changed, fix separator and blank rows;
//! * full relayout: clear, split columns, grow the terminal if needed, draw
//!   everything. The only path that clears the terminal.
//!
//! Scrolling works on canvas rows. Paging the primary panel advances the
//! window and the stack reference by the same actual distance, so stack
//! panels keep their screen rows and nothing in the secondary column is
//! written. Scrolling the stack moves the secondary column with one buffer
//! move and paints only the rows it uncovers.

use crate::cursor::{CursorArbiter, CursorOwner, resolve};
use crate::error::LayoutError;
use crate::layout::{ColumnSplit, STATUS_ROWS, column_split, required_size};
use crate::metrics::{RenderPathMetrics, RenderPathMetricsSnapshot};
use crate::scheduler::{
    RedrawPlan, RedrawState, RenderDelta, RenderDeltaMetricsSnapshot, RenderScheduler,
    ScrollTarget,
};
use crate::stack::{ColumnMap, RowOwner, StackPlan, overflow};
use crate::status::{StatusLine, StatusOutcome};
use crate::store::PanelStore;
use core_events::{KeyEvent, PanelId, UiRequest};
use core_panel::text::{blank, fit_to_width};
use core_panel::{EditOutcome, Geometry, Panel, Placement, Rerender, plan_shift};
use core_terminal::{CellStyle, Rect, TerminalSurface};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

const TOO_SMALL: &str = "terminal too small";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorOptions {
    /// Rows of the previous page kept visible when paging the primary panel.
    pub page_overlap: u16,
    /// Rows moved by one stack scroll step.
    pub stack_step: u16,
    pub prompt: String,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            page_overlap: 1,
            stack_step: 3,
            prompt: "> ".to_string(),
        }
    }
}

/// What a render step left to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Done,
    Stack,
    Full,
}

pub struct Compositor<S: TerminalSurface> {
    surface: S,
    store: PanelStore,
    primary: Option<PanelId>,
    /// Top-most first; the last entry sits on the status line.
    stack: Vec<PanelId>,
    split: ColumnSplit,
    /// Widest stack minimum the current split was computed for.
    stack_width: u16,
    /// Terminal size the current layout was computed for.
    term_size: (u16, u16),
    /// Canvas row shown at screen row 0; equals the primary panel's start line.
    window_top: i64,
    /// How far the stack bottom sits below the window bottom. Raised by
    /// scrolling the stack back to reveal clipped upper panels.
    displacement: i64,
    /// Stack height (separators included) at the last stack placement.
    stack_height: i64,
    column: ColumnMap,
    status: StatusLine,
    arbiter: CursorArbiter,
    scheduler: RenderScheduler,
    metrics: RenderPathMetrics,
    generation: u64,
    options: CompositorOptions,
    /// Set while the terminal is below the minimum size.
    blocked: bool,
    /// Panels closed or removed since the last `take_closed`.
    closed: Vec<PanelId>,
}

impl<S: TerminalSurface> Compositor<S> {
    /// The first `render_pass` performs a full relayout.
    pub fn new(surface: S, options: CompositorOptions) -> Self {
        let term_size = surface.size();
        let mut scheduler = RenderScheduler::new();
        scheduler.mark(RenderDelta::Full);
        Self {
            surface,
            store: PanelStore::new(),
            primary: None,
            stack: Vec::new(),
            split: ColumnSplit::default(),
            stack_width: 0,
            term_size,
            window_top: 0,
            displacement: 0,
            stack_height: 0,
            column: ColumnMap::default(),
            status: StatusLine::new(&options.prompt),
            arbiter: CursorArbiter::new(),
            scheduler,
            metrics: RenderPathMetrics::default(),
            generation: 0,
            options,
            blocked: false,
            closed: Vec::new(),
        }
    }

    // ---- accessors -------------------------------------------------------

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        self.store.get(id)
    }

    /// Direct panel access. Content changes made here must be followed by
    /// [`Compositor::request_repaint`].
    pub fn panel_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.store.get_mut(id)
    }

    pub fn find_panel(&self, name: &str) -> Option<PanelId> {
        self.store.find_by_name(name)
    }

    pub fn primary(&self) -> Option<PanelId> {
        self.primary
    }

    pub fn stack(&self) -> &[PanelId] {
        &self.stack
    }

    pub fn split(&self) -> ColumnSplit {
        self.split
    }

    pub fn window_top(&self) -> i64 {
        self.window_top
    }

    pub fn displacement(&self) -> i64 {
        self.displacement
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn cursor_owner(&self) -> CursorOwner {
        self.arbiter.state()
    }

    pub fn status_input(&self) -> &str {
        self.status.input()
    }

    /// Most expensive redraw currently queued.
    pub fn state(&self) -> RedrawState {
        self.scheduler.state()
    }

    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn metrics(&self) -> RenderPathMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn scheduler_metrics(&self) -> RenderDeltaMetricsSnapshot {
        self.scheduler.metrics_snapshot()
    }

    pub fn options(&self) -> &CompositorOptions {
        &self.options
    }

    /// Takes effect on the next page scroll.
    pub fn set_page_overlap(&mut self, rows: u16) {
        self.options.page_overlap = rows;
    }

    fn rows(&self) -> u16 {
        self.term_size.1.saturating_sub(STATUS_ROWS)
    }

    /// Exclusive canvas row the stack is bottom-aligned on.
    fn stack_bottom(&self) -> i64 {
        self.window_top + self.rows() as i64 + self.displacement
    }

    fn stack_min_width(&self) -> u16 {
        self.stack
            .iter()
            .filter_map(|id| self.store.get(*id))
            .map(Panel::min_width)
            .max()
            .unwrap_or(0)
    }

    fn primary_min(&self) -> (u16, u16) {
        self.primary
            .and_then(|id| self.store.get(id))
            .map_or((0, 0), |p| (p.min_width(), p.min_height()))
    }

    /// Stack entries with current content heights.
    fn stack_entries(&self) -> Vec<(PanelId, usize)> {
        self.stack
            .iter()
            .filter_map(|id| self.store.get(*id).map(|p| (*id, p.full_height())))
            .collect()
    }

    /// Stack entries with the heights they were last placed with.
    fn laid_out_entries(&self) -> Vec<(PanelId, usize)> {
        self.stack
            .iter()
            .filter_map(|id| {
                self.store.get(*id).map(|p| {
                    let h = p.last_geometry().map_or(p.full_height(), |g| g.full_height);
                    (*id, h)
                })
            })
            .collect()
    }

    fn stack_placement(&self, anchor: i64, full_height: usize) -> Placement {
        Placement::clipped(
            anchor,
            anchor - self.window_top,
            full_height,
            self.split.secondary_left,
            self.split.secondary_width,
            self.rows(),
            self.generation,
        )
    }

    // ---- contract checks -------------------------------------------------

    fn violation(&self, err: LayoutError) -> LayoutError {
        error!(target: "render.layout", error = %err, "contract_violation");
        err
    }

    fn check_known(&self, id: PanelId) -> Result<(), LayoutError> {
        if self.store.contains(id) {
            Ok(())
        } else {
            Err(self.violation(LayoutError::UnknownPanel(id)))
        }
    }

    fn checked_mut(&mut self, id: PanelId) -> Result<&mut Panel, LayoutError> {
        self.check_known(id)?;
        self.store.get_mut(id).ok_or(LayoutError::UnknownPanel(id))
    }

    fn on_screen(&self, id: PanelId) -> bool {
        self.primary == Some(id) || self.stack.contains(&id)
    }

    fn mark_content(&mut self, id: PanelId) {
        if self.on_screen(id) {
            self.scheduler.mark(RenderDelta::Panel(id));
        }
    }

    // ---- collaborator API ------------------------------------------------

    pub fn insert_panel(&mut self, panel: Panel) -> PanelId {
        self.store.insert(panel)
    }

    /// Destroy a panel. The active primary panel cannot be removed; a stack
    /// panel is closed first (saving it if it is being edited).
    pub fn remove_panel(&mut self, id: PanelId) -> Result<Panel, LayoutError> {
        self.check_known(id)?;
        if self.primary == Some(id) {
            return Err(self.violation(LayoutError::PrimaryRemoval(id)));
        }
        if !self.close_secondary(id)? {
            self.closed.push(id);
        }
        self.store.remove(id).ok_or(LayoutError::UnknownPanel(id))
    }

    /// Remove every panel of the current screen. Returns the removed ids.
    pub fn teardown(&mut self) -> Vec<PanelId> {
        if let Some(id) = self.arbiter.end()
            && let Some(panel) = self.store.get_mut(id)
            && panel.commit()
        {
            info!(target: "render.cursor", %id, "edit_saved");
        }
        self.stack.clear();
        self.closed.clear();
        self.primary = None;
        self.window_top = 0;
        self.displacement = 0;
        let ids = self.store.ids();
        for id in &ids {
            self.store.remove(*id);
        }
        self.scheduler.mark(RenderDelta::Full);
        ids
    }

    pub fn append_line(&mut self, id: PanelId, line: impl Into<String>) -> Result<bool, LayoutError> {
        let appended = self.checked_mut(id)?.append_line(line);
        if appended {
            self.mark_content(id);
        } else {
            warn!(target: "panel", %id, "append_to_non_text_panel");
        }
        Ok(appended)
    }

    pub fn set_lines(&mut self, id: PanelId, lines: Vec<String>) -> Result<bool, LayoutError> {
        let set = self.checked_mut(id)?.set_lines(lines);
        if set {
            self.mark_content(id);
        }
        Ok(set)
    }

    /// Re-pull a list panel's source.
    pub fn refresh(&mut self, id: PanelId) -> Result<(), LayoutError> {
        self.checked_mut(id)?.refresh();
        self.mark_content(id);
        Ok(())
    }

    pub fn request_repaint(&mut self, id: PanelId) -> Result<(), LayoutError> {
        self.check_known(id)?;
        self.scheduler.mark(RenderDelta::Panel(id));
        Ok(())
    }

    pub fn request_relayout(&mut self) {
        self.scheduler.mark(RenderDelta::Full);
    }

    pub fn set_primary(&mut self, id: PanelId) -> Result<(), LayoutError> {
        self.check_known(id)?;
        if self.stack.contains(&id) {
            return Err(self.violation(LayoutError::PrimaryInStack(id)));
        }
        if self.primary == Some(id) {
            return Ok(());
        }
        info!(target: "render.layout", %id, previous = ?self.primary, "primary_set");
        if let Some(old) = self.primary.and_then(|old| self.store.get_mut(old)) {
            old.unplace();
        }
        self.primary = Some(id);
        self.window_top = 0;
        self.displacement = 0;
        self.scheduler.mark(RenderDelta::Full);
        Ok(())
    }

    /// Add a panel to the bottom of the secondary stack. Opening an open
    /// panel is a no-op.
    pub fn open_secondary(&mut self, id: PanelId) -> Result<(), LayoutError> {
        self.check_known(id)?;
        if self.primary == Some(id) {
            return Err(self.violation(LayoutError::PrimaryInStack(id)));
        }
        if self.stack.contains(&id) {
            return Ok(());
        }
        self.stack.push(id);
        debug!(target: "render.layout", %id, depth = self.stack.len(), "secondary_opened");
        self.scheduler.mark(RenderDelta::Stack);
        Ok(())
    }

    /// Returns `false` when the panel was not open.
    pub fn close_secondary(&mut self, id: PanelId) -> Result<bool, LayoutError> {
        self.check_known(id)?;
        let Some(pos) = self.stack.iter().position(|s| *s == id) else {
            return Ok(false);
        };
        if self.arbiter.is_editing(id) {
            self.end_edit(false)?;
        }
        self.stack.remove(pos);
        if let Some(panel) = self.store.get_mut(id) {
            panel.unplace();
        }
        self.closed.push(id);
        debug!(target: "render.layout", %id, depth = self.stack.len(), "secondary_closed");
        self.scheduler.mark(RenderDelta::Stack);
        Ok(true)
    }

    /// Drain the panels closed (by any path) since the last call. Teardown
    /// reports its panels through its own return value instead.
    pub fn take_closed(&mut self) -> Vec<PanelId> {
        std::mem::take(&mut self.closed)
    }

    pub fn set_status_line(&mut self, text: &str) {
        if self.status.set_text(text) {
            self.scheduler.mark_status();
        }
    }

    /// Give keyboard focus to an editable stack panel, opening it if needed.
    pub fn begin_edit(&mut self, id: PanelId) -> Result<(), LayoutError> {
        self.check_known(id)?;
        if self.primary == Some(id) {
            return Err(self.violation(LayoutError::PrimaryInStack(id)));
        }
        if !self.store.get(id).is_some_and(Panel::is_editable) {
            return Err(self.violation(LayoutError::NotEditable(id)));
        }
        if self.arbiter.is_editing(id) {
            return Ok(());
        }
        if self.arbiter.target().is_some() {
            self.end_edit(false)?;
        }
        self.open_secondary(id)?;
        self.arbiter.begin(id);
        self.scheduler.mark_cursor();
        Ok(())
    }

    /// Save the edit target (if dirty), optionally close it, and return the
    /// cursor to the input line. Returns the panel that was being edited.
    pub fn end_edit(&mut self, close: bool) -> Result<Option<PanelId>, LayoutError> {
        let Some(id) = self.arbiter.end() else {
            return Ok(None);
        };
        if let Some(panel) = self.store.get_mut(id)
            && panel.commit()
        {
            info!(target: "render.cursor", %id, "edit_saved");
        }
        if close {
            self.close_secondary(id)?;
        }
        self.scheduler.mark_cursor();
        Ok(Some(id))
    }

    /// Route a key to the edit target. `None` when nothing is being edited.
    pub fn edit_key(&mut self, key: &KeyEvent) -> Option<EditOutcome> {
        let id = self.arbiter.target()?;
        let outcome = self.store.get_mut(id)?.handle_edit_key(key);
        match outcome {
            EditOutcome::Changed => {
                self.scheduler.mark(RenderDelta::Panel(id));
                self.scheduler.mark_cursor();
            }
            EditOutcome::Moved => self.scheduler.mark_cursor(),
            EditOutcome::Ignored => {}
        }
        Some(outcome)
    }

    /// Route a key to the status/input line.
    pub fn input_key(&mut self, key: &KeyEvent) -> StatusOutcome {
        let outcome = self.status.handle_key(key);
        if outcome != StatusOutcome::Ignored {
            self.scheduler.mark_status();
            self.scheduler.mark_cursor();
        }
        outcome
    }

    /// Paste into whoever owns the cursor.
    pub fn paste(&mut self, text: &str) {
        match self.arbiter.target() {
            Some(id) => {
                if let Some(panel) = self.store.get_mut(id)
                    && panel.insert_str(text)
                {
                    self.scheduler.mark(RenderDelta::Panel(id));
                    self.scheduler.mark_cursor();
                }
            }
            None => {
                self.status.insert_str(text);
                self.scheduler.mark_status();
                self.scheduler.mark_cursor();
            }
        }
    }

    pub fn scroll_primary(&mut self, lines: i64) {
        if lines != 0 {
            self.scheduler.mark(RenderDelta::Scroll {
                target: ScrollTarget::Primary,
                lines,
            });
        }
    }

    /// Page the primary panel by one screen, keeping `page_overlap` rows.
    pub fn page_primary(&mut self, forward: bool) {
        let page = (self.rows().saturating_sub(self.options.page_overlap)).max(1) as i64;
        self.scroll_primary(if forward { page } else { -page });
    }

    /// Positive `lines` move the stack up (toward its bottom panels).
    pub fn scroll_stack(&mut self, lines: i64) {
        if lines != 0 {
            self.scheduler.mark(RenderDelta::Scroll {
                target: ScrollTarget::Stack,
                lines,
            });
        }
    }

    pub fn step_stack(&mut self, forward: bool) {
        let step = self.options.stack_step.max(1) as i64;
        self.scroll_stack(if forward { step } else { -step });
    }

    pub fn handle_resize(&mut self, width: u16, height: u16) {
        info!(target: "render.layout", width, height, "terminal_resized");
        self.scheduler.mark(RenderDelta::Full);
    }

    pub fn apply(&mut self, req: UiRequest) -> Result<(), LayoutError> {
        trace!(target: "render.layout", kind = req.kind(), "ui_request");
        match req {
            UiRequest::AppendLine { panel, line } => self.append_line(panel, line).map(drop),
            UiRequest::SetLines { panel, lines } => self.set_lines(panel, lines).map(drop),
            UiRequest::Refresh(id) => self.refresh(id),
            UiRequest::RequestRepaint(id) => self.request_repaint(id),
            UiRequest::RequestRelayout => {
                self.request_relayout();
                Ok(())
            }
            UiRequest::SetPrimary(id) => self.set_primary(id),
            UiRequest::OpenSecondary(id) => self.open_secondary(id),
            UiRequest::CloseSecondary(id) => self.close_secondary(id).map(drop),
            UiRequest::SetStatusLine(text) => {
                self.set_status_line(&text);
                Ok(())
            }
            UiRequest::BeginEdit(id) => self.begin_edit(id),
            UiRequest::EndEdit { close } => self.end_edit(close).map(drop),
        }
    }

    // ---- cursor ----------------------------------------------------------

    /// Current geometry of a panel derived from the layout state rather than
    /// from what the panel recorded.
    pub fn placement_of(&self, id: PanelId) -> Option<Geometry> {
        let panel = self.store.get(id)?;
        if self.blocked {
            return None;
        }
        if self.primary == Some(id) {
            let p = Placement::fixed(
                0,
                0,
                self.split.primary_width,
                self.rows(),
                self.window_top.max(0) as usize,
                self.generation,
            );
            return Some(Geometry::from_placement(&p, panel.full_height()));
        }
        if !self.stack.contains(&id) {
            return None;
        }
        let plan = StackPlan::compute(&self.laid_out_entries(), self.stack_bottom());
        let slot = plan.slot(id)?;
        let p = self.stack_placement(slot.anchor, slot.full_height);
        Some(Geometry::from_placement(&p, slot.full_height))
    }

    /// Where the hardware cursor belongs right now.
    pub fn cursor_position(&self) -> Option<(u16, u16)> {
        if self.blocked {
            return None;
        }
        let (width, height) = self.term_size;
        let Some(id) = self.arbiter.target() else {
            return Some((self.status.cursor_col(width), height.saturating_sub(1)));
        };
        let panel = self.store.get(id)?;
        let local = panel.local_cursor()?;
        resolve(local, panel.last_geometry().copied(), self.generation, || {
            RenderPathMetrics::incr(&self.metrics.cursor_rederived);
            self.placement_of(id)
        })
    }

    // ---- render pass -----------------------------------------------------

    /// Run one redraw pass covering everything queued since the last pass.
    pub fn render_pass(&mut self) -> Result<(), LayoutError> {
        let Some(plan) = self.scheduler.consume() else {
            return Ok(());
        };
        let started = Instant::now();
        let outcome = self.run_plan(&plan);
        let finished = self.finish_pass(outcome.is_ok());
        self.drain_panel_stats();
        let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.metrics.last_pass_ns.store(elapsed, Ordering::Relaxed);
        debug!(
            target: "render.metrics",
            state = ?plan.state(),
            elapsed_ns = elapsed,
            generation = self.generation,
            "render_pass"
        );
        if let Err(err) = &outcome
            && !matches!(err, LayoutError::TerminalTooSmall { .. })
        {
            warn!(target: "render.layout", error = %err, "render_pass_failed");
        }
        outcome?;
        finished?;
        Ok(())
    }

    fn run_plan(&mut self, plan: &RedrawPlan) -> Result<(), LayoutError> {
        if self.blocked && !plan.full {
            // Kept as window state; the next full relayout clamps it.
            self.window_top += plan.primary_scroll;
            self.displacement -= plan.stack_scroll;
            RenderPathMetrics::incr(&self.metrics.blocked_passes);
            trace!(
                target: "render.scheduler",
                primary_scroll = plan.primary_scroll,
                stack_scroll = plan.stack_scroll,
                "pass_skipped_while_blocked"
            );
            return Ok(());
        }
        let mut primary_scroll = plan.primary_scroll;
        let mut stack_scroll = plan.stack_scroll;
        let mut step = if plan.full {
            Step::Full
        } else if plan.stack {
            self.stack_relayout()?
        } else {
            Step::Done
        };
        if step == Step::Done && primary_scroll != 0 {
            step = self.scroll_primary_now(primary_scroll)?;
            if step == Step::Done {
                primary_scroll = 0;
            }
        }
        if step == Step::Done && stack_scroll != 0 {
            step = self.scroll_stack_now(stack_scroll)?;
            if step == Step::Done {
                stack_scroll = 0;
            }
        }
        if step == Step::Done {
            step = self.repaint_panels(&plan.panels)?;
            if step == Step::Stack {
                step = self.stack_relayout()?;
            }
        }
        if step == Step::Full {
            // Scrolls not yet carried out become plain state for the relayout.
            self.window_top += primary_scroll;
            self.displacement -= stack_scroll;
            self.full_relayout()?;
        }
        Ok(())
    }

    fn finish_pass(&mut self, laid_out: bool) -> anyhow::Result<()> {
        if laid_out && !self.blocked {
            let (width, height) = self.term_size;
            if height > 0 {
                if self.status.draw(&mut self.surface, width, height - 1)? {
                    RenderPathMetrics::incr(&self.metrics.status_repaints);
                } else {
                    RenderPathMetrics::incr(&self.metrics.status_skipped);
                }
            }
            let pos = self.cursor_position();
            self.surface.set_cursor(pos)?;
        } else {
            self.surface.set_cursor(None)?;
        }
        self.surface.flush()
    }

    fn drain_panel_stats(&mut self) {
        for (_, panel) in self.store.iter_mut() {
            let stats = panel.take_stats();
            RenderPathMetrics::add(&self.metrics.rows_written, stats.written);
            RenderPathMetrics::add(&self.metrics.rows_reused, stats.skipped);
            RenderPathMetrics::add(&self.metrics.render_failures, stats.failed);
        }
    }

    /// A cheap path must not apply buffer moves computed for another size.
    fn resize_raced(&self) -> bool {
        let now = self.surface.size();
        if now == self.term_size {
            return false;
        }
        RenderPathMetrics::incr(&self.metrics.resize_races);
        warn!(
            target: "render.scroll",
            cached = ?self.term_size,
            current = ?now,
            "resize_race_forces_full_relayout"
        );
        true
    }

    // ---- full relayout ---------------------------------------------------

    fn full_relayout(&mut self) -> Result<(), LayoutError> {
        let stack_min = self.stack_min_width();
        let (need_w, need_h) = required_size(self.primary_min(), stack_min);
        let (mut width, mut height) = self.surface.size();
        if width < need_w || height < need_h {
            self.surface.resize(need_w.max(width), need_h.max(height))?;
            (width, height) = self.surface.size();
            info!(
                target: "render.layout",
                need_w,
                need_h,
                width,
                height,
                "terminal_grow_requested"
            );
        }
        self.term_size = (width, height);
        self.generation += 1;
        self.surface.clear()?;
        self.status.invalidate();
        for (_, panel) in self.store.iter_mut() {
            panel.invalidate_cache();
        }
        RenderPathMetrics::incr(&self.metrics.full_relayouts);

        if width < need_w || height < need_h {
            self.blocked = true;
            self.column = ColumnMap::default();
            self.surface
                .write_at(0, 0, &fit_to_width(TOO_SMALL, width), CellStyle::REVERSE)?;
            let err = LayoutError::TerminalTooSmall {
                need_w,
                need_h,
                have_w: width,
                have_h: height,
            };
            error!(target: "render.layout", error = %err, "layout_blocked");
            return Err(err);
        }
        self.blocked = false;
        self.split = column_split(width, stack_min);
        self.stack_width = stack_min;

        self.draw_primary()?;
        self.draw_vertical_separator()?;

        let rows = self.rows();
        let entries = self.stack_entries();
        let plan = self.plan_stack(&entries);
        for slot in &plan.slots {
            let placement = self.stack_placement(slot.anchor, slot.full_height);
            if let Some(panel) = self.store.get_mut(slot.id) {
                panel.draw(&mut self.surface, &placement)?;
            }
        }
        let map = ColumnMap::from_plan(&plan, self.window_top, rows);
        let separators: Vec<(u16, RowOwner)> = map
            .iter()
            .filter(|(_, owner)| *owner == RowOwner::Separator)
            .collect();
        self.write_chrome(&separators)?;
        self.column = map;
        info!(
            target: "render.layout",
            width,
            height,
            split = self.split.primary_width,
            stack = self.stack.len(),
            generation = self.generation,
            "full_relayout"
        );
        Ok(())
    }

    /// Draw the primary panel at the window top after clamping the window to
    /// its content. Returns how far the window moved.
    fn draw_primary(&mut self) -> anyhow::Result<i64> {
        let rows = self.rows();
        let generation = self.generation;
        let width = self.split.primary_width;
        let Some(panel) = self.primary.and_then(|id| self.store.get_mut(id)) else {
            let old = self.window_top;
            self.window_top = 0;
            return Ok(-old);
        };
        let max_top = (panel.full_height() as i64 - rows as i64).max(0);
        let old = self.window_top;
        self.window_top = old.clamp(0, max_top);
        let placement = Placement::fixed(0, 0, width, rows, self.window_top as usize, generation);
        panel.draw(&mut self.surface, &placement)?;
        Ok(self.window_top - old)
    }

    fn draw_vertical_separator(&mut self) -> anyhow::Result<()> {
        let col = self.split.separator_col;
        if col >= self.term_size.0 {
            return Ok(());
        }
        for y in 0..self.rows() {
            self.surface.write_at(col, y, "│", CellStyle::DIM)?;
        }
        Ok(())
    }

    /// Clamp the displacement to the stack's overflow and place the stack.
    fn plan_stack(&mut self, entries: &[(PanelId, usize)]) -> StackPlan {
        let height = StackPlan::compute(entries, 0).height();
        self.stack_height = height;
        self.displacement = self.displacement.clamp(0, overflow(height, self.rows()));
        StackPlan::compute(entries, self.stack_bottom())
    }

    /// Write separator and blank rows of the secondary column.
    fn write_chrome(&mut self, rows: &[(u16, RowOwner)]) -> anyhow::Result<()> {
        let width = self.split.secondary_width;
        if width == 0 {
            return Ok(());
        }
        let left = self.split.secondary_left;
        let separator = "─".repeat(width as usize);
        let empty = blank(width);
        for &(y, owner) in rows {
            match owner {
                RowOwner::Separator => self.surface.write_at(left, y, &separator, CellStyle::DIM)?,
                RowOwner::Blank => self.surface.write_at(left, y, &empty, CellStyle::empty())?,
                RowOwner::Panel(_) => {}
            }
        }
        Ok(())
    }

    // ---- stack relayout --------------------------------------------------

    fn stack_relayout(&mut self) -> Result<Step, LayoutError> {
        if self.resize_raced() {
            return Ok(Step::Full);
        }
        let stack_min = self.stack_min_width();
        if stack_min != self.stack_width {
            RenderPathMetrics::incr(&self.metrics.width_escalations);
            debug!(
                target: "render.layout",
                from = self.stack_width,
                to = stack_min,
                "stack_width_changed"
            );
            return Ok(Step::Full);
        }
        self.generation += 1;
        let rows = self.rows();
        let entries = self.stack_entries();
        let plan = self.plan_stack(&entries);
        let mut redrawn = 0usize;
        for slot in &plan.slots {
            let placement = self.stack_placement(slot.anchor, slot.full_height);
            let target = Geometry::from_placement(&placement, slot.full_height);
            let Some(panel) = self.store.get_mut(slot.id) else {
                continue;
            };
            if panel.last_geometry().is_some_and(|g| same_slot(g, &target)) {
                continue;
            }
            panel.draw(&mut self.surface, &placement)?;
            redrawn += 1;
        }
        let map = ColumnMap::from_plan(&plan, self.window_top, rows);
        let changes = map.chrome_changes(&self.column, 0);
        self.write_chrome(&changes)?;
        self.column = map;
        RenderPathMetrics::incr(&self.metrics.stack_relayouts);
        debug!(
            target: "render.layout",
            redrawn,
            chrome = changes.len(),
            displacement = self.displacement,
            "stack_relayout"
        );
        Ok(Step::Done)
    }

    // ---- scrolling -------------------------------------------------------

    fn scroll_primary_now(&mut self, lines: i64) -> Result<Step, LayoutError> {
        if self.resize_raced() {
            return Ok(Step::Full);
        }
        let Some(panel) = self.primary.and_then(|id| self.store.get_mut(id)) else {
            return Ok(Step::Done);
        };
        let moved = panel.scroll(&mut self.surface, lines)?;
        RenderPathMetrics::incr(&self.metrics.primary_scrolls);
        if moved == 0 {
            RenderPathMetrics::incr(&self.metrics.clamped_scrolls);
        }
        self.window_top += moved;
        self.carry_stack(moved)?;
        debug!(
            target: "render.scroll",
            requested = lines,
            actual = moved,
            window_top = self.window_top,
            "primary_scrolled"
        );
        Ok(Step::Done)
    }

    /// Follow a window move of `lines` canvas rows. The stack reference moves
    /// by the same distance, so stack panels keep their screen rows.
    fn carry_stack(&mut self, lines: i64) -> anyhow::Result<()> {
        let rows = self.rows();
        for id in &self.stack {
            let Some(panel) = self.store.get_mut(*id) else {
                continue;
            };
            let Some(anchor) = panel.last_geometry().map(|g| g.anchor) else {
                continue;
            };
            panel.move_by(&mut self.surface, lines, anchor + lines, rows)?;
        }
        Ok(())
    }

    fn scroll_stack_now(&mut self, lines: i64) -> Result<Step, LayoutError> {
        if self.resize_raced() {
            return Ok(Step::Full);
        }
        let rows = self.rows();
        let target = (self.displacement - lines).clamp(0, overflow(self.stack_height, rows));
        // Positive: the stack moves down on screen.
        let shift = target - self.displacement;
        RenderPathMetrics::incr(&self.metrics.stack_scrolls);
        if shift == 0 {
            RenderPathMetrics::incr(&self.metrics.clamped_scrolls);
            trace!(target: "render.scroll", lines, displacement = self.displacement, "stack_scroll_clamped");
            return Ok(Step::Done);
        }
        let left = self.split.secondary_left;
        let width = self.split.secondary_width;
        if width > 0
            && let Some(block) = plan_shift(-shift, rows)
        {
            self.surface.move_block(
                Rect::new(left, block.src_offset, width, block.rows),
                left,
                block.dst_offset,
            )?;
            RenderPathMetrics::incr(&self.metrics.column_moves);
        }
        self.displacement = target;
        for id in &self.stack {
            let Some(panel) = self.store.get_mut(*id) else {
                continue;
            };
            let Some(anchor) = panel.last_geometry().map(|g| g.anchor) else {
                continue;
            };
            panel.move_by(&mut self.surface, 0, anchor + shift, rows)?;
        }
        let plan = StackPlan::compute(&self.laid_out_entries(), self.stack_bottom());
        let map = ColumnMap::from_plan(&plan, self.window_top, rows);
        let changes = map.chrome_changes(&self.column, shift);
        self.write_chrome(&changes)?;
        self.column = map;
        debug!(
            target: "render.scroll",
            requested = lines,
            shift,
            displacement = self.displacement,
            "stack_scrolled"
        );
        Ok(Step::Done)
    }

    // ---- panel repaint ---------------------------------------------------

    fn repaint_panels(&mut self, ids: &[PanelId]) -> Result<Step, LayoutError> {
        if ids.is_empty() {
            return Ok(Step::Done);
        }
        if self.resize_raced() {
            return Ok(Step::Full);
        }
        let rows = self.rows();
        let mut step = Step::Done;
        for &id in ids {
            let is_primary = self.primary == Some(id);
            if !is_primary && !self.stack.contains(&id) {
                continue;
            }
            let Some(panel) = self.store.get_mut(id) else {
                continue;
            };
            let outcome = panel.rerender(&mut self.surface)?;
            RenderPathMetrics::incr(&self.metrics.panel_repaints);
            match outcome {
                Rerender::Ok => {}
                Rerender::WidthMismatch => {
                    RenderPathMetrics::incr(&self.metrics.width_escalations);
                    debug!(target: "render.layout", %id, "width_mismatch");
                    return Ok(Step::Full);
                }
                Rerender::HeightMismatch if is_primary => {
                    if panel.min_height() > rows {
                        return Ok(Step::Full);
                    }
                    // The primary column's height does not depend on its
                    // content: redraw in place, carrying the stack if the
                    // window had to move.
                    let carried = self.draw_primary()?;
                    if carried != 0 {
                        self.carry_stack(carried)?;
                    }
                }
                Rerender::HeightMismatch => {
                    RenderPathMetrics::incr(&self.metrics.height_escalations);
                    trace!(target: "render.layout", %id, "height_mismatch");
                    step = Step::Stack;
                }
            }
        }
        Ok(step)
    }
}

fn same_slot(a: &Geometry, b: &Geometry) -> bool {
    (a.top, a.left, a.width, a.height, a.anchor, a.virtual_top, a.full_height)
        == (b.top, b.left, b.width, b.height, b.anchor, b.virtual_top, b.full_height)
}

impl<S: TerminalSurface> std::fmt::Debug for Compositor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("term_size", &self.term_size)
            .field("primary", &self.primary)
            .field("stack", &self.stack)
            .field("split", &self.split)
            .field("window_top", &self.window_top)
            .field("displacement", &self.displacement)
            .field("generation", &self.generation)
            .field("blocked", &self.blocked)
            .finish()
    }
}

//! Owner of every panel of the active screen.
//!
//! Panels are created once per screen and addressed by [`PanelId`] from then
//! on; the layout only holds ids. Ids are never reused within a process.

use ahash::AHashMap;
use core_events::PanelId;
use core_panel::Panel;

#[derive(Debug, Default)]
pub struct PanelStore {
    panels: AHashMap<PanelId, Panel>,
    next_id: u32,
}

impl PanelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, panel: Panel) -> PanelId {
        self.next_id += 1;
        let id = PanelId(self.next_id);
        tracing::debug!(target: "panel", %id, name = panel.name(), kind = panel.kind().as_str(), "panel_created");
        self.panels.insert(id, panel);
        id
    }

    pub fn remove(&mut self, id: PanelId) -> Option<Panel> {
        let removed = self.panels.remove(&id);
        if removed.is_some() {
            tracing::debug!(target: "panel", %id, "panel_destroyed");
        }
        removed
    }

    pub fn get(&self, id: PanelId) -> Option<&Panel> {
        self.panels.get(&id)
    }

    pub fn get_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.panels.get_mut(&id)
    }

    pub fn contains(&self, id: PanelId) -> bool {
        self.panels.contains_key(&id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<PanelId> {
        self.panels
            .iter()
            .find(|(_, p)| p.name() == name)
            .map(|(id, _)| *id)
    }

    /// Ids in ascending (creation) order.
    pub fn ids(&self) -> Vec<PanelId> {
        let mut ids: Vec<PanelId> = self.panels.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PanelId, &mut Panel)> {
        self.panels.iter_mut().map(|(id, p)| (*id, p))
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

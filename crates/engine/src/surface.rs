//! The rendering-surface seam and an in-memory headless implementation.
//!
//! The engine owns *what* is shown (panels, table rows, connector paths)
//! and the surface owns *where* and *how*. All geometry flows one way: the
//! engine asks for rectangles at update time and never caches them, so a
//! host with draggable or collapsible panels only has to answer rect
//! queries truthfully.

use rustc_hash::FxHashMap;

use statescope_core::{EdgePath, Rect};

use crate::connector::{Color, EdgeId};
use crate::panel::{AnchorId, PanelId, PanelKind};

/// Host rendering surface.
///
/// Anchors returned from `add_row`/`panel_anchor` stay valid identifiers for
/// the life of the session; after the owning panel is removed their rect
/// queries return `None`, which is how the connector learns to prune.
pub trait Surface {
    fn create_panel(&mut self, kind: PanelKind, title: &str) -> PanelId;

    /// Remove a panel and all its anchors from the visual tree.
    fn remove_panel(&mut self, panel: PanelId);

    fn panel_exists(&self, panel: PanelId) -> bool;

    /// The panel's own anchor (its header), used as an edge target.
    fn panel_anchor(&self, panel: PanelId) -> AnchorId;

    /// Append a labeled row to a panel; returns the row's cell anchor.
    fn add_row(&mut self, panel: PanelId, key: &str) -> AnchorId;

    fn set_cell_text(&mut self, cell: AnchorId, text: &str);

    /// Visually flag a cell whose value just changed.
    fn flash_cell(&mut self, cell: AnchorId);

    /// Current rectangle of an anchor, or `None` if it left the visual tree.
    fn anchor_rect(&self, anchor: AnchorId) -> Option<Rect>;

    /// Current clipping rectangle of the panel owning an anchor.
    fn container_rect(&self, anchor: AnchorId) -> Option<Rect>;

    fn draw_edge(&mut self, edge: EdgeId, path: &EdgePath, color: Color);

    fn erase_edge(&mut self, edge: EdgeId);
}

const PANEL_WIDTH: f32 = 220.0;
const PANEL_HEIGHT: f32 = 260.0;
const PANEL_GAP: f32 = 40.0;
const HEADER_HEIGHT: f32 = 24.0;
const ROW_HEIGHT: f32 = 22.0;

/// An in-memory surface with a fixed left-to-right layout.
///
/// Serves headless hosts (logging, snapshot tooling) and the test suite.
/// Every mutation is recorded and queryable.
#[derive(Default)]
pub struct HeadlessSurface {
    next_panel: u64,
    next_anchor: u64,
    /// Live panels only; removal deletes the entry.
    panels: FxHashMap<PanelId, PanelState>,
    /// Header anchors survive panel removal so stale edges resolve to
    /// "no rect" instead of a missing key.
    headers: FxHashMap<PanelId, AnchorId>,
    /// Anchor → owning panel. Entries are dropped with their panel.
    anchor_owner: FxHashMap<AnchorId, PanelId>,
    cell_text: FxHashMap<AnchorId, String>,
    flashes: Vec<AnchorId>,
    edges: FxHashMap<EdgeId, (EdgePath, Color)>,
    /// Total panels ever created; drives the fixed layout slot.
    slots_used: u64,
}

struct PanelState {
    kind: PanelKind,
    title: String,
    rect: Rect,
    rows: Vec<AnchorId>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_anchor(&mut self, owner: PanelId) -> AnchorId {
        self.next_anchor += 1;
        let anchor = AnchorId(self.next_anchor);
        self.anchor_owner.insert(anchor, owner);
        anchor
    }

    // ---- introspection (hosts and tests) ----

    pub fn panel_count(&self) -> usize {
        self.panels.len()
    }

    pub fn panel_title(&self, panel: PanelId) -> Option<&str> {
        self.panels.get(&panel).map(|p| p.title.as_str())
    }

    pub fn panel_kind(&self, panel: PanelId) -> Option<PanelKind> {
        self.panels.get(&panel).map(|p| p.kind)
    }

    pub fn cell_text(&self, cell: AnchorId) -> Option<&str> {
        self.cell_text.get(&cell).map(String::as_str)
    }

    /// Flashes recorded since the last `take_flashes`.
    pub fn take_flashes(&mut self) -> Vec<AnchorId> {
        std::mem::take(&mut self.flashes)
    }

    pub fn drawn_edge(&self, edge: EdgeId) -> Option<&(EdgePath, Color)> {
        self.edges.get(&edge)
    }

    pub fn drawn_edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl Surface for HeadlessSurface {
    fn create_panel(&mut self, kind: PanelKind, title: &str) -> PanelId {
        self.next_panel += 1;
        let id = PanelId(self.next_panel);
        let slot = self.slots_used as f32;
        self.slots_used += 1;
        let rect = Rect::new(slot * (PANEL_WIDTH + PANEL_GAP), 0.0, PANEL_WIDTH, PANEL_HEIGHT);
        self.panels.insert(
            id,
            PanelState { kind, title: title.to_string(), rect, rows: Vec::new() },
        );
        let header = self.alloc_anchor(id);
        self.headers.insert(id, header);
        id
    }

    fn remove_panel(&mut self, panel: PanelId) {
        if let Some(state) = self.panels.remove(&panel) {
            for row in &state.rows {
                self.anchor_owner.remove(row);
                self.cell_text.remove(row);
            }
            if let Some(header) = self.headers.get(&panel) {
                self.anchor_owner.remove(header);
            }
        }
    }

    fn panel_exists(&self, panel: PanelId) -> bool {
        self.panels.contains_key(&panel)
    }

    fn panel_anchor(&self, panel: PanelId) -> AnchorId {
        // Headers are allocated with the panel and never reused.
        self.headers.get(&panel).copied().unwrap_or(AnchorId(0))
    }

    fn add_row(&mut self, panel: PanelId, _key: &str) -> AnchorId {
        let anchor = self.alloc_anchor(panel);
        if let Some(state) = self.panels.get_mut(&panel) {
            state.rows.push(anchor);
        }
        anchor
    }

    fn set_cell_text(&mut self, cell: AnchorId, text: &str) {
        self.cell_text.insert(cell, text.to_string());
    }

    fn flash_cell(&mut self, cell: AnchorId) {
        self.flashes.push(cell);
    }

    fn anchor_rect(&self, anchor: AnchorId) -> Option<Rect> {
        let owner = *self.anchor_owner.get(&anchor)?;
        let state = self.panels.get(&owner)?;
        if self.headers.get(&owner) == Some(&anchor) {
            let r = state.rect;
            return Some(Rect::new(r.x, r.y, r.width, HEADER_HEIGHT));
        }
        let row = state.rows.iter().position(|a| *a == anchor)?;
        let r = state.rect;
        Some(Rect::new(
            r.x + 8.0,
            r.y + HEADER_HEIGHT + 4.0 + row as f32 * ROW_HEIGHT,
            r.width - 16.0,
            ROW_HEIGHT - 4.0,
        ))
    }

    fn container_rect(&self, anchor: AnchorId) -> Option<Rect> {
        let owner = *self.anchor_owner.get(&anchor)?;
        self.panels.get(&owner).map(|p| p.rect)
    }

    fn draw_edge(&mut self, edge: EdgeId, path: &EdgePath, color: Color) {
        self.edges.insert(edge, (path.clone(), color));
    }

    fn erase_edge(&mut self, edge: EdgeId) {
        self.edges.remove(&edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ResourceKind;

    #[test]
    fn test_removed_panel_anchors_lose_rects() {
        let mut surface = HeadlessSurface::new();
        let panel = surface.create_panel(PanelKind::Resource(ResourceKind::Buffer), "b");
        let row = surface.add_row(panel, "SIZE");
        let header = surface.panel_anchor(panel);

        assert!(surface.anchor_rect(row).is_some());
        assert!(surface.anchor_rect(header).is_some());

        surface.remove_panel(panel);
        assert!(surface.anchor_rect(row).is_none());
        assert!(surface.anchor_rect(header).is_none());
        assert!(surface.container_rect(row).is_none());
        assert!(!surface.panel_exists(panel));
    }

    #[test]
    fn test_rows_stack_downward() {
        let mut surface = HeadlessSurface::new();
        let panel = surface.create_panel(PanelKind::GlobalState, "state");
        let a = surface.add_row(panel, "A");
        let b = surface.add_row(panel, "B");
        let ra = surface.anchor_rect(a).unwrap();
        let rb = surface.anchor_rect(b).unwrap();
        assert!(rb.y > ra.y);
        assert_eq!(ra.x, rb.x);
    }

    #[test]
    fn test_panels_do_not_overlap() {
        let mut surface = HeadlessSurface::new();
        let p1 = surface.create_panel(PanelKind::GlobalState, "one");
        let p2 = surface.create_panel(PanelKind::GlobalState, "two");
        let r1 = surface.container_rect(surface.panel_anchor(p1)).unwrap();
        let r2 = surface.container_rect(surface.panel_anchor(p2)).unwrap();
        assert!(r1.right() < r2.left());
    }
}

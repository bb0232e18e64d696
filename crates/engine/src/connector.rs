//! Directed connectors between visual anchors.
//!
//! Maintains the set of live edges and keeps their geometry synchronized
//! with the host layout. An edge retains only its two anchors and routing
//! options; rectangles are re-queried from the surface on every `update`,
//! so panels can move, collapse, or expand freely between calls.
//!
//! # Invariants
//!
//! 1. **No dangling edges:** `update` prunes every edge whose source or
//!    target anchor no longer reports a rectangle.
//! 2. **Registry purity:** `update` reads only the surface and its own
//!    edge set. Callable arbitrarily often; two calls with no layout change
//!    produce identical paths.
//! 3. **Deterministic iteration:** edges are processed in creation order,
//!    so prune reports and redraws are stable across runs.
//! 4. **Stable colors:** the color of an edge depends only on its target
//!    handle and level, never on creation order.

use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use statescope_core::{route_edge, EdgePath, RouteOptions};

use crate::api::Handle;
use crate::panel::AnchorId;
use crate::surface::Surface;

/// Identity of one edge. Never reused within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

/// An RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `"#rrggbb"` (leading `#` optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        Some(Self::rgb((v >> 16) as u8, (v >> 8) as u8, v as u8))
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Default edge palette. Hosts may override via settings.
pub const DEFAULT_PALETTE: [Color; 8] = [
    Color::rgb(0xe6, 0x7e, 0x22),
    Color::rgb(0x3a, 0x86, 0xc8),
    Color::rgb(0x2f, 0xa8, 0x5e),
    Color::rgb(0xc0, 0x5b, 0xd6),
    Color::rgb(0xd9, 0x48, 0x4a),
    Color::rgb(0x2a, 0xb5, 0xb0),
    Color::rgb(0xc9, 0xa2, 0x27),
    Color::rgb(0x7d, 0x6e, 0xd4),
];

/// One directed connector between two anchors.
///
/// Destroyed and recreated when the referenced resource changes; never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: AnchorId,
    pub target: AnchorId,
    /// The resource the edge points at. Used for stable coloring and for
    /// prune diagnostics; routing never consults it.
    pub target_handle: Handle,
    pub color: Color,
    pub options: RouteOptions,
    /// Geometry from the most recent `update`. Empty until then.
    path: EdgePath,
}

impl Edge {
    pub fn path(&self) -> &EdgePath {
        &self.path
    }
}

/// Owner of all edges in a session.
#[derive(Default)]
pub struct ConnectorManager {
    edges: FxHashMap<EdgeId, Edge>,
    /// Creation order (invariant 3). Pruned lazily alongside `edges`.
    order: Vec<EdgeId>,
    next_id: u64,
    palette: Vec<Color>,
}

impl ConnectorManager {
    pub fn new(palette: Vec<Color>) -> Self {
        let palette = if palette.is_empty() { DEFAULT_PALETTE.to_vec() } else { palette };
        Self { edges: FxHashMap::default(), order: Vec::new(), next_id: 0, palette }
    }

    /// Deterministic color for edges targeting `handle`, perturbed by
    /// `level` so parallel edges to one target stay distinguishable.
    pub fn color_for(&self, handle: Handle, level: usize) -> Color {
        let mut hasher = FxHasher::default();
        handle.raw().hash(&mut hasher);
        let index = (hasher.finish() as usize).wrapping_add(level) % self.palette.len();
        self.palette[index]
    }

    /// Track a new edge. Geometry is computed at the next `update`.
    pub fn add(
        &mut self,
        source: AnchorId,
        target: AnchorId,
        target_handle: Handle,
        color: Color,
        options: RouteOptions,
    ) -> EdgeId {
        self.next_id += 1;
        let id = EdgeId(self.next_id);
        self.edges.insert(
            id,
            Edge { source, target, target_handle, color, options, path: EdgePath::default() },
        );
        self.order.push(id);
        id
    }

    /// Detach an edge's visuals and forget it. Idempotent.
    pub fn remove(&mut self, id: EdgeId, surface: &mut dyn Surface) {
        if self.edges.remove(&id).is_some() {
            surface.erase_edge(id);
            self.order.retain(|e| *e != id);
        }
    }

    /// Recompute every tracked edge's path and prune edges whose endpoints
    /// have left the visual tree. Returns the pruned ids in creation order.
    ///
    /// Reads only the surface (invariant 2); call on every layout change.
    pub fn update(&mut self, surface: &mut dyn Surface) -> Vec<EdgeId> {
        let mut pruned = Vec::new();
        for id in self.order.clone() {
            let edge = match self.edges.get_mut(&id) {
                Some(e) => e,
                None => continue,
            };
            let rects = (
                surface.anchor_rect(edge.source),
                surface.container_rect(edge.source),
                surface.anchor_rect(edge.target),
                surface.container_rect(edge.target),
            );
            match rects {
                (Some(sa), Some(sc), Some(ta), Some(tc)) => {
                    edge.path = route_edge(sa, sc, ta, tc, &edge.options);
                    let (path, color) = (edge.path.clone(), edge.color);
                    surface.draw_edge(id, &path, color);
                }
                _ => {
                    log::debug!("pruning edge {:?} to {} (anchor gone)", id, edge.target_handle);
                    self.edges.remove(&id);
                    surface.erase_edge(id);
                    pruned.push(id);
                }
            }
        }
        self.order.retain(|e| self.edges.contains_key(e));
        pruned
    }

    /// Drop every edge and its visuals.
    pub fn clear(&mut self, surface: &mut dyn Surface) {
        for id in self.order.drain(..) {
            if self.edges.remove(&id).is_some() {
                surface.erase_edge(id);
            }
        }
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.order.iter().filter_map(|id| self.edges.get(id).map(|e| (*id, e)))
    }
}

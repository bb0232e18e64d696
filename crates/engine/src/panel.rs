//! The panel contract: what the engine asks of per-resource visuals.
//!
//! The engine never inspects panel internals. It constructs panels through a
//! [`PanelBuilder`] supplied by the host and pokes them through the closed
//! [`RefreshOp`] capability set, dispatched over [`ResourceKind`] tags.

use serde::{Deserialize, Serialize};

use crate::api::{Device, Handle, ResourceKind};
use crate::surface::Surface;

/// Identity of one panel on the host surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelId(pub u64);

/// Identity of one connector endpoint: a table cell, a panel header, any
/// visual element the host is willing to report a rectangle for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub u64);

/// What a panel represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PanelKind {
    /// One resource of the given kind.
    Resource(ResourceKind),
    /// A global state table group.
    GlobalState,
}

/// Named refresh capability of a resource panel.
///
/// Not every op applies to every kind; [`RefreshOp::applies_to`] is the
/// authoritative table. The engine only issues applicable ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOp {
    /// Re-read uploaded contents (buffer data, texture mips).
    Contents,
    /// Re-read parameter state (texture filters, shader compile status).
    Parameters,
    /// Re-scan vertex attributes (programs).
    Attributes,
    /// Re-scan uniforms (programs).
    Uniforms,
    /// Re-read attached source text (shaders).
    Source,
}

impl RefreshOp {
    /// Whether this capability exists for the given resource kind.
    pub fn applies_to(self, kind: ResourceKind) -> bool {
        use ResourceKind::*;
        match self {
            RefreshOp::Contents => matches!(kind, Buffer | Texture | Renderbuffer),
            RefreshOp::Parameters => !matches!(kind, VertexArray),
            RefreshOp::Attributes | RefreshOp::Uniforms => matches!(kind, Program),
            RefreshOp::Source => matches!(kind, Shader),
        }
    }
}

/// A live per-resource visual, owned by the engine for the resource's
/// lifetime. `refresh` may read the device directly; the engine guarantees
/// interception is not re-triggered by those read-backs.
pub trait ResourcePanel {
    /// The panel element this visual lives in.
    fn panel(&self) -> PanelId;

    /// Apply one named refresh. Ops that don't apply to the panel's kind are
    /// never issued; implementations may ignore any op they don't render.
    fn refresh(&mut self, op: RefreshOp, device: &mut dyn Device, handle: Handle);
}

/// Host-supplied factory for per-resource-kind panels.
pub trait PanelBuilder {
    fn construct(
        &mut self,
        surface: &mut dyn Surface,
        kind: ResourceKind,
        display_name: &str,
        handle: Handle,
    ) -> Box<dyn ResourcePanel>;
}

/// A panel with no kind-specific chrome: a titled container and nothing else.
///
/// The default builder for headless hosts and tests.
pub struct NullPanelBuilder;

struct NullPanel {
    panel: PanelId,
}

impl ResourcePanel for NullPanel {
    fn panel(&self) -> PanelId {
        self.panel
    }

    fn refresh(&mut self, _op: RefreshOp, _device: &mut dyn Device, _handle: Handle) {}
}

impl PanelBuilder for NullPanelBuilder {
    fn construct(
        &mut self,
        surface: &mut dyn Surface,
        kind: ResourceKind,
        display_name: &str,
        _handle: Handle,
    ) -> Box<dyn ResourcePanel> {
        let panel = surface.create_panel(PanelKind::Resource(kind), display_name);
        Box::new(NullPanel { panel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_op_capability_table() {
        assert!(RefreshOp::Contents.applies_to(ResourceKind::Buffer));
        assert!(RefreshOp::Source.applies_to(ResourceKind::Shader));
        assert!(RefreshOp::Uniforms.applies_to(ResourceKind::Program));
        assert!(!RefreshOp::Uniforms.applies_to(ResourceKind::Buffer));
        assert!(!RefreshOp::Source.applies_to(ResourceKind::Program));
        assert!(!RefreshOp::Contents.applies_to(ResourceKind::Program));
    }
}

//! Resource registry: handle identity → descriptor.
//!
//! Exactly one descriptor exists per live handle. Deleted handles keep
//! their descriptor (flagged `deleted`) so stale references render as
//! "(deleted)" instead of crashing. Binding points whose unbound state is a
//! distinguished default object (the window framebuffer, texture unit
//! defaults) register a per-kind default descriptor; the null sentinel then
//! formats and routes like any explicit object.

use rustc_hash::FxHashMap;

use crate::api::{ApiValue, Handle, ResourceKind};
use crate::error::EngineError;
use crate::panel::PanelId;

/// The registry's metadata record for one handle.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub display_name: String,
    pub kind: ResourceKind,
    /// The visual proxy. Stays set after deletion; the panel itself is
    /// removed by the deletion handler, not by the registry.
    pub panel: PanelId,
    pub deleted: bool,
    /// Kind-specific fields mirrored from intercepted calls
    /// (sizes, compile status, dimensions).
    pub params: FxHashMap<String, ApiValue>,
}

impl Descriptor {
    pub fn new(display_name: impl Into<String>, kind: ResourceKind, panel: PanelId) -> Self {
        Self {
            display_name: display_name.into(),
            kind,
            panel,
            deleted: false,
            params: FxHashMap::default(),
        }
    }
}

/// Identity → descriptor map with default-object sentinels.
#[derive(Default)]
pub struct Registry {
    descriptors: FxHashMap<Handle, Descriptor>,
    /// Insertion order, for deterministic teardown and iteration.
    order: Vec<Handle>,
    /// Default objects per kind, keyed off the null sentinel.
    defaults: FxHashMap<ResourceKind, Descriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new live descriptor.
    ///
    /// Handles are unique per session; a second `register` for the same
    /// handle is a contract violation even if the first was deleted.
    pub fn register(&mut self, handle: Handle, descriptor: Descriptor) -> Result<(), EngineError> {
        if self.descriptors.contains_key(&handle) {
            return Err(EngineError::RegistryClash { handle, name: descriptor.display_name });
        }
        self.descriptors.insert(handle, descriptor);
        self.order.push(handle);
        Ok(())
    }

    pub fn lookup(&self, handle: Handle) -> Option<&Descriptor> {
        self.descriptors.get(&handle)
    }

    pub fn lookup_mut(&mut self, handle: Handle) -> Option<&mut Descriptor> {
        self.descriptors.get_mut(&handle)
    }

    /// Install the default-object descriptor for a kind.
    pub fn set_default_info(&mut self, kind: ResourceKind, descriptor: Descriptor) {
        self.defaults.insert(kind, descriptor);
    }

    pub fn default_info(&self, kind: ResourceKind) -> Option<&Descriptor> {
        self.defaults.get(&kind)
    }

    /// Descriptor for a handle, resolving the null sentinel to the kind's
    /// default object. "Currently nothing bound" is a real, renderable
    /// object wherever a default is configured.
    pub fn info_or_default(&self, handle: Handle, kind: ResourceKind) -> Option<&Descriptor> {
        if handle.is_null() {
            self.defaults.get(&kind)
        } else {
            self.descriptors.get(&handle)
        }
    }

    /// Flag a handle deleted. Visual teardown is the caller's job.
    ///
    /// Returns false (and logs) for unknown handles.
    pub fn mark_deleted(&mut self, handle: Handle) -> bool {
        match self.descriptors.get_mut(&handle) {
            Some(d) => {
                d.deleted = true;
                true
            }
            None => {
                log::warn!("mark_deleted: no descriptor for {handle}");
                false
            }
        }
    }

    /// Render a handle as display text. Never panics.
    ///
    /// Live → display name; deleted → "(deleted)"; unknown → "(unknown)";
    /// null → the kind's default-object name, or "(none)" without one.
    pub fn format_reference(&self, handle: Handle, kind: ResourceKind) -> String {
        if handle.is_null() {
            return match self.defaults.get(&kind) {
                Some(d) => d.display_name.clone(),
                None => "(none)".to_string(),
            };
        }
        match self.descriptors.get(&handle) {
            Some(d) if d.deleted => "(deleted)".to_string(),
            Some(d) => d.display_name.clone(),
            None => {
                log::debug!("format_reference: no descriptor for {handle}");
                "(unknown)".to_string()
            }
        }
    }

    /// Live (non-deleted) handles in registration order.
    pub fn live_handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|h| self.descriptors.get(h).is_some_and(|d| !d.deleted))
    }

    pub fn live_count(&self) -> usize {
        self.live_handles().count()
    }

    /// Drop every descriptor, keeping default-object configuration.
    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> Descriptor {
        Descriptor::new(name, ResourceKind::Buffer, PanelId(1))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        let h = Handle::from_raw(1);
        registry.register(h, descriptor("a")).unwrap();
        assert_eq!(registry.lookup(h).unwrap().display_name, "a");
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_double_register_is_a_clash() {
        let mut registry = Registry::new();
        let h = Handle::from_raw(1);
        registry.register(h, descriptor("a")).unwrap();
        let err = registry.register(h, descriptor("b")).unwrap_err();
        assert!(matches!(err, EngineError::RegistryClash { .. }));

        // Deleted handles still clash: identity is never reused.
        registry.mark_deleted(h);
        assert!(registry.register(h, descriptor("c")).is_err());
    }

    #[test]
    fn test_deleted_keeps_descriptor() {
        let mut registry = Registry::new();
        let h = Handle::from_raw(1);
        registry.register(h, descriptor("a")).unwrap();
        assert!(registry.mark_deleted(h));
        let d = registry.lookup(h).unwrap();
        assert!(d.deleted);
        assert_eq!(d.display_name, "a");
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_format_reference_never_throws() {
        let mut registry = Registry::new();
        let h = Handle::from_raw(1);
        registry.register(h, descriptor("a")).unwrap();

        assert_eq!(registry.format_reference(h, ResourceKind::Buffer), "a");
        assert_eq!(
            registry.format_reference(Handle::from_raw(99), ResourceKind::Buffer),
            "(unknown)"
        );
        assert_eq!(registry.format_reference(Handle::NULL, ResourceKind::Buffer), "(none)");

        registry.mark_deleted(h);
        assert_eq!(registry.format_reference(h, ResourceKind::Buffer), "(deleted)");
    }

    #[test]
    fn test_default_object_sentinel() {
        let mut registry = Registry::new();
        registry.set_default_info(
            ResourceKind::Framebuffer,
            Descriptor::new("canvas", ResourceKind::Framebuffer, PanelId(7)),
        );

        assert_eq!(
            registry.format_reference(Handle::NULL, ResourceKind::Framebuffer),
            "canvas"
        );
        let d = registry.info_or_default(Handle::NULL, ResourceKind::Framebuffer).unwrap();
        assert_eq!(d.panel, PanelId(7));
        // Other kinds are unaffected.
        assert!(registry.info_or_default(Handle::NULL, ResourceKind::Buffer).is_none());
    }

    #[test]
    fn test_live_handles_in_registration_order() {
        let mut registry = Registry::new();
        for raw in [3u64, 1, 2] {
            registry.register(Handle::from_raw(raw), descriptor(&format!("r{raw}"))).unwrap();
        }
        registry.mark_deleted(Handle::from_raw(1));
        let live: Vec<u64> = registry.live_handles().map(Handle::raw).collect();
        assert_eq!(live, vec![3, 2]);
    }
}

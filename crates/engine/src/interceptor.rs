//! Call interception as an explicit middleware map.
//!
//! Entry points are never rebound or monkey-patched: the interceptor holds
//! an ordered `entry → hooks` map, and the session walks that chain after
//! each real call. Hooks are declarative data, so the chain can be
//! inspected, tested, and replayed without capturing any engine state.
//!
//! The single session-wide enable flag guards the whole mechanism: while
//! clear, calls pass through to the device untouched (no hooks, no error
//! re-check). The engine clears it around its own read-backs so sampling
//! state to render a panel can't re-trigger side effects.

use rustc_hash::FxHashMap;

use crate::api::{Device, ResourceKind};
use crate::error::EngineError;
use crate::panel::RefreshOp;

/// Where a hook finds the handle it should act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleSource {
    /// The argument at this index.
    Arg(usize),
    /// The current value of a named binding parameter.
    Binding(String),
    /// The argument at this index is a bind-target enum `T`; the handle is
    /// the current value of the `T_BINDING` parameter.
    BindingOfTarget(usize),
}

/// One intercepted-call reaction.
///
/// Hooks for one entry point run synchronously, in registration order,
/// before control returns to the statement that made the call.
#[derive(Debug, Clone, PartialEq)]
pub enum Hook {
    /// The call created a resource: register it and build its panel.
    Create(ResourceKind),
    /// The call deleted the resource named by its first argument.
    Delete(ResourceKind),
    /// Re-diff the state table at this index.
    RefreshTable(usize),
    /// Invoke a named refresh capability on the affected resource's panel.
    RefreshPanel { kind: ResourceKind, op: RefreshOp, source: HandleSource },
}

/// Ordered `entry → hooks` map plus the interception-enabled flag.
pub struct Interceptor {
    chains: FxHashMap<String, Vec<Hook>>,
    enabled: bool,
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor {
    pub fn new() -> Self {
        Self { chains: FxHashMap::default(), enabled: true }
    }

    /// Append a hook to an entry point's chain.
    ///
    /// Fails with `UnknownEntryPoint` if the device does not expose the
    /// entry, so wiring mistakes surface at setup time, not mid-script.
    pub fn wrap(
        &mut self,
        device: &dyn Device,
        entry: &str,
        hook: Hook,
    ) -> Result<(), EngineError> {
        if !device.has_entry_point(entry) {
            return Err(EngineError::UnknownEntryPoint(entry.to_string()));
        }
        self.chains.entry(entry.to_string()).or_default().push(hook);
        Ok(())
    }

    /// The hook chain for an entry point, in registration order.
    pub fn hooks_for(&self, entry: &str) -> &[Hook] {
        self.chains.get(entry).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether wrapped dispatch is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flip the session-wide interception flag; returns the previous value
    /// so callers can restore it.
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.enabled, enabled)
    }

    pub fn wrapped_entry_count(&self) -> usize {
        self.chains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiCall, ApiValue, DeviceFault};

    struct TwoEntryDevice;

    impl Device for TwoEntryDevice {
        fn invoke(&mut self, call: &ApiCall) -> Result<ApiValue, DeviceFault> {
            Ok(ApiValue::Str(call.entry.clone()))
        }
        fn has_entry_point(&self, entry: &str) -> bool {
            matches!(entry, "create_buffer" | "bind_buffer")
        }
        fn take_error(&mut self) -> Option<String> {
            None
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn test_wrap_validates_entry_point() {
        let device = TwoEntryDevice;
        let mut interceptor = Interceptor::new();
        assert!(interceptor
            .wrap(&device, "create_buffer", Hook::Create(ResourceKind::Buffer))
            .is_ok());
        let err = interceptor
            .wrap(&device, "create_widget", Hook::Create(ResourceKind::Buffer))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntryPoint(name) if name == "create_widget"));
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let device = TwoEntryDevice;
        let mut interceptor = Interceptor::new();
        interceptor.wrap(&device, "bind_buffer", Hook::RefreshTable(1)).unwrap();
        interceptor.wrap(&device, "bind_buffer", Hook::RefreshTable(0)).unwrap();
        assert_eq!(
            interceptor.hooks_for("bind_buffer"),
            &[Hook::RefreshTable(1), Hook::RefreshTable(0)]
        );
        assert!(interceptor.hooks_for("create_buffer").is_empty());
    }

    #[test]
    fn test_enable_flag_round_trip() {
        let mut interceptor = Interceptor::new();
        assert!(interceptor.is_enabled());
        let prev = interceptor.set_enabled(false);
        assert!(prev);
        assert!(!interceptor.is_enabled());
        interceptor.set_enabled(prev);
        assert!(interceptor.is_enabled());
    }
}

//! A simulated device derived from an API profile.
//!
//! `SimDevice` gives the engine a real, stateful, handle-based API to drive
//! without a graphics context: headless hosts, the test suite, and script
//! previews all run against it. Its semantics come from the same
//! [`ApiProfile`](crate::profile::ApiProfile) the session wires its hooks
//! from, so device and engine agree about which entry points exist.
//!
//! Simulated behavior:
//! - creation entries allocate monotonically increasing handles, never reused
//! - deletion entries free the handle and null out any binding holding it
//! - setter entries update the named state parameter (bind-target enums
//!   select `{TARGET}_BINDING` parameters)
//! - `get_parameter` reads current state
//! - misuse (binding or deleting a freed handle) sets the deferred error
//!   flag, which `take_error` reads-and-clears

use rustc_hash::{FxHashMap, FxHashSet};

use crate::api::{ApiCall, ApiValue, Device, DeviceFault, Handle, ResourceKind};
use crate::profile::ApiProfile;

struct SimResource {
    kind: ResourceKind,
    freed: bool,
    params: FxHashMap<String, ApiValue>,
}

/// In-memory implementation of [`Device`].
pub struct SimDevice {
    entries: FxHashSet<String>,
    create_kind: FxHashMap<String, ResourceKind>,
    delete_kind: FxHashMap<String, ResourceKind>,
    /// Setter entry → the parameter it writes when no bind-target enum
    /// selects a more specific one.
    setter_param: FxHashMap<String, String>,
    /// Entries that mutate a resource rather than global state.
    resource_entries: FxHashSet<String>,
    params: FxHashMap<String, ApiValue>,
    known_params: FxHashSet<String>,
    resources: FxHashMap<Handle, SimResource>,
    next_handle: u64,
    error: Option<String>,
}

impl SimDevice {
    pub fn new(profile: &ApiProfile) -> Self {
        let mut device = Self {
            entries: FxHashSet::default(),
            create_kind: FxHashMap::default(),
            delete_kind: FxHashMap::default(),
            setter_param: FxHashMap::default(),
            resource_entries: FxHashSet::default(),
            params: FxHashMap::default(),
            known_params: FxHashSet::default(),
            resources: FxHashMap::default(),
            next_handle: 0,
            error: None,
        };

        for kind in &profile.kinds {
            device.entries.insert(kind.create.clone());
            device.entries.insert(kind.delete.clone());
            device.create_kind.insert(kind.create.clone(), kind.kind);
            device.delete_kind.insert(kind.delete.clone(), kind.kind);
            for refresh in &kind.refreshes {
                device.entries.insert(refresh.entry.clone());
                device.resource_entries.insert(refresh.entry.clone());
            }
        }
        for table in &profile.tables {
            for entry in &table.entries {
                if let crate::state_table::Query::Parameter(name) = &entry.query {
                    device.known_params.insert(name.clone());
                    device.params.insert(name.clone(), initial_value(&entry.format));
                    for setter in &entry.setters {
                        device.entries.insert(setter.clone());
                        device.setter_param.entry(setter.clone()).or_insert_with(|| name.clone());
                    }
                }
            }
        }
        for extra in &profile.passthrough {
            device.entries.insert(extra.clone());
        }
        device.entries.insert("get_parameter".to_string());
        device
    }

    /// Number of live (unfreed) simulated resources.
    pub fn live_resources(&self) -> usize {
        self.resources.values().filter(|r| !r.freed).count()
    }

    /// A resource-scoped value recorded by a mutating entry
    /// (`shader_source`, `buffer_data`, …), keyed by upper-cased entry name.
    pub fn resource_param(&self, handle: Handle, key: &str) -> Option<&ApiValue> {
        self.resources.get(&handle).and_then(|r| r.params.get(key))
    }

    fn raise(&mut self, detail: impl Into<String>) {
        // First error wins, like a sticky GL error flag.
        if self.error.is_none() {
            self.error = Some(detail.into());
        }
    }

    fn live_handle(&self, handle: Handle) -> bool {
        self.resources.get(&handle).is_some_and(|r| !r.freed)
    }

    /// `{TARGET}_BINDING` when the first argument is a bind-target enum with
    /// a matching parameter.
    fn enum_binding(&self, call: &ApiCall) -> Option<String> {
        let target = call.args.first().and_then(ApiValue::as_enum)?;
        let candidate = format!("{target}_BINDING");
        self.known_params.contains(&candidate).then_some(candidate)
    }

    /// The parameter a setter call writes: a bind-target enum argument
    /// selects `{TARGET}_BINDING` when that parameter exists.
    fn target_param(&self, call: &ApiCall) -> Option<String> {
        self.enum_binding(call).or_else(|| self.setter_param.get(&call.entry).cloned())
    }

    fn invoke_create(&mut self, kind: ResourceKind) -> ApiValue {
        self.next_handle += 1;
        let handle = Handle::from_raw(self.next_handle);
        self.resources
            .insert(handle, SimResource { kind, freed: false, params: FxHashMap::default() });
        ApiValue::Handle(handle)
    }

    fn invoke_delete(&mut self, call: &ApiCall, expected: ResourceKind) -> ApiValue {
        let Some(handle) = call.first_handle() else {
            self.raise(format!("{}: expected a handle argument", call.entry));
            return ApiValue::Unit;
        };
        let status = match self.resources.get(&handle) {
            Some(r) if r.freed => {
                Err(format!("{}: {} is not a live handle", call.entry, handle))
            }
            Some(r) if r.kind != expected => {
                Err(format!("{}: {} is a {}, not a {}", call.entry, handle, r.kind, expected))
            }
            Some(_) => Ok(()),
            None => Err(format!("{}: {} is not a live handle", call.entry, handle)),
        };
        if let Err(detail) = status {
            self.raise(detail);
            return ApiValue::Unit;
        }
        if let Some(resource) = self.resources.get_mut(&handle) {
            resource.freed = true;
        }
        // Deleting a bound object unbinds it everywhere.
        for value in self.params.values_mut() {
            if value.as_handle() == Some(handle) {
                *value = ApiValue::Handle(Handle::NULL);
            }
        }
        ApiValue::Unit
    }

    fn invoke_setter(&mut self, call: &ApiCall, param: String) -> ApiValue {
        match call.first_handle() {
            Some(handle) => {
                if !handle.is_null() && !self.live_handle(handle) {
                    self.raise(format!("{}: {} is not a live handle", call.entry, handle));
                    return ApiValue::Unit;
                }
                self.params.insert(param, ApiValue::Handle(handle));
            }
            None if matches!(self.params.get(&param), Some(ApiValue::Handle(_))) => {
                // Reference parameters only accept handles.
                self.raise(format!("{}: expected a handle argument", call.entry));
            }
            None => {
                let rendered = call
                    .args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                self.params.insert(param, ApiValue::Str(rendered));
            }
        }
        ApiValue::Unit
    }

    fn invoke_resource_op(&mut self, call: &ApiCall) -> ApiValue {
        // Bind-target form first (`buffer_data(ARRAY_BUFFER, …)` operates on
        // the bound buffer), then the explicit-handle form.
        let handle = match self.enum_binding(call) {
            Some(param) => self.params.get(&param).and_then(ApiValue::as_handle),
            None => call.first_handle(),
        };
        let Some(handle) = handle else {
            self.raise(format!("{}: no resource to operate on", call.entry));
            return ApiValue::Unit;
        };
        if !self.live_handle(handle) {
            self.raise(format!("{}: {} is not a live handle", call.entry, handle));
            return ApiValue::Unit;
        }
        let payload = call
            .args
            .iter()
            .filter(|a| a.as_handle() != Some(handle))
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(resource) = self.resources.get_mut(&handle) {
            resource.params.insert(call.entry.to_uppercase(), ApiValue::Str(payload));
        }
        ApiValue::Unit
    }
}

fn initial_value(format: &crate::state_table::Format) -> ApiValue {
    match format {
        crate::state_table::Format::Reference(_) => ApiValue::Handle(Handle::NULL),
        _ => ApiValue::Unit,
    }
}

impl Device for SimDevice {
    fn invoke(&mut self, call: &ApiCall) -> Result<ApiValue, DeviceFault> {
        if !self.entries.contains(&call.entry) {
            return Err(DeviceFault {
                entry: call.entry.clone(),
                detail: "unknown entry point".to_string(),
            });
        }

        if call.entry == "get_parameter" {
            let name = call.args.first().and_then(ApiValue::as_enum).ok_or_else(|| DeviceFault {
                entry: call.entry.clone(),
                detail: "expected a parameter name".to_string(),
            })?;
            return Ok(self.params.get(name).cloned().unwrap_or(ApiValue::Unit));
        }
        if let Some(kind) = self.create_kind.get(&call.entry).copied() {
            return Ok(self.invoke_create(kind));
        }
        if let Some(kind) = self.delete_kind.get(&call.entry).copied() {
            return Ok(self.invoke_delete(call, kind));
        }
        if self.setter_param.contains_key(&call.entry) {
            if let Some(param) = self.target_param(call) {
                return Ok(self.invoke_setter(call, param));
            }
        }
        if self.resource_entries.contains(&call.entry) {
            return Ok(self.invoke_resource_op(call));
        }
        // Passthrough entries (draws, clears) succeed silently.
        Ok(ApiValue::Unit)
    }

    fn has_entry_point(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    fn reset(&mut self) {
        self.resources.clear();
        self.error = None;
        for value in self.params.values_mut() {
            // Reference parameters reset to null, plain ones to unset.
            *value = match value {
                ApiValue::Handle(_) => ApiValue::Handle(Handle::NULL),
                _ => ApiValue::Unit,
            };
        }
    }
}

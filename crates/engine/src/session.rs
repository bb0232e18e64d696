//! The session: one registry, one set of state tables, one connector
//! manager, one stepper, wired over one device and one surface.
//!
//! All mutation is scoped to a session; two sessions never share state, so
//! tests can run them in parallel. Control flow per statement:
//!
//! 1. `on_before` fires.
//! 2. The statement's call goes through [`Session::call`]: the device runs,
//!    the entry's hook chain runs in registration order, then the device
//!    error flag is re-checked.
//! 3. The visualization settles: every edge is re-routed, dangling edges
//!    pruned, and `StatementSettled` emitted.
//! 4. `on_after` fires, the cursor advances, `on_line` announces the next
//!    statement.
//!
//! Handlers for one intercepted call complete fully before control returns
//! to the statement that made it, so consecutive calls are fully serialized
//! with respect to visualization state.

use rustc_hash::FxHashMap;

use crate::api::{ApiCall, ApiValue, Device, Handle};
use crate::connector::ConnectorManager;
use crate::error::EngineError;
use crate::events::SessionEvent;
use crate::interceptor::{HandleSource, Hook, Interceptor};
use crate::panel::{PanelBuilder, ResourcePanel};
use crate::profile::ApiProfile;
use crate::registry::{Descriptor, Registry};
use crate::script::{is_simple_ident, parse_statement, Arg, RawStatement};
use crate::settings::Settings;
use crate::state_table::{RefreshCx, StateTable};
use crate::stepper::{CancelToken, NoopObserver, StepObserver, StepState, Stepper};
use crate::surface::Surface;

/// An interactive visualization session.
pub struct Session<D: Device, S: Surface> {
    device: D,
    surface: S,
    builder: Box<dyn PanelBuilder>,
    profile: ApiProfile,
    settings: Settings,
    registry: Registry,
    tables: Vec<StateTable>,
    connector: ConnectorManager,
    interceptor: Interceptor,
    stepper: Stepper,
    /// Live per-resource panels, keyed by handle.
    panels: FxHashMap<Handle, Box<dyn ResourcePanel>>,
    /// Panels for default objects; live for the whole session.
    default_panels: Vec<Box<dyn ResourcePanel>>,
    events: Vec<SessionEvent>,
    /// Assignment target of the statement currently executing; consumed by
    /// the first creation hook for the naming heuristic.
    current_target: Option<String>,
}

impl<D: Device, S: Surface> Session<D, S> {
    /// Wire a session: default-object panels, state tables, interceptor
    /// hooks, and one silent initial refresh.
    ///
    /// Fails with `UnknownEntryPoint` if the profile names an entry point
    /// the device does not expose.
    pub fn new(
        device: D,
        surface: S,
        builder: Box<dyn PanelBuilder>,
        profile: ApiProfile,
        settings: Settings,
    ) -> Result<Self, EngineError> {
        let connector = ConnectorManager::new(settings.effective_palette());
        let mut session = Self {
            device,
            surface,
            builder,
            profile,
            settings,
            registry: Registry::new(),
            tables: Vec::new(),
            connector,
            interceptor: Interceptor::new(),
            stepper: Stepper::init("")?,
            panels: FxHashMap::default(),
            default_panels: Vec::new(),
            events: Vec::new(),
            current_target: None,
        };
        session.install_defaults();
        session.declare_tables();
        session.wire_hooks()?;
        session.silent_refresh_all();
        Ok(session)
    }

    fn install_defaults(&mut self) {
        let defaults = self.profile.defaults.clone();
        for default in defaults {
            let panel = self.builder.construct(
                &mut self.surface,
                default.kind,
                &default.display_name,
                Handle::NULL,
            );
            self.registry.set_default_info(
                default.kind,
                Descriptor::new(&default.display_name, default.kind, panel.panel()),
            );
            self.default_panels.push(panel);
        }
    }

    fn declare_tables(&mut self) {
        let specs = self.profile.tables.clone();
        for spec in specs {
            self.tables.push(StateTable::declare(spec, &mut self.surface));
        }
    }

    fn wire_hooks(&mut self) -> Result<(), EngineError> {
        let kinds = self.profile.kinds.clone();
        for spec in &kinds {
            self.interceptor.wrap(&self.device, &spec.create, Hook::Create(spec.kind))?;
            self.interceptor.wrap(&self.device, &spec.delete, Hook::Delete(spec.kind))?;
            for refresh in &spec.refreshes {
                if !refresh.op.applies_to(spec.kind) {
                    log::warn!(
                        "profile '{}': {:?} does not apply to {}, skipping {}",
                        self.profile.name,
                        refresh.op,
                        spec.kind,
                        refresh.entry
                    );
                    continue;
                }
                self.interceptor.wrap(
                    &self.device,
                    &refresh.entry,
                    Hook::RefreshPanel {
                        kind: spec.kind,
                        op: refresh.op,
                        source: refresh.source.clone(),
                    },
                )?;
            }
        }
        for (index, table) in self.tables.iter().enumerate() {
            let mut setters: Vec<String> = Vec::new();
            for entry in &table.spec().entries {
                for setter in &entry.setters {
                    if !setters.contains(setter) {
                        setters.push(setter.clone());
                    }
                }
            }
            for setter in setters {
                self.interceptor.wrap(&self.device, &setter, Hook::RefreshTable(index))?;
            }
        }
        Ok(())
    }

    fn silent_refresh_all(&mut self) {
        for index in 0..self.tables.len() {
            self.refresh_table(index, false);
        }
    }

    fn refresh_table(&mut self, index: usize, flash: bool) {
        let Some(table) = self.tables.get_mut(index) else { return };
        let mut cx = RefreshCx {
            device: &mut self.device,
            registry: &self.registry,
            connector: &mut self.connector,
            surface: &mut self.surface,
            events: &mut self.events,
            table_index: index,
        };
        table.refresh(&mut cx, flash);
    }

    /// Non-intercepting read of a binding parameter.
    fn read_binding(&mut self, param: &str) -> Option<Handle> {
        let call = ApiCall::new("get_parameter", vec![ApiValue::Enum(param.to_string())]);
        match self.device.invoke(&call) {
            Ok(value) => value.as_handle(),
            Err(fault) => {
                log::warn!("binding read failed: {fault}");
                None
            }
        }
    }

    /// The single intercepted entry path.
    ///
    /// With interception enabled: invoke the device, run the entry's hook
    /// chain in registration order, then re-check the device error flag
    /// (even when the call looked successful) and raise `Interception` if
    /// it is set. With interception disabled the call passes through
    /// untouched.
    ///
    /// If the device itself faults, no hook runs and the fault propagates.
    pub fn call(&mut self, entry: &str, args: Vec<ApiValue>) -> Result<ApiValue, EngineError> {
        let call = ApiCall::new(entry, args);
        if !self.interceptor.is_enabled() {
            return Ok(self.device.invoke(&call)?);
        }
        let value = self.device.invoke(&call)?;
        let hooks: Vec<Hook> = self.interceptor.hooks_for(entry).to_vec();
        for hook in &hooks {
            self.run_hook(hook, &call, &value)?;
        }
        if let Some(detail) = self.device.take_error() {
            return Err(EngineError::Interception { entry: entry.to_string(), detail });
        }
        Ok(value)
    }

    fn run_hook(
        &mut self,
        hook: &Hook,
        call: &ApiCall,
        result: &ApiValue,
    ) -> Result<(), EngineError> {
        match hook {
            Hook::Create(kind) => {
                let Some(handle) = result.as_handle() else {
                    log::warn!("{} did not return a handle", call.entry);
                    return Ok(());
                };
                let target = self.current_target.take();
                let name = self.stepper.name_for_creation(target.as_deref(), *kind);
                let panel = self.builder.construct(&mut self.surface, *kind, &name, handle);
                self.registry.register(handle, Descriptor::new(&name, *kind, panel.panel()))?;
                self.panels.insert(handle, panel);
                self.events.push(SessionEvent::ResourceCreated { handle, kind: *kind, name });
            }
            Hook::Delete(_kind) => {
                let Some(handle) = call.first_handle() else { return Ok(()) };
                if self.registry.mark_deleted(handle) {
                    if let Some(panel) = self.panels.remove(&handle) {
                        self.surface.remove_panel(panel.panel());
                    }
                    self.events.push(SessionEvent::ResourceDeleted { handle });
                }
                // Deleting a bound object changes bindings; re-diff every
                // table so stale references degrade immediately.
                let flash = self.settings.flash;
                for index in 0..self.tables.len() {
                    self.refresh_table(index, flash);
                }
            }
            Hook::RefreshTable(index) => {
                let flash = self.settings.flash;
                self.refresh_table(*index, flash);
            }
            Hook::RefreshPanel { op, source, .. } => {
                let handle = match source {
                    HandleSource::Arg(i) => call.args.get(*i).and_then(ApiValue::as_handle),
                    HandleSource::Binding(param) => self.read_binding(param),
                    HandleSource::BindingOfTarget(i) => call
                        .args
                        .get(*i)
                        .and_then(ApiValue::as_enum)
                        .map(|target| format!("{target}_BINDING"))
                        .and_then(|param| self.read_binding(&param)),
                };
                let Some(handle) = handle else { return Ok(()) };
                if let Some(panel) = self.panels.get_mut(&handle) {
                    // Panel read-backs must not re-trigger interception.
                    let was = self.interceptor.set_enabled(false);
                    panel.refresh(*op, &mut self.device, handle);
                    self.interceptor.set_enabled(was);
                }
            }
        }
        Ok(())
    }

    // ---- script control ----

    /// Load a script, replacing any previous one. Visual state is kept;
    /// call [`Session::restart`] first for a clean slate.
    pub fn load_script(&mut self, source: &str) -> Result<(), EngineError> {
        self.stepper = Stepper::init(source)?;
        Ok(())
    }

    /// Execute exactly one pending statement with full hook/settle
    /// bookkeeping. In `Done`, executes the empty statement: nothing runs,
    /// but the visualization settles and the terminal `on_after` fires.
    ///
    /// A failing statement still settles, still advances the cursor (so a
    /// later `step` continues past it), and returns its error.
    pub fn step_with(&mut self, observer: &mut dyn StepObserver) -> Result<(), EngineError> {
        if self.stepper.is_done() {
            self.settle(self.stepper.cursor());
            observer.on_after(None);
            return Ok(());
        }
        let Some(raw) = self.stepper.current().cloned() else { return Ok(()) };
        let index = self.stepper.cursor();

        observer.on_before(&raw);
        let result = self.execute_statement(&raw);
        self.settle(index);
        if result.is_ok() {
            observer.on_after(Some(&raw));
        }
        self.stepper.advance();
        if let Some(next) = self.stepper.current() {
            observer.on_line(next);
        }
        result
    }

    /// [`Session::step_with`] without hooks.
    pub fn step(&mut self) -> Result<(), EngineError> {
        self.step_with(&mut NoopObserver)
    }

    /// Execute all remaining statements with the configured inter-statement
    /// delay, checking `cancel` before every continuation. Halts on the
    /// first statement error; manual `step` may continue afterwards.
    ///
    /// Returns the number of statements executed.
    pub fn run(
        &mut self,
        observer: &mut dyn StepObserver,
        cancel: &CancelToken,
    ) -> Result<usize, EngineError> {
        let mut executed = 0usize;
        while !self.stepper.is_done() {
            if cancel.is_cancelled() {
                log::debug!("run cancelled at statement {}", self.stepper.cursor());
                break;
            }
            self.step_with(observer)?;
            executed += 1;
            if !self.stepper.is_done() && self.settings.step_delay_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(self.settings.step_delay_ms));
            }
        }
        Ok(executed)
    }

    /// Reset to `Ready`: clears the registry, tables, and edges, removes
    /// every panel the session created, and resets the device. The loaded
    /// script is kept.
    pub fn restart(&mut self) {
        log::debug!("session restart");
        self.stepper.restart();
        self.connector.clear(&mut self.surface);
        let handles: Vec<Handle> = self.registry.live_handles().collect();
        for handle in handles {
            if let Some(panel) = self.panels.remove(&handle) {
                self.surface.remove_panel(panel.panel());
            }
        }
        self.panels.clear();
        self.registry.clear();
        self.device.reset();
        for table in &mut self.tables {
            table.reset_rows();
        }
        self.silent_refresh_all();
        self.current_target = None;
    }

    /// Relay a state-table row's help text to the observer.
    pub fn show_help(&self, table: usize, row: usize, observer: &mut dyn StepObserver) {
        if let Some(t) = self.tables.get(table) {
            if let (Some(entry), Some(help)) = (t.spec().entries.get(row), t.row_help(row)) {
                observer.on_help(&entry.key, help);
            }
        }
    }

    /// Re-route all edges and prune dangling ones. Call after any host
    /// layout change (drag, collapse, viewport resize). Idempotent.
    pub fn update_connectors(&mut self) {
        let pruned = self.connector.update(&mut self.surface);
        for edge in pruned {
            self.events.push(SessionEvent::EdgeRemoved { edge });
        }
    }

    fn settle(&mut self, index: usize) {
        self.update_connectors();
        self.events.push(SessionEvent::StatementSettled { index });
    }

    fn execute_statement(&mut self, raw: &RawStatement) -> Result<(), EngineError> {
        let stmt = parse_statement(raw)?;
        let mut args = Vec::with_capacity(stmt.call.args.len());
        for arg in &stmt.call.args {
            args.push(self.eval_arg(arg, raw.line)?);
        }
        self.current_target = stmt.target.clone();
        let result = self.call(&stmt.call.entry, args);
        self.current_target = None;
        let value = result?;
        if let Some(target) = &stmt.target {
            if is_simple_ident(target) && value != ApiValue::Unit {
                self.stepper.bind(target, value);
            }
        }
        Ok(())
    }

    fn eval_arg(&self, arg: &Arg, line: usize) -> Result<ApiValue, EngineError> {
        Ok(match arg {
            Arg::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    ApiValue::Int(*n as i64)
                } else {
                    ApiValue::Float(*n)
                }
            }
            Arg::Str(s) | Arg::Block(s) => ApiValue::Str(s.clone()),
            Arg::Constant(name) => ApiValue::Enum(name.clone()),
            Arg::Var(name) => match self.stepper.resolve(name) {
                Some(value) => value.clone(),
                // `null` is the built-in unbound sentinel unless shadowed.
                None if name == "null" => ApiValue::Handle(Handle::NULL),
                None => {
                    return Err(EngineError::Script {
                        line,
                        detail: format!("unknown variable '{name}'"),
                    })
                }
            },
        })
    }

    // ---- introspection ----

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn connector(&self) -> &ConnectorManager {
        &self.connector
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn table(&self, index: usize) -> Option<&StateTable> {
        self.tables.get(index)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn step_state(&self) -> StepState {
        self.stepper.state()
    }

    pub fn cursor(&self) -> usize {
        self.stepper.cursor()
    }

    pub fn statement_count(&self) -> usize {
        self.stepper.len()
    }

    /// The next statement to execute, if any.
    pub fn next_statement(&self) -> Option<&RawStatement> {
        self.stepper.current()
    }

    /// Flip the session-wide interception flag; returns the previous value.
    /// Hosts clear it around their own read-back calls through
    /// [`Session::call`].
    pub fn set_intercept_enabled(&mut self, enabled: bool) -> bool {
        self.interceptor.set_enabled(enabled)
    }

    /// Take all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// JSON snapshot of the visible session state: live resources, table
    /// cells, and edges. For host-side logging and bug reports.
    pub fn snapshot(&self) -> serde_json::Value {
        let resources: Vec<serde_json::Value> = self
            .registry
            .live_handles()
            .filter_map(|h| {
                self.registry.lookup(h).map(|d| {
                    serde_json::json!({
                        "handle": h.raw(),
                        "name": d.display_name,
                        "kind": d.kind,
                    })
                })
            })
            .collect();
        let tables: Vec<serde_json::Value> = self
            .tables
            .iter()
            .map(|t| {
                let cells: Vec<&str> = (0..t.spec().entries.len())
                    .map(|i| t.row_text(i).unwrap_or(""))
                    .collect();
                serde_json::json!({ "title": t.spec().title, "cells": cells })
            })
            .collect();
        let edges: Vec<serde_json::Value> = self
            .connector
            .iter()
            .map(|(id, e)| {
                serde_json::json!({
                    "id": id.0,
                    "target": e.target_handle.raw(),
                    "color": e.color.to_string(),
                })
            })
            .collect();
        serde_json::json!({
            "statement": self.stepper.cursor(),
            "resources": resources,
            "tables": tables,
            "edges": edges,
        })
    }
}

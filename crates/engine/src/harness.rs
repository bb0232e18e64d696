//! Test harness for script-driven sessions with event tracking.
//!
//! `ScriptHarness` bundles a `SimDevice`, a `HeadlessSurface`, and a
//! session wired from the webgl-core profile (or any profile under test),
//! and accumulates session events across steps. Use it to test session
//! invariants without a graphics context or GUI dependencies.

use crate::api::Handle;
use crate::error::EngineError;
use crate::events::EventCollector;
use crate::panel::NullPanelBuilder;
use crate::profile::{webgl_core, ApiProfile};
use crate::session::Session;
use crate::settings::Settings;
use crate::sim::SimDevice;
use crate::stepper::{RecordingObserver, StepObserver};
use crate::surface::{HeadlessSurface, Surface};

/// Harness wrapping a session over simulated device and surface.
pub struct ScriptHarness {
    session: Session<SimDevice, HeadlessSurface>,
    events: EventCollector,
}

impl ScriptHarness {
    /// Harness over the webgl-core profile with zero step delay.
    pub fn new() -> Self {
        Self::with_profile(webgl_core())
    }

    pub fn with_profile(profile: ApiProfile) -> Self {
        let device = SimDevice::new(&profile);
        let settings = Settings { step_delay_ms: 0, ..Settings::default() };
        let session = Session::new(
            device,
            HeadlessSurface::new(),
            Box::new(NullPanelBuilder),
            profile,
            settings,
        )
        .expect("profile wires cleanly");
        let mut harness = Self { session, events: EventCollector::new() };
        harness.sync_events();
        harness.events.clear(); // Discard initial silent-refresh noise.
        harness
    }

    pub fn load(&mut self, script: &str) {
        self.session.load_script(script).expect("script splits cleanly");
    }

    /// Step once, folding new session events into the collector.
    pub fn step(&mut self) -> Result<(), EngineError> {
        let result = self.session.step();
        self.sync_events();
        result
    }

    /// Step once with an observer.
    pub fn step_with(&mut self, observer: &mut dyn StepObserver) -> Result<(), EngineError> {
        let result = self.session.step_with(observer);
        self.sync_events();
        result
    }

    /// Step `n` times, expecting every statement to succeed.
    pub fn step_n(&mut self, n: usize) {
        for i in 0..n {
            self.step().unwrap_or_else(|e| panic!("statement {i} failed: {e}"));
        }
    }

    fn sync_events(&mut self) {
        self.events.extend(self.session.drain_events());
    }

    pub fn session(&self) -> &Session<SimDevice, HeadlessSurface> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<SimDevice, HeadlessSurface> {
        &mut self.session
    }

    pub fn events(&self) -> &EventCollector {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// The live handle registered under a display name.
    pub fn handle_named(&self, name: &str) -> Option<Handle> {
        self.session
            .registry()
            .live_handles()
            .find(|h| self.session.registry().lookup(*h).is_some_and(|d| d.display_name == name))
    }

    pub fn cell_text(&self, table: usize, row: usize) -> Option<&str> {
        self.session.table(table)?.row_text(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ResourceKind;
    use crate::events::SessionEvent;
    use crate::stepper::{CancelToken, StepState};
    use proptest::prelude::*;

    // Row indices in the webgl-core "bind points" table.
    const ARRAY_BUFFER_ROW: usize = 0;

    #[test]
    fn test_wiring_declares_tables_and_defaults() {
        let harness = ScriptHarness::new();
        let session = harness.session();
        assert_eq!(session.table_count(), 3);
        // Three table panels plus the default framebuffer panel.
        assert_eq!(session.surface().panel_count(), 4);
        // Silent initial refresh rendered the unbound sentinels.
        assert_eq!(harness.cell_text(0, ARRAY_BUFFER_ROW), Some("(none)"));
        // The framebuffer row resolves to the default object, and routes to
        // it like any explicit object.
        assert_eq!(harness.cell_text(0, 3), Some("canvas"));
        assert_eq!(session.connector().len(), 1);
        let (_, edge) = session.connector().iter().next().unwrap();
        assert_eq!(edge.target_handle, Handle::NULL);
    }

    #[test]
    fn test_n_steps_move_ready_to_done() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);\ndelete_buffer(a);");
        assert_eq!(harness.session().step_state(), StepState::Ready);

        harness.step_n(3);
        assert_eq!(harness.session().step_state(), StepState::Done);
        assert_eq!(harness.session().cursor(), 3);
        assert_eq!(harness.events().settled(), vec![0, 1, 2]);
    }

    #[test]
    fn test_done_step_fires_terminal_on_after_only() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();");
        harness.step_n(1);

        let mut observer = RecordingObserver::default();
        harness.step_with(&mut observer).unwrap();
        // Cursor did not advance past N; only on_after fired.
        assert_eq!(harness.session().cursor(), 1);
        assert_eq!(observer.calls, vec!["after:<done>"]);
        // The empty statement still settles.
        assert_eq!(harness.events().settled(), vec![0, 1]);
    }

    #[test]
    fn test_create_registers_named_descriptor() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();");
        harness.step().unwrap();

        let session = harness.session();
        assert_eq!(session.registry().live_count(), 1);
        let handle = harness.handle_named("a").expect("descriptor named a");
        let descriptor = session.registry().lookup(handle).unwrap();
        assert_eq!(descriptor.kind, ResourceKind::Buffer);
        assert!(!descriptor.deleted);
        assert!(session.surface().panel_exists(descriptor.panel));
        assert_eq!(
            harness.events().resources_created(),
            vec![(handle, ResourceKind::Buffer, "a")]
        );
    }

    #[test]
    fn test_anonymous_fallback_for_dotted_target() {
        let mut harness = ScriptHarness::new();
        harness.load("foo.tex = create_texture();");
        harness.step().unwrap();
        assert!(harness.handle_named("texture#1").is_some());
    }

    #[test]
    fn test_bind_updates_cell_and_edge() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);");
        harness.step_n(2);

        assert_eq!(harness.cell_text(0, ARRAY_BUFFER_ROW), Some("a"));
        let handle = harness.handle_named("a").unwrap();
        let session = harness.session();
        // The wiring-time canvas edge plus the new buffer edge.
        assert_eq!(session.connector().len(), 2);
        let (_, edge) = session
            .connector()
            .iter()
            .find(|(_, e)| e.target_handle == handle)
            .expect("edge to a");
        // Both edges were routed at settle time and handed to the surface.
        assert_eq!(session.surface().drawn_edge_count(), 2);
        assert!(!edge.path().points().is_empty());
    }

    #[test]
    fn test_event_order_within_statement() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);");
        harness.step().unwrap();
        harness.clear_events();
        harness.step().unwrap();

        let events = harness.events().events();
        let cell = events
            .iter()
            .position(|e| matches!(e, SessionEvent::CellChanged { .. }))
            .expect("cell changed");
        let edge = events
            .iter()
            .position(|e| matches!(e, SessionEvent::EdgeAdded { .. }))
            .expect("edge added");
        let settled = events
            .iter()
            .position(|e| matches!(e, SessionEvent::StatementSettled { .. }))
            .expect("settled");
        assert!(cell < edge && edge < settled);
        assert_eq!(settled, events.len() - 1);
    }

    #[test]
    fn test_delete_degrades_and_prunes() {
        let mut harness = ScriptHarness::new();
        harness.load(
            "a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);\ndelete_buffer(a);",
        );
        harness.step_n(2);
        let handle = harness.handle_named("a").unwrap();
        let panel = harness.session().registry().lookup(handle).unwrap().panel;

        harness.step().unwrap();
        let session = harness.session();
        let descriptor = session.registry().lookup(handle).unwrap();
        assert!(descriptor.deleted);
        assert!(!session.surface().panel_exists(panel));
        // Only the canvas edge survives; nothing points at the deleted buffer.
        assert!(session.connector().iter().all(|(_, e)| e.target_handle != handle));
        // The binding cell degraded without throwing.
        assert_eq!(harness.cell_text(0, ARRAY_BUFFER_ROW), Some("(none)"));
        assert_eq!(
            session.registry().format_reference(handle, ResourceKind::Buffer),
            "(deleted)"
        );
    }

    #[test]
    fn test_failed_statement_reports_and_cursor_continues() {
        let mut harness = ScriptHarness::new();
        harness.load(
            "a = create_buffer();\ndelete_buffer(a);\nbind_buffer(ARRAY_BUFFER, a);\nclear();",
        );
        harness.step_n(2);

        // Binding a freed handle: the device error flag surfaces as an
        // interception error after the wrapped call.
        let err = harness.step().unwrap_err();
        assert!(matches!(err, EngineError::Interception { .. }));

        // Manual stepping continues past the failure.
        assert_eq!(harness.session().cursor(), 3);
        harness.step().unwrap();
        assert_eq!(harness.session().step_state(), StepState::Done);
    }

    #[test]
    fn test_run_halts_on_error_and_respects_cancel() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();\ndelete_buffer(a);\nbind_buffer(ARRAY_BUFFER, a);\nclear();");

        let cancel = CancelToken::new();
        let err = harness
            .session_mut()
            .run(&mut crate::stepper::NoopObserver, &cancel)
            .unwrap_err();
        assert!(matches!(err, EngineError::Interception { .. }));
        // Halted after the failing statement; one statement remains.
        assert_eq!(harness.session().cursor(), 3);

        // A pre-cancelled token executes nothing.
        let cancel = CancelToken::new();
        cancel.cancel();
        let executed =
            harness.session_mut().run(&mut crate::stepper::NoopObserver, &cancel).unwrap();
        assert_eq!(executed, 0);
        assert_eq!(harness.session().cursor(), 3);
    }

    #[test]
    fn test_restart_resets_everything() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);");
        harness.step_n(2);
        assert_eq!(harness.session().surface().panel_count(), 5);

        harness.session_mut().restart();
        let session = harness.session();
        assert_eq!(session.step_state(), StepState::Ready);
        assert_eq!(session.registry().live_count(), 0);
        // Only the re-created canvas edge remains.
        assert_eq!(session.connector().len(), 1);
        assert!(session.connector().iter().all(|(_, e)| e.target_handle.is_null()));
        // Back to the wiring-time panels: three tables plus the default.
        assert_eq!(session.surface().panel_count(), 4);
        assert_eq!(harness.cell_text(0, ARRAY_BUFFER_ROW), Some("(none)"));

        // The script replays from statement 0.
        harness.step_n(2);
        assert_eq!(harness.cell_text(0, ARRAY_BUFFER_ROW), Some("a"));
    }

    #[test]
    fn test_update_connectors_is_pure() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);");
        harness.step_n(2);

        let (id, edge) = harness.session().connector().iter().next().unwrap();
        let path = edge.path().clone();
        harness.session_mut().update_connectors();
        harness.session_mut().update_connectors();
        let session = harness.session();
        assert_eq!(session.connector().edge(id).unwrap().path(), &path);
        assert_eq!(session.connector().len(), 1);
    }

    #[test]
    fn test_snapshot_reflects_visible_state() {
        let mut harness = ScriptHarness::new();
        harness.load("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);");
        harness.step_n(2);

        let snapshot = harness.session().snapshot();
        assert_eq!(snapshot["statement"], 2);
        assert_eq!(snapshot["resources"][0]["name"], "a");
        assert_eq!(snapshot["tables"][0]["cells"][0], "a");
        assert_eq!(snapshot["edges"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_help_relays_row_text() {
        let harness = ScriptHarness::new();
        let mut observer = RecordingObserver::default();
        harness.session().show_help(0, 0, &mut observer);
        assert_eq!(observer.calls.len(), 1);
        assert!(observer.calls[0].starts_with("help:ARRAY_BUFFER_BINDING:"));
    }

    proptest! {
        /// For any interleaving of create/delete statements, every live
        /// handle has exactly one descriptor and names stay stable.
        #[test]
        fn prop_one_descriptor_per_live_handle(ops in proptest::collection::vec(0u8..3, 1..24)) {
            let mut script = String::new();
            let mut created = 0usize;
            let mut deleted = 0usize;
            for op in &ops {
                match op {
                    0 => {
                        script.push_str(&format!("b{created} = create_buffer();\n"));
                        created += 1;
                    }
                    1 if deleted < created => {
                        script.push_str(&format!("delete_buffer(b{deleted});\n"));
                        deleted += 1;
                    }
                    _ => script.push_str("clear();\n"),
                }
            }

            let mut harness = ScriptHarness::new();
            harness.load(&script);
            while harness.session().step_state() != StepState::Done {
                harness.step().unwrap();
            }

            prop_assert_eq!(harness.session().registry().live_count(), created - deleted);
            for i in deleted..created {
                let name = format!("b{i}");
                let handle = harness.handle_named(&name).expect("live handle has descriptor");
                prop_assert_eq!(
                    harness.session().registry().format_reference(handle, ResourceKind::Buffer),
                    name
                );
            }
        }

        /// A script of N statements reaches Done in exactly N steps.
        #[test]
        fn prop_n_statements_n_steps(n in 1usize..16) {
            let script = "clear();\n".repeat(n);
            let mut harness = ScriptHarness::new();
            harness.load(&script);
            for _ in 0..n {
                prop_assert!(harness.session().step_state() != StepState::Done);
                harness.step().unwrap();
            }
            prop_assert_eq!(harness.session().step_state(), StepState::Done);
        }
    }
}

//! End-to-end session walk over the public API: a script is stepped
//! statement by statement while registry, state tables, and connectors are
//! checked after each step.

use statescope_engine::api::{Handle, ResourceKind};
use statescope_engine::events::EventCollector;
use statescope_engine::panel::NullPanelBuilder;
use statescope_engine::profile::webgl_core;
use statescope_engine::session::Session;
use statescope_engine::settings::Settings;
use statescope_engine::sim::SimDevice;
use statescope_engine::stepper::{RecordingObserver, StepState};
use statescope_engine::surface::{HeadlessSurface, Surface};

type SimSession = Session<SimDevice, HeadlessSurface>;

fn new_session() -> SimSession {
    let profile = webgl_core();
    let device = SimDevice::new(&profile);
    let settings = Settings { step_delay_ms: 0, ..Settings::default() };
    Session::new(device, HeadlessSurface::new(), Box::new(NullPanelBuilder), profile, settings)
        .expect("webgl-core profile wires cleanly")
}

fn handle_named(session: &SimSession, name: &str) -> Option<Handle> {
    session
        .registry()
        .live_handles()
        .find(|h| session.registry().lookup(*h).is_some_and(|d| d.display_name == name))
}

// Row 0 of table 0 is ARRAY_BUFFER_BINDING in the webgl-core profile.
const BIND_TABLE: usize = 0;
const ARRAY_BUFFER_ROW: usize = 0;

#[test]
fn create_bind_delete_walkthrough() {
    let mut session = new_session();
    session
        .load_script(
            "a = create_buffer();\n\
             bind_buffer(ARRAY_BUFFER, a);\n\
             delete_buffer(a);",
        )
        .unwrap();
    assert_eq!(session.step_state(), StepState::Ready);

    // Statement 1: one live descriptor named "a".
    session.step().unwrap();
    assert_eq!(session.registry().live_count(), 1);
    let a = handle_named(&session, "a").expect("descriptor named a");
    let panel = session.registry().lookup(a).unwrap().panel;
    assert!(session.surface().panel_exists(panel));

    // Statement 2: the binding cell shows "a" and an edge runs from that
    // cell to a's panel.
    session.step().unwrap();
    let table = session.table(BIND_TABLE).unwrap();
    assert_eq!(table.row_text(ARRAY_BUFFER_ROW), Some("a"));
    let edge_id = table.row_edge(ARRAY_BUFFER_ROW).expect("edge for the binding cell");
    let edge = session.connector().edge(edge_id).unwrap();
    assert_eq!(edge.target_handle, a);
    assert_eq!(edge.source, table.row_anchor(ARRAY_BUFFER_ROW).unwrap());
    assert_eq!(edge.target, session.surface().panel_anchor(panel));
    assert!(session.surface().drawn_edge(edge_id).is_some());

    // Statement 3: descriptor is deleted, the panel is gone, and no edge
    // targets a anymore.
    session.step().unwrap();
    assert_eq!(session.step_state(), StepState::Done);
    let descriptor = session.registry().lookup(a).unwrap();
    assert!(descriptor.deleted);
    assert!(!session.surface().panel_exists(panel));
    assert!(session.connector().edge(edge_id).is_none());
    assert!(session.surface().drawn_edge(edge_id).is_none());
    assert_eq!(
        session.registry().format_reference(a, ResourceKind::Buffer),
        "(deleted)"
    );

    // A further update prunes nothing and changes nothing.
    session.update_connectors();
    assert!(session.connector().edge(edge_id).is_none());
}

#[test]
fn shader_program_script_with_literal_blocks() {
    let mut session = new_session();
    session
        .load_script(
            "vs = create_shader();\n\
             shader_source(vs, `void main() { gl_Position = vec4(0); }`);\n\
             compile_shader(vs);\n\
             prg = create_program();\n\
             attach_shader(prg, vs);\n\
             link_program(prg);\n\
             use_program(prg);",
        )
        .unwrap();
    assert_eq!(session.statement_count(), 7);

    while session.step_state() != StepState::Done {
        session.step().unwrap();
    }

    let prg = handle_named(&session, "prg").expect("program registered");
    let program_table = session.table(1).unwrap();
    assert_eq!(program_table.row_text(0), Some("prg"));
    let edge_id = program_table.row_edge(0).unwrap();
    assert_eq!(session.connector().edge(edge_id).unwrap().target_handle, prg);

    // The shader source survived the literal block intact.
    let vs = handle_named(&session, "vs").unwrap();
    let source = session.device().resource_param(vs, "SHADER_SOURCE");
    assert!(source.is_some());
}

#[test]
fn observer_sees_full_step_lifecycle() {
    let mut session = new_session();
    session.load_script("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);").unwrap();

    let mut observer = RecordingObserver::default();
    session.step_with(&mut observer).unwrap();
    assert_eq!(
        observer.calls,
        vec![
            "before:a = create_buffer()".to_string(),
            "after:a = create_buffer()".to_string(),
            "line:bind_buffer(ARRAY_BUFFER, a)".to_string(),
        ]
    );

    observer.calls.clear();
    session.step_with(&mut observer).unwrap();
    assert_eq!(
        observer.calls,
        vec![
            "before:bind_buffer(ARRAY_BUFFER, a)".to_string(),
            "after:bind_buffer(ARRAY_BUFFER, a)".to_string(),
        ]
    );

    // Done: the empty statement fires only the terminal on_after.
    observer.calls.clear();
    session.step_with(&mut observer).unwrap();
    assert_eq!(observer.calls, vec!["after:<done>".to_string()]);
    assert_eq!(session.cursor(), 2);
}

#[test]
fn events_stream_tracks_the_statement_lifecycle() {
    let mut session = new_session();
    session
        .load_script("a = create_buffer();\nbind_buffer(ARRAY_BUFFER, a);\ndelete_buffer(a);")
        .unwrap();
    session.drain_events();

    let mut collector = EventCollector::new();
    session.step().unwrap();
    collector.extend(session.drain_events());
    let a = handle_named(&session, "a").unwrap();
    assert_eq!(collector.resources_created(), vec![(a, ResourceKind::Buffer, "a")]);
    assert_eq!(collector.settled(), vec![0]);

    collector.clear();
    session.step().unwrap();
    collector.extend(session.drain_events());
    assert_eq!(collector.cells_changed(), vec![(BIND_TABLE, ARRAY_BUFFER_ROW, "a")]);
    assert_eq!(collector.edges_added().len(), 1);

    collector.clear();
    session.step().unwrap();
    collector.extend(session.drain_events());
    assert!(collector.edges_removed().len() >= 1);
    assert_eq!(collector.settled(), vec![2]);
}

#[test]
fn unbinding_via_null_clears_cell_and_edge() {
    let mut session = new_session();
    session
        .load_script(
            "a = create_buffer();\n\
             bind_buffer(ARRAY_BUFFER, a);\n\
             bind_buffer(ARRAY_BUFFER, null);",
        )
        .unwrap();
    session.step().unwrap();
    session.step().unwrap();
    assert_eq!(session.table(BIND_TABLE).unwrap().row_text(ARRAY_BUFFER_ROW), Some("a"));

    session.step().unwrap();
    let table = session.table(BIND_TABLE).unwrap();
    assert_eq!(table.row_text(ARRAY_BUFFER_ROW), Some("(none)"));
    assert_eq!(table.row_edge(ARRAY_BUFFER_ROW), None);
    // The descriptor is untouched: unbinding is not deletion.
    assert_eq!(session.registry().live_count(), 1);
}

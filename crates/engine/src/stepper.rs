//! Script cursor, variable environment, and step hooks.
//!
//! The stepper owns *where we are* in the script: the statement sequence,
//! the cursor, the variable bindings produced by assignment statements, and
//! the anonymous-name counter. Executing a statement is the session's job;
//! the session drives this state machine from `Session::step_with`.
//!
//! States follow the cursor: `Ready` (cursor 0), `Stepping` (0 < cursor < N),
//! `Done` (cursor = N).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::api::{ApiValue, ResourceKind};
use crate::error::EngineError;
use crate::script::{is_simple_ident, split_statements, RawStatement};

/// Stepper state, derived from the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Ready,
    Stepping,
    Done,
}

/// Cooperative cancellation flag for `run()`.
///
/// Cloneable; any clone may cancel. Checked before every continuation, so a
/// cancelled run stops at the next statement boundary.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Step lifecycle hooks. All default to no-ops.
pub trait StepObserver {
    /// About to execute this statement.
    fn on_before(&mut self, _statement: &RawStatement) {}

    /// A statement finished and the visualization settled. `None` for the
    /// empty terminal step taken in `Done`.
    fn on_after(&mut self, _statement: Option<&RawStatement>) {}

    /// The cursor moved; this is the next statement to execute.
    fn on_line(&mut self, _next: &RawStatement) {}

    /// Help was requested for a state-table row.
    fn on_help(&mut self, _key: &str, _text: &str) {}
}

/// The do-nothing observer.
pub struct NoopObserver;

impl StepObserver for NoopObserver {}

/// Observer that records every hook firing as a string. Useful for hosts
/// debugging pacing and for tests asserting hook order.
#[derive(Default)]
pub struct RecordingObserver {
    pub calls: Vec<String>,
}

impl StepObserver for RecordingObserver {
    fn on_before(&mut self, statement: &RawStatement) {
        self.calls.push(format!("before:{}", statement.text));
    }

    fn on_after(&mut self, statement: Option<&RawStatement>) {
        self.calls.push(match statement {
            Some(s) => format!("after:{}", s.text),
            None => "after:<done>".to_string(),
        });
    }

    fn on_line(&mut self, next: &RawStatement) {
        self.calls.push(format!("line:{}", next.text));
    }

    fn on_help(&mut self, key: &str, text: &str) {
        self.calls.push(format!("help:{key}:{text}"));
    }
}

/// Sequential statement cursor with variable environment.
pub struct Stepper {
    statements: Vec<RawStatement>,
    cursor: usize,
    env: FxHashMap<String, ApiValue>,
    anon_counter: usize,
}

impl Stepper {
    /// Split `source` into statements. Fails only on unterminated literals.
    pub fn init(source: &str) -> Result<Self, EngineError> {
        Ok(Self {
            statements: split_statements(source)?,
            cursor: 0,
            env: FxHashMap::default(),
            anon_counter: 0,
        })
    }

    pub fn state(&self) -> StepState {
        if self.cursor >= self.statements.len() {
            StepState::Done
        } else if self.cursor == 0 {
            StepState::Ready
        } else {
            StepState::Stepping
        }
    }

    pub fn is_done(&self) -> bool {
        self.state() == StepState::Done
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The statement the cursor is on (the next one to execute).
    pub fn current(&self) -> Option<&RawStatement> {
        self.statements.get(self.cursor)
    }

    /// Advance past the current statement.
    pub fn advance(&mut self) {
        if self.cursor < self.statements.len() {
            self.cursor += 1;
        }
    }

    /// Bind a variable produced by an assignment statement.
    pub fn bind(&mut self, name: &str, value: ApiValue) {
        self.env.insert(name.to_string(), value);
    }

    /// Resolve a variable reference.
    pub fn resolve(&self, name: &str) -> Option<&ApiValue> {
        self.env.get(name)
    }

    /// Display name for a resource created by the current statement.
    ///
    /// Best-effort: an assignment-shaped creation statement with a simple
    /// identifier target (`tex = create_texture()`) yields that identifier.
    /// Anything else (`foo.tex = …`, no target) falls back to the
    /// deterministic `"{prefix}#{n}"` scheme with a per-session counter.
    pub fn name_for_creation(&mut self, target: Option<&str>, kind: ResourceKind) -> String {
        match target {
            Some(t) if is_simple_ident(t) => t.to_string(),
            _ => {
                self.anon_counter += 1;
                format!("{}#{}", kind.prefix(), self.anon_counter)
            }
        }
    }

    /// Back to `Ready`: cursor 0, environment and naming counter cleared.
    /// The statement sequence is kept.
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.env.clear();
        self.anon_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Handle;

    #[test]
    fn test_state_follows_cursor() {
        let mut stepper = Stepper::init("a();\nb();\nc();").unwrap();
        assert_eq!(stepper.state(), StepState::Ready);
        assert_eq!(stepper.len(), 3);

        stepper.advance();
        assert_eq!(stepper.state(), StepState::Stepping);
        stepper.advance();
        stepper.advance();
        assert_eq!(stepper.state(), StepState::Done);

        // Advancing in Done stays at N.
        stepper.advance();
        assert_eq!(stepper.cursor(), 3);
    }

    #[test]
    fn test_empty_script_is_done_immediately() {
        let stepper = Stepper::init("  # nothing here\n").unwrap();
        assert!(stepper.is_empty());
        assert_eq!(stepper.state(), StepState::Done);
    }

    #[test]
    fn test_env_round_trip_and_restart() {
        let mut stepper = Stepper::init("a = create_buffer();").unwrap();
        stepper.bind("a", ApiValue::Handle(Handle::from_raw(1)));
        assert_eq!(stepper.resolve("a"), Some(&ApiValue::Handle(Handle::from_raw(1))));
        stepper.advance();

        stepper.restart();
        assert_eq!(stepper.state(), StepState::Ready);
        assert_eq!(stepper.resolve("a"), None);
    }

    #[test]
    fn test_naming_heuristic() {
        let mut stepper = Stepper::init("x = f();").unwrap();
        assert_eq!(
            stepper.name_for_creation(Some("tex"), ResourceKind::Texture),
            "tex"
        );
        assert_eq!(
            stepper.name_for_creation(Some("foo.tex"), ResourceKind::Texture),
            "texture#1"
        );
        assert_eq!(stepper.name_for_creation(None, ResourceKind::Buffer), "buffer#2");

        // Counter resets with the session.
        stepper.restart();
        assert_eq!(stepper.name_for_creation(None, ResourceKind::Buffer), "buffer#1");
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}

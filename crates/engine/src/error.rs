use std::fmt;

use crate::api::{DeviceFault, Handle};

/// Engine error taxonomy.
///
/// Setup-class errors (`UnknownEntryPoint`, `RegistryClash`, `ConfigParse`,
/// `Io`) fail loudly and immediately. Statement-class errors (`Interception`,
/// `Script`, `Device`) surface to the stepper's caller: `run()` halts on the
/// first one, manual `step()` may continue past it.
///
/// Note what is *not* here: a registry miss. Looking up an unknown or
/// deleted handle degrades to an "(unknown)"/"(deleted)" rendering and never
/// produces an error value.
#[derive(Debug)]
pub enum EngineError {
    /// The underlying API reported an error after a wrapped call completed.
    Interception { entry: String, detail: String },
    /// `wrap()` named an entry point the device does not expose.
    UnknownEntryPoint(String),
    /// `register()` called twice for one handle (handles are unique per session).
    RegistryClash { handle: Handle, name: String },
    /// Script tokenize/parse/execution error.
    Script { line: usize, detail: String },
    /// The device refused a call outright.
    Device(DeviceFault),
    /// Settings deserialization error.
    ConfigParse(String),
    /// Settings file read error.
    Io(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interception { entry, detail } => {
                write!(f, "API error after {entry}: {detail}")
            }
            Self::UnknownEntryPoint(entry) => write!(f, "unknown entry point: {entry}"),
            Self::RegistryClash { handle, name } => {
                write!(f, "handle {handle} registered twice (as '{name}')")
            }
            Self::Script { line, detail } => write!(f, "script error at line {line}: {detail}"),
            Self::Device(fault) => write!(f, "{fault}"),
            Self::ConfigParse(msg) => write!(f, "settings parse error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DeviceFault> for EngineError {
    fn from(fault: DeviceFault) -> Self {
        Self::Device(fault)
    }
}

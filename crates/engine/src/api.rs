//! The underlying-API vocabulary: handles, values, calls, and the `Device`
//! seam the engine drives.
//!
//! A `Handle` is pure identity. The engine never looks inside a resource; it
//! only correlates the handles the device hands out with the visual proxies
//! it builds for them.

use serde::{Deserialize, Serialize};

/// Opaque identity for a resource created by the underlying API.
///
/// Compared only by identity, never by payload. `Handle::NULL` is the zero
/// sentinel meaning "nothing"; binding points report it when unbound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    /// The null/zero sentinel.
    pub const NULL: Handle = Handle(0);

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Kind of resource a handle refers to.
///
/// A closed set: panel refresh capabilities are dispatched over this tag,
/// never over free-form operation names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Buffer,
    Shader,
    Program,
    Texture,
    Renderbuffer,
    Framebuffer,
    VertexArray,
    Sampler,
}

impl ResourceKind {
    /// Short lowercase prefix used for anonymous display names.
    pub fn prefix(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Shader => "shader",
            ResourceKind::Program => "program",
            ResourceKind::Texture => "texture",
            ResourceKind::Renderbuffer => "renderbuffer",
            ResourceKind::Framebuffer => "framebuffer",
            ResourceKind::VertexArray => "vertex_array",
            ResourceKind::Sampler => "sampler",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A value crossing the `Device` boundary in either direction.
///
/// `Bytes(n)` stands in for an uploaded blob of length `n`; the contents are
/// irrelevant to visualization and never retained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiValue {
    Unit,
    Handle(Handle),
    Int(i64),
    Float(f64),
    Str(String),
    /// A named API constant (e.g. `ARRAY_BUFFER`).
    Enum(String),
    Bytes(usize),
}

impl ApiValue {
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            ApiValue::Handle(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match self {
            ApiValue::Enum(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiValue::Unit => write!(f, "—"),
            ApiValue::Handle(h) => write!(f, "{h}"),
            ApiValue::Int(i) => write!(f, "{i}"),
            ApiValue::Float(x) => write!(f, "{x}"),
            ApiValue::Str(s) => write!(f, "{s}"),
            ApiValue::Enum(name) => write!(f, "{name}"),
            ApiValue::Bytes(n) => write!(f, "{n} bytes"),
        }
    }
}

/// One call against the underlying API.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiCall {
    pub entry: String,
    pub args: Vec<ApiValue>,
}

impl ApiCall {
    pub fn new(entry: impl Into<String>, args: Vec<ApiValue>) -> Self {
        Self { entry: entry.into(), args }
    }

    /// The first handle-valued argument, if any.
    pub fn first_handle(&self) -> Option<Handle> {
        self.args.iter().find_map(|a| a.as_handle())
    }
}

impl std::fmt::Display for ApiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.entry)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, ")")
    }
}

/// The device refused a call outright (unknown entry point, bad arity).
///
/// Distinct from the deferred error flag: a fault aborts the call before any
/// handler runs, while the flag is re-checked after handlers complete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFault {
    pub entry: String,
    pub detail: String,
}

impl std::fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device fault in {}: {}", self.entry, self.detail)
    }
}

impl std::error::Error for DeviceFault {}

/// The underlying stateful, handle-based API.
///
/// Implemented by the host over the real graphics context, and by
/// [`SimDevice`](crate::sim::SimDevice) for headless use.
pub trait Device {
    /// Execute one call and return its result.
    fn invoke(&mut self, call: &ApiCall) -> Result<ApiValue, DeviceFault>;

    /// Whether this device exposes the named entry point. Checked once at
    /// wrap time so misconfiguration fails at setup, not mid-script.
    fn has_entry_point(&self, entry: &str) -> bool;

    /// Take and clear the deferred error flag (glGetError-style: reading
    /// clears).
    fn take_error(&mut self) -> Option<String>;

    /// Drop all device-side state. Called on session restart.
    fn reset(&mut self);
}

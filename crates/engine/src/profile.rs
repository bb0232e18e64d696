//! Declarative description of the underlying API.
//!
//! A profile names the resource kinds (their create/delete entry points and
//! panel refresh triggers), the global state tables, the default objects,
//! and any extra entry points that exist without engine reactions. The
//! session wires its interceptor from this description, and `SimDevice`
//! derives simulated semantics from the same description, so the two can
//! never disagree about which entry points exist.

use crate::api::ResourceKind;
use crate::interceptor::HandleSource;
use crate::panel::RefreshOp;
use crate::state_table::{StateEntry, TableSpec};

/// An intercepted entry point that refreshes part of a resource panel.
#[derive(Debug, Clone)]
pub struct RefreshHook {
    pub entry: String,
    pub op: RefreshOp,
    pub source: HandleSource,
}

impl RefreshHook {
    pub fn new(entry: &str, op: RefreshOp, source: HandleSource) -> Self {
        Self { entry: entry.to_string(), op, source }
    }
}

/// One resource kind as the API exposes it.
#[derive(Debug, Clone)]
pub struct KindSpec {
    pub kind: ResourceKind,
    /// Entry point whose result is a fresh handle of this kind.
    pub create: String,
    /// Entry point deleting the handle passed as its first argument.
    pub delete: String,
    pub refreshes: Vec<RefreshHook>,
}

impl KindSpec {
    pub fn new(kind: ResourceKind, create: &str, delete: &str) -> Self {
        Self { kind, create: create.to_string(), delete: delete.to_string(), refreshes: Vec::new() }
    }

    pub fn with_refresh(mut self, hook: RefreshHook) -> Self {
        self.refreshes.push(hook);
        self
    }
}

/// A binding point whose unbound state is a distinguished default object.
#[derive(Debug, Clone)]
pub struct DefaultObject {
    pub kind: ResourceKind,
    pub display_name: String,
}

/// The full declarative API description.
#[derive(Debug, Clone, Default)]
pub struct ApiProfile {
    pub name: String,
    pub kinds: Vec<KindSpec>,
    pub tables: Vec<TableSpec>,
    pub defaults: Vec<DefaultObject>,
    /// Entry points with no engine reaction (draw calls, clears). Listed so
    /// scripts may call them and wrap-time validation knows they exist.
    pub passthrough: Vec<String>,
}

impl ApiProfile {
    /// Every entry point this profile mentions anywhere.
    pub fn entry_points(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = Vec::new();
        for k in &self.kinds {
            entries.push(&k.create);
            entries.push(&k.delete);
            for r in &k.refreshes {
                entries.push(&r.entry);
            }
        }
        for t in &self.tables {
            for e in &t.entries {
                for s in &e.setters {
                    entries.push(s);
                }
            }
        }
        for p in &self.passthrough {
            entries.push(p);
        }
        entries.sort_unstable();
        entries.dedup();
        entries
    }
}

/// The core WebGL-shaped profile: buffers, shaders, programs, textures,
/// framebuffers, and vertex arrays, with the bind-point and program state
/// tables the visualizer mirrors.
pub fn webgl_core() -> ApiProfile {
    use ResourceKind::*;

    let kinds = vec![
        KindSpec::new(Buffer, "create_buffer", "delete_buffer").with_refresh(RefreshHook::new(
            "buffer_data",
            RefreshOp::Contents,
            HandleSource::BindingOfTarget(0),
        )),
        KindSpec::new(Shader, "create_shader", "delete_shader")
            .with_refresh(RefreshHook::new("shader_source", RefreshOp::Source, HandleSource::Arg(0)))
            .with_refresh(RefreshHook::new(
                "compile_shader",
                RefreshOp::Parameters,
                HandleSource::Arg(0),
            )),
        KindSpec::new(Program, "create_program", "delete_program")
            .with_refresh(RefreshHook::new(
                "attach_shader",
                RefreshOp::Parameters,
                HandleSource::Arg(0),
            ))
            .with_refresh(RefreshHook::new(
                "link_program",
                RefreshOp::Attributes,
                HandleSource::Arg(0),
            ))
            .with_refresh(RefreshHook::new(
                "link_program",
                RefreshOp::Uniforms,
                HandleSource::Arg(0),
            )),
        KindSpec::new(Texture, "create_texture", "delete_texture")
            .with_refresh(RefreshHook::new(
                "tex_image_2d",
                RefreshOp::Contents,
                HandleSource::BindingOfTarget(0),
            ))
            .with_refresh(RefreshHook::new(
                "tex_parameter",
                RefreshOp::Parameters,
                HandleSource::BindingOfTarget(0),
            )),
        KindSpec::new(Framebuffer, "create_framebuffer", "delete_framebuffer").with_refresh(
            RefreshHook::new(
                "framebuffer_texture",
                RefreshOp::Parameters,
                HandleSource::Binding("FRAMEBUFFER_BINDING".to_string()),
            ),
        ),
        KindSpec::new(VertexArray, "create_vertex_array", "delete_vertex_array"),
    ];

    let tables = vec![
        TableSpec::new(
            "bind points",
            vec![
                StateEntry::reference(
                    "ARRAY_BUFFER_BINDING",
                    Buffer,
                    &["bind_buffer"],
                    "Buffer used as the source for vertex data.",
                ),
                StateEntry::reference(
                    "ELEMENT_ARRAY_BUFFER_BINDING",
                    Buffer,
                    &["bind_buffer"],
                    "Buffer holding element indices.",
                ),
                StateEntry::reference(
                    "TEXTURE_2D_BINDING",
                    Texture,
                    &["bind_texture"],
                    "Texture bound to the active unit's 2D target.",
                ),
                StateEntry::reference(
                    "FRAMEBUFFER_BINDING",
                    Framebuffer,
                    &["bind_framebuffer"],
                    "Render target; the canvas when unbound.",
                ),
                StateEntry::reference(
                    "VERTEX_ARRAY_BINDING",
                    VertexArray,
                    &["bind_vertex_array"],
                    "Current vertex array object.",
                ),
            ],
        ),
        TableSpec::new(
            "program state",
            vec![StateEntry::reference(
                "CURRENT_PROGRAM",
                Program,
                &["use_program"],
                "Program used by draw calls.",
            )],
        ),
        TableSpec::new(
            "draw state",
            vec![
                StateEntry::plain(
                    "VIEWPORT",
                    &["set_viewport"],
                    "Destination rectangle for rendering.",
                ),
                StateEntry::plain(
                    "COLOR_CLEAR_VALUE",
                    &["clear_color"],
                    "Color written by clear().",
                ),
            ],
        ),
    ];

    ApiProfile {
        name: "webgl-core".to_string(),
        kinds,
        tables,
        defaults: vec![DefaultObject { kind: Framebuffer, display_name: "canvas".to_string() }],
        passthrough: vec!["draw_arrays".to_string(), "clear".to_string()],
    }
}

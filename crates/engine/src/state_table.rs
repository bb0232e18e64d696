//! Declarative, positional state mirrors with change-diffing.
//!
//! A table is declared once from an ordered spec and then only ever
//! refreshed: each row re-queries its value, re-formats it, and is touched
//! only if the rendered text differs from what is already on screen (the
//! previous frame's text is the diff baseline). Reference-valued rows also
//! own at most one connector edge each, re-keyed whenever the reference
//! changes.
//!
//! Row *i* always corresponds to spec entry *i*. Rows are never looked up
//! by key.

use crate::api::{ApiCall, ApiValue, Device, Handle, ResourceKind};
use crate::connector::ConnectorManager;
use crate::events::SessionEvent;
use crate::panel::{AnchorId, PanelId, PanelKind};
use crate::registry::Registry;
use crate::surface::Surface;

use statescope_core::RouteOptions;

/// How a row obtains its current value.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Read a named parameter from the device (non-intercepting).
    Parameter(String),
    /// A fixed value; for rows that document static limits.
    Const(ApiValue),
}

/// How a row renders its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Format {
    /// The value is a resource reference of this kind: render through the
    /// registry and maintain an edge to the referenced resource's panel.
    Reference(ResourceKind),
    /// Render with the value's own display form.
    Plain,
    /// The value is an API constant; render its name.
    Enumerant,
}

/// One row of a state table spec.
#[derive(Debug, Clone)]
pub struct StateEntry {
    pub key: String,
    pub query: Query,
    pub format: Format,
    /// Entry points whose interception triggers a refresh of this table.
    pub setters: Vec<String>,
    pub help: String,
}

impl StateEntry {
    /// A reference-valued row whose query parameter shares its key.
    pub fn reference(key: &str, kind: ResourceKind, setters: &[&str], help: &str) -> Self {
        Self {
            key: key.to_string(),
            query: Query::Parameter(key.to_string()),
            format: Format::Reference(kind),
            setters: setters.iter().map(|s| s.to_string()).collect(),
            help: help.to_string(),
        }
    }

    /// A plain-valued row whose query parameter shares its key.
    pub fn plain(key: &str, setters: &[&str], help: &str) -> Self {
        Self {
            key: key.to_string(),
            query: Query::Parameter(key.to_string()),
            format: Format::Plain,
            setters: setters.iter().map(|s| s.to_string()).collect(),
            help: help.to_string(),
        }
    }

    /// An enumerant-valued row whose query parameter shares its key.
    pub fn enumerant(key: &str, setters: &[&str], help: &str) -> Self {
        Self {
            key: key.to_string(),
            query: Query::Parameter(key.to_string()),
            format: Format::Enumerant,
            setters: setters.iter().map(|s| s.to_string()).collect(),
            help: help.to_string(),
        }
    }
}

/// An ordered list of state entries under one title.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub title: String,
    pub entries: Vec<StateEntry>,
}

impl TableSpec {
    pub fn new(title: &str, entries: Vec<StateEntry>) -> Self {
        Self { title: title.to_string(), entries }
    }
}

/// Everything a refresh needs besides the table itself. The session
/// assembles this from disjoint borrows of its own fields.
pub struct RefreshCx<'a> {
    pub device: &'a mut dyn Device,
    pub registry: &'a Registry,
    pub connector: &'a mut ConnectorManager,
    pub surface: &'a mut dyn Surface,
    pub events: &'a mut Vec<SessionEvent>,
    /// This table's index in the session, for event payloads.
    pub table_index: usize,
}

#[derive(Debug)]
struct RowState {
    anchor: AnchorId,
    /// Last rendered text; the diff baseline.
    text: String,
    /// The edge owned by this row, if its current value references a
    /// resource with a live panel.
    edge: Option<crate::connector::EdgeId>,
    /// Effective reference behind that edge: (handle, target panel).
    target: Option<(Handle, PanelId)>,
}

/// A live table: the spec plus per-row render state.
pub struct StateTable {
    spec: TableSpec,
    panel: PanelId,
    rows: Vec<RowState>,
}

impl StateTable {
    /// Build the table's panel and rows. No values are queried yet; the
    /// caller follows up with one silent `refresh`.
    pub fn declare(spec: TableSpec, surface: &mut dyn Surface) -> Self {
        let panel = surface.create_panel(PanelKind::GlobalState, &spec.title);
        let rows = spec
            .entries
            .iter()
            .map(|entry| RowState {
                anchor: surface.add_row(panel, &entry.key),
                text: String::new(),
                edge: None,
                target: None,
            })
            .collect();
        Self { spec, panel, rows }
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn panel(&self) -> PanelId {
        self.panel
    }

    pub fn row_anchor(&self, row: usize) -> Option<AnchorId> {
        self.rows.get(row).map(|r| r.anchor)
    }

    /// Last rendered text of row `i`.
    pub fn row_text(&self, row: usize) -> Option<&str> {
        self.rows.get(row).map(|r| r.text.as_str())
    }

    /// The edge currently owned by row `i`, if any.
    pub fn row_edge(&self, row: usize) -> Option<crate::connector::EdgeId> {
        self.rows.get(row).and_then(|r| r.edge)
    }

    /// Help text for row `i`.
    pub fn row_help(&self, row: usize) -> Option<&str> {
        self.spec.entries.get(row).map(|e| e.help.as_str())
    }

    /// Whether any entry lists `entry` as a setter.
    pub fn reacts_to(&self, entry: &str) -> bool {
        self.spec.entries.iter().any(|e| e.setters.iter().any(|s| s == entry))
    }

    /// Re-query, re-format, and re-render every row; `flash` visually flags
    /// changed cells. Positional: row *i* gets exactly
    /// `format(query(entries[i]))`.
    pub fn refresh(&mut self, cx: &mut RefreshCx<'_>, flash: bool) {
        debug_assert_eq!(self.rows.len(), self.spec.entries.len());
        for i in 0..self.rows.len() {
            let entry = &self.spec.entries[i];
            let value = query_value(cx.device, &entry.query);
            let text = format_value(&value, &entry.format, cx.registry);

            let row = &mut self.rows[i];
            if text != row.text {
                cx.surface.set_cell_text(row.anchor, &text);
                if flash {
                    cx.surface.flash_cell(row.anchor);
                }
                cx.events.push(SessionEvent::CellChanged {
                    table: cx.table_index,
                    row: i,
                    text: text.clone(),
                    flashed: flash,
                });
                row.text = text;
            }

            if let Format::Reference(kind) = entry.format {
                let handle = value.as_handle().unwrap_or(Handle::NULL);
                let resolved = cx
                    .registry
                    .info_or_default(handle, kind)
                    .filter(|d| !d.deleted)
                    .filter(|d| cx.surface.panel_exists(d.panel))
                    .map(|d| (handle, d.panel));

                if row.target != resolved {
                    if let Some(old) = row.edge.take() {
                        cx.connector.remove(old, cx.surface);
                        cx.events.push(SessionEvent::EdgeRemoved { edge: old });
                    }
                    if let Some((handle, panel)) = resolved {
                        let color = cx.connector.color_for(handle, i);
                        let target_anchor = cx.surface.panel_anchor(panel);
                        let edge = cx.connector.add(
                            row.anchor,
                            target_anchor,
                            handle,
                            color,
                            RouteOptions::default(),
                        );
                        row.edge = Some(edge);
                        cx.events.push(SessionEvent::EdgeAdded { edge, target: handle });
                    }
                    row.target = resolved;
                }
            }
        }
    }

    /// Forget all render state (texts, edges). Edges themselves are the
    /// connector's to erase; this is used on session restart after the
    /// connector is cleared wholesale.
    pub fn reset_rows(&mut self) {
        for row in &mut self.rows {
            row.text.clear();
            row.edge = None;
            row.target = None;
        }
    }
}

fn query_value(device: &mut dyn Device, query: &Query) -> ApiValue {
    match query {
        Query::Parameter(name) => {
            let call = ApiCall::new("get_parameter", vec![ApiValue::Enum(name.clone())]);
            match device.invoke(&call) {
                Ok(value) => value,
                Err(fault) => {
                    log::warn!("state query failed: {fault}");
                    ApiValue::Unit
                }
            }
        }
        Query::Const(value) => value.clone(),
    }
}

fn format_value(value: &ApiValue, format: &Format, registry: &Registry) -> String {
    match format {
        Format::Reference(kind) => {
            registry.format_reference(value.as_handle().unwrap_or(Handle::NULL), *kind)
        }
        Format::Plain | Format::Enumerant => value.to_string(),
    }
}

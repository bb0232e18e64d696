//! Shared geometry types and the connector routing policy.
//!
//! This crate is deliberately free of engine knowledge: it knows about
//! rectangles, sides, and polyline paths, and how to route an edge between
//! two anchor rectangles clipped by their owning containers. The engine
//! queries the host for rectangles and delegates all path math here.

pub mod geom;
pub mod route;

pub use geom::{Point, Rect, Side, Size};
pub use route::{route_edge, EdgePath, RouteOptions};

//! Edge routing policy.
//!
//! Given the anchor rectangle and the clipping container rectangle at each
//! end, produce an orthogonal polyline from anchor to anchor:
//!
//! ```text
//! anchor ── container boundary ── stand-off ── elbow ── stand-off ── boundary ── anchor
//! ```
//!
//! The inner stubs (anchor to boundary) keep the line attached to the exact
//! cell even when the panel scrolls; the stand-off keeps the outer run clear
//! of the panel border; the elbow keeps every segment axis-aligned.
//!
//! The function is pure. Callers re-query rectangles and re-route on every
//! layout change instead of caching absolute coordinates.

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect, Side};

/// Routing options for one edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    /// Side of the source anchor/container the edge leaves through.
    pub start_side: Side,
    /// Side of the target anchor/container the edge enters through.
    pub end_side: Side,
    /// Stand-off distance outside each container boundary.
    pub offset: f32,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            start_side: Side::Right,
            end_side: Side::Left,
            offset: 8.0,
        }
    }
}

/// An ordered polyline in host layout space.
///
/// Consecutive points always differ, and no three consecutive points are
/// collinear (the router collapses both).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgePath {
    points: Vec<Point>,
}

impl EdgePath {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Total polyline length. Handy for tests and hit-testing hosts.
    pub fn length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
            .sum()
    }
}

/// Route one edge between two anchors.
///
/// `src_anchor`/`dst_anchor` are the exact endpoint rectangles (a table cell,
/// a panel header); `src_container`/`dst_container` are the owning panels'
/// clipping rectangles. Both ends are computed fresh on every call.
pub fn route_edge(
    src_anchor: Rect,
    src_container: Rect,
    dst_anchor: Rect,
    dst_container: Rect,
    opts: &RouteOptions,
) -> EdgePath {
    let start = src_anchor.side_midpoint(opts.start_side);
    let start_boundary = src_container.boundary_point(start, opts.start_side);
    let start_off = stand_off(start_boundary, opts.start_side, opts.offset);

    let end = dst_anchor.side_midpoint(opts.end_side);
    let end_boundary = dst_container.boundary_point(end, opts.end_side);
    let end_off = stand_off(end_boundary, opts.end_side, opts.offset);

    let mut points = vec![start, start_boundary, start_off];
    points.extend(elbow(start_off, opts.start_side, end_off, opts.end_side, opts.offset));
    points.push(end_off);
    points.push(end_boundary);
    points.push(end);

    EdgePath { points: simplify(points) }
}

fn stand_off(p: Point, side: Side, offset: f32) -> Point {
    let dir = side.outward();
    Point::new(p.x + dir.x * offset, p.y + dir.y * offset)
}

/// Intermediate corner points connecting the two stand-off points with
/// axis-aligned segments.
fn elbow(a: Point, a_side: Side, b: Point, b_side: Side, offset: f32) -> Vec<Point> {
    match (a_side.is_horizontal(), b_side.is_horizontal()) {
        // Horizontal exit, horizontal entry: vertical mid-run.
        (true, true) => {
            let x = run_coordinate(a.x, a_side, b.x, b_side, offset);
            vec![Point::new(x, a.y), Point::new(x, b.y)]
        }
        // Vertical exit, vertical entry: horizontal mid-run.
        (false, false) => {
            let y = run_coordinate(a.y, a_side, b.y, b_side, offset);
            vec![Point::new(a.x, y), Point::new(b.x, y)]
        }
        // Mixed: one corner is enough.
        (true, false) => vec![Point::new(b.x, a.y)],
        (false, true) => vec![Point::new(a.x, b.y)],
    }
}

/// Pick the coordinate of the straight mid-run between two parallel exits.
///
/// When the sides face each other the run sits halfway between them; when
/// both point the same way the run wraps around past the farther exit.
fn run_coordinate(a: f32, a_side: Side, b: f32, b_side: Side, offset: f32) -> f32 {
    let a_positive = matches!(a_side, Side::Right | Side::Bottom);
    let b_positive = matches!(b_side, Side::Right | Side::Bottom);
    match (a_positive, b_positive) {
        // Facing pairs: Right→Left / Bottom→Top and the reverse.
        (true, false) if a <= b => (a + b) / 2.0,
        (false, true) if b <= a => (a + b) / 2.0,
        // Same direction, or facing but overlapping: wrap outside both.
        (true, _) | (_, true) => a.max(b) + offset,
        (false, false) => a.min(b) - offset,
    }
}

/// Drop repeated points and merge collinear runs.
fn simplify(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() == Some(&p) {
            continue;
        }
        if out.len() >= 2 {
            let a = out[out.len() - 2];
            let b = out[out.len() - 1];
            let collinear = (a.x == b.x && b.x == p.x) || (a.y == b.y && b.y == p.y);
            if collinear {
                let last = out.len() - 1;
                out[last] = p;
                continue;
            }
        }
        out.push(p);
    }
    out
}

//! Points, sizes, rectangles, and rectangle sides.
//!
//! All coordinates are in the host's layout space (pixels for a DOM or
//! canvas host, cells for a terminal host). The engine never interprets
//! the unit; it only threads these values between the host and the router.

use serde::{Deserialize, Serialize};

/// A point in host layout space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[inline]
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// One side of a rectangle. Used to pick where an edge leaves or enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    /// True for Left/Right (edge travels horizontally away from this side).
    #[inline]
    pub fn is_horizontal(self) -> bool {
        matches!(self, Side::Left | Side::Right)
    }

    /// Unit vector pointing away from a rectangle through this side.
    #[inline]
    pub fn outward(self) -> Point {
        match self {
            Side::Left => Point::new(-1.0, 0.0),
            Side::Right => Point::new(1.0, 0.0),
            Side::Top => Point::new(0.0, -1.0),
            Side::Bottom => Point::new(0.0, 1.0),
        }
    }
}

/// An axis-aligned rectangle (origin at top-left, y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Midpoint of the given side.
    pub fn side_midpoint(&self, side: Side) -> Point {
        let c = self.center();
        match side {
            Side::Left => Point::new(self.left(), c.y),
            Side::Right => Point::new(self.right(), c.y),
            Side::Top => Point::new(c.x, self.top()),
            Side::Bottom => Point::new(c.x, self.bottom()),
        }
    }

    /// Project `p` onto this rectangle's boundary on the given side.
    ///
    /// The cross-axis coordinate is clamped to the rectangle's span, so an
    /// anchor scrolled past the container edge still exits through the
    /// container, not outside it.
    pub fn boundary_point(&self, p: Point, side: Side) -> Point {
        match side {
            Side::Left => Point::new(self.left(), clamp(p.y, self.top(), self.bottom())),
            Side::Right => Point::new(self.right(), clamp(p.y, self.top(), self.bottom())),
            Side::Top => Point::new(clamp(p.x, self.left(), self.right()), self.top()),
            Side::Bottom => Point::new(clamp(p.x, self.left(), self.right()), self.bottom()),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.top() && p.y <= self.bottom()
    }
}

#[inline]
fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
    v.max(lo).min(hi)
}

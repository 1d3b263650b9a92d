/// geometry.rs
/// -----------
/// Mesh vertices and the numerical predicates the triangulation is built
/// on: signed area, counterclockwise orientation, point-in-triangle,
/// in-circumcircle and point-on-segment tests. Everything operates on
/// double precision with an absolute tolerance of `EPS`; the grid
/// coordinates themselves are exact integers.
use nalgebra::{Point2, Point3, Vector2};

use crate::quadedge::EdgeId;

/// Absolute tolerance for the floating-point predicates.
pub const EPS: f64 = 1e-6;

/// A mesh vertex: an integer grid position plus an elevation.
///
/// A `z` of exactly `0.0` means "take the elevation from the grid when the
/// vertex is inserted"; callers who need a literal zero elevation get it
/// anyway on DEMs whose cell value there is zero.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
    pub z: f64,
    // One outgoing edge, maintained as a convenience hint. Any incident
    // outgoing edge is valid here, and deletion may clear it.
    pub(crate) edge: Option<EdgeId>,
}

impl Vertex {
    /// A vertex whose elevation is resolved from the grid on insertion.
    pub fn new(x: i32, y: i32) -> Self {
        Vertex {
            x,
            y,
            z: 0.0,
            edge: None,
        }
    }

    pub fn with_elevation(x: i32, y: i32, z: f64) -> Self {
        Vertex { x, y, z, edge: None }
    }

    /// The projected position as a float point.
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }

    pub fn point3(&self) -> Point3<f64> {
        Point3::new(self.x as f64, self.y as f64, self.z)
    }

    pub fn grid_position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// One outgoing quad-edge, if the vertex is connected.
    pub fn edge(&self) -> Option<EdgeId> {
        self.edge
    }
}

/// Twice the signed area of the triangle `(v0, v1, v2)`. Positive iff the
/// vertices wind counterclockwise.
pub fn triangle_area(v0: &Vertex, v1: &Vertex, v2: &Vertex) -> f64 {
    let u: Vector2<f64> = v1.position() - v0.position();
    let v: Vector2<f64> = v2.position() - v0.position();
    u.perp(&v)
}

pub fn ccw(v0: &Vertex, v1: &Vertex, v2: &Vertex) -> bool {
    triangle_area(v0, v1, v2) > 0.0
}

/// Closed point-in-triangle test: points on the boundary count as inside.
pub fn in_triangle(p: &Vertex, v0: &Vertex, v1: &Vertex, v2: &Vertex) -> bool {
    triangle_area(v0, v1, p) >= 0.0
        && triangle_area(v1, v2, p) >= 0.0
        && triangle_area(v2, v0, p) >= 0.0
}

/// Is `p` strictly inside the circumcircle of `(v0, v1, v2)`?
///
/// The comparison is strict against `EPS` so that near-cocircular
/// configurations do not oscillate between flips.
pub fn in_circle(p: &Vertex, v0: &Vertex, v1: &Vertex, v2: &Vertex) -> bool {
    let sq = |v: &Vertex| (v.x as f64).powi(2) + (v.y as f64).powi(2);
    sq(v0) * triangle_area(v1, v2, p) - sq(v1) * triangle_area(v0, v2, p)
        + sq(v2) * triangle_area(v0, v1, p)
        - sq(p) * triangle_area(v0, v1, v2)
        > EPS
}

/// Does `p` lie on the closed segment from `a` to `b`?
///
/// True if `p` is within `EPS` of an endpoint, or if it projects between
/// the endpoints and sits within `EPS` of the carrying line.
pub fn on_edge(p: &Vertex, a: &Vertex, b: &Vertex) -> bool {
    let t1 = (p.position() - a.position()).norm();
    let t2 = (p.position() - b.position()).norm();
    if t1 < EPS || t2 < EPS {
        return true;
    }
    let t3 = (a.position() - b.position()).norm();
    if t1 > t3 || t2 > t3 {
        return false;
    }
    Line::through(a, b).evaluate(p).abs() < EPS
}

/// Does `p` lie strictly inside the diametral circle of the segment
/// `(a, b)`? Endpoints never encroach their own segment.
pub fn encroaches(p: &Vertex, a: &Vertex, b: &Vertex) -> bool {
    if p.grid_position() == a.grid_position() || p.grid_position() == b.grid_position() {
        return false;
    }
    let u: Vector2<f64> = a.position() - p.position();
    let v: Vector2<f64> = b.position() - p.position();
    u.dot(&v) <= 0.0
}

/// A normalised 2D line `a*x + b*y + c = 0` with `a^2 + b^2 = 1`, so that
/// `evaluate` returns the signed Euclidean distance to the line.
pub struct Line {
    a: f64,
    b: f64,
    c: f64,
}

impl Line {
    /// The line through two distinct vertices.
    pub fn through(v0: &Vertex, v1: &Vertex) -> Self {
        let t: Vector2<f64> = v1.position() - v0.position();
        let len = t.norm();
        debug_assert!(len > 0.0, "line through coincident vertices");
        let a = t.y / len;
        let b = -t.x / len;
        Line {
            a,
            b,
            c: -(a * v0.x as f64 + b * v0.y as f64),
        }
    }

    /// Signed distance from the vertex to the line.
    pub fn evaluate(&self, v: &Vertex) -> f64 {
        self.a * v.x as f64 + self.b * v.y as f64 + self.c
    }
}

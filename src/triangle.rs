/// triangle.rs
/// -----------
/// Triangle records and the history DAG they form. Triangles are allocated
/// from an append-only arena: a triangle that is superseded by an
/// insertion or an edge flip keeps its vertex triple and its `children`
/// list (point location needs both) but loses its anchor, which is what
/// marks it dead. Nothing in the arena is ever freed.
use crate::error::TinError;
use crate::geometry::{triangle_area, Vertex};
use crate::heap::HeapHandle;
use crate::quadedge::{EdgeId, EdgePool, VertexId};

pub type TriangleId = usize;

/// The plane `z = a*x + b*y + c` through a triangle's three vertices.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Plane {
    /// Fit the plane through three vertices with non-degenerate projected
    /// area.
    pub fn through(v0: &Vertex, v1: &Vertex, v2: &Vertex) -> Result<Plane, TinError> {
        let ux = (v1.x - v0.x) as f64;
        let uy = (v1.y - v0.y) as f64;
        let uz = v1.z - v0.z;
        let vx = (v2.x - v0.x) as f64;
        let vy = (v2.y - v0.y) as f64;
        let vz = v2.z - v0.z;

        let den = ux * vy - uy * vx;
        if den == 0.0 {
            return Err(TinError::Invariant("plane fit over a degenerate triangle"));
        }
        let a = (uz * vy - uy * vz) / den;
        let b = (ux * vz - uz * vx) / den;
        let c = v0.z - a * v0.x as f64 - b * v0.y as f64;
        Ok(Plane { a, b, c })
    }

    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }
}

/// One node of the triangulation history. Live nodes are the current mesh
/// faces; dead nodes persist for point location.
#[derive(Debug, Clone)]
pub struct Triangle {
    pub(crate) vertices: [VertexId; 3],
    pub(crate) anchor: Option<EdgeId>,
    pub(crate) area: f64,
    pub(crate) plane: Plane,
    // The grid cell inside this triangle with the largest vertical error,
    // and that error. None when no available cell was found by the scan.
    pub(crate) candidate: Option<(i32, i32)>,
    pub(crate) candidate_error: f64,
    // Heap residency: Some(handle) while queued for refinement.
    pub(crate) heap: Option<HeapHandle>,
    pub(crate) children: Vec<TriangleId>,
}

impl Triangle {
    /// Build the triangle whose anchor is `e`: vertices are the origin and
    /// destination of `e` plus the apex of its left face, in CCW order.
    pub(crate) fn around(
        pool: &EdgePool,
        verts: &[Vertex],
        e: EdgeId,
    ) -> Result<Triangle, TinError> {
        let a = pool
            .origin(e)
            .ok_or(TinError::Invariant("anchor edge is missing an origin"))?;
        let b = pool
            .destination(e)
            .ok_or(TinError::Invariant("anchor edge is missing an endpoint"))?;
        let c = pool
            .origin(pool.l_prev(e))
            .ok_or(TinError::Invariant("anchor edge is missing an apex"))?;

        let area = triangle_area(&verts[a], &verts[b], &verts[c]);
        let plane = Plane::through(&verts[a], &verts[b], &verts[c])?;

        Ok(Triangle {
            vertices: [a, b, c],
            anchor: Some(e),
            area,
            plane,
            candidate: None,
            candidate_error: f64::MIN,
            heap: None,
            children: Vec::new(),
        })
    }

    pub fn is_live(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor(&self) -> Option<EdgeId> {
        self.anchor
    }

    pub fn vertex_indices(&self) -> [VertexId; 3] {
        self.vertices
    }

    /// Twice the signed projected area.
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn plane(&self) -> Plane {
        self.plane
    }

    /// The worst-error grid cell found by the last scan, with its error.
    pub fn candidate(&self) -> Option<((i32, i32), f64)> {
        self.candidate.map(|cell| (cell, self.candidate_error))
    }

    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        self.plane.interpolate(x, y)
    }
}

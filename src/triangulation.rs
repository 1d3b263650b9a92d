/// triangulation.rs
/// -----------
/// Greedy-insertion refinement of a raster elevation grid into a TIN,
/// after Garland and Heckbert's sequential algorithm. The mesh starts as
/// the two corner triangles of the grid rectangle; each refinement step
/// pops the triangle whose worst grid cell deviates most from its plane,
/// inserts that cell as a vertex, restores the Delaunay criterion with
/// local edge flips and requeues the triangles the insertion touched.
use ahash::{AHashMap, AHashSet};
use log::{debug, trace};
use nalgebra::{Affine2, DMatrix};

use crate::availability::AvailabilityMask;
use crate::error::TinError;
use crate::geometry::{ccw, in_circle, in_triangle, on_edge, Vertex};
use crate::heap::{CandidateHeap, HeapEntry};
use crate::quadedge::{EdgeId, EdgePool, VertexId};
use crate::scan;
use crate::triangle::{Triangle, TriangleId};

// Root of the triangle history: a sentinel whose children are the two
// corner triangles of the initial rectangle.
const ROOT: TriangleId = 0;

pub struct Triangulation {
    dem: DMatrix<f64>,
    affine: Option<Affine2<f64>>,
    minimum_gap: u32,
    max_x: i32,
    max_y: i32,
    verts: Vec<Vertex>,
    pool: EdgePool,
    edge_registry: AHashMap<u32, EdgeId>,
    next_edge_id: u32,
    tris: Vec<Triangle>,
    heap: CandidateHeap,
    available: AvailabilityMask,
    base: EdgeId,
}

impl Triangulation {
    pub const DEFAULT_MINIMUM_GAP: u32 = 5;

    /// Triangulate the four corners of a DEM, ready for refinement.
    /// `minimum_gap` is the least pixel distance the refinement keeps
    /// between mesh vertices.
    pub fn new(dem: DMatrix<f64>, minimum_gap: u32) -> Result<Self, TinError> {
        Self::build(dem, minimum_gap, None)
    }

    /// Like [`Triangulation::new`], with a georeferencing transform that is
    /// applied to projected coordinates on export.
    pub fn with_affine(
        dem: DMatrix<f64>,
        minimum_gap: u32,
        affine: Affine2<f64>,
    ) -> Result<Self, TinError> {
        Self::build(dem, minimum_gap, Some(affine))
    }

    fn build(
        dem: DMatrix<f64>,
        minimum_gap: u32,
        affine: Option<Affine2<f64>>,
    ) -> Result<Self, TinError> {
        let (rows, cols) = dem.shape();
        if rows < 2 || cols < 2 {
            return Err(TinError::Invariant(
                "the DEM needs at least two rows and two columns",
            ));
        }
        let max_x = cols as i32 - 1;
        let max_y = rows as i32 - 1;
        debug!("triangulating a {cols}x{rows} grid, minimum gap {minimum_gap}");

        let mut verts = vec![
            Vertex::with_elevation(0, 0, dem[(0, 0)]),
            Vertex::with_elevation(max_x, 0, dem[(0, cols - 1)]),
            Vertex::with_elevation(max_x, max_y, dem[(rows - 1, cols - 1)]),
            Vertex::with_elevation(0, max_y, dem[(rows - 1, 0)]),
        ];

        // boundary rectangle plus one diagonal
        let mut pool = EdgePool::new();
        let q0 = pool.make_edge(&mut verts, 0, 1);
        let q1 = pool.make_edge(&mut verts, 2, 3);
        let q2 = pool.make_edge(&mut verts, 3, 0);
        let q3 = pool.make_edge(&mut verts, 1, 2);
        let q4 = pool.make_edge(&mut verts, 1, 3);

        pool.splice(q0.sym(), q4);
        pool.splice(q4.sym(), q2);
        pool.splice(q2.sym(), q0);
        pool.splice(q0.sym(), q3);
        pool.splice(q3.sym(), q1);
        pool.splice(q1.sym(), q4.sym());

        // Candidates may not crowd the boundary, but the boundary line
        // itself stays eligible so its edges can still be split.
        let gap = minimum_gap as f64;
        let mut available = AvailabilityMask::new(rows, cols);
        let boundary: [(VertexId, VertexId); 4] = [(0, 1), (2, 3), (3, 0), (1, 2)];
        for &(a, b) in &boundary {
            available.mark_segment(&verts[a], &verts[b], gap, false);
        }
        for v in 0..4 {
            available.mark_cell(verts[v].x, verts[v].y, gap, false);
        }
        for &(a, b) in &boundary {
            available.mark_segment(&verts[a], &verts[b], 0.0, true);
        }

        let mut tin = Triangulation {
            dem,
            affine,
            minimum_gap,
            max_x,
            max_y,
            verts,
            pool,
            edge_registry: AHashMap::new(),
            next_edge_id: 0,
            tris: Vec::new(),
            heap: CandidateHeap::new(),
            available,
            base: q0,
        };
        for e in [q0, q1, q2, q3, q4] {
            tin.register_edge(e);
        }

        let root = Triangle::around(&tin.pool, &tin.verts, tin.base)?;
        tin.tris.push(Triangle {
            anchor: None,
            ..root
        });
        let lower = tin.make_triangle(q4)?;
        let upper = tin.make_triangle(q4.sym())?;
        tin.tris[ROOT].children.extend([lower, upper]);
        tin.enqueue(lower);
        tin.enqueue(upper);

        Ok(tin)
    }

    // -- accessors ---------------------------------------------------------

    pub fn dem(&self) -> &DMatrix<f64> {
        &self.dem
    }

    pub fn affine(&self) -> Option<&Affine2<f64>> {
        self.affine.as_ref()
    }

    pub fn minimum_gap(&self) -> u32 {
        self.minimum_gap
    }

    /// All mesh vertices, in insertion order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.verts
    }

    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    /// The current mesh faces.
    pub fn triangles(&self) -> impl Iterator<Item = &Triangle> {
        self.tris.iter().filter(|t| t.is_live())
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles().count()
    }

    /// The undirected edges of the current mesh, in no particular order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edge_registry.values().copied()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_registry.len()
    }

    // -- point location ----------------------------------------------------

    /// Walk the triangle history from the root down to the live triangle
    /// containing `v`, returning its anchor edge. `None` means the point
    /// escaped the walk (outside the rectangle, or a numerical miss on a
    /// boundary), which callers treat as "nothing to do".
    pub fn locate(&self, v: &Vertex) -> Option<EdgeId> {
        let mut node = ROOT;
        while !self.tris[node].children.is_empty() {
            let mut descend = None;
            for &child in &self.tris[node].children {
                let [a, b, c] = self.tris[child].vertices;
                if in_triangle(v, &self.verts[a], &self.verts[b], &self.verts[c]) {
                    descend = Some(child);
                    break;
                }
            }
            match descend {
                Some(child) => node = child,
                None => {
                    debug!("point ({}, {}) is not in the triangulation", v.x, v.y);
                    return None;
                }
            }
        }
        self.tris[node].anchor
    }

    // -- refinement --------------------------------------------------------

    /// Insert a vertex, keep the heap coherent with the triangles that were
    /// created and destroyed. Use this to force vertices the refinement
    /// would not pick on its own, e.g. along boundaries.
    pub fn insert_point(&mut self, v: Vertex, hint: Option<EdgeId>) -> Result<(), TinError> {
        let (created, deleted) = self.insert_site(v, hint)?;
        self.reconcile(&created, &deleted);
        Ok(())
    }

    /// One greedy refinement step: insert the worst candidate of the whole
    /// mesh. Returns that candidate's error and the new vertex count; the
    /// caller decides when to stop.
    pub fn insert_next(&mut self) -> Result<(f64, usize), TinError> {
        let (error, entry) = self
            .heap
            .pop_max()
            .ok_or(TinError::Invariant("the refinement heap is exhausted"))?;
        self.tris[entry.triangle].heap = None;

        let Some((x, y)) = entry.candidate else {
            // no available cell was left in the popped triangle
            return Ok((error, self.verts.len()));
        };
        trace!("refining at ({x}, {y}), error {error}");

        let (created, deleted) = self.insert_site(Vertex::new(x, y), None)?;
        self.reconcile(&created, &deleted);
        Ok((error, self.verts.len()))
    }

    /// Insert a site into the mesh, maintaining the Delaunay criterion.
    /// Returns the surviving new triangles and the superseded ones. A
    /// vertex coinciding with an existing one, or a point location miss,
    /// inserts nothing.
    fn insert_site(
        &mut self,
        mut v: Vertex,
        hint: Option<EdgeId>,
    ) -> Result<(Vec<TriangleId>, Vec<TriangleId>), TinError> {
        let mut created: Vec<TriangleId> = Vec::new();
        let mut deleted: Vec<TriangleId> = Vec::new();

        // Elevation defaults to the grid sample; the lookup also rejects
        // out-of-range coordinates before any state changes.
        let ground = self.sample(v.x, v.y)?;
        if v.z == 0.0 {
            v.z = ground;
        }

        let mut e = match hint {
            Some(h) => {
                let ln = self.pool.l_next(h);
                let lp = self.pool.l_prev(h);
                if self.right_of(&v, h) || self.right_of(&v, ln) || self.right_of(&v, lp) {
                    return Err(TinError::Invariant(
                        "hint edge does not bound the triangle containing the vertex",
                    ));
                }
                h
            }
            None => match self.locate(&v) {
                Some(found) => found,
                None => return Ok((created, deleted)),
            },
        };

        let apex = self.org(self.pool.l_prev(e));
        for corner in [self.org(e), self.dest(e), apex] {
            if (v.x, v.y) == self.verts[corner].grid_position() {
                // reinserting an existing vertex changes nothing
                return Ok((created, deleted));
            }
        }

        let mut boundary_edge = None;
        let parents: Vec<TriangleId>;
        if on_edge(&v, &self.verts[self.org(e)], &self.verts[self.dest(e)]) {
            if !self.right_of_id(self.dest(self.pool.o_prev(e)), e) {
                // the hull edge keeps its single face until the spokes are
                // in place, then dies
                parents = vec![self.face(e)?];
                boundary_edge = Some(e);
            } else {
                parents = vec![self.face(e)?, self.face(e.sym())?];
                e = self.pool.o_prev(e);
                let collinear = self.pool.o_next(e);
                self.delete_edge(collinear);
            }
        } else {
            parents = vec![self.face(e)?];
        }

        let (vx, vy) = (v.x, v.y);
        let vid = self.verts.len();
        self.verts.push(v);

        // First spoke from the hole boundary to the new site, then connect
        // around the hole until it closes on the starting spoke.
        let first_org = self.org(e);
        let spoke0 = self.pool.make_edge(&mut self.verts, first_org, vid);
        self.register_edge(spoke0);
        self.pool.splice(spoke0, e);
        let starting_spoke = spoke0;

        let mut spoke = self.pool.connect(&mut self.verts, e, spoke0.sym());
        self.register_edge(spoke);
        e = self.pool.o_prev(spoke);
        while self.pool.l_next(e) != starting_spoke {
            spoke = self.pool.connect(&mut self.verts, e, spoke.sym());
            self.register_edge(spoke);
            e = self.pool.o_prev(spoke);
        }

        if let Some(dying) = boundary_edge {
            // the mesh base may be the edge about to die; move it to an
            // edge that survives
            self.base = e;
            self.delete_edge(dying);
        }

        // New faces for every spoke whose left side closes a CCW triangle;
        // all of them supersede the parents in the history.
        let mut cur = starting_spoke;
        loop {
            cur = self.pool.d_next(cur);
            let across = self.dest(self.pool.o_next(cur));
            if self.left_of_id(across, cur) {
                let child = self.make_triangle(cur)?;
                created.push(child);
                for &p in &parents {
                    self.tris[p].children.push(child);
                }
            }
            if cur == starting_spoke {
                break;
            }
        }
        for &p in &parents {
            self.tris[p].anchor = None;
        }
        deleted.extend_from_slice(&parents);

        // Delaunay restoration: walk the hole boundary, flipping every
        // edge whose far apex invades the circumcircle. A hull edge or a
        // non-convex quadrilateral fails the right-of guard and simply
        // ends the cascade on that edge.
        loop {
            let t = self.pool.o_prev(e);
            let across = self.dest(t);
            let org = self.org(e);
            let dst = self.dest(e);
            if self.right_of_id(across, e)
                && in_circle(
                    &self.verts[vid],
                    &self.verts[org],
                    &self.verts[across],
                    &self.verts[dst],
                )
            {
                let pair = [self.face(e)?, self.face(e.sym())?];
                self.pool.swap(&mut self.verts, e);
                deleted.extend_from_slice(&pair);

                let c0 = self.make_triangle(e)?;
                let c1 = self.make_triangle(e.sym())?;
                created.push(c0);
                created.push(c1);
                for &p in &pair {
                    self.tris[p].children.push(c0);
                    self.tris[p].children.push(c1);
                    self.tris[p].anchor = None;
                }
                e = self.pool.o_prev(e);
            } else if self.pool.o_next(e) == starting_spoke {
                break;
            } else {
                e = self.pool.l_prev(self.pool.o_next(e));
            }
        }

        let dead: AHashSet<TriangleId> = deleted.iter().copied().collect();
        created.retain(|t| !dead.contains(t));

        self.available
            .mark_cell(vx, vy, self.minimum_gap as f64, false);
        Ok((created, deleted))
    }

    /// Drop the heap entries of superseded triangles and queue the new
    /// ones under their freshly scanned candidate errors.
    fn reconcile(&mut self, created: &[TriangleId], deleted: &[TriangleId]) {
        for &t in deleted {
            if let Some(handle) = self.tris[t].heap.take() {
                self.heap.delete(handle);
            }
        }
        for &t in created {
            self.enqueue(t);
        }
    }

    fn enqueue(&mut self, tid: TriangleId) {
        self.rescan(tid);
        let (error, candidate) = {
            let t = &self.tris[tid];
            (t.candidate_error, t.candidate)
        };
        let handle = self.heap.insert(
            error,
            HeapEntry {
                candidate,
                triangle: tid,
            },
        );
        self.tris[tid].heap = Some(handle);
    }

    /// Scan a triangle's cells for the available one with the worst
    /// vertical error against the triangle's plane.
    fn rescan(&mut self, tid: TriangleId) {
        let [a, b, c] = self.tris[tid].vertices;
        let pa = self.verts[a].grid_position();
        let pb = self.verts[b].grid_position();
        let pc = self.verts[c].grid_position();
        let plane = self.tris[tid].plane;

        let dem = &self.dem;
        let mask = &self.available;
        let mut best_error = f64::MIN;
        let mut best = None;
        scan::for_each_cell(pa, pb, pc, 0, self.max_x, |x, y| {
            if !mask.is_available(x, y) {
                return;
            }
            let fit = plane.interpolate(x as f64, y as f64);
            let error = (dem[(y as usize, x as usize)] - fit).abs();
            if error > best_error {
                best_error = error;
                best = Some((x, y));
            }
        });

        let t = &mut self.tris[tid];
        t.candidate = best;
        t.candidate_error = best_error;
    }

    // -- derived rasters ---------------------------------------------------

    /// The DEM-shaped raster of heights the current TIN interpolates.
    pub fn interpolated_map(&self) -> DMatrix<f64> {
        let mut out = self.dem.clone();
        for t in self.triangles() {
            let [a, b, c] = t.vertices;
            let plane = t.plane;
            scan::for_each_cell(
                self.verts[a].grid_position(),
                self.verts[b].grid_position(),
                self.verts[c].grid_position(),
                0,
                self.max_x,
                |x, y| {
                    out[(y as usize, x as usize)] = plane.interpolate(x as f64, y as f64);
                },
            );
        }
        out
    }

    /// Elementwise difference between the DEM and the TIN surface.
    pub fn error_map(&self) -> DMatrix<f64> {
        &self.dem - self.interpolated_map()
    }

    /// Write the mesh as a Wavefront OBJ file.
    pub fn write_obj(&self, path: impl AsRef<std::path::Path>) -> anyhow::Result<()> {
        crate::exchange::obj::write_obj(self, path)
    }

    // -- internals ---------------------------------------------------------

    fn sample(&self, x: i32, y: i32) -> Result<f64, TinError> {
        if x < 0 || y < 0 || x > self.max_x || y > self.max_y {
            return Err(TinError::OutOfRange { x, y });
        }
        Ok(self.dem[(y as usize, x as usize)])
    }

    fn org(&self, e: EdgeId) -> VertexId {
        self.pool.origin(e).expect("primal edge carries an origin")
    }

    fn dest(&self, e: EdgeId) -> VertexId {
        self.pool
            .destination(e)
            .expect("primal edge carries a destination")
    }

    fn face(&self, e: EdgeId) -> Result<TriangleId, TinError> {
        self.pool
            .left_face(e)
            .ok_or(TinError::Invariant("edge has no recorded left face"))
    }

    fn right_of(&self, v: &Vertex, e: EdgeId) -> bool {
        ccw(v, &self.verts[self.dest(e)], &self.verts[self.org(e)])
    }

    fn right_of_id(&self, v: VertexId, e: EdgeId) -> bool {
        ccw(
            &self.verts[v],
            &self.verts[self.dest(e)],
            &self.verts[self.org(e)],
        )
    }

    fn left_of_id(&self, v: VertexId, e: EdgeId) -> bool {
        ccw(
            &self.verts[v],
            &self.verts[self.org(e)],
            &self.verts[self.dest(e)],
        )
    }

    fn register_edge(&mut self, e: EdgeId) {
        let id = self.next_edge_id;
        self.next_edge_id += 1;
        self.pool.set_registry_id(e, Some(id));
        self.edge_registry.insert(id, e);
    }

    fn delete_edge(&mut self, e: EdgeId) {
        let o = self.org(e);
        let d = self.dest(e);
        let op = self.pool.o_prev(e);
        self.pool.splice(e, op);
        let ops = self.pool.o_prev(e.sym());
        self.pool.splice(e.sym(), ops);
        if let Some(id) = self.pool.registry_id(e) {
            self.edge_registry.remove(&id);
        }
        // the endpoints may be hinting at the edge we are releasing
        for v in [o, d] {
            if let Some(hint) = self.verts[v].edge() {
                if hint.bundle() == e.bundle() {
                    self.verts[v].edge = None;
                }
            }
        }
        self.pool.release(e);
    }

    /// Allocate a new live triangle anchored at `e` and record it on its
    /// three bounding edges.
    fn make_triangle(&mut self, e: EdgeId) -> Result<TriangleId, TinError> {
        let tri = Triangle::around(&self.pool, &self.verts, e)?;
        let tid = self.tris.len();
        self.tris.push(tri);
        self.pool.set_left_face(e, Some(tid));
        let ln = self.pool.l_next(e);
        self.pool.set_left_face(ln, Some(tid));
        let lp = self.pool.l_prev(e);
        self.pool.set_left_face(lp, Some(tid));
        Ok(tid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::EPS;

    fn degenerate_dem() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0])
    }

    fn gaussian(cx: f64, cy: f64, sigma: f64, x: f64, y: f64) -> f64 {
        (-((x - cx).powi(2) + (y - cy).powi(2)) / (2.0 * sigma * sigma)).exp()
    }

    // 240 x 180 rolling surface: one bump up, one bump down.
    fn rolling_dem() -> DMatrix<f64> {
        DMatrix::from_fn(180, 240, |r, c| {
            let (x, y) = (c as f64, r as f64);
            10.0 * (gaussian(170.0, 120.0, 40.0, x, y) - gaussian(60.0, 50.0, 30.0, x, y))
        })
    }

    // The worst available cell of a triangle, found the slow way.
    fn brute_candidate(tin: &Triangulation, tid: TriangleId) -> (f64, Option<(i32, i32)>) {
        let [a, b, c] = tin.tris[tid].vertices;
        let plane = tin.tris[tid].plane;
        let mut best = (f64::MIN, None);
        for y in 0..=tin.max_y {
            for x in 0..=tin.max_x {
                let p = Vertex::new(x, y);
                if !in_triangle(&p, &tin.verts[a], &tin.verts[b], &tin.verts[c]) {
                    continue;
                }
                if !tin.available.is_available(x, y) {
                    continue;
                }
                let fit = plane.interpolate(x as f64, y as f64);
                let error = (tin.dem[(y as usize, x as usize)] - fit).abs();
                if error > best.0 {
                    best = (error, Some((x, y)));
                }
            }
        }
        best
    }

    fn assert_delaunay(tin: &Triangulation) {
        for e in tin.edges().collect::<Vec<_>>() {
            let (Some(t1), Some(t2)) = (tin.pool.left_face(e), tin.pool.left_face(e.sym()))
            else {
                continue;
            };
            if !tin.tris[t1].is_live() || !tin.tris[t2].is_live() {
                continue;
            }
            let [a, b, c] = tin.tris[t1].vertices;
            let apex = tin.tris[t2]
                .vertices
                .iter()
                .copied()
                .find(|v| ![a, b, c].contains(v))
                .expect("opposite face has a vertex off the shared edge");
            assert!(
                !in_circle(
                    &tin.verts[apex],
                    &tin.verts[a],
                    &tin.verts[b],
                    &tin.verts[c]
                ),
                "vertex {apex} invades the circumcircle of triangle ({a}, {b}, {c})"
            );
        }
    }

    fn assert_heap_coherent(tin: &Triangulation) {
        let mut seen = Vec::new();
        for (tid, t) in tin.tris.iter().enumerate() {
            if !t.is_live() {
                continue;
            }
            let Some(handle) = t.heap else { continue };
            assert_eq!(tin.heap.key(handle), Some(t.candidate_error));
            let entry = tin.heap.entry(handle).expect("live triangle is queued");
            assert_eq!(entry.triangle, tid);
            assert_eq!(entry.candidate, t.candidate);
            assert!(!seen.contains(&handle), "two live triangles share a handle");
            seen.push(handle);
        }
    }

    #[test]
    fn test_initial_mesh() {
        let tin = Triangulation::new(degenerate_dem(), 0).unwrap();
        assert_eq!(tin.vertex_count(), 4);
        assert_eq!(tin.triangle_count(), 2);
        // four boundary edges plus the diagonal
        assert_eq!(tin.edge_count(), 5);
        // both faces wind counterclockwise and tile the rectangle
        let areas: Vec<f64> = tin.triangles().map(|t| t.area()).collect();
        assert!(areas.iter().all(|&a| a > 0.0));
        assert_eq!(areas.iter().sum::<f64>(), 2.0 * 2.0 * 2.0);
        assert_heap_coherent(&tin);
    }

    #[test]
    fn test_rejects_degenerate_grid() {
        assert!(Triangulation::new(DMatrix::from_element(1, 5, 0.0), 0).is_err());
    }

    #[test]
    fn test_initial_candidates_match_scan() {
        // zero plain with one bump in each corner triangle
        let mut dem = DMatrix::from_element(5, 5, 0.0);
        dem[(1, 1)] = 1.0;
        dem[(3, 3)] = 2.0;
        let mut tin = Triangulation::new(dem, 0).unwrap();

        for tid in [1, 2] {
            let (error, candidate) = brute_candidate(&tin, tid);
            assert_eq!(tin.tris[tid].candidate_error, error);
            assert_eq!(tin.tris[tid].candidate, candidate);
        }
        assert_eq!(tin.tris[1].candidate, Some((1, 1)));
        assert_eq!(tin.tris[1].candidate_error, 1.0);
        assert_eq!(tin.tris[2].candidate, Some((3, 3)));
        assert_eq!(tin.tris[2].candidate_error, 2.0);

        // the greedy step picks the larger of the two
        let (error, vertex_count) = tin.insert_next().unwrap();
        assert_eq!(error, 2.0);
        assert_eq!(vertex_count, 5);
        assert_eq!(tin.vertices()[4].grid_position(), (3, 3));
    }

    #[test]
    fn test_degenerate_grid_converges_exactly() {
        let dem = degenerate_dem();
        let mut tin = Triangulation::new(dem.clone(), 0).unwrap();

        let mut errors = Vec::new();
        while tin.heap.max().map(|(key, _)| key).unwrap() > EPS {
            let (error, _) = tin.insert_next().unwrap();
            errors.push(error);
        }

        // greedy errors never increase
        for pair in errors.windows(2) {
            assert!(pair[1] <= pair[0] + EPS, "error went up: {pair:?}");
        }

        // the final surface reproduces every grid cell
        let interpolated = tin.interpolated_map();
        for r in 0..3 {
            for c in 0..3 {
                assert!(
                    (interpolated[(r, c)] - dem[(r, c)]).abs() <= EPS,
                    "cell ({c}, {r}) interpolates to {} instead of {}",
                    interpolated[(r, c)],
                    dem[(r, c)]
                );
            }
        }
        let residual = tin.error_map();
        assert!(residual.iter().all(|e| e.abs() <= EPS));

        assert_delaunay(&tin);
        assert_heap_coherent(&tin);
    }

    #[test]
    fn test_rolling_surface_stays_within_budget() {
        let mut tin = Triangulation::new(rolling_dem(), 5).unwrap();

        let first_error = tin.heap.max().map(|(key, _)| key).unwrap();
        let (last_error, vertex_count) = loop {
            let (error, count) = tin.insert_next().unwrap();
            if count >= 100 || error <= 5.0 {
                break (error, count);
            }
        };

        assert!(vertex_count <= 100);
        assert!(last_error <= first_error);
        assert_delaunay(&tin);
        assert_heap_coherent(&tin);

        // the refinement kept its spacing promise away from the corners
        let corners: Vec<(i32, i32)> = tin.vertices()[..4]
            .iter()
            .map(|v| v.grid_position())
            .collect();
        let spaced: Vec<(i32, i32)> = tin
            .vertices()
            .iter()
            .map(|v| v.grid_position())
            .filter(|p| !corners.contains(p))
            .collect();
        for (i, &(ax, ay)) in spaced.iter().enumerate() {
            for &(bx, by) in &spaced[i + 1..] {
                let d2 = (ax - bx).pow(2) + (ay - by).pow(2);
                assert!(d2 >= 25, "vertices ({ax}, {ay}) and ({bx}, {by}) are too close");
            }
        }
    }

    #[test]
    fn test_forced_boundary_vertices() {
        let dem = DMatrix::from_fn(100, 100, |r, c| (r + c) as f64 * 0.25);
        let mut tin = Triangulation::new(dem, 0).unwrap();

        let mut forced = Vec::new();
        for i in 1..=10 {
            let p = i * 9;
            forced.extend([(p, 0), (p, 99), (0, p), (99, p)]);
        }
        for &(x, y) in &forced {
            tin.insert_point(Vertex::new(x, y), None).unwrap();
        }

        let positions: Vec<(i32, i32)> = tin.vertices().iter().map(|v| v.grid_position()).collect();
        for cell in &forced {
            assert!(positions.contains(cell), "forced vertex {cell:?} is missing");
        }
        assert_eq!(tin.vertex_count(), 4 + forced.len());

        assert_delaunay(&tin);
        assert_heap_coherent(&tin);

        // the mesh still tiles the full rectangle
        let total: f64 = tin.triangles().map(|t| t.area()).sum();
        assert!((total - 2.0 * 99.0 * 99.0).abs() < EPS);
    }

    #[test]
    fn test_out_of_range_insert_leaves_state_alone() {
        let mut tin = Triangulation::new(degenerate_dem(), 0).unwrap();
        let vertices = tin.vertex_count();
        let triangles = tin.triangle_count();
        let heap_len = tin.heap.len();

        let result = tin.insert_point(Vertex::new(3, 3), None);
        assert!(matches!(result, Err(TinError::OutOfRange { x: 3, y: 3 })));

        assert_eq!(tin.vertex_count(), vertices);
        assert_eq!(tin.triangle_count(), triangles);
        assert_eq!(tin.heap.len(), heap_len);
    }

    #[test]
    fn test_reinserting_a_vertex_changes_nothing() {
        let mut tin = Triangulation::new(degenerate_dem(), 0).unwrap();
        tin.insert_point(Vertex::new(1, 1), None).unwrap();
        let vertices = tin.vertex_count();
        let triangles = tin.triangle_count();

        // a corner and the interior vertex, forced again
        tin.insert_point(Vertex::new(0, 0), None).unwrap();
        tin.insert_point(Vertex::new(1, 1), None).unwrap();

        assert_eq!(tin.vertex_count(), vertices);
        assert_eq!(tin.triangle_count(), triangles);
        assert_heap_coherent(&tin);
    }

    #[test]
    fn test_insert_with_hint() {
        let mut tin = Triangulation::new(degenerate_dem(), 0).unwrap();
        let anchor = tin.tris[1].anchor().unwrap();
        // (1, 1) sits on the diagonal, which bounds the hinted face
        tin.insert_point(Vertex::new(1, 1), Some(anchor)).unwrap();
        assert_eq!(tin.vertex_count(), 5);
        assert_delaunay(&tin);
    }

    #[test]
    fn test_wrong_hint_is_rejected() {
        let mut tin = Triangulation::new(degenerate_dem(), 0).unwrap();
        let anchor = tin.tris[1].anchor().unwrap();
        // (2, 1) lies strictly inside the other face
        let result = tin.insert_site(Vertex::new(2, 1), Some(anchor));
        assert!(matches!(result, Err(TinError::Invariant(_))));
        assert_eq!(tin.vertex_count(), 4);
        assert_eq!(tin.triangle_count(), 2);
    }

    #[test]
    fn test_locate_finds_every_cell() {
        let mut tin = Triangulation::new(degenerate_dem(), 0).unwrap();
        loop {
            let (error, count) = tin.insert_next().unwrap();
            if error <= EPS || count >= 9 {
                break;
            }
        }
        // every cell locates to a live triangle that contains it
        for y in 0..=tin.max_y {
            for x in 0..=tin.max_x {
                let p = Vertex::new(x, y);
                let e = tin.locate(&p).expect("cell inside the rectangle locates");
                let t = tin.pool.left_face(e).unwrap();
                let [a, b, c] = tin.tris[t].vertices;
                assert!(in_triangle(&p, &tin.verts[a], &tin.verts[b], &tin.verts[c]));
            }
        }
    }

    #[test]
    fn test_live_triangles_tile_the_rectangle() {
        let mut tin = Triangulation::new(rolling_dem(), 5).unwrap();
        for _ in 0..30 {
            tin.insert_next().unwrap();
        }
        let total: f64 = tin.triangles().map(|t| t.area()).sum();
        let expected = 2.0 * 239.0 * 179.0;
        assert!(
            (total - expected).abs() < 1e-6 * expected,
            "live faces cover {total}, rectangle needs {expected}"
        );
    }

    #[test]
    fn test_interpolated_map_matches_vertices() {
        let mut tin = Triangulation::new(rolling_dem(), 5).unwrap();
        for _ in 0..20 {
            tin.insert_next().unwrap();
        }
        let interpolated = tin.interpolated_map();
        // the TIN passes through its own vertices
        for v in tin.vertices() {
            let fit = interpolated[(v.y as usize, v.x as usize)];
            assert!(
                (fit - v.z).abs() < 1e-6,
                "vertex ({}, {}) interpolates to {fit} instead of {}",
                v.x,
                v.y,
                v.z
            );
        }
    }
}

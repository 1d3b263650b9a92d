/// quadedge.rs
/// -----------
/// Guibas-Stolfi quad-edge structure backed by an arena. Every undirected
/// edge is a bundle of four directed edges; an `EdgeId` packs the bundle
/// index with a rotation in `{0, 1, 2, 3}`, so `rot`, `sym` and `inv_rot`
/// are pure index arithmetic and never touch memory. `splice` and
/// `make_edge` are the only primitives that mutate topology; `connect`,
/// `swap` and edge deletion are built from them.
///
/// Based on Lischinski's quad-edge code from Graphics Gems IV.
use crate::geometry::Vertex;
use crate::triangle::TriangleId;

pub type VertexId = usize;

/// A directed edge: bundle index in the upper bits, rotation in the low two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(usize);

impl EdgeId {
    fn compose(bundle: usize, slot: usize) -> EdgeId {
        EdgeId(bundle << 2 | slot)
    }

    pub(crate) fn bundle(self) -> usize {
        self.0 >> 2
    }

    fn slot(self) -> usize {
        self.0 & 3
    }

    /// The next counterclockwise edge of the same bundle (primal to dual).
    pub fn rot(self) -> EdgeId {
        EdgeId(self.0 & !3 | (self.0 + 1) & 3)
    }

    /// The same undirected edge, pointing the other way.
    pub fn sym(self) -> EdgeId {
        EdgeId(self.0 ^ 2)
    }

    pub fn inv_rot(self) -> EdgeId {
        EdgeId(self.0 & !3 | (self.0 + 3) & 3)
    }
}

#[derive(Debug, Clone)]
struct Bundle {
    // `next` is the only stored orbit; every other traversal derives from
    // it and `rot`.
    next: [EdgeId; 4],
    // Origin vertices of the two primal directed edges (slots 0 and 2).
    origin: [Option<VertexId>; 4],
    // Left-face triangle of each primal directed edge, maintained by
    // `Triangulation` when triangles are (re)anchored.
    left: [Option<TriangleId>; 4],
    // Registry id assigned by the triangulation, shared by both directions.
    id: Option<u32>,
    alive: bool,
}

/// Arena of quad-edge bundles with a free list for deleted edges.
#[derive(Debug, Default)]
pub struct EdgePool {
    bundles: Vec<Bundle>,
    free: Vec<usize>,
}

impl EdgePool {
    pub fn new() -> Self {
        EdgePool::default()
    }

    fn bundle(&self, e: EdgeId) -> &Bundle {
        &self.bundles[e.bundle()]
    }

    fn bundle_mut(&mut self, e: EdgeId) -> &mut Bundle {
        &mut self.bundles[e.bundle()]
    }

    pub fn is_alive(&self, e: EdgeId) -> bool {
        self.bundle(e).alive
    }

    /// A fresh free-floating edge from `org` to `dst`: its `rot` orbit is
    /// the four bundle slots and its `next` links close on themselves.
    pub fn make_edge(&mut self, verts: &mut [Vertex], org: VertexId, dst: VertexId) -> EdgeId {
        let b = match self.free.pop() {
            Some(b) => b,
            None => {
                self.bundles.push(Bundle {
                    next: [EdgeId(0); 4],
                    origin: [None; 4],
                    left: [None; 4],
                    id: None,
                    alive: false,
                });
                self.bundles.len() - 1
            }
        };
        let e = EdgeId::compose(b, 0);
        self.bundles[b] = Bundle {
            next: [e, e.inv_rot(), e.sym(), e.rot()],
            origin: [Some(org), None, Some(dst), None],
            left: [None; 4],
            id: None,
            alive: true,
        };
        verts[org].edge = Some(e);
        verts[dst].edge = Some(e.sym());
        e
    }

    /// Release a bundle back to the arena. The caller is responsible for
    /// splicing the edge out of its orbits first.
    pub(crate) fn release(&mut self, e: EdgeId) {
        let b = self.bundle_mut(e);
        b.alive = false;
        b.id = None;
        b.origin = [None; 4];
        b.left = [None; 4];
        self.free.push(e.bundle());
    }

    pub fn origin(&self, e: EdgeId) -> Option<VertexId> {
        self.bundle(e).origin[e.slot()]
    }

    pub fn destination(&self, e: EdgeId) -> Option<VertexId> {
        self.origin(e.sym())
    }

    /// Point a directed edge at a new origin, updating the vertex's
    /// outgoing-edge hint like the anchor assignment it is.
    pub(crate) fn set_origin(&mut self, verts: &mut [Vertex], e: EdgeId, v: VertexId) {
        self.bundle_mut(e).origin[e.slot()] = Some(v);
        verts[v].edge = Some(e);
    }

    pub fn left_face(&self, e: EdgeId) -> Option<TriangleId> {
        self.bundle(e).left[e.slot()]
    }

    pub(crate) fn set_left_face(&mut self, e: EdgeId, t: Option<TriangleId>) {
        self.bundle_mut(e).left[e.slot()] = t;
    }

    pub(crate) fn registry_id(&self, e: EdgeId) -> Option<u32> {
        self.bundle(e).id
    }

    pub(crate) fn set_registry_id(&mut self, e: EdgeId, id: Option<u32>) {
        self.bundle_mut(e).id = id;
    }

    // -- ring traversals ---------------------------------------------------

    pub fn o_next(&self, e: EdgeId) -> EdgeId {
        self.bundle(e).next[e.slot()]
    }

    pub fn o_prev(&self, e: EdgeId) -> EdgeId {
        self.o_next(e.rot()).rot()
    }

    pub fn d_next(&self, e: EdgeId) -> EdgeId {
        self.o_next(e.sym()).sym()
    }

    pub fn d_prev(&self, e: EdgeId) -> EdgeId {
        self.o_next(e.inv_rot()).inv_rot()
    }

    pub fn l_next(&self, e: EdgeId) -> EdgeId {
        self.o_next(e.inv_rot()).rot()
    }

    pub fn l_prev(&self, e: EdgeId) -> EdgeId {
        self.o_next(e).sym()
    }

    pub fn r_next(&self, e: EdgeId) -> EdgeId {
        self.o_next(e.rot()).inv_rot()
    }

    pub fn r_prev(&self, e: EdgeId) -> EdgeId {
        self.o_next(e.sym())
    }

    fn set_next(&mut self, e: EdgeId, next: EdgeId) {
        self.bundle_mut(e).next[e.slot()] = next;
    }

    // -- topology operators ------------------------------------------------

    /// The Guibas-Stolfi splice: exchange the origin orbits of `a` and `b`
    /// (and, through the duals, the corresponding face orbits). Splice is
    /// its own inverse.
    pub fn splice(&mut self, a: EdgeId, b: EdgeId) {
        let alpha = self.o_next(a).rot();
        let beta = self.o_next(b).rot();

        let t1 = self.o_next(b);
        let t2 = self.o_next(a);
        let t3 = self.o_next(beta);
        let t4 = self.o_next(alpha);

        self.set_next(a, t1);
        self.set_next(b, t2);
        self.set_next(alpha, t3);
        self.set_next(beta, t4);
    }

    /// Add a new edge from `destination(a)` to `origin(b)`, closing the
    /// left face of `a` across to `b`.
    pub fn connect(&mut self, verts: &mut [Vertex], a: EdgeId, b: EdgeId) -> EdgeId {
        let org = self.destination(a).expect("connect source has a destination");
        let dst = self.origin(b).expect("connect target has an origin");
        let e = self.make_edge(verts, org, dst);
        let ln = self.l_next(a);
        self.splice(e, ln);
        self.splice(e.sym(), b);
        e
    }

    /// Rotate `e` inside the quadrilateral formed by its two adjacent
    /// faces, so it joins the previously opposite vertices. The caller
    /// guarantees `e` is interior with a convex quadrilateral around it.
    pub fn swap(&mut self, verts: &mut [Vertex], e: EdgeId) {
        let a = self.o_prev(e);
        let b = self.o_prev(e.sym());

        self.splice(e, a);
        self.splice(e.sym(), b);
        let la = self.l_next(a);
        self.splice(e, la);
        let lb = self.l_next(b);
        self.splice(e.sym(), lb);

        let org = self.destination(a).expect("swap wing has a destination");
        let dst = self.destination(b).expect("swap wing has a destination");
        self.set_origin(verts, e, org);
        self.set_origin(verts, e.sym(), dst);
    }
}

/// heap.rs
/// -----------
/// Indexed binary max-heap over the per-triangle candidate errors. Each
/// insertion returns a stable handle that stays valid while the entry is
/// resident, which is what lets the refinement driver delete the entries
/// of triangles that died in a flip cascade in O(log n).
///
/// Layout follows Sedgewick and Wayne's IndexMaxPQ: three parallel
/// 1-indexed arrays (`pq` maps heap position to handle, `qp` maps handle
/// back to heap position, `keys` holds the priorities) plus the payloads.
use crate::triangle::TriangleId;

/// Stable handle returned by [`CandidateHeap::insert`].
pub type HeapHandle = usize;

/// What the refinement driver queues: the worst grid cell of a triangle
/// (if its scan found an available one) and the triangle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapEntry {
    pub candidate: Option<(i32, i32)>,
    pub triangle: TriangleId,
}

#[derive(Debug)]
pub struct CandidateHeap {
    // pq[i] = handle at heap position i; position 0 is unused.
    pq: Vec<HeapHandle>,
    // qp[handle] = current heap position, None once removed; handle 0 unused.
    qp: Vec<Option<usize>>,
    keys: Vec<f64>,
    elements: Vec<Option<HeapEntry>>,
    len: usize,
}

impl Default for CandidateHeap {
    fn default() -> Self {
        CandidateHeap::new()
    }
}

impl CandidateHeap {
    pub fn new() -> Self {
        CandidateHeap {
            pq: vec![0],
            qp: vec![None],
            keys: vec![f64::MIN],
            elements: vec![None],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Queue an entry under the given priority and return its handle.
    pub fn insert(&mut self, key: f64, entry: HeapEntry) -> HeapHandle {
        self.len += 1;
        let handle = self.keys.len();
        self.pq.push(handle);
        self.qp.push(Some(self.len));
        self.keys.push(key);
        self.elements.push(Some(entry));
        self.swim(self.len);
        handle
    }

    /// Peek at the maximum entry without removing it.
    pub fn max(&self) -> Option<(f64, &HeapEntry)> {
        if self.len == 0 {
            return None;
        }
        let handle = self.pq[1];
        self.elements[handle].as_ref().map(|e| (self.keys[handle], e))
    }

    /// Remove and return the maximum entry.
    pub fn pop_max(&mut self) -> Option<(f64, HeapEntry)> {
        if self.len == 0 {
            return None;
        }
        let top = self.pq[1];
        self.exchange(1, self.len);
        self.pq.pop();
        self.len -= 1;
        self.sink(1);
        self.qp[top] = None;
        self.elements[top].take().map(|e| (self.keys[top], e))
    }

    /// Remove an entry by handle, wherever it sits in the heap. Removing a
    /// handle twice is a no-op.
    pub fn delete(&mut self, handle: HeapHandle) {
        let Some(pos) = self.qp.get(handle).copied().flatten() else {
            return;
        };
        self.exchange(pos, self.len);
        self.pq.pop();
        self.len -= 1;
        if pos <= self.len {
            self.swim(pos);
            self.sink(pos);
        }
        self.elements[handle] = None;
        self.qp[handle] = None;
    }

    /// The priority an entry was queued with.
    pub fn key(&self, handle: HeapHandle) -> Option<f64> {
        self.qp.get(handle).copied().flatten().map(|_| self.keys[handle])
    }

    /// The payload behind a handle, while it is still resident.
    pub fn entry(&self, handle: HeapHandle) -> Option<&HeapEntry> {
        self.qp
            .get(handle)
            .copied()
            .flatten()
            .and_then(|_| self.elements[handle].as_ref())
    }

    // Heap order by key; equal keys resolve in favour of the older handle,
    // so equal-error candidates pop in insertion order.
    fn less(&self, i: usize, j: usize) -> bool {
        let (hi, hj) = (self.pq[i], self.pq[j]);
        let (ki, kj) = (self.keys[hi], self.keys[hj]);
        ki < kj || (ki == kj && hi > hj)
    }

    fn swim(&mut self, mut k: usize) {
        while k > 1 && self.less(k / 2, k) {
            self.exchange(k, k / 2);
            k /= 2;
        }
    }

    fn sink(&mut self, mut k: usize) {
        while 2 * k <= self.len {
            let mut j = 2 * k;
            if j < self.len && self.less(j, j + 1) {
                j += 1;
            }
            if !self.less(k, j) {
                break;
            }
            self.exchange(k, j);
            k = j;
        }
    }

    fn exchange(&mut self, i: usize, j: usize) {
        self.pq.swap(i, j);
        self.qp[self.pq[i]] = Some(i);
        self.qp[self.pq[j]] = Some(j);
    }
}

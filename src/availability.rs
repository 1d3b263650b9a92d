/// availability.rs
/// -----------
/// A boolean raster the shape of the DEM that gates candidate selection.
/// Painting a disc of radius `minimum_gap` around every inserted vertex
/// guarantees a minimum spatial separation between mesh vertices; painting
/// along a segment walks it at unit steps and stamps a disc at each
/// sample.
use nalgebra::{DMatrix, Vector2};

use crate::geometry::Vertex;

#[derive(Debug, Clone)]
pub struct AvailabilityMask {
    cells: DMatrix<bool>,
}

impl AvailabilityMask {
    /// A mask with every cell available.
    pub fn new(rows: usize, cols: usize) -> Self {
        AvailabilityMask {
            cells: DMatrix::from_element(rows, cols, true),
        }
    }

    pub fn is_available(&self, x: i32, y: i32) -> bool {
        self.cells[(y as usize, x as usize)]
    }

    fn rows(&self) -> i32 {
        self.cells.nrows() as i32
    }

    fn cols(&self) -> i32 {
        self.cells.ncols() as i32
    }

    /// Paint every in-range cell within Euclidean `radius` of the centre.
    pub fn mark_cell(&mut self, cx: i32, cy: i32, radius: f64, value: bool) {
        let y_start = ((cy as f64 - radius).round() as i32).max(0);
        let y_end = ((cy as f64 + radius).round() as i32).min(self.rows() - 1);
        for y in y_start..=y_end {
            let dy = (y - cy) as f64;
            let half_span = (radius * radius - dy * dy).max(0.0).sqrt();
            let x_start = ((cx as f64 - half_span).round() as i32).max(0);
            let x_end = ((cx as f64 + half_span).round() as i32).min(self.cols() - 1);
            for x in x_start..=x_end {
                self.cells[(y as usize, x as usize)] = value;
            }
        }
    }

    /// Walk the segment from `v0` to `v1` at unit steps, rounding each
    /// sample to the nearest cell, and stamp a disc there. The endpoint
    /// itself is left to the adjoining segment.
    pub fn mark_segment(&mut self, v0: &Vertex, v1: &Vertex, radius: f64, value: bool) {
        let a: Vector2<f64> = v1.position() - v0.position();
        let steps = a.norm().ceil() as i32;
        if steps == 0 {
            self.mark_cell(v0.x, v0.y, radius, value);
            return;
        }
        let step = a / steps as f64;
        for i in 0..steps {
            let p = v0.position() + step * i as f64;
            self.mark_cell(p.x.round() as i32, p.y.round() as i32, radius, value);
        }
    }
}

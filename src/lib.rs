//! Adaptive TIN approximation of raster elevation grids.
//!
//! `gridtin` turns a regular elevation grid (a DEM) into a triangulated
//! irregular network by Garland and Heckbert's greedy insertion: start
//! from the grid's four corners and repeatedly insert the grid sample
//! whose vertical distance to the current mesh is largest, until an error
//! tolerance or a vertex budget is reached.
//!
//! ```no_run
//! use gridtin::Triangulation;
//! use nalgebra::DMatrix;
//!
//! # fn main() -> Result<(), gridtin::TinError> {
//! let dem: DMatrix<f64> = DMatrix::from_element(180, 240, 0.0);
//! let mut tin = Triangulation::new(dem, 5)?;
//! loop {
//!     let (error, vertex_count) = tin.insert_next()?;
//!     if vertex_count >= 100 || error <= 5.0 {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The mesh is a Guibas-Stolfi quad-edge structure kept Delaunay by local
//! edge flips; candidates are ranked in an indexed max-heap and located
//! through the triangle history DAG.

pub mod availability;
pub mod error;
pub mod exchange;
pub mod geometry;
pub mod heap;
pub mod quadedge;
pub mod scan;
pub mod triangle;
pub mod triangulation;

pub use error::TinError;
pub use geometry::Vertex;
pub use quadedge::{EdgeId, VertexId};
pub use triangle::{Plane, Triangle, TriangleId};
pub use triangulation::Triangulation;

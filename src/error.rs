use thiserror::Error;

/// Failures of the core triangulation contract.
///
/// Point-location misses and rejected edge flips are not errors: the
/// refinement driver treats the former as a no-op insertion and the latter
/// as the end of a flip cascade.
#[derive(Debug, Error)]
pub enum TinError {
    /// A caller-provided vertex lies outside the elevation grid. The
    /// triangulation is left unchanged.
    #[error("vertex ({x}, {y}) lies outside the elevation grid")]
    OutOfRange { x: i32, y: i32 },

    /// A structural precondition failed. This is fatal and indicates either
    /// a bug or pathologically degenerate input.
    #[error("triangulation invariant violated: {0}")]
    Invariant(&'static str),
}

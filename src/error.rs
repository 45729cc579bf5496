/*!
Error kinds surfaced by the core, per the error-handling design.

Five kinds are distinguished. `ConvergenceLimit` is advisory: it rides
alongside a usable result rather than aborting the caller's pipeline, so
most of its constructors appear wrapped in a status value returned next to
a value, not as a bare `Err`. The other four are genuine `Result::Err`
returns.
*/

use thiserror::Error;

/// The crate-wide error type. Every reason string is meant to travel
/// out-of-band with the error, exactly as the design calls for.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Zero extent, dx/dy <= 0, nbath <= 2 before triangulation, grid
    /// dimension overflow, and similar malformed-input conditions.
    #[error("bad input: {0}")]
    BadInput(String),

    /// A query found no usable neighbours (all four topogrid corners at
    /// nodata; an intersect ray ran out of bracket with no altitude left).
    #[error("not enough data: {0}")]
    NotEnoughData(String),

    /// Arena growth failed. The current operation is abandoned but any
    /// already-produced partial output remains valid.
    #[error("allocation failure: {0}")]
    AllocFailure(String),

    /// Non-fatal: an iteration cap was hit (LSQR istop=5, surface's
    /// `max_iterations`, zgrid's 1000). The result is still usable.
    #[error("convergence limit reached: {0}")]
    ConvergenceLimit(String),

    /// Lower/upper constraint grid dimensions disagree with the output
    /// grid.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Crate-wide `Result` alias, mirroring the teacher's own
/// `Result<T, std::io::Error>` idiom but narrowed to this crate's error
/// enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Status flag returned alongside a value from a relaxation routine that
/// never fails outright, only converges or doesn't.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Converged,
    ConvergenceSkipped,
    Diverging,
    AtIterationLimit,
}

impl ConvergenceStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged | ConvergenceStatus::ConvergenceSkipped)
    }
}

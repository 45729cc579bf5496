/*!
Library-scope solver defaults, per §10.3.

The core takes every tolerance and iteration cap as an explicit call
argument; it has no ambient configuration of its own to read. This
module exists only so an embedding application can load overrides from
its own configuration file, using the same serde-backed-struct idiom
`configs/mod.rs` uses for its CLI-wide `Configs` — narrowed to the values
this crate's own algorithms actually default, with no `current_exe()`
lookup or `settings.json` path, since a library has no "beside the
executable" of its own.
*/

use serde::{Deserialize, Serialize};

/// Default tolerances and iteration caps for the core's iterative
/// solvers. Each field mirrors one algorithm's own `Default` so an
/// embedder can serialize, edit, and reload a single place instead of
/// hunting through call sites.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverDefaults {
    /// LSQR's relative-residual stopping tolerance (`atol`/`btol`).
    pub lsqr_tolerance: f64,
    /// LSQR's iteration cap.
    pub lsqr_max_iterations: usize,
    /// `surface`'s `max|Δz|/z_range` convergence threshold, expressed as
    /// a multiple of `z_scale` (the solver's own default multiplies this
    /// by the *pre-rescale* `z_scale` of 1.0; see `surface.rs`).
    pub surface_converge_limit: f64,
    /// `surface`'s relaxation-level iteration cap.
    pub surface_max_iterations: usize,
    /// `zgrid`'s amount of spline equation mixed into the Laplace
    /// equation (`cay`).
    pub zgrid_cay: f64,
    /// `zgrid`'s iteration cap.
    pub zgrid_max_iterations: usize,
}

impl Default for SolverDefaults {
    fn default() -> Self {
        SolverDefaults {
            lsqr_tolerance: 1.0e-6,
            lsqr_max_iterations: 100,
            surface_converge_limit: 0.001,
            surface_max_iterations: 250,
            zgrid_cay: 0.0,
            zgrid_max_iterations: 1000,
        }
    }
}

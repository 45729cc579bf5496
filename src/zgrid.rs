/*!
Thin-plate-spline / Laplace relaxation gridding, per §4.5.2.

Grounded in full on `original_source/src/mbaux/mb_zgrid.c`
(`mb_zgrid`, `mb_zgrid2`), MB-System's C translation of a Fortran routine
going back to Ian Crain and T. Murty's work at IGPP in the 1960s. The
original encodes three node states — "fixed at a data value", "free and
being relaxed", "never reached" — as the sign and magnitude of a single
`float` (negative, positive-but-small, and >= a `9e29` sentinel
respectively) so one array can double as both the solution and its own
bookkeeping. That trick, and the `zbase` additive shift it depends on to
keep every working value non-negative, earn no separate treatment here:
[`NodeState`] names the three cases directly, carrying the real height
with no offset, which is exactly equivalent since every relaxation step
here is linear in neighbouring heights and invariant under adding the
same constant to all of them.
*/

use crate::error::{ConvergenceStatus, Error, Result};
use crate::grid::{Grid, Projection};

const ITERMIN: usize = 50;
const ITERMAX: usize = 1000;
const ITERTRANSITION: usize = 100;
const DZ_CRITERIA: f64 = 0.001;
const RELAX_INITIAL: f64 = 1.0;

/// Maximum grid dimension `zgrid2` will relax directly; larger requests are
/// solved at a scaled-down size and bilinearly upsampled.
pub const ZGRID_DIMENSION_MAX: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct ZgridOptions {
    /// Amount of spline equation mixed into the Laplace equation, in
    /// `[0, inf)`. `0.0` is pure minimum-curvature (Laplace); large values
    /// approach a pure thin-plate spline.
    pub cay: f64,
    /// Grid points more than this many cell-widths from the nearest sample
    /// are left undefined. `None` means "no limit" (fill the whole grid).
    pub nrng: Option<usize>,
}

impl Default for ZgridOptions {
    fn default() -> Self {
        ZgridOptions { cay: 0.0, nrng: None }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZgridReport {
    pub iterations: usize,
    /// Final `max|Δz| / z_range` seen before the loop stopped.
    pub final_max_delta: f64,
    pub status: ConvergenceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeState {
    Fixed(f64),
    Free(f64),
    Undefined,
}

impl NodeState {
    fn value(&self) -> Option<f64> {
        match *self {
            NodeState::Fixed(v) | NodeState::Free(v) => Some(v),
            NodeState::Undefined => None,
        }
    }
}

struct SampleAssignment {
    node: usize,
    frac_x: f64,
    frac_y: f64,
    z: f64,
}

/// Resolves a pair of opposing neighbours for the quadratic boundary fit
/// used when easing data points back toward their grid nodes: missing
/// neighbours are mirrored across the centre value, and if both are
/// missing the surface is locally flat. Mirrors the case analysis at the
/// "shift data points" step of the original.
fn mirror_pair(low: Option<f64>, high: Option<f64>, center: f64) -> (f64, f64) {
    match (low, high) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => (lo, center * 2.0 - lo),
        (None, Some(hi)) => (center * 2.0 - hi, hi),
        (None, None) => (center, center),
    }
}

/// Accumulates the Gauss-Seidel weight and weighted sum contributed by one
/// axis (x or y) of the Laplace-spline stencil: each present first
/// neighbour contributes directly, a present second neighbour refines it
/// with the `cay` spline term, and the cross term between opposing first
/// neighbours only applies when both are present.
fn axis_term(minus1: Option<f64>, minus2: Option<f64>, plus1: Option<f64>, plus2: Option<f64>, cay: f64) -> (f64, f64) {
    let mut wgt = 0.0;
    let mut zsum = 0.0;
    if let Some(zm) = minus1 {
        wgt += 1.0;
        zsum += zm;
        if let Some(zmm) = minus2 {
            wgt += cay;
            zsum -= cay * (zmm - zm * 2.0);
        }
    }
    if let Some(zp) = plus1 {
        wgt += 1.0;
        zsum += zp;
        if let Some(zm) = minus1 {
            wgt += cay * 4.0;
            zsum += cay * 2.0 * (zm + zp);
        }
        if let Some(zpp) = plus2 {
            wgt += cay;
            zsum -= cay * (zpp - zp * 2.0);
        }
    }
    (wgt, zsum)
}

struct Solver {
    n_columns: usize,
    n_rows: usize,
    dx: f64,
    dy: f64,
    cay: f64,
    derzm: f64,
    zrange: f64,
    states: Vec<NodeState>,
    assignments: Vec<SampleAssignment>,
}

impl Solver {
    fn index(&self, i: usize, j: usize) -> usize {
        j * self.n_columns + i
    }

    fn neighbor(&self, i: i64, j: i64) -> Option<f64> {
        if i < 0 || j < 0 || i as usize >= self.n_columns || j as usize >= self.n_rows {
            return None;
        }
        self.states[self.index(i as usize, j as usize)].value()
    }

    /// Expands the fixed-node set outward by BFS rings until every node
    /// reachable within `nrng` steps has a starting estimate, or the flood
    /// stalls. Reads each ring only from the previous ring's snapshot, so
    /// nodes gain a value based on how many rings away the nearest sample
    /// actually is, not on sweep order within one pass.
    fn flood_fill(&mut self, nrng: usize) {
        for _ in 0..nrng {
            let snapshot = self.states.clone();
            let mut nnew = 0;
            for j in 0..self.n_rows {
                for i in 0..self.n_columns {
                    let idx = self.index(i, j);
                    if snapshot[idx] != NodeState::Undefined {
                        continue;
                    }
                    let neighbours = [
                        if j > 0 { snapshot[self.index(i, j - 1)].value() } else { None },
                        if i > 0 { snapshot[self.index(i - 1, j)].value() } else { None },
                        if j + 1 < self.n_rows { snapshot[self.index(i, j + 1)].value() } else { None },
                        if i + 1 < self.n_columns { snapshot[self.index(i + 1, j)].value() } else { None },
                    ];
                    if let Some(v) = neighbours.into_iter().flatten().next() {
                        self.states[idx] = NodeState::Free(v);
                        nnew += 1;
                    }
                }
            }
            if nnew == 0 {
                break;
            }
        }
    }

    /// One Gauss-Seidel sweep over the free nodes. Returns the node count
    /// touched, the RMS and max `|Δz|` seen.
    fn relax_sweep(&mut self, relax: f64) -> (usize, f64, f64) {
        let mut npg = 0usize;
        let mut dzrms = 0.0;
        let mut dzmax = 0.0f64;
        for j in 0..self.n_rows {
            for i in 0..self.n_columns {
                let idx = self.index(i, j);
                let z00 = match self.states[idx] {
                    NodeState::Free(v) => v,
                    _ => continue,
                };
                let ii = i as i64;
                let jj = j as i64;
                let (wx, sx) = axis_term(
                    self.neighbor(ii - 1, jj),
                    self.neighbor(ii - 2, jj),
                    self.neighbor(ii + 1, jj),
                    self.neighbor(ii + 2, jj),
                    self.cay,
                );
                let (wy, sy) = axis_term(
                    self.neighbor(ii, jj - 1),
                    self.neighbor(ii, jj - 2),
                    self.neighbor(ii, jj + 1),
                    self.neighbor(ii, jj + 2),
                    self.cay,
                );
                let wgt = wx + wy;
                if wgt <= 0.0 {
                    continue;
                }
                let dz = (sx + sy) / wgt - z00;
                npg += 1;
                dzrms += dz * dz;
                dzmax = dzmax.max(dz.abs());
                self.states[idx] = NodeState::Free(z00 + dz * relax);
            }
        }
        (npg, dzrms, dzmax)
    }

    /// Every ten iterations, nudges each fixed node's value toward a local
    /// quadratic fit of its neighbours, bounded by `derzm`, so that
    /// multiple samples sharing a node settle smoothly rather than
    /// fighting over one exact height.
    fn ease_fixed_nodes(&mut self) {
        let mut per_node: Vec<Vec<usize>> = vec![Vec::new(); self.n_columns * self.n_rows];
        for (k, a) in self.assignments.iter().enumerate() {
            per_node[a.node].push(k);
        }
        let mut adjusted = vec![0.0f64; self.assignments.len()];
        for (idx, samples) in per_node.iter().enumerate() {
            if samples.is_empty() {
                continue;
            }
            let z00 = match self.states[idx] {
                NodeState::Fixed(v) => v,
                _ => continue,
            };
            let i = idx % self.n_columns;
            let j = idx / self.n_columns;
            let ii = i as i64;
            let jj = j as i64;
            let (zw, ze) = mirror_pair(self.neighbor(ii - 1, jj), self.neighbor(ii + 1, jj), z00);
            let (zs, zn) = mirror_pair(self.neighbor(ii, jj - 1), self.neighbor(ii, jj + 1), z00);
            let a = (ze - zw) * 0.5;
            let b = (zn - zs) * 0.5;
            let c = (ze + zw) * 0.5 - z00;
            let d = (zn + zs) * 0.5 - z00;
            for &k in samples {
                let sample = &self.assignments[k];
                let (x, y) = (sample.frac_x, sample.frac_y);
                let zxy = z00 + a * x + b * y + c * x * x + d * y * y;
                let mut delz = z00 - zxy;
                let delzm = self.derzm * (x.abs() * self.dx + y.abs() * self.dy) * 0.8;
                delz = delz.clamp(-delzm, delzm);
                adjusted[k] = sample.z + delz;
            }
        }
        for (idx, samples) in per_node.iter().enumerate() {
            if samples.is_empty() {
                continue;
            }
            let avg = samples.iter().map(|&k| adjusted[k]).sum::<f64>() / samples.len() as f64;
            self.states[idx] = NodeState::Fixed(avg);
        }
    }
}

fn validate(
    samples: &[(f64, f64, f32)],
    n_columns: usize,
    n_rows: usize,
    dx: f64,
    dy: f64,
) -> Result<()> {
    if samples.is_empty() {
        return Err(Error::NotEnoughData("zgrid needs at least one sample".into()));
    }
    if n_columns < 2 || n_rows < 2 {
        return Err(Error::BadInput("zgrid needs at least a 2x2 grid".into()));
    }
    if dx <= 0.0 || dy <= 0.0 {
        return Err(Error::BadInput(format!("cell size must be positive: dx={dx}, dy={dy}")));
    }
    Ok(())
}

/// Laplace/thin-plate-spline relaxation gridder, per §4.5.2.
pub fn zgrid(
    samples: &[(f64, f64, f32)],
    xmin: f64,
    ymin: f64,
    dx: f64,
    dy: f64,
    n_columns: usize,
    n_rows: usize,
    options: &ZgridOptions,
) -> Result<(Grid, ZgridReport)> {
    validate(samples, n_columns, n_rows, dx, dy)?;

    let mut zmin = samples[0].2 as f64;
    let mut zmax = zmin;
    for &(_, _, z) in samples {
        let z = z as f64;
        zmin = zmin.min(z);
        zmax = zmax.max(z);
    }
    let zrange = (zmax - zmin).max(1.0e-12);
    let hrange = (dx * (n_columns - 1) as f64).min(dy * (n_rows - 1) as f64);
    let derzm = zrange * 2.0 / hrange;

    let mut states = vec![NodeState::Undefined; n_columns * n_rows];
    let mut node_samples: Vec<Vec<f64>> = vec![Vec::new(); n_columns * n_rows];
    let mut assignments = Vec::with_capacity(samples.len());
    let mut dropped = 0usize;
    for &(x, y, z) in samples {
        let fi = (x - xmin) / dx;
        let fj = (y - ymin) / dy;
        let i = fi.round();
        let j = fj.round();
        if i < 0.0 || i >= n_columns as f64 || j < 0.0 || j >= n_rows as f64 {
            dropped += 1;
            continue;
        }
        let (i, j) = (i as usize, j as usize);
        let idx = j * n_columns + i;
        node_samples[idx].push(z as f64);
        assignments.push(SampleAssignment {
            node: idx,
            frac_x: fi - i as f64,
            frac_y: fj - j as f64,
            z: z as f64,
        });
    }
    if dropped > 0 {
        log::warn!("zgrid: {dropped} samples fell outside the grid extent and were dropped");
    }
    for (idx, zs) in node_samples.iter().enumerate() {
        if !zs.is_empty() {
            states[idx] = NodeState::Fixed(zs.iter().sum::<f64>() / zs.len() as f64);
        }
    }

    let nmax = n_columns.max(n_rows);
    let mut solver = Solver {
        n_columns,
        n_rows,
        dx,
        dy,
        cay: options.cay,
        derzm,
        zrange,
        states,
        assignments,
    };
    solver.flood_fill(options.nrng.unwrap_or(nmax));

    log::debug!(
        "zgrid: {} of {} nodes seeded (cay={}, nrng={:?})",
        solver.states.iter().filter(|s| **s != NodeState::Undefined).count(),
        n_columns * n_rows,
        options.cay,
        options.nrng
    );

    let mut relax = RELAX_INITIAL;
    let mut dzrms8 = 0.0;
    let mut convtestlast = 0.0;
    let mut nconvtestincrease = 0usize;
    let mut final_max_delta = 0.0;
    let mut iterations_run = 0usize;
    let mut status = ConvergenceStatus::AtIterationLimit;

    'relax: for iter in 1..=ITERMAX {
        iterations_run = iter;
        let (npg, dzrms_sq, dzmax) = solver.relax_sweep(relax);

        if iter % 10 == 0 {
            solver.ease_fixed_nodes();
        }

        if npg <= 1 {
            status = ConvergenceStatus::Converged;
            break;
        }
        let dzrms = (dzrms_sq / npg as f64).sqrt();
        let dzmaxf = dzmax / zrange;
        final_max_delta = dzmaxf;

        if iter % 10 == 2 {
            dzrms8 = dzrms;
        }
        if iter % 10 != 0 {
            continue;
        }

        let root8 = if dzrms > 0.0 && dzrms8 > 0.0 {
            (dzrms / dzrms8).sqrt().sqrt().sqrt()
        } else {
            0.0
        };

        if root8 >= 0.9999 {
            log::trace!("zgrid iteration {iter}: convergence test skipped, root={root8:.6}");
            if iter >= ITERTRANSITION {
                nconvtestincrease += 1;
            }
            if iter >= ITERMIN || (iter >= ITERTRANSITION && nconvtestincrease >= 4) {
                status = ConvergenceStatus::ConvergenceSkipped;
                break 'relax;
            }
            continue;
        }

        let convtest = dzmaxf - DZ_CRITERIA;
        if iter >= ITERTRANSITION && convtest > convtestlast {
            nconvtestincrease += 1;
        }
        log::trace!("zgrid iteration {iter}: convergence test={convtest:.6} last={convtestlast:.6}");
        if (convtest <= 0.0 && iter >= ITERMIN) || (iter >= ITERTRANSITION && nconvtestincrease >= 4) {
            status = if convtest <= 0.0 { ConvergenceStatus::Converged } else { ConvergenceStatus::Diverging };
            break;
        }
        convtestlast = convtest;

        if iter == 20 || iter == 40 || iter == 60 {
            if relax - 1.0 - root8 < 0.0 {
                let tpy = (root8 + relax - 1.0) / relax;
                let rootgs = tpy * tpy / root8;
                let mut relaxn = 2.0 / ((1.0 - rootgs).sqrt() + 1.0);
                if iter == 60 {
                    relaxn -= (2.0 - relaxn) * 0.25;
                }
                relax = relax.max(relaxn);
            }
        }
    }

    if status == ConvergenceStatus::AtIterationLimit {
        log::warn!("zgrid: hit the {ITERMAX}-iteration cap without converging");
    }

    let mut grid = Grid::new(n_columns, n_rows, xmin, ymin, dx, dy, -99999.0, Projection::Unknown)?;
    for j in 0..n_rows {
        for i in 0..n_columns {
            if let Some(v) = solver.states[j * n_columns + i].value() {
                grid.set(i, j, v as f32);
            }
        }
    }

    Ok((
        grid,
        ZgridReport {
            iterations: iterations_run,
            final_max_delta,
            status,
        },
    ))
}

/// Wraps [`zgrid`]: grids above [`ZGRID_DIMENSION_MAX`] are solved at a
/// scaled-down size and the result is bilinearly upsampled, since the
/// relaxation converges faster and looks better at coarser spacing than
/// it does when asked to fill in very fine cells directly.
pub fn zgrid2(
    samples: &[(f64, f64, f32)],
    xmin: f64,
    ymin: f64,
    dx: f64,
    dy: f64,
    n_columns: usize,
    n_rows: usize,
    options: &ZgridOptions,
) -> Result<(Grid, ZgridReport)> {
    if n_columns <= ZGRID_DIMENSION_MAX && n_rows <= ZGRID_DIMENSION_MAX {
        return zgrid(samples, xmin, ymin, dx, dy, n_columns, n_rows, options);
    }

    let factor = {
        let mut f = 1usize;
        loop {
            let sx = n_columns.div_ceil(f);
            let sy = n_rows.div_ceil(f);
            if sx <= ZGRID_DIMENSION_MAX && sy <= ZGRID_DIMENSION_MAX {
                break f;
            }
            f += 1;
        }
    };
    let snx = n_columns.div_ceil(factor).max(2);
    let sny = n_rows.div_ceil(factor).max(2);
    let sdx = dx * (n_columns - 1) as f64 / (snx - 1) as f64;
    let sdy = dy * (n_rows - 1) as f64 / (sny - 1) as f64;
    let snrng = options.nrng.map(|n| (n as f64 / factor as f64).ceil() as usize + 1);

    log::debug!("zgrid2: reducing {n_columns}x{n_rows} to {snx}x{sny} before relaxing (factor {factor})");
    let (small, report) = zgrid(
        samples,
        xmin,
        ymin,
        sdx,
        sdy,
        snx,
        sny,
        &ZgridOptions { cay: options.cay, nrng: snrng },
    )?;

    log::debug!("zgrid2: upsampling {snx}x{sny} back to {n_columns}x{n_rows} by bilinear interpolation");
    let mut grid = Grid::new(n_columns, n_rows, xmin, ymin, dx, dy, small.nodata, small.projection.clone())?;
    for j in 0..n_rows {
        let yj = j as f64 * dy;
        let mut sj = (yj / sdy) as i64;
        sj = sj.clamp(0, sny as i64 - 2);
        for i in 0..n_columns {
            let xi = i as f64 * dx;
            let mut si = (xi / sdx) as i64;
            si = si.clamp(0, snx as i64 - 2);
            let (si, sj) = (si as usize, sj as usize);

            let z00 = small.get(si, sj);
            let z10 = small.get(si + 1, sj);
            let z01 = small.get(si, sj + 1);
            let z11 = small.get(si + 1, sj + 1);
            if z00 == small.nodata || z10 == small.nodata || z01 == small.nodata || z11 == small.nodata {
                continue;
            }
            let sx0 = si as f64 * sdx;
            let sx1 = (si + 1) as f64 * sdx;
            let sy0 = sj as f64 * sdy;
            let sy1 = (sj + 1) as f64 * sdy;
            let v = (z00 as f64 * (sx1 - xi) * (sy1 - yj)
                + z10 as f64 * (xi - sx0) * (sy1 - yj)
                + z01 as f64 * (sx1 - xi) * (yj - sy0)
                + z11 as f64 * (xi - sx0) * (yj - sy0))
                / (sdx * sdy);
            grid.set(i, j, v as f32);
        }
    }

    Ok((grid, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_samples() {
        assert!(zgrid(&[], 0.0, 0.0, 1.0, 1.0, 4, 4, &ZgridOptions::default()).is_err());
    }

    #[test]
    fn rejects_too_small_grid() {
        let samples = [(0.0, 0.0, 1.0f32)];
        assert!(zgrid(&samples, 0.0, 0.0, 1.0, 1.0, 1, 1, &ZgridOptions::default()).is_err());
    }

    #[test]
    fn flat_samples_grid_to_a_flat_surface() {
        let mut samples = Vec::new();
        for j in 0..6 {
            for i in 0..6 {
                samples.push((i as f64, j as f64, 3.0f32));
            }
        }
        let (grid, report) = zgrid(&samples, 0.0, 0.0, 1.0, 1.0, 6, 6, &ZgridOptions::default()).unwrap();
        assert!(report.status.is_ok() || report.iterations > 0);
        for j in 0..6 {
            for i in 0..6 {
                assert!((grid.get(i, j) - 3.0).abs() < 1.0e-3, "node ({i},{j}) = {}", grid.get(i, j));
            }
        }
    }

    #[test]
    fn nrng_limits_how_far_interpolation_spreads() {
        let samples = [(0.0, 0.0, 5.0f32)];
        let options = ZgridOptions { cay: 0.0, nrng: Some(1) };
        let (grid, _report) = zgrid(&samples, 0.0, 0.0, 1.0, 1.0, 10, 10, &options).unwrap();
        assert!(!grid.is_nodata(0, 0));
        assert!(!grid.is_nodata(1, 0));
        assert!(grid.is_nodata(9, 9));
    }

    #[test]
    fn mirror_pair_reflects_missing_neighbours() {
        assert_eq!(mirror_pair(Some(1.0), Some(3.0), 2.0), (1.0, 3.0));
        assert_eq!(mirror_pair(Some(1.0), None, 2.0), (1.0, 3.0));
        assert_eq!(mirror_pair(None, Some(3.0), 2.0), (1.0, 3.0));
        assert_eq!(mirror_pair(None, None, 2.0), (2.0, 2.0));
    }

    #[test]
    fn axis_term_matches_plain_average_with_no_tension() {
        let (wgt, zsum) = axis_term(Some(1.0), None, Some(3.0), None, 0.0);
        assert_eq!(wgt, 2.0);
        assert_eq!(zsum, 4.0);
    }

    #[test]
    fn zgrid2_matches_direct_zgrid_for_small_grids() {
        let samples = [(0.0, 0.0, 1.0f32), (5.0, 5.0, 9.0f32)];
        let a = zgrid(&samples, 0.0, 0.0, 1.0, 1.0, 6, 6, &ZgridOptions::default()).unwrap().0;
        let b = zgrid2(&samples, 0.0, 0.0, 1.0, 1.0, 6, 6, &ZgridOptions::default()).unwrap().0;
        for j in 0..6 {
            for i in 0..6 {
                assert_eq!(a.get(i, j), b.get(i, j));
            }
        }
    }
}

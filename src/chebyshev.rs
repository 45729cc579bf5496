/*!
Richardson iteration with Chebyshev acceleration for sparse, packed-row
least-squares systems, plus the Rayleigh-quotient eigenvalue estimator that
supplies its step sizes.

Ported from `lsqup`/`chebyu`/`splits`/`errlim`/`errrat`/`lspeig`
(`original_source/src/mbaux/mb_cheb.c`), itself a C translation of Fortran
distributed by Allen H. Olson following Olson (1987), "A Chebyshev condition
for accelerating convergence of iterative tomographic methods". The packed
sparse-row matrix format (fixed-width rows of `(column, value)` pairs,
shorter rows padded and tracked by an explicit nonzero count) is kept as-is
rather than generalized to `nalgebra`'s sparse types, since the fixed row
width is exactly what lets `lsqup`'s inner loops stay allocation-free.
*/

use std::f64::consts::PI;

/// A sparse matrix stored in fixed-width packed rows: row `i` occupies
/// `row_stride` consecutive slots in `a`/`ia`, of which only the first
/// `nia[i]` are meaningful. Mirrors the `a(j,i)`/`ia(j,i)`/`nia(i)` packing
/// described in the original header comments.
#[derive(Debug, Clone)]
pub struct PackedMatrix {
    pub nc: usize,
    pub nr: usize,
    row_stride: usize,
    a: Vec<f64>,
    ia: Vec<usize>,
    nia: Vec<usize>,
}

impl PackedMatrix {
    /// Builds a packed matrix from a dense row list of `(column, value)`
    /// pairs. `row_stride` is taken to be the widest row.
    pub fn from_rows(nc: usize, rows: &[Vec<(usize, f64)>]) -> Self {
        let nr = rows.len();
        let row_stride = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut a = vec![0.0; nr * row_stride];
        let mut ia = vec![0usize; nr * row_stride];
        let mut nia = vec![0usize; nr];
        for (i, row) in rows.iter().enumerate() {
            nia[i] = row.len();
            for (j, &(col, val)) in row.iter().enumerate() {
                let k = i * row_stride + j;
                a[k] = val;
                ia[k] = col;
            }
        }
        Self { nc, nr, row_stride, a, ia, nia }
    }

    fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let base = i * self.row_stride;
        let n = self.nia[i];
        (0..n).map(move |j| (self.ia[base + j], self.a[base + j]))
    }
}

/// One Richardson/Chebyshev sweep: `ncycle = sigma.len()` iterations of
/// `x += (d - a*x)^T a / sigma[icyc]`, re-pinning `fixed` values after every
/// iteration. `sigma` is normally produced by [`chebyu`].
pub fn lsqup(mat: &PackedMatrix, x: &mut [f64], d: &[f64], fixed: &[(usize, f64)], sigma: &[f64]) {
    let mut dx = vec![0.0; mat.nc];
    for &s in sigma {
        dx.iter_mut().for_each(|v| *v = 0.0);
        for i in 0..mat.nr {
            let mut res: f64 = mat.row(i).map(|(j, v)| v * x[j]).sum();
            res = d[i] - res;
            for (j, v) in mat.row(i) {
                dx[j] += res * v;
            }
        }
        for j in 0..mat.nc {
            x[j] += dx[j] / s;
        }
        for &(idx, val) in fixed {
            x[idx] = val;
        }
    }
}

/// Chebyshev step sizes for `ncycle` iterations (must be a power of two)
/// spanning the eigenvalue band `[slo, shi]`, pair-wise reordered by
/// [`splits`] for numerical stability under repeated halving.
pub fn chebyu(ncycle: usize, shi: f64, slo: f64) -> Vec<f64> {
    let mut sigma: Vec<f64> = (0..ncycle)
        .map(|i| {
            let c = -(((2 * (i + 1) - 1) as f64) * PI / 2.0 / ncycle as f64).cos();
            (c * (shi - slo) + (shi + slo)) / 2.0
        })
        .collect();

    let mut len = ncycle;
    while len > 2 {
        let nsort = ncycle / len;
        for is in 0..nsort {
            let i0 = is * len;
            splits(&mut sigma[i0..i0 + len]);
        }
        len /= 2;
    }
    sigma
}

/// Reorders `x` so that, applied repeatedly across halving block sizes by
/// [`chebyu`], the resulting step-size sequence interleaves high and low
/// values rather than running monotonically — the ordering `lsquc`/[`lsqup`]
/// need to stay numerically stable. A permutation of the input, never a
/// resizing.
fn splits(x: &mut [f64]) {
    let n = x.len();
    let mut t = Vec::with_capacity(n);
    t.extend(x.iter().step_by(2).copied());
    t.extend(x.iter().skip(1).step_by(2).copied());

    let nb2 = n / 2;
    if nb2 >= 2 {
        for i in 0..nb2 {
            x[i] = t[nb2 - 1 - i];
        }
        for i in nb2..n {
            x[i] = t[i];
        }
    } else {
        x.copy_from_slice(&t);
    }
}

/// Theoretical upper bound on the error remaining after applying `sigma`'s
/// weights over the band `[slo, shi]`.
pub fn errlim(sigma: &[f64], shi: f64, slo: f64) -> f64 {
    let delta = 0.25 * (shi - slo);
    let mut e = 1.0;
    for &s in sigma {
        e *= delta / s;
    }
    2.0 * e
}

/// Ratio of the residual error at eigenvalue `x1` to the error at `x2`,
/// under `sigma`'s accumulated weights.
pub fn errrat(x1: f64, x2: f64, sigma: &[f64]) -> f64 {
    let rat = x1 / x2;
    let mut e = 1.0;
    for &s in sigma {
        e *= rat * (1.0 - s / x1) / (1.0 - s / x2);
    }
    e.abs()
}

/// Iteratively estimates the largest eigenvalue (and eigenvector) of the
/// normal matrix `a'a` via the Rayleigh-quotient/Chebyshev-shift scheme of
/// Wilkinson. State persists across calls to [`EigenvalueEstimator::step`],
/// matching the original's "first call with `ncyc=0` initializes, later
/// calls refine" usage.
#[derive(Debug, Clone)]
pub struct EigenvalueEstimator {
    nc: usize,
    pub x: Vec<f64>,
    sigma: Vec<f64>,
    nsig: usize,
    pub smax: f64,
    pub err: f64,
    pub sup: f64,
}

impl EigenvalueEstimator {
    pub fn new(nc: usize) -> Self {
        Self { nc, x: vec![0.0; nc], sigma: Vec::new(), nsig: 0, smax: 0.0, err: 0.0, sup: 0.0 }
    }

    /// Performs `ncyc + 1` iterations (`ncyc` must be zero or a power of
    /// two), refining `self.x`/`self.smax`/`self.err`/`self.sup` in place.
    pub fn step(&mut self, mat: &PackedMatrix, ncyc: usize) {
        let nr = mat.nr;
        let nc = self.nc;
        let mut dx = vec![0.0; nc];

        if ncyc == 0 {
            // Row 0 seeds the guess by direct assignment rather than the
            // sign-accumulated sum every later row uses; this asymmetry is
            // inherited from the original and left as-is rather than made
            // to start accumulating from row 0 like the rest.
            for (j, v) in mat.row(0) {
                self.x[j] = v;
            }
            for i in 1..nr {
                let mut res: f64 = mat.row(i).map(|(j, v)| self.x[j] * v).sum();
                res = if res.abs() <= 1.0e-30 { 1.0 } else { res / res.abs() };
                for (j, v) in mat.row(i) {
                    self.x[j] += res * v;
                }
            }
            let norm: f64 = self.x.iter().map(|v| v * v).sum::<f64>().sqrt();
            let inv = 1.0 / norm;
            for v in self.x.iter_mut() {
                *v *= inv;
            }
        } else {
            let shifts = chebyu(ncyc, self.smax, 0.0);
            self.sigma.truncate(self.nsig);
            self.sigma.extend(shifts);
        }

        let nsig1 = self.nsig + 1;
        self.nsig = nsig1 + ncyc;
        self.sigma.resize(self.nsig, 0.0);
        self.sigma[self.nsig - 1] = 0.0;

        for icyc in (nsig1 - 1)..self.nsig {
            dx.iter_mut().for_each(|v| *v = 0.0);
            for i in 0..nr {
                let res: f64 = mat.row(i).map(|(j, v)| v * self.x[j]).sum();
                for (j, v) in mat.row(i) {
                    dx[j] += res * v;
                }
            }
            for j in 0..nc {
                dx[j] -= self.sigma[icyc] * self.x[j];
            }
            self.smax = dx.iter().map(|v| v * v).sum::<f64>().sqrt();

            if icyc == self.nsig - 1 {
                self.err = dx
                    .iter()
                    .zip(self.x.iter())
                    .map(|(d, x)| {
                        let r = d - self.smax * x;
                        r * r
                    })
                    .sum::<f64>()
                    .sqrt();
            }

            for j in 0..nc {
                self.x[j] = dx[j] / self.smax;
            }
        }

        let eps = 1.0e-6;
        let mut slo = self.smax;
        self.sup = (1.0 + eps) * self.smax * eps.powf(-1.0 / self.nsig as f64);
        let mut res = 1.0;
        for _ in 0..25 {
            if res <= eps {
                break;
            }
            let smp = 0.5 * (self.sup + slo);
            let errsmp = errrat(self.smax, smp, &self.sigma[..self.nsig]);
            if errsmp > eps {
                slo = smp;
            } else {
                self.sup = smp;
            }
            res = (self.sup - slo) / slo;
        }
    }
}
